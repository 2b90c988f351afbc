// Keyed document store abstraction

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::StoreError;

/// Collections used by the indexer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Repositories,
    FileIndexes,
    FileLocks,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Repositories => "repositories",
            Collection::FileIndexes => "file_indexes",
            Collection::FileLocks => "file_locks",
        }
    }
}

/// What a transaction callback wants done with the document it was shown
#[derive(Debug, Clone, PartialEq)]
pub enum TxnDecision {
    Write(Value),
    Delete,
    Abort,
}

/// Field-equality filter over top-level document fields
#[derive(Debug, Clone, Default)]
pub struct Filter {
    clauses: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.clauses.push((field.to_string(), value.into()));
        self
    }

    pub fn clauses(&self) -> &[(String, Value)] {
        &self.clauses
    }

    pub fn matches(&self, doc: &Value) -> bool {
        self.clauses
            .iter()
            .all(|(field, expected)| doc.get(field) == Some(expected))
    }
}

/// Shared storage for repository metadata, file records and file locks.
///
/// `transact` is the only primitive that gives read-then-write atomicity
/// for a single document; everything that must not race goes through it.
pub trait DocumentStore: Send + Sync {
    fn get(&self, collection: Collection, key: &str) -> Result<Option<Value>, StoreError>;

    fn set(&self, collection: Collection, key: &str, value: Value) -> Result<(), StoreError>;

    /// Merge top-level fields of `partial` into an existing document.
    /// Returns false if there is no such document.
    fn update(&self, collection: Collection, key: &str, partial: Value) -> Result<bool, StoreError>;

    /// Returns true if a document was removed
    fn delete(&self, collection: Collection, key: &str) -> Result<bool, StoreError>;

    /// All documents of a collection matching the filter, ordered by key
    fn query(&self, collection: Collection, filter: &Filter) -> Result<Vec<Value>, StoreError>;

    /// Show the current document to `decide` and apply its decision atomically.
    /// Returns true if a write or delete was applied.
    fn transact(
        &self,
        collection: Collection,
        key: &str,
        decide: &mut dyn FnMut(Option<&Value>) -> TxnDecision,
    ) -> Result<bool, StoreError>;
}

/// Typed helpers over any document store
pub trait DocumentStoreExt: DocumentStore {
    fn get_as<T: DeserializeOwned>(&self, collection: Collection, key: &str) -> Result<Option<T>, StoreError> {
        match self.get(collection, key)? {
            Some(value) => decode(collection, key, value).map(Some),
            None => Ok(None),
        }
    }

    fn put<T: Serialize>(&self, collection: Collection, key: &str, doc: &T) -> Result<(), StoreError> {
        self.set(collection, key, serde_json::to_value(doc)?)
    }

    fn query_as<T: DeserializeOwned>(&self, collection: Collection, filter: &Filter) -> Result<Vec<T>, StoreError> {
        self.query(collection, filter)?
            .into_iter()
            .map(|value| decode(collection, "<query>", value))
            .collect()
    }
}

impl<S: DocumentStore + ?Sized> DocumentStoreExt for S {}

pub(crate) fn decode<T: DeserializeOwned>(collection: Collection, key: &str, value: Value) -> Result<T, StoreError> {
    serde_json::from_value(value).map_err(|e| StoreError::Corrupt {
        collection: collection.as_str().to_string(),
        key: key.to_string(),
        message: e.to_string(),
    })
}

pub(crate) fn merge_fields(target: &mut Value, partial: Value) {
    match (target, partial) {
        (Value::Object(existing), Value::Object(fields)) => {
            for (field, value) in fields {
                existing.insert(field, value);
            }
        }
        (target, partial) => *target = partial,
    }
}

/// In-process store. Each key's entry is locked while a transaction callback
/// runs, which makes `transact` atomic across threads of one process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: DashMap<(Collection, String), Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self, collection: Collection) -> usize {
        self.docs.iter().filter(|e| e.key().0 == collection).count()
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, collection: Collection, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self
            .docs
            .get(&(collection, key.to_string()))
            .map(|doc| doc.value().clone()))
    }

    fn set(&self, collection: Collection, key: &str, value: Value) -> Result<(), StoreError> {
        self.docs.insert((collection, key.to_string()), value);
        Ok(())
    }

    fn update(&self, collection: Collection, key: &str, partial: Value) -> Result<bool, StoreError> {
        match self.docs.get_mut(&(collection, key.to_string())) {
            Some(mut doc) => {
                merge_fields(doc.value_mut(), partial);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete(&self, collection: Collection, key: &str) -> Result<bool, StoreError> {
        Ok(self.docs.remove(&(collection, key.to_string())).is_some())
    }

    fn query(&self, collection: Collection, filter: &Filter) -> Result<Vec<Value>, StoreError> {
        let mut found: Vec<(String, Value)> = self
            .docs
            .iter()
            .filter(|e| e.key().0 == collection && filter.matches(e.value()))
            .map(|e| (e.key().1.clone(), e.value().clone()))
            .collect();
        found.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(found.into_iter().map(|(_, doc)| doc).collect())
    }

    fn transact(
        &self,
        collection: Collection,
        key: &str,
        decide: &mut dyn FnMut(Option<&Value>) -> TxnDecision,
    ) -> Result<bool, StoreError> {
        match self.docs.entry((collection, key.to_string())) {
            Entry::Occupied(mut entry) => match decide(Some(entry.get())) {
                TxnDecision::Write(value) => {
                    entry.insert(value);
                    Ok(true)
                }
                TxnDecision::Delete => {
                    entry.remove();
                    Ok(true)
                }
                TxnDecision::Abort => Ok(false),
            },
            Entry::Vacant(entry) => match decide(None) {
                TxnDecision::Write(value) => {
                    entry.insert(value);
                    Ok(true)
                }
                TxnDecision::Delete | TxnDecision::Abort => Ok(false),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_get_delete() {
        let store = MemoryStore::new();
        store.set(Collection::Repositories, "r1", json!({"name": "demo"})).unwrap();

        let doc = store.get(Collection::Repositories, "r1").unwrap().unwrap();
        assert_eq!(doc["name"], "demo");
        assert!(store.get(Collection::FileIndexes, "r1").unwrap().is_none());

        assert!(store.delete(Collection::Repositories, "r1").unwrap());
        assert!(!store.delete(Collection::Repositories, "r1").unwrap());
    }

    #[test]
    fn test_update_merges_fields() {
        let store = MemoryStore::new();
        assert!(!store.update(Collection::Repositories, "r1", json!({"status": "failed"})).unwrap());

        store.set(Collection::Repositories, "r1", json!({"name": "demo", "status": "pending"})).unwrap();
        assert!(store.update(Collection::Repositories, "r1", json!({"status": "failed"})).unwrap());

        let doc = store.get(Collection::Repositories, "r1").unwrap().unwrap();
        assert_eq!(doc, json!({"name": "demo", "status": "failed"}));
    }

    #[test]
    fn test_query_filters_and_orders_by_key() {
        let store = MemoryStore::new();
        store.set(Collection::FileIndexes, "r1:b.ts", json!({"repository_id": "r1", "file_path": "b.ts"})).unwrap();
        store.set(Collection::FileIndexes, "r1:a.ts", json!({"repository_id": "r1", "file_path": "a.ts"})).unwrap();
        store.set(Collection::FileIndexes, "r2:a.ts", json!({"repository_id": "r2", "file_path": "a.ts"})).unwrap();

        let docs = store
            .query(Collection::FileIndexes, &Filter::new().eq("repository_id", "r1"))
            .unwrap();
        let paths: Vec<_> = docs.iter().map(|d| d["file_path"].as_str().unwrap()).collect();
        assert_eq!(paths, vec!["a.ts", "b.ts"]);
    }

    #[test]
    fn test_transact_decisions() {
        let store = MemoryStore::new();

        let wrote = store
            .transact(Collection::FileLocks, "k", &mut |current| {
                assert!(current.is_none());
                TxnDecision::Write(json!({"n": 1}))
            })
            .unwrap();
        assert!(wrote);

        let aborted = store
            .transact(Collection::FileLocks, "k", &mut |_| TxnDecision::Abort)
            .unwrap();
        assert!(!aborted);
        assert_eq!(store.get(Collection::FileLocks, "k").unwrap(), Some(json!({"n": 1})));

        let deleted = store
            .transact(Collection::FileLocks, "k", &mut |_| TxnDecision::Delete)
            .unwrap();
        assert!(deleted);
        assert_eq!(store.len(Collection::FileLocks), 0);
    }

    #[test]
    fn test_get_as_reports_corrupt_documents() {
        let store = MemoryStore::new();
        store.set(Collection::Repositories, "r1", json!({"unexpected": true})).unwrap();

        let result: Result<Option<crate::index::metadata::RepositoryMetadata>, _> =
            store.get_as(Collection::Repositories, "r1");
        assert!(matches!(result, Err(StoreError::Corrupt { .. })));
    }
}
