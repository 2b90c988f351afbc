mod common;

use serde_json::Value;
use std::sync::{Arc, Mutex};

use codeindex::index::metadata::RepositoryStatus;
use codeindex::index::store::{Collection, Filter, TxnDecision};
use codeindex::{
    Config, DocumentStore, FileIndexer, IndexError, MemoryStore, ParserTable, QueryEngine, RepositoryScanner,
    ScanSource, StoreError,
};
use common::{memory_indexer, Fixture};

/// Remembers the status of every repository document written
#[derive(Default)]
struct StatusLog {
    inner: MemoryStore,
    statuses: Mutex<Vec<String>>,
}

impl StatusLog {
    fn note(&self, collection: Collection, doc: &Value) {
        if collection == Collection::Repositories {
            if let Some(status) = doc.get("status").and_then(Value::as_str) {
                self.statuses.lock().unwrap().push(status.to_string());
            }
        }
    }
}

impl DocumentStore for StatusLog {
    fn get(&self, collection: Collection, key: &str) -> Result<Option<Value>, StoreError> {
        self.inner.get(collection, key)
    }

    fn set(&self, collection: Collection, key: &str, value: Value) -> Result<(), StoreError> {
        self.note(collection, &value);
        self.inner.set(collection, key, value)
    }

    fn update(&self, collection: Collection, key: &str, partial: Value) -> Result<bool, StoreError> {
        self.note(collection, &partial);
        self.inner.update(collection, key, partial)
    }

    fn delete(&self, collection: Collection, key: &str) -> Result<bool, StoreError> {
        self.inner.delete(collection, key)
    }

    fn query(&self, collection: Collection, filter: &Filter) -> Result<Vec<Value>, StoreError> {
        self.inner.query(collection, filter)
    }

    fn transact(
        &self,
        collection: Collection,
        key: &str,
        decide: &mut dyn FnMut(Option<&Value>) -> TxnDecision,
    ) -> Result<bool, StoreError> {
        let mut written = None;
        let applied = self.inner.transact(collection, key, &mut |current| {
            let decision = decide(current);
            if let TxnDecision::Write(doc) = &decision {
                written = Some(doc.clone());
            }
            decision
        })?;
        if let (true, Some(doc)) = (applied, written) {
            self.note(collection, &doc);
        }
        Ok(applied)
    }
}

#[tokio::test]
async fn test_scan_respects_allowed_roots() {
    let fixture = Fixture::new();
    fixture.write("index.ts", "export { start } from \"./src/app\";\n");
    fixture.write("src/app.ts", "import { helper } from \"./util\";\nexport function start(): void { helper(); }\n");
    fixture.write("src/util.py", "def helper():\n    return 1\n");
    fixture.write("vendor/lib.ts", "export const vendored = true;\n");
    fixture.write("README.md", "# demo\n");
    let head = fixture.commit("init", 1_700_000_000);

    let config = Config::default();
    let (_store, indexer) = memory_indexer(&config);
    let scanner = RepositoryScanner::new(indexer.clone(), config);

    let report = scanner
        .scan("demo", ScanSource::Local(fixture.path().to_path_buf()))
        .await
        .unwrap();
    assert_eq!(report.processed, 3);
    assert_eq!(report.failed, 0);

    let engine = QueryEngine::new(indexer.store().clone());
    let files: Vec<String> = engine.files("demo").unwrap().into_iter().map(|r| r.file_path).collect();
    assert_eq!(files, vec!["index.ts", "src/app.ts", "src/util.py"]);
    assert!(engine.file("demo", "vendor/lib.ts").unwrap().is_none());

    let metadata = engine.repository("demo").unwrap().unwrap();
    assert_eq!(metadata.status, RepositoryStatus::Completed);
    assert_eq!(metadata.total_files, 3);
    assert_eq!(metadata.processed_files, 3);
    assert_eq!(metadata.last_processed_commit.as_deref(), Some(head.as_str()));
}

#[tokio::test]
async fn test_rescan_skips_unchanged_files() {
    let fixture = Fixture::new();
    fixture.write("src/a.ts", "export const a = 1;\n");
    fixture.write("src/b.ts", "export const b = 1;\n");
    fixture.commit("init", 1_700_000_000);

    let config = Config::default();
    let (_store, indexer) = memory_indexer(&config);
    let scanner = RepositoryScanner::new(indexer, config);
    let source = ScanSource::Local(fixture.path().to_path_buf());

    scanner.scan("demo", source.clone()).await.unwrap();
    let again = scanner.scan("demo", source).await.unwrap();
    assert_eq!(again.processed, 0);
    assert_eq!(again.skipped, 2);
}

#[tokio::test]
async fn test_missing_working_copy_marks_failed() {
    let config = Config::default();
    let (_store, indexer) = memory_indexer(&config);
    let scanner = RepositoryScanner::new(indexer.clone(), config);

    let result = scanner
        .scan("ghost", ScanSource::Local("/no/such/checkout".into()))
        .await;
    assert!(matches!(result, Err(IndexError::WorkingCopyNotFound { .. })));

    let metadata = indexer.repository("ghost").unwrap();
    assert_eq!(metadata.status, RepositoryStatus::Failed);
    assert!(metadata.error_message.is_some());
}

#[tokio::test]
async fn test_first_scan_passes_through_pending() {
    let fixture = Fixture::new();
    fixture.write("src/a.ts", "export const a = 1;\n");
    fixture.commit("init", 1_700_000_000);

    let config = Config::default();
    let log = Arc::new(StatusLog::default());
    let indexer = FileIndexer::new(log.clone(), Arc::new(ParserTable::new()), &config);
    RepositoryScanner::new(indexer, config)
        .scan("demo", ScanSource::Local(fixture.path().to_path_buf()))
        .await
        .unwrap();

    let statuses = log.statuses.lock().unwrap().clone();
    assert_eq!(&statuses[..2], &["pending", "processing"]);
    assert_eq!(statuses.last().map(String::as_str), Some("completed"));
}

#[tokio::test]
async fn test_repository_id_with_key_separator_is_rejected() {
    let fixture = Fixture::new();
    fixture.write("src/a.ts", "export const a = 1;\n");
    fixture.commit("init", 1_700_000_000);

    let config = Config::default();
    let (_store, indexer) = memory_indexer(&config);
    let result = RepositoryScanner::new(indexer.clone(), config)
        .scan("web:2", ScanSource::Local(fixture.path().to_path_buf()))
        .await;

    assert!(matches!(result, Err(IndexError::InvalidRepositoryId(_))));
    assert!(indexer.repository("web:2").is_err());
}
