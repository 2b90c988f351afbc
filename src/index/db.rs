use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use super::schema::init_schema;
use super::store::{merge_fields, Collection, DocumentStore, Filter, TxnDecision};
use crate::error::StoreError;

/// Type alias for connection pool
pub type ConnectionPool = Pool<SqliteConnectionManager>;

/// How long a connection waits on another writer before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Document store backed by a SQLite file. Several processes may open the
/// same file; `transact` runs under `BEGIN IMMEDIATE`, so the write lock is
/// taken before the document is read.
#[derive(Clone)]
pub struct SqliteStore {
    pool: ConnectionPool,
    db_path: PathBuf,
}

impl SqliteStore {
    /// Create or open a store
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref().to_path_buf();

        info!("Opening document store at: {}", db_path.display());

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::Setup {
                    path: parent.display().to_string(),
                    message: e.to_string(),
                })?;
            }
        }

        let manager = SqliteConnectionManager::file(&db_path)
            .with_init(|conn| conn.busy_timeout(BUSY_TIMEOUT));

        let pool = Pool::builder().max_size(10).build(manager)?;

        {
            let conn = pool.get()?;
            init_schema(&conn)?;
        }

        Ok(Self { pool, db_path })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Get a connection from the pool
    pub fn get_conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>, StoreError> {
        Ok(self.pool.get()?)
    }

    /// Number of documents per collection
    pub fn counts(&self) -> Result<Vec<(String, u64)>, StoreError> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT collection, COUNT(*) FROM documents GROUP BY collection ORDER BY collection",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn parse_body(collection: Collection, key: &str, body: &str) -> Result<Value, StoreError> {
    serde_json::from_str(body).map_err(|e| StoreError::Corrupt {
        collection: collection.as_str().to_string(),
        key: key.to_string(),
        message: e.to_string(),
    })
}

impl DocumentStore for SqliteStore {
    fn get(&self, collection: Collection, key: &str) -> Result<Option<Value>, StoreError> {
        let conn = self.get_conn()?;
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM documents WHERE collection = ?1 AND key = ?2",
                params![collection.as_str(), key],
                |row| row.get(0),
            )
            .optional()?;

        body.map(|b| parse_body(collection, key, &b)).transpose()
    }

    fn set(&self, collection: Collection, key: &str, value: Value) -> Result<(), StoreError> {
        let conn = self.get_conn()?;
        debug!("Writing {}/{}", collection.as_str(), key);

        conn.execute(
            "INSERT OR REPLACE INTO documents (collection, key, body, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![collection.as_str(), key, value.to_string(), now()],
        )?;
        Ok(())
    }

    fn update(&self, collection: Collection, key: &str, partial: Value) -> Result<bool, StoreError> {
        let mut partial = Some(partial);
        self.transact(collection, key, &mut |current| match (current, partial.take()) {
            (Some(existing), Some(fields)) => {
                let mut merged = existing.clone();
                merge_fields(&mut merged, fields);
                TxnDecision::Write(merged)
            }
            _ => TxnDecision::Abort,
        })
    }

    fn delete(&self, collection: Collection, key: &str) -> Result<bool, StoreError> {
        let conn = self.get_conn()?;
        let removed = conn.execute(
            "DELETE FROM documents WHERE collection = ?1 AND key = ?2",
            params![collection.as_str(), key],
        )?;
        Ok(removed > 0)
    }

    fn query(&self, collection: Collection, filter: &Filter) -> Result<Vec<Value>, StoreError> {
        let conn = self.get_conn()?;

        // String clauses narrow the scan in SQL; every clause is re-checked
        // on the decoded document.
        let mut sql = String::from("SELECT key, body FROM documents WHERE collection = ?");
        let mut args: Vec<String> = vec![collection.as_str().to_string()];
        for (field, expected) in filter.clauses() {
            if let Value::String(s) = expected {
                sql.push_str(" AND json_extract(body, ?) = ?");
                args.push(format!("$.{}", field));
                args.push(s.clone());
            }
        }
        sql.push_str(" ORDER BY key");

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(args.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut docs = Vec::with_capacity(rows.len());
        for (key, body) in rows {
            let doc = parse_body(collection, &key, &body)?;
            if filter.matches(&doc) {
                docs.push(doc);
            }
        }
        Ok(docs)
    }

    fn transact(
        &self,
        collection: Collection,
        key: &str,
        decide: &mut dyn FnMut(Option<&Value>) -> TxnDecision,
    ) -> Result<bool, StoreError> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let body: Option<String> = tx
            .query_row(
                "SELECT body FROM documents WHERE collection = ?1 AND key = ?2",
                params![collection.as_str(), key],
                |row| row.get(0),
            )
            .optional()?;
        let current = body.map(|b| parse_body(collection, key, &b)).transpose()?;

        let applied = match decide(current.as_ref()) {
            TxnDecision::Write(value) => {
                tx.execute(
                    "INSERT OR REPLACE INTO documents (collection, key, body, updated_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![collection.as_str(), key, value.to_string(), now()],
                )?;
                true
            }
            TxnDecision::Delete => {
                tx.execute(
                    "DELETE FROM documents WHERE collection = ?1 AND key = ?2",
                    params![collection.as_str(), key],
                )? > 0
            }
            TxnDecision::Abort => false,
        };

        tx.commit()?;
        Ok(applied)
    }
}

/// Current time in unix milliseconds
pub fn now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
