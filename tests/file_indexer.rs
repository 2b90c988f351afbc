mod common;

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use codeindex::index::store::{Collection, Filter, TxnDecision};
use codeindex::index::SymbolKind;
use codeindex::indexer::dedup::SkipReason;
use codeindex::{Config, DocumentStore, FileIndexer, FileOutcome, FileRequest, MemoryStore, ParserTable, QueryEngine, StoreError};
use common::{memory_indexer, sqlite_indexer};

type Hook = Box<dyn FnOnce() + Send>;

/// Runs `hook` right before the first lock transaction, i.e. after the
/// caller's unlocked reads and before it takes the file lock.
struct BeforeLock {
    inner: Arc<MemoryStore>,
    hook: Mutex<Option<Hook>>,
}

impl DocumentStore for BeforeLock {
    fn get(&self, collection: Collection, key: &str) -> Result<Option<Value>, StoreError> {
        self.inner.get(collection, key)
    }

    fn set(&self, collection: Collection, key: &str, value: Value) -> Result<(), StoreError> {
        self.inner.set(collection, key, value)
    }

    fn update(&self, collection: Collection, key: &str, partial: Value) -> Result<bool, StoreError> {
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
        if collection == Collection::FileLocks {
            let hook = self.hook.lock().unwrap().take();
            if let Some(hook) = hook {
                hook();
            }
        }
        self.inner.transact(collection, key, decide)
    }
}

const SERVICE_TS: &str = r#"import { Injectable } from "@core/di";
import type { User } from "./models";

export interface UserRepository {
  find(id: string): Promise<User | undefined>;
}

@Injectable()
export class UserService {
  constructor(private readonly repo: UserRepository) {}

  async getUser(id: string): Promise<User | undefined> {
    return this.repo.find(id);
  }
}

export function formatName(user: User, upper = false): string {
  return upper ? user.name.toUpperCase() : user.name;
}
"#;

#[test]
fn test_indexing_is_idempotent_on_sqlite() {
    let dir = TempDir::new().unwrap();
    let (_store, indexer) = sqlite_indexer(&dir, &Config::default());
    let ts = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

    assert!(indexer.process_file("web", "src/user.ts", "abc1234", ts, SERVICE_TS, None));
    // Same content, same commit: nothing is written again
    assert!(!indexer.process_file("web", "src/user.ts", "abc1234", ts, SERVICE_TS, None));
    // Same content under a later commit is still unchanged
    let later = Utc.timestamp_opt(1_700_000_500, 0).unwrap();
    assert_eq!(
        indexer.index_file(FileRequest::new("web", "src/user.ts", "def5678", later, SERVICE_TS)),
        FileOutcome::Skipped(SkipReason::Unchanged)
    );

    let metadata = indexer.repository("web").unwrap();
    assert_eq!(metadata.processed_files, 1);
    assert_eq!(metadata.last_processed_commit.as_deref(), Some("abc1234"));

    let engine = QueryEngine::new(indexer.store().clone());
    let exports = engine.exports_of("web", "src/user.ts").unwrap().unwrap();
    let names: Vec<(&str, SymbolKind)> = exports.iter().map(|e| (e.name.as_str(), e.kind())).collect();
    assert_eq!(
        names,
        vec![
            ("UserRepository", SymbolKind::Interface),
            ("UserService", SymbolKind::Class),
            ("formatName", SymbolKind::Function),
        ]
    );

    let importers = engine.importers_of("web", "Injectable").unwrap();
    assert_eq!(importers.len(), 1);
    assert_eq!(importers[0].source, "@core/di");
}

#[test]
fn test_older_commit_never_overwrites_newer() {
    let (_store, indexer) = memory_indexer(&Config::default());
    let newer = Utc.timestamp_opt(1_700_000_900, 0).unwrap();
    let older = Utc.timestamp_opt(1_700_000_100, 0).unwrap();

    assert!(indexer.process_file("web", "src/a.ts", "newer01", newer, "export const a = 2;\n", None));
    assert_eq!(
        indexer.index_file(FileRequest::new("web", "src/a.ts", "older01", older, "export const a = 1;\n")),
        FileOutcome::Skipped(SkipReason::Stale)
    );

    let record = QueryEngine::new(indexer.store().clone())
        .file("web", "src/a.ts")
        .unwrap()
        .unwrap();
    assert_eq!(record.last_commit_id, "newer01");
}

#[test]
fn test_newer_write_landing_before_the_lock_wins() {
    let inner = Arc::new(MemoryStore::new());
    let config = Config::default();
    let newer = FileIndexer::new(inner.clone(), Arc::new(ParserTable::new()), &config);
    let newer_ts = Utc.timestamp_opt(2000, 0).unwrap();
    let older_ts = Utc.timestamp_opt(1000, 0).unwrap();

    let hook: Hook = Box::new(move || {
        let outcome = newer.index_file(FileRequest::new("web", "src/a.ts", "bbbbbbbbbb", newer_ts, "export const b = 2;\n"));
        assert_eq!(outcome, FileOutcome::Indexed);
    });
    let store = Arc::new(BeforeLock {
        inner: inner.clone(),
        hook: Mutex::new(Some(hook)),
    });
    let older = FileIndexer::new(store, Arc::new(ParserTable::new()), &config);

    let outcome = older.index_file(FileRequest::new("web", "src/a.ts", "aaaaaaaaaa", older_ts, "export const a = 1;\n"));
    assert_eq!(outcome, FileOutcome::Skipped(SkipReason::Stale));

    let record = QueryEngine::new(inner).file("web", "src/a.ts").unwrap().unwrap();
    assert_eq!(record.last_commit_id, "bbbbbbbbbb");
    assert_eq!(record.exports[0].name, "b");
}

#[test]
fn test_identical_write_landing_before_the_lock_is_unchanged() {
    let inner = Arc::new(MemoryStore::new());
    let config = Config::default();
    let first = FileIndexer::new(inner.clone(), Arc::new(ParserTable::new()), &config);
    let ts = Utc.timestamp_opt(1000, 0).unwrap();

    let hook: Hook = Box::new(move || {
        first.index_file(FileRequest::new("web", "src/a.ts", "aaaaaaaaaa", ts, "export const a = 1;\n"));
    });
    let store = Arc::new(BeforeLock {
        inner: inner.clone(),
        hook: Mutex::new(Some(hook)),
    });
    let second = FileIndexer::new(store, Arc::new(ParserTable::new()), &config);

    let outcome = second.index_file(FileRequest::new("web", "src/a.ts", "aaaaaaaaaa", ts, "export const a = 1;\n"));
    assert_eq!(outcome, FileOutcome::Skipped(SkipReason::Unchanged));
    assert_eq!(second.repository("web").unwrap().processed_files, 1);
}

#[test]
fn test_broken_source_keeps_partial_results() {
    let (_store, indexer) = memory_indexer(&Config::default());
    let ts = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let content = "export function ok(a: number): number { return a; }\nexport class Broken {\n  run( {\n";

    assert!(indexer.process_file("web", "src/broken.ts", "abc1234", ts, content, None));
    let record = QueryEngine::new(indexer.store().clone())
        .file("web", "src/broken.ts")
        .unwrap()
        .unwrap();
    assert!(record.exports.iter().any(|e| e.name == "ok"));
    assert!(!record.parse_errors.is_empty());
}

#[test]
fn test_broken_class_before_valid_export() {
    let (_store, indexer) = memory_indexer(&Config::default());
    let ts = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let content = "export class Broken {\n  run( {\n}\n\nexport function ok(a: number): number { return a; }\n";

    assert!(indexer.process_file("web", "src/broken.ts", "abc1234", ts, content, None));
    let record = QueryEngine::new(indexer.store().clone())
        .file("web", "src/broken.ts")
        .unwrap()
        .unwrap();
    let ok = record.exports.iter().find(|e| e.name == "ok").unwrap();
    assert_eq!(ok.line_number, 5);
    assert!(!record.parse_errors.is_empty());
}

#[test]
fn test_short_commit_id_fails() {
    let (_store, indexer) = memory_indexer(&Config::default());
    let ts = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let outcome = indexer.index_file(FileRequest::new("web", "src/a.ts", "abc", ts, "export const a = 1;\n"));
    assert!(matches!(outcome, FileOutcome::Failed(_)));
    assert!(indexer.repository("web").is_err());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_records_are_deterministic(names in prop::collection::vec("[a-z][a-zA-Z0-9]{0,8}", 1..6)) {
        let content: String = names
            .iter()
            .enumerate()
            .map(|(i, name)| format!("export function {}{}(x: number): number {{ return x; }}\n", name, i))
            .collect();
        let ts = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

        let mut records = Vec::new();
        for _ in 0..2 {
            let (_store, indexer) = memory_indexer(&Config::default());
            prop_assert!(indexer.process_file("r", "src/gen.ts", "abc1234", ts, &content, None));
            let record = QueryEngine::new(indexer.store().clone()).file("r", "src/gen.ts").unwrap().unwrap();
            records.push(record);
        }

        prop_assert_eq!(&records[0].exports, &records[1].exports);
        prop_assert_eq!(&records[0].content_fingerprint, &records[1].content_fingerprint);
        prop_assert_eq!(records[0].exports.len(), names.len());
    }
}
