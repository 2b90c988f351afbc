// File indexing: dedup, parse, lock and persist one file at a time

pub mod commits;
pub mod dedup;
pub mod language;
pub mod lock;
pub mod parser;
pub mod scanner;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{IndexError, Result};
use crate::index::metadata::RepositoryMetadata;
use crate::index::store::{decode, Collection, DocumentStore, DocumentStoreExt, TxnDecision};
use crate::index::{file_key, ExportSymbol, FileIndexRecord, ImportSymbol};
use dedup::{fingerprint, DedupGate, SkipReason};
use language::Language;
use lock::{DistributedLock, LockKey};
use parser::ParserTable;

/// One file to index, as delivered by a scan, a commit diff or a caller
#[derive(Debug, Clone)]
pub struct FileRequest {
    pub repository_id: String,
    pub file_path: String,
    pub commit_id: String,
    pub commit_timestamp: DateTime<Utc>,
    /// Raw file bytes; fingerprinted as is, decoded lossily for parsing
    pub content: Vec<u8>,
    /// Detected from the extension when not given
    pub language: Option<Language>,
    /// Pre-extracted symbols; parsing is skipped when both are present
    pub exports: Option<Vec<ExportSymbol>>,
    pub imports: Option<Vec<ImportSymbol>>,
}

impl FileRequest {
    pub fn new(
        repository_id: &str,
        file_path: &str,
        commit_id: &str,
        commit_timestamp: DateTime<Utc>,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            repository_id: repository_id.to_string(),
            file_path: file_path.to_string(),
            commit_id: commit_id.to_string(),
            commit_timestamp,
            content: content.into(),
            language: None,
            exports: None,
            imports: None,
        }
    }

    pub fn with_symbols(mut self, exports: Vec<ExportSymbol>, imports: Vec<ImportSymbol>) -> Self {
        self.exports = Some(exports);
        self.imports = Some(imports);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Indexed,
    Skipped(SkipReason),
    Failed(String),
}

impl FileOutcome {
    pub fn is_indexed(&self) -> bool {
        matches!(self, FileOutcome::Indexed)
    }
}

/// Counts for one scan or commit run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub processed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Paths removed by the commit, whether or not their records were dropped
    pub deleted: Vec<String>,
}

impl RunReport {
    pub fn record(&mut self, outcome: &FileOutcome) {
        match outcome {
            FileOutcome::Indexed => self.processed += 1,
            FileOutcome::Skipped(_) => self.skipped += 1,
            FileOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Indexes single files. Cheap to clone; clones share the parser table,
/// the store and the lock.
#[derive(Clone)]
pub struct FileIndexer {
    parsers: Arc<ParserTable>,
    store: Arc<dyn DocumentStore>,
    lock: DistributedLock,
    gate: DedupGate,
    lock_ttl: Duration,
}

impl FileIndexer {
    pub fn new(store: Arc<dyn DocumentStore>, parsers: Arc<ParserTable>, config: &Config) -> Self {
        let lock_ttl = config.lock_ttl();
        Self {
            lock: DistributedLock::new(store.clone(), lock_ttl),
            gate: DedupGate::new(config.indexing.content_check, config.indexing.timestamp_check),
            parsers,
            store,
            lock_ttl,
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn lock(&self) -> &DistributedLock {
        &self.lock
    }

    /// Index one file. Returns true only if a new record was written; skips
    /// and failures both return false.
    pub fn process_file(
        &self,
        repository_id: &str,
        file_path: &str,
        commit_id: &str,
        commit_timestamp: DateTime<Utc>,
        content: &str,
        language: Option<Language>,
    ) -> bool {
        let mut request = FileRequest::new(repository_id, file_path, commit_id, commit_timestamp, content);
        request.language = language;
        self.index_file(request).is_indexed()
    }

    pub fn index_file(&self, request: FileRequest) -> FileOutcome {
        let path = request.file_path.clone();
        match self.try_index(request) {
            Ok(outcome) => {
                if let FileOutcome::Skipped(reason) = &outcome {
                    debug!("Skipped {} ({})", path, reason.as_str());
                }
                outcome
            }
            Err(e) => {
                warn!("Failed to index {}: {}", path, e);
                FileOutcome::Failed(e.to_string())
            }
        }
    }

    fn try_index(&self, request: FileRequest) -> Result<FileOutcome> {
        let FileRequest {
            repository_id,
            file_path,
            commit_id,
            commit_timestamp,
            content,
            language,
            exports,
            imports,
        } = request;

        let stored = self.gate.stored_record(self.store.as_ref(), &repository_id, &file_path);
        if let Some(reason) = self.gate.check_timestamp(stored.as_ref(), commit_timestamp) {
            return Ok(FileOutcome::Skipped(reason));
        }

        let content_fingerprint = fingerprint(&content);
        if let Some(reason) = self.gate.check_content(stored.as_ref(), &content_fingerprint) {
            return Ok(FileOutcome::Skipped(reason));
        }

        let language = language.unwrap_or_else(|| Language::detect(&file_path));
        let (exports, imports, parse_errors) = match (exports, imports) {
            (Some(exports), Some(imports)) => (exports, imports, Vec::new()),
            (exports, imports) => {
                let text = String::from_utf8_lossy(&content);
                let parsed = self.parsers.parse_as(&file_path, &text, language);
                (
                    exports.unwrap_or(parsed.exports),
                    imports.unwrap_or(parsed.imports),
                    parsed.parse_errors,
                )
            }
        };

        let record = FileIndexRecord {
            repository_id,
            file_path,
            content_fingerprint,
            last_commit_id: commit_id,
            last_commit_timestamp: commit_timestamp,
            exports,
            imports,
            language,
            parse_errors,
            updated_at: Utc::now(),
        };
        record.validate()?;

        let key = LockKey::new(&record.repository_id, &record.file_path);
        let written = self.lock.with_lock(&key, Some(self.lock_ttl), || -> Result<Option<SkipReason>> {
            // A newer delivery may have landed between the first look and the lock
            let current = self.gate.stored_record(self.store.as_ref(), &record.repository_id, &record.file_path);
            let skip = self
                .gate
                .check_timestamp(current.as_ref(), commit_timestamp)
                .or_else(|| self.gate.check_content(current.as_ref(), &record.content_fingerprint));
            if skip.is_some() {
                return Ok(skip);
            }
            self.store.put(
                Collection::FileIndexes,
                &file_key(&record.repository_id, &record.file_path),
                &record,
            )?;
            Ok(None)
        })?;
        match written {
            Some(result) => {
                if let Some(reason) = result? {
                    return Ok(FileOutcome::Skipped(reason));
                }
            }
            None => return Ok(FileOutcome::Skipped(SkipReason::LockHeld)),
        }

        self.record_progress(&record.repository_id, &record.last_commit_id, commit_timestamp)?;
        debug!(
            "Indexed {} ({} exports, {} imports, {} errors)",
            record.file_path,
            record.exports.len(),
            record.imports.len(),
            record.parse_errors.len()
        );
        Ok(FileOutcome::Indexed)
    }

    /// Bump processed_files and the last-processed commit, creating the
    /// repository row for files indexed outside a scan.
    fn record_progress(&self, repository_id: &str, commit_id: &str, commit_timestamp: DateTime<Utc>) -> Result<()> {
        let mut corrupt = None;
        self.store.transact(Collection::Repositories, repository_id, &mut |current| {
            let mut metadata = match current {
                Some(doc) => match decode::<RepositoryMetadata>(Collection::Repositories, repository_id, doc.clone()) {
                    Ok(metadata) => metadata,
                    Err(e) => {
                        corrupt = Some(e);
                        return TxnDecision::Abort;
                    }
                },
                None => RepositoryMetadata::new(repository_id, repository_id, ""),
            };
            metadata.record_file(commit_id, commit_timestamp);
            match serde_json::to_value(&metadata) {
                Ok(doc) => TxnDecision::Write(doc),
                Err(_) => TxnDecision::Abort,
            }
        })?;

        match corrupt {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Drop a file's record under its lock. Returns false if there was no
    /// record or the lock is held elsewhere.
    pub fn delete_file(&self, repository_id: &str, file_path: &str) -> Result<bool> {
        let key = LockKey::new(repository_id, file_path);
        let removed = self.lock.with_lock(&key, Some(self.lock_ttl), || {
            self.store.delete(Collection::FileIndexes, &file_key(repository_id, file_path))
        })?;
        match removed {
            Some(result) => {
                let removed = result?;
                if removed {
                    info!("Removed index record for {}", file_path);
                }
                Ok(removed)
            }
            None => Ok(false),
        }
    }

    /// Load repository metadata, failing if the repository was never registered
    pub fn repository(&self, repository_id: &str) -> Result<RepositoryMetadata> {
        self.store
            .get_as::<RepositoryMetadata>(Collection::Repositories, repository_id)?
            .ok_or_else(|| IndexError::RepositoryNotFound {
                repository_id: repository_id.to_string(),
            })
    }

    pub fn save_repository(&self, metadata: &RepositoryMetadata) -> Result<()> {
        self.store
            .put(Collection::Repositories, &metadata.repository_id, metadata)?;
        Ok(())
    }

    /// Apply `change` to the stored metadata in one transaction
    pub fn update_repository(
        &self,
        repository_id: &str,
        change: impl Fn(&mut RepositoryMetadata),
    ) -> Result<RepositoryMetadata> {
        let mut outcome: Option<std::result::Result<RepositoryMetadata, IndexError>> = None;
        self.store.transact(Collection::Repositories, repository_id, &mut |current| {
            let doc: &Value = match current {
                Some(doc) => doc,
                None => {
                    outcome = Some(Err(IndexError::RepositoryNotFound {
                        repository_id: repository_id.to_string(),
                    }));
                    return TxnDecision::Abort;
                }
            };
            match decode::<RepositoryMetadata>(Collection::Repositories, repository_id, doc.clone()) {
                Ok(mut metadata) => {
                    change(&mut metadata);
                    match serde_json::to_value(&metadata) {
                        Ok(doc) => {
                            outcome = Some(Ok(metadata));
                            TxnDecision::Write(doc)
                        }
                        Err(e) => {
                            outcome = Some(Err(crate::error::StoreError::from(e).into()));
                            TxnDecision::Abort
                        }
                    }
                }
                Err(e) => {
                    outcome = Some(Err(e.into()));
                    TxnDecision::Abort
                }
            }
        })?;

        outcome.unwrap_or_else(|| {
            Err(IndexError::RepositoryNotFound {
                repository_id: repository_id.to_string(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::metadata::RepositoryStatus;
    use crate::index::store::MemoryStore;

    const COMMIT: &str = "0123456789abcdef0123456789abcdef01234567";

    fn indexer() -> FileIndexer {
        FileIndexer::new(Arc::new(MemoryStore::new()), Arc::new(ParserTable::new()), &Config::default())
    }

    fn stored(indexer: &FileIndexer, path: &str) -> Option<FileIndexRecord> {
        indexer
            .store()
            .get_as::<FileIndexRecord>(Collection::FileIndexes, &file_key("repo", path))
            .unwrap()
    }

    #[test]
    fn test_indexes_and_records_progress() {
        let indexer = indexer();
        let now = Utc::now();
        let source = "import { b } from './b';\nexport function add(a: number, b: number): number { return a + b; }\n";

        assert!(indexer.process_file("repo", "src/a.ts", COMMIT, now, source, None));

        let record = stored(&indexer, "src/a.ts").unwrap();
        assert_eq!(record.language, Language::TypeScript);
        assert_eq!(record.exports[0].name, "add");
        assert_eq!(record.imports[0].source, "./b");
        assert_eq!(record.content_fingerprint, fingerprint(source.as_bytes()));

        let metadata = indexer.repository("repo").unwrap();
        assert_eq!(metadata.processed_files, 1);
        assert_eq!(metadata.last_processed_commit.as_deref(), Some(COMMIT));
        assert_eq!(metadata.status, RepositoryStatus::Pending);
    }

    #[test]
    fn test_second_run_is_skipped_as_unchanged() {
        let indexer = indexer();
        let now = Utc::now();
        let request = FileRequest::new("repo", "src/a.ts", COMMIT, now, "export const x = 1;\n");

        assert_eq!(indexer.index_file(request.clone()), FileOutcome::Indexed);
        assert_eq!(indexer.index_file(request), FileOutcome::Skipped(SkipReason::Unchanged));
        assert_eq!(indexer.repository("repo").unwrap().processed_files, 1);
    }

    #[test]
    fn test_older_commit_is_skipped_as_stale() {
        let indexer = indexer();
        let now = Utc::now();
        indexer.process_file("repo", "src/a.ts", COMMIT, now, "export const x = 1;\n", None);

        let older = FileRequest::new("repo", "src/a.ts", "fedcba9876", now - Duration::hours(1), "export const y = 2;\n");
        assert_eq!(indexer.index_file(older), FileOutcome::Skipped(SkipReason::Stale));
        assert_eq!(stored(&indexer, "src/a.ts").unwrap().exports[0].name, "x");
    }

    #[test]
    fn test_changed_content_replaces_record() {
        let indexer = indexer();
        let now = Utc::now();
        indexer.process_file("repo", "src/a.ts", COMMIT, now, "export const x = 1;\nexport const z = 3;\n", None);
        indexer.process_file("repo", "src/a.ts", "fedcba9876", now, "export const y = 2;\n", None);

        let record = stored(&indexer, "src/a.ts").unwrap();
        let names: Vec<_> = record.exports.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["y"]);
        assert_eq!(record.last_commit_id, "fedcba9876");
    }

    #[test]
    fn test_lock_contention_is_a_skip() {
        let indexer = indexer();
        indexer.lock().acquire(&LockKey::new("repo", "src/a.ts"), None).unwrap();

        let request = FileRequest::new("repo", "src/a.ts", COMMIT, Utc::now(), "export const x = 1;\n");
        assert_eq!(indexer.index_file(request), FileOutcome::Skipped(SkipReason::LockHeld));
        assert!(stored(&indexer, "src/a.ts").is_none());
    }

    #[test]
    fn test_short_commit_id_fails() {
        let indexer = indexer();
        let request = FileRequest::new("repo", "src/a.ts", "abc", Utc::now(), "export const x = 1;\n");

        assert!(matches!(indexer.index_file(request), FileOutcome::Failed(_)));
        assert!(!indexer.lock().is_locked(&LockKey::new("repo", "src/a.ts")).unwrap());
    }

    #[test]
    fn test_supplied_symbols_skip_parsing() {
        let indexer = indexer();
        let request = FileRequest::new("repo", "src/a.ts", COMMIT, Utc::now(), "not even typescript {{{")
            .with_symbols(Vec::new(), Vec::new());

        assert_eq!(indexer.index_file(request), FileOutcome::Indexed);
        let record = stored(&indexer, "src/a.ts").unwrap();
        assert!(record.exports.is_empty());
        assert!(record.parse_errors.is_empty());
    }

    #[test]
    fn test_unknown_language_is_still_recorded() {
        let indexer = indexer();
        assert!(indexer.process_file("repo", "README.md", COMMIT, Utc::now(), "# hi\n", None));

        let record = stored(&indexer, "README.md").unwrap();
        assert_eq!(record.language, Language::Unknown);
        assert_eq!(record.parse_errors.len(), 1);
    }

    #[test]
    fn test_fingerprint_uses_raw_bytes() {
        let indexer = indexer();
        let bytes = b"export const name = 'caf\xe9';\n".to_vec();
        let request = FileRequest::new("repo", "src/latin1.ts", COMMIT, Utc::now(), bytes.clone());

        assert_eq!(indexer.index_file(request), FileOutcome::Indexed);
        let record = stored(&indexer, "src/latin1.ts").unwrap();
        assert_eq!(record.content_fingerprint, crate::vcs::hash_blob(&bytes).unwrap().to_string());
        assert_eq!(record.exports[0].name, "name");

        // Another invalid byte decodes to the same text but is new content
        let other = b"export const name = 'caf\xff';\n".to_vec();
        let request = FileRequest::new("repo", "src/latin1.ts", "fedcba9876", Utc::now(), other);
        assert_eq!(indexer.index_file(request), FileOutcome::Indexed);
    }

    #[test]
    fn test_delete_file() {
        let indexer = indexer();
        indexer.process_file("repo", "src/a.ts", COMMIT, Utc::now(), "export const x = 1;\n", None);

        assert!(indexer.delete_file("repo", "src/a.ts").unwrap());
        assert!(!indexer.delete_file("repo", "src/a.ts").unwrap());
        assert!(stored(&indexer, "src/a.ts").is_none());
    }

    #[test]
    fn test_update_repository_requires_row() {
        let indexer = indexer();
        assert!(matches!(
            indexer.update_repository("missing", |m| m.set_status(RepositoryStatus::Processing)),
            Err(IndexError::RepositoryNotFound { .. })
        ));

        indexer
            .save_repository(&RepositoryMetadata::new("repo", "demo", "file:///demo"))
            .unwrap();
        let updated = indexer
            .update_repository("repo", |m| m.set_status(RepositoryStatus::Processing))
            .unwrap();
        assert_eq!(updated.status, RepositoryStatus::Processing);
        assert_eq!(indexer.repository("repo").unwrap().status, RepositoryStatus::Processing);
    }
}
