// Skip checks run before a file is parsed

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::index::store::{Collection, DocumentStore, DocumentStoreExt};
use crate::index::{file_key, FileIndexRecord};
use crate::vcs::hash_blob;

/// Content identity of a file: the git blob id, so a committed file's
/// fingerprint matches what git itself reports. Falls back to blake3.
pub fn fingerprint(content: &[u8]) -> String {
    match hash_blob(content) {
        Ok(oid) => oid.to_string(),
        Err(e) => {
            warn!("Blob id unavailable ({}), hashing with blake3", e);
            blake3::hash(content).to_hex().to_string()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Stored fingerprint equals the incoming one
    Unchanged,
    /// Incoming commit is older than the one already indexed
    Stale,
    /// Another worker holds the file lock; retry later
    LockHeld,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Unchanged => "unchanged",
            SkipReason::Stale => "stale",
            SkipReason::LockHeld => "lock held",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DedupGate {
    pub content_check: bool,
    pub timestamp_check: bool,
}

impl Default for DedupGate {
    fn default() -> Self {
        Self {
            content_check: true,
            timestamp_check: true,
        }
    }
}

impl DedupGate {
    pub fn new(content_check: bool, timestamp_check: bool) -> Self {
        Self {
            content_check,
            timestamp_check,
        }
    }

    /// Timestamp check; an equal timestamp is not stale
    pub fn check_timestamp(&self, stored: Option<&FileIndexRecord>, incoming: DateTime<Utc>) -> Option<SkipReason> {
        if !self.timestamp_check {
            return None;
        }
        let stored = stored?;
        (incoming < stored.last_commit_timestamp).then_some(SkipReason::Stale)
    }

    pub fn check_content(&self, stored: Option<&FileIndexRecord>, fingerprint: &str) -> Option<SkipReason> {
        if !self.content_check {
            return None;
        }
        let stored = stored?;
        (stored.content_fingerprint == fingerprint).then_some(SkipReason::Unchanged)
    }

    /// Load the current record for the gate. Read failures and unreadable
    /// records let the file through.
    pub fn stored_record(&self, store: &dyn DocumentStore, repository_id: &str, file_path: &str) -> Option<FileIndexRecord> {
        if !self.content_check && !self.timestamp_check {
            return None;
        }
        match store.get_as::<FileIndexRecord>(Collection::FileIndexes, &file_key(repository_id, file_path)) {
            Ok(record) => record,
            Err(e) => {
                debug!("Dedup lookup failed for {}, not skipping: {}", file_path, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::store::MemoryStore;
    use crate::indexer::language::Language;
    use chrono::Duration;
    use proptest::prelude::*;

    fn record(fingerprint: &str, timestamp: DateTime<Utc>) -> FileIndexRecord {
        FileIndexRecord {
            repository_id: "repo".to_string(),
            file_path: "src/a.ts".to_string(),
            content_fingerprint: fingerprint.to_string(),
            last_commit_id: "abcdef1234".to_string(),
            last_commit_timestamp: timestamp,
            exports: Vec::new(),
            imports: Vec::new(),
            language: Language::TypeScript,
            parse_errors: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_fingerprint_matches_git_blob_id() {
        // `printf 'hello\n' | git hash-object --stdin`
        assert_eq!(fingerprint(b"hello\n"), "ce013625030ba8dba906f756967f9e9ca394464a");
    }

    #[test]
    fn test_timestamp_gate() {
        let gate = DedupGate::default();
        let now = Utc::now();
        let stored = record("abc1234", now);

        assert_eq!(gate.check_timestamp(Some(&stored), now - Duration::seconds(1)), Some(SkipReason::Stale));
        assert_eq!(gate.check_timestamp(Some(&stored), now), None);
        assert_eq!(gate.check_timestamp(Some(&stored), now + Duration::seconds(1)), None);
        assert_eq!(gate.check_timestamp(None, now), None);
    }

    #[test]
    fn test_content_gate() {
        let gate = DedupGate::default();
        let stored = record("abc1234", Utc::now());

        assert_eq!(gate.check_content(Some(&stored), "abc1234"), Some(SkipReason::Unchanged));
        assert_eq!(gate.check_content(Some(&stored), "def5678"), None);
    }

    #[test]
    fn test_disabled_checks_never_skip() {
        let gate = DedupGate::new(false, false);
        let now = Utc::now();
        let stored = record("abc1234", now);

        assert_eq!(gate.check_content(Some(&stored), "abc1234"), None);
        assert_eq!(gate.check_timestamp(Some(&stored), now - Duration::days(1)), None);
    }

    #[test]
    fn test_corrupt_record_fails_open() {
        let store = MemoryStore::new();
        store
            .set(Collection::FileIndexes, &file_key("repo", "src/a.ts"), serde_json::json!({"exports": 3}))
            .unwrap();

        assert!(DedupGate::default().stored_record(&store, "repo", "src/a.ts").is_none());
    }

    proptest! {
        #[test]
        fn prop_fingerprint_is_deterministic(content in proptest::collection::vec(any::<u8>(), 0..512)) {
            let first = fingerprint(&content);
            prop_assert_eq!(&first, &fingerprint(&content));
            prop_assert_eq!(first.len(), 40);
        }

        #[test]
        fn prop_distinct_content_distinct_fingerprint(a in "[a-z]{1,32}", b in "[a-z]{1,32}") {
            prop_assume!(a != b);
            prop_assert_ne!(fingerprint(a.as_bytes()), fingerprint(b.as_bytes()));
        }
    }
}
