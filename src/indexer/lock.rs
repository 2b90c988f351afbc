// Per-file mutual exclusion through the shared document store

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::index::file_key;
use crate::index::store::{Collection, DocumentStore, TxnDecision};

pub const DEFAULT_LOCK_TTL_SECS: i64 = 300;

static NEXT_SCOPE: AtomicU64 = AtomicU64::new(0);

/// Lock scope: one file of one repository, independent of commit
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockKey {
    pub repository_id: String,
    pub file_path: String,
}

impl LockKey {
    pub fn new(repository_id: &str, file_path: &str) -> Self {
        Self {
            repository_id: repository_id.to_string(),
            file_path: file_path.to_string(),
        }
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&file_key(&self.repository_id, &self.file_path))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockStatus {
    Active,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileLockRecord {
    pub lock_key: String,
    pub repository_id: String,
    pub file_path: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: LockStatus,
    pub holder: String,
}

impl FileLockRecord {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Parse a stored lock; unreadable documents count as expired so they can be reclaimed
fn live_lock(doc: Option<&Value>, now: DateTime<Utc>) -> Option<FileLockRecord> {
    let doc = doc?;
    match serde_json::from_value::<FileLockRecord>(doc.clone()) {
        Ok(record) if !record.is_expired(now) => Some(record),
        Ok(_) => None,
        Err(e) => {
            warn!("Treating unreadable lock document as expired: {}", e);
            None
        }
    }
}

/// TTL lock whose only coordination point is the document store, so it holds
/// across processes sharing that store.
#[derive(Clone)]
pub struct DistributedLock {
    store: Arc<dyn DocumentStore>,
    holder: String,
    default_ttl: Duration,
}

impl DistributedLock {
    pub fn new(store: Arc<dyn DocumentStore>, default_ttl: Duration) -> Self {
        let holder = format!(
            "{}-{}-{}",
            std::process::id(),
            Utc::now().timestamp_nanos_opt().unwrap_or_default(),
            NEXT_SCOPE.fetch_add(1, Ordering::Relaxed)
        );
        Self {
            store,
            holder,
            default_ttl,
        }
    }

    /// Take the lock if nobody holds an unexpired one
    pub fn acquire(&self, key: &LockKey, ttl: Option<Duration>) -> Result<bool, StoreError> {
        self.acquire_as(key, ttl, &self.holder)
    }

    fn acquire_as(&self, key: &LockKey, ttl: Option<Duration>, holder: &str) -> Result<bool, StoreError> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let lock_key = key.to_string();

        let acquired = self.store.transact(Collection::FileLocks, &lock_key, &mut |current| {
            let now = Utc::now();
            if live_lock(current, now).is_some() {
                return TxnDecision::Abort;
            }
            let record = FileLockRecord {
                lock_key: lock_key.clone(),
                repository_id: key.repository_id.clone(),
                file_path: key.file_path.clone(),
                acquired_at: now,
                expires_at: now + ttl,
                status: LockStatus::Active,
                holder: holder.to_string(),
            };
            match serde_json::to_value(&record) {
                Ok(doc) => TxnDecision::Write(doc),
                Err(_) => TxnDecision::Abort,
            }
        })?;

        debug!("Lock {} {}", lock_key, if acquired { "acquired" } else { "held elsewhere" });
        Ok(acquired)
    }

    /// Drop the lock if this instance still holds it. A lock that expired and
    /// was taken over by someone else is left alone.
    pub fn release(&self, key: &LockKey) -> Result<bool, StoreError> {
        self.release_as(key, &self.holder)
    }

    fn release_as(&self, key: &LockKey, holder: &str) -> Result<bool, StoreError> {
        let lock_key = key.to_string();
        let released = self.store.transact(Collection::FileLocks, &lock_key, &mut |current| {
            let doc = match current {
                Some(doc) => doc,
                None => return TxnDecision::Abort,
            };
            match serde_json::from_value::<FileLockRecord>(doc.clone()) {
                Ok(record) if record.holder != holder => TxnDecision::Abort,
                _ => TxnDecision::Delete,
            }
        })?;

        if !released {
            debug!("Lock {} not held by {}, left in place", lock_key, holder);
        }
        Ok(released)
    }

    /// True if an unexpired lock exists; an expired one is removed on sight
    pub fn is_locked(&self, key: &LockKey) -> Result<bool, StoreError> {
        let mut locked = false;
        self.store.transact(Collection::FileLocks, &key.to_string(), &mut |current| {
            if current.is_none() {
                return TxnDecision::Abort;
            }
            locked = live_lock(current, Utc::now()).is_some();
            if locked {
                TxnDecision::Abort
            } else {
                TxnDecision::Delete
            }
        })?;
        Ok(locked)
    }

    /// Push the expiry of a live lock to now + `extra`
    pub fn extend(&self, key: &LockKey, extra: Duration) -> Result<bool, StoreError> {
        self.store.transact(Collection::FileLocks, &key.to_string(), &mut |current| {
            let now = Utc::now();
            match live_lock(current, now) {
                Some(mut record) => {
                    record.expires_at = now + extra;
                    match serde_json::to_value(&record) {
                        Ok(doc) => TxnDecision::Write(doc),
                        Err(_) => TxnDecision::Abort,
                    }
                }
                None => TxnDecision::Abort,
            }
        })
    }

    /// Run `f` while holding the lock. Returns `Ok(None)` without running `f`
    /// when the lock is held elsewhere. The lock is released on every exit
    /// path, including a panic inside `f`.
    pub fn with_lock<T>(
        &self,
        key: &LockKey,
        ttl: Option<Duration>,
        f: impl FnOnce() -> T,
    ) -> Result<Option<T>, StoreError> {
        // Clones share `holder`, so each scope gets its own token
        let scope = format!("{}#{}", self.holder, NEXT_SCOPE.fetch_add(1, Ordering::Relaxed));
        if !self.acquire_as(key, ttl, &scope)? {
            return Ok(None);
        }
        let _guard = LockGuard { lock: self, key, scope };
        Ok(Some(f()))
    }
}

struct LockGuard<'a> {
    lock: &'a DistributedLock,
    key: &'a LockKey,
    scope: String,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.lock.release_as(self.key, &self.scope) {
            // Left to expire through its TTL
            warn!("Failed to release lock {}: {}", self.key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::store::{DocumentStoreExt, MemoryStore};

    fn lock() -> (Arc<MemoryStore>, DistributedLock) {
        let store = Arc::new(MemoryStore::new());
        let lock = DistributedLock::new(store.clone(), Duration::seconds(DEFAULT_LOCK_TTL_SECS));
        (store, lock)
    }

    #[test]
    fn test_acquire_is_exclusive_until_release() {
        let (_, lock) = lock();
        let key = LockKey::new("repo", "src/a.ts");

        assert!(lock.acquire(&key, None).unwrap());
        assert!(!lock.acquire(&key, None).unwrap());
        assert!(lock.is_locked(&key).unwrap());

        assert!(lock.release(&key).unwrap());
        assert!(!lock.is_locked(&key).unwrap());
        assert!(lock.acquire(&key, None).unwrap());
    }

    #[test]
    fn test_keys_are_per_file() {
        let (_, lock) = lock();
        assert!(lock.acquire(&LockKey::new("repo", "src/a.ts"), None).unwrap());
        assert!(lock.acquire(&LockKey::new("repo", "src/b.ts"), None).unwrap());
        assert!(lock.acquire(&LockKey::new("other", "src/a.ts"), None).unwrap());
    }

    #[test]
    fn test_expired_lock_is_reclaimed() {
        let (store, lock) = lock();
        let key = LockKey::new("repo", "src/a.ts");

        assert!(lock.acquire(&key, Some(Duration::seconds(-1))).unwrap());
        assert!(lock.acquire(&key, None).unwrap());

        let record: FileLockRecord = store.get_as(Collection::FileLocks, &key.to_string()).unwrap().unwrap();
        assert!(record.expires_at > Utc::now());
    }

    #[test]
    fn test_is_locked_removes_expired_record() {
        let (store, lock) = lock();
        let key = LockKey::new("repo", "src/a.ts");

        lock.acquire(&key, Some(Duration::seconds(-1))).unwrap();
        assert!(!lock.is_locked(&key).unwrap());
        assert_eq!(store.len(Collection::FileLocks), 0);
    }

    #[test]
    fn test_corrupt_lock_document_is_reclaimable() {
        let (store, lock) = lock();
        let key = LockKey::new("repo", "src/a.ts");
        store
            .set(Collection::FileLocks, &key.to_string(), serde_json::json!({"garbage": true}))
            .unwrap();

        assert!(lock.acquire(&key, None).unwrap());
    }

    #[test]
    fn test_extend_only_live_locks() {
        let (store, lock) = lock();
        let key = LockKey::new("repo", "src/a.ts");

        assert!(!lock.extend(&key, Duration::seconds(60)).unwrap());

        lock.acquire(&key, Some(Duration::seconds(5))).unwrap();
        assert!(lock.extend(&key, Duration::seconds(600)).unwrap());
        let record: FileLockRecord = store.get_as(Collection::FileLocks, &key.to_string()).unwrap().unwrap();
        assert!(record.expires_at > Utc::now() + Duration::seconds(500));
    }

    #[test]
    fn test_with_lock_releases_after_callback() {
        let (_, lock) = lock();
        let key = LockKey::new("repo", "src/a.ts");

        let value = lock.with_lock(&key, None, || 42).unwrap();
        assert_eq!(value, Some(42));
        assert!(!lock.is_locked(&key).unwrap());
    }

    #[test]
    fn test_with_lock_skips_when_contended() {
        let (_, lock) = lock();
        let key = LockKey::new("repo", "src/a.ts");
        lock.acquire(&key, None).unwrap();

        let mut ran = false;
        let value = lock.with_lock(&key, None, || ran = true).unwrap();
        assert!(value.is_none());
        assert!(!ran);
        assert!(lock.is_locked(&key).unwrap());
    }

    #[test]
    fn test_release_leaves_a_taken_over_lock() {
        let (store, first) = lock();
        let second = DistributedLock::new(store.clone(), Duration::seconds(DEFAULT_LOCK_TTL_SECS));
        let key = LockKey::new("repo", "src/a.ts");

        assert!(first.acquire(&key, Some(Duration::seconds(-1))).unwrap());
        assert!(second.acquire(&key, None).unwrap());

        assert!(!first.release(&key).unwrap());
        assert!(second.is_locked(&key).unwrap());
        assert!(second.release(&key).unwrap());
    }

    #[test]
    fn test_with_lock_scope_cannot_release_a_successor() {
        let (_, lock) = lock();
        let key = LockKey::new("repo", "src/a.ts");
        let clone = lock.clone();

        let value = lock
            .with_lock(&key, Some(Duration::seconds(-1)), || {
                // Expired while running; a clone takes the file over
                assert!(clone.acquire(&key, None).unwrap());
            })
            .unwrap();
        assert!(value.is_some());
        assert!(lock.is_locked(&key).unwrap());
    }

    #[test]
    fn test_with_lock_releases_on_panic() {
        let (_, lock) = lock();
        let key = LockKey::new("repo", "src/a.ts");

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = lock.with_lock(&key, None, || panic!("boom"));
        }));
        assert!(result.is_err());
        assert!(!lock.is_locked(&key).unwrap());
    }
}
