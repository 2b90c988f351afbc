// Shared fixtures for the integration tests
#![allow(dead_code)]

use git2::{Commit, IndexAddOption, Oid, Repository, Signature, Time};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use codeindex::{Config, DocumentStore, FileIndexer, MemoryStore, ParserTable, SqliteStore};

/// A scratch git repository
pub struct Fixture {
    pub dir: TempDir,
    pub repo: Repository,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        Self { dir, repo }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, path: &str, content: &str) {
        let full = self.dir.path().join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, content).unwrap();
    }

    pub fn remove(&self, path: &str) {
        fs::remove_file(self.dir.path().join(path)).unwrap();
    }

    /// Stage everything, deletions included, and commit at `time` (unix seconds)
    pub fn commit(&self, message: &str, time: i64) -> String {
        let mut index = self.repo.index().unwrap();
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None).unwrap();
        index.update_all(["*"].iter(), None).unwrap();
        index.write().unwrap();

        let tree = self.repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::new("Fixture", "fixture@example.com", &Time::new(time, 0)).unwrap();
        let parents: Vec<Commit> = self
            .repo
            .head()
            .ok()
            .and_then(|h| h.peel_to_commit().ok())
            .into_iter()
            .collect();
        let parents: Vec<&Commit> = parents.iter().collect();
        let oid: Oid = self
            .repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap();
        oid.to_string()
    }
}

pub fn memory_indexer(config: &Config) -> (Arc<MemoryStore>, FileIndexer) {
    let store = Arc::new(MemoryStore::new());
    let shared: Arc<dyn DocumentStore> = store.clone();
    (store, FileIndexer::new(shared, Arc::new(ParserTable::new()), config))
}

pub fn sqlite_indexer(dir: &TempDir, config: &Config) -> (SqliteStore, FileIndexer) {
    let store = SqliteStore::open(dir.path().join("index.db")).unwrap();
    let shared: Arc<dyn DocumentStore> = Arc::new(store.clone());
    (store, FileIndexer::new(shared, Arc::new(ParserTable::new()), config))
}
