// CLI command implementations

pub mod commit;
pub mod file;
pub mod index;
pub mod languages;
pub mod query;
pub mod status;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use codeindex::{Config, DocumentStore, FileIndexer, ParserTable, SqliteStore};

/// Configuration and store of one project directory
pub struct Workspace {
    pub root: PathBuf,
    pub config: Config,
    pub store: SqliteStore,
}

impl Workspace {
    pub fn open(project: &str) -> Result<Self> {
        let root = PathBuf::from(project);
        let config = Config::from_project_dir(&root);
        let db_path = config.store_path(&root);
        let store = SqliteStore::open(&db_path)
            .with_context(|| format!("Failed to open index store at {}", db_path.display()))?;

        Ok(Self { root, config, store })
    }

    pub fn shared_store(&self) -> Arc<dyn DocumentStore> {
        Arc::new(self.store.clone())
    }

    pub fn indexer(&self) -> FileIndexer {
        FileIndexer::new(self.shared_store(), Arc::new(ParserTable::new()), &self.config)
    }
}

/// Default repository id: the last path or URL segment, without `.git`
pub fn repository_id_for(target: &str) -> String {
    let resolved = Path::new(target)
        .canonicalize()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| target.to_string());

    let name = resolved
        .trim_end_matches(['/', '\\'])
        .rsplit(['/', '\\', ':'])
        .next()
        .unwrap_or("")
        .trim_end_matches(".git")
        .to_string();

    if name.is_empty() {
        "repository".to_string()
    } else {
        name
    }
}
