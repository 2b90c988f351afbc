// Query execution engine

use std::sync::Arc;

use crate::error::Result;
use crate::index::metadata::RepositoryMetadata;
use crate::index::store::{Collection, DocumentStore, DocumentStoreExt, Filter};
use crate::index::{file_key, ExportSymbol, FileIndexRecord};

/// A file importing a given symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImporterMatch {
    pub file_path: String,
    pub source: String,
    pub line_number: usize,
}

/// Query engine over stored file records. Every query is a scan of one
/// repository's records; there is no secondary index.
pub struct QueryEngine {
    store: Arc<dyn DocumentStore>,
}

impl QueryEngine {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn repository(&self, repository_id: &str) -> Result<Option<RepositoryMetadata>> {
        Ok(self.store.get_as(Collection::Repositories, repository_id)?)
    }

    /// All file records of a repository, ordered by path
    pub fn files(&self, repository_id: &str) -> Result<Vec<FileIndexRecord>> {
        let filter = Filter::new().eq("repository_id", repository_id);
        let mut records: Vec<FileIndexRecord> = self.store.query_as(Collection::FileIndexes, &filter)?;
        records.sort_by(|a, b| a.file_path.cmp(&b.file_path));
        Ok(records)
    }

    pub fn file(&self, repository_id: &str, file_path: &str) -> Result<Option<FileIndexRecord>> {
        Ok(self
            .store
            .get_as(Collection::FileIndexes, &file_key(repository_id, file_path))?)
    }

    /// Exports of one file, or None if the file was never indexed
    pub fn exports_of(&self, repository_id: &str, file_path: &str) -> Result<Option<Vec<ExportSymbol>>> {
        Ok(self.file(repository_id, file_path)?.map(|record| record.exports))
    }

    /// Files with an import of `symbol`, by imported name
    pub fn importers_of(&self, repository_id: &str, symbol: &str) -> Result<Vec<ImporterMatch>> {
        let mut matches = Vec::new();
        for record in self.files(repository_id)? {
            for import in record.imports.iter().filter(|i| i.name == symbol) {
                matches.push(ImporterMatch {
                    file_path: record.file_path.clone(),
                    source: import.source.clone(),
                    line_number: import.line_number,
                });
            }
        }
        Ok(matches)
    }
}
