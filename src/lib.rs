//! Incremental code indexing for git repositories.
//!
//! Files are parsed into exported and imported symbols (tree-sitter first,
//! pattern matching as a fallback) and stored per repository in a document
//! store. A [`RepositoryScanner`] indexes a whole checkout; a
//! [`CommitAnalyzer`] re-indexes only what one commit touched. Writes to the
//! same file are serialized through a store-backed [`DistributedLock`].

pub mod config;
pub mod error;
pub mod index;
pub mod indexer;
pub mod query;
pub mod vcs;

pub use config::Config;
pub use error::{IndexError, Result, StoreError};
pub use index::db::SqliteStore;
pub use index::store::{DocumentStore, MemoryStore};
pub use index::{ExportSymbol, FileIndexRecord, ImportSymbol};
pub use indexer::commits::CommitAnalyzer;
pub use indexer::language::Language;
pub use indexer::lock::{DistributedLock, LockKey};
pub use indexer::parser::ParserTable;
pub use indexer::scanner::{RepositoryScanner, ScanSource};
pub use indexer::{FileIndexer, FileOutcome, FileRequest, RunReport};
pub use query::QueryEngine;
