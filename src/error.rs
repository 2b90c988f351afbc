// Error types for the indexing engine

use thiserror::Error;

/// Result type for run-level indexing operations
pub type Result<T> = std::result::Result<T, IndexError>;

/// Errors raised by a document store backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt document {collection}/{key}: {message}")]
    Corrupt {
        collection: String,
        key: String,
        message: String,
    },

    #[error("Failed to prepare store at {path}: {message}")]
    Setup { path: String, message: String },
}

/// Errors that abort a whole scan or commit run
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Repository not found: {repository_id}")]
    RepositoryNotFound { repository_id: String },

    #[error("Working copy not found at path: {path}")]
    WorkingCopyNotFound { path: String },

    #[error("Commit not found: {revision}")]
    CommitNotFound { revision: String },

    #[error("Failed to clone {url}: {message}")]
    Clone { url: String, message: String },

    #[error("Invalid file index record: {0}")]
    InvalidRecord(String),

    #[error("Invalid repository id '{0}': must be non-empty and contain no ':'")]
    InvalidRepositoryId(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// A single declaration that could not be extracted
#[derive(Debug, Error)]
pub enum DeclarationError {
    #[error("line {line}: malformed {construct}")]
    Malformed { construct: String, line: usize },

    #[error("line {line}: {construct} has no name")]
    MissingName { construct: String, line: usize },

    #[error("line {line}: unbalanced braces in class {name}")]
    UnbalancedBody { name: String, line: usize },
}
