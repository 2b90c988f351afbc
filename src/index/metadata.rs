// Repository-level indexing state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a repository's index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Paused,
}

impl RepositoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepositoryStatus::Pending => "pending",
            RepositoryStatus::Processing => "processing",
            RepositoryStatus::Completed => "completed",
            RepositoryStatus::Failed => "failed",
            RepositoryStatus::Paused => "paused",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryMetadata {
    pub repository_id: String,
    pub name: String,
    pub url: String,
    pub last_processed_commit: Option<String>,
    pub last_processed_commit_timestamp: Option<DateTime<Utc>>,
    pub total_files: u64,
    pub processed_files: u64,
    pub status: RepositoryStatus,
    pub last_updated: DateTime<Utc>,
    pub error_message: Option<String>,
}

impl RepositoryMetadata {
    pub fn new(repository_id: &str, name: &str, url: &str) -> Self {
        Self {
            repository_id: repository_id.to_string(),
            name: name.to_string(),
            url: url.to_string(),
            last_processed_commit: None,
            last_processed_commit_timestamp: None,
            total_files: 0,
            processed_files: 0,
            status: RepositoryStatus::Pending,
            last_updated: Utc::now(),
            error_message: None,
        }
    }

    pub fn set_status(&mut self, status: RepositoryStatus) {
        self.status = status;
        if status != RepositoryStatus::Failed {
            self.error_message = None;
        }
        self.last_updated = Utc::now();
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = RepositoryStatus::Failed;
        self.error_message = Some(message.into());
        self.last_updated = Utc::now();
    }

    /// Count one indexed file. The last-processed commit only moves forward
    /// in time, so a late delivery of an old commit never rewinds it.
    pub fn record_file(&mut self, commit_id: &str, commit_timestamp: DateTime<Utc>) {
        self.processed_files += 1;
        let newer = match self.last_processed_commit_timestamp {
            Some(current) => commit_timestamp >= current,
            None => true,
        };
        if newer {
            self.last_processed_commit = Some(commit_id.to_string());
            self.last_processed_commit_timestamp = Some(commit_timestamp);
        }
        self.last_updated = Utc::now();
    }
}
