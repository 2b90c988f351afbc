// Incremental indexing of the files one commit touched

use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{FileIndexer, FileOutcome, FileRequest, RunReport};
use crate::config::Config;
use crate::error::{IndexError, Result};
use crate::index::check_repository_id;
use crate::index::metadata::RepositoryStatus;
use crate::vcs::{ChangeKind, CommitInfo, FileChange, GitRepository};

/// A changed file with its content at the commit, read up front so the
/// repository handle never crosses an await point. Content is only read
/// for allowed paths; a blob that cannot be read fails just that file.
struct ChangedFile {
    change: FileChange,
    allowed: bool,
    content: std::result::Result<Option<Vec<u8>>, String>,
}

pub struct CommitAnalyzer {
    indexer: FileIndexer,
    config: Config,
}

impl CommitAnalyzer {
    pub fn new(indexer: FileIndexer, config: Config) -> Self {
        Self { indexer, config }
    }

    /// Index the files changed by `revision` in the working copy at `path`.
    /// The repository must have been registered by a scan first.
    pub async fn process_commit(&self, repository_id: &str, path: &Path, revision: &str) -> Result<RunReport> {
        // Fails before anything is touched if the repository is unknown
        check_repository_id(repository_id)?;
        self.indexer.repository(repository_id)?;

        let (commit, changed) = match read_commit(path.to_path_buf(), revision.to_string(), self.config.clone()).await {
            Ok(read) => read,
            Err(e) => {
                let message = e.to_string();
                if let Err(store_err) = self.indexer.update_repository(repository_id, |m| m.fail(message.clone())) {
                    warn!("Could not record failure for {}: {}", repository_id, store_err);
                }
                return Err(e);
            }
        };

        self.indexer
            .update_repository(repository_id, |m| m.set_status(RepositoryStatus::Processing))?;
        info!(
            repository = %repository_id,
            commit = %commit.id,
            summary = %commit.summary,
            changed = changed.len(),
            "Processing commit"
        );

        let mut report = RunReport::default();
        let mut to_index = Vec::new();

        for file in changed {
            let ChangedFile { change, allowed, content } = file;
            if !allowed {
                debug!("Outside allowed roots, skipping {}", change.path);
                report.skipped += 1;
                continue;
            }

            match (change.kind, content) {
                (ChangeKind::Deleted, _) => {
                    report.skipped += 1;
                    if self.config.indexing.remove_deleted {
                        if let Err(e) = self.indexer.delete_file(repository_id, &change.path) {
                            warn!("Could not remove record for {}: {}", change.path, e);
                        }
                    }
                    report.deleted.push(change.path);
                }
                (_, Ok(Some(bytes))) => to_index.push((change.path, bytes)),
                (_, Ok(None)) => {
                    // Submodules and other non-blob entries
                    debug!("No content for {}, skipping", change.path);
                    report.skipped += 1;
                }
                (_, Err(e)) => {
                    warn!("Could not read {} at {}: {}", change.path, commit.id, e);
                    report.record(&FileOutcome::Failed(e));
                }
            }
        }

        let limit = self.config.indexing.max_concurrent_files.max(1);
        let outcomes: Vec<FileOutcome> = stream::iter(to_index)
            .map(|(file_path, bytes)| {
                let indexer = self.indexer.clone();
                let repository_id = repository_id.to_string();
                let commit = commit.clone();
                async move {
                    let task = tokio::task::spawn_blocking(move || {
                        indexer.index_file(FileRequest::new(
                            &repository_id,
                            &file_path,
                            &commit.id,
                            commit.timestamp,
                            bytes,
                        ))
                    });
                    match task.await {
                        Ok(outcome) => outcome,
                        Err(e) => FileOutcome::Failed(IndexError::from(e).to_string()),
                    }
                }
            })
            .buffer_unordered(limit)
            .collect()
            .await;

        for outcome in &outcomes {
            report.record(outcome);
        }

        self.indexer
            .update_repository(repository_id, |m| m.set_status(RepositoryStatus::Completed))?;
        info!(
            repository = %repository_id,
            commit = %commit.id,
            processed = report.processed,
            skipped = report.skipped,
            failed = report.failed,
            "Commit processed"
        );
        Ok(report)
    }
}

async fn read_commit(path: PathBuf, revision: String, config: Config) -> Result<(CommitInfo, Vec<ChangedFile>)> {
    tokio::task::spawn_blocking(move || {
        let repo = GitRepository::open(&path)?;
        let commit = repo.resolve(&revision)?;
        let changed = repo
            .changed_files(&commit.id)?
            .into_iter()
            .map(|change| {
                let allowed = config.is_allowed_path(&change.path);
                let content = if !allowed || change.kind == ChangeKind::Deleted {
                    Ok(None)
                } else {
                    repo.file_at(&commit.id, &change.path).map_err(|e| e.to_string())
                };
                ChangedFile { change, allowed, content }
            })
            .collect::<Vec<_>>();
        Ok((commit, changed))
    })
    .await?
}
