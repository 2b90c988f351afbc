// Full-repository scans for first-time indexing

use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use super::language::Language;
use super::{FileIndexer, FileOutcome, FileRequest, RunReport};
use crate::config::Config;
use crate::error::{IndexError, Result};
use crate::index::check_repository_id;
use crate::index::metadata::{RepositoryMetadata, RepositoryStatus};
use crate::vcs::{CommitInfo, GitRepository};

/// Where a scan reads its files from
#[derive(Debug, Clone)]
pub enum ScanSource {
    Local(PathBuf),
    Remote { url: String, branch: Option<String> },
}

impl ScanSource {
    /// A path that exists on disk is local; anything else is treated as a clone URL
    pub fn parse(target: &str, branch: Option<String>) -> Self {
        let path = Path::new(target);
        if path.exists() {
            ScanSource::Local(path.to_path_buf())
        } else {
            ScanSource::Remote {
                url: target.to_string(),
                branch,
            }
        }
    }

    fn url(&self) -> String {
        match self {
            ScanSource::Local(path) => path.display().to_string(),
            ScanSource::Remote { url, .. } => url.clone(),
        }
    }
}

pub struct RepositoryScanner {
    indexer: FileIndexer,
    config: Config,
}

impl RepositoryScanner {
    pub fn new(indexer: FileIndexer, config: Config) -> Self {
        Self { indexer, config }
    }

    /// Index every allow-listed file at the current commit. Per-file
    /// failures are counted; setup failures mark the repository failed.
    pub async fn scan(&self, repository_id: &str, source: ScanSource) -> Result<RunReport> {
        check_repository_id(repository_id)?;
        let url = source.url();
        let (repo, head) = match open_source(source).await {
            Ok(opened) => opened,
            Err(e) => {
                error!("Cannot open repository {}: {}", url, e);
                self.mark_failed(repository_id, &url, &e);
                return Err(e);
            }
        };

        match self.indexer.repository(repository_id) {
            Ok(_) => {}
            Err(IndexError::RepositoryNotFound { .. }) => {
                // First sighting is recorded as pending before any work starts
                self.indexer
                    .save_repository(&RepositoryMetadata::new(repository_id, &repo.name(), &url))?;
                debug!(repository = %repository_id, "Registered repository as pending");
            }
            Err(e) => return Err(e),
        }
        self.indexer
            .update_repository(repository_id, |m| m.set_status(RepositoryStatus::Processing))?;

        let files = match collect_files(repo.root(), &self.config) {
            Ok(files) => files,
            Err(e) => {
                self.mark_failed(repository_id, &url, &e);
                return Err(e);
            }
        };
        info!(repository = %repository_id, commit = %head.id, files = files.len(), "Scanning repository");

        let report = self
            .index_files(repository_id, repo.root(), &head, &files)
            .await;

        let total = files.len() as u64;
        self.indexer.update_repository(repository_id, |m| {
            m.total_files = total;
            m.set_status(RepositoryStatus::Completed);
        })?;

        info!(
            repository = %repository_id,
            processed = report.processed,
            skipped = report.skipped,
            failed = report.failed,
            "Scan finished"
        );
        Ok(report)
    }

    async fn index_files(&self, repository_id: &str, root: &Path, head: &CommitInfo, files: &[String]) -> RunReport {
        let limit = self.config.indexing.max_concurrent_files.max(1);

        let outcomes: Vec<FileOutcome> = stream::iter(files.iter().cloned())
            .map(|file_path| {
                let indexer = self.indexer.clone();
                let absolute = root.join(&file_path);
                let repository_id = repository_id.to_string();
                let head = head.clone();
                async move {
                    let task = tokio::task::spawn_blocking(move || {
                        let content = match std::fs::read(&absolute) {
                            Ok(bytes) => bytes,
                            Err(e) => return FileOutcome::Failed(format!("read {}: {}", absolute.display(), e)),
                        };
                        indexer.index_file(FileRequest::new(
                            &repository_id,
                            &file_path,
                            &head.id,
                            head.timestamp,
                            content,
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

        let mut report = RunReport::default();
        for outcome in &outcomes {
            report.record(outcome);
        }
        report
    }

    fn mark_failed(&self, repository_id: &str, url: &str, cause: &IndexError) {
        let mut metadata = match self.indexer.repository(repository_id) {
            Ok(existing) => existing,
            Err(_) => RepositoryMetadata::new(repository_id, repository_id, url),
        };
        metadata.fail(cause.to_string());
        if let Err(e) = self.indexer.save_repository(&metadata) {
            warn!("Could not record failure for {}: {}", repository_id, e);
        }
    }
}

async fn open_source(source: ScanSource) -> Result<(GitRepository, CommitInfo)> {
    tokio::task::spawn_blocking(move || {
        let repo = match source {
            ScanSource::Local(path) => GitRepository::open(path)?,
            ScanSource::Remote { url, branch } => GitRepository::clone_remote(&url, branch.as_deref())?,
        };
        let head = repo.head_commit()?;
        Ok((repo, head))
    })
    .await?
}

/// Repository-relative posix paths of every allow-listed file, sorted.
/// Without an explicit extension list only files of a supported language
/// are taken.
pub fn collect_files(root: &Path, config: &Config) -> Result<Vec<String>> {
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git");

    for entry in walker {
        let entry = entry.map_err(|e| IndexError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = match entry.path().strip_prefix(root) {
            Ok(relative) => relative,
            Err(_) => continue,
        };
        let posix = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let wanted = !config.indexing.extensions.is_empty() || Language::detect(&posix) != Language::Unknown;
        if wanted && config.is_allowed_path(&posix) {
            files.push(posix);
        }
    }

    files.sort();
    Ok(files)
}
