// Git access: commits, first-parent diffs and file contents

use chrono::{DateTime, TimeZone, Utc};
use git2::{build::RepoBuilder, Commit, Delta, ErrorCode, ObjectType, Oid, Repository};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

use crate::error::{IndexError, Result};

/// A resolved commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub id: String,
    /// Author time, in UTC
    pub timestamp: DateTime<Utc>,
    pub summary: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    /// Repository-relative posix path
    pub path: String,
    pub kind: ChangeKind,
}

pub struct GitRepository {
    repo: Repository,
    root: PathBuf,
    // Keeps a cloned checkout alive as long as the repository
    _checkout: Option<TempDir>,
}

impl GitRepository {
    /// Open the working copy at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(IndexError::WorkingCopyNotFound {
                path: path.display().to_string(),
            });
        }

        let repo = Repository::open(path)?;
        let root = repo
            .workdir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| path.to_path_buf());
        debug!("Opened git repository at {}", root.display());

        Ok(Self {
            repo,
            root,
            _checkout: None,
        })
    }

    /// Clone `url` into a temporary directory that lives as long as the result
    pub fn clone_remote(url: &str, branch: Option<&str>) -> Result<Self> {
        let checkout = TempDir::new()?;
        info!("Cloning {} into {}", url, checkout.path().display());

        let mut builder = RepoBuilder::new();
        if let Some(branch) = branch {
            builder.branch(branch);
        }
        let repo = builder.clone(url, checkout.path()).map_err(|e| IndexError::Clone {
            url: url.to_string(),
            message: e.message().to_string(),
        })?;

        Ok(Self {
            repo,
            root: checkout.path().to_path_buf(),
            _checkout: Some(checkout),
        })
    }

    /// Working tree root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Last path component of the working tree, used as a display name
    pub fn name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "repository".to_string())
    }

    pub fn head_commit(&self) -> Result<CommitInfo> {
        let commit = self.repo.head()?.peel_to_commit()?;
        Ok(commit_info(&commit))
    }

    /// Resolve any revision git understands (sha, branch, `HEAD~2`, ...)
    pub fn resolve(&self, revision: &str) -> Result<CommitInfo> {
        let commit = self.find_commit(revision)?;
        Ok(commit_info(&commit))
    }

    fn find_commit(&self, revision: &str) -> Result<Commit<'_>> {
        self.repo
            .revparse_single(revision)
            .and_then(|object| object.peel_to_commit())
            .map_err(|_| IndexError::CommitNotFound {
                revision: revision.to_string(),
            })
    }

    /// Files changed by `revision` relative to its first parent. A root
    /// commit reports every file as added. Renames come out as a delete of
    /// the old path plus an add of the new one.
    pub fn changed_files(&self, revision: &str) -> Result<Vec<FileChange>> {
        let commit = self.find_commit(revision)?;
        let tree = commit.tree()?;
        let parent_tree = match commit.parent_count() {
            0 => None,
            _ => Some(commit.parent(0)?.tree()?),
        };

        let diff = self
            .repo
            .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)?;

        let mut changes = Vec::new();
        for delta in diff.deltas() {
            let new_path = delta.new_file().path().map(posix_path);
            let old_path = delta.old_file().path().map(posix_path);

            match delta.status() {
                Delta::Added | Delta::Copied => {
                    if let Some(path) = new_path {
                        changes.push(FileChange {
                            path,
                            kind: ChangeKind::Added,
                        });
                    }
                }
                Delta::Modified | Delta::Typechange => {
                    if let Some(path) = new_path {
                        changes.push(FileChange {
                            path,
                            kind: ChangeKind::Modified,
                        });
                    }
                }
                Delta::Deleted => {
                    if let Some(path) = old_path {
                        changes.push(FileChange {
                            path,
                            kind: ChangeKind::Deleted,
                        });
                    }
                }
                Delta::Renamed => {
                    if let Some(path) = old_path {
                        changes.push(FileChange {
                            path,
                            kind: ChangeKind::Deleted,
                        });
                    }
                    if let Some(path) = new_path {
                        changes.push(FileChange {
                            path,
                            kind: ChangeKind::Added,
                        });
                    }
                }
                _ => {}
            }
        }

        Ok(changes)
    }

    /// Content of `path` as of `revision`, or None if the path does not exist there
    pub fn file_at(&self, revision: &str, path: &str) -> Result<Option<Vec<u8>>> {
        let commit = self.find_commit(revision)?;
        let entry = match commit.tree()?.get_path(Path::new(path)) {
            Ok(entry) => entry,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if entry.kind() != Some(ObjectType::Blob) {
            return Ok(None);
        }
        let blob = self.repo.find_blob(entry.id())?;
        Ok(Some(blob.content().to_vec()))
    }

    /// Blob id git stores for `path` at `revision`
    pub fn blob_id(&self, revision: &str, path: &str) -> Result<Option<String>> {
        let commit = self.find_commit(revision)?;
        match commit.tree()?.get_path(Path::new(path)) {
            Ok(entry) if entry.kind() == Some(ObjectType::Blob) => Ok(Some(entry.id().to_string())),
            Ok(_) => Ok(None),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Blob id of arbitrary content, without touching a repository
pub fn hash_blob(content: &[u8]) -> std::result::Result<Oid, git2::Error> {
    Oid::hash_object(ObjectType::Blob, content)
}

fn commit_info(commit: &Commit) -> CommitInfo {
    let seconds = commit.author().when().seconds();
    CommitInfo {
        id: commit.id().to_string(),
        timestamp: Utc.timestamp_opt(seconds, 0).single().unwrap_or_else(Utc::now),
        summary: commit.summary().unwrap_or("").to_string(),
    }
}

fn posix_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
