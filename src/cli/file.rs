use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use super::Workspace;
use codeindex::{FileOutcome, FileRequest};

pub async fn index_single_file(
    repository_id: String,
    path: String,
    commit: String,
    timestamp: Option<String>,
    project: String,
) -> Result<()> {
    let workspace = Workspace::open(&project)?;

    let commit_timestamp = match timestamp {
        Some(raw) => DateTime::parse_from_rfc3339(&raw)
            .with_context(|| format!("Invalid RFC 3339 timestamp: {}", raw))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };

    let absolute = workspace.root.join(&path);
    let content = std::fs::read(&absolute).with_context(|| format!("Failed to read {}", absolute.display()))?;

    let indexer = workspace.indexer();
    let request = FileRequest::new(&repository_id, &path, &commit, commit_timestamp, content);
    let outcome = tokio::task::spawn_blocking(move || indexer.index_file(request)).await?;

    match outcome {
        FileOutcome::Indexed => println!("Indexed {}", path),
        FileOutcome::Skipped(reason) => println!("Skipped {} ({})", path, reason.as_str()),
        FileOutcome::Failed(message) => anyhow::bail!("Failed to index {}: {}", path, message),
    }

    Ok(())
}
