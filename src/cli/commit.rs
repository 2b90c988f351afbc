use anyhow::Result;
use std::path::PathBuf;

use super::{repository_id_for, Workspace};
use codeindex::CommitAnalyzer;

pub async fn process_commit(path: String, revision: String, id: Option<String>, project: String) -> Result<()> {
    let workspace = Workspace::open(&project)?;
    let repository_id = id.unwrap_or_else(|| repository_id_for(&path));

    let analyzer = CommitAnalyzer::new(workspace.indexer(), workspace.config.clone());
    let report = analyzer
        .process_commit(&repository_id, &PathBuf::from(&path), &revision)
        .await?;

    println!("Commit {} of {}", revision, repository_id);
    println!("  Processed: {}", report.processed);
    println!("  Skipped:   {}", report.skipped);
    println!("  Failed:    {}", report.failed);
    if !report.deleted.is_empty() {
        let action = if workspace.config.indexing.remove_deleted {
            "removed from the index"
        } else {
            "left in the index"
        };
        println!("  Deleted ({}):", action);
        for path in &report.deleted {
            println!("    - {}", path);
        }
    }

    Ok(())
}
