use anyhow::Result;
use tracing::info;

use super::{repository_id_for, Workspace};
use codeindex::{RepositoryScanner, ScanSource};

pub async fn index_repository(
    target: String,
    branch: Option<String>,
    id: Option<String>,
    project: String,
) -> Result<()> {
    let workspace = Workspace::open(&project)?;
    let repository_id = id.unwrap_or_else(|| repository_id_for(&target));
    let source = ScanSource::parse(&target, branch);

    println!("codeindex scan");
    println!("Repository: {} ({})", repository_id, target);
    println!("Store: {}", workspace.store.path().display());
    println!("Allowed roots: {}", workspace.config.indexing.allowed_roots.join(", "));

    info!("Indexing {} as {}", target, repository_id);
    let scanner = RepositoryScanner::new(workspace.indexer(), workspace.config.clone());
    let report = scanner.scan(&repository_id, source).await?;

    println!("\nIndexing complete!");
    println!("  Processed: {}", report.processed);
    println!("  Skipped:   {}", report.skipped);
    println!("  Failed:    {}", report.failed);

    Ok(())
}
