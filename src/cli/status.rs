use anyhow::Result;

use super::Workspace;
use codeindex::QueryEngine;

pub async fn show_status(repository_id: String, project: String, verbose: bool) -> Result<()> {
    let workspace = Workspace::open(&project)?;
    let engine = QueryEngine::new(workspace.shared_store());

    let metadata = match engine.repository(&repository_id)? {
        Some(metadata) => metadata,
        None => {
            println!("Repository {} is not indexed", repository_id);
            return Ok(());
        }
    };

    println!("Repository: {} ({})", metadata.name, metadata.repository_id);
    println!("  URL: {}", metadata.url);
    println!("  Status: {}", metadata.status.as_str());
    println!("  Files: {} processed / {} selected", metadata.processed_files, metadata.total_files);
    if let Some(commit) = &metadata.last_processed_commit {
        let when = metadata
            .last_processed_commit_timestamp
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        println!("  Last commit: {} {}", commit, when);
    }
    println!("  Updated: {}", metadata.last_updated.to_rfc3339());
    if let Some(error) = &metadata.error_message {
        println!("  Error: {}", error);
    }

    if verbose {
        let records = engine.files(&repository_id)?;
        let with_errors = records.iter().filter(|r| !r.parse_errors.is_empty()).count();

        let mut languages: Vec<(String, usize)> = Vec::new();
        for record in &records {
            let name = record.language.as_str().to_string();
            match languages.iter_mut().find(|(l, _)| *l == name) {
                Some((_, count)) => *count += 1,
                None => languages.push((name, 1)),
            }
        }
        languages.sort();

        println!("\nIndexed files: {}", records.len());
        println!("  With parse errors: {}", with_errors);
        for (language, count) in languages {
            println!("  {}: {} files", language, count);
        }

        println!("\nStore: {}", workspace.store.path().display());
        for (collection, count) in workspace.store.counts()? {
            println!("  {}: {} documents", collection, count);
        }
    }

    Ok(())
}
