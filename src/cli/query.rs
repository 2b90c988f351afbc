use anyhow::Result;

use super::Workspace;
use codeindex::index::ExportSymbol;
use codeindex::QueryEngine;

pub async fn show_exports(repository_id: String, file: String, project: String, format: String) -> Result<()> {
    let workspace = Workspace::open(&project)?;
    let engine = QueryEngine::new(workspace.shared_store());

    let exports = match engine.exports_of(&repository_id, &file)? {
        Some(exports) => exports,
        None => {
            println!("{} has not been indexed in {}", file, repository_id);
            return Ok(());
        }
    };

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&exports)?),
        "text" => {
            println!("Found {} exports in {}:", exports.len(), file);
            for export in &exports {
                print_export(export, "  ");
            }
        }
        _ => anyhow::bail!("Unknown format: {}", format),
    }

    Ok(())
}

fn print_export(export: &ExportSymbol, indent: &str) {
    let signature = export
        .signature()
        .map(|s| {
            let params: Vec<String> = s
                .parameters
                .iter()
                .map(|p| format!("{}{}: {}", p.name, if p.required { "" } else { "?" }, p.type_))
                .collect();
            format!("({}) -> {}", params.join(", "), s.return_type)
        })
        .unwrap_or_default();

    println!(
        "{}{}:{} {} {}{}",
        indent,
        export.line_number,
        export.kind().as_str(),
        export.name,
        signature,
        if export.visibility == codeindex::index::Visibility::Private { " (private)" } else { "" }
    );

    if let Some(class) = export.class_detail() {
        let nested = format!("{}    ", indent);
        for member in class.constructors.iter().chain(&class.methods).chain(&class.properties) {
            print_export(member, &nested);
        }
    }
}

pub async fn show_importers(repository_id: String, symbol: String, project: String, format: String) -> Result<()> {
    let workspace = Workspace::open(&project)?;
    let engine = QueryEngine::new(workspace.shared_store());
    let importers = engine.importers_of(&repository_id, &symbol)?;

    if importers.is_empty() {
        println!("No files in {} import '{}'", repository_id, symbol);
        return Ok(());
    }

    match format.as_str() {
        "json" => {
            let rows: Vec<serde_json::Value> = importers
                .iter()
                .map(|m| {
                    serde_json::json!({
                        "file": m.file_path,
                        "source": m.source,
                        "line": m.line_number,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        "text" => {
            println!("Found {} importers of '{}':", importers.len(), symbol);
            for m in &importers {
                println!("  {}:{} from {}", m.file_path, m.line_number, m.source);
            }
        }
        _ => anyhow::bail!("Unknown format: {}", format),
    }

    Ok(())
}
