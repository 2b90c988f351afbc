use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use codeindex::config::{load_config, LoggingConfig};

mod cli;

#[derive(Parser)]
#[command(name = "codeindex")]
#[command(author = "Intent Project Team")]
#[command(version = "0.1.0")]
#[command(about = "Incremental export/import index for git repositories", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Enable verbose logging and output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a whole repository (local path or clone URL) at its current commit
    Index {
        /// Working copy path or remote URL
        target: String,

        /// Branch to clone for remote targets
        #[arg(short, long)]
        branch: Option<String>,

        /// Repository id (defaults to the last path segment)
        #[arg(long)]
        id: Option<String>,

        /// Project directory holding the config and store
        #[arg(short, long, default_value = ".")]
        project: String,
    },

    /// Index the files changed by one commit
    Commit {
        /// Working copy path
        path: String,

        /// Commit to process
        #[arg(default_value = "HEAD")]
        revision: String,

        /// Repository id (defaults to the last path segment)
        #[arg(long)]
        id: Option<String>,

        /// Project directory holding the config and store
        #[arg(short, long, default_value = ".")]
        project: String,
    },

    /// Index a single file under the project directory
    File {
        /// Repository id the file belongs to
        repository_id: String,

        /// File path relative to the project directory
        path: String,

        /// Commit id to record
        #[arg(short, long)]
        commit: String,

        /// Commit time, RFC 3339 (defaults to now)
        #[arg(short, long)]
        timestamp: Option<String>,

        /// Project directory
        #[arg(short, long, default_value = ".")]
        project: String,
    },

    /// Show the exports recorded for a file
    Exports {
        repository_id: String,

        /// Repository-relative file path
        file: String,

        /// Project directory
        #[arg(short, long, default_value = ".")]
        project: String,

        /// Output format: json, text
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Find files importing a symbol
    Importers {
        repository_id: String,

        /// Imported name
        symbol: String,

        /// Project directory
        #[arg(short, long, default_value = ".")]
        project: String,

        /// Output format: json, text
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show repository indexing status
    Status {
        repository_id: String,

        /// Project directory
        #[arg(short, long, default_value = ".")]
        project: String,
    },

    /// List supported languages
    Languages,
}

impl Commands {
    fn project(&self) -> &str {
        match self {
            Commands::Index { project, .. }
            | Commands::Commit { project, .. }
            | Commands::File { project, .. }
            | Commands::Exports { project, .. }
            | Commands::Importers { project, .. }
            | Commands::Status { project, .. } => project,
            Commands::Languages => ".",
        }
    }
}

fn init_logging(debug: bool, verbose: bool, logging: &LoggingConfig) {
    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        logging.level.as_str()
    };

    // RUST_LOG wins over flags and config
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if logging.format == "pretty" {
        builder.pretty().init();
    } else {
        builder.compact().init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.command.project());
    init_logging(cli.debug, cli.verbose, &config.logging);

    info!("codeindex v{} starting...", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Index {
            target,
            branch,
            id,
            project,
        } => {
            info!("Indexing repository: {}", target);
            cli::index::index_repository(target, branch, id, project).await?;
        }

        Commands::Commit {
            path,
            revision,
            id,
            project,
        } => {
            info!("Processing commit {} in {}", revision, path);
            cli::commit::process_commit(path, revision, id, project).await?;
        }

        Commands::File {
            repository_id,
            path,
            commit,
            timestamp,
            project,
        } => {
            cli::file::index_single_file(repository_id, path, commit, timestamp, project).await?;
        }

        Commands::Exports {
            repository_id,
            file,
            project,
            format,
        } => {
            cli::query::show_exports(repository_id, file, project, format).await?;
        }

        Commands::Importers {
            repository_id,
            symbol,
            project,
            format,
        } => {
            cli::query::show_importers(repository_id, symbol, project, format).await?;
        }

        Commands::Status { repository_id, project } => {
            cli::status::show_status(repository_id, project, cli.verbose).await?;
        }

        Commands::Languages => {
            cli::languages::list_languages();
        }
    }

    Ok(())
}
