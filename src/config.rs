// Configuration management for codeindex

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = ".codeindex.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub indexing: IndexingConfig,
    pub lock: LockConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    /// Top-level directories whose files are indexed; root-level files always are
    pub allowed_roots: Vec<String>,
    /// Extensions to index (without the dot); empty means every file
    pub extensions: Vec<String>,
    pub content_check: bool,
    pub timestamp_check: bool,
    pub max_concurrent_files: usize,
    /// Hard-delete records of files removed by a commit
    pub remove_deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    pub ttl_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: ".codeindex.db".to_string(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            allowed_roots: vec!["src".to_string(), "app".to_string(), "packages".to_string()],
            extensions: vec![],
            content_check: true,
            timestamp_check: true,
            max_concurrent_files: 10,
            remove_deleted: false,
        }
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self { ttl_seconds: 300 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "compact".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from project directory
    /// Looks for .codeindex.toml in the project root
    pub fn from_project_dir<P: AsRef<Path>>(project_dir: P) -> Self {
        let config_path = project_dir.as_ref().join(CONFIG_FILE);

        match Self::from_file(&config_path) {
            Ok(config) => {
                tracing::info!("Loaded configuration from {}", config_path.display());
                config
            }
            Err(e) => {
                tracing::debug!("Could not load config from {}: {}", config_path.display(), e);
                tracing::info!("Using default configuration");
                Self::default()
            }
        }
    }

    /// Store location, relative paths resolved against the project directory
    pub fn store_path(&self, project_dir: &Path) -> PathBuf {
        let path = Path::new(&self.store.path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            project_dir.join(path)
        }
    }

    /// Allow-list filter over repository-relative posix paths: the first
    /// component must be an allowed root, or the file sits at the root.
    pub fn is_allowed_path(&self, file_path: &str) -> bool {
        let mut components = file_path.split('/').filter(|c| !c.is_empty() && *c != ".");
        let first = match components.next() {
            Some(first) => first,
            None => return false,
        };
        let root_level = components.next().is_none();

        if !root_level && !self.indexing.allowed_roots.iter().any(|root| root == first) {
            return false;
        }

        if self.indexing.extensions.is_empty() {
            return true;
        }
        Path::new(file_path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| {
                self.indexing
                    .extensions
                    .iter()
                    .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }

    pub fn lock_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.lock.ttl_seconds as i64)
    }

    /// Validate configuration values
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.store.path.trim().is_empty() {
            return Err(anyhow::anyhow!("Store path cannot be empty"));
        }

        // Validate indexing settings
        if self.indexing.allowed_roots.iter().any(|r| r.trim().is_empty() || r.contains('/')) {
            return Err(anyhow::anyhow!("Allowed roots must be non-empty top-level directory names"));
        }
        if self.indexing.max_concurrent_files == 0 {
            return Err(anyhow::anyhow!("Max concurrent files must be greater than 0"));
        }

        // Validate lock settings
        if self.lock.ttl_seconds == 0 {
            return Err(anyhow::anyhow!("Lock TTL must be greater than 0"));
        }
        if self.lock.ttl_seconds > i64::MAX as u64 / 1000 {
            return Err(anyhow::anyhow!("Lock TTL is too large: {}", self.lock.ttl_seconds));
        }

        // Validate logging
        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(anyhow::anyhow!("Invalid log level: {}", self.logging.level));
        }
        let valid_formats = ["compact", "pretty"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(anyhow::anyhow!("Invalid log format: {}", self.logging.format));
        }

        Ok(())
    }
}

/// Load configuration for a project
pub fn load_config(project_dir: &str) -> Config {
    Config::from_project_dir(project_dir)
}
