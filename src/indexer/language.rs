// Extension-based language detection

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    TypeScript,
    JavaScript,
    Python,
    Unknown,
}

const TYPESCRIPT_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "cts"];
const JAVASCRIPT_EXTENSIONS: &[&str] = &["js", "jsx", "mjs", "cjs"];
const PYTHON_EXTENSIONS: &[&str] = &["py", "pyi"];

impl Language {
    /// Map a path to its language by extension only
    pub fn detect(path: &str) -> Self {
        let ext = match Path::new(path).extension().and_then(|e| e.to_str()) {
            Some(ext) => ext.to_ascii_lowercase(),
            None => return Language::Unknown,
        };

        if TYPESCRIPT_EXTENSIONS.contains(&ext.as_str()) {
            Language::TypeScript
        } else if JAVASCRIPT_EXTENSIONS.contains(&ext.as_str()) {
            Language::JavaScript
        } else if PYTHON_EXTENSIONS.contains(&ext.as_str()) {
            Language::Python
        } else {
            Language::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::TypeScript => "typescript",
            Language::JavaScript => "javascript",
            Language::Python => "python",
            Language::Unknown => "unknown",
        }
    }

    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Language::TypeScript => TYPESCRIPT_EXTENSIONS,
            Language::JavaScript => JAVASCRIPT_EXTENSIONS,
            Language::Python => PYTHON_EXTENSIONS,
            Language::Unknown => &[],
        }
    }

    pub fn supported() -> [Language; 3] {
        [Language::TypeScript, Language::JavaScript, Language::Python]
    }
}

/// True for files that need the TSX flavour of the TypeScript grammar
pub fn is_tsx(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("tsx"))
        .unwrap_or(false)
}
