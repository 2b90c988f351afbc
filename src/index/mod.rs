// Index records and storage

pub mod db;
pub mod metadata;
pub mod schema;
pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::IndexError;
use crate::indexer::language::Language;

/// Minimum length of fingerprints and commit ids accepted in a record
pub const MIN_ID_LEN: usize = 7;

/// Kind of an exported symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Function,
    Class,
    Interface,
    Variable,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Class => "class",
            SymbolKind::Interface => "interface",
            SymbolKind::Variable => "variable",
        }
    }
}

/// Visibility levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

/// A single function parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub required: bool,
    pub default_value: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSignature {
    pub parameters: Vec<Parameter>,
    pub return_type: String,
    pub is_async: bool,
    pub is_generator: bool,
    #[serde(default)]
    pub overloads: Vec<FunctionSignature>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassDetail {
    pub extends: Option<String>,
    pub implements: Vec<String>,
    pub methods: Vec<ExportSymbol>,
    pub properties: Vec<ExportSymbol>,
    pub constructors: Vec<ExportSymbol>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterfaceDetail {
    pub extends: Vec<String>,
    pub methods: Vec<ExportSymbol>,
    pub properties: Vec<ExportSymbol>,
    /// Index signatures as written, e.g. `[key: string]: number`
    #[serde(default)]
    pub index_signatures: Vec<String>,
    /// Call signatures as written, e.g. `(x: number): string`
    #[serde(default)]
    pub call_signatures: Vec<String>,
}

/// Kind-specific detail of an export. The tag doubles as the symbol kind,
/// so a symbol can only ever carry the detail matching its kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SymbolDetail {
    Function { signature: FunctionSignature },
    Class { class: ClassDetail },
    Interface { interface: InterfaceDetail },
    Variable,
}

/// An exported declaration extracted from a file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSymbol {
    pub name: String,
    pub visibility: Visibility,
    pub line_number: usize,
    #[serde(flatten)]
    pub detail: SymbolDetail,
}

impl ExportSymbol {
    pub fn kind(&self) -> SymbolKind {
        match self.detail {
            SymbolDetail::Function { .. } => SymbolKind::Function,
            SymbolDetail::Class { .. } => SymbolKind::Class,
            SymbolDetail::Interface { .. } => SymbolKind::Interface,
            SymbolDetail::Variable => SymbolKind::Variable,
        }
    }

    pub fn signature(&self) -> Option<&FunctionSignature> {
        match &self.detail {
            SymbolDetail::Function { signature } => Some(signature),
            _ => None,
        }
    }

    pub fn class_detail(&self) -> Option<&ClassDetail> {
        match &self.detail {
            SymbolDetail::Class { class } => Some(class),
            _ => None,
        }
    }

    pub fn interface_detail(&self) -> Option<&InterfaceDetail> {
        match &self.detail {
            SymbolDetail::Interface { interface } => Some(interface),
            _ => None,
        }
    }
}

/// An imported name and the module specifier it comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSymbol {
    pub name: String,
    pub source: String,
    pub line_number: usize,
}

/// The current index entry for one file of one repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileIndexRecord {
    pub repository_id: String,
    pub file_path: String,
    pub content_fingerprint: String,
    pub last_commit_id: String,
    pub last_commit_timestamp: DateTime<Utc>,
    pub exports: Vec<ExportSymbol>,
    pub imports: Vec<ImportSymbol>,
    pub language: Language,
    pub parse_errors: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl FileIndexRecord {
    /// Check the identifier fields before the record is persisted
    pub fn validate(&self) -> Result<(), IndexError> {
        check_repository_id(&self.repository_id)?;
        if self.file_path.is_empty() {
            return Err(IndexError::InvalidRecord("file path is empty".to_string()));
        }
        if self.content_fingerprint.trim().len() < MIN_ID_LEN {
            return Err(IndexError::InvalidRecord(format!(
                "fingerprint '{}' is shorter than {} characters",
                self.content_fingerprint, MIN_ID_LEN
            )));
        }
        if self.last_commit_id.trim().len() < MIN_ID_LEN {
            return Err(IndexError::InvalidRecord(format!(
                "commit id '{}' is shorter than {} characters",
                self.last_commit_id, MIN_ID_LEN
            )));
        }
        Ok(())
    }
}

const KEY_SEPARATOR: char = ':';

/// Store key shared by file records and file locks. Repository ids never
/// contain the separator, so the first one splits the key unambiguously.
pub fn file_key(repository_id: &str, file_path: &str) -> String {
    format!("{}{}{}", repository_id, KEY_SEPARATOR, file_path)
}

pub fn check_repository_id(repository_id: &str) -> Result<(), IndexError> {
    if repository_id.is_empty() || repository_id.contains(KEY_SEPARATOR) {
        return Err(IndexError::InvalidRepositoryId(repository_id.to_string()));
    }
    Ok(())
}
