// Structural parsers: syntax tree extraction with a pattern fallback

pub mod declaration;
pub mod ecma;
pub mod fallback;
pub mod python;

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use thiserror::Error;
use tracing::{debug, warn};
use tree_sitter::{Node, Parser as TreeParser, Tree};

use crate::error::DeclarationError;
use crate::index::{ExportSymbol, ImportSymbol};
use crate::indexer::language::Language;
use declaration::Declaration;

/// Result of parsing one file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseResult {
    pub exports: Vec<ExportSymbol>,
    pub imports: Vec<ImportSymbol>,
    pub language: Option<Language>,
    pub parse_errors: Vec<String>,
}

impl ParseResult {
    fn unsupported(path: &str) -> Self {
        Self {
            exports: Vec::new(),
            imports: Vec::new(),
            language: Some(Language::Unknown),
            parse_errors: vec![format!("unsupported language for {}", path)],
        }
    }
}

/// Raw output of one extraction tier, before normalization
#[derive(Debug, Default)]
pub struct Extraction {
    pub declarations: Vec<Declaration>,
    pub imports: Vec<ImportSymbol>,
    pub errors: Vec<String>,
}

impl Extraction {
    /// Keep the declarations of a node, or record why they were dropped
    pub fn absorb(&mut self, outcome: Result<Vec<Declaration>, DeclarationError>) {
        match outcome {
            Ok(decls) => {
                for mut decl in decls {
                    if let Declaration::Class(class) = &mut decl {
                        self.errors.append(&mut class.errors);
                    }
                    self.declarations.push(decl);
                }
            }
            Err(e) => {
                debug!("Dropping declaration: {}", e);
                self.errors.push(e.to_string());
            }
        }
    }

    pub fn absorb_imports(&mut self, outcome: Result<Vec<ImportSymbol>, DeclarationError>) {
        match outcome {
            Ok(imports) => self.imports.extend(imports),
            Err(e) => {
                debug!("Dropping import: {}", e);
                self.errors.push(e.to_string());
            }
        }
    }

    /// Record a region the grammar could not parse, then recover what the
    /// pattern tier finds in its text. Line numbers are moved to file positions.
    pub fn salvage(&mut self, node: Node, content: &str, patterns: impl Fn(&str) -> Extraction) {
        let line = node_line(node);
        self.errors.push(
            DeclarationError::Malformed {
                construct: "statement".to_string(),
                line,
            }
            .to_string(),
        );

        let rows = line - 1;
        let region = patterns(node_text(node, content));
        if !region.declarations.is_empty() {
            debug!("Recovered {} declarations from line {}", region.declarations.len(), line);
        }
        for mut decl in region.declarations {
            decl.shift_lines(rows);
            self.declarations.push(decl);
        }
        for mut import in region.imports {
            import.line_number += rows;
            self.imports.push(import);
        }
    }

    fn is_empty(&self) -> bool {
        self.declarations.is_empty() && self.imports.is_empty()
    }
}

/// Why the syntax tree tier gave up on a file
#[derive(Debug, Error)]
pub enum SyntaxFailure {
    #[error("grammar unavailable: {0}")]
    Grammar(String),

    #[error("parser produced no tree")]
    NoTree,

    #[error("syntax errors and no recoverable declarations")]
    Malformed,

    #[error("syntax extraction panicked")]
    Panicked,
}

/// A per-language structural parser. Implementations hold no per-call state.
pub trait LanguageParser: Send + Sync {
    fn language(&self) -> Language;

    /// Grammar-based extraction
    fn parse_syntax(&self, path: &str, content: &str) -> Result<Extraction, SyntaxFailure>;

    /// Pattern-based extraction over raw text
    fn parse_patterns(&self, content: &str) -> Extraction;
}

/// Build a tree with a fresh tree-sitter parser
pub fn build_tree(grammar: &tree_sitter::Language, content: &str) -> Result<Tree, SyntaxFailure> {
    let mut parser = TreeParser::new();
    parser
        .set_language(grammar)
        .map_err(|e| SyntaxFailure::Grammar(e.to_string()))?;
    parser.parse(content, None).ok_or(SyntaxFailure::NoTree)
}

/// Decision for one node during traversal
pub enum Visit<'t> {
    Match(NodeMatch<'t>),
    Descend,
    Skip,
}

/// A node of interest found during traversal
#[derive(Debug, Clone, Copy)]
pub enum NodeMatch<'t> {
    Declaration(Node<'t>),
    Import(Node<'t>),
    Error(Node<'t>),
}

/// Depth-first walk with an explicit stack, returning matches in document order
pub fn collect_matches<'t>(root: Node<'t>, classify: impl Fn(Node<'t>) -> Visit<'t>) -> Vec<NodeMatch<'t>> {
    let mut matches = Vec::new();
    let mut stack = vec![root];

    while let Some(node) = stack.pop() {
        match classify(node) {
            Visit::Match(found) => matches.push(found),
            Visit::Skip => {}
            Visit::Descend => {
                let mut cursor = node.walk();
                let children: Vec<Node<'t>> = node.children(&mut cursor).collect();
                stack.extend(children.into_iter().rev());
            }
        }
    }

    matches
}

/// Text of a node, or an empty string if the byte range is not valid UTF-8
pub fn node_text<'a>(node: Node, content: &'a str) -> &'a str {
    node.utf8_text(content.as_bytes()).unwrap_or("")
}

/// 1-based line of a node
pub fn node_line(node: Node) -> usize {
    node.start_position().row + 1
}

/// Text of a named field
pub fn field_text<'a>(node: Node, field: &str, content: &'a str) -> Option<&'a str> {
    node.child_by_field_name(field).map(|n| node_text(n, content))
}

/// First named child of the given kind
pub fn child_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node.named_children(&mut cursor).find(|c| c.kind() == kind);
    found
}

/// True if an anonymous token with this text is a direct child
pub fn has_token(node: Node, token: &str) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|c| !c.is_named() && c.kind() == token);
    found
}

/// Named children collected into a vector
pub fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

/// Parsers for every supported language, built once and shared by reference
pub struct ParserTable {
    parsers: HashMap<Language, Box<dyn LanguageParser>>,
}

impl Default for ParserTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserTable {
    pub fn new() -> Self {
        let mut parsers: HashMap<Language, Box<dyn LanguageParser>> = HashMap::new();
        parsers.insert(Language::TypeScript, Box::new(ecma::EcmaParser::typescript()));
        parsers.insert(Language::JavaScript, Box::new(ecma::EcmaParser::javascript()));
        parsers.insert(Language::Python, Box::new(python::PythonParser::new()));
        Self { parsers }
    }

    pub fn parse(&self, path: &str, content: &str) -> ParseResult {
        self.parse_as(path, content, Language::detect(path))
    }

    /// Parse with an explicit language. Never fails: problems end up in
    /// `parse_errors` next to whatever could be extracted.
    pub fn parse_as(&self, path: &str, content: &str, language: Language) -> ParseResult {
        let parser = match self.parsers.get(&language) {
            Some(parser) => parser,
            None => return ParseResult::unsupported(path),
        };

        let syntax = catch_unwind(AssertUnwindSafe(|| parser.parse_syntax(path, content)))
            .unwrap_or(Err(SyntaxFailure::Panicked));

        let extraction = match syntax {
            Ok(extraction) => extraction,
            Err(failure) => {
                debug!("Syntax extraction failed for {} ({}), using patterns", path, failure);
                let mut extraction = catch_unwind(AssertUnwindSafe(|| parser.parse_patterns(content)))
                    .unwrap_or_else(|_| {
                        warn!("Pattern extraction panicked for {}", path);
                        Extraction {
                            errors: vec!["pattern extraction panicked".to_string()],
                            ..Extraction::default()
                        }
                    });
                extraction.errors.insert(0, format!("{}; used pattern fallback", failure));
                extraction
            }
        };

        ParseResult {
            exports: declaration::assemble(extraction.declarations),
            imports: extraction.imports,
            language: Some(language),
            parse_errors: extraction.errors,
        }
    }
}

/// Shared tail of every syntax tier: a tree with errors that yielded
/// nothing is handed to the pattern tier instead.
pub fn finish_syntax(tree: &Tree, extraction: Extraction) -> Result<Extraction, SyntaxFailure> {
    if tree.root_node().has_error() && extraction.is_empty() {
        return Err(SyntaxFailure::Malformed);
    }
    Ok(extraction)
}
