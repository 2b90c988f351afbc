// Declaration shapes shared by the syntax tree and pattern extractors

use crate::index::{
    ClassDetail, ExportSymbol, FunctionSignature, InterfaceDetail, Parameter, SymbolDetail, Visibility,
};

/// Return/parameter type used when none is written
pub const UNKNOWN_TYPE: &str = "any";

/// A parameter as it appears in source, before normalization
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamDecl {
    pub name: String,
    pub type_text: Option<String>,
    pub default_value: Option<String>,
    pub optional: bool,
}

impl ParamDecl {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub line: usize,
    pub visibility: Visibility,
    pub params: Vec<ParamDecl>,
    pub return_type: Option<String>,
    pub is_async: bool,
    pub is_generator: bool,
    /// A body-less signature that precedes the implementation
    pub is_overload: bool,
}

impl FunctionDecl {
    pub fn new(name: &str, line: usize) -> Self {
        Self {
            name: name.to_string(),
            line,
            visibility: Visibility::Public,
            params: Vec::new(),
            return_type: None,
            is_async: false,
            is_generator: false,
            is_overload: false,
        }
    }

    fn signature(self, overloads: Vec<FunctionSignature>) -> FunctionSignature {
        FunctionSignature {
            parameters: self.params.into_iter().map(normalize_param).collect(),
            return_type: normalize_type(self.return_type.as_deref()),
            is_async: self.is_async,
            is_generator: self.is_generator,
            overloads,
        }
    }

    fn into_symbol(self, overloads: Vec<FunctionSignature>) -> ExportSymbol {
        let name = self.name.clone();
        let line = self.line;
        let visibility = self.visibility;
        ExportSymbol {
            name,
            visibility,
            line_number: line,
            detail: SymbolDetail::Function {
                signature: self.signature(overloads),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDecl {
    pub name: String,
    pub line: usize,
    pub visibility: Visibility,
}

impl VariableDecl {
    pub fn new(name: &str, line: usize) -> Self {
        Self {
            name: name.to_string(),
            line,
            visibility: Visibility::Public,
        }
    }

    fn into_symbol(self) -> ExportSymbol {
        ExportSymbol {
            name: self.name,
            visibility: self.visibility,
            line_number: self.line,
            detail: SymbolDetail::Variable,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub name: String,
    pub line: usize,
    pub visibility: Visibility,
    pub extends: Option<String>,
    pub implements: Vec<String>,
    pub methods: Vec<FunctionDecl>,
    pub properties: Vec<VariableDecl>,
    pub constructors: Vec<FunctionDecl>,
    /// Members that could not be extracted; the class itself is kept
    pub errors: Vec<String>,
}

impl ClassDecl {
    pub fn new(name: &str, line: usize) -> Self {
        Self {
            name: name.to_string(),
            line,
            visibility: Visibility::Public,
            extends: None,
            implements: Vec::new(),
            methods: Vec::new(),
            properties: Vec::new(),
            constructors: Vec::new(),
            errors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InterfaceDecl {
    pub name: String,
    pub line: usize,
    pub extends: Vec<String>,
    pub methods: Vec<FunctionDecl>,
    pub properties: Vec<VariableDecl>,
    pub index_signatures: Vec<String>,
    pub call_signatures: Vec<String>,
}

impl InterfaceDecl {
    pub fn new(name: &str, line: usize) -> Self {
        Self {
            name: name.to_string(),
            line,
            ..Self::default()
        }
    }
}

/// One recognised declaration, classified once by its syntactic shape
#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Function(FunctionDecl),
    Class(ClassDecl),
    Interface(InterfaceDecl),
    Variable(VariableDecl),
    /// Recognised as a declaration but carrying no exportable name
    Unknown { construct: String, line: usize },
}

impl Declaration {
    pub fn name(&self) -> Option<&str> {
        match self {
            Declaration::Function(f) => Some(&f.name),
            Declaration::Class(c) => Some(&c.name),
            Declaration::Interface(i) => Some(&i.name),
            Declaration::Variable(v) => Some(&v.name),
            Declaration::Unknown { .. } => None,
        }
    }

    /// Re-export under another name, e.g. `export { local as public }`
    pub fn rename(&mut self, name: &str) {
        match self {
            Declaration::Function(f) => f.name = name.to_string(),
            Declaration::Class(c) => c.name = name.to_string(),
            Declaration::Interface(i) => i.name = name.to_string(),
            Declaration::Variable(v) => v.name = name.to_string(),
            Declaration::Unknown { .. } => {}
        }
    }

    /// Move every line number down by `rows`, for declarations extracted
    /// from a region that starts below the top of the file
    pub fn shift_lines(&mut self, rows: usize) {
        match self {
            Declaration::Function(f) => f.line += rows,
            Declaration::Class(c) => {
                c.line += rows;
                for f in c.methods.iter_mut().chain(c.constructors.iter_mut()) {
                    f.line += rows;
                }
                for p in &mut c.properties {
                    p.line += rows;
                }
            }
            Declaration::Interface(i) => {
                i.line += rows;
                for f in &mut i.methods {
                    f.line += rows;
                }
                for p in &mut i.properties {
                    p.line += rows;
                }
            }
            Declaration::Variable(v) => v.line += rows,
            Declaration::Unknown { line, .. } => *line += rows,
        }
    }

    pub fn line(&self) -> usize {
        match self {
            Declaration::Function(f) => f.line,
            Declaration::Class(c) => c.line,
            Declaration::Interface(i) => i.line,
            Declaration::Variable(v) => v.line,
            Declaration::Unknown { line, .. } => *line,
        }
    }
}

/// Normalize a type annotation: drop the leading colon, collapse whitespace,
/// fall back to `any` when nothing is written.
pub fn normalize_type(raw: Option<&str>) -> String {
    let text = raw.unwrap_or("").trim();
    let text = text.strip_prefix(':').unwrap_or(text).trim();
    let text = text.strip_prefix("->").unwrap_or(text).trim();
    if text.is_empty() {
        return UNKNOWN_TYPE.to_string();
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Reduce a parameter to its bare name, deriving `required` from the
/// optional marker, a default value or a rest/splat prefix.
pub fn normalize_param(param: ParamDecl) -> Parameter {
    let mut name = param.name.trim().to_string();
    let mut optional = param.optional;

    for prefix in ["...", "**", "*"] {
        if let Some(rest) = name.strip_prefix(prefix) {
            name = rest.trim().to_string();
            optional = true;
            break;
        }
    }
    if let Some(stripped) = name.strip_suffix('?') {
        name = stripped.trim_end().to_string();
        optional = true;
    }

    let default_value = param
        .default_value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    Parameter {
        required: !optional && default_value.is_none(),
        name,
        type_: normalize_type(param.type_text.as_deref()),
        default_value,
        description: None,
    }
}

/// Attach overload signatures to the implementation that follows them.
/// Overloads with no implementation keep the first one as the function.
fn fold_overloads(decls: Vec<Declaration>) -> Vec<(Declaration, Vec<FunctionSignature>)> {
    let mut out: Vec<(Declaration, Vec<FunctionSignature>)> = Vec::new();
    let mut pending: Vec<FunctionDecl> = Vec::new();

    let flush = |pending: &mut Vec<FunctionDecl>, out: &mut Vec<(Declaration, Vec<FunctionSignature>)>| {
        if pending.is_empty() {
            return;
        }
        let mut signatures = pending.drain(..);
        if let Some(mut first) = signatures.next() {
            first.is_overload = false;
            let rest = signatures.map(|f| f.signature(Vec::new())).collect();
            out.push((Declaration::Function(first), rest));
        }
    };

    for decl in decls {
        match decl {
            Declaration::Function(f) if f.is_overload => {
                if pending.last().map(|p| p.name != f.name).unwrap_or(false) {
                    flush(&mut pending, &mut out);
                }
                pending.push(f);
            }
            Declaration::Function(f) if pending.first().map(|p| p.name == f.name).unwrap_or(false) => {
                let overloads = pending.drain(..).map(|p| p.signature(Vec::new())).collect();
                out.push((Declaration::Function(f), overloads));
            }
            other => {
                flush(&mut pending, &mut out);
                out.push((other, Vec::new()));
            }
        }
    }
    flush(&mut pending, &mut out);
    out
}

fn members(functions: Vec<FunctionDecl>) -> Vec<ExportSymbol> {
    functions.into_iter().map(|f| f.into_symbol(Vec::new())).collect()
}

fn properties(vars: Vec<VariableDecl>) -> Vec<ExportSymbol> {
    vars.into_iter().map(VariableDecl::into_symbol).collect()
}

/// Turn extracted declarations into export symbols. Both extraction tiers
/// finish here, so their output has the same shape.
pub fn assemble(decls: Vec<Declaration>) -> Vec<ExportSymbol> {
    fold_overloads(decls)
        .into_iter()
        .filter_map(|(decl, overloads)| match decl {
            Declaration::Function(f) => Some(f.into_symbol(overloads)),
            Declaration::Variable(v) => Some(v.into_symbol()),
            Declaration::Class(c) => Some(ExportSymbol {
                name: c.name,
                visibility: c.visibility,
                line_number: c.line,
                detail: SymbolDetail::Class {
                    class: ClassDetail {
                        extends: c.extends,
                        implements: c.implements,
                        methods: members(c.methods),
                        properties: properties(c.properties),
                        constructors: members(c.constructors),
                    },
                },
            }),
            Declaration::Interface(i) => Some(ExportSymbol {
                name: i.name,
                visibility: Visibility::Public,
                line_number: i.line,
                detail: SymbolDetail::Interface {
                    interface: InterfaceDetail {
                        extends: i.extends,
                        methods: members(i.methods),
                        properties: properties(i.properties),
                        index_signatures: i.index_signatures,
                        call_signatures: i.call_signatures,
                    },
                },
            }),
            Declaration::Unknown { .. } => None,
        })
        .collect()
}

/// Strip generic arguments from a heritage name: `Base<T>` -> `Base`
pub fn bare_type_name(text: &str) -> String {
    let text = text.trim();
    match text.find('<') {
        Some(idx) => text[..idx].trim().to_string(),
        None => text.to_string(),
    }
}

/// Python-style privacy: a leading underscore, except dunder names
pub fn underscore_visibility(name: &str) -> Visibility {
    let dunder = name.starts_with("__") && name.ends_with("__") && name.len() > 4;
    if name.starts_with('_') && !dunder {
        Visibility::Private
    } else {
        Visibility::Public
    }
}
