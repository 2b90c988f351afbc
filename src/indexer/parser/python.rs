// Python extraction over tree-sitter syntax trees

use tree_sitter::Node;

use super::declaration::{underscore_visibility, ClassDecl, Declaration, FunctionDecl, ParamDecl, VariableDecl};
use super::{
    build_tree, collect_matches, fallback, field_text, finish_syntax, has_token, named_children, node_line,
    node_text, Extraction, LanguageParser, NodeMatch, SyntaxFailure, Visit,
};
use crate::error::DeclarationError;
use crate::index::{ImportSymbol, Visibility};
use crate::indexer::language::Language;

/// Every module-level function, class and assignment counts as exported;
/// visibility follows the leading-underscore convention.
pub struct PythonParser {
    grammar: tree_sitter::Language,
}

impl Default for PythonParser {
    fn default() -> Self {
        Self::new()
    }
}

impl PythonParser {
    pub fn new() -> Self {
        Self {
            grammar: tree_sitter_python::LANGUAGE.into(),
        }
    }
}

impl LanguageParser for PythonParser {
    fn language(&self) -> Language {
        Language::Python
    }

    fn parse_syntax(&self, _path: &str, content: &str) -> Result<Extraction, SyntaxFailure> {
        let tree = build_tree(&self.grammar, content)?;

        let mut extraction = Extraction::default();
        for found in collect_matches(tree.root_node(), classify) {
            match found {
                NodeMatch::Declaration(node) => extraction.absorb(module_declarations(node, content)),
                NodeMatch::Import(node) => extraction.absorb_imports(import_symbols(node, content)),
                NodeMatch::Error(node) => extraction.salvage(node, content, fallback::python_patterns),
            }
        }

        finish_syntax(&tree, extraction)
    }

    fn parse_patterns(&self, content: &str) -> Extraction {
        fallback::python_patterns(content)
    }
}

fn classify(node: Node) -> Visit {
    match node.kind() {
        // Conditional definitions still belong to the module
        "module" | "if_statement" | "elif_clause" | "else_clause" | "try_statement" | "except_clause"
        | "finally_clause" | "block" => Visit::Descend,
        "function_definition" | "class_definition" | "decorated_definition" | "expression_statement" => {
            Visit::Match(NodeMatch::Declaration(node))
        }
        "import_statement" | "import_from_statement" | "future_import_statement" => {
            Visit::Match(NodeMatch::Import(node))
        }
        "ERROR" => Visit::Match(NodeMatch::Error(node)),
        _ => Visit::Skip,
    }
}

fn is_class(node: Node) -> bool {
    match node.kind() {
        "class_definition" => true,
        "decorated_definition" => node
            .child_by_field_name("definition")
            .map(|d| d.kind() == "class_definition")
            .unwrap_or(false),
        _ => false,
    }
}

fn module_declarations(node: Node, content: &str) -> Result<Vec<Declaration>, DeclarationError> {
    // Classes drop only their broken members
    if node.has_error() && !is_class(node) {
        return Err(DeclarationError::Malformed {
            construct: node.kind().replace('_', " "),
            line: node_line(node),
        });
    }

    match node.kind() {
        "decorated_definition" => match node.child_by_field_name("definition") {
            Some(definition) => module_declarations(definition, content),
            None => Ok(Vec::new()),
        },
        "function_definition" => Ok(vec![Declaration::Function(function_decl(node, content, false)?)]),
        "class_definition" => Ok(vec![Declaration::Class(class_decl(node, content)?)]),
        "expression_statement" => Ok(assigned_names(node, content)
            .into_iter()
            .map(|(name, line)| {
                let mut variable = VariableDecl::new(&name, line);
                variable.visibility = underscore_visibility(&name);
                Declaration::Variable(variable)
            })
            .collect()),
        _ => Ok(Vec::new()),
    }
}

/// Names bound by an assignment statement, including tuple targets
fn assigned_names(statement: Node, content: &str) -> Vec<(String, usize)> {
    let assignment = match named_children(statement).into_iter().find(|n| n.kind() == "assignment") {
        Some(assignment) => assignment,
        None => return Vec::new(),
    };
    let left = match assignment.child_by_field_name("left") {
        Some(left) => left,
        None => return Vec::new(),
    };

    let targets = match left.kind() {
        "identifier" => vec![left],
        "pattern_list" | "tuple_pattern" => named_children(left)
            .into_iter()
            .filter(|n| n.kind() == "identifier")
            .collect(),
        _ => Vec::new(),
    };

    targets
        .into_iter()
        .map(|t| (node_text(t, content).to_string(), node_line(t)))
        .collect()
}

fn function_decl(node: Node, content: &str, is_method: bool) -> Result<FunctionDecl, DeclarationError> {
    let line = node_line(node);
    let name = field_text(node, "name", content).ok_or_else(|| DeclarationError::MissingName {
        construct: "function".to_string(),
        line,
    })?;

    let mut function = FunctionDecl::new(name, line);
    function.visibility = underscore_visibility(name);
    function.is_async = has_token(node, "async");
    function.return_type = field_text(node, "return_type", content).map(str::to_string);
    function.is_generator = node
        .child_by_field_name("body")
        .map(contains_yield)
        .unwrap_or(false);

    if let Some(parameters) = node.child_by_field_name("parameters") {
        let mut params: Vec<ParamDecl> = named_children(parameters)
            .into_iter()
            .filter_map(|p| parameter(p, content))
            .collect();
        if is_method && params.first().map(|p| p.name == "self" || p.name == "cls").unwrap_or(false) {
            params.remove(0);
        }
        function.params = params;
    }

    Ok(function)
}

fn parameter(node: Node, content: &str) -> Option<ParamDecl> {
    match node.kind() {
        "identifier" | "list_splat_pattern" | "dictionary_splat_pattern" => {
            Some(ParamDecl::named(node_text(node, content)))
        }
        "typed_parameter" => {
            let name = named_children(node).into_iter().next()?;
            Some(ParamDecl {
                name: node_text(name, content).to_string(),
                type_text: field_text(node, "type", content).map(str::to_string),
                default_value: None,
                optional: false,
            })
        }
        "default_parameter" | "typed_default_parameter" => Some(ParamDecl {
            name: field_text(node, "name", content)?.to_string(),
            type_text: field_text(node, "type", content).map(str::to_string),
            default_value: field_text(node, "value", content).map(str::to_string),
            optional: false,
        }),
        // `*` and `/` separators
        _ => None,
    }
}

/// True if `yield` occurs in the body outside nested scopes
fn contains_yield(body: Node) -> bool {
    let mut stack = vec![body];
    while let Some(node) = stack.pop() {
        match node.kind() {
            "yield" => return true,
            "function_definition" | "lambda" | "class_definition" if node != body => continue,
            _ => stack.extend(named_children(node)),
        }
    }
    false
}

fn class_decl(node: Node, content: &str) -> Result<ClassDecl, DeclarationError> {
    let line = node_line(node);
    let name = field_text(node, "name", content).ok_or_else(|| DeclarationError::MissingName {
        construct: "class".to_string(),
        line,
    })?;

    let mut class = ClassDecl::new(name, line);
    class.visibility = underscore_visibility(name);

    if let Some(superclasses) = node.child_by_field_name("superclasses") {
        let mut bases = named_children(superclasses)
            .into_iter()
            .filter(|b| b.kind() != "keyword_argument")
            .map(|b| node_text(b, content).to_string());
        class.extends = bases.next();
        class.implements = bases.collect();
    }

    let body = match node.child_by_field_name("body") {
        Some(body) => body,
        None => return Ok(class),
    };

    for member in named_children(body) {
        if member.has_error() {
            class.errors.push(
                DeclarationError::Malformed {
                    construct: format!("member of class {}", name),
                    line: node_line(member),
                }
                .to_string(),
            );
            continue;
        }
        let member = match member.kind() {
            "decorated_definition" => match member.child_by_field_name("definition") {
                Some(definition) => definition,
                None => continue,
            },
            _ => member,
        };

        match member.kind() {
            "function_definition" => {
                let method = match function_decl(member, content, true) {
                    Ok(method) => method,
                    Err(e) => {
                        class.errors.push(e.to_string());
                        continue;
                    }
                };
                if method.visibility == Visibility::Private {
                    continue;
                }
                if method.name == "__init__" {
                    class.constructors.push(method);
                } else {
                    class.methods.push(method);
                }
            }
            "expression_statement" => {
                for (property, line) in assigned_names(member, content) {
                    if underscore_visibility(&property) == Visibility::Public {
                        class.properties.push(VariableDecl::new(&property, line));
                    }
                }
            }
            _ => {}
        }
    }

    Ok(class)
}

fn import_symbols(node: Node, content: &str) -> Result<Vec<ImportSymbol>, DeclarationError> {
    let line = node_line(node);
    if node.has_error() {
        return Err(DeclarationError::Malformed {
            construct: "import".to_string(),
            line,
        });
    }

    let symbol = |name: &str, source: &str| ImportSymbol {
        name: name.to_string(),
        source: source.to_string(),
        line_number: line,
    };

    // Imported names are the dotted or original names, never the alias
    let original = |n: Node| match n.kind() {
        "aliased_import" => field_text(n, "name", content).unwrap_or("").to_string(),
        _ => node_text(n, content).to_string(),
    };

    let mut cursor = node.walk();
    let names: Vec<Node> = node.children_by_field_name("name", &mut cursor).collect();

    let imports = match node.kind() {
        "import_statement" => names
            .into_iter()
            .map(original)
            .filter(|n| !n.is_empty())
            .map(|module| symbol(&module, &module))
            .collect(),
        _ => {
            let source = match node.kind() {
                "future_import_statement" => "__future__".to_string(),
                _ => field_text(node, "module_name", content).unwrap_or("").to_string(),
            };
            if named_children(node).iter().any(|n| n.kind() == "wildcard_import") {
                vec![symbol("*", &source)]
            } else {
                names
                    .into_iter()
                    .map(original)
                    .filter(|n| !n.is_empty())
                    .map(|name| symbol(&name, &source))
                    .collect()
            }
        }
    };

    Ok(imports)
}
