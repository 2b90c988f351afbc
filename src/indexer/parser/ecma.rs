// TypeScript and JavaScript extraction over tree-sitter syntax trees

use std::collections::HashMap;
use tree_sitter::Node;

use super::declaration::{
    bare_type_name, ClassDecl, Declaration, FunctionDecl, InterfaceDecl, ParamDecl, VariableDecl,
};
use super::{
    build_tree, child_of_kind, collect_matches, fallback, field_text, finish_syntax, has_token, named_children,
    node_line, node_text, Extraction, LanguageParser, NodeMatch, SyntaxFailure, Visit,
};
use crate::error::DeclarationError;
use crate::index::ImportSymbol;
use crate::indexer::language::{is_tsx, Language};

/// Parser for the curly-brace languages. TypeScript and JavaScript share
/// node kinds for everything extracted here; only the grammar differs.
pub struct EcmaParser {
    language: Language,
    grammar: tree_sitter::Language,
    tsx: Option<tree_sitter::Language>,
}

impl EcmaParser {
    pub fn typescript() -> Self {
        Self {
            language: Language::TypeScript,
            grammar: tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            tsx: Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
        }
    }

    pub fn javascript() -> Self {
        Self {
            language: Language::JavaScript,
            grammar: tree_sitter_javascript::LANGUAGE.into(),
            tsx: None,
        }
    }

    fn grammar_for(&self, path: &str) -> &tree_sitter::Language {
        match &self.tsx {
            Some(tsx) if is_tsx(path) => tsx,
            _ => &self.grammar,
        }
    }
}

impl LanguageParser for EcmaParser {
    fn language(&self) -> Language {
        self.language
    }

    fn parse_syntax(&self, path: &str, content: &str) -> Result<Extraction, SyntaxFailure> {
        let tree = build_tree(self.grammar_for(path), content)?;
        let root = tree.root_node();
        let locals = local_declarations(root, content);

        let mut extraction = Extraction::default();
        for found in collect_matches(root, classify) {
            match found {
                NodeMatch::Declaration(node) => extraction.absorb(export_declarations(node, content, &locals)),
                NodeMatch::Import(node) => extraction.absorb_imports(import_symbols(node, content)),
                NodeMatch::Error(node) => extraction.salvage(node, content, fallback::ecma_patterns),
            }
        }

        finish_syntax(&tree, extraction)
    }

    fn parse_patterns(&self, content: &str) -> Extraction {
        fallback::ecma_patterns(content)
    }
}

fn classify(node: Node) -> Visit {
    match node.kind() {
        "program" => Visit::Descend,
        "export_statement" => Visit::Match(NodeMatch::Declaration(node)),
        "import_statement" => Visit::Match(NodeMatch::Import(node)),
        "ERROR" => Visit::Match(NodeMatch::Error(node)),
        _ => Visit::Skip,
    }
}

/// Top-level declarations by name, used to resolve `export { name }`
fn local_declarations<'t>(root: Node<'t>, content: &'t str) -> HashMap<&'t str, Node<'t>> {
    let mut locals = HashMap::new();
    for node in named_children(root) {
        match node.kind() {
            "lexical_declaration" | "variable_declaration" => {
                for declarator in named_children(node) {
                    if declarator.kind() != "variable_declarator" {
                        continue;
                    }
                    if let Some(name) = declarator.child_by_field_name("name") {
                        if name.kind() == "identifier" {
                            locals.insert(node_text(name, content), declarator);
                        }
                    }
                }
            }
            "function_declaration"
            | "generator_function_declaration"
            | "class_declaration"
            | "abstract_class_declaration"
            | "interface_declaration"
            | "type_alias_declaration"
            | "enum_declaration" => {
                if let Some(name) = field_text(node, "name", content) {
                    locals.insert(name, node);
                }
            }
            _ => {}
        }
    }
    locals
}

fn export_declarations(
    node: Node,
    content: &str,
    locals: &HashMap<&str, Node>,
) -> Result<Vec<Declaration>, DeclarationError> {
    let line = node_line(node);
    let declaration = node.child_by_field_name("declaration");

    // A class keeps its well-formed members; any other broken export is dropped
    let class_like = declaration
        .map(|d| matches!(d.kind(), "class_declaration" | "abstract_class_declaration"))
        .unwrap_or(false);
    if node.has_error() && !class_like {
        return Err(DeclarationError::Malformed {
            construct: "export".to_string(),
            line,
        });
    }

    if let Some(decl) = declaration {
        return declarations_of(decl, content);
    }

    if let Some(value) = node.child_by_field_name("value") {
        return Ok(vec![value_declaration(value, "default", content)]);
    }

    if let Some(clause) = child_of_kind(node, "export_clause") {
        let re_export = node.child_by_field_name("source").is_some();
        let mut decls = Vec::new();
        for spec in named_children(clause) {
            if spec.kind() != "export_specifier" {
                continue;
            }
            let local = field_text(spec, "name", content).unwrap_or("");
            let exported = field_text(spec, "alias", content).unwrap_or(local);
            if exported.is_empty() {
                continue;
            }
            match locals.get(local) {
                Some(local_node) if !re_export => {
                    for mut decl in local_declaration(*local_node, content)? {
                        decl.rename(exported);
                        decls.push(decl);
                    }
                }
                _ => decls.push(Declaration::Variable(VariableDecl::new(exported, node_line(spec)))),
            }
        }
        return Ok(decls);
    }

    if let Some(namespace) = child_of_kind(node, "namespace_export") {
        let name = named_children(namespace)
            .last()
            .map(|n| node_text(*n, content).to_string())
            .unwrap_or_default();
        if !name.is_empty() {
            return Ok(vec![Declaration::Variable(VariableDecl::new(&name, line))]);
        }
    }

    // `export = value`
    if has_token(node, "=") {
        if let Some(value) = named_children(node).into_iter().next() {
            return Ok(vec![value_declaration(value, "default", content)]);
        }
    }

    Ok(vec![Declaration::Unknown {
        construct: "export".to_string(),
        line,
    }])
}

fn local_declaration(node: Node, content: &str) -> Result<Vec<Declaration>, DeclarationError> {
    if node.kind() == "variable_declarator" {
        return declarator(node, content).map(|d| vec![d]);
    }
    declarations_of(node, content)
}

fn missing_name(construct: &str, node: Node) -> DeclarationError {
    DeclarationError::MissingName {
        construct: construct.to_string(),
        line: node_line(node),
    }
}

fn declarations_of(node: Node, content: &str) -> Result<Vec<Declaration>, DeclarationError> {
    let line = node_line(node);
    let name = field_text(node, "name", content);

    let decl = match node.kind() {
        "function_declaration" | "generator_function_declaration" | "function_signature" => {
            let name = name.ok_or_else(|| missing_name("function", node))?;
            let mut function = function_decl(node, name, content);
            function.is_overload = node.kind() == "function_signature";
            Declaration::Function(function)
        }
        "class_declaration" | "abstract_class_declaration" | "class" => {
            Declaration::Class(class_decl(node, name.unwrap_or("default"), content))
        }
        "interface_declaration" => {
            let name = name.ok_or_else(|| missing_name("interface", node))?;
            let mut interface = InterfaceDecl::new(name, line);
            if let Some(clause) = child_of_kind(node, "extends_type_clause") {
                interface.extends = named_children(clause)
                    .into_iter()
                    .map(|t| bare_type_name(node_text(t, content)))
                    .collect();
            }
            if let Some(body) = node.child_by_field_name("body") {
                interface_members(body, content, &mut interface);
            }
            Declaration::Interface(interface)
        }
        "type_alias_declaration" => {
            let name = name.ok_or_else(|| missing_name("type alias", node))?;
            let mut interface = InterfaceDecl::new(name, line);
            if let Some(value) = node.child_by_field_name("value") {
                if value.kind() == "object_type" {
                    interface_members(value, content, &mut interface);
                }
            }
            Declaration::Interface(interface)
        }
        "enum_declaration" | "internal_module" | "module" => {
            let name = name.ok_or_else(|| missing_name(node.kind(), node))?;
            Declaration::Variable(VariableDecl::new(name, line))
        }
        "lexical_declaration" | "variable_declaration" => {
            let mut decls = Vec::new();
            for child in named_children(node) {
                if child.kind() == "variable_declarator" {
                    decls.push(declarator(child, content)?);
                }
            }
            return Ok(decls);
        }
        "ambient_declaration" => {
            let mut decls = Vec::new();
            for child in named_children(node) {
                decls.extend(declarations_of(child, content)?);
            }
            return Ok(decls);
        }
        other => Declaration::Unknown {
            construct: other.to_string(),
            line,
        },
    };

    Ok(vec![decl])
}

fn is_function_value(node: Node) -> bool {
    matches!(
        node.kind(),
        "arrow_function" | "function_expression" | "function" | "generator_function"
    )
}

/// `const name = value`, classified by the shape of the value
fn declarator(node: Node, content: &str) -> Result<Declaration, DeclarationError> {
    let name_node = node
        .child_by_field_name("name")
        .ok_or_else(|| missing_name("variable", node))?;
    let name = node_text(name_node, content);

    match node.child_by_field_name("value") {
        Some(value) if name_node.kind() == "identifier" && (is_function_value(value) || value.kind() == "class") => {
            let mut decl = value_declaration(value, name, content);
            if let Declaration::Function(f) = &mut decl {
                f.line = node_line(node);
            }
            Ok(decl)
        }
        _ => Ok(Declaration::Variable(VariableDecl::new(name, node_line(node)))),
    }
}

/// Declaration for an exported expression such as `export default ...`
fn value_declaration(value: Node, fallback_name: &str, content: &str) -> Declaration {
    if is_function_value(value) {
        let name = field_text(value, "name", content).unwrap_or(fallback_name);
        return Declaration::Function(function_decl(value, name, content));
    }
    if value.kind() == "class" {
        let name = field_text(value, "name", content).unwrap_or(fallback_name);
        return Declaration::Class(class_decl(value, name, content));
    }
    let name = if value.kind() == "identifier" {
        node_text(value, content)
    } else {
        fallback_name
    };
    Declaration::Variable(VariableDecl::new(name, node_line(value)))
}

fn type_text(annotation: Node, content: &str) -> String {
    match named_children(annotation).first() {
        Some(inner) if annotation.kind() == "type_annotation" => node_text(*inner, content).to_string(),
        _ => node_text(annotation, content).to_string(),
    }
}

fn function_decl(node: Node, name: &str, content: &str) -> FunctionDecl {
    let mut function = FunctionDecl::new(name, node_line(node));
    function.params = parameters(node, content);
    function.return_type = node
        .child_by_field_name("return_type")
        .map(|t| type_text(t, content));
    function.is_async = has_token(node, "async");
    function.is_generator = has_token(node, "*") || node.kind().starts_with("generator");
    function
}

fn parameters(node: Node, content: &str) -> Vec<ParamDecl> {
    if let Some(single) = node.child_by_field_name("parameter") {
        return vec![ParamDecl::named(node_text(single, content))];
    }
    match node.child_by_field_name("parameters") {
        Some(list) => named_children(list)
            .into_iter()
            .filter_map(|p| parameter(p, content))
            .collect(),
        None => Vec::new(),
    }
}

fn parameter(node: Node, content: &str) -> Option<ParamDecl> {
    match node.kind() {
        "required_parameter" | "optional_parameter" => {
            let pattern = node.child_by_field_name("pattern")?;
            let name = node_text(pattern, content);
            if name == "this" {
                return None;
            }
            Some(ParamDecl {
                name: name.to_string(),
                type_text: node.child_by_field_name("type").map(|t| type_text(t, content)),
                default_value: field_text(node, "value", content).map(str::to_string),
                optional: node.kind() == "optional_parameter",
            })
        }
        "assignment_pattern" => Some(ParamDecl {
            name: field_text(node, "left", content)?.to_string(),
            default_value: field_text(node, "right", content).map(str::to_string),
            ..ParamDecl::default()
        }),
        "identifier" | "rest_pattern" | "object_pattern" | "array_pattern" => {
            Some(ParamDecl::named(node_text(node, content)))
        }
        _ => None,
    }
}

fn is_private_member(member: Node, content: &str) -> bool {
    if let Some(modifier) = child_of_kind(member, "accessibility_modifier") {
        if matches!(node_text(modifier, content), "private" | "protected") {
            return true;
        }
    }
    member
        .child_by_field_name("name")
        .or_else(|| member.child_by_field_name("property"))
        .map(|n| n.kind() == "private_property_identifier")
        .unwrap_or(false)
}

fn class_decl(node: Node, name: &str, content: &str) -> ClassDecl {
    let mut class = ClassDecl::new(name, node_line(node));

    if let Some(heritage) = child_of_kind(node, "class_heritage") {
        for clause in named_children(heritage) {
            match clause.kind() {
                "extends_clause" => {
                    let value = clause
                        .child_by_field_name("value")
                        .or_else(|| named_children(clause).into_iter().next());
                    class.extends = value.map(|v| bare_type_name(node_text(v, content)));
                }
                "implements_clause" => {
                    class.implements = named_children(clause)
                        .into_iter()
                        .map(|t| bare_type_name(node_text(t, content)))
                        .collect();
                }
                // JavaScript: `extends <expression>` without a clause node
                _ if class.extends.is_none() => {
                    class.extends = Some(bare_type_name(node_text(clause, content)));
                }
                _ => {}
            }
        }
    }

    let body = match node.child_by_field_name("body") {
        Some(body) => body,
        None => return class,
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
        if is_private_member(member, content) {
            continue;
        }
        // Body-less `abstract_method_signature`s are not members
        match member.kind() {
            "method_definition" => {
                let member_name = match field_text(member, "name", content) {
                    Some(n) => n,
                    None => continue,
                };
                let function = function_decl(member, member_name, content);
                if member_name == "constructor" {
                    class.constructors.push(function);
                } else {
                    class.methods.push(function);
                }
            }
            "public_field_definition" | "field_definition" => {
                let field = member
                    .child_by_field_name("name")
                    .or_else(|| member.child_by_field_name("property"));
                if let Some(field) = field {
                    class
                        .properties
                        .push(VariableDecl::new(node_text(field, content), node_line(member)));
                }
            }
            _ => {}
        }
    }

    class
}

fn interface_members(body: Node, content: &str, interface: &mut InterfaceDecl) {
    for member in named_children(body) {
        if member.has_error() {
            continue;
        }
        let text = || node_text(member, content).trim_end_matches([';', ',']).trim().to_string();
        match member.kind() {
            "property_signature" => {
                if let Some(name) = field_text(member, "name", content) {
                    interface.properties.push(VariableDecl::new(name, node_line(member)));
                }
            }
            "method_signature" => {
                if let Some(name) = field_text(member, "name", content) {
                    interface.methods.push(function_decl(member, name, content));
                }
            }
            "call_signature" | "construct_signature" => interface.call_signatures.push(text()),
            "index_signature" => interface.index_signatures.push(text()),
            _ => {}
        }
    }
}

fn unquote(text: &str) -> String {
    text.trim_matches(|c| c == '"' || c == '\'' || c == '`').to_string()
}

fn import_symbols(node: Node, content: &str) -> Result<Vec<ImportSymbol>, DeclarationError> {
    let line = node_line(node);
    let malformed = || DeclarationError::Malformed {
        construct: "import".to_string(),
        line,
    };
    if node.has_error() {
        return Err(malformed());
    }

    // import fs = require('fs')
    if let Some(require) = child_of_kind(node, "import_require_clause") {
        let name = child_of_kind(require, "identifier")
            .map(|n| node_text(n, content).to_string())
            .ok_or_else(malformed)?;
        let source = field_text(require, "source", content).map(unquote).ok_or_else(malformed)?;
        return Ok(vec![ImportSymbol {
            name,
            source,
            line_number: line,
        }]);
    }

    let source = field_text(node, "source", content).map(unquote).ok_or_else(malformed)?;

    let mut names = Vec::new();
    if let Some(clause) = child_of_kind(node, "import_clause") {
        for part in named_children(clause) {
            match part.kind() {
                "identifier" => names.push(node_text(part, content).to_string()),
                "namespace_import" => {
                    if let Some(local) = child_of_kind(part, "identifier") {
                        names.push(node_text(local, content).to_string());
                    }
                }
                "named_imports" => {
                    for spec in named_children(part) {
                        if spec.kind() == "import_specifier" {
                            if let Some(name) = field_text(spec, "name", content) {
                                names.push(name.to_string());
                            }
                        }
                    }
                }
                _ => {}
            }
        }
    }
    if names.is_empty() {
        names.push("*".to_string());
    }

    Ok(names
        .into_iter()
        .map(|name| ImportSymbol {
            name,
            source: source.clone(),
            line_number: line,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::SymbolKind;
    use crate::indexer::parser::ParserTable;

    fn parse(path: &str, source: &str) -> crate::indexer::parser::ParseResult {
        ParserTable::new().parse(path, source)
    }

    #[test]
    fn test_async_and_generator_functions() {
        let result = parse(
            "src/jobs.ts",
            "export async function load(url: string): Promise<string> { return url; }\n\
             export function* ids() { yield 1; }\n",
        );

        assert_eq!(result.exports.len(), 2);
        let load = result.exports[0].signature().unwrap();
        assert!(load.is_async);
        assert_eq!(load.return_type, "Promise<string>");
        let ids = result.exports[1].signature().unwrap();
        assert!(ids.is_generator);
        assert_eq!(ids.return_type, "any");
    }

    #[test]
    fn test_optional_and_default_parameters() {
        let result = parse(
            "src/fmt.ts",
            "export function pad(s: string, width?: number, fill = ' ', ...rest: string[]) { return s; }\n",
        );

        let params = &result.exports[0].signature().unwrap().parameters;
        let names: Vec<_> = params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["s", "width", "fill", "rest"]);
        assert!(params[0].required);
        assert!(!params[1].required);
        assert_eq!(params[2].default_value.as_deref(), Some("' '"));
        assert!(!params[3].required);
        assert_eq!(params[3].type_, "string[]");
    }

    #[test]
    fn test_arrow_const_is_a_function() {
        let result = parse(
            "src/util.ts",
            "export const double = (n: number): number => n * 2;\nexport const LIMIT = 10;\n",
        );

        assert_eq!(result.exports[0].kind(), SymbolKind::Function);
        assert_eq!(result.exports[0].signature().unwrap().parameters[0].name, "n");
        assert_eq!(result.exports[1].kind(), SymbolKind::Variable);
        assert_eq!(result.exports[1].line_number, 2);
    }

    #[test]
    fn test_class_heritage_and_members() {
        let source = "export class Repo extends Base<User> implements Store, Disposable {\n\
                      \x20 private cache: Map<string, User>;\n\
                      \x20 name: string = 'repo';\n\
                      \x20 constructor(db: Db) { super(); }\n\
                      \x20 async find(id: string): Promise<User> { return this.cache.get(id); }\n\
                      \x20 private reset() {}\n\
                      }\n";
        let result = parse("src/repo.ts", source);

        let class = result.exports[0].class_detail().unwrap();
        assert_eq!(class.extends.as_deref(), Some("Base"));
        assert_eq!(class.implements, vec!["Store", "Disposable"]);
        assert_eq!(class.constructors.len(), 1);
        assert_eq!(class.methods.len(), 1);
        assert_eq!(class.methods[0].name, "find");
        assert!(class.methods[0].signature().unwrap().is_async);
        let props: Vec<_> = class.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(props, vec!["name"]);
    }

    #[test]
    fn test_interface_members() {
        let source = "export interface Store extends Base, Events<Item> {\n\
                      \x20 readonly size: number;\n\
                      \x20 lookup(key: string): Item | undefined;\n\
                      \x20 [key: string]: unknown;\n\
                      }\n";
        let result = parse("src/store.ts", source);

        let interface = result.exports[0].interface_detail().unwrap();
        assert_eq!(interface.extends, vec!["Base", "Events"]);
        assert_eq!(interface.properties[0].name, "size");
        assert_eq!(interface.methods[0].name, "lookup");
        assert_eq!(interface.index_signatures.len(), 1);
    }

    #[test]
    fn test_overloads_fold_into_implementation() {
        let source = "export function parse(s: string): number;\n\
                      export function parse(n: number): number;\n\
                      export function parse(v: any): number { return Number(v); }\n";
        let result = parse("src/parse.ts", source);

        assert_eq!(result.exports.len(), 1);
        assert_eq!(result.exports[0].line_number, 3);
        assert_eq!(result.exports[0].signature().unwrap().overloads.len(), 2);
    }

    #[test]
    fn test_export_clause_resolves_local_shapes() {
        let source = "function helper(x) { return x; }\nclass Impl {}\nconst n = 1;\n\
                      export { helper as run, Impl, n };\nexport { other } from './other';\n";
        let result = parse("src/index.ts", source);

        let kinds: Vec<_> = result.exports.iter().map(|e| (e.name.as_str(), e.kind())).collect();
        assert_eq!(
            kinds,
            vec![
                ("run", SymbolKind::Function),
                ("Impl", SymbolKind::Class),
                ("n", SymbolKind::Variable),
                ("other", SymbolKind::Variable),
            ]
        );
    }

    #[test]
    fn test_type_alias_and_enum() {
        let source = "export type Point = { x: number; y: number };\nexport enum Color { Red, Green }\n";
        let result = parse("src/types.ts", source);

        assert_eq!(result.exports[0].kind(), SymbolKind::Interface);
        assert_eq!(result.exports[0].interface_detail().unwrap().properties.len(), 2);
        assert_eq!(result.exports[1].kind(), SymbolKind::Variable);
    }

    #[test]
    fn test_default_exports() {
        let result = parse("src/a.ts", "const app = 1;\nexport default app;\n");
        assert_eq!(result.exports[0].name, "app");

        let result = parse("src/b.ts", "export default function () { return 1; }\n");
        assert_eq!(result.exports[0].name, "default");
        assert_eq!(result.exports[0].kind(), SymbolKind::Function);
    }

    #[test]
    fn test_import_names() {
        let source = "import React, { useState, useEffect as effect } from 'react';\n\
                      import * as path from \"path\";\n\
                      import './polyfill';\n";
        let result = parse("src/app.tsx", source);

        let imports: Vec<_> = result
            .imports
            .iter()
            .map(|i| (i.name.as_str(), i.source.as_str(), i.line_number))
            .collect();
        assert_eq!(
            imports,
            vec![
                ("React", "react", 1),
                ("useState", "react", 1),
                ("useEffect", "react", 1),
                ("path", "path", 2),
                ("*", "./polyfill", 3),
            ]
        );
    }

    #[test]
    fn test_javascript_module() {
        let source = "import { join } from 'path';\n\
                      export class Server extends EventEmitter {\n\
                      \x20 port = 80;\n\
                      \x20 listen(port) { this.port = port; }\n\
                      }\n\
                      export const start = async (opts) => new Server(opts);\n";
        let result = parse("lib/server.js", source);

        assert_eq!(result.language, Some(Language::JavaScript));
        assert_eq!(result.imports[0].name, "join");
        let class = result.exports[0].class_detail().unwrap();
        assert_eq!(class.extends.as_deref(), Some("EventEmitter"));
        assert_eq!(class.methods.len(), 1);
        assert_eq!(class.properties.len(), 1);
        let start = result.exports[1].signature().unwrap();
        assert!(start.is_async);
        assert_eq!(start.parameters[0].name, "opts");
    }

    #[test]
    fn test_unexported_declarations_are_ignored() {
        let result = parse("src/internal.ts", "function hidden() {}\nconst x = 1;\n");
        assert!(result.exports.is_empty());
        assert!(result.parse_errors.is_empty());
    }

    #[test]
    fn test_malformed_member_keeps_class() {
        let source = "export class Foo {\n  good(): void {}\n  bad( {}\n}\n";
        let result = parse("src/foo.ts", source);

        let foo = result.exports.iter().find(|e| e.name == "Foo").unwrap();
        let class = foo.class_detail().unwrap();
        let methods: Vec<_> = class.methods.iter().map(|m| m.name.as_str()).collect();
        assert!(methods.contains(&"good"));
        assert!(!methods.contains(&"bad"));
        assert!(!result.parse_errors.is_empty());
    }

    #[test]
    fn test_abstract_signatures_are_not_methods() {
        let source = "export abstract class Shape {\n\
                      \x20 abstract area(): number;\n\
                      \x20 describe(): string { return 'shape'; }\n\
                      }\n";
        let result = parse("src/shape.ts", source);

        let class = result.exports[0].class_detail().unwrap();
        let methods: Vec<_> = class.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(methods, vec!["describe"]);
        assert!(result.parse_errors.is_empty());
    }

    #[test]
    fn test_broken_statement_does_not_hide_later_exports() {
        let source = "export class Broken {\n  run( {\n}\n\nexport function ok(a: number): number { return a; }\n";
        let result = parse("src/mixed.ts", source);

        let ok = result.exports.iter().find(|e| e.name == "ok").unwrap();
        assert_eq!(ok.kind(), SymbolKind::Function);
        assert_eq!(ok.line_number, 5);
        assert!(!result.parse_errors.is_empty());
    }
}
