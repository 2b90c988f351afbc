// Pattern-based extraction, used when a syntax tree is unavailable or unusable

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashSet;

use super::declaration::{
    bare_type_name, underscore_visibility, ClassDecl, Declaration, FunctionDecl, InterfaceDecl, ParamDecl,
    VariableDecl,
};
use super::Extraction;
use crate::error::DeclarationError;
use crate::index::{ImportSymbol, Visibility};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Syntax {
    Ecma,
    Python,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    Function,
    ArrowFunction,
    Class,
    Interface,
    TypeAlias,
    Variable,
    Enum,
    Clause,
    Default,
    Assign,
}

fn regex(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(re) => re,
        Err(e) => panic!("invalid built-in pattern {}: {}", pattern, e),
    }
}

/// Export rules, applied in order; a match start claimed by an earlier rule
/// is not reconsidered by a later one.
static ECMA_EXPORT_RULES: Lazy<Vec<(Regex, Rule)>> = Lazy::new(|| {
    vec![
        (
            regex(r"(?m)^[ \t]*export\s+(?:default\s+)?(?:declare\s+)?(async\s+)?function\b\s*(\*)?\s*([A-Za-z_$][\w$]*)?"),
            Rule::Function,
        ),
        (
            regex(r"(?m)^[ \t]*export\s+(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*(?::[^=\n]+)?=\s*(async\s+)?(?:function\b\s*(\*)?|(?:\([^)]*\)|[A-Za-z_$][\w$]*)\s*(?::\s*[^=\n]+)?=>)"),
            Rule::ArrowFunction,
        ),
        (
            regex(r"(?m)^[ \t]*export\s+(?:default\s+)?(?:declare\s+)?(?:abstract\s+)?class\s+([A-Za-z_$][\w$]*)"),
            Rule::Class,
        ),
        (
            regex(r"(?m)^[ \t]*export\s+(?:declare\s+)?interface\s+([A-Za-z_$][\w$]*)"),
            Rule::Interface,
        ),
        (
            regex(r"(?m)^[ \t]*export\s+(?:declare\s+)?type\s+([A-Za-z_$][\w$]*)"),
            Rule::TypeAlias,
        ),
        (
            regex(r"(?m)^[ \t]*export\s+(?:declare\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)"),
            Rule::Variable,
        ),
        (
            regex(r"(?m)^[ \t]*export\s+(?:declare\s+)?(?:const\s+)?enum\s+([A-Za-z_$][\w$]*)"),
            Rule::Enum,
        ),
        (regex(r"(?m)^[ \t]*export\s*(?:type\s*)?\{([^}]*)\}"), Rule::Clause),
        (regex(r"(?m)^[ \t]*export\s+default\s+([A-Za-z_$][\w$]*)"), Rule::Default),
        (regex(r"(?m)^[ \t]*export\s*=\s*([A-Za-z_$][\w$]*)"), Rule::Assign),
    ]
});

static ECMA_IMPORT_FROM: Lazy<Regex> =
    Lazy::new(|| regex(r#"(?m)^[ \t]*import\s+(?:type\s+)?([\w$*{}\s,]+?)\s+from\s+['"]([^'"]+)['"]"#));
static ECMA_IMPORT_BARE: Lazy<Regex> = Lazy::new(|| regex(r#"(?m)^[ \t]*import\s+['"]([^'"]+)['"]"#));
static ECMA_IMPORT_REQUIRE: Lazy<Regex> = Lazy::new(|| {
    regex(r#"(?m)^[ \t]*import\s+([A-Za-z_$][\w$]*)\s*=\s*require\(\s*['"]([^'"]+)['"]\s*\)"#)
});

static CONSTRUCTOR: Lazy<Regex> = Lazy::new(|| regex(r"^(?:(?:public|private|protected)\s+)?constructor\s*\("));
static METHOD: Lazy<Regex> = Lazy::new(|| {
    regex(r"^(?:(public|private|protected)\s+)?(?:static\s+)?(?:override\s+)?(?:abstract\s+)?(async\s+)?(?:(?:get|set)\s+)?(\*\s*)?(#?[A-Za-z_$][\w$]*)\s*(?:<[^>]*>)?\s*\(")
});
static PROPERTY: Lazy<Regex> = Lazy::new(|| {
    regex(r"^(?:(public|private|protected)\s+)?(?:static\s+)?(?:declare\s+)?(?:readonly\s+)?(#?[A-Za-z_$][\w$]*)[?!]?\s*:\s*\S")
});
static SIGNATURE_METHOD: Lazy<Regex> =
    Lazy::new(|| regex(r"^(?:readonly\s+)?([A-Za-z_$][\w$]*)\??\s*(?:<[^>]*>)?\s*\("));
static SIGNATURE_PROPERTY: Lazy<Regex> = Lazy::new(|| regex(r"^(?:readonly\s+)?([A-Za-z_$][\w$]*)\??\s*:"));
static EXTENDS: Lazy<Regex> = Lazy::new(|| regex(r"\bextends\s+([A-Za-z_$][\w$.]*)"));
static IMPLEMENTS: Lazy<Regex> = Lazy::new(|| regex(r"\bimplements\s+(.+)$"));

static PY_DEF: Lazy<Regex> = Lazy::new(|| regex(r"(?m)^(async[ \t]+)?def[ \t]+([A-Za-z_]\w*)[ \t]*\("));
static PY_CLASS: Lazy<Regex> =
    Lazy::new(|| regex(r"(?m)^class[ \t]+([A-Za-z_]\w*)[ \t]*(?:\(([^)]*)\))?[ \t]*:"));
static PY_ASSIGN: Lazy<Regex> = Lazy::new(|| regex(r"(?m)^([A-Za-z_]\w*)[ \t]*(?::[^=\n]+)?=[^=]"));
static PY_MEMBER_DEF: Lazy<Regex> = Lazy::new(|| regex(r"^(async\s+)?def\s+([A-Za-z_]\w*)\s*\("));
static PY_MEMBER_ASSIGN: Lazy<Regex> = Lazy::new(|| regex(r"^([A-Za-z_]\w*)\s*(?::[^=]+)?(?:=[^=]|:\s*\S)"));
static PY_IMPORT: Lazy<Regex> = Lazy::new(|| regex(r"(?m)^import[ \t]+([^\n#]+)"));
static PY_FROM_IMPORT: Lazy<Regex> =
    Lazy::new(|| regex(r"(?m)^from[ \t]+([\w.]+)[ \t]+import[ \t]+(\([^)]*\)|[^\n#]+)"));
static YIELD: Lazy<Regex> = Lazy::new(|| regex(r"\byield\b"));

const KEYWORDS: &[&str] = &["if", "for", "while", "switch", "catch", "return", "function", "super", "new"];

/// 1-based line of a byte offset
fn line_at(content: &str, pos: usize) -> usize {
    content[..pos.min(content.len())].matches('\n').count() + 1
}

/// Byte offsets of code characters, skipping strings and comments
fn code_bytes(content: &str, from: usize, syntax: Syntax) -> Vec<(usize, u8)> {
    let bytes = content.as_bytes();
    let mut out = Vec::new();
    let mut i = from;

    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();
        match b {
            b'"' | b'\'' if syntax == Syntax::Python && bytes[i..].starts_with(&[b, b, b]) => {
                i += 3;
                while i < bytes.len() && !bytes[i..].starts_with(&[b, b, b]) {
                    i += 1;
                }
                i += 3;
            }
            b'"' | b'\'' | b'`' if b != b'`' || syntax == Syntax::Ecma => {
                i += 1;
                while i < bytes.len() && bytes[i] != b {
                    if bytes[i] == b'\\' {
                        i += 1;
                    } else if bytes[i] == b'\n' && b != b'`' {
                        break;
                    }
                    i += 1;
                }
                i += 1;
            }
            b'/' if syntax == Syntax::Ecma && next == Some(b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if syntax == Syntax::Ecma && next == Some(b'*') => {
                i += 2;
                while i < bytes.len() && !bytes[i..].starts_with(b"*/") {
                    i += 1;
                }
                i += 2;
            }
            b'#' if syntax == Syntax::Python => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            _ => {
                out.push((i, b));
                i += 1;
            }
        }
    }

    out
}

/// Offset of the delimiter closing the one at `open`
fn matching(content: &str, open: usize, syntax: Syntax) -> Option<usize> {
    let open_ch = *content.as_bytes().get(open)?;
    let close_ch = match open_ch {
        b'(' => b')',
        b'{' => b'}',
        b'[' => b']',
        _ => return None,
    };

    let mut depth = 0usize;
    for (i, b) in code_bytes(content, open, syntax) {
        if b == open_ch {
            depth += 1;
        } else if b == close_ch {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// Split on a separator outside any brackets or quotes
fn split_top_level(text: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut current = String::new();
    let mut prev = '\0';

    for c in text.chars() {
        if let Some(q) = quote {
            current.push(c);
            if c == q && prev != '\\' {
                quote = None;
            }
            prev = c;
            continue;
        }
        match c {
            '"' | '\'' | '`' => quote = Some(c),
            '(' | '[' | '{' | '<' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            '>' if prev != '=' => depth -= 1,
            _ => {}
        }
        if c == sep && depth <= 0 {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
        prev = c;
    }
    parts.push(current);

    parts
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Byte offset of the first top-level occurrence of `needle` (not `=>`/`==`)
fn find_top_level(text: &str, needle: char) -> Option<usize> {
    let mut depth = 0i32;
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    for (idx, &(pos, c)) in chars.iter().enumerate() {
        match c {
            '(' | '[' | '{' | '<' => depth += 1,
            ')' | ']' | '}' | '>' => depth -= 1,
            _ => {}
        }
        if c == needle && depth <= 0 {
            let next = chars.get(idx + 1).map(|(_, n)| *n);
            if needle == '=' && matches!(next, Some('>') | Some('=')) {
                continue;
            }
            return Some(pos);
        }
    }
    None
}

/// Remove `<...>` groups, including nested ones and braces inside them
fn strip_generics(text: &str) -> String {
    let mut out = String::new();
    let mut depth = 0usize;
    for c in text.chars() {
        match c {
            '<' => depth += 1,
            '>' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

fn parse_param(raw: &str, syntax: Syntax) -> Option<ParamDecl> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "*" || raw == "/" {
        return None;
    }

    let (head, default_value) = match find_top_level(raw, '=') {
        Some(idx) => (&raw[..idx], Some(raw[idx + 1..].trim().to_string())),
        None => (raw, None),
    };
    let (name, type_text) = match find_top_level(head, ':') {
        Some(idx) => (&head[..idx], Some(head[idx + 1..].trim().to_string())),
        None => (head, None),
    };

    let mut name = name.trim();
    if syntax == Syntax::Ecma {
        for modifier in ["public ", "private ", "protected ", "readonly "] {
            name = name.strip_prefix(modifier).unwrap_or(name).trim();
        }
    }
    if name.is_empty() || name == "this" {
        return None;
    }

    Some(ParamDecl {
        name: name.to_string(),
        type_text,
        default_value,
        optional: false,
    })
}

/// Parameters and return type of the signature whose `(` is at or after `from`
struct ScannedSignature {
    params: Vec<ParamDecl>,
    return_type: Option<String>,
    has_body: bool,
}

fn scan_signature(content: &str, from: usize, syntax: Syntax) -> Option<ScannedSignature> {
    let rest = &content[from..];
    let offset = rest.find('(')?;
    let between = strip_generics(&rest[..offset]);
    let between = between.trim().trim_start_matches("function").trim_start_matches('*').trim();
    if !between.is_empty() {
        return None;
    }

    let open = from + offset;
    let close = matching(content, open, syntax)?;
    let params = split_top_level(&content[open + 1..close], ',')
        .iter()
        .filter_map(|p| parse_param(p, syntax))
        .collect();

    let after = &content[close + 1..];
    let trimmed = after.trim_start();
    let (return_type, tail) = match syntax {
        Syntax::Ecma if trimmed.starts_with(':') => {
            let body = &trimmed[1..];
            let end = body
                .find(|c: char| c == '{' || c == ';' || c == '\n')
                .unwrap_or(body.len())
                .min(body.find("=>").unwrap_or(body.len()));
            (Some(body[..end].trim().to_string()), &body[end..])
        }
        Syntax::Python if trimmed.starts_with("->") => {
            let body = &trimmed[2..];
            let line_end = body.find('\n').unwrap_or(body.len());
            let end = body[..line_end].rfind(':').unwrap_or(line_end);
            (Some(body[..end].trim().to_string()), &body[end..])
        }
        _ => (None, trimmed),
    };

    let has_body = match syntax {
        Syntax::Ecma => tail.trim_start().starts_with('{'),
        Syntax::Python => tail.trim_start().starts_with(':'),
    };

    Some(ScannedSignature {
        params,
        return_type: return_type.filter(|t| !t.is_empty()),
        has_body,
    })
}

/// Lines inside the block `open..close` that begin at the block's own depth,
/// as (offset of first non-blank character, trimmed text)
fn block_lines(content: &str, open: usize, close: usize) -> Vec<(usize, &str)> {
    let mut starts = Vec::new();
    let mut depth = 0i32;
    let mut at_line_start = true;

    for (i, b) in code_bytes(content, open + 1, Syntax::Ecma) {
        if i >= close {
            break;
        }
        if at_line_start && depth == 0 && !b.is_ascii_whitespace() {
            starts.push(i);
        }
        if !b.is_ascii_whitespace() {
            at_line_start = false;
        }
        match b {
            b'{' | b'(' | b'[' => depth += 1,
            b'}' | b')' | b']' => depth -= 1,
            b'\n' => at_line_start = true,
            _ => {}
        }
    }

    starts
        .into_iter()
        .map(|start| {
            let end = content[start..close]
                .find('\n')
                .map(|n| start + n)
                .unwrap_or(close);
            (start, content[start..end].trim())
        })
        .collect()
}

fn ecma_function(name: &str, line: usize, content: &str, from: usize) -> FunctionDecl {
    let mut function = FunctionDecl::new(name, line);
    if let Some(signature) = scan_signature(content, from, Syntax::Ecma) {
        function.params = signature.params;
        function.return_type = signature.return_type;
        function.is_overload = !signature.has_body;
    }
    function
}

fn class_header(header: &str) -> (Option<String>, Vec<String>) {
    let header = strip_generics(header);
    let extends = EXTENDS.captures(&header).map(|c| c[1].to_string());
    let implements = IMPLEMENTS
        .captures(&header)
        .map(|c| {
            split_top_level(&c[1], ',')
                .iter()
                .map(|t| bare_type_name(t))
                .collect()
        })
        .unwrap_or_default();
    (extends, implements)
}

/// Offset of the `{` opening a declaration body, skipping generic parameter
/// lists that may contain braces of their own
fn body_open(content: &str, from: usize) -> Option<usize> {
    let mut angle = 0usize;
    for (i, b) in code_bytes(content, from, Syntax::Ecma) {
        match b {
            b'<' => angle += 1,
            b'>' if angle > 0 => angle -= 1,
            b'{' if angle == 0 => return Some(i),
            b';' if angle == 0 => return None,
            _ => {}
        }
    }
    None
}

fn ecma_class(name: &str, line: usize, content: &str, from: usize) -> Result<ClassDecl, DeclarationError> {
    let unbalanced = || DeclarationError::UnbalancedBody {
        name: name.to_string(),
        line,
    };
    let open = body_open(content, from).ok_or_else(unbalanced)?;
    let close = matching(content, open, Syntax::Ecma).ok_or_else(unbalanced)?;

    let mut class = ClassDecl::new(name, line);
    let (extends, implements) = class_header(&content[from..open]);
    class.extends = extends;
    class.implements = implements;

    for (pos, text) in block_lines(content, open, close) {
        let member_line = line_at(content, pos);
        if CONSTRUCTOR.is_match(text) {
            if text.starts_with("private") || text.starts_with("protected") {
                continue;
            }
            let ctor_at = pos + text.find("constructor").unwrap_or(0) + "constructor".len();
            class
                .constructors
                .push(ecma_function("constructor", member_line, content, ctor_at));
        } else if let Some(caps) = METHOD.captures(text) {
            let member = &caps[4];
            if caps.get(1).map(|m| m.as_str() != "public").unwrap_or(false)
                || member.starts_with('#')
                || member == name
                || KEYWORDS.contains(&member)
            {
                continue;
            }
            let name_end = pos + caps.get(4).map(|m| m.end()).unwrap_or(0);
            if scan_signature(content, name_end, Syntax::Ecma).is_none() {
                class.errors.push(malformed_member(name, member_line));
                continue;
            }
            let mut method = ecma_function(member, member_line, content, name_end);
            if method.is_overload {
                // Signature without a body: overload or abstract declaration
                continue;
            }
            method.is_async = caps.get(2).is_some();
            method.is_generator = caps.get(3).is_some();
            class.methods.push(method);
        } else if let Some(caps) = PROPERTY.captures(text) {
            let member = &caps[2];
            if caps.get(1).map(|m| m.as_str() != "public").unwrap_or(false) || member.starts_with('#') {
                continue;
            }
            class.properties.push(VariableDecl::new(member, member_line));
        }
    }

    Ok(class)
}

fn malformed_member(class: &str, line: usize) -> String {
    DeclarationError::Malformed {
        construct: format!("member of class {}", class),
        line,
    }
    .to_string()
}

fn signature_members(content: &str, open: usize, close: usize, interface: &mut InterfaceDecl) {
    for (pos, text) in block_lines(content, open, close) {
        let member_line = line_at(content, pos);
        let cleaned = text.trim_end_matches([';', ',']).trim().to_string();
        if text.starts_with('[') {
            interface.index_signatures.push(cleaned);
        } else if text.starts_with('(') || text.starts_with("new ") || text.starts_with("new(") {
            interface.call_signatures.push(cleaned);
        } else if let Some(caps) = SIGNATURE_METHOD.captures(text) {
            let name_end = pos + caps.get(1).map(|m| m.end()).unwrap_or(0);
            let mut method = ecma_function(&caps[1], member_line, content, name_end);
            method.is_overload = false;
            interface.methods.push(method);
        } else if let Some(caps) = SIGNATURE_PROPERTY.captures(text) {
            interface.properties.push(VariableDecl::new(&caps[1], member_line));
        }
    }
}

fn ecma_interface(name: &str, line: usize, content: &str, from: usize) -> Result<InterfaceDecl, DeclarationError> {
    let unbalanced = || DeclarationError::UnbalancedBody {
        name: name.to_string(),
        line,
    };
    let open = body_open(content, from).ok_or_else(unbalanced)?;
    let close = matching(content, open, Syntax::Ecma).ok_or_else(unbalanced)?;

    let mut interface = InterfaceDecl::new(name, line);
    let header = strip_generics(&content[from..open]);
    if let Some(idx) = header.find("extends") {
        interface.extends = split_top_level(&header[idx + "extends".len()..], ',')
            .iter()
            .map(|t| bare_type_name(t))
            .collect();
    }
    signature_members(content, open, close, &mut interface);
    Ok(interface)
}

fn ecma_type_alias(name: &str, line: usize, content: &str, from: usize) -> InterfaceDecl {
    let mut interface = InterfaceDecl::new(name, line);
    let rest = &content[from..];
    if let Some(eq) = rest.find('=') {
        let value = &rest[eq + 1..];
        if value.trim_start().starts_with('{') {
            let open = from + eq + 1 + (value.len() - value.trim_start().len());
            if let Some(close) = matching(content, open, Syntax::Ecma) {
                signature_members(content, open, close, &mut interface);
            }
        }
    }
    interface
}

fn rule_declarations(rule: Rule, caps: &Captures, content: &str) -> Result<Vec<Declaration>, DeclarationError> {
    let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
    let line = line_at(content, whole.0 + (caps[0].len() - caps[0].trim_start().len()));
    let name = |group: usize| caps.get(group).map(|m| m.as_str().to_string());

    let decl = match rule {
        Rule::Function => {
            let name = name(3).unwrap_or_else(|| "default".to_string());
            let mut function = ecma_function(&name, line, content, whole.1);
            function.is_async = caps.get(1).is_some();
            function.is_generator = caps.get(2).is_some();
            Declaration::Function(function)
        }
        Rule::ArrowFunction => {
            let name = name(1).unwrap_or_default();
            let eq = caps[0].find('=').map(|i| whole.0 + i + 1).unwrap_or(whole.1);
            let value = content[eq..].trim_start();
            let value_at = eq + (content[eq..].len() - value.len());
            let after_async = value.strip_prefix("async").unwrap_or(value);
            let callable_at = value_at + (value.len() - after_async.trim_start().len());

            let mut function = FunctionDecl::new(&name, line);
            match scan_signature(content, callable_at, Syntax::Ecma) {
                Some(signature) => {
                    function.params = signature.params;
                    function.return_type = signature.return_type;
                }
                None => {
                    // Single bare parameter: `x => ...`
                    let single = after_async.trim_start().split("=>").next().unwrap_or("").trim();
                    if !single.is_empty() {
                        function.params.push(ParamDecl::named(single));
                    }
                }
            }
            function.is_async = caps.get(2).is_some();
            function.is_generator = caps.get(3).is_some();
            Declaration::Function(function)
        }
        Rule::Class => {
            let name = name(1).unwrap_or_default();
            Declaration::Class(ecma_class(&name, line, content, whole.1)?)
        }
        Rule::Interface => {
            let name = name(1).unwrap_or_default();
            Declaration::Interface(ecma_interface(&name, line, content, whole.1)?)
        }
        Rule::TypeAlias => {
            let name = name(1).unwrap_or_default();
            Declaration::Interface(ecma_type_alias(&name, line, content, whole.1))
        }
        Rule::Variable | Rule::Enum | Rule::Default | Rule::Assign => {
            let name = name(1).unwrap_or_default();
            Declaration::Variable(VariableDecl::new(&name, line))
        }
        Rule::Clause => {
            return Ok(split_top_level(&caps[1], ',')
                .iter()
                .filter_map(|spec| {
                    let spec = spec.trim_start_matches("type ").trim();
                    let exported = spec.rsplit(" as ").next()?.trim();
                    (!exported.is_empty()).then(|| Declaration::Variable(VariableDecl::new(exported, line)))
                })
                .collect());
        }
    };

    if decl.name().map(str::is_empty).unwrap_or(false) {
        return Err(DeclarationError::MissingName {
            construct: format!("{:?}", rule).to_lowercase(),
            line,
        });
    }
    Ok(vec![decl])
}

fn clause_names(clause: &str) -> Vec<String> {
    let mut names = Vec::new();
    let (outside, inside) = match (clause.find('{'), clause.rfind('}')) {
        (Some(open), Some(close)) if open < close => (
            format!("{} {}", &clause[..open], &clause[close + 1..]),
            Some(&clause[open + 1..close]),
        ),
        _ => (clause.to_string(), None),
    };

    for part in split_top_level(&outside, ',') {
        if let Some(namespace) = part.strip_prefix('*') {
            let local = namespace.trim().trim_start_matches("as").trim();
            if !local.is_empty() {
                names.push(local.to_string());
            }
        } else {
            names.push(part);
        }
    }
    if let Some(inside) = inside {
        for spec in split_top_level(inside, ',') {
            let spec = spec.trim_start_matches("type ").trim();
            if let Some(original) = spec.split(" as ").next() {
                let original = original.trim();
                if !original.is_empty() {
                    names.push(original.to_string());
                }
            }
        }
    }
    names
}

/// Pattern extraction for TypeScript and JavaScript
pub fn ecma_patterns(content: &str) -> Extraction {
    let mut claimed: HashSet<usize> = HashSet::new();
    let mut found: Vec<(usize, Result<Vec<Declaration>, DeclarationError>)> = Vec::new();

    for (pattern, rule) in ECMA_EXPORT_RULES.iter() {
        for caps in pattern.captures_iter(content) {
            let start = caps.get(0).map(|m| m.start()).unwrap_or(0);
            if !claimed.insert(start) {
                continue;
            }
            found.push((start, rule_declarations(*rule, &caps, content)));
        }
    }
    found.sort_by_key(|(start, _)| *start);

    let mut extraction = Extraction::default();
    for (_, outcome) in found {
        extraction.absorb(outcome);
    }

    let mut imports: Vec<(usize, ImportSymbol)> = Vec::new();
    for caps in ECMA_IMPORT_FROM.captures_iter(content) {
        let start = caps.get(0).map(|m| m.start()).unwrap_or(0);
        let line = line_at(content, start + (caps[0].len() - caps[0].trim_start().len()));
        for name in clause_names(&caps[1]) {
            imports.push((start, import(&name, &caps[2], line)));
        }
    }
    for caps in ECMA_IMPORT_BARE.captures_iter(content) {
        let start = caps.get(0).map(|m| m.start()).unwrap_or(0);
        let line = line_at(content, start + (caps[0].len() - caps[0].trim_start().len()));
        imports.push((start, import("*", &caps[1], line)));
    }
    for caps in ECMA_IMPORT_REQUIRE.captures_iter(content) {
        let start = caps.get(0).map(|m| m.start()).unwrap_or(0);
        let line = line_at(content, start + (caps[0].len() - caps[0].trim_start().len()));
        imports.push((start, import(&caps[1], &caps[2], line)));
    }
    imports.sort_by_key(|(start, _)| *start);
    extraction.imports = imports.into_iter().map(|(_, i)| i).collect();

    extraction
}

fn import(name: &str, source: &str, line: usize) -> ImportSymbol {
    ImportSymbol {
        name: name.to_string(),
        source: source.to_string(),
        line_number: line,
    }
}

/// Indented lines following the header at `start`, ending at the first
/// non-blank line indented no deeper than `indent`
fn python_block(content: &str, start: usize, indent: usize) -> (usize, usize) {
    let body_start = content[start..].find('\n').map(|n| start + n + 1).unwrap_or(content.len());
    let mut end = body_start;
    let mut pos = body_start;

    for line in content[body_start..].split_inclusive('\n') {
        let trimmed = line.trim_start();
        let depth = line.len() - trimmed.len();
        let blank = trimmed.trim().is_empty() || trimmed.starts_with('#');
        if !blank && depth <= indent {
            break;
        }
        pos += line.len();
        if !blank {
            end = pos;
        }
    }

    (body_start, end)
}

fn python_function(name: &str, line: usize, content: &str, def_end: usize, is_async: bool, skip_receiver: bool) -> FunctionDecl {
    let mut function = FunctionDecl::new(name, line);
    function.visibility = underscore_visibility(name);
    function.is_async = is_async;

    let open = def_end.saturating_sub(1);
    if let Some(signature) = scan_signature(content, open, Syntax::Python) {
        let mut params = signature.params;
        if skip_receiver && params.first().map(|p| p.name == "self" || p.name == "cls").unwrap_or(false) {
            params.remove(0);
        }
        function.params = params;
        function.return_type = signature.return_type;
    }

    let line_start = content[..def_end].rfind('\n').map(|n| n + 1).unwrap_or(0);
    let header = &content[line_start..def_end];
    let indent = header.len() - header.trim_start().len();
    let (body_start, body_end) = python_block(content, def_end, indent);
    function.is_generator = YIELD.is_match(&content[body_start..body_end]);
    function
}

fn python_class(name: &str, line: usize, bases: Option<&str>, content: &str, header_end: usize) -> ClassDecl {
    let mut class = ClassDecl::new(name, line);
    class.visibility = underscore_visibility(name);

    let bases: Vec<String> = bases
        .map(|b| split_top_level(b, ','))
        .unwrap_or_default()
        .into_iter()
        .filter(|b| !b.contains('='))
        .collect();
    let mut bases = bases.into_iter();
    class.extends = bases.next();
    class.implements = bases.collect();

    let (body_start, body_end) = python_block(content, header_end, 0);
    let body = &content[body_start..body_end];
    let member_indent = body
        .lines()
        .find(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .unwrap_or(0);

    let mut offset = body_start;
    for raw in body.split_inclusive('\n') {
        let line_start = offset;
        offset += raw.len();

        let trimmed = raw.trim_start();
        if raw.len() - trimmed.len() != member_indent || trimmed.trim().is_empty() {
            continue;
        }
        let member_line = line_at(content, line_start);
        let text_at = line_start + (raw.len() - trimmed.len());

        if let Some(caps) = PY_MEMBER_DEF.captures(trimmed) {
            let member = &caps[2];
            if underscore_visibility(member) == Visibility::Private {
                continue;
            }
            let def_end = text_at + caps.get(0).map(|m| m.end()).unwrap_or(0);
            if scan_signature(content, def_end.saturating_sub(1), Syntax::Python).is_none() {
                class.errors.push(malformed_member(name, member_line));
                continue;
            }
            let function = python_function(member, member_line, content, def_end, caps.get(1).is_some(), true);
            if member == "__init__" {
                class.constructors.push(function);
            } else {
                class.methods.push(function);
            }
        } else if let Some(caps) = PY_MEMBER_ASSIGN.captures(trimmed) {
            let member = &caps[1];
            if underscore_visibility(member) == Visibility::Public {
                class.properties.push(VariableDecl::new(member, member_line));
            }
        }
    }

    class
}

fn python_import_names(names: &str) -> Vec<String> {
    let names = names.trim().trim_start_matches('(').trim_end_matches(')');
    split_top_level(names, ',')
        .iter()
        .filter_map(|n| n.split_whitespace().next().map(str::to_string))
        .collect()
}

/// Pattern extraction for Python
pub fn python_patterns(content: &str) -> Extraction {
    let mut found: Vec<(usize, Declaration)> = Vec::new();

    for caps in PY_DEF.captures_iter(content) {
        let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
        let function = python_function(&caps[2], line_at(content, whole.0), content, whole.1, caps.get(1).is_some(), false);
        found.push((whole.0, Declaration::Function(function)));
    }
    for caps in PY_CLASS.captures_iter(content) {
        let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
        let bases = caps.get(2).map(|m| m.as_str());
        let class = python_class(&caps[1], line_at(content, whole.0), bases, content, whole.1);
        found.push((whole.0, Declaration::Class(class)));
    }
    for caps in PY_ASSIGN.captures_iter(content) {
        let start = caps.get(0).map(|m| m.start()).unwrap_or(0);
        let mut variable = VariableDecl::new(&caps[1], line_at(content, start));
        variable.visibility = underscore_visibility(&caps[1]);
        found.push((start, Declaration::Variable(variable)));
    }
    found.sort_by_key(|(start, _)| *start);

    let mut extraction = Extraction::default();
    extraction.absorb(Ok(found.into_iter().map(|(_, d)| d).collect()));

    let mut imports: Vec<(usize, ImportSymbol)> = Vec::new();
    for caps in PY_IMPORT.captures_iter(content) {
        let start = caps.get(0).map(|m| m.start()).unwrap_or(0);
        let line = line_at(content, start);
        for module in python_import_names(&caps[1]) {
            imports.push((start, import(&module, &module, line)));
        }
    }
    for caps in PY_FROM_IMPORT.captures_iter(content) {
        let start = caps.get(0).map(|m| m.start()).unwrap_or(0);
        let line = line_at(content, start);
        for name in python_import_names(&caps[2]) {
            imports.push((start, import(&name, &caps[1], line)));
        }
    }
    imports.sort_by_key(|(start, _)| *start);
    extraction.imports = imports.into_iter().map(|(_, i)| i).collect();

    extraction
}
