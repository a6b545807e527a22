//! JavaScript / TypeScript boundary extraction.
//!
//! Typed files parse with the TypeScript grammar first. When that tree has
//! errors and yields nothing, type syntax is blanked out line-for-line and
//! the result is parsed as plain JavaScript.

use super::grammar::{field_text, leading_trivia_start, line_range, node_text, parse_tree, push_boundary};
use crate::domain::{BoundaryKind, CodeBoundary};
use once_cell::sync::Lazy;
use regex::Regex;
use tree_sitter::{Language, Node};

const ECMA_TRIVIA: &[&str] = &["comment", "decorator"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcmaDialect {
    JavaScript,
    TypeScript,
    Tsx,
}

#[derive(Clone)]
pub struct EcmaParser {
    javascript: Language,
    typescript: Language,
    tsx: Language,
}

impl std::fmt::Debug for EcmaParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EcmaParser")
    }
}

impl Default for EcmaParser {
    fn default() -> Self {
        Self::new()
    }
}

impl EcmaParser {
    pub fn new() -> Self {
        Self {
            javascript: tree_sitter_javascript::LANGUAGE.into(),
            typescript: tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            tsx: tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }

    pub fn extract(&self, content: &str, dialect: EcmaDialect) -> Result<Vec<CodeBoundary>, String> {
        match dialect {
            EcmaDialect::JavaScript => extract_with(&self.javascript, content).map(|(b, _)| b),
            EcmaDialect::TypeScript | EcmaDialect::Tsx => {
                let grammar = if dialect == EcmaDialect::Tsx { &self.tsx } else { &self.typescript };
                let (boundaries, had_errors) = extract_with(grammar, content)?;
                if !boundaries.is_empty() || !had_errors {
                    return Ok(boundaries);
                }
                tracing::debug!("typed parse yielded nothing, retrying with stripped types");
                let stripped = strip_type_syntax(content);
                let (mut fallback, _) = extract_with(&self.javascript, &stripped.source)?;
                fallback.extend(stripped.declarations);
                fallback.sort_by_key(|b| (b.start_line, std::cmp::Reverse(b.end_line)));
                Ok(fallback)
            }
        }
    }
}

fn extract_with(language: &Language, content: &str) -> Result<(Vec<CodeBoundary>, bool), String> {
    let tree = parse_tree(language, content)?;
    let root = tree.root_node();
    let src = content.as_bytes();
    let mut out = Vec::new();

    for i in 0..root.named_child_count() {
        let Some(child) = root.named_child(i) else { continue };
        visit_statement(child, child, false, src, &mut out);
    }

    Ok((out, root.has_error()))
}

/// `outer` carries the line range (an `export` wrapper), `node` the declaration.
fn visit_statement(node: Node<'_>, outer: Node<'_>, exported: bool, src: &[u8], out: &mut Vec<CodeBoundary>) {
    let (_, end) = line_range(outer);
    let start = leading_trivia_start(outer, ECMA_TRIVIA);

    match node.kind() {
        "export_statement" => {
            if let Some(declaration) = node.child_by_field_name("declaration") {
                visit_statement(declaration, node, true, src, out);
            } else if node_text(node, src).starts_with("export default") {
                let name = default_export_name(node, src);
                push_boundary(out, BoundaryKind::Block, name, start, end, true);
            }
        }
        "function_declaration" | "generator_function_declaration" => {
            let name = field_text(node, "name", src).unwrap_or_default();
            push_boundary(out, BoundaryKind::Function, name, start, end, exported);
        }
        "class_declaration" | "abstract_class_declaration" => {
            let name = field_text(node, "name", src).unwrap_or_else(|| "default".to_string());
            push_boundary(out, BoundaryKind::Class, name.clone(), start, end, exported);
            if let Some(body) = node.child_by_field_name("body") {
                class_methods(&name, body, src, out);
            }
        }
        "interface_declaration" | "enum_declaration" => {
            let name = field_text(node, "name", src).unwrap_or_default();
            push_boundary(out, BoundaryKind::Class, name, start, end, exported);
        }
        "type_alias_declaration" => {
            let name = field_text(node, "name", src).unwrap_or_default();
            push_boundary(out, BoundaryKind::Constant, name, start, end, exported);
        }
        "internal_module" | "module" => {
            let name = field_text(node, "name", src).unwrap_or_default();
            push_boundary(out, BoundaryKind::Block, name, start, end, exported);
        }
        "lexical_declaration" | "variable_declaration" => {
            declarators(node, start, end, exported, src, out);
        }
        _ => {}
    }
}

fn default_export_name(node: Node<'_>, src: &[u8]) -> String {
    node.child_by_field_name("value")
        .filter(|v| v.kind() == "identifier")
        .map(|v| node_text(v, src).to_string())
        .unwrap_or_else(|| "default".to_string())
}

fn declarators(
    node: Node<'_>,
    start: usize,
    end: usize,
    exported: bool,
    src: &[u8],
    out: &mut Vec<CodeBoundary>,
) {
    let is_const = node_text(node, src).trim_start().starts_with("const");
    let mut names = Vec::new();
    let mut has_function = false;

    for i in 0..node.named_child_count() {
        let Some(declarator) = node.named_child(i) else { continue };
        if declarator.kind() != "variable_declarator" {
            continue;
        }
        let Some(name_node) = declarator.child_by_field_name("name") else { continue };
        if name_node.kind() != "identifier" {
            continue;
        }
        let is_function = declarator.child_by_field_name("value").is_some_and(|v| {
            matches!(v.kind(), "arrow_function" | "function_expression" | "function" | "generator_function")
        });
        has_function |= is_function;
        names.push(node_text(name_node, src).to_string());
    }

    let Some(first) = names.into_iter().next() else { return };
    if has_function {
        push_boundary(out, BoundaryKind::Function, first, start, end, exported);
    } else if is_const {
        push_boundary(out, BoundaryKind::Constant, first, start, end, exported);
    }
}

fn class_methods(class_name: &str, body: Node<'_>, src: &[u8], out: &mut Vec<CodeBoundary>) {
    for i in 0..body.named_child_count() {
        let Some(member) = body.named_child(i) else { continue };
        if !matches!(member.kind(), "method_definition" | "method_signature" | "abstract_method_signature") {
            continue;
        }
        let name = field_text(member, "name", src).unwrap_or_default();
        let (_, end) = line_range(member);
        let start = leading_trivia_start(member, ECMA_TRIVIA);
        let private = name.starts_with('#')
            || (0..member.child_count())
                .filter_map(|c| member.child(c))
                .any(|c| c.kind() == "accessibility_modifier" && node_text(c, src) == "private");
        push_boundary(
            out,
            BoundaryKind::Method,
            format!("{class_name}.{name}"),
            start,
            end,
            !private,
        );
    }
}

/// Source with type-only syntax blanked, plus the declarations that were removed.
#[derive(Debug, Clone)]
pub struct StrippedSource {
    pub source: String,
    pub declarations: Vec<CodeBoundary>,
}

static TYPE_DECL_HEAD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(export\s+)?(declare\s+)?(interface|type)\s+([A-Za-z_$][\w$]*)").expect("valid regex")
});
static IMPORT_TYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(import|export)\s+type\s").expect("valid regex"));
static RETURN_TYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\)(\s*:\s*[\w$.<>\[\]|&,'" ]+?)\s*(\{|=>)"#).expect("valid regex"));
static PARAM_TYPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[(,]\s*(?:\.\.\.)?[A-Za-z_$][\w$]*(\??\s*:\s*[\w$.<>\[\]'"]+(?:\s*[|&]\s*[\w$.<>\[\]'"]+)*)"#)
        .expect("valid regex")
});
static VAR_TYPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:const|let|var)\s+[A-Za-z_$][\w$]*(\s*:\s*[^=;]+?)\s*=").expect("valid regex")
});
static MODIFIERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(public|private|protected|readonly|abstract|override|declare)\s+").expect("valid regex")
});
static IMPLEMENTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(implements\s+[\w$.,<> ]+?)\s*\{").expect("valid regex"));
static GENERIC_PARAMS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:function\s*\*?|class)\s+[A-Za-z_$][\w$]*\s*(<[^>(){]*>)").expect("valid regex")
});
static CLASS_FIELD_TYPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:static\s+)?[A-Za-z_$#][\w$]*(\??\s*:\s*[^=;(]+?)\s*[=;]").expect("valid regex")
});
static NON_NULL: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\w)\]](!)[.\[);,\s]").expect("valid regex"));

/// Blank TypeScript-only syntax so the JavaScript grammar can parse the file.
///
/// Replacement keeps every newline, so line numbers in the stripped source
/// match the original.
pub fn strip_type_syntax(content: &str) -> StrippedSource {
    let lines: Vec<&str> = content.split_inclusive('\n').collect();
    let mut out_lines: Vec<String> = Vec::with_capacity(lines.len());
    let mut declarations = Vec::new();
    let mut idx = 0;

    while idx < lines.len() {
        let line = lines[idx];

        if IMPORT_TYPE.is_match(line) {
            let end = statement_end(&lines, idx);
            for l in &lines[idx..=end] {
                out_lines.push(blank(l));
            }
            idx = end + 1;
            continue;
        }

        if let Some(caps) = TYPE_DECL_HEAD.captures(line) {
            let keyword = caps.get(3).map_or("", |m| m.as_str());
            let name = caps.get(4).map_or("", |m| m.as_str()).to_string();
            let end = statement_end(&lines, idx);
            let kind = if keyword == "interface" { BoundaryKind::Class } else { BoundaryKind::Constant };
            declarations.push(CodeBoundary {
                kind,
                name,
                start_line: idx + 1,
                end_line: end + 1,
                exported: caps.get(1).is_some(),
            });
            for l in &lines[idx..=end] {
                out_lines.push(blank(l));
            }
            idx = end + 1;
            continue;
        }

        out_lines.push(strip_inline_types(line));
        idx += 1;
    }

    StrippedSource { source: out_lines.concat(), declarations }
}

/// Last line index of a statement starting at `start`: braces balanced and,
/// for brace-less statements, a terminating `;` or end of line.
fn statement_end(lines: &[&str], start: usize) -> usize {
    let mut depth: i64 = 0;
    let mut seen_brace = false;
    for (offset, line) in lines[start..].iter().enumerate() {
        for ch in line.chars() {
            match ch {
                '{' => {
                    depth += 1;
                    seen_brace = true;
                }
                '}' => depth -= 1,
                _ => {}
            }
        }
        let trimmed = line.trim_end();
        let continues = trimmed.ends_with('=') || trimmed.ends_with('|') || trimmed.ends_with('&');
        if depth <= 0 && (seen_brace || !continues) {
            return start + offset;
        }
    }
    lines.len() - 1
}

fn blank(line: &str) -> String {
    line.chars().map(|c| if c == '\n' || c == '\r' { c } else { ' ' }).collect()
}

fn blank_group(line: &str, re: &Regex, group: usize) -> String {
    let mut bytes = line.as_bytes().to_vec();
    for caps in re.captures_iter(line) {
        if let Some(m) = caps.get(group) {
            for b in &mut bytes[m.start()..m.end()] {
                if *b != b'\n' && *b != b'\r' {
                    *b = b' ';
                }
            }
        }
    }
    // Whole code points are blanked, so the result is still UTF-8.
    String::from_utf8(bytes).unwrap_or_else(|_| line.to_string())
}

fn strip_inline_types(line: &str) -> String {
    let mut current = line.to_string();
    for (re, group) in [
        (&*RETURN_TYPE, 1),
        (&*VAR_TYPE, 1),
        (&*PARAM_TYPE, 1),
        (&*MODIFIERS, 1),
        (&*CLASS_FIELD_TYPE, 1),
        (&*IMPLEMENTS, 1),
        (&*GENERIC_PARAMS, 1),
        (&*NON_NULL, 1),
    ] {
        current = blank_group(&current, re, group);
    }
    current
}
