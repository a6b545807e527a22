//! Tree-sitter hosted boundary extraction for Python, Rust and Go.
//!
//! Only top-level declarations (and the members of container declarations)
//! become boundaries; nested functions stay inside their parent unit.

use crate::domain::{BoundaryKind, CodeBoundary};
use tree_sitter::{Language, Node, Parser, Tree};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrammarLanguage {
    Python,
    Rust,
    Go,
}

impl GrammarLanguage {
    pub fn name(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Rust => "rust",
            Self::Go => "go",
        }
    }

    fn tree_sitter_language(self) -> Language {
        match self {
            Self::Python => tree_sitter_python::LANGUAGE.into(),
            Self::Rust => tree_sitter_rust::LANGUAGE.into(),
            Self::Go => tree_sitter_go::LANGUAGE.into(),
        }
    }
}

/// Parser backed by an embedded tree-sitter grammar.
#[derive(Clone)]
pub struct GrammarParser {
    kind: GrammarLanguage,
    language: Language,
}

impl std::fmt::Debug for GrammarParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrammarParser").field("kind", &self.kind).finish()
    }
}

impl GrammarParser {
    pub fn new(kind: GrammarLanguage) -> Self {
        Self { kind, language: kind.tree_sitter_language() }
    }

    pub fn language_name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn extract(&self, content: &str) -> Result<Vec<CodeBoundary>, String> {
        let tree = parse_tree(&self.language, content)?;
        let root = tree.root_node();
        let src = content.as_bytes();
        let mut out = Vec::new();

        for i in 0..root.named_child_count() {
            let Some(child) = root.named_child(i) else { continue };
            match self.kind {
                GrammarLanguage::Python => visit_python(child, src, &mut out),
                GrammarLanguage::Rust => visit_rust(child, src, &mut out),
                GrammarLanguage::Go => visit_go(child, src, &mut out),
            }
        }

        Ok(out)
    }
}

pub(crate) fn parse_tree(language: &Language, content: &str) -> Result<Tree, String> {
    let mut parser = Parser::new();
    parser.set_language(language).map_err(|e| format!("grammar load failed: {e}"))?;
    parser.parse(content, None).ok_or_else(|| "parser returned no tree".to_string())
}

pub(crate) fn node_text<'a>(node: Node<'_>, src: &'a [u8]) -> &'a str {
    node.utf8_text(src).unwrap_or("")
}

pub(crate) fn field_text(node: Node<'_>, field: &str, src: &[u8]) -> Option<String> {
    node.child_by_field_name(field).map(|n| node_text(n, src).to_string())
}

/// 1-based inclusive line range of a node.
pub(crate) fn line_range(node: Node<'_>) -> (usize, usize) {
    let start = node.start_position().row;
    let end_pos = node.end_position();
    let end = if end_pos.column == 0 && end_pos.row > start { end_pos.row - 1 } else { end_pos.row };
    (start + 1, end + 1)
}

/// First row of contiguous comments/attributes/decorators directly above `node`.
pub(crate) fn leading_trivia_start(node: Node<'_>, trivia_kinds: &[&str]) -> usize {
    let mut start_row = node.start_position().row;
    let mut current = node;
    while let Some(prev) = current.prev_named_sibling() {
        if !trivia_kinds.contains(&prev.kind()) {
            break;
        }
        if prev.end_position().row + 1 < start_row {
            break;
        }
        start_row = prev.start_position().row;
        current = prev;
    }
    start_row + 1
}

pub(crate) fn push_boundary(
    out: &mut Vec<CodeBoundary>,
    kind: BoundaryKind,
    name: String,
    start_line: usize,
    end_line: usize,
    exported: bool,
) {
    if name.is_empty() || end_line < start_line {
        return;
    }
    out.push(CodeBoundary { kind, name, start_line, end_line, exported });
}

// ---------- Python ----------

const PYTHON_TRIVIA: &[&str] = &["comment"];

fn visit_python(node: Node<'_>, src: &[u8], out: &mut Vec<CodeBoundary>) {
    let (definition, outer) = match node.kind() {
        "decorated_definition" => match node.child_by_field_name("definition") {
            Some(def) => (def, node),
            None => return,
        },
        _ => (node, node),
    };
    let (_, end) = line_range(outer);
    let start = leading_trivia_start(outer, PYTHON_TRIVIA);

    match definition.kind() {
        "function_definition" => {
            let name = field_text(definition, "name", src).unwrap_or_default();
            let exported = !name.starts_with('_');
            push_boundary(out, BoundaryKind::Function, name, start, end, exported);
        }
        "class_definition" => {
            let name = field_text(definition, "name", src).unwrap_or_default();
            let exported = !name.starts_with('_');
            push_boundary(out, BoundaryKind::Class, name.clone(), start, end, exported);
            if let Some(body) = definition.child_by_field_name("body") {
                python_methods(&name, body, src, out);
            }
        }
        "expression_statement" => {
            let Some(assignment) = definition.named_child(0) else { return };
            if assignment.kind() != "assignment" {
                return;
            }
            let Some(left) = assignment.child_by_field_name("left") else { return };
            let name = node_text(left, src);
            if left.kind() == "identifier" && is_constant_name(name) {
                push_boundary(out, BoundaryKind::Constant, name.to_string(), start, end, true);
            }
        }
        _ => {}
    }
}

fn python_methods(class_name: &str, body: Node<'_>, src: &[u8], out: &mut Vec<CodeBoundary>) {
    for i in 0..body.named_child_count() {
        let Some(member) = body.named_child(i) else { continue };
        let function = match member.kind() {
            "function_definition" => member,
            "decorated_definition" => match member.child_by_field_name("definition") {
                Some(def) if def.kind() == "function_definition" => def,
                _ => continue,
            },
            _ => continue,
        };
        let method = field_text(function, "name", src).unwrap_or_default();
        let (_, end) = line_range(member);
        let start = leading_trivia_start(member, PYTHON_TRIVIA);
        let exported = !method.starts_with('_') || method.starts_with("__");
        push_boundary(
            out,
            BoundaryKind::Method,
            format!("{class_name}.{method}"),
            start,
            end,
            exported,
        );
    }
}

fn is_constant_name(name: &str) -> bool {
    name.chars().any(|c| c.is_ascii_uppercase())
        && name.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

// ---------- Rust ----------

const RUST_TRIVIA: &[&str] = &["line_comment", "block_comment", "attribute_item"];

fn rust_is_pub(node: Node<'_>) -> bool {
    (0..node.named_child_count())
        .filter_map(|i| node.named_child(i))
        .any(|c| c.kind() == "visibility_modifier")
}

fn visit_rust(node: Node<'_>, src: &[u8], out: &mut Vec<CodeBoundary>) {
    let (_, end) = line_range(node);
    let start = leading_trivia_start(node, RUST_TRIVIA);
    let exported = rust_is_pub(node);

    match node.kind() {
        "function_item" => {
            let name = field_text(node, "name", src).unwrap_or_default();
            push_boundary(out, BoundaryKind::Function, name, start, end, exported);
        }
        "struct_item" | "enum_item" | "union_item" | "type_item" => {
            let name = field_text(node, "name", src).unwrap_or_default();
            push_boundary(out, BoundaryKind::Class, name, start, end, exported);
        }
        "trait_item" => {
            let name = field_text(node, "name", src).unwrap_or_default();
            push_boundary(out, BoundaryKind::Class, name.clone(), start, end, exported);
            if let Some(body) = node.child_by_field_name("body") {
                rust_members(&name, body, src, out);
            }
        }
        "impl_item" => {
            let ty = field_text(node, "type", src).unwrap_or_default();
            let name = match field_text(node, "trait", src) {
                Some(tr) => format!("impl {tr} for {ty}"),
                None => format!("impl {ty}"),
            };
            push_boundary(out, BoundaryKind::Class, name, start, end, false);
            if let Some(body) = node.child_by_field_name("body") {
                rust_members(&ty, body, src, out);
            }
        }
        "const_item" | "static_item" => {
            let name = field_text(node, "name", src).unwrap_or_default();
            push_boundary(out, BoundaryKind::Constant, name, start, end, exported);
        }
        "mod_item" if node.child_by_field_name("body").is_some() => {
            let name = field_text(node, "name", src).unwrap_or_default();
            push_boundary(out, BoundaryKind::Block, format!("mod {name}"), start, end, exported);
        }
        "macro_definition" => {
            let name = field_text(node, "name", src).unwrap_or_default();
            push_boundary(out, BoundaryKind::Block, format!("{name}!"), start, end, false);
        }
        _ => {}
    }
}

fn rust_members(owner: &str, body: Node<'_>, src: &[u8], out: &mut Vec<CodeBoundary>) {
    for i in 0..body.named_child_count() {
        let Some(member) = body.named_child(i) else { continue };
        if !matches!(member.kind(), "function_item" | "function_signature_item") {
            continue;
        }
        let name = field_text(member, "name", src).unwrap_or_default();
        let (_, end) = line_range(member);
        let start = leading_trivia_start(member, RUST_TRIVIA);
        push_boundary(
            out,
            BoundaryKind::Method,
            format!("{owner}::{name}"),
            start,
            end,
            rust_is_pub(member),
        );
    }
}

// ---------- Go ----------

const GO_TRIVIA: &[&str] = &["comment"];

fn go_exported(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_uppercase())
}

fn visit_go(node: Node<'_>, src: &[u8], out: &mut Vec<CodeBoundary>) {
    let (_, end) = line_range(node);
    let start = leading_trivia_start(node, GO_TRIVIA);

    match node.kind() {
        "function_declaration" => {
            let name = field_text(node, "name", src).unwrap_or_default();
            let exported = go_exported(&name);
            push_boundary(out, BoundaryKind::Function, name, start, end, exported);
        }
        "method_declaration" => {
            let name = field_text(node, "name", src).unwrap_or_default();
            let receiver = field_text(node, "receiver", src)
                .map(|r| go_receiver_type(&r))
                .unwrap_or_default();
            let exported = go_exported(&name);
            let qualified = if receiver.is_empty() { name } else { format!("{receiver}.{name}") };
            push_boundary(out, BoundaryKind::Method, qualified, start, end, exported);
        }
        "type_declaration" => {
            if let Some(name) = first_spec_name(node, &["type_spec", "type_alias"], src) {
                let exported = go_exported(&name);
                push_boundary(out, BoundaryKind::Class, name, start, end, exported);
            }
        }
        "const_declaration" | "var_declaration" => {
            if let Some(name) = first_spec_name(node, &["const_spec", "var_spec"], src) {
                let exported = go_exported(&name);
                push_boundary(out, BoundaryKind::Constant, name, start, end, exported);
            }
        }
        _ => {}
    }
}

fn first_spec_name(node: Node<'_>, spec_kinds: &[&str], src: &[u8]) -> Option<String> {
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if spec_kinds.contains(&current.kind()) {
            return field_text(current, "name", src);
        }
        for i in (0..current.named_child_count()).rev() {
            if let Some(child) = current.named_child(i) {
                stack.push(child);
            }
        }
    }
    None
}

/// `(s *Server)` -> `Server`
fn go_receiver_type(receiver: &str) -> String {
    receiver
        .trim_matches(|c| c == '(' || c == ')')
        .split_whitespace()
        .last()
        .unwrap_or("")
        .trim_start_matches('*')
        .split('[')
        .next()
        .unwrap_or("")
        .to_string()
}
