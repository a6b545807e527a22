//! Lexical symbol search over indexed chunks
//!
//! Declarations are found with per-language line patterns, not a parse,
//! so symbols in any indexed file are searchable even when the file fell
//! back to window chunking.

pub mod callgraph;

pub use callgraph::{build_call_graph, CallGraph, CallSite, Callee};

use crate::domain::Chunk;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;

pub const DEFAULT_SYMBOL_LIMIT: usize = 20;
const MAX_SIGNATURE_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Function,
    Class,
    Interface,
    Type,
    Constant,
}

impl SymbolKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Interface => "interface",
            Self::Type => "type",
            Self::Constant => "constant",
        }
    }
}

static PATTERNS: Lazy<Vec<(SymbolKind, Regex)>> = Lazy::new(|| {
    let ident = r"([A-Za-z_$][\w$]*)";
    [
        // ECMAScript family
        (SymbolKind::Function, format!(r"^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\b\s*\*?\s*{ident}")),
        (
            SymbolKind::Function,
            format!(r"^\s*(?:export\s+)?(?:const|let|var)\s+{ident}\s*(?::[^=]+)?=\s*(?:async\s+)?(?:function\b|(?:\([^)]*\)|[\w$]+)\s*(?::[^=]+)?=>)"),
        ),
        (SymbolKind::Class, format!(r"^\s*(?:export\s+)?(?:default\s+)?(?:abstract\s+)?class\s+{ident}")),
        (SymbolKind::Interface, format!(r"^\s*(?:export\s+)?(?:declare\s+)?interface\s+{ident}")),
        (SymbolKind::Type, format!(r"^\s*(?:export\s+)?(?:declare\s+)?type\s+{ident}\s*(?:<[^>]*>)?\s*=")),
        (SymbolKind::Type, format!(r"^\s*(?:export\s+)?(?:const\s+)?enum\s+{ident}")),
        // Python
        (SymbolKind::Function, format!(r"^\s*(?:async\s+)?def\s+{ident}")),
        // Rust
        (SymbolKind::Function, format!(r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:const\s+)?(?:async\s+)?(?:unsafe\s+)?fn\s+{ident}")),
        (SymbolKind::Class, format!(r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:struct|enum|union)\s+{ident}")),
        (SymbolKind::Interface, format!(r"^\s*(?:pub(?:\([^)]*\))?\s+)?trait\s+{ident}")),
        (SymbolKind::Constant, format!(r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:const|static)\s+{ident}\s*:")),
        // Go
        (SymbolKind::Function, format!(r"^func\s+(?:\([^)]*\)\s*)?{ident}")),
        (SymbolKind::Class, format!(r"^type\s+{ident}\s+(?:struct|interface)\b")),
    ]
    .into_iter()
    .map(|(kind, pattern)| (kind, Regex::new(&pattern).expect("valid regex")))
    .collect()
});

/// A declaration located in one line of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolMatch {
    pub name: String,
    pub kind: SymbolKind,
    pub source_id: String,
    pub file_path: String,
    /// 1-based
    pub line: usize,
    pub signature: String,
}

/// The first declaration on `line`, if any.
pub fn declaration_on_line(line: &str) -> Option<(SymbolKind, String)> {
    if line.trim_start().starts_with(['/', '#', '*']) {
        return None;
    }
    PATTERNS
        .iter()
        .find_map(|(kind, re)| re.captures(line).and_then(|c| c.get(1)).map(|m| (*kind, m.as_str().to_string())))
}

/// Every declaration in `chunks`, one per `(source, path, line)`.
pub fn extract_declarations(chunks: &[Chunk]) -> Vec<SymbolMatch> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for chunk in chunks {
        for (offset, line) in chunk.content.lines().enumerate() {
            let Some((kind, name)) = declaration_on_line(line) else {
                continue;
            };
            let line_no = chunk.start_line + offset;
            if !seen.insert((chunk.source_id.clone(), chunk.file_path.clone(), line_no)) {
                continue;
            }
            out.push(SymbolMatch {
                name,
                kind,
                source_id: chunk.source_id.clone(),
                file_path: chunk.file_path.clone(),
                line: line_no,
                signature: line.trim().chars().take(MAX_SIGNATURE_CHARS).collect(),
            });
        }
    }
    out
}

/// Find declarations named like `query`.
///
/// `exact` requires case-sensitive equality; otherwise the name must
/// contain the query case-insensitively. Exact-name matches sort first,
/// then shorter names, then by location.
pub fn search_symbols(chunks: &[Chunk], query: &str, exact: bool, limit: usize) -> Vec<SymbolMatch> {
    let query = query.trim();
    if query.is_empty() || limit == 0 {
        return Vec::new();
    }
    let needle = query.to_lowercase();

    let mut matches: Vec<SymbolMatch> = extract_declarations(chunks)
        .into_iter()
        .filter(|m| if exact { m.name == query } else { m.name.to_lowercase().contains(&needle) })
        .collect();

    matches.sort_by(|a, b| {
        let a_exact = a.name.eq_ignore_ascii_case(query);
        let b_exact = b.name.eq_ignore_ascii_case(query);
        b_exact
            .cmp(&a_exact)
            .then_with(|| a.name.len().cmp(&b.name.len()))
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.source_id.cmp(&b.source_id))
            .then_with(|| a.file_path.cmp(&b.file_path))
            .then_with(|| a.line.cmp(&b.line))
    });
    matches.truncate(limit);
    matches
}
