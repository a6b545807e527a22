//! Lexical call graph around one symbol.
//!
//! Units come from chunk unit names where the parser provided them and
//! from declaration lines otherwise. Call sites are `name(` occurrences;
//! there is no scope or type resolution, so identically named functions
//! in different files are indistinguishable.

use super::declaration_on_line;
use crate::domain::{Chunk, ChunkKind};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// File label for callees with no definition in the index.
pub const EXTERNAL: &str = "(external)";

static CALL: Lazy<Regex> = Lazy::new(|| Regex::new(r"([A-Za-z_$][\w$]*)\s*\(").expect("valid regex"));
static PART_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+\((?:part \d+/\d+|cont\.)\)$").expect("valid regex"));

const NOT_CALLS: &[&str] = &[
    "if", "else", "elif", "for", "while", "switch", "case", "catch", "return", "function", "typeof",
    "instanceof", "new", "delete", "void", "await", "yield", "super", "this", "self", "with", "not", "and",
    "or", "in", "assert", "lambda", "match", "loop", "fn", "def", "func", "defer", "go", "select", "sizeof",
    "constructor",
];

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct CallSite {
    pub source_id: String,
    pub file_path: String,
    pub line: usize,
    /// Enclosing unit for callers, qualified name for definitions
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Callee {
    pub name: String,
    /// Defining file, or `(external)`
    pub file_path: String,
    pub source_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallGraph {
    pub target: String,
    pub definitions: Vec<CallSite>,
    pub callers: Vec<CallSite>,
    pub callees: Vec<Callee>,
}

struct Unit<'a> {
    qualified: String,
    bare: String,
    source_id: &'a str,
    file_path: &'a str,
    start_line: usize,
    lines: Vec<(usize, &'a str)>,
}

/// `Class.method`, `Type::method` and `name (part 2/3)` all reduce to the
/// trailing identifier.
fn bare_name(qualified: &str) -> String {
    let trimmed = PART_SUFFIX.replace(qualified, "");
    trimmed.rsplit(['.', ':']).next().unwrap_or(trimmed.as_ref()).trim().to_string()
}

fn collect_units(chunks: &[Chunk]) -> Vec<Unit<'_>> {
    let mut units = Vec::new();
    for chunk in chunks {
        let numbered: Vec<(usize, &str)> =
            chunk.content.lines().enumerate().map(|(i, l)| (chunk.start_line + i, l)).collect();

        let named = chunk
            .unit_name
            .as_deref()
            .filter(|name| !name.starts_with("impl ") && !name.starts_with('('))
            .filter(|_| {
                matches!(chunk.kind, ChunkKind::Function | ChunkKind::Method | ChunkKind::Class | ChunkKind::Constant)
            });
        if let Some(name) = named {
            let qualified = PART_SUFFIX.replace(name, "").into_owned();
            units.push(Unit {
                bare: bare_name(&qualified),
                qualified,
                source_id: &chunk.source_id,
                file_path: &chunk.file_path,
                start_line: chunk.start_line,
                lines: numbered,
            });
            continue;
        }

        // Unnamed chunk: each declaration line opens a unit
        let mut current: Option<Unit<'_>> = None;
        for (line_no, text) in numbered {
            if let Some((_, name)) = declaration_on_line(text) {
                units.extend(current.take());
                current = Some(Unit {
                    bare: name.clone(),
                    qualified: name,
                    source_id: &chunk.source_id,
                    file_path: &chunk.file_path,
                    start_line: line_no,
                    lines: Vec::new(),
                });
            }
            if let Some(unit) = current.as_mut() {
                unit.lines.push((line_no, text));
            }
        }
        units.extend(current);
    }
    units
}

fn is_comment(line: &str) -> bool {
    let t = line.trim_start();
    t.starts_with("//") || t.starts_with('#') || t.starts_with("/*") || t.starts_with('*')
}

/// Identifiers called on `line`, excluding keywords and anything the line declares.
fn calls_on_line(line: &str) -> Vec<&str> {
    if is_comment(line) {
        return Vec::new();
    }
    let declared = declaration_on_line(line).map(|(_, name)| name);
    CALL.captures_iter(line)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .filter(|name| !NOT_CALLS.contains(name))
        .filter(|name| declared.as_deref() != Some(*name))
        .collect()
}

/// Callers and callees of `symbol` across all chunks.
///
/// `symbol` matches either a bare name (`login`) or a qualified unit name
/// (`AuthService.login`).
pub fn build_call_graph(chunks: &[Chunk], symbol: &str) -> CallGraph {
    let symbol = symbol.trim();
    let target_bare = bare_name(symbol);
    let units = collect_units(chunks);
    let is_target = |unit: &Unit<'_>| unit.qualified == symbol || unit.bare == target_bare;

    let mut definitions = BTreeSet::new();
    let mut callers = BTreeSet::new();
    let mut called: BTreeSet<String> = BTreeSet::new();

    for unit in &units {
        if is_target(unit) {
            definitions.insert(CallSite {
                source_id: unit.source_id.to_string(),
                file_path: unit.file_path.to_string(),
                line: unit.start_line,
                name: unit.qualified.clone(),
            });
            for (_, line) in &unit.lines {
                called.extend(calls_on_line(line).into_iter().filter(|c| *c != target_bare).map(str::to_string));
            }
            continue;
        }
        for (line_no, line) in &unit.lines {
            if calls_on_line(line).contains(&target_bare.as_str()) {
                callers.insert(CallSite {
                    source_id: unit.source_id.to_string(),
                    file_path: unit.file_path.to_string(),
                    line: *line_no,
                    name: unit.qualified.clone(),
                });
            }
        }
    }

    let mut defined_in: BTreeMap<&str, BTreeSet<(&str, &str)>> = BTreeMap::new();
    for unit in &units {
        defined_in.entry(unit.bare.as_str()).or_default().insert((unit.source_id, unit.file_path));
    }

    let mut callees = Vec::new();
    for name in &called {
        match defined_in.get(name.as_str()) {
            Some(files) => callees.extend(files.iter().map(|(source_id, path)| Callee {
                name: name.clone(),
                file_path: path.to_string(),
                source_id: Some(source_id.to_string()),
            })),
            None => callees.push(Callee { name: name.clone(), file_path: EXTERNAL.to_string(), source_id: None }),
        }
    }

    // Overlapping windows report the same call site once
    let mut seen = HashSet::new();
    let callers: Vec<CallSite> = callers
        .into_iter()
        .filter(|c: &CallSite| seen.insert((c.source_id.clone(), c.file_path.clone(), c.line)))
        .collect();

    CallGraph {
        target: symbol.to_string(),
        definitions: definitions.into_iter().collect(),
        callers,
        callees,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(path: &str, start: usize, content: &str, unit: Option<(&str, ChunkKind)>) -> Chunk {
        Chunk {
            id: format!("{path}:{start}"),
            source_id: "s".to_string(),
            file_path: path.to_string(),
            content: content.to_string(),
            start_line: start,
            end_line: start + content.lines().count().saturating_sub(1),
            token_count: 1,
            kind: unit.map(|(_, k)| k).unwrap_or(ChunkKind::Window),
            unit_name: unit.map(|(n, _)| n.to_string()),
            exported: None,
            embedding: Vec::new(),
        }
    }

    fn fixture() -> Vec<Chunk> {
        vec![
            chunk(
                "auth.ts",
                1,
                "export function login(user) {\n  const ok = validate(user);\n  audit.log('login');\n  return hash(user.name);\n}",
                Some(("login", ChunkKind::Function)),
            ),
            chunk("util.ts", 1, "export function hash(s) {\n  return s;\n}\n\nexport function validate(u) {\n  if (u) { return true; }\n}", None),
            chunk("app.ts", 10, "class App {\n  start() {\n    login(this.user);\n  }\n}", Some(("App", ChunkKind::Class))),
            chunk("cli.py", 1, "def main():\n    # login() in a comment\n    login(args)\n", None),
        ]
    }

    #[test]
    fn callers_are_found_across_files() {
        let graph = build_call_graph(&fixture(), "login");
        assert_eq!(graph.definitions.len(), 1);
        assert_eq!(graph.definitions[0].file_path, "auth.ts");

        let callers: Vec<(&str, usize, &str)> =
            graph.callers.iter().map(|c| (c.file_path.as_str(), c.line, c.name.as_str())).collect();
        assert_eq!(callers, vec![("app.ts", 12, "App"), ("cli.py", 3, "main")]);
    }

    #[test]
    fn callees_resolve_to_defining_files_or_external() {
        let graph = build_call_graph(&fixture(), "login");
        let callees: Vec<(&str, &str)> =
            graph.callees.iter().map(|c| (c.name.as_str(), c.file_path.as_str())).collect();
        assert_eq!(callees, vec![("hash", "util.ts"), ("log", EXTERNAL), ("validate", "util.ts")]);
    }

    #[test]
    fn qualified_and_split_names_reduce_to_bare() {
        assert_eq!(bare_name("AuthService.login"), "login");
        assert_eq!(bare_name("Store::open"), "open");
        assert_eq!(bare_name("render (part 2/3)"), "render");
    }

    #[test]
    fn unknown_symbol_yields_empty_graph() {
        let graph = build_call_graph(&fixture(), "nothing_here");
        assert!(graph.definitions.is_empty());
        assert!(graph.callers.is_empty());
        assert!(graph.callees.is_empty());
    }
}
