//! File-level import graph built from import statements recorded at index
//! time.
//!
//! Extraction is lexical (regexes over source text) and resolution only
//! considers paths already present in the index, so third-party packages
//! never appear as nodes.

use crate::domain::language_for_path;
use crate::utils::{join_relative, parent_dir};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub use crate::domain::FileKey;

static JS_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^\s*import\s+(?:[\w*{}\s,$]+?\s+from\s+)?['"]([^'"]+)['"]"#).expect("valid regex")
});
static JS_EXPORT_FROM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^\s*export\s+(?:type\s+)?(?:\*(?:\s+as\s+[\w$]+)?|\{[^}]*\})\s*from\s+['"]([^'"]+)['"]"#)
        .expect("valid regex")
});
static JS_REQUIRE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\b(?:require|import)\(\s*['"]([^'"]+)['"]\s*\)"#).expect("valid regex"));

static PY_FROM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*from\s+(\.*)([\w.]*)\s+import\s+\(?([\w \t,.*]*)").expect("valid regex"));
static PY_IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*import\s+([\w.]+(?:\s+as\s+\w+)?(?:\s*,\s*[\w.]+(?:\s+as\s+\w+)?)*)").expect("valid regex"));

static RUST_MOD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?mod\s+([A-Za-z_]\w*)\s*;").expect("valid regex"));
static RUST_USE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?use\s+(crate|self|super)((?:::[A-Za-z_]\w*)+)").expect("valid regex"));

static GO_SINGLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^\s*import\s+(?:[\w.]+\s+)?"([^"]+)""#).expect("valid regex"));
static GO_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\bimport\s*\((.*?)\)").expect("valid regex"));
static QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r#""([^"]+)""#).expect("valid regex"));

const ECMA_EXTENSIONS: &[&str] = &["ts", "tsx", "d.ts", "js", "jsx", "mjs", "cjs", "mts", "cts"];
const ECMA_INDEX_FILES: &[&str] = &["index.ts", "index.tsx", "index.js", "index.jsx", "index.mjs"];

/// An unresolved import reference as written in source.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ImportRef {
    /// Relative or bare module specifier (`./auth`, `react`)
    Ecma(String),
    /// Leading-dot count plus dotted module path and imported names
    Python { level: usize, module: String, names: Vec<String> },
    /// `mod name;`
    RustMod(String),
    /// `use crate::a::b` style path, anchor first
    RustUse { anchor: String, segments: Vec<String> },
    /// Full Go import path
    Go(String),
}

fn import_patterns(language: &str) -> Vec<&'static Regex> {
    match language {
        "javascript" | "typescript" | "tsx" => vec![&*JS_IMPORT, &*JS_EXPORT_FROM, &*JS_REQUIRE],
        "python" => vec![&*PY_FROM, &*PY_IMPORT],
        "rust" => vec![&*RUST_MOD, &*RUST_USE],
        "go" => vec![&*GO_SINGLE, &*GO_BLOCK],
        _ => Vec::new(),
    }
}

/// Import statements of a whole file, in source order and deduplicated.
///
/// The indexer records these per file so the graph never depends on which
/// lines ended up inside a chunk. Joined with newlines, the statements parse
/// to the same references as the full file.
pub fn import_statements(path: &str, content: &str) -> Vec<String> {
    let mut found: Vec<(usize, &str)> = Vec::new();
    for re in import_patterns(language_for_path(path)) {
        found.extend(re.find_iter(content).map(|m| (m.start(), m.as_str().trim())));
    }
    found.sort();

    let mut statements: Vec<String> = Vec::with_capacity(found.len());
    for (_, text) in found {
        if !statements.iter().any(|s| s == text) {
            statements.push(text.to_string());
        }
    }
    statements
}

fn extract_refs(path: &str, content: &str) -> Vec<ImportRef> {
    let mut refs = Vec::new();
    match language_for_path(path) {
        "javascript" | "typescript" | "tsx" => {
            for re in [&*JS_IMPORT, &*JS_EXPORT_FROM, &*JS_REQUIRE] {
                refs.extend(re.captures_iter(content).map(|c| ImportRef::Ecma(c[1].to_string())));
            }
        }
        "python" => {
            for caps in PY_FROM.captures_iter(content) {
                let names = caps[3]
                    .split(',')
                    .filter_map(|n| n.split_whitespace().next())
                    .filter(|n| *n != "*")
                    .map(str::to_string)
                    .collect();
                refs.push(ImportRef::Python { level: caps[1].len(), module: caps[2].to_string(), names });
            }
            for caps in PY_IMPORT.captures_iter(content) {
                for module in caps[1].split(',').filter_map(|m| m.split_whitespace().next()) {
                    refs.push(ImportRef::Python { level: 0, module: module.to_string(), names: Vec::new() });
                }
            }
        }
        "rust" => {
            refs.extend(RUST_MOD.captures_iter(content).map(|c| ImportRef::RustMod(c[1].to_string())));
            for caps in RUST_USE.captures_iter(content) {
                let segments = caps[2].split("::").filter(|s| !s.is_empty()).map(str::to_string).collect();
                refs.push(ImportRef::RustUse { anchor: caps[1].to_string(), segments });
            }
        }
        "go" => {
            refs.extend(GO_SINGLE.captures_iter(content).map(|c| ImportRef::Go(c[1].to_string())));
            for block in GO_BLOCK.captures_iter(content) {
                refs.extend(QUOTED.captures_iter(&block[1]).map(|c| ImportRef::Go(c[1].to_string())));
            }
        }
        _ => {}
    }
    refs
}

/// Known paths of one source.
struct PathIndex<'a> {
    paths: BTreeSet<&'a str>,
}

impl<'a> PathIndex<'a> {
    fn has(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    fn first_existing(&self, candidates: impl IntoIterator<Item = String>) -> Option<String> {
        candidates.into_iter().find(|c| self.has(c))
    }

    /// Shortest known path equal to `suffix` or ending in `/suffix`.
    fn by_suffix(&self, suffix: &str) -> Option<String> {
        let tail = format!("/{suffix}");
        self.paths
            .iter()
            .filter(|p| **p == suffix || p.ends_with(&tail))
            .min_by_key(|p| (p.len(), **p))
            .map(|p| p.to_string())
    }

    fn resolve(&self, from: &str, import: &ImportRef) -> Vec<String> {
        match import {
            ImportRef::Ecma(spec) => self.resolve_ecma(from, spec).into_iter().collect(),
            ImportRef::Python { level, module, names } => self.resolve_python(from, *level, module, names),
            ImportRef::RustMod(name) => self.resolve_rust_mod(from, name).into_iter().collect(),
            ImportRef::RustUse { anchor, segments } => {
                self.resolve_rust_use(from, anchor, segments).into_iter().collect()
            }
            ImportRef::Go(import_path) => self.resolve_go(import_path),
        }
    }

    fn resolve_ecma(&self, from: &str, spec: &str) -> Option<String> {
        if !spec.starts_with('.') {
            return None;
        }
        let target = join_relative(parent_dir(from), spec);
        let mut candidates = vec![target.clone()];
        // `./auth.js` in TypeScript sources refers to `./auth.ts`
        let stem = target
            .strip_suffix(".js")
            .or_else(|| target.strip_suffix(".jsx"))
            .or_else(|| target.strip_suffix(".mjs"))
            .unwrap_or(&target)
            .to_string();
        candidates.extend(ECMA_EXTENSIONS.iter().map(|ext| format!("{stem}.{ext}")));
        candidates.extend(ECMA_INDEX_FILES.iter().map(|index| join_relative(&target, index)));
        self.first_existing(candidates)
    }

    fn resolve_python(&self, from: &str, level: usize, module: &str, names: &[String]) -> Vec<String> {
        let module_path = module.replace('.', "/");
        let module_candidates = |base: &str| {
            let joined = join_relative(base, &module_path);
            vec![format!("{joined}.py"), format!("{joined}.pyi"), join_relative(&joined, "__init__.py")]
        };

        if level > 0 {
            let mut base = parent_dir(from).to_string();
            for _ in 1..level {
                base = parent_dir(&base).to_string();
            }
            if module.is_empty() {
                // `from . import a, b` imports sibling modules
                return names
                    .iter()
                    .filter_map(|name| {
                        let joined = join_relative(&base, name);
                        self.first_existing([format!("{joined}.py"), join_relative(&joined, "__init__.py")])
                    })
                    .collect();
            }
            if let Some(found) = self.first_existing(module_candidates(&base)) {
                return vec![found];
            }
            return Vec::new();
        }

        [format!("{module_path}.py"), format!("{module_path}/__init__.py")]
            .iter()
            .find_map(|candidate| self.by_suffix(candidate))
            .into_iter()
            .collect()
    }

    /// Directory that holds child modules declared by `from`.
    fn rust_child_dir(from: &str) -> String {
        let dir = parent_dir(from);
        let file_name = from.rsplit('/').next().unwrap_or(from);
        match file_name {
            "mod.rs" | "lib.rs" | "main.rs" => dir.to_string(),
            other => join_relative(dir, other.trim_end_matches(".rs")),
        }
    }

    fn rust_module_file(&self, dir: &str) -> Option<String> {
        self.first_existing([format!("{dir}.rs"), join_relative(dir, "mod.rs")])
    }

    fn resolve_rust_mod(&self, from: &str, name: &str) -> Option<String> {
        let child_dir = Self::rust_child_dir(from);
        self.rust_module_file(&join_relative(&child_dir, name))
    }

    fn resolve_rust_use(&self, from: &str, anchor: &str, segments: &[String]) -> Option<String> {
        let base = match anchor {
            "crate" => match from.rfind("src/") {
                Some(idx) if idx == 0 || from[..idx].ends_with('/') => from[..idx + 3].to_string(),
                _ => String::new(),
            },
            "self" => Self::rust_child_dir(from),
            _ => parent_dir(&Self::rust_child_dir(from)).to_string(),
        };
        // Longest module prefix that maps to a file; trailing segments are items
        (1..=segments.len()).rev().find_map(|len| {
            let module = segments[..len].join("/");
            self.rust_module_file(&join_relative(&base, &module))
        })
    }

    fn resolve_go(&self, import_path: &str) -> Vec<String> {
        let mut best: Option<&str> = None;
        for path in &self.paths {
            if !path.ends_with(".go") || path.ends_with("_test.go") {
                continue;
            }
            let dir = parent_dir(path);
            if dir.is_empty() {
                continue;
            }
            let matches = import_path == dir || import_path.ends_with(&format!("/{dir}"));
            if matches && best.map_or(true, |b| dir.len() > b.len()) {
                best = Some(dir);
            }
        }
        let Some(dir) = best else {
            return Vec::new();
        };
        self.paths
            .iter()
            .filter(|p| parent_dir(p) == dir && p.ends_with(".go") && !p.ends_with("_test.go"))
            .map(|p| p.to_string())
            .collect()
    }
}

/// Directed "imports" / "imported-by" adjacency between indexed files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportGraph {
    imports: BTreeMap<FileKey, BTreeSet<FileKey>>,
    imported_by: BTreeMap<FileKey, BTreeSet<FileKey>>,
}

impl ImportGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph from each file's recorded import statements. Every
    /// listed file is a resolution target, including files with no imports.
    pub fn from_files(files: &[(FileKey, Vec<String>)]) -> Self {
        let mut by_source: HashMap<&str, PathIndex<'_>> = HashMap::new();
        for ((source_id, path), _) in files {
            by_source
                .entry(source_id.as_str())
                .or_insert_with(|| PathIndex { paths: BTreeSet::new() })
                .paths
                .insert(path.as_str());
        }

        let mut graph = Self::new();
        for ((source_id, path), statements) in files {
            if statements.is_empty() {
                continue;
            }
            let Some(index) = by_source.get(source_id.as_str()) else {
                continue;
            };
            for import in extract_refs(path, &statements.join("\n")) {
                for target in index.resolve(path, &import) {
                    graph.add_edge((source_id.clone(), path.clone()), (source_id.clone(), target));
                }
            }
        }
        graph
    }

    /// Record that `from` imports `to`. Self-imports are ignored.
    pub fn add_edge(&mut self, from: FileKey, to: FileKey) {
        if from == to {
            return;
        }
        self.imported_by.entry(to.clone()).or_default().insert(from.clone());
        self.imports.entry(from).or_default().insert(to);
    }

    pub fn imports_of(&self, file: &FileKey) -> impl Iterator<Item = &FileKey> {
        self.imports.get(file).into_iter().flatten()
    }

    pub fn importers_of(&self, file: &FileKey) -> impl Iterator<Item = &FileKey> {
        self.imported_by.get(file).into_iter().flatten()
    }

    pub fn edge_count(&self) -> usize {
        self.imports.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.imports.is_empty()
    }
}
