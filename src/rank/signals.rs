//! Per-chunk ranking signals. Every signal is in `[0, 1]`.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Occurrences beyond this count add nothing to content match.
pub const CONTENT_OCCURRENCE_CAP: usize = 3;

static DECLARATION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\bfunction\s*\*?\s*([A-Za-z_$][\w$]*)",
        r"\bclass\s+([A-Za-z_$][\w$]*)",
        r"\binterface\s+([A-Za-z_$][\w$]*)",
        r"\btype\s+([A-Za-z_$][\w$]*)\s*(?:<[^>]*>)?\s*=",
        r"\benum\s+([A-Za-z_$][\w$]*)",
        r"\b(?:const|let|var)\s+([A-Za-z_$][\w$]*)",
        r"\bdef\s+([A-Za-z_]\w*)",
        r"\bfn\s+([A-Za-z_]\w*)",
        r"\b(?:struct|trait|impl)\s+([A-Za-z_]\w*)",
        r"\bfunc\s+(?:\([^)]*\)\s*)?([A-Za-z_]\w*)",
        r"(?m)^\s*(?:async\s+|static\s+|public\s+|private\s+|protected\s+)*([A-Za-z_$][\w$]*)\s*\([^)]*\)\s*\{",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

const NOT_DECLARATIONS: &[&str] = &["if", "for", "while", "switch", "catch", "return", "function", "else"];

/// Identifiers declared in `content`, lowercased.
pub fn declared_identifiers(content: &str) -> HashSet<String> {
    let mut identifiers = HashSet::new();
    for pattern in DECLARATION_PATTERNS.iter() {
        for caps in pattern.captures_iter(content) {
            if let Some(name) = caps.get(1) {
                let name = name.as_str();
                if !NOT_DECLARATIONS.contains(&name) {
                    identifiers.insert(name.to_lowercase());
                }
            }
        }
    }
    identifiers
}

/// Fraction of keywords that appear in the lowercased path.
pub fn path_match(path: &str, keywords: &[String]) -> f64 {
    if keywords.is_empty() {
        return 0.0;
    }
    let lower = path.to_lowercase();
    let hits = keywords.iter().filter(|k| lower.contains(k.as_str())).count();
    hits as f64 / keywords.len() as f64
}

fn word_counts(content: &str) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for word in content.split(|c: char| !c.is_alphanumeric() && c != '_') {
        if !word.is_empty() {
            *counts.entry(word.to_lowercase()).or_insert(0) += 1;
        }
    }
    counts
}

/// Mean over keywords of `min(whole-word occurrences, cap) / cap`.
pub fn content_match(content: &str, keywords: &[String]) -> f64 {
    if keywords.is_empty() {
        return 0.0;
    }
    let counts = word_counts(content);
    let total: f64 = keywords
        .iter()
        .map(|k| {
            let count = counts.get(k).copied().unwrap_or(0).min(CONTENT_OCCURRENCE_CAP);
            count as f64 / CONTENT_OCCURRENCE_CAP as f64
        })
        .sum();
    total / keywords.len() as f64
}

/// Fraction of query symbols equal to, or contained in, a declared identifier.
pub fn symbol_match(identifiers: &HashSet<String>, symbols: &[String]) -> f64 {
    if symbols.is_empty() || identifiers.is_empty() {
        return 0.0;
    }
    let hits = symbols
        .iter()
        .filter(|s| identifiers.contains(s.as_str()) || identifiers.iter().any(|id| id.contains(s.as_str())))
        .count();
    hits as f64 / symbols.len() as f64
}

/// Down-weight files that rarely answer a query directly.
pub fn file_type_boost(path: &str) -> f64 {
    let lower = path.to_lowercase();
    let file_name = lower.rsplit('/').next().unwrap_or(&lower);
    let in_dir = |dir: &str| lower.starts_with(&format!("{dir}/")) || lower.contains(&format!("/{dir}/"));

    let is_test = in_dir("test")
        || in_dir("tests")
        || in_dir("__tests__")
        || in_dir("spec")
        || file_name.contains(".test.")
        || file_name.contains(".spec.")
        || file_name.contains("_test.")
        || file_name.starts_with("test_");
    if is_test {
        return 0.3;
    }

    let ext = file_name.rsplit_once('.').map(|(_, e)| e).unwrap_or("");
    let is_config = matches!(ext, "json" | "yaml" | "yml" | "toml" | "ini" | "cfg" | "conf" | "env")
        || file_name.contains(".config.")
        || file_name.contains("rc.");
    if is_config {
        return 0.4;
    }

    if file_name.ends_with(".d.ts") || ext == "pyi" || matches!(file_name, "types.ts" | "types.py" | "types.go") {
        return 0.5;
    }

    if matches!(
        file_name,
        "index.js" | "index.ts" | "index.jsx" | "index.tsx" | "index.mjs" | "__init__.py" | "mod.rs" | "lib.rs"
    ) {
        return 0.6;
    }

    1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kw(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn path_match_is_a_fraction() {
        assert_eq!(path_match("src/auth/login.ts", &kw(&["login", "auth", "billing"])), 2.0 / 3.0);
        assert_eq!(path_match("src/a.ts", &[]), 0.0);
    }

    #[test]
    fn content_match_counts_whole_words_with_cap() {
        let content = "login(); login(); login(); login(); loginUser();";
        assert_eq!(content_match(content, &kw(&["login"])), 1.0);
        assert_eq!(content_match("login once", &kw(&["login", "missing"])), (1.0 / 3.0) / 2.0);
        assert_eq!(content_match("loginUser", &kw(&["login"])), 0.0);
    }

    #[test]
    fn declarations_across_languages() {
        let ids = declared_identifiers(
            "export function login(user) {}\nclass AuthService {}\ndef parse_config():\nfn build() {}\nfunc (s *S) Start() {}\nconst MAX = 1;\n  handle(req) {\n",
        );
        for name in ["login", "authservice", "parse_config", "build", "start", "max", "handle"] {
            assert!(ids.contains(name), "missing {name}: {ids:?}");
        }
        assert!(!declared_identifiers("if (x) {\n").contains("if"));
    }

    #[test]
    fn symbol_match_accepts_substrings() {
        let ids: HashSet<String> = ["loginuser".to_string()].into_iter().collect();
        assert_eq!(symbol_match(&ids, &kw(&["login"])), 1.0);
        assert_eq!(symbol_match(&ids, &kw(&["login", "logout"])), 0.5);
    }

    #[test]
    fn file_type_boosts() {
        assert_eq!(file_type_boost("src/auth.test.ts"), 0.3);
        assert_eq!(file_type_boost("tests/cli.rs"), 0.3);
        assert_eq!(file_type_boost("package.json"), 0.4);
        assert_eq!(file_type_boost("src/types.d.ts"), 0.5);
        assert_eq!(file_type_boost("src/index.ts"), 0.6);
        assert_eq!(file_type_boost("src/auth.ts"), 1.0);
        assert_eq!(file_type_boost("src/latest.ts"), 1.0);
    }
}
