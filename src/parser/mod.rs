//! Language parser registry.
//!
//! Maps file extensions to one of three parser variants and turns any
//! failure into a [`ParseOutcome`] instead of an error, so chunking can
//! always fall back to token windows.

pub mod ecma;
pub mod fold;
pub mod grammar;
pub mod markdown;

pub use ecma::{strip_type_syntax, EcmaDialect, EcmaParser};
pub use fold::{fold_methods, Placement, PlannedBoundary};
pub use grammar::{GrammarLanguage, GrammarParser};
pub use markdown::MarkdownParser;

use crate::domain::CodeBoundary;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Result of structural parsing. Never an `Err`: a failed parse carries its
/// message and no boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOutcome {
    pub success: bool,
    pub boundaries: Vec<CodeBoundary>,
    pub error: Option<String>,
}

impl ParseOutcome {
    pub fn ok(boundaries: Vec<CodeBoundary>) -> Self {
        Self { success: true, boundaries, error: None }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self { success: false, boundaries: Vec::new(), error: Some(message.into()) }
    }
}

#[derive(Debug, Clone)]
pub enum LanguageParser {
    /// ECMAScript family with the type-stripping fallback
    Native(EcmaDialect),
    /// Embedded tree-sitter grammar
    Grammar(GrammarParser),
    /// Line-oriented structural text parser
    Structural(MarkdownParser),
}

/// Owned extension -> parser table. Built once per engine and shared
/// read-only across worker threads.
#[derive(Debug, Clone)]
pub struct ParserRegistry {
    ecma: EcmaParser,
    by_extension: HashMap<&'static str, LanguageParser>,
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserRegistry {
    pub fn new() -> Self {
        let mut by_extension = HashMap::new();
        for ext in ["js", "jsx", "mjs", "cjs"] {
            by_extension.insert(ext, LanguageParser::Native(EcmaDialect::JavaScript));
        }
        for ext in ["ts", "mts", "cts"] {
            by_extension.insert(ext, LanguageParser::Native(EcmaDialect::TypeScript));
        }
        by_extension.insert("tsx", LanguageParser::Native(EcmaDialect::Tsx));

        let python = GrammarParser::new(GrammarLanguage::Python);
        by_extension.insert("py", LanguageParser::Grammar(python.clone()));
        by_extension.insert("pyi", LanguageParser::Grammar(python));
        by_extension.insert("rs", LanguageParser::Grammar(GrammarParser::new(GrammarLanguage::Rust)));
        by_extension.insert("go", LanguageParser::Grammar(GrammarParser::new(GrammarLanguage::Go)));

        for ext in ["md", "markdown", "mdx"] {
            by_extension.insert(ext, LanguageParser::Structural(MarkdownParser));
        }

        Self { ecma: EcmaParser::new(), by_extension }
    }

    fn extension(path: &str) -> Option<String> {
        let file_name = path.rsplit('/').next().unwrap_or(path);
        file_name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase())
    }

    pub fn supports(&self, path: &str) -> bool {
        Self::extension(path).is_some_and(|ext| self.by_extension.contains_key(ext.as_str()))
    }

    pub fn parser_for(&self, path: &str) -> Option<&LanguageParser> {
        let ext = Self::extension(path)?;
        self.by_extension.get(ext.as_str())
    }

    /// Extract boundaries from `content`. Unsupported extensions, grammar
    /// failures and panics inside a parser all become a failed outcome.
    pub fn parse(&self, content: &str, path: &str) -> ParseOutcome {
        let Some(parser) = self.parser_for(path) else {
            return ParseOutcome::failed(format!("no parser registered for '{path}'"));
        };

        let result = catch_unwind(AssertUnwindSafe(|| match parser {
            LanguageParser::Native(dialect) => self.ecma.extract(content, *dialect),
            LanguageParser::Grammar(grammar) => grammar.extract(content),
            LanguageParser::Structural(markdown) => Ok(markdown.extract(content)),
        }));

        match result {
            Ok(Ok(boundaries)) => ParseOutcome::ok(boundaries),
            Ok(Err(message)) => {
                tracing::debug!(path, "parse failed: {message}");
                ParseOutcome::failed(message)
            }
            Err(_) => {
                tracing::warn!(path, "parser panicked; falling back to windows");
                ParseOutcome::failed("parser panicked")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BoundaryKind;

    #[test]
    fn unsupported_extension_is_a_failed_outcome() {
        let registry = ParserRegistry::new();
        let outcome = registry.parse("whatever", "notes.txt");
        assert!(!outcome.success);
        assert!(outcome.boundaries.is_empty());
        assert!(outcome.error.unwrap().contains("notes.txt"));
    }

    #[test]
    fn dispatches_by_extension_case_insensitively() {
        let registry = ParserRegistry::new();
        assert!(registry.supports("src/App.TSX"));
        assert!(registry.supports("lib/mod.rs"));
        assert!(!registry.supports("Makefile"));
        assert!(!registry.supports("dir.with.dots/Makefile"));
    }

    #[test]
    fn parses_each_variant() {
        let registry = ParserRegistry::new();

        let js = registry.parse("function a() {}\n", "a.js");
        assert!(js.success);
        assert_eq!(js.boundaries[0].kind, BoundaryKind::Function);

        let py = registry.parse("def b():\n    pass\n", "b.py");
        assert_eq!(py.boundaries[0].name, "b");

        let md = registry.parse("# Title\nbody\n", "README.md");
        assert_eq!(md.boundaries[0].name, "Title");
    }

    #[test]
    fn garbage_input_never_errors() {
        let registry = ParserRegistry::new();
        let outcome = registry.parse("}}}{{{ ((( def class fn", "x.ts");
        assert!(outcome.success);
    }
}
