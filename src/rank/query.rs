//! Query term extraction.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "about", "after", "all", "an", "and", "any", "are", "as", "at", "be", "been", "but", "by",
        "can", "code", "could", "did", "do", "does", "doing", "for", "from", "get", "has", "have", "how",
        "i", "if", "in", "into", "is", "it", "its", "me", "my", "need", "not", "of", "on", "or", "our",
        "please", "should", "show", "so", "some", "than", "that", "the", "their", "them", "then",
        "there", "these", "this", "those", "to", "up", "use", "used", "uses", "using", "was", "we",
        "were", "what", "when", "where", "which", "who", "why", "will", "with", "work", "works",
        "would", "you", "your",
    ]
    .into_iter()
    .collect()
});

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("valid regex"));

/// Keywords and symbol-shaped tokens derived from a query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryTerms {
    /// Lowercased, stop-word filtered words, in first-seen order
    pub keywords: Vec<String>,
    /// Identifier-shaped tokens, lowercased, in first-seen order
    pub symbols: Vec<String>,
}

impl QueryTerms {
    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty() && self.symbols.is_empty()
    }
}

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(word)
}

/// Split a query into keywords and symbol candidates.
///
/// Keywords come from splitting on anything that is not alphanumeric or
/// `_`. Symbols are whitespace-separated tokens (trailing punctuation and
/// call parentheses stripped) that look like identifiers: camelCase,
/// PascalCase, snake_case, or a bare word that is not a stop word.
pub fn analyze_query(query: &str) -> QueryTerms {
    let mut terms = QueryTerms::default();
    let mut seen_keywords = HashSet::new();
    let mut seen_symbols = HashSet::new();

    for word in query.split(|c: char| !c.is_alphanumeric() && c != '_') {
        let lower = word.to_lowercase();
        if lower.chars().count() < 2 || is_stop_word(&lower) {
            continue;
        }
        if seen_keywords.insert(lower.clone()) {
            terms.keywords.push(lower);
        }
    }

    for raw in query.split_whitespace() {
        let token = raw
            .trim_end_matches("()")
            .trim_matches(|c: char| !c.is_alphanumeric() && c != '_' && c != '$');
        if token.chars().count() < 2 || !IDENTIFIER.is_match(token) {
            continue;
        }
        let lower = token.to_lowercase();
        if is_stop_word(&lower) {
            continue;
        }
        if seen_symbols.insert(lower.clone()) {
            terms.symbols.push(lower);
        }
    }

    terms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_words_are_removed_from_keywords() {
        let terms = analyze_query("How does the login flow work?");
        assert_eq!(terms.keywords, vec!["login", "flow"]);
    }

    #[test]
    fn symbol_shapes_are_kept() {
        let terms = analyze_query("where is parseConfig() and user_id used in AuthService");
        assert_eq!(terms.symbols, vec!["parseconfig", "user_id", "authservice"]);
        assert!(terms.keywords.contains(&"parseconfig".to_string()));
    }

    #[test]
    fn punctuation_only_query_is_empty() {
        assert!(analyze_query("?? !! -").is_empty());
    }
}
