//! Feature-hashing embedder.
//!
//! Identifiers are lowercased and split on case and underscore boundaries,
//! so `loginUser` and `login_user` land in the same buckets as `login user`.

use super::EmbeddingProvider;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dims: usize,
    model: String,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        let dims = dims.max(1);
        Self { dims, model: format!("hash-{dims}") }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dims];
        for token in tokenize(text) {
            let hash = fnv1a_64(token.as_bytes());
            let idx = (hash % self.dims as u64) as usize;
            vec[idx] += 1.0;
        }
        normalize(&mut vec);
        vec
    }
}

impl EmbeddingProvider for HashEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for word in text.split(|c: char| !c.is_alphanumeric() && c != '_') {
        if word.len() < 2 {
            continue;
        }
        let parts = split_identifier(word);
        if parts.len() > 1 {
            tokens.extend(parts.into_iter().filter(|p| p.len() >= 2));
        }
        tokens.push(word.to_lowercase());
    }
    tokens
}

/// `parseHTTPRequest` -> `parse`, `http`, `request`
fn split_identifier(word: &str) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    let mut parts = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if c == '_' {
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
            }
            continue;
        }
        let boundary = c.is_uppercase()
            && i > 0
            && (chars[i - 1].is_lowercase()
                || chars[i - 1].is_ascii_digit()
                || chars.get(i + 1).is_some_and(|n| n.is_lowercase()) && chars[i - 1].is_uppercase());
        if boundary && !current.is_empty() {
            parts.push(std::mem::take(&mut current));
        }
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

fn normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vec.iter_mut() {
            *value /= norm;
        }
    }
}

fn fnv1a_64(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    let mut hash = OFFSET;
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::cosine_similarity;

    #[test]
    fn identifier_splitting() {
        assert_eq!(split_identifier("parseHTTPRequest"), vec!["parse", "http", "request"]);
        assert_eq!(split_identifier("login_user"), vec!["login", "user"]);
        assert_eq!(split_identifier("v2Api"), vec!["v2", "api"]);
    }

    #[test]
    fn vectors_are_unit_length_and_deterministic() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed_text("function loginUser(name) { return name; }");
        let b = embedder.embed_text("function loginUser(name) { return name; }");
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn related_text_scores_higher() {
        let embedder = HashEmbedder::new(256);
        let query = embedder.embed_text("login user");
        let related = embedder.embed_text("export function loginUser(user) { validate(user) }");
        let unrelated = embedder.embed_text("render the chart axis labels");
        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let embedder = HashEmbedder::new(8);
        assert!(embedder.embed_text("").iter().all(|v| *v == 0.0));
    }
}
