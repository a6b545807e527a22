//! Embedding providers and vector utilities.
//!
//! - [`HashEmbedder`]: local feature-hashing embedder, no network
//! - [`HttpEmbedder`]: OpenAI-compatible or Ollama endpoint with retry
//!
//! Vectors are stored as little-endian `f32` blobs next to each chunk row.

pub mod hash;
pub mod http;
pub mod retry;

pub use hash::HashEmbedder;
pub use http::HttpEmbedder;
pub use retry::RetryPolicy;

use crate::config::{EmbeddingConfig, ProviderKind};
use crate::error::{ContextError, Result};
use std::sync::Arc;

/// Turns text into fixed-width vectors. Implementations must be safe to
/// share across indexing workers.
pub trait EmbeddingProvider: Send + Sync {
    fn model_name(&self) -> &str;

    fn dims(&self) -> usize;

    /// Embed a batch; the result has one vector per input, in order.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| ContextError::provider("empty embedding response", false))
    }
}

pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider {
        ProviderKind::Hash => Ok(Arc::new(HashEmbedder::new(config.dims))),
        ProviderKind::Http => Ok(Arc::new(HttpEmbedder::from_config(config)?)),
    }
}

/// Identifies the vector space a provider produces. Vectors with different
/// signatures are not comparable.
pub fn embedding_signature(provider: &dyn EmbeddingProvider) -> String {
    format!("{}:{}", provider.model_name(), provider.dims())
}

/// Check a provider response against the batch it answers.
pub(crate) fn check_batch(vectors: &[Vec<f32>], expected: usize, dims: usize) -> Result<()> {
    if vectors.len() != expected {
        return Err(ContextError::provider(
            format!("expected {expected} embeddings, got {}", vectors.len()),
            false,
        ));
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
        return Err(ContextError::provider(
            format!("expected {dims}-dimensional vectors, got {}", bad.len()),
            false,
        ));
    }
    Ok(())
}

pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1, 1]`; `0.0` for empty, zero or mismatched vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 0.0;
    }
    (dot / denom).clamp(-1.0, 1.0)
}
