//! Error types shared by the indexing and selection pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for library operations
pub type Result<T> = std::result::Result<T, ContextError>;

/// Errors surfaced by the core operations.
#[derive(Error, Debug)]
pub enum ContextError {
    /// Structural parse failed; callers fall back to window chunking
    #[error("Parse error in {path}: {message}")]
    Parse { path: String, message: String },

    /// A path could not be walked or read
    #[error("Discovery error at {path}: {message}")]
    Discovery { path: PathBuf, message: String },

    /// Embedding provider failed after retries were exhausted
    #[error("Embedding provider error: {message}")]
    EmbeddingProvider { message: String, retryable: bool },

    /// A cached payload could not be deserialized
    #[error("Corrupt cache entry {key}: {message}")]
    CacheCorruption { key: String, message: String },

    /// Write or commit failure; the source batch was rolled back
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Every violation found while validating configuration
    #[error("Invalid configuration:\n  - {}", .0.join("\n  - "))]
    ConfigValidation(Vec<String>),

    /// Nothing has been indexed yet
    #[error("No indexed content found; run `codectx index` first")]
    NoIndexedContent,

    /// Stored vectors come from a different model or dimension than the
    /// configured provider
    #[error(
        "Source '{source_id}' was embedded with {indexed} but the provider is now {current}; run `codectx index` to re-embed"
    )]
    EmbeddingMismatch { source_id: String, indexed: String, current: String },

    /// Another writer holds the index lock
    #[error("Index at {0} is locked by another indexing run")]
    Locked(PathBuf),

    /// Request parameters were rejected
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// User-facing classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Actionable by running the indexer
    NotIndexed,
    /// Actionable by fixing configuration, paths or storage
    Fatal,
    /// Actionable by retrying
    Transient,
}

impl ContextError {
    pub fn parse(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse { path: path.into(), message: message.into() }
    }

    pub fn discovery(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Discovery { path: path.into(), message: message.into() }
    }

    pub fn provider(message: impl Into<String>, retryable: bool) -> Self {
        Self::EmbeddingProvider { message: message.into(), retryable }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NoIndexedContent | Self::EmbeddingMismatch { .. } => ErrorCategory::NotIndexed,
            Self::EmbeddingProvider { .. } | Self::Locked(_) => ErrorCategory::Transient,
            _ => ErrorCategory::Fatal,
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::EmbeddingProvider { retryable: true, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_validation_lists_every_violation() {
        let err = ContextError::ConfigValidation(vec![
            "sources[0].id must not be empty".to_string(),
            "embedding.dims must be greater than 0".to_string(),
        ]);
        let message = err.to_string();
        assert!(message.contains("sources[0].id"));
        assert!(message.contains("embedding.dims"));
    }

    #[test]
    fn categories_separate_not_indexed_from_transient() {
        assert_eq!(ContextError::NoIndexedContent.category(), ErrorCategory::NotIndexed);
        assert_eq!(ContextError::provider("429", true).category(), ErrorCategory::Transient);
        let mismatch = ContextError::EmbeddingMismatch {
            source_id: "app".into(),
            indexed: "hash-64:64".into(),
            current: "hash-32:32".into(),
        };
        assert_eq!(mismatch.category(), ErrorCategory::NotIndexed);
        assert!(mismatch.to_string().contains("codectx index"));
        assert_eq!(
            ContextError::InvalidRequest("budget".into()).category(),
            ErrorCategory::Fatal
        );
    }
}
