//! Configuration model, loading and validation
//!
//! Precedence: environment (`CODECTX_*`) > config file > defaults.

pub mod loader;
pub mod validate;

pub use loader::load_config;
pub use validate::{validate_budget, validate_config};

use crate::domain::Source;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_DB_PATH: &str = ".codectx/index.sqlite";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub db_path: PathBuf,
    pub sources: Vec<SourceConfig>,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub selection: SelectionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            sources: vec![SourceConfig::default()],
            chunking: ChunkingConfig::default(),
            embedding: EmbeddingConfig::default(),
            selection: SelectionConfig::default(),
        }
    }
}

impl Config {
    /// Resolve configured sources against `base_dir`.
    pub fn resolved_sources(&self, base_dir: &Path) -> Vec<Source> {
        self.sources.iter().map(|s| s.resolve(base_dir)).collect()
    }

    /// Database path, resolved against `base_dir` when relative.
    pub fn resolved_db_path(&self, base_dir: &Path) -> PathBuf {
        if self.db_path.is_absolute() {
            self.db_path.clone()
        } else {
            base_dir.join(&self.db_path)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub id: String,
    pub root: PathBuf,
    /// Globs a file must match to be indexed; empty means every text file
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            id: "default".to_string(),
            root: PathBuf::from("."),
            include: Vec::new(),
            exclude: default_exclude_globs(),
            chunk_size: 512,
            chunk_overlap: 64,
        }
    }
}

impl SourceConfig {
    pub fn resolve(&self, base_dir: &Path) -> Source {
        let root =
            if self.root.is_absolute() { self.root.clone() } else { base_dir.join(&self.root) };
        Source {
            id: self.id.clone(),
            root,
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Units above this many tokens are split into windows
    pub max_unit_tokens: usize,
    pub use_structural_parsing: bool,
    pub max_file_bytes: u64,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_unit_tokens: 1000, use_structural_parsing: true, max_file_bytes: 1_048_576 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Local feature-hashing embedder
    Hash,
    /// OpenAI-compatible or Ollama HTTP endpoint
    Http,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: ProviderKind,
    pub url: Option<String>,
    pub model: Option<String>,
    /// Environment variable holding a bearer token for the HTTP provider
    pub api_key_env: Option<String>,
    pub dims: usize,
    pub batch_size: usize,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Hash,
            url: None,
            model: None,
            api_key_env: None,
            dims: 256,
            batch_size: 32,
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub default_budget: usize,
    pub diversity_penalty: bool,
    pub include_imports: bool,
    /// Number of top-scoring files that propagate an import boost
    pub import_top_n: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self { default_budget: 8000, diversity_penalty: true, include_imports: true, import_top_n: 20 }
    }
}

pub fn default_exclude_globs() -> Vec<String> {
    [
        "**/node_modules/**",
        "**/target/**",
        "**/dist/**",
        "**/build/**",
        "**/vendor/**",
        "**/*.min.js",
        "**/*.lock",
        "**/package-lock.json",
        "**/.codectx/**",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
