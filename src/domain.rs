//! Core data model shared across the pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// A configured source tree. Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub root: PathBuf,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

/// A file found during discovery, with its content already read.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    pub relative_path: String,
    pub absolute_path: PathBuf,
    pub content: String,
    pub content_hash: String,
    pub language: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryKind {
    Function,
    Class,
    Method,
    Constant,
    Block,
}

/// Structural unit reported by a parser. Line numbers are 1-based and inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBoundary {
    pub kind: BoundaryKind,
    pub name: String,
    pub start_line: usize,
    pub end_line: usize,
    pub exported: bool,
}

impl CodeBoundary {
    pub fn contains(&self, other: &CodeBoundary) -> bool {
        self.start_line <= other.start_line && other.end_line <= self.end_line
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Function,
    Class,
    Method,
    Constant,
    Block,
    /// Content between units: imports, module headers, loose statements
    Header,
    /// Content after the last unit
    Footer,
    /// Token-window slice produced without structural information
    Window,
}

impl ChunkKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Method => "method",
            Self::Constant => "constant",
            Self::Block => "block",
            Self::Header => "header",
            Self::Footer => "footer",
            Self::Window => "window",
        }
    }
}

impl From<BoundaryKind> for ChunkKind {
    fn from(kind: BoundaryKind) -> Self {
        match kind {
            BoundaryKind::Function => Self::Function,
            BoundaryKind::Class => Self::Class,
            BoundaryKind::Method => Self::Method,
            BoundaryKind::Constant => Self::Constant,
            BoundaryKind::Block => Self::Block,
        }
    }
}

impl FromStr for ChunkKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "function" => Ok(Self::Function),
            "class" => Ok(Self::Class),
            "method" => Ok(Self::Method),
            "constant" => Ok(Self::Constant),
            "block" => Ok(Self::Block),
            "header" => Ok(Self::Header),
            "footer" => Ok(Self::Footer),
            "window" => Ok(Self::Window),
            other => Err(format!("unknown chunk kind '{other}'")),
        }
    }
}

impl fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A content-addressed slice of a file.
///
/// `id` depends only on `(source_id, file_path, start_line, end_line)`, so
/// re-chunking identical boundaries reproduces identical IDs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub source_id: String,
    pub file_path: String,
    pub content: String,
    pub start_line: usize,
    pub end_line: usize,
    pub token_count: usize,
    pub kind: ChunkKind,
    pub unit_name: Option<String>,
    pub exported: Option<bool>,
    #[serde(skip)]
    pub embedding: Vec<f32>,
}

/// `(source_id, file_path)`
pub type FileKey = (String, String);

/// Incremental-diffing ledger row, one per (source, path).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub source_id: String,
    pub file_path: String,
    pub content_hash: String,
    pub indexed_at: String,
    /// Import statements found anywhere in the file
    pub imports: Vec<String>,
}

/// Summary of an indexing run across all requested sources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub files: usize,
    pub chunks: usize,
    pub files_changed: usize,
    pub files_unchanged: usize,
    pub files_removed: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
    pub chunks_embedded: usize,
    pub cancelled: bool,
    pub time_ms: u64,
}

impl IndexStats {
    pub fn absorb(&mut self, other: &IndexStats) {
        self.files += other.files;
        self.chunks += other.chunks;
        self.files_changed += other.files_changed;
        self.files_unchanged += other.files_unchanged;
        self.files_removed += other.files_removed;
        self.files_skipped += other.files_skipped;
        self.files_failed += other.files_failed;
        self.chunks_embedded += other.chunks_embedded;
        self.cancelled |= other.cancelled;
    }
}

/// Per-signal contribution to a chunk's score, before weighting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub similarity: f64,
    pub path_match: f64,
    pub content_match: f64,
    pub symbol_match: f64,
    pub file_type_boost: f64,
    pub import_boost: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedChunk {
    pub chunk: Chunk,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

/// Packed, rendered answer to a selection request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    pub context: String,
    pub chunks: Vec<Chunk>,
    pub tokens_used: usize,
    pub files_included: Vec<String>,
    #[serde(default)]
    pub cache_hit: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    Full,
    Map,
}

impl OutputMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Map => "map",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Markdown,
    Xml,
    Json,
    Plain,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Xml => "xml",
            Self::Json => "json",
            Self::Plain => "plain",
        }
    }
}

/// Map a file path to a language label used for parser dispatch and rendering.
pub fn language_for_path(path: &str) -> &'static str {
    let lower = path.to_ascii_lowercase();
    let ext = lower.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
    match ext {
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        "ts" | "mts" | "cts" => "typescript",
        "tsx" => "tsx",
        "py" | "pyi" => "python",
        "rs" => "rust",
        "go" => "go",
        "md" | "markdown" | "mdx" => "markdown",
        "java" => "java",
        "c" | "h" => "c",
        "cpp" | "cc" | "cxx" | "hpp" | "hh" => "cpp",
        "cs" => "csharp",
        "rb" => "ruby",
        "php" => "php",
        "swift" => "swift",
        "kt" | "kts" => "kotlin",
        "scala" => "scala",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "sh" | "bash" => "shell",
        "sql" => "sql",
        "html" | "htm" => "html",
        "css" | "scss" => "css",
        _ => "text",
    }
}
