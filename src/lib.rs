//! codectx: select the most relevant code for a task within a token budget
//!
//! Sources are discovered, parsed into semantic chunks, embedded and stored
//! in a local SQLite index. A selection ranks every indexed chunk against
//! the query, packs the best ones into the budget and renders them.
//!
//! [`ContextEngine`] is the entry point; the modules below are usable on
//! their own.

pub mod chunk;
pub mod cli;
pub mod config;
pub mod domain;
pub mod embed;
pub mod engine;
pub mod error;
pub mod index;
pub mod pack;
pub mod parser;
pub mod rank;
pub mod render;
pub mod scan;
pub mod store;
pub mod symbols;
pub mod utils;

pub use config::{load_config, Config};
pub use domain::{Chunk, ChunkKind, IndexStats, OutputFormat, OutputMode, RankedChunk, SelectionResult, Source};
pub use engine::{ContextEngine, IndexRequest, SelectionRequest};
pub use error::{ContextError, ErrorCategory, Result};
pub use symbols::{CallGraph, SymbolMatch};
