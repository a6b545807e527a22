//! Public operations: index, select, search symbols, call graph.
//!
//! [`ContextEngine`] owns the store, the parser registry and the
//! embedding provider for one project. CLIs and servers call these
//! operations instead of composing the pipeline themselves.

use crate::config::{validate_budget, validate_config, Config};
use crate::domain::{Chunk, IndexStats, OutputFormat, OutputMode, SelectionResult, Source};
use crate::embed::{create_provider, embedding_signature, EmbeddingProvider};
use crate::error::{ContextError, Result};
use crate::index::{try_acquire, IndexOptions, Indexer};
use crate::pack::pack;
use crate::parser::ParserRegistry;
use crate::rank::{rank, ImportGraph, RankOptions};
use crate::render::{files_included, render};
use crate::store::{cache_key, CacheKeyParams, IndexStore, QueryLogEntry, StoreStats};
use crate::symbols::{self, CallGraph, SymbolMatch};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Parameters of one selection. Unset options fall back to the
/// `[selection]` config section.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionRequest {
    pub query: String,
    pub budget: Option<usize>,
    pub mode: OutputMode,
    pub format: OutputFormat,
    /// Restrict to these source ids; empty means all
    pub sources: Vec<String>,
    pub diversity_penalty: Option<bool>,
    pub include_imports: Option<bool>,
}

impl SelectionRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            budget: None,
            mode: OutputMode::Full,
            format: OutputFormat::Markdown,
            sources: Vec::new(),
            diversity_penalty: None,
            include_imports: None,
        }
    }

    pub fn budget(mut self, budget: usize) -> Self {
        self.budget = Some(budget);
        self
    }

    pub fn mode(mut self, mode: OutputMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn sources(mut self, sources: Vec<String>) -> Self {
        self.sources = sources;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct IndexRequest {
    pub force: bool,
    /// Restrict to these source ids; empty means all configured sources
    pub sources: Vec<String>,
    pub cancel: Option<Arc<AtomicBool>>,
}

pub struct ContextEngine {
    config: Config,
    base_dir: PathBuf,
    /// `None` for in-memory stores, which need no writer lock
    db_path: Option<PathBuf>,
    store: IndexStore,
    registry: ParserRegistry,
    provider: Arc<dyn EmbeddingProvider>,
}

impl ContextEngine {
    /// Validate `config` and open the on-disk index under `base_dir`.
    pub fn open(base_dir: &Path, config: Config) -> Result<Self> {
        validate_config(&config)?;
        let db_path = config.resolved_db_path(base_dir);
        let store = IndexStore::open(&db_path)?;
        let provider = create_provider(&config.embedding)?;
        debug!(db = %db_path.display(), model = provider.model_name(), "opened context engine");
        Ok(Self {
            config,
            base_dir: base_dir.to_path_buf(),
            db_path: Some(db_path),
            store,
            registry: ParserRegistry::new(),
            provider,
        })
    }

    /// Engine over an explicit store and provider.
    pub fn with_parts(
        base_dir: &Path,
        config: Config,
        store: IndexStore,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        validate_config(&config)?;
        Ok(Self {
            config,
            base_dir: base_dir.to_path_buf(),
            db_path: None,
            store,
            registry: ParserRegistry::new(),
            provider,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    fn resolve_sources(&self, ids: &[String]) -> Result<Vec<Source>> {
        let all = self.config.resolved_sources(&self.base_dir);
        if ids.is_empty() {
            return Ok(all);
        }
        let unknown: Vec<&String> = ids.iter().filter(|id| !all.iter().any(|s| &s.id == *id)).collect();
        if !unknown.is_empty() {
            let names: Vec<&str> = unknown.iter().map(|s| s.as_str()).collect();
            return Err(ContextError::InvalidRequest(format!("unknown source id(s): {}", names.join(", "))));
        }
        Ok(all.into_iter().filter(|s| ids.contains(&s.id)).collect())
    }

    /// Incrementally index the requested sources.
    ///
    /// Holds the writer lock for the whole run; a concurrent run fails
    /// with [`ContextError::Locked`].
    pub fn index_sources(&mut self, request: &IndexRequest) -> Result<IndexStats> {
        let sources = self.resolve_sources(&request.sources)?;
        let _lock = match &self.db_path {
            Some(path) => Some(try_acquire(path)?),
            None => None,
        };

        let options = IndexOptions {
            force: request.force,
            cancel: request.cancel.clone(),
            batch_size: self.config.embedding.batch_size,
            chunking: self.config.chunking.clone(),
        };
        let stats = Indexer::new(&mut self.store, &self.registry, self.provider.as_ref(), options)
            .index_sources(&sources)?;

        let version = self.store.index_version()?;
        let purged = self.store.cache().purge_stale(&version)?;
        info!(
            sources = sources.len(),
            files = stats.files,
            changed = stats.files_changed,
            removed = stats.files_removed,
            failed = stats.files_failed,
            purged_cache = purged,
            time_ms = stats.time_ms,
            "indexing finished"
        );
        Ok(stats)
    }

    fn load_chunks(&self, sources: &[String]) -> Result<Vec<Chunk>> {
        let filter = if sources.is_empty() { None } else { Some(sources) };
        let chunks = self.store.load_chunks(filter)?;
        if chunks.is_empty() {
            return Err(ContextError::NoIndexedContent);
        }
        Ok(chunks)
    }

    /// Rank, pack and render the chunks most relevant to the query.
    ///
    /// Identical normalized requests against an unchanged index are served
    /// from the query cache.
    pub fn select_context(&self, request: &SelectionRequest) -> Result<SelectionResult> {
        let started = Instant::now();
        let query = request.query.trim();
        if query.is_empty() {
            return Err(ContextError::InvalidRequest("query must not be empty".to_string()));
        }
        let budget = request.budget.unwrap_or(self.config.selection.default_budget);
        validate_budget(budget)?;
        let diversity_penalty = request.diversity_penalty.unwrap_or(self.config.selection.diversity_penalty);
        let include_imports = request.include_imports.unwrap_or(self.config.selection.include_imports);

        if self.store.chunk_count()? == 0 {
            return Err(ContextError::NoIndexedContent);
        }
        self.check_embedding_model(&request.sources)?;

        let key = cache_key(&CacheKeyParams {
            query: query.to_string(),
            budget,
            sources: request.sources.clone(),
            mode: request.mode,
            format: request.format,
            diversity_penalty,
            include_imports,
        });
        let version = self.store.index_version()?;

        if let Some(mut cached) = self.store.cache().get::<SelectionResult>(&key, &version)? {
            cached.cache_hit = true;
            self.log_query(query, budget, &cached, started);
            debug!(key = %key, "selection served from cache");
            return Ok(cached);
        }

        let chunks = self.load_chunks(&request.sources)?;
        let query_embedding = self.provider.embed_query(query)?;
        let graph = if include_imports {
            let filter = if request.sources.is_empty() { None } else { Some(request.sources.as_slice()) };
            Some(ImportGraph::from_files(&self.store.file_imports(filter)?))
        } else {
            None
        };
        let options = RankOptions {
            import_graph: graph.as_ref(),
            diversity_penalty,
            import_top_n: self.config.selection.import_top_n,
            ..RankOptions::default()
        };

        let candidates = chunks.len();
        let packed = pack(rank(chunks, &query_embedding, query, &options), budget);
        let selected: Vec<Chunk> = packed
            .chunks
            .into_iter()
            .map(|ranked| Chunk { embedding: Vec::new(), ..ranked.chunk })
            .collect();

        let result = SelectionResult {
            context: render(&selected, request.mode, request.format)?,
            files_included: files_included(&selected),
            tokens_used: packed.total_tokens,
            chunks: selected,
            cache_hit: false,
        };

        if let Err(err) = self.store.cache().put(&key, &version, &result) {
            warn!("failed to cache selection: {err}");
        }
        self.log_query(query, budget, &result, started);
        info!(
            candidates,
            selected = result.chunks.len(),
            excluded = packed.excluded,
            tokens = result.tokens_used,
            budget,
            "selected context"
        );
        Ok(result)
    }

    /// Refuse to compare the query against vectors from another model.
    fn check_embedding_model(&self, sources: &[String]) -> Result<()> {
        let current = embedding_signature(self.provider.as_ref());
        for (source_id, indexed) in self.store.embedding_models()? {
            if !sources.is_empty() && !sources.contains(&source_id) {
                continue;
            }
            if indexed.as_deref() != Some(current.as_str()) {
                return Err(ContextError::EmbeddingMismatch {
                    source_id,
                    indexed: indexed.unwrap_or_else(|| "an unrecorded model".to_string()),
                    current,
                });
            }
        }
        Ok(())
    }

    fn log_query(&self, query: &str, budget: usize, result: &SelectionResult, started: Instant) {
        let entry = QueryLogEntry {
            query: query.to_string(),
            budget,
            chunks_returned: result.chunks.len(),
            tokens_used: result.tokens_used,
            cache_hit: result.cache_hit,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        if let Err(err) = self.store.record_query(&entry) {
            warn!("failed to record query history: {err}");
        }
    }

    pub fn search_symbols(&self, query: &str, exact: bool, limit: Option<usize>) -> Result<Vec<SymbolMatch>> {
        let chunks = self.load_chunks(&[])?;
        Ok(symbols::search_symbols(&chunks, query, exact, limit.unwrap_or(symbols::DEFAULT_SYMBOL_LIMIT)))
    }

    pub fn build_call_graph(&self, symbol: &str) -> Result<CallGraph> {
        if symbol.trim().is_empty() {
            return Err(ContextError::InvalidRequest("symbol must not be empty".to_string()));
        }
        let chunks = self.load_chunks(&[])?;
        Ok(symbols::build_call_graph(&chunks, symbol))
    }

    pub fn stats(&self) -> Result<StoreStats> {
        self.store.stats()
    }

    pub fn recent_queries(&self, limit: usize) -> Result<Vec<QueryLogEntry>> {
        self.store.recent_queries(limit)
    }

    /// Drop every cached selection; returns how many entries were removed.
    pub fn clear_cache(&self) -> Result<usize> {
        let removed = self.store.cache().clear()?;
        info!(removed, "cleared query cache");
        Ok(removed)
    }
}
