//! Incremental indexer.
//!
//! Per source: discover, classify against stored file records, chunk the
//! new and changed files in parallel, embed them in batches, then commit
//! removals and replacements in one transaction.

pub mod lock;

pub use lock::{lock_path_for_db, try_acquire, IndexWriteLock};

use crate::chunk::{chunk_file, ChunkOptions};
use crate::config::ChunkingConfig;
use crate::domain::{Chunk, DiscoveredFile, FileRecord, IndexStats, Source};
use crate::embed::{check_batch, embedding_signature, EmbeddingProvider};
use crate::error::Result;
use crate::parser::ParserRegistry;
use crate::rank::imports::import_statements;
use crate::scan::{classify_changes, FileScanner};
use crate::store::{now_timestamp, IndexStore, SourceBatch};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Treat every discovered file as changed
    pub force: bool,
    /// Checked between files; a set flag commits what is done and stops
    pub cancel: Option<Arc<AtomicBool>>,
    /// Chunks per embedding call
    pub batch_size: usize,
    pub chunking: ChunkingConfig,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self { force: false, cancel: None, batch_size: 32, chunking: ChunkingConfig::default() }
    }
}

impl IndexOptions {
    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

pub struct Indexer<'a> {
    store: &'a mut IndexStore,
    registry: &'a ParserRegistry,
    provider: &'a dyn EmbeddingProvider,
    options: IndexOptions,
}

impl<'a> Indexer<'a> {
    pub fn new(
        store: &'a mut IndexStore,
        registry: &'a ParserRegistry,
        provider: &'a dyn EmbeddingProvider,
        options: IndexOptions,
    ) -> Self {
        Self { store, registry, provider, options }
    }

    /// Index every source in order. A source that fails to discover or
    /// commit aborts the run; sources committed before it stay committed.
    pub fn index_sources(&mut self, sources: &[Source]) -> Result<IndexStats> {
        let started = Instant::now();
        let mut total = IndexStats::default();

        for source in sources {
            if self.options.is_cancelled() {
                total.cancelled = true;
                break;
            }
            let stats = self.index_source(source)?;
            total.absorb(&stats);
        }

        total.time_ms = started.elapsed().as_millis() as u64;
        Ok(total)
    }

    pub fn index_source(&mut self, source: &Source) -> Result<IndexStats> {
        let started = Instant::now();
        let mut stats = IndexStats::default();

        let mut scanner =
            FileScanner::for_source(source).max_file_bytes(self.options.chunking.max_file_bytes);
        let discovered = scanner.scan()?;
        stats.files = discovered.len();
        stats.files_skipped = scanner.stats().files_skipped();

        let records = self.store.file_records(&source.id)?;
        let signature = embedding_signature(self.provider);
        let indexed_with = self.store.embedding_model(&source.id)?;
        let model_changed = !records.is_empty() && indexed_with.as_deref() != Some(signature.as_str());
        if model_changed {
            warn!(
                source = %source.id,
                indexed = indexed_with.as_deref().unwrap_or("unrecorded"),
                current = %signature,
                "embedding model changed; re-embedding every file"
            );
        }
        let changes = classify_changes(
            discovered,
            &records,
            &scanner.stats().skipped_paths,
            self.options.force || model_changed,
        );
        stats.files_unchanged = changes.unchanged.len();
        stats.files_removed = changes.removed.len();
        debug!(
            source = %source.id,
            new = changes.new.len(),
            changed = changes.changed.len(),
            unchanged = changes.unchanged.len(),
            removed = changes.removed.len(),
            "classified files"
        );

        let chunk_options = ChunkOptions {
            chunk_size: source.chunk_size,
            chunk_overlap: source.chunk_overlap,
            max_unit_tokens: self.options.chunking.max_unit_tokens,
            use_structural_parsing: self.options.chunking.use_structural_parsing,
        };
        let registry = self.registry;
        let to_process: Vec<&DiscoveredFile> = changes.to_process().collect();
        let chunked: Vec<(&DiscoveredFile, Vec<Chunk>)> = to_process
            .into_par_iter()
            .map(|file| {
                let chunks =
                    chunk_file(registry, &source.id, &file.relative_path, &file.content, &chunk_options);
                (file, chunks)
            })
            .collect();

        let mut batch = SourceBatch {
            source_id: source.id.clone(),
            source_root: source.root.to_string_lossy().into_owned(),
            removed: changes.removed.clone(),
            files: Vec::new(),
            embedding_model: None,
        };

        let mut pending: Vec<(&DiscoveredFile, Vec<Chunk>)> = Vec::new();
        let mut pending_chunks = 0usize;
        for (file, chunks) in chunked {
            if self.options.is_cancelled() {
                info!(source = %source.id, "indexing cancelled; committing processed files");
                stats.cancelled = true;
                break;
            }
            pending_chunks += chunks.len();
            pending.push((file, chunks));
            if pending_chunks >= self.options.batch_size {
                self.embed_pending(&mut pending, &mut batch, &mut stats);
                pending_chunks = 0;
            }
        }
        self.embed_pending(&mut pending, &mut batch, &mut stats);

        // Vectors from the old model may remain after a partial run
        let fully_reembedded = !stats.cancelled && stats.files_failed == 0 && changes.unchanged.is_empty();
        if !model_changed || fully_reembedded {
            batch.embedding_model = Some(signature);
        }
        self.store.apply_batch(&batch)?;

        stats.time_ms = started.elapsed().as_millis() as u64;
        info!(
            source = %source.id,
            files = stats.files,
            changed = stats.files_changed,
            removed = stats.files_removed,
            failed = stats.files_failed,
            chunks = stats.chunks,
            time_ms = stats.time_ms,
            "indexed source"
        );
        Ok(stats)
    }

    /// Embed all pending files' chunks. On success the files join `batch`;
    /// on failure they are counted as failed and left unrecorded, so the
    /// next run picks them up again.
    fn embed_pending(
        &self,
        pending: &mut Vec<(&DiscoveredFile, Vec<Chunk>)>,
        batch: &mut SourceBatch,
        stats: &mut IndexStats,
    ) {
        if pending.is_empty() {
            return;
        }
        let files = std::mem::take(pending);
        let texts: Vec<String> =
            files.iter().flat_map(|(_, chunks)| chunks.iter().map(|c| c.content.clone())).collect();

        let vectors = match self.embed_texts(&texts) {
            Ok(vectors) => vectors,
            Err(err) => {
                let paths: Vec<&str> = files.iter().map(|(f, _)| f.relative_path.as_str()).collect();
                warn!(source = %batch.source_id, files = ?paths, "embedding failed: {err}");
                stats.files_failed += files.len();
                return;
            }
        };

        let indexed_at = now_timestamp();
        let mut vectors = vectors.into_iter();
        for (file, mut chunks) in files {
            for chunk in &mut chunks {
                chunk.embedding = vectors.next().unwrap_or_default();
            }
            stats.files_changed += 1;
            stats.chunks += chunks.len();
            stats.chunks_embedded += chunks.len();
            batch.files.push((
                FileRecord {
                    source_id: batch.source_id.clone(),
                    file_path: file.relative_path.clone(),
                    content_hash: file.content_hash.clone(),
                    indexed_at: indexed_at.clone(),
                    imports: import_statements(&file.relative_path, &file.content),
                },
                chunks,
            ));
        }
    }

    fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for group in texts.chunks(self.options.batch_size.max(1)) {
            let embedded = self.provider.embed(group)?;
            check_batch(&embedded, group.len(), self.provider.dims())?;
            vectors.extend(embedded);
        }
        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::HashEmbedder;
    use crate::error::ContextError;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn source(root: &Path) -> Source {
        Source {
            id: "app".to_string(),
            root: root.to_path_buf(),
            include: Vec::new(),
            exclude: Vec::new(),
            chunk_size: 256,
            chunk_overlap: 32,
        }
    }

    /// Fails every call whose texts mention `poison`.
    struct PoisonedEmbedder(HashEmbedder);

    impl EmbeddingProvider for PoisonedEmbedder {
        fn model_name(&self) -> &str {
            "poisoned"
        }
        fn dims(&self) -> usize {
            self.0.dims()
        }
        fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            if texts.iter().any(|t| t.contains("poison")) {
                return Err(ContextError::provider("quota exceeded", false));
            }
            self.0.embed(texts)
        }
    }

    #[test]
    fn second_run_is_a_no_op_and_edits_are_incremental() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.js"), "function a() { return 1; }\n").unwrap();
        fs::write(tmp.path().join("b.py"), "def b():\n    return 2\n").unwrap();

        let mut store = IndexStore::open_in_memory().unwrap();
        let registry = ParserRegistry::new();
        let provider = HashEmbedder::new(32);
        let src = source(tmp.path());

        let first = Indexer::new(&mut store, &registry, &provider, IndexOptions::default())
            .index_sources(std::slice::from_ref(&src))
            .unwrap();
        assert_eq!(first.files_changed, 2);
        assert_eq!(first.chunks, 2);
        let version = store.index_version().unwrap();

        let second = Indexer::new(&mut store, &registry, &provider, IndexOptions::default())
            .index_sources(std::slice::from_ref(&src))
            .unwrap();
        assert_eq!(second.files_changed, 0);
        assert_eq!(second.files_unchanged, 2);
        assert_eq!(second.chunks_embedded, 0);
        assert_eq!(store.index_version().unwrap(), version);

        fs::write(tmp.path().join("a.js"), "function a() { return 3; }\n").unwrap();
        fs::remove_file(tmp.path().join("b.py")).unwrap();
        let third = Indexer::new(&mut store, &registry, &provider, IndexOptions::default())
            .index_sources(std::slice::from_ref(&src))
            .unwrap();
        assert_eq!(third.files_changed, 1);
        assert_eq!(third.files_removed, 1);
        let chunks = store.load_chunks(None).unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].content.contains("return 3"));
        assert_eq!(chunks[0].embedding.len(), 32);
    }

    #[test]
    fn failed_embedding_batch_leaves_files_unrecorded() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("good.js"), "function good() {}\n").unwrap();
        fs::write(tmp.path().join("bad.js"), "function poison() {}\n").unwrap();

        let mut store = IndexStore::open_in_memory().unwrap();
        let registry = ParserRegistry::new();
        let provider = PoisonedEmbedder(HashEmbedder::new(16));
        let options = IndexOptions { batch_size: 1, ..IndexOptions::default() };

        let stats = Indexer::new(&mut store, &registry, &provider, options)
            .index_sources(&[source(tmp.path())])
            .unwrap();
        assert_eq!(stats.files_failed, 1);
        assert_eq!(stats.files_changed, 1);

        let records = store.file_records("app").unwrap();
        assert!(records.contains_key("good.js"));
        assert!(!records.contains_key("bad.js"));
    }

    #[test]
    fn cancellation_commits_nothing_past_the_flag() {
        let tmp = TempDir::new().unwrap();
        for i in 0..5 {
            fs::write(tmp.path().join(format!("f{i}.js")), format!("function f{i}() {{}}\n")).unwrap();
        }
        let mut store = IndexStore::open_in_memory().unwrap();
        let registry = ParserRegistry::new();
        let provider = HashEmbedder::new(16);
        let flag = Arc::new(AtomicBool::new(true));
        let options = IndexOptions { cancel: Some(flag), ..IndexOptions::default() };

        let stats = Indexer::new(&mut store, &registry, &provider, options)
            .index_sources(&[source(tmp.path())])
            .unwrap();
        assert!(stats.cancelled);
        assert_eq!(store.chunk_count().unwrap(), 0);
    }

    #[test]
    fn cancelling_mid_source_keeps_processed_files() {
        let tmp = TempDir::new().unwrap();
        for i in 0..4 {
            fs::write(tmp.path().join(format!("f{i}.js")), format!("function f{i}() {{}}\n")).unwrap();
        }
        let mut store = IndexStore::open_in_memory().unwrap();
        let registry = ParserRegistry::new();
        let flag = Arc::new(AtomicBool::new(false));
        let provider = CancelAfterFirst { inner: HashEmbedder::new(16), flag: flag.clone() };
        let options = IndexOptions { cancel: Some(flag), batch_size: 1, ..IndexOptions::default() };

        let mut indexer = Indexer::new(&mut store, &registry, &provider, options);
        let stats = indexer.index_source(&source(tmp.path())).unwrap();
        assert!(stats.cancelled);
        assert_eq!(stats.files_changed, 1);
        assert_eq!(store.file_records("app").unwrap().len(), 1);
    }

    struct CancelAfterFirst {
        inner: HashEmbedder,
        flag: Arc<AtomicBool>,
    }

    impl EmbeddingProvider for CancelAfterFirst {
        fn model_name(&self) -> &str {
            "cancel-after-first"
        }
        fn dims(&self) -> usize {
            self.inner.dims()
        }
        fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.flag.store(true, Ordering::Relaxed);
            self.inner.embed(texts)
        }
    }

    #[test]
    fn provider_change_reembeds_every_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.js"), "function a() { return 1; }\n").unwrap();
        fs::write(tmp.path().join("b.py"), "def b():\n    return 2\n").unwrap();
        let mut store = IndexStore::open_in_memory().unwrap();
        let registry = ParserRegistry::new();
        let src = source(tmp.path());

        let wide = HashEmbedder::new(64);
        Indexer::new(&mut store, &registry, &wide, IndexOptions::default())
            .index_sources(std::slice::from_ref(&src))
            .unwrap();
        assert_eq!(store.embedding_model("app").unwrap().as_deref(), Some("hash-64:64"));
        let version = store.index_version().unwrap();

        let narrow = HashEmbedder::new(32);
        let stats = Indexer::new(&mut store, &registry, &narrow, IndexOptions::default())
            .index_sources(std::slice::from_ref(&src))
            .unwrap();
        assert_eq!(stats.files_changed, 2);
        assert_eq!(stats.chunks_embedded, 2);
        assert_eq!(store.embedding_model("app").unwrap().as_deref(), Some("hash-32:32"));
        assert_ne!(store.index_version().unwrap(), version);
        assert!(store.load_chunks(None).unwrap().iter().all(|c| c.embedding.len() == 32));
    }

    #[test]
    fn partial_reembed_keeps_the_old_signature() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("good.js"), "function good() {}\n").unwrap();
        fs::write(tmp.path().join("bad.js"), "function poison() {}\n").unwrap();
        let mut store = IndexStore::open_in_memory().unwrap();
        let registry = ParserRegistry::new();
        let src = source(tmp.path());

        Indexer::new(&mut store, &registry, &HashEmbedder::new(16), IndexOptions::default())
            .index_sources(std::slice::from_ref(&src))
            .unwrap();

        let poisoned = PoisonedEmbedder(HashEmbedder::new(16));
        let options = IndexOptions { batch_size: 1, ..IndexOptions::default() };
        let stats = Indexer::new(&mut store, &registry, &poisoned, options)
            .index_sources(std::slice::from_ref(&src))
            .unwrap();
        assert_eq!(stats.files_failed, 1);
        assert_eq!(store.embedding_model("app").unwrap().as_deref(), Some("hash-16:16"));
    }

    #[test]
    fn recorded_imports_cover_lines_outside_chunks() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("auth.ts"), "import { hash } from './util';\n\nexport function login(u) {\n  return hash(u);\n}\n").unwrap();
        fs::write(tmp.path().join("util.ts"), "export function hash(v) {\n  return v;\n}\n").unwrap();
        let mut store = IndexStore::open_in_memory().unwrap();
        let registry = ParserRegistry::new();

        Indexer::new(&mut store, &registry, &HashEmbedder::new(16), IndexOptions::default())
            .index_sources(&[source(tmp.path())])
            .unwrap();
        let records = store.file_records("app").unwrap();
        assert_eq!(records["auth.ts"].imports, ["import { hash } from './util'"]);
        assert!(records["util.ts"].imports.is_empty());
    }

    #[test]
    fn missing_root_fails_the_run() {
        let mut store = IndexStore::open_in_memory().unwrap();
        let registry = ParserRegistry::new();
        let provider = HashEmbedder::new(8);
        let result = Indexer::new(&mut store, &registry, &provider, IndexOptions::default())
            .index_sources(&[source(Path::new("/no/such/root"))]);
        assert!(matches!(result, Err(ContextError::Discovery { .. })));
    }
}
