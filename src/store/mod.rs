//! Persistent chunk index over SQLite.
//!
//! All writes for one source go through [`IndexStore::apply_batch`], which
//! replaces each touched file's chunks inside a single transaction.

pub mod cache;
pub mod schema;

pub use cache::{cache_key, CacheKeyParams, QueryCache};

use crate::domain::{Chunk, ChunkKind, FileKey, FileRecord, Source};
use crate::embed::{blob_to_vec, vec_to_blob};
use crate::error::Result;
use crate::utils::sha256_hex;
use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Replacement set for one source, committed atomically.
#[derive(Debug, Clone, Default)]
pub struct SourceBatch {
    pub source_id: String,
    pub source_root: String,
    /// Paths whose rows are deleted
    pub removed: Vec<String>,
    /// Files whose chunks are replaced, with their new chunks
    pub files: Vec<(FileRecord, Vec<Chunk>)>,
    /// Embedding signature the source's vectors now carry; `None` keeps the
    /// stored one
    pub embedding_model: Option<String>,
}

impl SourceBatch {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.files.is_empty()
    }
}

/// One row of `query_history`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryLogEntry {
    pub query: String,
    pub budget: usize,
    pub chunks_returned: usize,
    pub tokens_used: usize,
    pub cache_hit: bool,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceStats {
    pub id: String,
    pub files: usize,
    pub chunks: usize,
    pub last_indexed_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub sources: Vec<SourceStats>,
    pub total_files: usize,
    pub total_chunks: usize,
    pub total_tokens: usize,
    pub cache_entries: usize,
    pub cache_hits: usize,
    pub queries: usize,
    pub index_version: String,
}

pub struct IndexStore {
    conn: Connection,
}

pub(crate) fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

const CHUNK_COLUMNS: &str =
    "id, source_id, file_path, content, start_line, end_line, token_count, kind, unit_name, exported, embedding";

fn chunk_from_row(row: &Row<'_>) -> rusqlite::Result<Chunk> {
    let kind: String = row.get(7)?;
    let kind: ChunkKind = kind.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, e.into())
    })?;
    let blob: Vec<u8> = row.get(10)?;
    Ok(Chunk {
        id: row.get(0)?,
        source_id: row.get(1)?,
        file_path: row.get(2)?,
        content: row.get(3)?,
        start_line: row.get::<_, i64>(4)? as usize,
        end_line: row.get::<_, i64>(5)? as usize,
        token_count: row.get::<_, i64>(6)? as usize,
        kind,
        unit_name: row.get(8)?,
        exported: row.get(9)?,
        embedding: blob_to_vec(&blob),
    })
}

impl IndexStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        schema::init(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::init(&conn)?;
        Ok(Self { conn })
    }

    pub fn cache(&self) -> QueryCache<'_> {
        QueryCache::new(&self.conn)
    }

    pub fn file_records(&self, source_id: &str) -> Result<HashMap<String, FileRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT source_id, file_path, content_hash, indexed_at, imports FROM files WHERE source_id = ?1",
        )?;
        let rows = stmt.query_map([source_id], |row| {
            let record = FileRecord {
                source_id: row.get(0)?,
                file_path: row.get(1)?,
                content_hash: row.get(2)?,
                indexed_at: row.get(3)?,
                imports: Vec::new(),
            };
            Ok((record, row.get::<_, String>(4)?))
        })?;

        let mut records = HashMap::new();
        for row in rows {
            let (mut record, imports) = row?;
            record.imports = serde_json::from_str(&imports)?;
            records.insert(record.file_path.clone(), record);
        }
        Ok(records)
    }

    /// Recorded import statements per file, ordered by source and path,
    /// optionally restricted to `source_ids`.
    pub fn file_imports(&self, source_ids: Option<&[String]>) -> Result<Vec<(FileKey, Vec<String>)>> {
        let mut stmt =
            self.conn.prepare("SELECT source_id, file_path, imports FROM files ORDER BY source_id, file_path")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
        })?;

        let mut files: Vec<(FileKey, Vec<String>)> = Vec::new();
        for row in rows {
            let (source_id, file_path, imports) = row?;
            if source_ids.map_or(true, |ids| ids.iter().any(|id| *id == source_id)) {
                files.push(((source_id, file_path), serde_json::from_str(&imports)?));
            }
        }
        Ok(files)
    }

    /// Sources holding chunks, with the signature their vectors carry.
    pub fn embedding_models(&self) -> Result<Vec<(String, Option<String>)>> {
        let mut stmt =
            self.conn.prepare("SELECT id, embedding_model FROM sources WHERE chunk_count > 0 ORDER BY id")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?)))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// Embedding signature recorded for a source's vectors, if any.
    pub fn embedding_model(&self, source_id: &str) -> Result<Option<String>> {
        let model: Option<Option<String>> = self
            .conn
            .query_row("SELECT embedding_model FROM sources WHERE id = ?1", [source_id], |row| row.get(0))
            .optional()?;
        Ok(model.flatten())
    }

    /// Apply one source's changes in a single transaction.
    ///
    /// Removed paths lose their file and chunk rows. For every file in
    /// `batch.files`, stored chunks whose id and content still match are
    /// kept as-is; the rest are deleted and the new ones inserted. Any
    /// failure rolls the whole batch back.
    pub fn apply_batch(&mut self, batch: &SourceBatch) -> Result<()> {
        let now = now_timestamp();
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO sources(id, root, last_indexed_at, embedding_model) VALUES(?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET root = excluded.root, last_indexed_at = excluded.last_indexed_at,
                 embedding_model = COALESCE(excluded.embedding_model, sources.embedding_model)",
            params![batch.source_id, batch.source_root, now, batch.embedding_model],
        )?;

        for path in &batch.removed {
            tx.execute(
                "DELETE FROM chunks WHERE source_id = ?1 AND file_path = ?2",
                params![batch.source_id, path],
            )?;
            tx.execute(
                "DELETE FROM files WHERE source_id = ?1 AND file_path = ?2",
                params![batch.source_id, path],
            )?;
        }

        {
            let mut existing_stmt =
                tx.prepare("SELECT id, content FROM chunks WHERE source_id = ?1 AND file_path = ?2")?;
            let mut delete = tx.prepare("DELETE FROM chunks WHERE id = ?1")?;
            let mut insert = tx.prepare(
                "INSERT OR REPLACE INTO chunks(id, source_id, file_path, content, start_line, end_line,
                     token_count, kind, unit_name, exported, embedding, created_at)
                 VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            )?;

            for (record, chunks) in &batch.files {
                let existing: HashMap<String, String> = existing_stmt
                    .query_map(params![record.source_id, record.file_path], |row| {
                        Ok((row.get(0)?, row.get(1)?))
                    })?
                    .collect::<rusqlite::Result<_>>()?;
                let incoming: HashMap<&str, &Chunk> = chunks.iter().map(|c| (c.id.as_str(), c)).collect();

                for (id, content) in &existing {
                    if incoming.get(id.as_str()).map_or(true, |c| c.content != *content) {
                        delete.execute([id])?;
                    }
                }
                for chunk in chunks {
                    if existing.get(&chunk.id).is_some_and(|content| *content == chunk.content) {
                        continue;
                    }
                    insert.execute(params![
                        chunk.id,
                        chunk.source_id,
                        chunk.file_path,
                        chunk.content,
                        chunk.start_line as i64,
                        chunk.end_line as i64,
                        chunk.token_count as i64,
                        chunk.kind.as_str(),
                        chunk.unit_name,
                        chunk.exported,
                        vec_to_blob(&chunk.embedding),
                        now,
                    ])?;
                }
                tx.execute(
                    "INSERT INTO files(source_id, file_path, content_hash, indexed_at, imports) VALUES(?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(source_id, file_path) DO UPDATE
                     SET content_hash = excluded.content_hash, indexed_at = excluded.indexed_at,
                         imports = excluded.imports",
                    params![
                        record.source_id,
                        record.file_path,
                        record.content_hash,
                        record.indexed_at,
                        serde_json::to_string(&record.imports)?,
                    ],
                )?;
            }
        }

        tx.execute(
            "UPDATE sources SET
                 file_count = (SELECT COUNT(*) FROM files WHERE source_id = ?1),
                 chunk_count = (SELECT COUNT(*) FROM chunks WHERE source_id = ?1)
             WHERE id = ?1",
            [&batch.source_id],
        )?;

        if !batch.is_empty() {
            bump_generation(&tx)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Register a source without touching its files.
    pub fn register_source(&self, source: &Source) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sources(id, root) VALUES(?1, ?2)
             ON CONFLICT(id) DO UPDATE SET root = excluded.root",
            params![source.id, source.root.to_string_lossy()],
        )?;
        Ok(())
    }

    /// Chunks in deterministic order, optionally restricted to `source_ids`.
    pub fn load_chunks(&self, source_ids: Option<&[String]>) -> Result<Vec<Chunk>> {
        let sql = format!("SELECT {CHUNK_COLUMNS} FROM chunks ORDER BY source_id, file_path, start_line, end_line");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], chunk_from_row)?;

        let mut chunks = Vec::new();
        for chunk in rows {
            let chunk = chunk?;
            if source_ids.map_or(true, |ids| ids.iter().any(|id| *id == chunk.source_id)) {
                chunks.push(chunk);
            }
        }
        Ok(chunks)
    }

    pub fn chunk_count(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Opaque fingerprint of the committed index state.
    ///
    /// Derived from chunk and source counts, the newest chunk timestamp, the
    /// sources' embedding signatures and a generation counter bumped by every
    /// committed mutation, so removals that leave counts unchanged still
    /// produce a new version.
    pub fn index_version(&self) -> Result<String> {
        let (chunks, latest): (i64, Option<String>) = self.conn.query_row(
            "SELECT COUNT(*), MAX(created_at) FROM chunks",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let sources: i64 = self.conn.query_row("SELECT COUNT(*) FROM sources", [], |row| row.get(0))?;
        let models: String = self.conn.query_row(
            "SELECT COALESCE(GROUP_CONCAT(id || '=' || COALESCE(embedding_model, ''), ','), '')
             FROM (SELECT id, embedding_model FROM sources ORDER BY id)",
            [],
            |row| row.get(0),
        )?;
        let generation = generation(&self.conn)?;
        let fingerprint = format!("{chunks}|{sources}|{}|{models}|{generation}", latest.unwrap_or_default());
        Ok(sha256_hex(fingerprint.as_bytes())[..16].to_string())
    }

    pub fn record_query(&self, entry: &QueryLogEntry) -> Result<()> {
        self.conn.execute(
            "INSERT INTO query_history(query, budget, chunks_returned, tokens_used, cache_hit, duration_ms, created_at)
             VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.query,
                entry.budget as i64,
                entry.chunks_returned as i64,
                entry.tokens_used as i64,
                entry.cache_hit,
                entry.duration_ms as i64,
                now_timestamp(),
            ],
        )?;
        Ok(())
    }

    /// Most recent queries first.
    pub fn recent_queries(&self, limit: usize) -> Result<Vec<QueryLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT query, budget, chunks_returned, tokens_used, cache_hit, duration_ms
             FROM query_history ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit as i64], |row| {
            Ok(QueryLogEntry {
                query: row.get(0)?,
                budget: row.get::<_, i64>(1)? as usize,
                chunks_returned: row.get::<_, i64>(2)? as usize,
                tokens_used: row.get::<_, i64>(3)? as usize,
                cache_hit: row.get(4)?,
                duration_ms: row.get::<_, i64>(5)? as u64,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let mut stmt = self.conn.prepare(
            "SELECT id, last_indexed_at, file_count, chunk_count FROM sources ORDER BY id",
        )?;
        let sources = stmt
            .query_map([], |row| {
                Ok(SourceStats {
                    id: row.get(0)?,
                    last_indexed_at: row.get(1)?,
                    files: row.get::<_, i64>(2)? as usize,
                    chunks: row.get::<_, i64>(3)? as usize,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let (total_chunks, total_tokens): (i64, i64) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(token_count), 0) FROM chunks",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let total_files: i64 = self.conn.query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
        let queries: i64 = self.conn.query_row("SELECT COUNT(*) FROM query_history", [], |row| row.get(0))?;
        let cache = self.cache();

        Ok(StoreStats {
            sources,
            total_files: total_files as usize,
            total_chunks: total_chunks as usize,
            total_tokens: total_tokens as usize,
            cache_entries: cache.entry_count()?,
            cache_hits: cache.total_hits()?,
            queries: queries as usize,
            index_version: self.index_version()?,
        })
    }
}

fn generation(conn: &Connection) -> Result<i64> {
    let value: Option<String> = conn
        .query_row("SELECT value FROM metadata WHERE key = 'index_generation'", [], |row| row.get(0))
        .optional()?;
    Ok(value.and_then(|v| v.parse().ok()).unwrap_or(0))
}

fn bump_generation(conn: &Connection) -> Result<()> {
    let next = generation(conn)? + 1;
    conn.execute(
        "INSERT INTO metadata(key, value) VALUES('index_generation', ?1)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        [next.to_string()],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::chunk_id;

    fn chunk(source: &str, path: &str, start: usize, end: usize) -> Chunk {
        Chunk {
            id: chunk_id(source, path, start, end),
            source_id: source.to_string(),
            file_path: path.to_string(),
            content: format!("content {start}-{end}"),
            start_line: start,
            end_line: end,
            token_count: 4,
            kind: ChunkKind::Function,
            unit_name: Some("f".to_string()),
            exported: Some(true),
            embedding: vec![0.5, -0.5],
        }
    }

    fn record(source: &str, path: &str, hash: &str) -> FileRecord {
        FileRecord {
            source_id: source.to_string(),
            file_path: path.to_string(),
            content_hash: hash.to_string(),
            imports: Vec::new(),
            indexed_at: now_timestamp(),
        }
    }

    fn batch(files: Vec<(FileRecord, Vec<Chunk>)>, removed: Vec<String>) -> SourceBatch {
        SourceBatch { source_id: "s".into(), source_root: "/r".into(), removed, files, embedding_model: None }
    }

    #[test]
    fn apply_batch_replaces_file_chunks() {
        let mut store = IndexStore::open_in_memory().unwrap();
        store
            .apply_batch(&batch(
                vec![(record("s", "a.ts", "h1"), vec![chunk("s", "a.ts", 1, 5), chunk("s", "a.ts", 6, 9)])],
                vec![],
            ))
            .unwrap();
        assert_eq!(store.chunk_count().unwrap(), 2);

        store
            .apply_batch(&batch(vec![(record("s", "a.ts", "h2"), vec![chunk("s", "a.ts", 1, 3)])], vec![]))
            .unwrap();
        let chunks = store.load_chunks(None).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].end_line, 3);
        assert_eq!(chunks[0].embedding, vec![0.5, -0.5]);
        assert_eq!(store.file_records("s").unwrap()["a.ts"].content_hash, "h2");
    }

    #[test]
    fn removal_deletes_file_and_chunks() {
        let mut store = IndexStore::open_in_memory().unwrap();
        store
            .apply_batch(&batch(
                vec![
                    (record("s", "a.ts", "h"), vec![chunk("s", "a.ts", 1, 2)]),
                    (record("s", "b.ts", "h"), vec![chunk("s", "b.ts", 1, 2)]),
                ],
                vec![],
            ))
            .unwrap();
        store.apply_batch(&batch(vec![], vec!["a.ts".to_string()])).unwrap();

        let chunks = store.load_chunks(None).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].file_path, "b.ts");
        assert!(!store.file_records("s").unwrap().contains_key("a.ts"));
    }

    #[test]
    fn index_version_changes_only_on_mutation() {
        let mut store = IndexStore::open_in_memory().unwrap();
        let empty = store.index_version().unwrap();
        store
            .apply_batch(&batch(vec![(record("s", "a.ts", "h"), vec![chunk("s", "a.ts", 1, 2)])], vec![]))
            .unwrap();
        let v1 = store.index_version().unwrap();
        assert_ne!(empty, v1);
        assert_eq!(v1, store.index_version().unwrap());

        store.apply_batch(&batch(vec![], vec![])).unwrap();
        assert_eq!(v1, store.index_version().unwrap());

        store
            .apply_batch(&batch(vec![(record("s", "a.ts", "h2"), vec![chunk("s", "a.ts", 1, 2)])], vec![]))
            .unwrap();
        assert_ne!(v1, store.index_version().unwrap());
    }

    #[test]
    fn file_imports_survive_chunk_reuse() {
        let mut store = IndexStore::open_in_memory().unwrap();
        let mut auth = record("s", "auth.ts", "h1");
        auth.imports = vec!["import { hash } from './util'".to_string()];
        store
            .apply_batch(&batch(
                vec![(auth, vec![chunk("s", "auth.ts", 3, 5)]), (record("s", "util.ts", "h2"), vec![])],
                vec![],
            ))
            .unwrap();

        let files = store.file_imports(None).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].0, ("s".to_string(), "auth.ts".to_string()));
        assert_eq!(files[0].1, ["import { hash } from './util'"]);
        assert!(files[1].1.is_empty());
        assert_eq!(store.file_records("s").unwrap()["auth.ts"].imports, files[0].1);
        assert!(store.file_imports(Some(&["t".to_string()][..])).unwrap().is_empty());
    }

    #[test]
    fn embedding_model_is_kept_until_replaced() {
        let mut store = IndexStore::open_in_memory().unwrap();
        assert_eq!(store.embedding_model("s").unwrap(), None);

        let mut first = batch(vec![(record("s", "a.ts", "h"), vec![chunk("s", "a.ts", 1, 2)])], vec![]);
        first.embedding_model = Some("hash:64".to_string());
        store.apply_batch(&first).unwrap();
        let v1 = store.index_version().unwrap();

        store.apply_batch(&batch(vec![], vec![])).unwrap();
        assert_eq!(store.embedding_model("s").unwrap().as_deref(), Some("hash:64"));
        assert_eq!(store.embedding_models().unwrap(), vec![("s".to_string(), Some("hash:64".to_string()))]);
        assert_eq!(store.index_version().unwrap(), v1);

        let mut switched = batch(vec![], vec![]);
        switched.embedding_model = Some("hash:32".to_string());
        store.apply_batch(&switched).unwrap();
        assert_eq!(store.embedding_model("s").unwrap().as_deref(), Some("hash:32"));
        assert_ne!(store.index_version().unwrap(), v1);
    }

    #[test]
    fn load_chunks_filters_by_source() {
        let mut store = IndexStore::open_in_memory().unwrap();
        store
            .apply_batch(&batch(vec![(record("s", "a.ts", "h"), vec![chunk("s", "a.ts", 1, 2)])], vec![]))
            .unwrap();
        let other = SourceBatch {
            source_id: "t".into(),
            source_root: "/t".into(),
            removed: vec![],
            files: vec![(record("t", "x.py", "h"), vec![chunk("t", "x.py", 1, 2)])],
            embedding_model: None,
        };
        store.apply_batch(&other).unwrap();

        assert_eq!(store.load_chunks(None).unwrap().len(), 2);
        let only_t = store.load_chunks(Some(&["t".to_string()][..])).unwrap();
        assert_eq!(only_t.len(), 1);
        assert_eq!(only_t[0].source_id, "t");

        let stats = store.stats().unwrap();
        assert_eq!(stats.sources.len(), 2);
        assert_eq!(stats.total_chunks, 2);
        assert_eq!(stats.total_tokens, 8);
    }

    #[test]
    fn query_history_is_appended() {
        let store = IndexStore::open_in_memory().unwrap();
        for (i, hit) in [false, true].into_iter().enumerate() {
            store
                .record_query(&QueryLogEntry {
                    query: format!("q{i}"),
                    budget: 100,
                    chunks_returned: 2,
                    tokens_used: 50,
                    cache_hit: hit,
                    duration_ms: 3,
                })
                .unwrap();
        }
        let recent = store.recent_queries(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].query, "q1");
        assert!(recent[0].cache_hit);
    }
}
