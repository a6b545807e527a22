//! SQLite schema for the chunk index.

use crate::error::{ContextError, Result};
use rusqlite::Connection;

pub const SCHEMA_VERSION: i64 = 3;

pub fn init(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sources (
            id TEXT PRIMARY KEY,
            root TEXT NOT NULL,
            file_count INTEGER NOT NULL DEFAULT 0,
            chunk_count INTEGER NOT NULL DEFAULT 0,
            last_indexed_at TEXT,
            embedding_model TEXT
        );

        CREATE TABLE IF NOT EXISTS files (
            source_id TEXT NOT NULL,
            file_path TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            indexed_at TEXT NOT NULL,
            imports TEXT NOT NULL DEFAULT '[]',
            PRIMARY KEY (source_id, file_path)
        );

        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            source_id TEXT NOT NULL,
            file_path TEXT NOT NULL,
            content TEXT NOT NULL,
            start_line INTEGER NOT NULL,
            end_line INTEGER NOT NULL,
            token_count INTEGER NOT NULL,
            kind TEXT NOT NULL,
            unit_name TEXT,
            exported INTEGER,
            embedding BLOB NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_chunks_file ON chunks(source_id, file_path);

        CREATE TABLE IF NOT EXISTS query_cache (
            cache_key TEXT PRIMARY KEY,
            index_version TEXT NOT NULL,
            payload TEXT NOT NULL,
            created_at TEXT NOT NULL,
            hit_count INTEGER NOT NULL DEFAULT 0,
            last_hit_at TEXT
        );

        CREATE TABLE IF NOT EXISTS query_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            query TEXT NOT NULL,
            budget INTEGER NOT NULL,
            chunks_returned INTEGER NOT NULL,
            tokens_used INTEGER NOT NULL,
            cache_hit INTEGER NOT NULL,
            duration_ms INTEGER NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS metadata (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        ",
    )?;

    let current: Option<i64> =
        conn.query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0)).ok();
    match current {
        None => {
            conn.execute("INSERT INTO schema_version(version) VALUES(?1)", [SCHEMA_VERSION])?;
        }
        Some(version) if version == SCHEMA_VERSION => {}
        Some(version @ (1 | 2)) => {
            if version == 1 {
                migrate_v1_to_v2(conn)?;
            }
            migrate_v2_to_v3(conn)?;
            conn.execute("UPDATE schema_version SET version = ?1", [SCHEMA_VERSION])?;
        }
        Some(version) => {
            return Err(ContextError::InvalidRequest(format!(
                "unsupported index schema version {version}; expected {SCHEMA_VERSION}"
            )));
        }
    }
    Ok(())
}

/// v1 cached payloads did not record hit statistics. They are dropped
/// rather than migrated; the cache refills on demand.
fn migrate_v1_to_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        DROP TABLE IF EXISTS query_cache;
        CREATE TABLE query_cache (
            cache_key TEXT PRIMARY KEY,
            index_version TEXT NOT NULL,
            payload TEXT NOT NULL,
            created_at TEXT NOT NULL,
            hit_count INTEGER NOT NULL DEFAULT 0,
            last_hit_at TEXT
        );
        ",
    )?;
    Ok(())
}

/// v3 records each file's import statements and each source's embedding
/// model. Clearing the stored hashes makes the next run re-read every file
/// so both get filled in.
fn migrate_v2_to_v3(conn: &Connection) -> Result<()> {
    if !has_column(conn, "files", "imports")? {
        conn.execute_batch("ALTER TABLE files ADD COLUMN imports TEXT NOT NULL DEFAULT '[]';")?;
    }
    if !has_column(conn, "sources", "embedding_model")? {
        conn.execute_batch("ALTER TABLE sources ADD COLUMN embedding_model TEXT;")?;
    }
    conn.execute("UPDATE files SET content_hash = ''", [])?;
    Ok(())
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for name in names {
        if name? == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init(&conn).unwrap();
        init(&conn).unwrap();
        let version: i64 =
            conn.query_row("SELECT version FROM schema_version", [], |row| row.get(0)).unwrap();
        assert_eq!(version, SCHEMA_VERSION);
        let rows: i64 =
            conn.query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0)).unwrap();
        assert_eq!(rows, 1);
    }

    const V2_TABLES: &str = "
        CREATE TABLE sources (id TEXT PRIMARY KEY, root TEXT NOT NULL, file_count INTEGER NOT NULL DEFAULT 0,
            chunk_count INTEGER NOT NULL DEFAULT 0, last_indexed_at TEXT);
        CREATE TABLE files (source_id TEXT NOT NULL, file_path TEXT NOT NULL, content_hash TEXT NOT NULL,
            indexed_at TEXT NOT NULL, PRIMARY KEY (source_id, file_path));
        INSERT INTO sources(id, root) VALUES ('app', '/r');
        INSERT INTO files VALUES ('app', 'a.ts', 'h1', 'then');";

    #[test]
    fn v1_cache_table_is_rebuilt() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(V2_TABLES).unwrap();
        conn.execute_batch(
            "CREATE TABLE schema_version (version INTEGER NOT NULL);
             INSERT INTO schema_version VALUES (1);
             CREATE TABLE query_cache (cache_key TEXT PRIMARY KEY, index_version TEXT NOT NULL, payload TEXT NOT NULL, created_at TEXT NOT NULL);
             INSERT INTO query_cache VALUES ('k', 'v', '{}', 'now');",
        )
        .unwrap();
        init(&conn).unwrap();
        let hits: i64 = conn
            .query_row("SELECT COUNT(hit_count) FROM query_cache", [], |row| row.get(0))
            .unwrap();
        assert_eq!(hits, 0);
    }

    #[test]
    fn v2_files_gain_imports_and_are_rehashed() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(V2_TABLES).unwrap();
        conn.execute_batch("CREATE TABLE schema_version (version INTEGER NOT NULL); INSERT INTO schema_version VALUES (2);")
            .unwrap();
        init(&conn).unwrap();

        let (hash, imports): (String, String) = conn
            .query_row("SELECT content_hash, imports FROM files", [], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap();
        assert_eq!(hash, "");
        assert_eq!(imports, "[]");
        let model: Option<String> =
            conn.query_row("SELECT embedding_model FROM sources", [], |row| row.get(0)).unwrap();
        assert_eq!(model, None);
        let version: i64 =
            conn.query_row("SELECT version FROM schema_version", [], |row| row.get(0)).unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn future_versions_are_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE schema_version (version INTEGER NOT NULL); INSERT INTO schema_version VALUES (99);",
        )
        .unwrap();
        assert!(init(&conn).is_err());
    }
}
