//! Version-stamped query cache.
//!
//! Entries are keyed by a hash of the normalized request and stamped with
//! the index version current when they were written. A lookup under a
//! different version deletes the entry and misses.

use crate::domain::{OutputFormat, OutputMode};
use crate::error::{ContextError, Result};
use crate::utils::stable_json_hash;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Every request parameter that can change a selection result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheKeyParams {
    pub query: String,
    pub budget: usize,
    pub sources: Vec<String>,
    pub mode: OutputMode,
    pub format: OutputFormat,
    pub diversity_penalty: bool,
    pub include_imports: bool,
}

impl CacheKeyParams {
    /// Collapse whitespace in the query and sort/dedup the source filter, so
    /// requests that differ only in those respects share a key.
    pub fn normalized(mut self) -> Self {
        self.query = self.query.split_whitespace().collect::<Vec<_>>().join(" ");
        self.sources.sort();
        self.sources.dedup();
        self
    }
}

pub fn cache_key(params: &CacheKeyParams) -> String {
    let normalized = params.clone().normalized();
    let value = serde_json::to_value(&normalized).unwrap_or_default();
    stable_json_hash(&value)
}

pub struct QueryCache<'a> {
    conn: &'a Connection,
}

impl<'a> QueryCache<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Look up `key` under `index_version`.
    ///
    /// Stale entries are purged. A payload that no longer deserializes is
    /// logged, purged and treated as a miss.
    pub fn get<T: DeserializeOwned>(&self, key: &str, index_version: &str) -> Result<Option<T>> {
        let row: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT index_version, payload FROM query_cache WHERE cache_key = ?1",
                [key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((stored_version, payload)) = row else {
            return Ok(None);
        };

        if stored_version != index_version {
            tracing::debug!(key, stored_version, index_version, "purging stale cache entry");
            self.delete(key)?;
            return Ok(None);
        }

        match serde_json::from_str::<T>(&payload) {
            Ok(value) => {
                self.conn.execute(
                    "UPDATE query_cache SET hit_count = hit_count + 1, last_hit_at = ?2 WHERE cache_key = ?1",
                    params![key, super::now_timestamp()],
                )?;
                Ok(Some(value))
            }
            Err(e) => {
                let err = ContextError::CacheCorruption { key: key.to_string(), message: e.to_string() };
                tracing::warn!("{err}; treating as miss");
                self.delete(key)?;
                Ok(None)
            }
        }
    }

    pub fn put<T: Serialize>(&self, key: &str, index_version: &str, value: &T) -> Result<()> {
        let payload = serde_json::to_string(value)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO query_cache(cache_key, index_version, payload, created_at, hit_count)
             VALUES(?1, ?2, ?3, ?4, 0)",
            params![key, index_version, payload, super::now_timestamp()],
        )?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.conn.execute("DELETE FROM query_cache WHERE cache_key = ?1", [key])?;
        Ok(())
    }

    /// Remove every entry; returns how many were removed.
    pub fn clear(&self) -> Result<usize> {
        Ok(self.conn.execute("DELETE FROM query_cache", [])?)
    }

    /// Remove entries written under any version other than `index_version`.
    pub fn purge_stale(&self, index_version: &str) -> Result<usize> {
        Ok(self.conn.execute("DELETE FROM query_cache WHERE index_version != ?1", [index_version])?)
    }

    pub fn entry_count(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM query_cache", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn total_hits(&self) -> Result<usize> {
        let hits: i64 =
            self.conn.query_row("SELECT COALESCE(SUM(hit_count), 0) FROM query_cache", [], |row| row.get(0))?;
        Ok(hits as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::IndexStore;

    fn params(query: &str, sources: &[&str]) -> CacheKeyParams {
        CacheKeyParams {
            query: query.to_string(),
            budget: 1000,
            sources: sources.iter().map(|s| s.to_string()).collect(),
            mode: OutputMode::Full,
            format: OutputFormat::Markdown,
            diversity_penalty: true,
            include_imports: true,
        }
    }

    #[test]
    fn key_ignores_whitespace_and_source_order() {
        assert_eq!(cache_key(&params("login  flow", &["b", "a"])), cache_key(&params(" login flow", &["a", "b", "a"])));
        assert_ne!(cache_key(&params("login", &[])), cache_key(&params("logout", &[])));

        let mut other_budget = params("login", &[]);
        other_budget.budget = 999;
        assert_ne!(cache_key(&params("login", &[])), cache_key(&other_budget));
    }

    #[test]
    fn hit_under_same_version_and_purge_on_change() {
        let store = IndexStore::open_in_memory().unwrap();
        let cache = store.cache();
        cache.put("k", "v1", &vec![1, 2, 3]).unwrap();

        assert_eq!(cache.get::<Vec<i32>>("k", "v1").unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(cache.total_hits().unwrap(), 1);

        assert_eq!(cache.get::<Vec<i32>>("k", "v2").unwrap(), None);
        assert_eq!(cache.entry_count().unwrap(), 0);
    }

    #[test]
    fn corrupt_payload_is_a_miss_and_removed() {
        let store = IndexStore::open_in_memory().unwrap();
        let cache = store.cache();
        cache.put("k", "v1", &"not a list").unwrap();
        assert_eq!(cache.get::<Vec<i32>>("k", "v1").unwrap(), None);
        assert_eq!(cache.entry_count().unwrap(), 0);
    }

    #[test]
    fn clear_and_purge_stale() {
        let store = IndexStore::open_in_memory().unwrap();
        let cache = store.cache();
        cache.put("a", "old", &1).unwrap();
        cache.put("b", "new", &2).unwrap();
        assert_eq!(cache.purge_stale("new").unwrap(), 1);
        assert_eq!(cache.clear().unwrap(), 1);
        assert_eq!(cache.entry_count().unwrap(), 0);
    }
}
