//! Shared CLI utilities.

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::config::load_config;
use crate::engine::ContextEngine;

/// Global arguments every engine-backed command needs.
pub struct ProjectArgs {
    pub root: PathBuf,
    pub config: Option<PathBuf>,
}

impl ProjectArgs {
    pub fn open_engine(&self) -> Result<ContextEngine> {
        let root = self
            .root
            .canonicalize()
            .with_context(|| format!("Project root not found: {}", self.root.display()))?;
        if !root.is_dir() {
            anyhow::bail!("Project root is not a directory: {}", root.display());
        }
        let config = load_config(&root, self.config.as_deref())?;
        Ok(ContextEngine::open(&root, config)?)
    }
}

/// Parse a comma-separated string into a `Vec<String>`, trimming whitespace and
/// discarding empty segments. Returns an empty list when `value` is `None`.
pub fn parse_csv(value: &Option<String>) -> Vec<String> {
    value
        .as_ref()
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| part.to_string())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::parse_csv;

    #[test]
    fn csv_trims_and_drops_empty_parts() {
        assert_eq!(parse_csv(&Some(" api, ,web ".to_string())), vec!["api", "web"]);
        assert!(parse_csv(&None).is_empty());
    }
}
