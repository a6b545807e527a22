//! Configuration validation.
//!
//! Every check runs; the caller gets all violations in one error.

use super::{Config, ProviderKind};
use crate::error::{ContextError, Result};
use globset::Glob;
use std::collections::HashSet;

pub fn validate_config(config: &Config) -> Result<()> {
    let mut violations = Vec::new();

    if config.sources.is_empty() {
        violations.push("at least one source must be configured".to_string());
    }

    let mut seen_ids = HashSet::new();
    for (idx, source) in config.sources.iter().enumerate() {
        let prefix = format!("sources[{idx}]");
        if source.id.trim().is_empty() {
            violations.push(format!("{prefix}.id must not be empty"));
        } else if !seen_ids.insert(source.id.as_str()) {
            violations.push(format!("{prefix}.id '{}' is duplicated", source.id));
        }
        if source.chunk_size == 0 {
            violations.push(format!("{prefix}.chunk_size must be greater than 0"));
        }
        if source.chunk_overlap >= source.chunk_size {
            violations.push(format!(
                "{prefix}.chunk_overlap ({}) must be smaller than chunk_size ({})",
                source.chunk_overlap, source.chunk_size
            ));
        }
        for (field, patterns) in [("include", &source.include), ("exclude", &source.exclude)] {
            for pattern in patterns {
                if let Err(e) = Glob::new(pattern) {
                    violations.push(format!("{prefix}.{field} pattern '{pattern}' is invalid: {e}"));
                }
            }
        }
    }

    if config.chunking.max_unit_tokens == 0 {
        violations.push("chunking.max_unit_tokens must be greater than 0".to_string());
    }
    if config.chunking.max_file_bytes == 0 {
        violations.push("chunking.max_file_bytes must be greater than 0".to_string());
    }

    let embedding = &config.embedding;
    if embedding.dims == 0 {
        violations.push("embedding.dims must be greater than 0".to_string());
    }
    if embedding.batch_size == 0 {
        violations.push("embedding.batch_size must be greater than 0".to_string());
    }
    if embedding.timeout_secs == 0 {
        violations.push("embedding.timeout_secs must be greater than 0".to_string());
    }
    if embedding.provider == ProviderKind::Http {
        if embedding.url.as_deref().map_or(true, |u| u.trim().is_empty()) {
            violations.push("embedding.url is required for the http provider".to_string());
        }
        if embedding.model.as_deref().map_or(true, |m| m.trim().is_empty()) {
            violations.push("embedding.model is required for the http provider".to_string());
        }
    }

    if config.selection.default_budget == 0 {
        violations.push("selection.default_budget must be greater than 0".to_string());
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ContextError::ConfigValidation(violations))
    }
}

pub fn validate_budget(budget: usize) -> Result<()> {
    if budget == 0 {
        return Err(ContextError::ConfigValidation(vec![
            "budget must be greater than 0".to_string()
        ]));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceConfig;

    #[test]
    fn default_config_is_valid() {
        validate_config(&Config::default()).expect("defaults validate");
    }

    #[test]
    fn reports_all_violations_not_just_the_first() {
        let mut cfg = Config::default();
        cfg.sources = vec![
            SourceConfig { id: String::new(), chunk_overlap: 600, ..SourceConfig::default() },
            SourceConfig { exclude: vec!["src/[".to_string()], ..SourceConfig::default() },
            SourceConfig::default(),
        ];
        cfg.embedding.provider = ProviderKind::Http;
        cfg.embedding.dims = 0;

        let err = validate_config(&cfg).expect_err("invalid config");
        let ContextError::ConfigValidation(violations) = err else {
            panic!("expected ConfigValidation");
        };
        assert!(violations.iter().any(|v| v.contains("sources[0].id must not be empty")));
        assert!(violations.iter().any(|v| v.contains("sources[0].chunk_overlap")));
        assert!(violations.iter().any(|v| v.contains("sources[1].exclude")));
        assert!(violations.iter().any(|v| v.contains("'default' is duplicated")));
        assert!(violations.iter().any(|v| v.contains("embedding.url")));
        assert!(violations.iter().any(|v| v.contains("embedding.model")));
        assert!(violations.iter().any(|v| v.contains("embedding.dims")));
    }

    #[test]
    fn zero_budget_is_rejected() {
        assert!(validate_budget(0).is_err());
        assert!(validate_budget(1).is_ok());
    }
}
