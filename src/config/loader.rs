//! Config file loading

use super::Config;
use crate::error::{ContextError, Result};
use figment::providers::{Env, Serialized};
use figment::Figment;
use std::fs;
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "CODECTX_";

/// Load configuration for a project root.
///
/// An explicit `config_path` must parse; an auto-discovered file that fails to
/// parse is logged and replaced by defaults. Environment overrides are applied
/// last in both cases.
pub fn load_config(project_root: &Path, config_path: Option<&Path>) -> Result<Config> {
    let config_path_provided = config_path.is_some();

    let discovered = match config_path {
        Some(path) => Some(path.to_path_buf()),
        None => discover_config(project_root),
    };

    let file_config = match discovered {
        None => Config::default(),
        Some(config_file) => match parse_config_file(&config_file) {
            Ok(cfg) => cfg,
            Err(err) if !config_path_provided => {
                tracing::warn!(
                    "Failed to parse auto-discovered config {}: {}",
                    config_file.display(),
                    err
                );
                Config::default()
            }
            Err(err) => return Err(err),
        },
    };

    apply_env_overrides(file_config)
}

fn parse_config_file(config_file: &Path) -> Result<Config> {
    let content = fs::read_to_string(config_file).map_err(|e| {
        ContextError::ConfigValidation(vec![format!(
            "failed reading config file {}: {e}",
            config_file.display()
        )])
    })?;

    let ext = config_file.extension().and_then(|e| e.to_str()).unwrap_or("").to_ascii_lowercase();
    match ext.as_str() {
        "toml" => parse_toml_config(&content, config_file),
        "yaml" | "yml" => parse_yaml_config(&content, config_file),
        other => Err(invalid(config_file, format!("unsupported config extension '.{other}'"))),
    }
}

/// Parse TOML config, accepting an optional nested `[codectx]` table.
fn parse_toml_config(content: &str, config_file: &Path) -> Result<Config> {
    let raw: toml::Value =
        toml::from_str(content).map_err(|e| invalid(config_file, format!("invalid TOML: {e}")))?;

    let config_val = match raw.get("codectx") {
        Some(nested) => nested.clone(),
        None => raw,
    };

    config_val.try_into().map_err(|e| invalid(config_file, format!("invalid config: {e}")))
}

/// Parse YAML config, accepting an optional nested `codectx` mapping.
fn parse_yaml_config(content: &str, config_file: &Path) -> Result<Config> {
    let raw: serde_yaml::Value = serde_yaml::from_str(content)
        .map_err(|e| invalid(config_file, format!("invalid YAML: {e}")))?;

    let config_val = match raw.get("codectx") {
        Some(nested) => nested.clone(),
        None => raw,
    };

    serde_yaml::from_value(config_val)
        .map_err(|e| invalid(config_file, format!("invalid config: {e}")))
}

/// Overlay `CODECTX_*` environment variables; `__` separates nested keys.
fn apply_env_overrides(config: Config) -> Result<Config> {
    Figment::from(Serialized::defaults(config))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| ContextError::ConfigValidation(vec![format!("environment override: {e}")]))
}

fn invalid(config_file: &Path, message: String) -> ContextError {
    ContextError::ConfigValidation(vec![format!("{}: {message}", config_file.display())])
}

fn discover_config(project_root: &Path) -> Option<PathBuf> {
    let candidates =
        ["codectx.toml", ".codectx.toml", "codectx.yml", ".codectx.yml", "codectx.yaml", ".codectx.yaml"];

    candidates.iter().map(|candidate| project_root.join(candidate)).find(|path| path.exists())
}
