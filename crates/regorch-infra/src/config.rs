//! Configuration loader.
//!
//! Reads `config.toml` from the data directory (`~/.regorch/` in
//! production) and deserializes it into [`OrchestratorConfig`]. Falls back
//! to defaults when the file is missing or malformed. A path given
//! explicitly (`--config`) must exist and parse.
//!
//! Environment overrides are applied last:
//! `REGORCH_REGISTRY_URL`, `REGORCH_REGISTRY_TOKEN`, `REGORCH_DLQ_URL`.

use std::path::{Path, PathBuf};

use regorch_types::config::OrchestratorConfig;
use thiserror::Error;

pub const ENV_DATA_DIR: &str = "REGORCH_DATA_DIR";
pub const ENV_REGISTRY_URL: &str = "REGORCH_REGISTRY_URL";
pub const ENV_REGISTRY_TOKEN: &str = "REGORCH_REGISTRY_TOKEN";
pub const ENV_DLQ_URL: &str = "REGORCH_DLQ_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `REGORCH_DATA_DIR` environment variable
/// 2. `~/.regorch`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".regorch");
    }

    PathBuf::from(".regorch")
}

/// Load configuration from `{data_dir}/config.toml`, never failing.
///
/// - Missing file: defaults.
/// - Unreadable or unparsable file: a warning and defaults.
pub async fn load_config(data_dir: &Path) -> OrchestratorConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return OrchestratorConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return OrchestratorConfig::default();
        }
    };

    match toml::from_str::<OrchestratorConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", config_path.display());
            OrchestratorConfig::default()
        }
    }
}

/// Load configuration from an explicit file path.
pub async fn load_config_file(path: &Path) -> Result<OrchestratorConfig, ConfigError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load the effective configuration: explicit file or data-dir default,
/// then environment overrides, then validation.
pub async fn load_effective_config(
    explicit: Option<&Path>,
    data_dir: &Path,
) -> Result<OrchestratorConfig, ConfigError> {
    let config = match explicit {
        Some(path) => load_config_file(path).await?,
        None => load_config(data_dir).await,
    };
    let config = apply_overrides(config, |name| std::env::var(name).ok());
    validate(&config)?;
    Ok(config)
}

/// Apply environment overrides through `lookup` (normally `std::env::var`).
pub fn apply_overrides(
    mut config: OrchestratorConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> OrchestratorConfig {
    let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(url) = non_empty(ENV_REGISTRY_URL) {
        config.registry.base_url = url;
    }
    if let Some(token) = non_empty(ENV_REGISTRY_TOKEN) {
        config.registry.token = Some(token);
    }
    if let Some(url) = non_empty(ENV_DLQ_URL) {
        config.dlq.broker_url = Some(url);
    }
    config
}

/// Reject settings that would make the orchestrator misbehave silently.
pub fn validate(config: &OrchestratorConfig) -> Result<(), ConfigError> {
    if config.registry.base_url.trim().is_empty() {
        return Err(ConfigError::Invalid {
            field: "registry.base_url",
            message: "must not be empty".to_string(),
        });
    }
    if config.registry.timeout_secs == 0 {
        return Err(ConfigError::Invalid {
            field: "registry.timeout_secs",
            message: "must be at least 1".to_string(),
        });
    }
    if config.idempotency.enabled && config.idempotency.ttl_secs == 0 {
        return Err(ConfigError::Invalid {
            field: "idempotency.ttl_secs",
            message: "must be at least 1 when idempotency is enabled".to_string(),
        });
    }
    if config.retry.initial_backoff_ms > config.retry.max_backoff_ms {
        return Err(ConfigError::Invalid {
            field: "retry.initial_backoff_ms",
            message: format!(
                "{} exceeds retry.max_backoff_ms ({})",
                config.retry.initial_backoff_ms, config.retry.max_backoff_ms
            ),
        });
    }
    Ok(())
}
