//! Orchestrator configuration types.
//!
//! `OrchestratorConfig` represents `config.toml`. Every section and field
//! has a default, so an empty file (or no file) yields a working local
//! setup. Durations are integer seconds or milliseconds as the field name
//! says.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub idempotency: IdempotencyConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub dlq: DlqConfig,
    #[serde(default)]
    pub events: EventsConfig,
}

// ---------------------------------------------------------------------------
// [registry]
// ---------------------------------------------------------------------------

/// Connection settings for the external model registry.
///
/// `token` takes precedence over `username`/`password`. Credentials are
/// never serialized back out.
#[derive(Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_registry_url")]
    pub base_url: String,
    #[serde(default = "default_registry_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
}

fn default_registry_url() -> String {
    "http://localhost:8080/api/model_registry/v1alpha3".to_string()
}

fn default_registry_timeout_secs() -> u64 {
    30
}

impl RegistryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: default_registry_url(),
            timeout_secs: default_registry_timeout_secs(),
            token: None,
            username: None,
            password: None,
        }
    }
}

impl std::fmt::Debug for RegistryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryConfig")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// [idempotency]
// ---------------------------------------------------------------------------

/// Which execution store backs idempotent runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyConfig {
    /// When false, idempotent entry points run the workflow directly.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Retention of every entry, measured from its last update.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// Capacity bound; the oldest entries are evicted beyond it.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default)]
    pub backend: StoreBackend,
    /// SQLite URL; defaults to `executions.db` in the data directory.
    #[serde(default)]
    pub database_url: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_ttl_secs() -> u64 {
    86_400
}

fn default_max_entries() -> usize {
    50_000
}

fn default_sweep_interval_secs() -> u64 {
    60
}

impl IdempotencyConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_ttl_secs(),
            max_entries: default_max_entries(),
            sweep_interval_secs: default_sweep_interval_secs(),
            backend: StoreBackend::default(),
            database_url: None,
        }
    }
}

// ---------------------------------------------------------------------------
// [retry]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    200
}

fn default_max_backoff_ms() -> u64 {
    3_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

// ---------------------------------------------------------------------------
// [dlq]
// ---------------------------------------------------------------------------

/// Dead-letter delivery. With no `broker_url` failed invocations are only
/// logged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub broker_url: Option<String>,
    #[serde(default = "default_dlq_source")]
    pub event_source: String,
    #[serde(default = "default_dlq_type")]
    pub event_type: String,
}

fn default_dlq_source() -> String {
    "io.cx.model_registry.orchestrator".to_string()
}

fn default_dlq_type() -> String {
    "io.cx.model_registry.workflow.failed".to_string()
}

impl Default for DlqConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            broker_url: None,
            event_source: default_dlq_source(),
            event_type: default_dlq_type(),
        }
    }
}

// ---------------------------------------------------------------------------
// [events]
// ---------------------------------------------------------------------------

/// CloudEvents trigger settings.
///
/// Incoming `ce-type` must be `<type_prefix>.<workflow>.requested`; replies
/// carry `<type_prefix>.<workflow>.completed` and `source`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    #[serde(default = "default_type_prefix")]
    pub type_prefix: String,
    #[serde(default = "default_dlq_source")]
    pub source: String,
}

fn default_type_prefix() -> String {
    "io.cx.model_registry".to_string()
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            type_prefix: default_type_prefix(),
            source: default_dlq_source(),
        }
    }
}
