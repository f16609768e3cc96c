//! Application state wiring the orchestrator to its infra implementations.
//!
//! AppState pins the generic `WorkflowOrchestrator` to the HTTP registry
//! client, the configured execution store and the configured dead-letter
//! sink. Used by both CLI commands and REST API handlers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use regorch_core::dead_letter::DeadLetterPublisher;
use regorch_core::orchestrator::{OrchestratorOptions, WorkflowOrchestrator, WorkflowOutcome};
use regorch_infra::config::{load_effective_config, resolve_data_dir};
use regorch_infra::dead_letter::ConfiguredSink;
use regorch_infra::registry::HttpRegistryClient;
use regorch_infra::store::{ConfiguredStore, open_store};
use regorch_infra::sweeper::spawn_sweeper;
use regorch_types::config::OrchestratorConfig;
use regorch_types::error::WorkflowError;
use regorch_types::workflow::WorkflowRequest;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// The orchestrator generics pinned to infra implementations.
pub type ConcreteOrchestrator =
    WorkflowOrchestrator<HttpRegistryClient, Arc<ConfiguredStore>, ConfiguredSink>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ConcreteOrchestrator>,
    pub store: Arc<ConfiguredStore>,
    pub config: Arc<OrchestratorConfig>,
    pub data_dir: PathBuf,
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Load configuration and wire everything.
    pub async fn init(config_path: Option<&Path>) -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        let config = load_effective_config(config_path, &data_dir).await?;
        Self::build(config, data_dir).await
    }

    pub async fn build(config: OrchestratorConfig, data_dir: PathBuf) -> anyhow::Result<Self> {
        let registry = HttpRegistryClient::from_config(&config.registry)?;
        let store = Arc::new(open_store(&config.idempotency, &data_dir).await?);
        let sink = ConfiguredSink::from_config(&config.dlq)?;

        tracing::debug!(
            registry = %registry.base_url(),
            store = ?store.backend(),
            dead_letters = %sink.describe(),
            "orchestrator wired"
        );

        let orchestrator = WorkflowOrchestrator::new(
            registry,
            Arc::clone(&store),
            DeadLetterPublisher::new(sink, config.dlq.enabled),
            OrchestratorOptions::from(&config),
        );

        Ok(Self {
            orchestrator: Arc::new(orchestrator),
            store,
            config: Arc::new(config),
            data_dir,
            shutdown: CancellationToken::new(),
        })
    }

    /// Run one workflow for any entry point.
    ///
    /// `idempotent = false` bypasses the execution store unless the request
    /// names its own key. Idempotent runs are detached from the caller so a
    /// dropped connection cannot strand the key in `IN_PROGRESS`.
    pub async fn run_workflow(
        &self,
        request: WorkflowRequest,
        idempotent: bool,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        if !idempotent && !request.has_explicit_key() {
            let result = self.orchestrator.execute(&request).await?;
            return Ok(WorkflowOutcome {
                key: None,
                replayed: false,
                result,
            });
        }
        Arc::clone(&self.orchestrator)
            .execute_idempotent_detached(request)
            .await
    }

    /// Start the eviction sweeper; it stops when `shutdown` is cancelled.
    pub fn start_sweeper(&self) -> JoinHandle<()> {
        spawn_sweeper(
            Arc::clone(&self.store),
            self.config.idempotency.sweep_interval(),
            self.shutdown.clone(),
        )
    }
}
