//! Idempotent workflow orchestrator.
//!
//! `WorkflowOrchestrator` composes the registry chains with the execution
//! store, the retry policy and the dead-letter publisher. Generic over its
//! three ports so it runs against the HTTP registry and SQLite store in
//! production and against in-process fakes in tests.
//!
//! For an idempotent invocation:
//!
//! 1. validate the request (no store mutation, no retry),
//! 2. resolve the idempotency key,
//! 3. `try_begin` the key; a non-owner resolves from the existing entry,
//! 4. the owner runs the chain, then records `Succeeded` or `Failed` and,
//!    on failure, publishes a dead-letter event.
//!
//! Store writes after the chain are best-effort: their errors are logged
//! and never replace the chain's own outcome.

pub mod chain;
pub mod validation;

use std::sync::Arc;

use chrono::Utc;
use regorch_types::config::OrchestratorConfig;
use regorch_types::dead_letter::DeadLetterEvent;
use regorch_types::error::WorkflowError;
use regorch_types::execution::{BeginOutcome, ExecutionEntry, ExecutionState};
use regorch_types::workflow::{
    DeployModelVersionRequest, DeployedModelVersion, ModelWithVersion, ModelWithVersionRequest,
    WorkflowKind, WorkflowRequest, WorkflowResult,
};

use crate::dead_letter::{DeadLetterPublisher, DeadLetterSink};
use crate::idempotency::ExecutionStore;
use crate::idempotency::key;
use crate::registry::ModelRegistry;
use crate::retry::RetryPolicy;

pub use validation::{ValidatedRequest, validate};

// ---------------------------------------------------------------------------
// Options and outcome
// ---------------------------------------------------------------------------

/// Behavioural knobs for the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorOptions {
    pub retry: RetryPolicy,
    /// When false, `execute_idempotent` behaves exactly like `execute`.
    pub idempotency_enabled: bool,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self::from(&OrchestratorConfig::default())
    }
}

impl From<&OrchestratorConfig> for OrchestratorOptions {
    fn from(config: &OrchestratorConfig) -> Self {
        Self {
            retry: RetryPolicy::from(&config.retry),
            idempotency_enabled: config.idempotency.enabled,
        }
    }
}

/// Result of an idempotent invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowOutcome {
    /// The idempotency key, or `None` when the run bypassed the store.
    pub key: Option<String>,
    /// True when the result was replayed from a previous execution.
    pub replayed: bool,
    pub result: WorkflowResult,
}

// ---------------------------------------------------------------------------
// WorkflowOrchestrator
// ---------------------------------------------------------------------------

pub struct WorkflowOrchestrator<R: ModelRegistry, S: ExecutionStore, D: DeadLetterSink> {
    registry: R,
    store: S,
    dead_letters: DeadLetterPublisher<D>,
    options: OrchestratorOptions,
}

impl<R, S, D> WorkflowOrchestrator<R, S, D>
where
    R: ModelRegistry,
    S: ExecutionStore,
    D: DeadLetterSink,
{
    pub fn new(
        registry: R,
        store: S,
        dead_letters: DeadLetterPublisher<D>,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            registry,
            store,
            dead_letters,
            options,
        }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn dead_letters(&self) -> &DeadLetterPublisher<D> {
        &self.dead_letters
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    /// Validate and run the chain directly, without the execution store.
    pub async fn execute(&self, request: &WorkflowRequest) -> Result<WorkflowResult, WorkflowError> {
        let validated = validate(request)?;
        self.run_chain(validated).await
    }

    /// Run a workflow at most once per idempotency key.
    pub async fn execute_idempotent(
        &self,
        request: &WorkflowRequest,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        if !self.options.idempotency_enabled {
            let result = self.execute(request).await?;
            return Ok(WorkflowOutcome {
                key: None,
                replayed: false,
                result,
            });
        }

        let validated = validate(request)?;
        let kind = request.kind();
        let key = key::resolve(request);
        let operation = kind.operation();

        match self.store.try_begin(&key, operation).await? {
            BeginOutcome::Existing(entry) => {
                tracing::info!(key = %key, operation, state = %entry.state, "idempotency key already present");
                let result = resolve_existing(kind, entry)?;
                return Ok(WorkflowOutcome {
                    key: Some(key),
                    replayed: true,
                    result,
                });
            }
            BeginOutcome::Owner(_) => {
                tracing::info!(key = %key, operation, "workflow started");
            }
        }

        match self.run_chain(validated).await {
            Ok(result) => {
                let payload = serialize_result(&result);
                if let Err(e) = self.store.complete(&key, payload).await {
                    tracing::warn!(key = %key, error = %e, "failed to record workflow success");
                }
                tracing::info!(key = %key, operation, "workflow succeeded");
                Ok(WorkflowOutcome {
                    key: Some(key),
                    replayed: false,
                    result,
                })
            }
            Err(error) => {
                tracing::error!(key = %key, operation, error = %error, "workflow failed");
                if let Err(e) = self.store.fail(&key, error.to_string()).await {
                    tracing::warn!(key = %key, error = %e, "failed to record workflow failure");
                }
                self.dead_letters
                    .publish(DeadLetterEvent {
                        key: key.clone(),
                        operation: operation.to_string(),
                        error_type: error.kind().to_string(),
                        error_message: error.to_string(),
                        request_json: serde_json::to_string(request).ok(),
                        timestamp: Utc::now(),
                    })
                    .await;
                Err(error)
            }
        }
    }

    /// `execute_idempotent` on a spawned task.
    ///
    /// Dropping the returned future (a disconnected HTTP client, a caller
    /// timeout) does not stop the run, so the key still reaches `Succeeded`
    /// or `Failed` and failures are still dead-lettered.
    pub async fn execute_idempotent_detached(
        self: Arc<Self>,
        request: WorkflowRequest,
    ) -> Result<WorkflowOutcome, WorkflowError>
    where
        R: 'static,
        S: 'static,
        D: 'static,
    {
        let task = tokio::spawn(async move { self.execute_idempotent(&request).await });
        task.await
            .map_err(|e| WorkflowError::Internal(format!("workflow task aborted: {e}")))?
    }

    /// Idempotent create-model-with-version.
    pub async fn create_model_with_version(
        &self,
        request: ModelWithVersionRequest,
    ) -> Result<ModelWithVersion, WorkflowError> {
        match self.execute_idempotent(&request.into()).await?.result {
            WorkflowResult::ModelWithVersion(result) => Ok(result),
            other => Err(unexpected_result(WorkflowKind::CreateModelWithVersion, &other)),
        }
    }

    /// Idempotent deploy-model-version.
    pub async fn deploy_model_version(
        &self,
        request: DeployModelVersionRequest,
    ) -> Result<DeployedModelVersion, WorkflowError> {
        match self.execute_idempotent(&request.into()).await?.result {
            WorkflowResult::DeployedModelVersion(result) => Ok(result),
            other => Err(unexpected_result(WorkflowKind::DeployModelVersion, &other)),
        }
    }

    async fn run_chain(&self, validated: ValidatedRequest<'_>) -> Result<WorkflowResult, WorkflowError> {
        let retry = &self.options.retry;
        match validated {
            ValidatedRequest::ModelWithVersion { model, version } => {
                chain::create_model_with_version(&self.registry, retry, model, version)
                    .await
                    .map(WorkflowResult::ModelWithVersion)
            }
            ValidatedRequest::DeployModelVersion {
                serving_environment,
                inference_service,
                serve,
            } => chain::deploy_model_version(
                &self.registry,
                retry,
                serving_environment,
                inference_service,
                serve,
            )
            .await
            .map(WorkflowResult::DeployedModelVersion),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map an entry owned by another (or an earlier) invocation to the caller's
/// answer.
fn resolve_existing(kind: WorkflowKind, entry: ExecutionEntry) -> Result<WorkflowResult, WorkflowError> {
    let key = entry.key;
    if entry.operation != kind.operation() {
        return Err(WorkflowError::Validation(format!(
            "idempotency key '{key}' is already used by workflow '{}'",
            entry.operation
        )));
    }

    match entry.state {
        ExecutionState::InProgress => Err(WorkflowError::Conflict { key }),
        ExecutionState::Failed => Err(WorkflowError::AlreadyFailed {
            key,
            message: entry.error_message.unwrap_or_default(),
        }),
        ExecutionState::Succeeded => match entry.result_payload {
            Some(payload) => WorkflowResult::from_json(kind, &payload).map_err(|e| {
                WorkflowError::Internal(format!(
                    "cached result for idempotency key '{key}' is unreadable: {e}"
                ))
            }),
            None => Err(WorkflowError::Internal(format!(
                "Workflow with idempotency key '{key}' is marked SUCCEEDED but has no response"
            ))),
        },
    }
}

fn serialize_result(result: &WorkflowResult) -> String {
    serde_json::to_string(result).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to serialize workflow result");
        serde_json::json!({ "serializationError": e.to_string() }).to_string()
    })
}

fn unexpected_result(expected: WorkflowKind, actual: &WorkflowResult) -> WorkflowError {
    WorkflowError::Internal(format!(
        "expected a {expected} result, got {}",
        actual.kind()
    ))
}
