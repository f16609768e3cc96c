use thiserror::Error;

use crate::execution::ExecutionState;

/// Errors from calls to the external model registry.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    #[error("registry connection failed: {0}")]
    Connect(String),

    #[error("registry request timed out: {0}")]
    Timeout(String),

    #[error("registry returned {status} for {method} {url}: {body}")]
    Status {
        status: u16,
        method: String,
        url: String,
        body: String,
    },

    #[error("failed to decode registry response (status {status}): {message}")]
    Decode { status: u16, message: String },
}

impl RegistryError {
    /// Numeric HTTP status; 0 for transport-level failures.
    pub fn status(&self) -> u16 {
        match self {
            RegistryError::Connect(_) | RegistryError::Timeout(_) => 0,
            RegistryError::Status { status, .. } | RegistryError::Decode { status, .. } => *status,
        }
    }

    /// Transport failures, status 0, 429 and 5xx are worth retrying.
    /// Any other 4xx and undecodable bodies are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            RegistryError::Connect(_) | RegistryError::Timeout(_) => true,
            RegistryError::Status { status, .. } => {
                *status == 0 || *status == 429 || *status >= 500
            }
            RegistryError::Decode { .. } => false,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RegistryError::Connect(_) => "REGISTRY_CONNECT",
            RegistryError::Timeout(_) => "REGISTRY_TIMEOUT",
            RegistryError::Status { .. } => "REGISTRY_STATUS",
            RegistryError::Decode { .. } => "REGISTRY_DECODE",
        }
    }
}

/// Errors from execution store operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("no execution entry for key '{0}'")]
    NotFound(String),

    #[error("execution '{key}' cannot transition from {from}")]
    InvalidTransition { key: String, from: ExecutionState },

    #[error("execution store backend error: {0}")]
    Backend(String),
}

/// Errors surfaced to workflow callers.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("Workflow with idempotency key '{key}' is already in progress")]
    Conflict { key: String },

    #[error("Workflow with idempotency key '{key}' has already failed: {message}")]
    AlreadyFailed { key: String, message: String },

    #[error("step '{step}' failed after {attempts} attempt(s): {source}")]
    TransientDownstream {
        step: String,
        attempts: u32,
        #[source]
        source: RegistryError,
    },

    #[error("step '{step}' rejected by registry: {source}")]
    PermanentDownstream {
        step: String,
        #[source]
        source: RegistryError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl WorkflowError {
    /// Stable classification, used as the dead-letter `errorType` and the
    /// HTTP error code.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::Validation(_) => "VALIDATION_ERROR",
            WorkflowError::Conflict { .. } => "WORKFLOW_IN_PROGRESS",
            WorkflowError::AlreadyFailed { .. } => "WORKFLOW_ALREADY_FAILED",
            WorkflowError::TransientDownstream { .. } => "DOWNSTREAM_UNAVAILABLE",
            WorkflowError::PermanentDownstream { .. } => "DOWNSTREAM_REJECTED",
            WorkflowError::Store(_) => "STORE_ERROR",
            WorkflowError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// The downstream registry error behind this failure, if any.
    pub fn registry_error(&self) -> Option<&RegistryError> {
        match self {
            WorkflowError::TransientDownstream { source, .. }
            | WorkflowError::PermanentDownstream { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Errors from the dead-letter sink.
#[derive(Debug, Error)]
pub enum DeadLetterError {
    #[error("dead-letter broker unreachable: {0}")]
    Transport(String),

    #[error("dead-letter broker returned {status}: {body}")]
    Rejected { status: u16, body: String },
}
