//! Workflow request and result types.
//!
//! A workflow composes several dependent registry creates into one logical
//! invocation. Requests are immutable once submitted; the orchestrator
//! clones sub-requests before injecting foreign keys from earlier steps.

use serde::{Deserialize, Serialize};

use crate::registry::{
    InferenceService, InferenceServiceCreate, ModelVersion, ModelVersionCreate, RegisteredModel,
    RegisteredModelCreate, ServeModel, ServeModelCreate, ServingEnvironment,
    ServingEnvironmentCreate,
};

/// The workflow types the orchestrator knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkflowKind {
    CreateModelWithVersion,
    DeployModelVersion,
}

impl WorkflowKind {
    /// Stable operation name recorded on execution entries and dead letters.
    pub fn operation(&self) -> &'static str {
        match self {
            WorkflowKind::CreateModelWithVersion => "create-model-with-version",
            WorkflowKind::DeployModelVersion => "deploy-model-version",
        }
    }

    /// Prefix of derived idempotency keys for this workflow.
    pub fn key_prefix(&self) -> &'static str {
        match self {
            WorkflowKind::CreateModelWithVersion => "createmodelwithversion",
            WorkflowKind::DeployModelVersion => "deploymodelversion",
        }
    }

    /// Short name used in URLs and CloudEvent types.
    pub fn route_name(&self) -> &'static str {
        match self {
            WorkflowKind::CreateModelWithVersion => "model-with-version",
            WorkflowKind::DeployModelVersion => "deploy-model-version",
        }
    }

    pub fn from_route_name(name: &str) -> Option<Self> {
        match name {
            "model-with-version" | "create-model-with-version" => {
                Some(WorkflowKind::CreateModelWithVersion)
            }
            "deploy-model-version" => Some(WorkflowKind::DeployModelVersion),
            _ => None,
        }
    }
}

impl std::fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.operation())
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Create a registered model and its first version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelWithVersionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<RegisteredModelCreate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<ModelVersionCreate>,
}

/// Create a serving environment, an inference service inside it, and a
/// serve action for a model version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployModelVersionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serving_environment: Option<ServingEnvironmentCreate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inference_service: Option<InferenceServiceCreate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serve: Option<ServeModelCreate>,
}

/// Any workflow request. Serializes as the bare inner request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WorkflowRequest {
    CreateModelWithVersion(ModelWithVersionRequest),
    DeployModelVersion(DeployModelVersionRequest),
}

impl WorkflowRequest {
    pub fn kind(&self) -> WorkflowKind {
        match self {
            WorkflowRequest::CreateModelWithVersion(_) => WorkflowKind::CreateModelWithVersion,
            WorkflowRequest::DeployModelVersion(_) => WorkflowKind::DeployModelVersion,
        }
    }

    /// The caller-supplied key, if any (may be blank).
    pub fn idempotency_key(&self) -> Option<&str> {
        match self {
            WorkflowRequest::CreateModelWithVersion(r) => r.idempotency_key.as_deref(),
            WorkflowRequest::DeployModelVersion(r) => r.idempotency_key.as_deref(),
        }
    }

    /// Whether the caller supplied a non-blank idempotency key.
    pub fn has_explicit_key(&self) -> bool {
        self.idempotency_key()
            .is_some_and(|k| !k.trim().is_empty())
    }

    /// Parse a request body for the given workflow kind.
    pub fn from_json(kind: WorkflowKind, body: &[u8]) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            WorkflowKind::CreateModelWithVersion => {
                WorkflowRequest::CreateModelWithVersion(serde_json::from_slice(body)?)
            }
            WorkflowKind::DeployModelVersion => {
                WorkflowRequest::DeployModelVersion(serde_json::from_slice(body)?)
            }
        })
    }
}

impl From<ModelWithVersionRequest> for WorkflowRequest {
    fn from(value: ModelWithVersionRequest) -> Self {
        WorkflowRequest::CreateModelWithVersion(value)
    }
}

impl From<DeployModelVersionRequest> for WorkflowRequest {
    fn from(value: DeployModelVersionRequest) -> Self {
        WorkflowRequest::DeployModelVersion(value)
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelWithVersion {
    pub model: RegisteredModel,
    pub version: ModelVersion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployedModelVersion {
    pub serving_environment: ServingEnvironment,
    pub inference_service: InferenceService,
    pub serve: ServeModel,
}

/// Any workflow result. Serializes as the bare inner result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WorkflowResult {
    ModelWithVersion(ModelWithVersion),
    DeployedModelVersion(DeployedModelVersion),
}

impl WorkflowResult {
    pub fn kind(&self) -> WorkflowKind {
        match self {
            WorkflowResult::ModelWithVersion(_) => WorkflowKind::CreateModelWithVersion,
            WorkflowResult::DeployedModelVersion(_) => WorkflowKind::DeployModelVersion,
        }
    }

    /// Decode a cached result payload written for the given workflow kind.
    pub fn from_json(kind: WorkflowKind, payload: &str) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            WorkflowKind::CreateModelWithVersion => {
                WorkflowResult::ModelWithVersion(serde_json::from_str(payload)?)
            }
            WorkflowKind::DeployModelVersion => {
                WorkflowResult::DeployedModelVersion(serde_json::from_str(payload)?)
            }
        })
    }
}
