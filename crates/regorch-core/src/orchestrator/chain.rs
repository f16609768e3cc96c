//! The workflow chains: dependent registry creates run strictly in order,
//! each wrapped in the retry policy, with ids from earlier steps injected
//! into cloned later sub-requests.

use regorch_types::error::WorkflowError;
use regorch_types::registry::{
    InferenceServiceCreate, ModelVersionCreate, RegisteredModelCreate, ServeModelCreate,
    ServingEnvironmentCreate,
};
use regorch_types::workflow::{DeployedModelVersion, ModelWithVersion};

use crate::registry::{
    InferenceServices, ModelRegistry, ModelVersions, RegisteredModels, ResourceApi, ServeModels,
    ServingEnvironments,
};
use crate::retry::{RetryHandler, RetryPolicy};

pub const STEP_CREATE_MODEL: &str = "create-registered-model";
pub const STEP_CREATE_VERSION: &str = "create-model-version";
pub const STEP_CREATE_ENVIRONMENT: &str = "create-serving-environment";
pub const STEP_CREATE_INFERENCE_SERVICE: &str = "create-inference-service";
pub const STEP_CREATE_SERVE: &str = "create-serve";

/// model -> version (registeredModelId).
pub async fn create_model_with_version<R: ModelRegistry>(
    registry: &R,
    retry: &RetryPolicy,
    model: &RegisteredModelCreate,
    version: &ModelVersionCreate,
) -> Result<ModelWithVersion, WorkflowError> {
    let model = RetryHandler::with_retry(retry, STEP_CREATE_MODEL, || {
        ResourceApi::<RegisteredModels>::create(registry, &(), model)
    })
    .await?;
    let model_id = require_id(STEP_CREATE_MODEL, &model.id)?;
    tracing::debug!(step = STEP_CREATE_MODEL, id = %model_id, "created registered model");

    let mut version = version.clone();
    version.registered_model_id = Some(model_id);
    let version = RetryHandler::with_retry(retry, STEP_CREATE_VERSION, || {
        ResourceApi::<ModelVersions>::create(registry, &(), &version)
    })
    .await?;
    let version_id = require_id(STEP_CREATE_VERSION, &version.id)?;
    tracing::debug!(step = STEP_CREATE_VERSION, id = %version_id, "created model version");

    Ok(ModelWithVersion { model, version })
}

/// serving environment -> inference service (servingEnvironmentId) ->
/// serve under that inference service.
pub async fn deploy_model_version<R: ModelRegistry>(
    registry: &R,
    retry: &RetryPolicy,
    serving_environment: &ServingEnvironmentCreate,
    inference_service: &InferenceServiceCreate,
    serve: &ServeModelCreate,
) -> Result<DeployedModelVersion, WorkflowError> {
    let serving_environment = RetryHandler::with_retry(retry, STEP_CREATE_ENVIRONMENT, || {
        ResourceApi::<ServingEnvironments>::create(registry, &(), serving_environment)
    })
    .await?;
    let environment_id = require_id(STEP_CREATE_ENVIRONMENT, &serving_environment.id)?;
    tracing::debug!(step = STEP_CREATE_ENVIRONMENT, id = %environment_id, "created serving environment");

    let mut inference_service = inference_service.clone();
    inference_service.serving_environment_id = Some(environment_id);
    let inference_service = RetryHandler::with_retry(retry, STEP_CREATE_INFERENCE_SERVICE, || {
        ResourceApi::<InferenceServices>::create(registry, &(), &inference_service)
    })
    .await?;
    let service_id = require_id(STEP_CREATE_INFERENCE_SERVICE, &inference_service.id)?;
    tracing::debug!(step = STEP_CREATE_INFERENCE_SERVICE, id = %service_id, "created inference service");

    let serve = RetryHandler::with_retry(retry, STEP_CREATE_SERVE, || {
        ResourceApi::<ServeModels>::create(registry, &service_id, serve)
    })
    .await?;
    require_id(STEP_CREATE_SERVE, &serve.id)?;

    Ok(DeployedModelVersion {
        serving_environment,
        inference_service,
        serve,
    })
}

/// A created resource must come back with an id; later steps depend on it.
fn require_id(step: &str, id: &str) -> Result<String, WorkflowError> {
    if id.trim().is_empty() {
        return Err(WorkflowError::Internal(format!(
            "step '{step}' returned a resource without an id"
        )));
    }
    Ok(id.to_string())
}
