//! Request validation, run before any store mutation or registry call.
//!
//! All violations are collected and reported together.

use regorch_types::error::WorkflowError;
use regorch_types::registry::{
    InferenceServiceCreate, ModelVersionCreate, RegisteredModelCreate, ServeModelCreate,
    ServingEnvironmentCreate,
};
use regorch_types::workflow::{DeployModelVersionRequest, ModelWithVersionRequest, WorkflowRequest};

/// A request whose required parts are known to be present.
#[derive(Debug, Clone, Copy)]
pub enum ValidatedRequest<'a> {
    ModelWithVersion {
        model: &'a RegisteredModelCreate,
        version: &'a ModelVersionCreate,
    },
    DeployModelVersion {
        serving_environment: &'a ServingEnvironmentCreate,
        inference_service: &'a InferenceServiceCreate,
        serve: &'a ServeModelCreate,
    },
}

pub fn validate(request: &WorkflowRequest) -> Result<ValidatedRequest<'_>, WorkflowError> {
    match request {
        WorkflowRequest::CreateModelWithVersion(r) => validate_model_with_version(r),
        WorkflowRequest::DeployModelVersion(r) => validate_deploy(r),
    }
}

fn validate_model_with_version(
    request: &ModelWithVersionRequest,
) -> Result<ValidatedRequest<'_>, WorkflowError> {
    let mut violations = Violations::default();
    let model = violations.present("model", request.model.as_ref());
    let version = violations.present("version", request.version.as_ref());
    if let Some(m) = model {
        violations.non_blank("model.name", m.name.as_deref());
    }
    if let Some(v) = version {
        violations.non_blank("version.name", v.name.as_deref());
    }

    violations.finish()?;
    match (model, version) {
        (Some(model), Some(version)) => Ok(ValidatedRequest::ModelWithVersion { model, version }),
        _ => Err(WorkflowError::Internal("validation passed with missing parts".to_string())),
    }
}

fn validate_deploy(request: &DeployModelVersionRequest) -> Result<ValidatedRequest<'_>, WorkflowError> {
    let mut violations = Violations::default();
    let env = violations.present("servingEnvironment", request.serving_environment.as_ref());
    let service = violations.present("inferenceService", request.inference_service.as_ref());
    let serve = violations.present("serve", request.serve.as_ref());
    if let Some(e) = env {
        violations.non_blank("servingEnvironment.name", e.name.as_deref());
    }
    if let Some(s) = service {
        violations.non_blank(
            "inferenceService.registeredModelId",
            s.registered_model_id.as_deref(),
        );
    }
    if let Some(s) = serve {
        violations.non_blank("serve.modelVersionId", s.model_version_id.as_deref());
    }

    violations.finish()?;
    match (env, service, serve) {
        (Some(serving_environment), Some(inference_service), Some(serve)) => {
            Ok(ValidatedRequest::DeployModelVersion {
                serving_environment,
                inference_service,
                serve,
            })
        }
        _ => Err(WorkflowError::Internal("validation passed with missing parts".to_string())),
    }
}

#[derive(Default)]
struct Violations(Vec<String>);

impl Violations {
    fn present<'a, T>(&mut self, field: &str, value: Option<&'a T>) -> Option<&'a T> {
        if value.is_none() {
            self.0.push(format!("'{field}' must be provided"));
        }
        value
    }

    fn non_blank(&mut self, field: &str, value: Option<&str>) {
        if value.is_none_or(|v| v.trim().is_empty()) {
            self.0.push(format!("'{field}' must be provided"));
        }
    }

    fn finish(self) -> Result<(), WorkflowError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(WorkflowError::Validation(self.0.join("; ")))
        }
    }
}
