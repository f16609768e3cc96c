//! Idempotency key derivation.
//!
//! A caller-supplied non-blank key is used verbatim. Otherwise the key is
//! derived from the identifying fields of each sub-entity, in a fixed
//! order per workflow:
//!
//! ```text
//! <prefix>:<id_1>:<id_2>[:<id_3>]
//! ```
//!
//! where each `id_i` is the first non-blank of (externalId, name, fallback),
//! or `"na"`, with every character outside `[A-Za-z0-9]` replaced by `_`.

use regorch_types::workflow::WorkflowRequest;

const MISSING: &str = "na";

/// Resolve the idempotency key for a request. Pure and deterministic.
pub fn resolve(request: &WorkflowRequest) -> String {
    if let Some(explicit) = request.idempotency_key().filter(|k| !is_blank(k)) {
        return explicit.to_string();
    }

    let parts: Vec<String> = match request {
        WorkflowRequest::CreateModelWithVersion(r) => vec![
            identity(r.model.as_ref().map(|m| [m.external_id.as_deref(), m.name.as_deref(), None])),
            identity(r.version.as_ref().map(|v| [v.external_id.as_deref(), v.name.as_deref(), None])),
        ],
        WorkflowRequest::DeployModelVersion(r) => vec![
            identity(
                r.serving_environment
                    .as_ref()
                    .map(|e| [e.external_id.as_deref(), e.name.as_deref(), None]),
            ),
            identity(
                r.inference_service
                    .as_ref()
                    .map(|s| [s.external_id.as_deref(), s.name.as_deref(), None]),
            ),
            identity(
                r.serve
                    .as_ref()
                    .map(|s| [
                        s.external_id.as_deref(),
                        s.name.as_deref(),
                        s.model_version_id.as_deref(),
                    ]),
            ),
        ],
    };

    format!("{}:{}", request.kind().key_prefix(), parts.join(":"))
}

fn identity(candidates: Option<[Option<&str>; 3]>) -> String {
    candidates
        .into_iter()
        .flatten()
        .flatten()
        .find(|c| !is_blank(c))
        .map(normalize)
        .unwrap_or_else(|| MISSING.to_string())
}

fn normalize(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use regorch_types::registry::{
        InferenceServiceCreate, ModelVersionCreate, RegisteredModelCreate, ServeModelCreate,
        ServingEnvironmentCreate,
    };
    use regorch_types::workflow::{DeployModelVersionRequest, ModelWithVersionRequest};

    fn model_request(model_name: &str, version_name: &str) -> WorkflowRequest {
        ModelWithVersionRequest {
            idempotency_key: None,
            model: Some(RegisteredModelCreate {
                name: Some(model_name.to_string()),
                ..Default::default()
            }),
            version: Some(ModelVersionCreate {
                name: Some(version_name.to_string()),
                ..Default::default()
            }),
        }
        .into()
    }

    #[test]
    fn test_explicit_key_wins() {
        let mut req = model_request("m", "v");
        if let WorkflowRequest::CreateModelWithVersion(r) = &mut req {
            r.idempotency_key = Some("client-key-1".to_string());
        }
        assert_eq!(resolve(&req), "client-key-1");
    }

    #[test]
    fn test_blank_explicit_key_is_ignored() {
        let mut req = model_request("m", "v");
        if let WorkflowRequest::CreateModelWithVersion(r) = &mut req {
            r.idempotency_key = Some("  ".to_string());
        }
        assert_eq!(resolve(&req), "createmodelwithversion:m:v");
    }

    #[test]
    fn test_derived_key_normalizes() {
        let req = model_request("fraud-detector", "v1.2 rc");
        assert_eq!(resolve(&req), "createmodelwithversion:fraud_detector:v1_2_rc");
    }

    #[test]
    fn test_external_id_preferred_over_name() {
        let req: WorkflowRequest = ModelWithVersionRequest {
            idempotency_key: None,
            model: Some(RegisteredModelCreate {
                name: Some("name".to_string()),
                external_id: Some("ext/1".to_string()),
                ..Default::default()
            }),
            version: Some(ModelVersionCreate {
                name: Some("v1".to_string()),
                external_id: Some(" ".to_string()),
                ..Default::default()
            }),
        }
        .into();
        assert_eq!(resolve(&req), "createmodelwithversion:ext_1:v1");
    }

    #[test]
    fn test_missing_parts_become_na() {
        let req: WorkflowRequest = ModelWithVersionRequest::default().into();
        assert_eq!(resolve(&req), "createmodelwithversion:na:na");
    }

    #[test]
    fn test_deploy_key_falls_back_to_model_version_id() {
        let req: WorkflowRequest = DeployModelVersionRequest {
            idempotency_key: None,
            serving_environment: Some(ServingEnvironmentCreate {
                name: Some("prod".to_string()),
                ..Default::default()
            }),
            inference_service: Some(InferenceServiceCreate {
                name: Some("fraud-svc".to_string()),
                registered_model_id: Some("1".to_string()),
                ..Default::default()
            }),
            serve: Some(ServeModelCreate {
                model_version_id: Some("42".to_string()),
                ..Default::default()
            }),
        }
        .into();
        assert_eq!(resolve(&req), "deploymodelversion:prod:fraud_svc:42");
    }

    #[test]
    fn test_equal_identity_gives_equal_keys() {
        let mut a = model_request("m", "v");
        let b = model_request("m", "v");
        if let WorkflowRequest::CreateModelWithVersion(r) = &mut a {
            r.model.as_mut().unwrap().description = Some("different".to_string());
        }
        assert_eq!(resolve(&a), resolve(&b));
        assert_ne!(resolve(&a), resolve(&model_request("m", "v2")));
    }
}
