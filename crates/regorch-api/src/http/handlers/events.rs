//! CloudEvents trigger for the workflows (HTTP binary mode).
//!
//! A request event with `ce-type` `<prefix>.<workflow>.requested` carries
//! the workflow request as its JSON body. The reply is itself a
//! binary-mode CloudEvent of type `<prefix>.<workflow>.completed` whose
//! body is the workflow result. Failures use the regular error envelope.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use regorch_types::error::WorkflowError;
use regorch_types::workflow::WorkflowKind;

use crate::http::error::AppError;
use crate::http::handlers::workflow::parse_request;
use crate::state::AppState;

const REQUESTED_SUFFIX: &str = "requested";
const COMPLETED_SUFFIX: &str = "completed";

/// Map a `ce-type` to the workflow it requests.
pub fn requested_kind(type_prefix: &str, ce_type: &str) -> Option<WorkflowKind> {
    let route = ce_type
        .strip_prefix(type_prefix)?
        .strip_prefix('.')?
        .strip_suffix(REQUESTED_SUFFIX)?
        .strip_suffix('.')?;
    WorkflowKind::from_route_name(route)
}

pub fn completed_type(type_prefix: &str, kind: WorkflowKind) -> String {
    format!("{type_prefix}.{}.{COMPLETED_SUFFIX}", kind.route_name())
}

/// POST /api/v1/events
pub async fn receive_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let ce_header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    let ce_type = ce_header("ce-type")
        .ok_or_else(|| AppError::Validation("missing ce-type header".to_string()))?;
    let prefix = &state.config.events.type_prefix;
    let kind = requested_kind(prefix, ce_type)
        .ok_or_else(|| AppError::Validation(format!("unsupported event type '{ce_type}'")))?;

    tracing::info!(
        ce_type,
        ce_id = ce_header("ce-id").unwrap_or(""),
        ce_source = ce_header("ce-source").unwrap_or(""),
        "workflow event received"
    );

    let request = parse_request(kind, &body)?;
    let outcome = state.run_workflow(request, true).await?;

    let payload = serde_json::to_vec(&outcome.result)
        .map_err(|e| AppError::Workflow(WorkflowError::Internal(e.to_string())))?;

    let mut reply = HeaderMap::new();
    let mut set = |name: &'static str, value: String| {
        if let Ok(value) = HeaderValue::from_str(&value) {
            reply.insert(HeaderName::from_static(name), value);
        }
    };
    set("ce-id", uuid::Uuid::now_v7().to_string());
    set("ce-specversion", "1.0".to_string());
    set("ce-source", state.config.events.source.clone());
    set("ce-type", completed_type(prefix, kind));
    set("ce-time", chrono::Utc::now().to_rfc3339());
    if let Some(key) = outcome.key {
        set("ce-subject", key);
    }
    reply.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

    Ok((StatusCode::OK, reply, payload).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "io.cx.model_registry";

    #[test]
    fn requested_types_resolve_to_workflows() {
        assert_eq!(
            requested_kind(PREFIX, "io.cx.model_registry.model-with-version.requested"),
            Some(WorkflowKind::CreateModelWithVersion)
        );
        assert_eq!(
            requested_kind(PREFIX, "io.cx.model_registry.deploy-model-version.requested"),
            Some(WorkflowKind::DeployModelVersion)
        );
    }

    #[test]
    fn foreign_or_malformed_types_are_rejected() {
        for ce_type in [
            "io.cx.model_registry.model-with-version.completed",
            "io.cx.model_registry.unknown.requested",
            "com.other.model-with-version.requested",
            "io.cx.model_registrymodel-with-version.requested",
            "",
        ] {
            assert_eq!(requested_kind(PREFIX, ce_type), None, "{ce_type}");
        }
    }

    #[test]
    fn completed_type_mirrors_request() {
        assert_eq!(
            completed_type(PREFIX, WorkflowKind::DeployModelVersion),
            "io.cx.model_registry.deploy-model-version.completed"
        );
    }
}
