//! Workflow handlers: direct invocation of the orchestrated workflows.

use std::time::Instant;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Query, State};
use regorch_types::workflow::{WorkflowKind, WorkflowRequest};
use serde::Deserialize;

use crate::http::error::AppError;
use crate::http::response::{ApiResponse, WorkflowResponse, execution_link};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WorkflowQuery {
    /// `false` runs without the execution store unless the body carries an
    /// explicit idempotency key.
    #[serde(default = "default_idempotent")]
    pub idempotent: bool,
}

fn default_idempotent() -> bool {
    true
}

/// POST /api/v1/workflows/model-with-version
pub async fn create_model_with_version(
    State(state): State<AppState>,
    Query(query): Query<WorkflowQuery>,
    body: Bytes,
) -> Result<Json<ApiResponse<WorkflowResponse>>, AppError> {
    run(&state, WorkflowKind::CreateModelWithVersion, &query, &body).await
}

/// POST /api/v1/workflows/deploy-model-version
pub async fn deploy_model_version(
    State(state): State<AppState>,
    Query(query): Query<WorkflowQuery>,
    body: Bytes,
) -> Result<Json<ApiResponse<WorkflowResponse>>, AppError> {
    run(&state, WorkflowKind::DeployModelVersion, &query, &body).await
}

/// Parse a request body for `kind`.
pub fn parse_request(kind: WorkflowKind, body: &[u8]) -> Result<WorkflowRequest, AppError> {
    WorkflowRequest::from_json(kind, body)
        .map_err(|e| AppError::Validation(format!("invalid {kind} request body: {e}")))
}

async fn run(
    state: &AppState,
    kind: WorkflowKind,
    query: &WorkflowQuery,
    body: &[u8],
) -> Result<Json<ApiResponse<WorkflowResponse>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let request = parse_request(kind, body)?;
    let outcome = state.run_workflow(request, query.idempotent).await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let self_link = format!("/api/v1/workflows/{}", kind.route_name());
    let execution = outcome.key.as_deref().map(execution_link);
    let mut resp =
        ApiResponse::success(WorkflowResponse::from(outcome), request_id, elapsed).with_link("self", self_link);
    if let Some(execution) = execution {
        resp = resp.with_link("execution", execution);
    }

    Ok(Json(resp))
}
