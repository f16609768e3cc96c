//! Execution store inspection, for polling after a conflict.

use std::time::Instant;

use axum::Json;
use axum::extract::{Path, State};
use regorch_core::idempotency::ExecutionStore;
use regorch_types::execution::ExecutionEntry;

use crate::http::error::AppError;
use crate::http::response::{ApiResponse, execution_link};
use crate::state::AppState;

/// GET /api/v1/executions/{key}
pub async fn get_execution(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ApiResponse<ExecutionEntry>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let entry = state
        .store
        .get(&key)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No execution entry for key '{key}'")))?;
    let elapsed = start.elapsed().as_millis() as u64;

    Ok(Json(
        ApiResponse::success(entry, request_id, elapsed).with_link("self", execution_link(&key)),
    ))
}
