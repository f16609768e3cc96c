//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use regorch_types::error::{RegistryError, StoreError, WorkflowError};
use serde_json::json;

use crate::http::response::{ApiErrorDetail, ApiResponse};

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Workflow failures, classified by `WorkflowError::kind`.
    Workflow(WorkflowError),
    /// Execution store failures outside a workflow run.
    Store(StoreError),
    /// Malformed request (body, headers).
    Validation(String),
    /// No execution entry for the requested key.
    NotFound(String),
}

impl From<WorkflowError> for AppError {
    fn from(e: WorkflowError) -> Self {
        AppError::Workflow(e)
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Store(e)
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Workflow(e) => match e {
                WorkflowError::Validation(_) => StatusCode::BAD_REQUEST,
                WorkflowError::Conflict { .. } | WorkflowError::AlreadyFailed { .. } => {
                    StatusCode::CONFLICT
                }
                WorkflowError::PermanentDownstream { .. } => StatusCode::BAD_GATEWAY,
                WorkflowError::TransientDownstream { .. } => StatusCode::SERVICE_UNAVAILABLE,
                WorkflowError::Store(_) | WorkflowError::Internal(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    fn detail(&self) -> ApiErrorDetail {
        let (code, message, details) = match self {
            AppError::Workflow(e) => (e.kind(), e.to_string(), workflow_details(e)),
            AppError::Store(e) => ("STORE_ERROR", e.to_string(), None),
            AppError::Validation(msg) => ("VALIDATION_ERROR", msg.clone(), None),
            AppError::NotFound(msg) => ("EXECUTION_NOT_FOUND", msg.clone(), None),
        };
        ApiErrorDetail {
            code: code.to_string(),
            message,
            details,
        }
    }
}

fn workflow_details(e: &WorkflowError) -> Option<serde_json::Value> {
    match e {
        WorkflowError::PermanentDownstream { step, source } => {
            Some(downstream_details(step, None, source))
        }
        WorkflowError::TransientDownstream {
            step,
            attempts,
            source,
        } => Some(downstream_details(step, Some(*attempts), source)),
        WorkflowError::Conflict { key } | WorkflowError::AlreadyFailed { key, .. } => {
            Some(json!({ "idempotencyKey": key }))
        }
        _ => None,
    }
}

fn downstream_details(step: &str, attempts: Option<u32>, source: &RegistryError) -> serde_json::Value {
    let mut details = json!({
        "step": step,
        "status": source.status(),
        "errorType": source.kind(),
    });
    if let Some(attempts) = attempts {
        details["attempts"] = json!(attempts);
    }
    if let RegistryError::Status { body, .. } = source {
        details["body"] = json!(body);
    }
    details
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = ?self, "request failed");
        }

        let body = ApiResponse::<()>::error(self.detail(), uuid::Uuid::now_v7().to_string());
        let body = serde_json::to_string(&body).unwrap_or_else(|_| {
            r#"{"errors":[{"code":"SERIALIZATION_ERROR","message":"Failed to serialize response"}]}"#.to_string()
        });

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected(status: u16) -> RegistryError {
        RegistryError::Status {
            status,
            method: "POST".into(),
            url: "http://registry/registered_models".into(),
            body: "duplicate name".into(),
        }
    }

    #[test]
    fn workflow_errors_map_to_statuses() {
        let cases = [
            (WorkflowError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (WorkflowError::Conflict { key: "k".into() }, StatusCode::CONFLICT),
            (
                WorkflowError::AlreadyFailed {
                    key: "k".into(),
                    message: "m".into(),
                },
                StatusCode::CONFLICT,
            ),
            (
                WorkflowError::PermanentDownstream {
                    step: "create-registered-model".into(),
                    source: rejected(400),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                WorkflowError::TransientDownstream {
                    step: "create-model-version".into(),
                    attempts: 3,
                    source: rejected(503),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (WorkflowError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(AppError::from(error).status(), status);
        }
        assert_eq!(AppError::NotFound("k".into()).status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn downstream_rejection_carries_status_and_body() {
        let detail = AppError::from(WorkflowError::PermanentDownstream {
            step: "create-registered-model".into(),
            source: rejected(409),
        })
        .detail();

        assert_eq!(detail.code, "DOWNSTREAM_REJECTED");
        let details = detail.details.unwrap();
        assert_eq!(details["status"], 409);
        assert_eq!(details["body"], "duplicate name");
        assert_eq!(details["step"], "create-registered-model");
        assert!(details.get("attempts").is_none());
    }

    #[test]
    fn transient_failure_reports_attempts() {
        let detail = AppError::from(WorkflowError::TransientDownstream {
            step: "create-serve".into(),
            attempts: 3,
            source: RegistryError::Timeout("30s".into()),
        })
        .detail();

        assert_eq!(detail.code, "DOWNSTREAM_UNAVAILABLE");
        let details = detail.details.unwrap();
        assert_eq!(details["attempts"], 3);
        assert_eq!(details["status"], 0);
        assert!(details.get("body").is_none());
    }
}
