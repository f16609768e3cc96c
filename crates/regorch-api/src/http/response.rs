//! Response envelope shared by every endpoint.
//!
//! ```json
//! {
//!   "data": { "idempotencyKey": "...", "replayed": false, "result": { ... } },
//!   "meta": { "request_id": "...", "timestamp": "...", "response_time_ms": 12 },
//!   "_links": { "self": "/api/v1/workflows/model-with-version" }
//! }
//! ```
//!
//! Failures carry `errors` instead of `data`; see `http::error`.

use std::collections::BTreeMap;

use regorch_core::orchestrator::WorkflowOutcome;
use regorch_types::workflow::WorkflowResult;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub meta: ApiMeta,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ApiErrorDetail>,
    #[serde(rename = "_links", skip_serializing_if = "BTreeMap::is_empty")]
    pub links: BTreeMap<&'static str, String>,
}

#[derive(Debug, Serialize)]
pub struct ApiMeta {
    pub request_id: String,
    pub timestamp: String,
    pub response_time_ms: u64,
}

impl ApiMeta {
    fn stamped(request_id: String, response_time_ms: u64) -> Self {
        Self {
            request_id,
            timestamp: chrono::Utc::now().to_rfc3339(),
            response_time_ms,
        }
    }
}

/// One entry of `errors`. `code` is the stable error kind.
#[derive(Debug, Serialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T, request_id: String, response_time_ms: u64) -> Self {
        Self {
            data: Some(data),
            meta: ApiMeta::stamped(request_id, response_time_ms),
            errors: Vec::new(),
            links: BTreeMap::new(),
        }
    }

    pub fn with_link(mut self, rel: &'static str, href: impl Into<String>) -> Self {
        self.links.insert(rel, href.into());
        self
    }
}

impl ApiResponse<()> {
    pub fn error(detail: ApiErrorDetail, request_id: String) -> Self {
        Self {
            data: None,
            meta: ApiMeta::stamped(request_id, 0),
            errors: vec![detail],
            links: BTreeMap::new(),
        }
    }
}

/// Payload returned by workflow runs, over HTTP and by `regorch run --json`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowResponse {
    /// Absent when the run bypassed the execution store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub replayed: bool,
    pub result: WorkflowResult,
}

impl From<WorkflowOutcome> for WorkflowResponse {
    fn from(outcome: WorkflowOutcome) -> Self {
        Self {
            idempotency_key: outcome.key,
            replayed: outcome.replayed,
            result: outcome.result,
        }
    }
}

/// Path of the execution-inspection endpoint for a key.
pub fn execution_link(key: &str) -> String {
    format!("/api/v1/executions/{key}")
}
