//! Axum router configuration with middleware.
//!
//! All routes are under `/api/v1/`. Middleware: CORS, tracing.

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route(
            "/workflows/model-with-version",
            post(handlers::workflow::create_model_with_version),
        )
        .route(
            "/workflows/deploy-model-version",
            post(handlers::workflow::deploy_model_version),
        )
        .route("/events", post(handlers::events::receive_event))
        .route("/executions/{key}", get(handlers::execution::get_execution));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    use axum::Json;
    use axum::extract::State;
    use axum::http::StatusCode;
    use regorch_types::config::OrchestratorConfig;
    use serde_json::{Value, json};

    use super::*;

    /// Registry stand-in: echoes create bodies with sequential ids and
    /// rejects models named "reject".
    async fn spawn_registry() -> String {
        async fn create(State(ids): State<Arc<AtomicU64>>, Json(mut body): Json<Value>) -> (StatusCode, Json<Value>) {
            if body["name"] == "reject" {
                return (StatusCode::BAD_REQUEST, Json(json!({"message": "name not allowed"})));
            }
            body["id"] = json!((ids.fetch_add(1, Ordering::SeqCst) + 1).to_string());
            (StatusCode::CREATED, Json(body))
        }

        let app = Router::new()
            .route("/api/registered_models", post(create))
            .route("/api/model_versions", post(create))
            .route("/api/serving_environments", post(create))
            .route("/api/inference_services", post(create))
            .route("/api/inference_services/{id}/serves", post(create))
            .with_state(Arc::new(AtomicU64::new(0)));
        serve(app).await
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn spawn_app(dir: &tempfile::TempDir) -> String {
        let registry = spawn_registry().await;
        let mut config = OrchestratorConfig::default();
        config.registry.base_url = format!("{registry}/api");
        config.registry.timeout_secs = 5;
        config.retry.initial_backoff_ms = 1;
        config.retry.max_backoff_ms = 2;

        let state = AppState::build(config, dir.path().to_path_buf()).await.unwrap();
        serve(build_router(state)).await
    }

    fn model_request(name: &str) -> Value {
        json!({
            "model": {"name": name},
            "version": {"name": "v1", "author": "ci"}
        })
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let dir = tempfile::tempdir().unwrap();
        let base = spawn_app(&dir).await;

        let body: Value = reqwest::get(format!("{base}/health")).await.unwrap().json().await.unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn model_with_version_runs_once_then_replays() {
        let dir = tempfile::tempdir().unwrap();
        let base = spawn_app(&dir).await;
        let client = reqwest::Client::new();
        let url = format!("{base}/api/v1/workflows/model-with-version");

        let first = client.post(&url).json(&model_request("fraud")).send().await.unwrap();
        assert_eq!(first.status(), 200);
        let first: Value = first.json().await.unwrap();
        let data = &first["data"];
        assert_eq!(data["replayed"], false);
        assert_eq!(data["result"]["model"]["id"], "1");
        assert_eq!(data["result"]["version"]["registeredModelId"], "1");
        let key = data["idempotencyKey"].as_str().unwrap().to_string();
        assert_eq!(first["_links"]["execution"], format!("/api/v1/executions/{key}"));

        let second: Value = client
            .post(&url)
            .json(&model_request("fraud"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(second["data"]["replayed"], true);
        assert_eq!(second["data"]["result"], data["result"]);

        let execution: Value = client
            .get(format!("{base}/api/v1/executions/{key}"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(execution["data"]["state"], "SUCCEEDED");
        assert_eq!(execution["data"]["operation"], "create-model-with-version");
    }

    #[tokio::test]
    async fn non_idempotent_run_skips_store() {
        let dir = tempfile::tempdir().unwrap();
        let base = spawn_app(&dir).await;

        let body: Value = reqwest::Client::new()
            .post(format!("{base}/api/v1/workflows/model-with-version?idempotent=false"))
            .json(&model_request("scratch"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(body["data"].get("idempotencyKey").is_none());
        assert!(body["_links"].get("execution").is_none());
    }

    #[tokio::test]
    async fn explicit_key_is_recorded_even_when_not_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let base = spawn_app(&dir).await;
        let client = reqwest::Client::new();

        let mut request = model_request("keyed");
        request["idempotencyKey"] = json!("caller-key-1");
        let body: Value = client
            .post(format!("{base}/api/v1/workflows/model-with-version?idempotent=false"))
            .json(&request)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["data"]["idempotencyKey"], "caller-key-1");

        let execution = client
            .get(format!("{base}/api/v1/executions/caller-key-1"))
            .send()
            .await
            .unwrap();
        assert_eq!(execution.status(), 200);
    }

    #[tokio::test]
    async fn deploy_model_version_chains_ids() {
        let dir = tempfile::tempdir().unwrap();
        let base = spawn_app(&dir).await;

        let request = json!({
            "idempotencyKey": "deploy-1",
            "servingEnvironment": {"name": "prod"},
            "inferenceService": {"name": "fraud-svc", "registeredModelId": "7"},
            "serve": {"modelVersionId": "9"}
        });
        let response = reqwest::Client::new()
            .post(format!("{base}/api/v1/workflows/deploy-model-version"))
            .json(&request)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let body: Value = response.json().await.unwrap();
        let result = &body["data"]["result"];
        assert_eq!(body["data"]["idempotencyKey"], "deploy-1");
        assert_eq!(result["inferenceService"]["servingEnvironmentId"], result["servingEnvironment"]["id"]);
        assert_eq!(result["serve"]["modelVersionId"], "9");
    }

    #[tokio::test]
    async fn invalid_request_is_400() {
        let dir = tempfile::tempdir().unwrap();
        let base = spawn_app(&dir).await;
        let client = reqwest::Client::new();
        let url = format!("{base}/api/v1/workflows/model-with-version");

        let missing = client.post(&url).json(&json!({"version": {"name": "v1"}})).send().await.unwrap();
        assert_eq!(missing.status(), 400);
        let body: Value = missing.json().await.unwrap();
        assert_eq!(body["errors"][0]["code"], "VALIDATION_ERROR");
        assert!(body["errors"][0]["message"].as_str().unwrap().contains("'model' must be provided"));

        let garbled = client.post(&url).body("{not json").send().await.unwrap();
        assert_eq!(garbled.status(), 400);
    }

    #[tokio::test]
    async fn registry_rejection_is_502_then_already_failed() {
        let dir = tempfile::tempdir().unwrap();
        let base = spawn_app(&dir).await;
        let client = reqwest::Client::new();
        let url = format!("{base}/api/v1/workflows/model-with-version");

        let first = client.post(&url).json(&model_request("reject")).send().await.unwrap();
        assert_eq!(first.status(), 502);
        let body: Value = first.json().await.unwrap();
        let error = &body["errors"][0];
        assert_eq!(error["code"], "DOWNSTREAM_REJECTED");
        assert_eq!(error["details"]["status"], 400);
        assert_eq!(error["details"]["step"], "create-registered-model");

        let second = client.post(&url).json(&model_request("reject")).send().await.unwrap();
        assert_eq!(second.status(), 409);
        let body: Value = second.json().await.unwrap();
        assert_eq!(body["errors"][0]["code"], "WORKFLOW_ALREADY_FAILED");
    }

    #[tokio::test]
    async fn unknown_execution_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let base = spawn_app(&dir).await;

        let response = reqwest::get(format!("{base}/api/v1/executions/nope")).await.unwrap();
        assert_eq!(response.status(), 404);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["errors"][0]["code"], "EXECUTION_NOT_FOUND");
    }

    #[tokio::test]
    async fn event_trigger_replies_with_completed_event() {
        let dir = tempfile::tempdir().unwrap();
        let base = spawn_app(&dir).await;

        let response = reqwest::Client::new()
            .post(format!("{base}/api/v1/events"))
            .header("ce-id", "evt-1")
            .header("ce-source", "test")
            .header("ce-specversion", "1.0")
            .header("ce-type", "io.cx.model_registry.model-with-version.requested")
            .json(&model_request("via-event"))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(
            response.headers()["ce-type"],
            "io.cx.model_registry.model-with-version.completed"
        );
        assert_eq!(response.headers()["ce-specversion"], "1.0");
        assert!(response.headers().contains_key("ce-subject"));
        let result: Value = response.json().await.unwrap();
        assert_eq!(result["model"]["name"], "via-event");
    }

    #[tokio::test]
    async fn event_with_unknown_type_is_400() {
        let dir = tempfile::tempdir().unwrap();
        let base = spawn_app(&dir).await;

        let response = reqwest::Client::new()
            .post(format!("{base}/api/v1/events"))
            .header("ce-type", "io.cx.model_registry.retire-model.requested")
            .json(&json!({}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
    }
}
