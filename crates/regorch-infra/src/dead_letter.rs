//! Dead-letter sinks.
//!
//! `CloudEventSink` POSTs each payload to a broker as a binary-mode
//! CloudEvent (`ce-*` headers, JSON body). `LogSink` is used when no broker
//! is configured and writes the payload to the log at `error` level.

use std::time::Duration;

use chrono::Utc;
use regorch_core::dead_letter::DeadLetterSink;
use regorch_types::config::DlqConfig;
use regorch_types::error::DeadLetterError;
use reqwest::Url;
use reqwest::header::CONTENT_TYPE;

use crate::config::ConfigError;

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);
const CE_SPEC_VERSION: &str = "1.0";

// ---------------------------------------------------------------------------
// CloudEventSink
// ---------------------------------------------------------------------------

/// Broker sink speaking CloudEvents HTTP binary mode.
pub struct CloudEventSink {
    client: reqwest::Client,
    url: Url,
    source: String,
    event_type: String,
}

impl CloudEventSink {
    pub fn new(
        broker_url: &str,
        source: impl Into<String>,
        event_type: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let url = Url::parse(broker_url).map_err(|e| ConfigError::Invalid {
            field: "dlq.broker_url",
            message: e.to_string(),
        })?;
        let client = reqwest::Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .build()
            .map_err(|e| ConfigError::Invalid {
                field: "dlq",
                message: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            url,
            source: source.into(),
            event_type: event_type.into(),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl DeadLetterSink for CloudEventSink {
    async fn deliver(&self, payload: &str) -> Result<(), DeadLetterError> {
        let response = self
            .client
            .post(self.url.clone())
            .header("ce-id", uuid::Uuid::now_v7().to_string())
            .header("ce-source", &self.source)
            .header("ce-type", &self.event_type)
            .header("ce-specversion", CE_SPEC_VERSION)
            .header("ce-time", Utc::now().to_rfc3339())
            .header(CONTENT_TYPE, "application/json")
            .body(payload.to_string())
            .send()
            .await
            .map_err(|e| DeadLetterError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeadLetterError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// LogSink
// ---------------------------------------------------------------------------

/// Writes dead-letter payloads to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DeadLetterSink for LogSink {
    async fn deliver(&self, payload: &str) -> Result<(), DeadLetterError> {
        tracing::error!(payload = %payload, "dead-letter event (no broker configured)");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ConfiguredSink
// ---------------------------------------------------------------------------

/// The sink selected by `[dlq]` config.
pub enum ConfiguredSink {
    Broker(CloudEventSink),
    Log(LogSink),
}

impl ConfiguredSink {
    /// A broker sink when `dlq.broker_url` is set, otherwise the log sink.
    pub fn from_config(config: &DlqConfig) -> Result<Self, ConfigError> {
        match config.broker_url.as_deref().filter(|u| !u.trim().is_empty()) {
            Some(url) => Ok(ConfiguredSink::Broker(CloudEventSink::new(
                url,
                &config.event_source,
                &config.event_type,
            )?)),
            None => Ok(ConfiguredSink::Log(LogSink)),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ConfiguredSink::Broker(sink) => format!("broker {}", sink.url()),
            ConfiguredSink::Log(_) => "log".to_string(),
        }
    }
}

impl DeadLetterSink for ConfiguredSink {
    async fn deliver(&self, payload: &str) -> Result<(), DeadLetterError> {
        match self {
            ConfiguredSink::Broker(sink) => sink.deliver(payload).await,
            ConfiguredSink::Log(sink) => sink.deliver(payload).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::Router;

    use super::*;

    type Received = Arc<Mutex<Vec<(HeaderMap, String)>>>;

    async fn receive(State(received): State<Received>, headers: HeaderMap, body: String) -> StatusCode {
        received.lock().unwrap().push((headers, body));
        StatusCode::ACCEPTED
    }

    async fn spawn_broker() -> (String, Received) {
        let received: Received = Arc::default();
        let app = Router::new()
            .route("/dlq", post(receive))
            .route("/full", post(|| async { (StatusCode::INSUFFICIENT_STORAGE, "queue full") }))
            .with_state(Arc::clone(&received));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), received)
    }

    #[tokio::test]
    async fn cloud_event_headers_and_body() {
        let (base, received) = spawn_broker().await;
        let sink = CloudEventSink::new(&format!("{base}/dlq"), "test.source", "test.failed").unwrap();

        sink.deliver(r#"{"key":"k1"}"#).await.unwrap();

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        let (headers, body) = &received[0];
        assert_eq!(body, r#"{"key":"k1"}"#);
        assert_eq!(headers["ce-source"], "test.source");
        assert_eq!(headers["ce-type"], "test.failed");
        assert_eq!(headers["ce-specversion"], "1.0");
        assert_eq!(headers["content-type"], "application/json");
        assert!(!headers["ce-id"].is_empty());
        let time = headers["ce-time"].to_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(time).is_ok());
    }

    #[tokio::test]
    async fn broker_rejection_is_reported() {
        let (base, _) = spawn_broker().await;
        let sink = CloudEventSink::new(&format!("{base}/full"), "s", "t").unwrap();

        match sink.deliver("{}").await.unwrap_err() {
            DeadLetterError::Rejected { status, body } => {
                assert_eq!(status, 507);
                assert_eq!(body, "queue full");
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_broker_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let sink = CloudEventSink::new(&format!("http://{addr}/dlq"), "s", "t").unwrap();
        assert!(matches!(
            sink.deliver("{}").await,
            Err(DeadLetterError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn configured_sink_falls_back_to_log() {
        let sink = ConfiguredSink::from_config(&DlqConfig::default()).unwrap();
        assert_eq!(sink.describe(), "log");
        sink.deliver("{}").await.unwrap();

        let config = DlqConfig {
            broker_url: Some("http://broker:8080/dlq".to_string()),
            ..DlqConfig::default()
        };
        let sink = ConfiguredSink::from_config(&config).unwrap();
        assert_eq!(sink.describe(), "broker http://broker:8080/dlq");
    }

    #[test]
    fn invalid_broker_url_is_config_error() {
        let config = DlqConfig {
            broker_url: Some("::not-a-url".to_string()),
            ..DlqConfig::default()
        };
        assert!(matches!(
            ConfiguredSink::from_config(&config),
            Err(ConfigError::Invalid { field: "dlq.broker_url", .. })
        ));
    }
}
