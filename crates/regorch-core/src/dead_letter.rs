//! Dead-letter publishing for permanently failed workflow invocations.
//!
//! `DeadLetterPublisher::publish` never fails: serialization falls back to a
//! minimal hand-built JSON document and sink errors are logged, not
//! returned. A failed dead-letter delivery must never change the outcome
//! reported to the workflow caller.

use regorch_types::dead_letter::DeadLetterEvent;
use regorch_types::error::DeadLetterError;

/// Destination for serialized dead-letter events.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait DeadLetterSink: Send + Sync {
    /// Deliver one JSON payload.
    fn deliver(
        &self,
        payload: &str,
    ) -> impl std::future::Future<Output = Result<(), DeadLetterError>> + Send;
}

impl<T: DeadLetterSink> DeadLetterSink for std::sync::Arc<T> {
    fn deliver(
        &self,
        payload: &str,
    ) -> impl std::future::Future<Output = Result<(), DeadLetterError>> + Send {
        (**self).deliver(payload)
    }
}

/// Best-effort publisher wrapping a sink.
pub struct DeadLetterPublisher<S: DeadLetterSink> {
    sink: S,
    enabled: bool,
}

impl<S: DeadLetterSink> DeadLetterPublisher<S> {
    pub fn new(sink: S, enabled: bool) -> Self {
        Self { sink, enabled }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Publish an event. With publishing disabled the payload is only logged.
    pub async fn publish(&self, event: DeadLetterEvent) {
        let payload = serialize(&event);

        if !self.enabled {
            tracing::error!(key = %event.key, payload = %payload, "dead-letter publishing disabled");
            return;
        }

        match self.sink.deliver(&payload).await {
            Ok(()) => {
                tracing::error!(
                    key = %event.key,
                    operation = %event.operation,
                    error_type = %event.error_type,
                    "workflow dead-letter event published"
                );
            }
            Err(e) => {
                tracing::error!(
                    key = %event.key,
                    error = %e,
                    payload = %payload,
                    "failed to publish dead-letter event"
                );
            }
        }
    }
}

fn serialize(event: &DeadLetterEvent) -> String {
    serde_json::to_string(event).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "dead-letter event serialization failed, using fallback");
        fallback_payload(event)
    })
}

/// Minimal JSON built by hand. Double quotes inside values become single
/// quotes so the result stays parseable without an escaper.
pub fn fallback_payload(event: &DeadLetterEvent) -> String {
    fn safe(value: &str) -> String {
        value.replace('"', "'")
    }
    format!(
        r#"{{"key":"{}","operation":"{}","errorType":"{}","errorMessage":"{}"}}"#,
        safe(&event.key),
        safe(&event.operation),
        safe(&event.error_type),
        safe(&event.error_message),
    )
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::testing::RecordingSink;

    fn event(message: &str) -> DeadLetterEvent {
        DeadLetterEvent {
            key: "createmodelwithversion:m:v".into(),
            operation: "create-model-with-version".into(),
            error_type: "DOWNSTREAM_REJECTED".into(),
            error_message: message.into(),
            request_json: Some(r#"{"model":{"name":"m"}}"#.into()),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn publish_delivers_serialized_event() {
        let publisher = DeadLetterPublisher::new(RecordingSink::default(), true);
        publisher.publish(event("bad request")).await;

        let delivered = publisher.sink().payloads();
        assert_eq!(delivered.len(), 1);
        let json: serde_json::Value = serde_json::from_str(&delivered[0]).unwrap();
        assert_eq!(json["key"], "createmodelwithversion:m:v");
        assert_eq!(json["errorType"], "DOWNSTREAM_REJECTED");
        assert_eq!(json["requestJson"], r#"{"model":{"name":"m"}}"#);
    }

    #[tokio::test]
    async fn disabled_publisher_does_not_deliver() {
        let publisher = DeadLetterPublisher::new(RecordingSink::default(), false);
        publisher.publish(event("bad request")).await;
        assert!(publisher.sink().payloads().is_empty());
    }

    #[tokio::test]
    async fn sink_failure_is_swallowed() {
        let sink = RecordingSink::failing();
        let publisher = DeadLetterPublisher::new(sink, true);
        // Must return normally.
        publisher.publish(event("boom")).await;
        assert_eq!(publisher.sink().attempts(), 1);
    }

    #[test]
    fn fallback_is_valid_json_with_quotes_replaced() {
        let payload = fallback_payload(&event(r#"field "name" is required"#));
        let json: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(json["errorMessage"], "field 'name' is required");
        assert_eq!(json["operation"], "create-model-with-version");
        assert!(json.get("requestJson").is_none());
    }
}
