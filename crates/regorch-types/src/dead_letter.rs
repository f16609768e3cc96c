use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A record describing a workflow invocation that reached `Failed`.
///
/// Built once per terminal failure and handed to the dead-letter publisher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterEvent {
    pub key: String,
    pub operation: String,
    pub error_type: String,
    pub error_message: String,
    /// The original request, serialized. `None` if it could not be encoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_json: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names() {
        let event = DeadLetterEvent {
            key: "k".into(),
            operation: "deploy-model-version".into(),
            error_type: "PERMANENT_DOWNSTREAM".into(),
            error_message: "bad".into(),
            request_json: Some("{}".into()),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["errorType"], "PERMANENT_DOWNSTREAM");
        assert_eq!(json["requestJson"], "{}");
        assert!(json.get("timestamp").is_some());
    }
}
