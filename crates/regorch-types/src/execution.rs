//! Execution entries: the per-key record backing idempotent workflow runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a keyed workflow execution.
///
/// Transitions are monotonic: `InProgress -> Succeeded | Failed`. Terminal
/// entries only leave the store by eviction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionState {
    InProgress,
    Succeeded,
    Failed,
}

impl ExecutionState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecutionState::InProgress)
    }
}

impl std::fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionState::InProgress => write!(f, "IN_PROGRESS"),
            ExecutionState::Succeeded => write!(f, "SUCCEEDED"),
            ExecutionState::Failed => write!(f, "FAILED"),
        }
    }
}

impl std::str::FromStr for ExecutionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN_PROGRESS" => Ok(ExecutionState::InProgress),
            "SUCCEEDED" => Ok(ExecutionState::Succeeded),
            "FAILED" => Ok(ExecutionState::Failed),
            other => Err(format!("invalid execution state: '{other}'")),
        }
    }
}

/// A stored execution record.
///
/// `result_payload` is present iff the state is `Succeeded`;
/// `error_message` is present iff the state is `Failed`. Use the
/// constructors to keep that shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionEntry {
    pub key: String,
    pub operation: String,
    pub state: ExecutionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_payload: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ExecutionEntry {
    pub fn in_progress(key: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            operation: operation.into(),
            state: ExecutionState::InProgress,
            result_payload: None,
            error_message: None,
            updated_at: Utc::now(),
        }
    }

    /// Transition this entry to `Succeeded` with the serialized result.
    pub fn succeeded(self, payload: impl Into<String>) -> Self {
        Self {
            state: ExecutionState::Succeeded,
            result_payload: Some(payload.into()),
            error_message: None,
            updated_at: Utc::now(),
            ..self
        }
    }

    /// Transition this entry to `Failed` with the error message.
    pub fn failed(self, message: impl Into<String>) -> Self {
        Self {
            state: ExecutionState::Failed,
            result_payload: None,
            error_message: Some(message.into()),
            updated_at: Utc::now(),
            ..self
        }
    }

    /// Whether the entry's TTL has elapsed at `now`.
    pub fn is_expired(&self, ttl: chrono::Duration, now: DateTime<Utc>) -> bool {
        self.updated_at
            .checked_add_signed(ttl)
            .is_some_and(|deadline| deadline <= now)
    }
}

/// Result of an atomic insert-if-absent on the execution store.
#[derive(Debug, Clone, PartialEq)]
pub enum BeginOutcome {
    /// The caller inserted a fresh `InProgress` entry and owns the execution.
    Owner(ExecutionEntry),
    /// Another execution already holds the key.
    Existing(ExecutionEntry),
}

impl BeginOutcome {
    pub fn entry(&self) -> &ExecutionEntry {
        match self {
            BeginOutcome::Owner(e) | BeginOutcome::Existing(e) => e,
        }
    }

    pub fn is_owner(&self) -> bool {
        matches!(self, BeginOutcome::Owner(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_keep_shape() {
        let entry = ExecutionEntry::in_progress("k", "op");
        assert_eq!(entry.state, ExecutionState::InProgress);
        assert!(entry.result_payload.is_none() && entry.error_message.is_none());

        let done = entry.clone().succeeded("{}");
        assert_eq!(done.state, ExecutionState::Succeeded);
        assert_eq!(done.result_payload.as_deref(), Some("{}"));
        assert!(done.error_message.is_none());
        assert!(done.updated_at >= entry.updated_at);

        let failed = entry.failed("boom");
        assert_eq!(failed.state, ExecutionState::Failed);
        assert!(failed.result_payload.is_none());
        assert_eq!(failed.error_message.as_deref(), Some("boom"));
    }

    #[test]
    fn test_state_roundtrips_through_str() {
        for state in [
            ExecutionState::InProgress,
            ExecutionState::Succeeded,
            ExecutionState::Failed,
        ] {
            assert_eq!(state.to_string().parse::<ExecutionState>().unwrap(), state);
        }
        assert!("DONE".parse::<ExecutionState>().is_err());
    }

    #[test]
    fn test_expiry_boundary() {
        let entry = ExecutionEntry::in_progress("k", "op");
        let ttl = chrono::Duration::seconds(10);
        assert!(!entry.is_expired(ttl, entry.updated_at + chrono::Duration::seconds(9)));
        assert!(entry.is_expired(ttl, entry.updated_at + ttl));
    }
}
