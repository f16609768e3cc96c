//! In-process fakes for the registry and dead-letter ports.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use regorch_types::error::{DeadLetterError, RegistryError};
use regorch_types::registry::Lookup;
use serde_json::Value;

use crate::dead_letter::DeadLetterSink;
use crate::registry::{ResourceApi, ResourceKind};

// ---------------------------------------------------------------------------
// FakeRegistry
// ---------------------------------------------------------------------------

/// A create call as seen by the fake: collection path plus request body.
#[derive(Debug, Clone)]
pub struct RecordedCreate {
    pub path: String,
    pub body: Value,
}

/// Registry fake that materializes resources from their create DTOs.
///
/// Each create serializes the DTO, assigns a sequential id and
/// deserializes it back as the resource type. Failures and blank ids can
/// be scripted per kind (keyed by `ResourceKind::NAME`).
#[derive(Default)]
pub struct FakeRegistry {
    next_id: AtomicU64,
    calls: DashMap<&'static str, u32>,
    failures: Mutex<HashMap<&'static str, VecDeque<RegistryError>>>,
    blank_ids: Mutex<HashSet<&'static str>>,
    created: Mutex<Vec<RecordedCreate>>,
    resources: DashMap<(&'static str, String), Value>,
    delay: Option<Duration>,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every create sleeps for `delay` before answering.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// The next `times` creates of kind `K` fail with `error`.
    pub fn fail_next<K: ResourceKind>(&self, times: usize, error: RegistryError) {
        let mut failures = self.failures.lock().unwrap();
        let queue = failures.entry(K::NAME).or_default();
        queue.extend(std::iter::repeat_n(error, times));
    }

    /// Creates of kind `K` succeed but return a blank id.
    pub fn blank_ids_for<K: ResourceKind>(&self) {
        self.blank_ids.lock().unwrap().insert(K::NAME);
    }

    /// Number of create calls (including failed ones) for kind `K`.
    pub fn create_calls<K: ResourceKind>(&self) -> u32 {
        self.calls.get(K::NAME).map(|r| *r.value()).unwrap_or(0)
    }

    pub fn total_create_calls(&self) -> u32 {
        self.calls.iter().map(|r| *r.value()).sum()
    }

    /// Successful creates in call order.
    pub fn created(&self) -> Vec<RecordedCreate> {
        self.created.lock().unwrap().clone()
    }

    fn next_failure(&self, name: &'static str) -> Option<RegistryError> {
        self.failures
            .lock()
            .unwrap()
            .get_mut(name)
            .and_then(|queue| queue.pop_front())
    }

    fn decode_error(e: serde_json::Error) -> RegistryError {
        RegistryError::Decode {
            status: 200,
            message: e.to_string(),
        }
    }
}

impl<K: ResourceKind> ResourceApi<K> for FakeRegistry {
    async fn create(&self, parent: &K::Parent, dto: &K::Create) -> Result<K::Resource, RegistryError> {
        *self.calls.entry(K::NAME).or_insert(0) += 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.next_failure(K::NAME) {
            return Err(error);
        }

        let id = if self.blank_ids.lock().unwrap().contains(K::NAME) {
            String::new()
        } else {
            (self.next_id.fetch_add(1, Ordering::SeqCst) + 1).to_string()
        };

        let body = serde_json::to_value(dto).map_err(Self::decode_error)?;
        let mut resource = body.clone();
        if let Some(object) = resource.as_object_mut() {
            object.insert("id".to_string(), Value::String(id.clone()));
        }

        self.created.lock().unwrap().push(RecordedCreate {
            path: K::collection_segments(parent).join("/"),
            body,
        });
        self.resources.insert((K::NAME, id), resource.clone());
        serde_json::from_value(resource).map_err(Self::decode_error)
    }

    async fn get(&self, _parent: &K::Parent, id: &str) -> Result<Option<K::Resource>, RegistryError> {
        let found = self
            .resources
            .get(&(K::NAME, id.to_string()))
            .map(|r| r.value().clone());
        found
            .map(|v| serde_json::from_value(v).map_err(Self::decode_error))
            .transpose()
    }

    async fn find(
        &self,
        _parent: &K::Parent,
        lookup: &Lookup,
    ) -> Result<Option<K::Resource>, RegistryError> {
        let field = lookup.param();
        let found = self
            .resources
            .iter()
            .filter(|r| r.key().0 == K::NAME)
            .find(|r| r.value().get(field).and_then(Value::as_str) == Some(lookup.value()))
            .map(|r| r.value().clone());
        found
            .map(|v| serde_json::from_value(v).map_err(Self::decode_error))
            .transpose()
    }

    async fn update(
        &self,
        _parent: &K::Parent,
        id: &str,
        patch: &K::Update,
    ) -> Result<K::Resource, RegistryError> {
        let patch = serde_json::to_value(patch).map_err(Self::decode_error)?;
        let mut entry = self
            .resources
            .get_mut(&(K::NAME, id.to_string()))
            .ok_or_else(|| RegistryError::Status {
                status: 404,
                method: "PATCH".to_string(),
                url: format!("{}/{id}", K::NAME),
                body: String::new(),
            })?;
        if let (Some(target), Some(fields)) = (entry.as_object_mut(), patch.as_object()) {
            for (k, v) in fields {
                target.insert(k.clone(), v.clone());
            }
        }
        let updated = entry.value().clone();
        drop(entry);
        serde_json::from_value(updated).map_err(Self::decode_error)
    }
}

// ---------------------------------------------------------------------------
// RecordingSink
// ---------------------------------------------------------------------------

/// Dead-letter sink that keeps every delivered payload.
#[derive(Default)]
pub struct RecordingSink {
    payloads: Mutex<Vec<String>>,
    attempts: AtomicU32,
    fail: bool,
}

impl RecordingSink {
    /// A sink whose deliveries always fail.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn payloads(&self) -> Vec<String> {
        self.payloads.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl DeadLetterSink for RecordingSink {
    async fn deliver(&self, payload: &str) -> Result<(), DeadLetterError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(DeadLetterError::Transport("broker unreachable".to_string()));
        }
        self.payloads.lock().unwrap().push(payload.to_string());
        Ok(())
    }
}
