//! In-memory execution store backed by `DashMap`.
//!
//! Per-key atomicity comes from the shard lock held by the `entry` API.
//! Values are cloned out before returning, so no `DashMap` guard is ever
//! held across an `.await`.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use regorch_types::error::StoreError;
use regorch_types::execution::{BeginOutcome, ExecutionEntry, ExecutionState};

use super::store::{ExecutionStore, StorePolicy};

/// Process-local execution store with TTL and capacity bounds.
#[derive(Debug)]
pub struct InMemoryExecutionStore {
    entries: DashMap<String, ExecutionEntry>,
    policy: StorePolicy,
}

impl InMemoryExecutionStore {
    pub fn new(policy: StorePolicy) -> Self {
        Self {
            entries: DashMap::new(),
            policy,
        }
    }

    pub fn policy(&self) -> StorePolicy {
        self.policy
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Apply a terminal transition to a live `InProgress` entry.
    fn transition(
        &self,
        key: &str,
        apply: impl FnOnce(ExecutionEntry) -> ExecutionEntry,
    ) -> Result<ExecutionEntry, StoreError> {
        let now = Utc::now();
        let mut guard = self
            .entries
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        if self.policy.is_expired(guard.value(), now) {
            return Err(StoreError::NotFound(key.to_string()));
        }
        if guard.state != ExecutionState::InProgress {
            return Err(StoreError::InvalidTransition {
                key: key.to_string(),
                from: guard.state,
            });
        }

        let updated = apply(guard.value().clone());
        *guard.value_mut() = updated.clone();
        Ok(updated)
    }
}

impl Default for InMemoryExecutionStore {
    fn default() -> Self {
        Self::new(StorePolicy::default())
    }
}

impl ExecutionStore for InMemoryExecutionStore {
    async fn try_begin(&self, key: &str, operation: &str) -> Result<BeginOutcome, StoreError> {
        let now = Utc::now();
        let outcome = match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if self.policy.is_expired(occupied.get(), now) {
                    let fresh = ExecutionEntry::in_progress(key, operation);
                    occupied.insert(fresh.clone());
                    BeginOutcome::Owner(fresh)
                } else {
                    BeginOutcome::Existing(occupied.get().clone())
                }
            }
            Entry::Vacant(vacant) => {
                let fresh = ExecutionEntry::in_progress(key, operation);
                vacant.insert(fresh.clone());
                BeginOutcome::Owner(fresh)
            }
        };
        Ok(outcome)
    }

    async fn complete(&self, key: &str, payload: String) -> Result<ExecutionEntry, StoreError> {
        self.transition(key, |entry| entry.succeeded(payload))
    }

    async fn fail(&self, key: &str, message: String) -> Result<ExecutionEntry, StoreError> {
        self.transition(key, |entry| entry.failed(message))
    }

    async fn get(&self, key: &str) -> Result<Option<ExecutionEntry>, StoreError> {
        let now = Utc::now();
        Ok(self
            .entries
            .get(key)
            .map(|r| r.value().clone())
            .filter(|entry| !self.policy.is_expired(entry, now)))
    }

    async fn evict(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut removed = 0usize;
        self.entries.retain(|_, entry| {
            let keep = !self.policy.is_expired(entry, now);
            if !keep {
                removed += 1;
            }
            keep
        });

        let len = self.entries.len();
        if len > self.policy.max_entries {
            let mut by_age: Vec<(String, DateTime<Utc>)> = self
                .entries
                .iter()
                .map(|r| (r.key().clone(), r.value().updated_at))
                .collect();
            by_age.sort_by_key(|(_, updated_at)| *updated_at);

            for (key, updated_at) in by_age.into_iter().take(len - self.policy.max_entries) {
                // Skip entries that were rewritten since the snapshot.
                if self
                    .entries
                    .remove_if(&key, |_, entry| entry.updated_at == updated_at)
                    .is_some()
                {
                    removed += 1;
                }
            }
        }

        if removed > 0 {
            tracing::debug!(removed, remaining = self.entries.len(), "evicted execution entries");
        }
        Ok(removed)
    }
}
