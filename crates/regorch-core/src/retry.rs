//! Bounded retry with exponential backoff for registry calls.
//!
//! Each workflow step runs inside `RetryHandler::with_retry`. Transient
//! failures (transport errors, status 0, 429, 5xx) are retried up to the
//! policy's attempt budget; anything else propagates on the first attempt.
//! Backoff sleeps go through `tokio::time::sleep` and never block a worker.

use std::future::Future;
use std::time::Duration;

use regorch_types::config::RetryConfig;
use regorch_types::error::{RegistryError, WorkflowError};

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Values below 1 act as 1.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts,
            initial_backoff,
            max_backoff,
        }
    }

    /// Delay before attempt `attempt + 1`, where `attempt` is 1-based:
    /// `min(initial * 2^(attempt-1), max)`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32
            .checked_pow(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    fn attempt_budget(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.initial_backoff_ms),
            Duration::from_millis(config.max_backoff_ms),
        )
    }
}

// ---------------------------------------------------------------------------
// RetryHandler
// ---------------------------------------------------------------------------

/// Stateless retry handler for registry steps.
///
/// No internal state; all logic is in associated functions that take the
/// policy as a parameter.
pub struct RetryHandler;

impl RetryHandler {
    /// Whether a failed attempt (1-based) should be followed by another.
    pub fn should_retry(policy: &RetryPolicy, attempt: u32, error: &RegistryError) -> bool {
        error.is_retryable() && attempt < policy.attempt_budget()
    }

    /// Run `action` under the retry policy.
    ///
    /// Returns `PermanentDownstream` for a non-retryable failure and
    /// `TransientDownstream` (carrying the last error and the attempt
    /// count) once the budget is spent.
    pub async fn with_retry<T, F, Fut>(
        policy: &RetryPolicy,
        step: &str,
        mut action: F,
    ) -> Result<T, WorkflowError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RegistryError>>,
    {
        let mut attempt = 1u32;
        loop {
            match action().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(step, attempt, "step succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) if Self::should_retry(policy, attempt, &error) => {
                    let delay = policy.backoff_for(attempt);
                    tracing::warn!(
                        step,
                        attempt,
                        status = error.status(),
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "transient registry failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) if error.is_retryable() => {
                    tracing::warn!(step, attempts = attempt, error = %error, "retry budget exhausted");
                    return Err(WorkflowError::TransientDownstream {
                        step: step.to_string(),
                        attempts: attempt,
                        source: error,
                    });
                }
                Err(error) => {
                    tracing::warn!(step, status = error.status(), error = %error, "registry rejected step");
                    return Err(WorkflowError::PermanentDownstream {
                        step: step.to_string(),
                        source: error,
                    });
                }
            }
        }
    }
}
