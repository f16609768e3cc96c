//! Background eviction sweeper.
//!
//! Calls `ExecutionStore::evict` on a fixed interval until the token is
//! cancelled. Sweep failures are logged and the loop keeps going.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use regorch_core::idempotency::ExecutionStore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub fn spawn_sweeper<S>(store: Arc<S>, interval: Duration, token: CancellationToken) -> JoinHandle<()>
where
    S: ExecutionStore + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::debug!("eviction sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    match store.evict(Utc::now()).await {
                        Ok(0) => {}
                        Ok(removed) => tracing::info!(removed, "swept execution store"),
                        Err(e) => tracing::warn!(error = %e, "execution store sweep failed"),
                    }
                }
            }
        }
    })
}
