//! Periodic background reload.

use crate::services::KnowledgeService;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Lower bound on the reload period.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Spawns a task that reloads the knowledge base every `interval`.
///
/// Picks up edits made to the backing file by other processes. Reload
/// failures are logged and the previous state is kept. The first tick fires
/// after one full interval. Abort the returned handle to stop reloading.
///
/// Must be called from within a Tokio runtime.
#[must_use]
pub fn spawn_reload_task(service: Arc<KnowledgeService>, interval: Duration) -> JoinHandle<()> {
    let period = interval.max(MIN_INTERVAL);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let service = Arc::clone(&service);
            let result = tokio::task::spawn_blocking(move || service.reload()).await;
            match result {
                Ok(Ok(outcome)) if outcome.rewritten => {
                    tracing::info!(format = outcome.format.as_str(), "Reload healed knowledge file");
                },
                Ok(Ok(_)) => {},
                Ok(Err(e)) => tracing::warn!(error = %e, "Periodic reload failed"),
                Err(e) => tracing::warn!(error = %e, "Reload task panicked"),
            }
        }
    })
}
