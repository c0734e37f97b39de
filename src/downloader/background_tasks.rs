//! Background progress monitor.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::queue::WorkQueue;

/// Spawn a task that logs queue statistics every `interval` until cancelled.
pub(crate) fn spawn_progress_monitor(
    queue: Arc<WorkQueue>,
    interval: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let stats = queue.stats().await;
                    tracing::info!(
                        pending = stats.pending,
                        in_flight = stats.in_flight,
                        awaiting_archive = stats.awaiting_archive,
                        done = stats.done,
                        "Bulk download progress"
                    );
                }
                _ = cancel.cancelled() => {
                    break;
                }
            }
        }
        tracing::debug!("Progress monitor stopping");
    })
}
