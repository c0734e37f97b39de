//! Shutdown coordination.

use crate::error::Result;
use crate::types::Event;

use super::BulkDownloader;

impl BulkDownloader {
    /// Gracefully shut down the downloader
    ///
    /// This method performs a graceful shutdown sequence:
    /// 1. Stops accepting new products (`add` fails with [`PoolClosed`](crate::Error::PoolClosed))
    /// 2. Signals workers to stop; archive waits end immediately, in-flight transfers finish
    /// 3. Waits for workers to exit, aborting any still running after `monitor.shutdown_timeout`
    /// 4. Discards the pending and done queues
    ///
    /// Idempotent: later calls (including concurrent ones) wait for the first call
    /// to finish and then return `Ok(())`.
    pub async fn shutdown(&self) -> Result<()> {
        if !self.queue.close().await {
            tracing::debug!("Bulk downloader already shutting down, waiting for it");
            self.stopped.cancelled().await;
            return Ok(());
        }
        tracing::info!(
            service = self.service.name(),
            "Initiating bulk downloader shutdown"
        );

        self.cancel.cancel();

        let mut handles = std::mem::take(&mut *self.tasks.lock().await);
        let timeout = self.config.monitor.shutdown_timeout;
        let wait_result = tokio::time::timeout(
            timeout,
            futures::future::join_all(handles.iter_mut()),
        )
        .await;

        match wait_result {
            Ok(results) => {
                let failed = results.iter().filter(|r| r.is_err()).count();
                if failed > 0 {
                    tracing::warn!(failed, "Some worker tasks ended abnormally");
                } else {
                    tracing::info!("All workers stopped");
                }
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = timeout.as_secs(),
                    "Timeout waiting for workers, aborting remaining tasks"
                );
                // handles joined before the timeout must not be polled again
                handles.retain(|handle| !handle.is_finished());
                for handle in &handles {
                    handle.abort();
                }
                for handle in handles {
                    let _ = handle.await;
                }
            }
        }

        let dropped = self.queue.clear().await;
        if dropped > 0 {
            tracing::warn!(
                dropped,
                "Discarded pending products at shutdown; resubmit them to retry"
            );
        }

        self.emit_event(Event::Shutdown);
        self.stopped.cancel();
        tracing::info!("Bulk downloader shutdown complete");
        Ok(())
    }
}
