//! Caller-facing control surface: submitting products and observing completion.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::{Event, Outcome, PoolStats, ProductDescriptor, ProductId, WorkItem};

use super::BulkDownloader;

impl BulkDownloader {
    /// Add products to the pending queue
    ///
    /// Each descriptor becomes one pending work item. Products that are already
    /// pending or in progress are skipped; the returned IDs are the ones actually
    /// queued. Products that already reached a terminal state may be added again.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidDescriptor`] if any descriptor has an empty identifier
    ///   (nothing from the call is queued)
    /// - [`Error::PoolClosed`] after [`shutdown`](Self::shutdown)
    pub async fn add<I>(&self, descriptors: I) -> Result<Vec<ProductId>>
    where
        I: IntoIterator<Item = ProductDescriptor>,
    {
        let items = descriptors
            .into_iter()
            .map(|descriptor| {
                if descriptor.id.as_str().trim().is_empty() {
                    Err(Error::InvalidDescriptor(
                        "product identifier must not be empty".to_string(),
                    ))
                } else {
                    Ok(WorkItem::new(descriptor))
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let submitted = items.len();
        let queued = self.queue.push_new(items).await?;

        for id in &queued {
            self.emit_event(Event::Queued { id: id.clone() });
        }
        tracing::info!(
            submitted,
            queued = queued.len(),
            "Products added to bulk download"
        );

        Ok(queued)
    }

    /// True iff nothing is pending and no worker holds a product
    ///
    /// Every product submitted so far has then reached `Done` or `Failed` and its
    /// outcome is on the done queue. Side-effect free; safe to poll.
    pub async fn is_done(&self) -> bool {
        self.queue.is_done().await
    }

    /// Remove and return the outcomes published so far, in completion order
    pub async fn drain_done(&self) -> Vec<Outcome> {
        self.queue.drain_done().await
    }

    /// Snapshot of the queue sizes
    pub async fn stats(&self) -> PoolStats {
        self.queue.stats().await
    }

    /// Wait until [`is_done`](Self::is_done), checking every `poll`, then drain the done queue
    ///
    /// Returns early with whatever outcomes are available if the downloader is shut
    /// down meanwhile.
    pub async fn run_until_done(&self, poll: Duration) -> Vec<Outcome> {
        let mut outcomes = Vec::new();
        loop {
            outcomes.extend(self.drain_done().await);
            if self.is_done().await {
                outcomes.extend(self.drain_done().await);
                return outcomes;
            }
            tokio::select! {
                _ = tokio::time::sleep(poll) => {}
                _ = self.cancel.cancelled() => return outcomes,
            }
        }
    }
}
