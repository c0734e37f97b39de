//! Bulk download orchestrator split into focused submodules.
//!
//! The `BulkDownloader` struct and its methods are organized by domain:
//! - [`queue`] - Pending/done queues with atomic ownership hand-off
//! - [`control`] - Caller-facing surface (add, is_done, drain_done, stats)
//! - [`lifecycle`] - Shutdown coordination
//! - [`queue_processor`] - The fixed worker pool
//! - [`download_task`] - Per-item state machine and its driver
//! - [`background_tasks`] - Periodic progress logging

mod background_tasks;
mod control;
mod download_task;
mod lifecycle;
mod queue;
mod queue_processor;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use std::sync::Arc;

use tokio_util::sync::{CancellationToken, DropGuard};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::retrieval::RetrievalService;
use crate::types::Event;

use download_task::WorkerContext;
use queue::WorkQueue;

/// Buffer size of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Bulk downloader instance (cloneable - all fields are Arc-wrapped)
///
/// Owns a fixed pool of workers that pull products from a pending queue, drive each
/// through direct download or archive-request-then-poll-then-download, and publish a
/// terminal [`Outcome`](crate::types::Outcome) per product to the done queue.
///
/// Dropping the last clone without calling [`shutdown`](Self::shutdown) still stops
/// the workers at their next checkpoint.
#[derive(Clone)]
pub struct BulkDownloader {
    /// Retrieval service the workers call into
    pub(crate) service: Arc<dyn RetrievalService>,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Pending queue, in-flight accounting and done queue
    pub(crate) queue: Arc<WorkQueue>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Cancelled by shutdown; observed by workers and the monitor
    pub(crate) cancel: CancellationToken,
    /// Worker and monitor task handles, taken by the first shutdown
    pub(crate) tasks: Arc<tokio::sync::Mutex<Vec<tokio::task::JoinHandle<()>>>>,
    /// Cancelled when the first shutdown completes; later callers wait on it
    pub(crate) stopped: CancellationToken,
    /// Cancels `cancel` once every clone is dropped
    _drop_guard: Arc<DropGuard>,
}

impl BulkDownloader {
    /// Create a new BulkDownloader and start its workers
    ///
    /// This validates the configuration, creates the output directory (unless
    /// `download.create_output_dir` is off) and spawns `download.parallelism`
    /// workers, plus the progress monitor if `monitor.progress_interval` is set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for invalid settings and [`Error::Io`] if the output
    /// directory cannot be created or is missing.
    pub async fn new(service: Arc<dyn RetrievalService>, config: Config) -> Result<Self> {
        config.validate()?;

        let output_dir = config.output_dir();
        if config.download.create_output_dir {
            tokio::fs::create_dir_all(output_dir).await.map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create output directory '{}': {}",
                        output_dir.display(),
                        e
                    ),
                ))
            })?;
        } else if !tokio::fs::try_exists(output_dir).await.unwrap_or(false) {
            return Err(Error::config(
                "download.output_dir",
                format!("output directory '{}' does not exist", output_dir.display()),
            ));
        }

        let (event_tx, _rx) = tokio::sync::broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let queue = Arc::new(WorkQueue::new());
        let config = Arc::new(config);

        let ctx = Arc::new(WorkerContext::new(
            Arc::clone(&service),
            Arc::clone(&queue),
            &config,
            event_tx.clone(),
            cancel.clone(),
        ));

        let mut tasks = queue_processor::start_workers(ctx, config.download.parallelism);
        if let Some(interval) = config.monitor.progress_interval {
            tasks.push(background_tasks::spawn_progress_monitor(
                Arc::clone(&queue),
                interval,
                cancel.clone(),
            ));
        }

        tracing::info!(
            service = service.name(),
            parallelism = config.download.parallelism,
            output_dir = %config.output_dir().display(),
            max_attempts = config.retry.max_attempts,
            poll_interval_secs = config.archive.poll_interval.as_secs(),
            "Bulk downloader started"
        );

        Ok(Self {
            service,
            config,
            queue,
            event_tx,
            _drop_guard: Arc::new(cancel.clone().drop_guard()),
            cancel,
            stopped: CancellationToken::new(),
            tasks: Arc::new(tokio::sync::Mutex::new(tasks)),
        })
    }

    /// Subscribe to bulk download events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    /// A subscriber that falls behind by more than 1000 events receives `RecvError::Lagged`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use sedas_dl::{BulkDownloader, ClientConfig, Config, Event, SedasClient};
    /// use std::sync::Arc;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let client = SedasClient::new(ClientConfig::new("user", "pass"))?;
    ///     let downloader = BulkDownloader::new(Arc::new(client), Config::default()).await?;
    ///
    ///     let mut events = downloader.subscribe();
    ///     tokio::spawn(async move {
    ///         while let Ok(event) = events.recv().await {
    ///             if let Event::Complete { id, path } = event {
    ///                 println!("{} -> {}", id, path.display());
    ///             }
    ///         }
    ///     });
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Emit an event to all subscribers; dropped silently when nobody listens
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
