//! Worker context: state shared by every worker, plus outcome/event helpers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::retrieval::RetrievalService;
use crate::types::{Event, Outcome, ProductId, WorkItem, WorkStatus};

use super::super::queue::WorkQueue;
use super::state::StateMachine;

/// Shared context for all workers of one bulk downloader.
pub(crate) struct WorkerContext {
    pub(crate) service: Arc<dyn RetrievalService>,
    pub(crate) queue: Arc<WorkQueue>,
    pub(crate) machine: StateMachine,
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    pub(crate) output_dir: PathBuf,
    pub(crate) file_extension: String,
    pub(crate) cancel: CancellationToken,
}

impl WorkerContext {
    pub(crate) fn new(
        service: Arc<dyn RetrievalService>,
        queue: Arc<WorkQueue>,
        config: &Config,
        event_tx: tokio::sync::broadcast::Sender<Event>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            service,
            queue,
            machine: StateMachine::new(config),
            event_tx,
            output_dir: config.output_dir().clone(),
            file_extension: config.download.file_extension.clone(),
            cancel,
        }
    }

    /// Output file for a product
    pub(crate) fn destination_for(&self, id: &ProductId) -> PathBuf {
        self.output_dir.join(id.file_name(&self.file_extension))
    }

    /// Emit an event; having no subscribers is not an error
    pub(crate) fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Publish a terminal item to the done queue and emit the matching event
    pub(crate) async fn finish(&self, item: WorkItem, destination: &Path) {
        let outcome = build_outcome(&item, destination);

        match outcome.status {
            WorkStatus::Done => {
                tracing::info!(
                    product_id = %item.id(),
                    attempts = item.attempt_count,
                    path = %destination.display(),
                    "Product downloaded"
                );
                self.emit(Event::Complete {
                    id: item.id().clone(),
                    path: destination.to_path_buf(),
                });
            }
            _ => {
                let error = outcome.error.clone().unwrap_or_default();
                tracing::error!(
                    product_id = %item.id(),
                    attempts = item.attempt_count,
                    error = %error,
                    "Product failed"
                );
                self.emit(Event::Failed {
                    id: item.id().clone(),
                    error,
                });
            }
        }

        self.queue.complete(outcome).await;
    }
}

fn build_outcome(item: &WorkItem, destination: &Path) -> Outcome {
    let done = item.status == WorkStatus::Done;
    Outcome {
        product_id: item.id().clone(),
        status: if done {
            WorkStatus::Done
        } else {
            WorkStatus::Failed
        },
        path: done.then(|| destination.to_path_buf()),
        attempts: item.attempt_count,
        error: if done {
            None
        } else {
            Some(
                item.last_error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| format!("stopped while {}", item.status)),
            )
        },
        finished_at: chrono::Utc::now(),
    }
}
