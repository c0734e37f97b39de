//! Worker pool: a fixed set of tasks that pull items from the pending queue.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use crate::error::RetrievalError;
use crate::types::{WorkItem, WorkStatus};

use super::download_task::{Disposition, WorkerContext, partial_path, remove_if_exists, run_item};

/// Spawn `count` workers sharing `ctx`
pub(crate) fn start_workers(
    ctx: Arc<WorkerContext>,
    count: usize,
) -> Vec<tokio::task::JoinHandle<()>> {
    (0..count)
        .map(|worker_id| {
            let ctx = Arc::clone(&ctx);
            tokio::spawn(async move { worker_loop(worker_id, ctx).await })
        })
        .collect()
}

/// Take items until shutdown, driving each to a terminal state or back to the queue.
///
/// A failing item never ends the loop: collaborator errors are already folded into
/// the item by the state machine, and a panic inside the collaborator is caught here
/// and recorded as a failed outcome.
async fn worker_loop(worker_id: usize, ctx: Arc<WorkerContext>) {
    tracing::debug!(worker_id, "Worker started");

    while let Some(mut item) = ctx.queue.next(&ctx.cancel).await {
        let destination = ctx.destination_for(item.id());
        tracing::debug!(
            worker_id,
            product_id = %item.id(),
            attempt = item.attempt_count + 1,
            "Worker picked up product"
        );

        let result = AssertUnwindSafe(run_item(&ctx, &mut item, &destination))
            .catch_unwind()
            .await;

        match result {
            Ok(Disposition::Requeue) => ctx.queue.requeue(item).await,
            Ok(Disposition::Finished) => ctx.finish(item, &destination).await,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(
                    worker_id,
                    product_id = %item.id(),
                    panic = %message,
                    "Retrieval service panicked, failing product"
                );
                mark_panicked(&ctx, &mut item, message);
                // the unwind skipped the transfer's own cleanup
                let partial = partial_path(&destination);
                if let Err(cleanup) = remove_if_exists(&partial).await {
                    tracing::warn!(
                        worker_id,
                        path = %partial.display(),
                        error = %cleanup,
                        "Failed to remove partial file after panic"
                    );
                }
                ctx.finish(item, &destination).await;
            }
        }
    }

    tracing::debug!(worker_id, "Worker stopping");
}

fn mark_panicked(ctx: &WorkerContext, item: &mut WorkItem, message: String) {
    ctx.queue
        .track_archive_wait(item.status, WorkStatus::Failed);
    item.status = WorkStatus::Failed;
    item.archive_request = None;
    item.last_error = Some(RetrievalError::Panicked(message));
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
