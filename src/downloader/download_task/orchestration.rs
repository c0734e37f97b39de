//! Item orchestration: drives one work item through the state machine.

use std::path::Path;

use crate::retrieval::Readiness;
use crate::types::{Event, WorkItem};

use super::context::WorkerContext;
use super::state::{Action, Response};
use super::transfer::transfer_to_file;

/// What the worker must do with the item once the state machine stops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    /// Transient failure with attempts left: back to the pending queue
    Requeue,
    /// `Done` or `Failed`: publish to the done queue
    Finished,
}

/// Run the state machine for `item` until it is terminal or must be requeued.
///
/// Every collaborator error is folded into the item's state; nothing escapes as an
/// `Err`. Shutdown is checked between transitions: an item that has not started
/// its transfer yet is failed as interrupted, an in-flight transfer runs to the end.
pub(crate) async fn run_item(
    ctx: &WorkerContext,
    item: &mut WorkItem,
    destination: &Path,
) -> Disposition {
    let mut action = ctx.machine.start(item);

    loop {
        if ctx.cancel.is_cancelled() && action != Action::Finish {
            action = interrupt(ctx, item);
        }

        let response = match action {
            Action::Finish => return Disposition::Finished,

            Action::Requeue { delay } => {
                item.not_before = Some(tokio::time::Instant::now() + delay);
                let error = item
                    .last_error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_default();
                tracing::warn!(
                    product_id = %item.id(),
                    attempt = item.attempt_count,
                    error = %error,
                    delay_ms = delay.as_millis(),
                    "Retrieval failed, requeueing"
                );
                ctx.emit(Event::Retrying {
                    id: item.id().clone(),
                    attempt: item.attempt_count,
                    error,
                    delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                });
                return Disposition::Requeue;
            }

            Action::ResolveUrl => ctx
                .service
                .get_download_url(&item.descriptor)
                .await
                .map(Response::Resolved),

            Action::RequestArchive => {
                tracing::info!(product_id = %item.id(), "Requesting product from long-term archive");
                ctx.service
                    .request_archive(&item.descriptor)
                    .await
                    .map(|handle| {
                        tracing::info!(
                            product_id = %item.id(),
                            request_id = %handle,
                            "Archive request issued"
                        );
                        ctx.emit(Event::ArchiveRequested {
                            id: item.id().clone(),
                            request: handle.clone(),
                        });
                        Response::ArchiveRequested(handle)
                    })
            }

            Action::Poll { handle, after } => {
                let interrupted = tokio::select! {
                    _ = tokio::time::sleep(after) => false,
                    _ = ctx.cancel.cancelled() => true,
                };
                if interrupted {
                    action = interrupt(ctx, item);
                    continue;
                }

                tracing::debug!(
                    product_id = %item.id(),
                    request_id = %handle,
                    polls = item.polls,
                    "Checking archive request"
                );
                let polled = ctx.service.poll_ready(&handle).await;
                if let Ok(Readiness::NotYetReady) = polled {
                    ctx.emit(Event::AwaitingArchive {
                        id: item.id().clone(),
                        polls: item.polls + 1,
                    });
                }
                polled.map(Response::Polled)
            }

            Action::Transfer { url } => {
                tracing::info!(
                    product_id = %item.id(),
                    attempt = item.attempt_count,
                    path = %destination.display(),
                    "Downloading product"
                );
                ctx.emit(Event::Downloading {
                    id: item.id().clone(),
                    attempt: item.attempt_count,
                });
                transfer_to_file(ctx.service.as_ref(), &url, destination)
                    .await
                    .map(|_| Response::Transferred)
            }
        };

        let before = item.status;
        action = ctx
            .machine
            .advance(item, response.unwrap_or_else(Response::Error));
        ctx.queue.track_archive_wait(before, item.status);
    }
}

fn interrupt(ctx: &WorkerContext, item: &mut WorkItem) -> Action {
    tracing::debug!(
        product_id = %item.id(),
        status = %item.status,
        "Interrupting product for shutdown"
    );
    let before = item.status;
    let action = ctx.machine.interrupt(item);
    ctx.queue.track_archive_wait(before, item.status);
    action
}
