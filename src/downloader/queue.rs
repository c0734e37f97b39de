//! Pending and done queues shared by the workers.
//!
//! Both queues, the in-flight count and the closed flag live behind one mutex, so
//! every hand-off (pending → worker, worker → pending, worker → done) is a single
//! atomic step. The lock is never held across an await point.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::types::{Outcome, PoolStats, ProductId, WorkItem, WorkStatus};

#[derive(Default)]
struct Queues {
    /// Items waiting for a worker
    pending: VecDeque<WorkItem>,
    /// Number of items currently owned by a worker
    in_flight: usize,
    /// IDs of every item that is pending or in flight
    active: HashSet<ProductId>,
    /// Terminal outcomes in completion order
    done: Vec<Outcome>,
    /// Set by shutdown; rejects further pushes
    closed: bool,
}

/// Thread-safe work queue with ownership hand-off semantics
#[derive(Default)]
pub(crate) struct WorkQueue {
    inner: Mutex<Queues>,
    /// Wakes idle workers when an item is pushed
    available: Notify,
    /// In-flight items currently waiting on an archive request
    awaiting_archive: AtomicUsize,
}

impl WorkQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Enqueue new items, skipping products that are already pending or in flight
    ///
    /// Returns the IDs that were actually enqueued.
    pub(crate) async fn push_new(&self, items: Vec<WorkItem>) -> Result<Vec<ProductId>> {
        let mut queued = Vec::with_capacity(items.len());
        {
            let mut inner = self.inner.lock().await;
            if inner.closed {
                return Err(Error::PoolClosed);
            }
            for item in items {
                if !inner.active.insert(item.id().clone()) {
                    tracing::debug!(
                        product_id = %item.id(),
                        "Product already queued or in progress, skipping"
                    );
                    continue;
                }
                queued.push(item.id().clone());
                inner.pending.push_back(item);
            }
        }

        for _ in &queued {
            self.available.notify_one();
        }
        Ok(queued)
    }

    /// Take the next item that is ready to run, waiting if there is none
    ///
    /// Items requeued with a backoff are skipped until their `not_before` passes.
    /// Returns `None` once `cancel` fires.
    pub(crate) async fn next(&self, cancel: &CancellationToken) -> Option<WorkItem> {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);

            let earliest_retry = {
                let mut inner = self.inner.lock().await;
                if cancel.is_cancelled() {
                    return None;
                }
                let now = Instant::now();
                let ready = inner
                    .pending
                    .iter()
                    .position(|item| item.not_before.is_none_or(|at| at <= now));
                if let Some(item) = ready.and_then(|pos| inner.pending.remove(pos)) {
                    inner.in_flight += 1;
                    return Some(item);
                }
                inner.pending.iter().filter_map(|item| item.not_before).min()
            };

            match earliest_retry {
                Some(deadline) => {
                    tokio::select! {
                        _ = &mut notified => {}
                        _ = tokio::time::sleep_until(deadline) => {}
                        _ = cancel.cancelled() => return None,
                    }
                }
                None => {
                    tokio::select! {
                        _ = &mut notified => {}
                        _ = cancel.cancelled() => return None,
                    }
                }
            }
        }
    }

    /// Return an in-flight item to the pending queue
    pub(crate) async fn requeue(&self, item: WorkItem) {
        {
            let mut inner = self.inner.lock().await;
            inner.in_flight = inner.in_flight.saturating_sub(1);
            if inner.closed {
                // Shutdown discards pending work; keep the bookkeeping consistent
                inner.active.remove(item.id());
                return;
            }
            inner.pending.push_back(item);
        }
        self.available.notify_one();
    }

    /// Publish a terminal outcome for an in-flight item
    ///
    /// The outcome is visible on the done queue in the same step that releases the
    /// in-flight slot, so `is_done()` never reports true before it is drained-visible.
    pub(crate) async fn complete(&self, outcome: Outcome) {
        let mut inner = self.inner.lock().await;
        inner.in_flight = inner.in_flight.saturating_sub(1);
        inner.active.remove(&outcome.product_id);
        if !inner.closed {
            inner.done.push(outcome);
        }
    }

    /// True when nothing is pending and no worker holds an item
    pub(crate) async fn is_done(&self) -> bool {
        let inner = self.inner.lock().await;
        inner.pending.is_empty() && inner.in_flight == 0
    }

    /// Remove and return all outcomes in completion order
    pub(crate) async fn drain_done(&self) -> Vec<Outcome> {
        let mut inner = self.inner.lock().await;
        std::mem::take(&mut inner.done)
    }

    pub(crate) async fn stats(&self) -> PoolStats {
        let inner = self.inner.lock().await;
        PoolStats {
            pending: inner.pending.len(),
            in_flight: inner.in_flight,
            awaiting_archive: self.awaiting_archive.load(Ordering::SeqCst),
            done: inner.done.len(),
        }
    }

    /// Track an in-flight item's move into or out of `AwaitingArchive`
    pub(crate) fn track_archive_wait(&self, before: WorkStatus, after: WorkStatus) {
        match (
            before == WorkStatus::AwaitingArchive,
            after == WorkStatus::AwaitingArchive,
        ) {
            (false, true) => {
                self.awaiting_archive.fetch_add(1, Ordering::SeqCst);
            }
            (true, false) => {
                let _ = self.awaiting_archive.fetch_update(
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                    |n| n.checked_sub(1),
                );
            }
            _ => {}
        }
    }

    /// Reject further pushes. Returns false if the queue was already closed.
    pub(crate) async fn close(&self) -> bool {
        let mut inner = self.inner.lock().await;
        !std::mem::replace(&mut inner.closed, true)
    }

    /// Discard all queued state, returning the number of pending items dropped
    pub(crate) async fn clear(&self) -> usize {
        let mut inner = self.inner.lock().await;
        let dropped = inner.pending.len();
        inner.pending.clear();
        inner.active.clear();
        inner.done.clear();
        inner.in_flight = 0;
        self.awaiting_archive.store(0, Ordering::SeqCst);
        dropped
    }
}
