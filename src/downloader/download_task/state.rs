//! Retrieval state machine: decides what a worker does next for one work item.
//!
//! ```text
//! Pending ──url known──────────────────────────────► Downloading ──ok──► Done
//!    │                                                   ▲    │
//!    └─needs archive─► AwaitingArchive ──ready───────────┘    └─transient, attempts left─► Pending
//!                        │    ▲                                └─otherwise─► Failed
//!                        └────┘ not yet ready
//! ```
//!
//! Any permanent error moves the item straight to `Failed`. The machine performs no
//! I/O; it mutates the item's bookkeeping and returns the next [`Action`].

use std::time::Duration;

use crate::config::{Config, RetryConfig};
use crate::error::RetrievalError;
use crate::retrieval::{Readiness, UrlResolution};
use crate::retry::{IsRetryable, backoff_delay};
use crate::types::{RequestHandle, WorkItem, WorkStatus};

/// What the worker should do next
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Action {
    /// Ask the service whether the product is directly downloadable
    ResolveUrl,
    /// Issue an archive request
    RequestArchive,
    /// Wait `after`, then poll the archive request
    Poll {
        handle: RequestHandle,
        after: Duration,
    },
    /// Transfer the product from `url`
    Transfer { url: String },
    /// Return the item to the pending queue; it may not be transferred before `delay` elapses
    Requeue { delay: Duration },
    /// The item reached `Done` or `Failed`
    Finish,
}

/// What the service answered to the last action
#[derive(Debug, Clone)]
pub(crate) enum Response {
    Resolved(UrlResolution),
    ArchiveRequested(RequestHandle),
    Polled(Readiness),
    Transferred,
    Error(RetrievalError),
}

/// Transition rules, parameterized by the retry and polling configuration
#[derive(Debug, Clone)]
pub(crate) struct StateMachine {
    retry: RetryConfig,
    poll_interval: Duration,
    max_polls: Option<u32>,
}

impl StateMachine {
    pub(crate) fn new(config: &Config) -> Self {
        Self {
            retry: config.retry.clone(),
            poll_interval: config.archive.poll_interval,
            max_polls: config.archive.max_polls,
        }
    }

    /// Begin a retrieval attempt for an item taken from the pending queue
    pub(crate) fn start(&self, item: &mut WorkItem) -> Action {
        if item.status.is_terminal() {
            return Action::Finish;
        }

        item.status = WorkStatus::Pending;
        item.attempt_count += 1;
        item.not_before = None;

        match item.download_url.clone() {
            Some(url) => self.begin_transfer(item, url),
            None => Action::ResolveUrl,
        }
    }

    /// Apply the service's response to the item and pick the next action
    pub(crate) fn advance(&self, item: &mut WorkItem, response: Response) -> Action {
        match (item.status, response) {
            (status, _) if status.is_terminal() => Action::Finish,

            (_, Response::Error(err)) => self.on_error(item, err),

            (WorkStatus::Pending, Response::Resolved(UrlResolution::Ready(url))) => {
                self.begin_transfer(item, url)
            }
            (WorkStatus::Pending, Response::Resolved(UrlResolution::NeedsArchiveRequest)) => {
                Action::RequestArchive
            }
            (WorkStatus::Pending, Response::ArchiveRequested(handle)) => {
                item.status = WorkStatus::AwaitingArchive;
                item.archive_request = Some(handle.clone());
                item.polls = 0;
                item.poll_failures = 0;
                Action::Poll {
                    handle,
                    after: self.poll_interval,
                }
            }

            (WorkStatus::AwaitingArchive, Response::Polled(Readiness::Ready(url))) => {
                item.polls += 1;
                item.poll_failures = 0;
                item.archive_request = None;
                self.begin_transfer(item, url)
            }
            (WorkStatus::AwaitingArchive, Response::Polled(Readiness::NotYetReady)) => {
                item.polls += 1;
                item.poll_failures = 0;
                let Some(handle) = item.archive_request.clone() else {
                    return self.fail(
                        item,
                        RetrievalError::permanent("archive poll without an outstanding request"),
                    );
                };
                match self.max_polls {
                    Some(max) if item.polls >= max => {
                        let err = RetrievalError::ArchiveTimeout {
                            request_id: handle.0,
                            polls: item.polls,
                        };
                        self.fail(item, err)
                    }
                    _ => Action::Poll {
                        handle,
                        after: self.poll_interval,
                    },
                }
            }

            (WorkStatus::Downloading, Response::Transferred) => {
                item.status = WorkStatus::Done;
                Action::Finish
            }

            (status, response) => self.fail(
                item,
                RetrievalError::permanent(format!(
                    "unexpected response {:?} while {}",
                    response, status
                )),
            ),
        }
    }

    /// Fail a non-terminal item because the pool is shutting down
    pub(crate) fn interrupt(&self, item: &mut WorkItem) -> Action {
        if item.status.is_terminal() {
            return Action::Finish;
        }
        self.fail(item, RetrievalError::Interrupted)
    }

    fn begin_transfer(&self, item: &mut WorkItem, url: String) -> Action {
        item.status = WorkStatus::Downloading;
        item.download_url = Some(url.clone());
        Action::Transfer { url }
    }

    fn on_error(&self, item: &mut WorkItem, err: RetrievalError) -> Action {
        if !err.is_retryable() {
            return self.fail(item, err);
        }

        if item.status == WorkStatus::AwaitingArchive {
            // The request stays valid; keep polling unless the poll endpoint keeps failing
            item.poll_failures += 1;
            return match item.archive_request.clone() {
                Some(handle) if item.poll_failures < self.retry.max_attempts => {
                    item.last_error = Some(err);
                    Action::Poll {
                        handle,
                        after: self.poll_interval,
                    }
                }
                _ => self.fail(item, err),
            };
        }

        if item.attempt_count >= self.retry.max_attempts {
            return self.fail(item, err);
        }

        item.status = WorkStatus::Pending;
        item.last_error = Some(err);
        Action::Requeue {
            delay: backoff_delay(&self.retry, item.attempt_count),
        }
    }

    fn fail(&self, item: &mut WorkItem, err: RetrievalError) -> Action {
        item.status = WorkStatus::Failed;
        item.archive_request = None;
        item.last_error = Some(err);
        Action::Finish
    }
}
