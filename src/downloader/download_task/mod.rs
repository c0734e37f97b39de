//! Per-item execution -- the retrieval state machine and the code that drives it.
//!
//! Split into focused submodules:
//! - [`state`] - Pure transition logic (no I/O)
//! - [`context`] - State shared by workers, outcome publishing
//! - [`orchestration`] - Runs one item through the state machine
//! - [`transfer`] - Wraps the service's byte transfer with partial-file handling

mod context;
mod orchestration;
mod state;
mod transfer;

pub(crate) use context::WorkerContext;
pub(crate) use orchestration::{Disposition, run_item};
pub(crate) use transfer::{partial_path, remove_if_exists};
