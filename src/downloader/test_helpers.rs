//! Shared test helpers: a scripted retrieval service and downloader construction.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use crate::config::Config;
use crate::downloader::BulkDownloader;
use crate::error::RetrievalError;
use crate::retrieval::{Readiness, RetrievalService};
use crate::types::{Outcome, ProductDescriptor, RequestHandle};

const URL_SCHEME: &str = "mock://";
const REQUEST_PREFIX: &str = "req-";

/// How the mock behaves for one product
#[derive(Debug, Clone)]
pub(crate) enum Script {
    /// Archive request succeeds, the first `ready_after` polls report not ready
    Archived { ready_after: u32 },
    /// The archive never finishes restoring
    NeverReady,
    /// `request_archive` fails permanently
    RequestRejected,
    /// `poll_ready` fails permanently
    PollRejected,
    /// `poll_ready` fails transiently `failures` times, then reports ready
    FlakyPoll { failures: u32 },
    /// The first `failures` transfers fail transiently
    FlakyTransfer { failures: u32 },
    /// Every transfer fails transiently
    AlwaysTransient,
    /// Every transfer fails permanently
    TransferRejected,
    /// The transfer panics
    Panic,
}

#[derive(Default)]
struct Calls {
    requests: HashMap<String, u32>,
    polls: HashMap<String, u32>,
    transfers: HashMap<String, u32>,
}

/// Retrieval service driven by per-product scripts
///
/// Products without a script succeed: direct descriptors transfer at once, archived
/// ones are ready at the first poll. Transfers write `payload for <id>` to the
/// destination.
#[derive(Default)]
pub(crate) struct MockRetrieval {
    scripts: HashMap<String, Script>,
    transfer_delay: Duration,
    calls: Mutex<Calls>,
    active_transfers: AtomicUsize,
    max_active_transfers: AtomicUsize,
}

impl MockRetrieval {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_script(mut self, id: &str, script: Script) -> Self {
        self.scripts.insert(id.to_string(), script);
        self
    }

    pub(crate) fn with_transfer_delay(mut self, delay: Duration) -> Self {
        self.transfer_delay = delay;
        self
    }

    pub(crate) fn request_calls(&self, id: &str) -> u32 {
        self.calls.lock().unwrap().requests.get(id).copied().unwrap_or(0)
    }

    pub(crate) fn poll_calls(&self, id: &str) -> u32 {
        self.calls.lock().unwrap().polls.get(id).copied().unwrap_or(0)
    }

    pub(crate) fn transfer_calls(&self, id: &str) -> u32 {
        self.calls
            .lock()
            .unwrap()
            .transfers
            .get(id)
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn max_concurrent_transfers(&self) -> usize {
        self.max_active_transfers.load(Ordering::SeqCst)
    }

    fn script(&self, id: &str) -> Option<&Script> {
        self.scripts.get(id)
    }

    fn bump(map: &mut HashMap<String, u32>, id: &str) -> u32 {
        let count = map.entry(id.to_string()).or_insert(0);
        *count += 1;
        *count
    }
}

struct ActiveTransfer<'a>(&'a AtomicUsize);

impl Drop for ActiveTransfer<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RetrievalService for MockRetrieval {
    async fn request_archive(
        &self,
        descriptor: &ProductDescriptor,
    ) -> Result<RequestHandle, RetrievalError> {
        let id = descriptor.id.as_str();
        Self::bump(&mut self.calls.lock().unwrap().requests, id);

        match self.script(id) {
            Some(Script::RequestRejected) => {
                Err(RetrievalError::permanent("archive request rejected"))
            }
            _ => Ok(RequestHandle(format!("{REQUEST_PREFIX}{id}"))),
        }
    }

    async fn poll_ready(&self, handle: &RequestHandle) -> Result<Readiness, RetrievalError> {
        let id = handle
            .0
            .strip_prefix(REQUEST_PREFIX)
            .ok_or_else(|| RetrievalError::permanent("unknown request"))?;
        let polls = Self::bump(&mut self.calls.lock().unwrap().polls, id);
        let ready = Readiness::Ready(format!("{URL_SCHEME}{id}"));

        match self.script(id) {
            Some(Script::NeverReady) => Ok(Readiness::NotYetReady),
            Some(Script::PollRejected) => Err(RetrievalError::permanent("request expired")),
            Some(Script::Archived { ready_after }) if polls <= *ready_after => {
                Ok(Readiness::NotYetReady)
            }
            Some(Script::FlakyPoll { failures }) if polls <= *failures => {
                Err(RetrievalError::transient("status endpoint unavailable"))
            }
            _ => Ok(ready),
        }
    }

    async fn transfer(&self, url: &str, destination: &Path) -> Result<u64, RetrievalError> {
        let id = url
            .strip_prefix(URL_SCHEME)
            .ok_or_else(|| RetrievalError::permanent(format!("unexpected url {url}")))?;
        let attempt = Self::bump(&mut self.calls.lock().unwrap().transfers, id);

        let now_active = self.active_transfers.fetch_add(1, Ordering::SeqCst) + 1;
        let _active = ActiveTransfer(&self.active_transfers);
        self.max_active_transfers
            .fetch_max(now_active, Ordering::SeqCst);

        if !self.transfer_delay.is_zero() {
            tokio::time::sleep(self.transfer_delay).await;
        }

        match self.script(id) {
            Some(Script::FlakyTransfer { failures }) if attempt <= *failures => {
                return Err(RetrievalError::transient("connection reset"));
            }
            Some(Script::AlwaysTransient) => {
                return Err(RetrievalError::transient("connection reset"));
            }
            Some(Script::TransferRejected) => {
                return Err(RetrievalError::permanent("HTTP 404"));
            }
            Some(Script::Panic) => {
                tokio::fs::write(destination, b"half a payload").await.unwrap();
                panic!("mock transfer exploded for {id}")
            }
            _ => {}
        }

        let payload = format!("payload for {id}");
        tokio::fs::write(destination, &payload)
            .await
            .map_err(|e| RetrievalError::transient(e.to_string()))?;
        Ok(payload.len() as u64)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Descriptor the mock serves directly
pub(crate) fn direct(id: &str) -> ProductDescriptor {
    ProductDescriptor::direct(id, format!("{URL_SCHEME}{id}"))
}

/// Descriptor that needs an archive request
pub(crate) fn archived(id: &str) -> ProductDescriptor {
    ProductDescriptor::archived(id)
}

/// Config with millisecond-scale delays rooted in `dir`
pub(crate) fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.download.output_dir = dir.join("downloads");
    config.download.parallelism = 2;
    config.retry.max_attempts = 3;
    config.retry.initial_delay = Duration::from_millis(10);
    config.retry.max_delay = Duration::from_millis(50);
    config.retry.jitter = false;
    config.archive.poll_interval = Duration::from_millis(10);
    config.monitor.shutdown_timeout = Duration::from_secs(5);
    config
}

/// Create a downloader over `service` with [`test_config`], adjusted by `tweak`.
/// Returns the downloader and the tempdir (which must be kept alive).
pub(crate) async fn create_test_downloader(
    service: Arc<MockRetrieval>,
    tweak: impl FnOnce(&mut Config),
) -> (BulkDownloader, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = test_config(temp_dir.path());
    tweak(&mut config);

    let downloader = BulkDownloader::new(service, config).await.unwrap();
    (downloader, temp_dir)
}

/// Wait for every submitted product to finish, failing the test after 10 seconds
pub(crate) async fn wait_for_outcomes(downloader: &BulkDownloader) -> Vec<Outcome> {
    tokio::time::timeout(
        Duration::from_secs(10),
        downloader.run_until_done(Duration::from_millis(5)),
    )
    .await
    .expect("bulk download did not finish in time")
}

/// Find the outcome for `id`
pub(crate) fn outcome_for<'a>(outcomes: &'a [Outcome], id: &str) -> &'a Outcome {
    outcomes
        .iter()
        .find(|o| o.product_id.as_str() == id)
        .unwrap_or_else(|| panic!("no outcome for {id}"))
}
