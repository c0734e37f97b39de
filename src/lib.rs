//! # sedas-dl
//!
//! Bulk download orchestrator for SeDAS earth-observation products.
//!
//! ## Design Philosophy
//!
//! sedas-dl is designed to be:
//! - **Archive-aware** - Products held in the long-term archive are requested,
//!   polled until restored and then downloaded, without blocking other products
//! - **Bounded** - A fixed pool of workers; transient failures are retried a
//!   configurable number of times with exponential backoff
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events or drain outcomes
//!
//! ## Quick Start
//!
//! ```no_run
//! use chrono::{Duration, Utc};
//! use sedas_dl::{BulkDownloader, ClientConfig, Config, SearchQuery, SedasClient};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Arc::new(SedasClient::new(ClientConfig::new("user", "pass"))?);
//!
//!     let now = Utc::now();
//!     let query = SearchQuery::new("POINT (-0.12 51.5)", now - Duration::days(7), now);
//!     let results = client.search(&query).await?;
//!
//!     let downloader = BulkDownloader::new(client, Config::default()).await?;
//!     downloader.add(results.products).await?;
//!
//!     for outcome in downloader.run_until_done(std::time::Duration::from_secs(5)).await {
//!         println!("{}: {}", outcome.product_id, outcome.status);
//!     }
//!
//!     downloader.shutdown().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// SeDAS REST API client
pub mod client;
/// Configuration types
pub mod config;
/// Bulk download orchestrator (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// Retrieval service interface
pub mod retrieval;
/// Retry logic with exponential backoff
pub mod retry;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use client::{SearchQuery, SearchResponse, SedasClient, Sensor};
pub use config::{ArchiveConfig, ClientConfig, Config, DownloadConfig, MonitorConfig, RetryConfig};
pub use downloader::BulkDownloader;
pub use error::{Error, Result, RetrievalError};
pub use retrieval::{Readiness, RetrievalService, UrlResolution};
pub use types::{
    Event, Outcome, PoolStats, ProductDescriptor, ProductId, RequestHandle, WorkItem, WorkStatus,
};

use std::time::Duration;

/// Run the downloader until every product is finished or a termination signal arrives,
/// then shut it down.
///
/// Returns the outcomes collected before stopping.
///
/// - **Unix:** listens for SIGTERM and SIGINT.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use sedas_dl::{BulkDownloader, ClientConfig, Config, SedasClient, run_with_shutdown};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = SedasClient::new(ClientConfig::new("user", "pass"))?;
///     let downloader = BulkDownloader::new(Arc::new(client), Config::default()).await?;
///
///     let outcomes = run_with_shutdown(downloader, Duration::from_secs(5)).await?;
///     println!("{} products finished", outcomes.len());
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(downloader: BulkDownloader, poll: Duration) -> Result<Vec<Outcome>> {
    let signal = wait_for_signal();
    tokio::pin!(signal);

    let mut outcomes = Vec::new();
    loop {
        outcomes.extend(downloader.drain_done().await);
        if downloader.is_done().await {
            outcomes.extend(downloader.drain_done().await);
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(poll) => {}
            _ = &mut signal => {
                outcomes.extend(downloader.drain_done().await);
                break;
            }
        }
    }

    downloader.shutdown().await?;
    Ok(outcomes)
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C signal"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C signal"),
    }
}
