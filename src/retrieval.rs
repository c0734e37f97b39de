//! The retrieval service interface consumed by the bulk downloader
//!
//! The downloader never speaks HTTP itself. It drives products through the four
//! operations below, which are implemented by [`SedasClient`](crate::client::SedasClient)
//! for the real API and by scripted fakes in tests.

use async_trait::async_trait;
use std::path::Path;

use crate::error::RetrievalError;
use crate::types::{ProductDescriptor, RequestHandle};

/// Whether a product can be downloaded right away
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlResolution {
    /// The product is downloadable from this URL
    Ready(String),
    /// The product is archived; an archive request must be issued first
    NeedsArchiveRequest,
}

/// Result of polling an archive request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// The archive request completed and the product is downloadable from this URL
    Ready(String),
    /// Still being restored from the archive
    NotYetReady,
}

/// Operations the bulk downloader needs from the product source
///
/// Implementations classify their failures: [`RetrievalError::Transient`] is retried
/// (bounded by the configured attempts), anything else fails the product immediately.
///
/// # Examples
///
/// ```no_run
/// use async_trait::async_trait;
/// use sedas_dl::error::RetrievalError;
/// use sedas_dl::retrieval::{Readiness, RetrievalService};
/// use sedas_dl::types::{ProductDescriptor, RequestHandle};
/// use std::path::Path;
///
/// struct LocalMirror;
///
/// #[async_trait]
/// impl RetrievalService for LocalMirror {
///     async fn request_archive(
///         &self,
///         descriptor: &ProductDescriptor,
///     ) -> Result<RequestHandle, RetrievalError> {
///         Ok(RequestHandle(descriptor.id.to_string()))
///     }
///
///     async fn poll_ready(&self, handle: &RequestHandle) -> Result<Readiness, RetrievalError> {
///         Ok(Readiness::Ready(format!("/mirror/{}", handle)))
///     }
///
///     async fn transfer(&self, url: &str, destination: &Path) -> Result<u64, RetrievalError> {
///         tokio::fs::copy(url, destination)
///             .await
///             .map_err(|e| RetrievalError::transient(e.to_string()))
///     }
/// }
/// ```
#[async_trait]
pub trait RetrievalService: Send + Sync {
    /// Decide whether the product is immediately downloadable
    ///
    /// The default uses the descriptor's own download URL.
    async fn get_download_url(
        &self,
        descriptor: &ProductDescriptor,
    ) -> Result<UrlResolution, RetrievalError> {
        Ok(match &descriptor.download_url {
            Some(url) if !url.is_empty() => UrlResolution::Ready(url.clone()),
            _ => UrlResolution::NeedsArchiveRequest,
        })
    }

    /// Ask the long-term archive to restore the product
    ///
    /// Fails permanently if the descriptor is invalid or the caller is not authorized.
    async fn request_archive(
        &self,
        descriptor: &ProductDescriptor,
    ) -> Result<RequestHandle, RetrievalError>;

    /// Check whether an archive request has completed
    ///
    /// Fails permanently if the request itself was rejected.
    async fn poll_ready(&self, handle: &RequestHandle) -> Result<Readiness, RetrievalError>;

    /// Download `url` into `destination`, returning the number of bytes written
    ///
    /// The destination file must be complete and closed when this returns `Ok`.
    async fn transfer(&self, url: &str, destination: &Path) -> Result<u64, RetrievalError>;

    /// Get the name of this service (for logging)
    fn name(&self) -> &'static str {
        "retrieval"
    }
}
