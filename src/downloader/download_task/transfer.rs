//! Transfer adapter: runs the service's byte transfer against a `.part` file.
//!
//! The service writes into `<destination>.part`; only a successful transfer is
//! renamed onto the final name. A failed attempt's partial file is deleted, so
//! content from different attempts never merges.

use std::path::{Path, PathBuf};

use crate::error::RetrievalError;
use crate::retrieval::RetrievalService;

/// Transfer `url` into `destination` through the service
pub(crate) async fn transfer_to_file(
    service: &dyn RetrievalService,
    url: &str,
    destination: &Path,
) -> Result<u64, RetrievalError> {
    let partial = partial_path(destination);
    remove_if_exists(&partial)
        .await
        .map_err(|e| destination_error(&partial, e))?;

    match service.transfer(url, &partial).await {
        Ok(bytes) => {
            tokio::fs::rename(&partial, destination)
                .await
                .map_err(|e| destination_error(destination, e))?;
            tracing::debug!(
                path = %destination.display(),
                bytes,
                "Transfer finished"
            );
            Ok(bytes)
        }
        Err(e) => {
            if let Err(cleanup) = remove_if_exists(&partial).await {
                tracing::warn!(
                    path = %partial.display(),
                    error = %cleanup,
                    "Failed to remove partial file after failed transfer"
                );
            }
            Err(e)
        }
    }
}

/// `<destination>.part`
pub(crate) fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}

pub(crate) async fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn destination_error(path: &Path, err: std::io::Error) -> RetrievalError {
    RetrievalError::Destination {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}
