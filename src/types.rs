//! Core types for sedas-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::RetrievalError;

/// Unique identifier of a product (the SeDAS `supplierId`)
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub String);

impl ProductId {
    /// Create a new ProductId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name for this product: the percent-encoded identifier plus the given extension
    ///
    /// The encoding is injective, so distinct products never share an output file.
    /// Letters, digits, `-`, `_`, `.` and `~` pass through unchanged.
    pub fn file_name(&self, extension: &str) -> String {
        let stem = urlencoding::encode(&self.0);
        let stem = if stem.chars().all(|c| c == '.') {
            stem.replace('.', "%2E")
        } else {
            stem.into_owned()
        };
        format!("{}.{}", stem, extension.trim_start_matches('.'))
    }
}

impl From<&str> for ProductId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ProductId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One retrievable product as returned by the catalog search
///
/// Only the identifier and the optional direct download URL are interpreted by the
/// bulk downloader. Every other field of the search result is kept in `metadata`
/// and passed through untouched to the retrieval service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductDescriptor {
    /// Unique product identifier
    #[serde(rename = "supplierId")]
    pub id: ProductId,

    /// Direct download URL, absent when the product sits in the long-term archive
    #[serde(
        rename = "downloadUrl",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub download_url: Option<String>,

    /// Remaining search-result fields
    #[serde(flatten)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ProductDescriptor {
    /// A descriptor for an archived product (no direct URL)
    pub fn archived(id: impl Into<ProductId>) -> Self {
        Self {
            id: id.into(),
            download_url: None,
            metadata: serde_json::Map::new(),
        }
    }

    /// A descriptor for an immediately downloadable product
    pub fn direct(id: impl Into<ProductId>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            download_url: Some(url.into()),
            metadata: serde_json::Map::new(),
        }
    }
}

/// Handle of an issued long-term-archive request (the SeDAS `requestId`)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestHandle(pub String);

impl std::fmt::Display for RequestHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Retrieval status of a work item
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    /// Waiting for a worker (new, or requeued after a transient failure)
    Pending,
    /// Archive request issued, waiting for the product to become downloadable
    AwaitingArchive,
    /// Transfer in progress
    Downloading,
    /// Product written to the output directory
    Done,
    /// Gave up on the product
    Failed,
}

impl WorkStatus {
    /// Whether no further transitions can leave this status
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkStatus::Done | WorkStatus::Failed)
    }
}

impl std::fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkStatus::Pending => "pending",
            WorkStatus::AwaitingArchive => "awaiting_archive",
            WorkStatus::Downloading => "downloading",
            WorkStatus::Done => "done",
            WorkStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A product descriptor together with its mutable retrieval state
///
/// Owned by exactly one of: the pending queue, a worker, or (as an [`Outcome`]) the done queue.
#[derive(Debug, Clone)]
pub struct WorkItem {
    /// The product being retrieved
    pub descriptor: ProductDescriptor,
    /// Current state machine status
    pub status: WorkStatus,
    /// Number of retrieval attempts started
    pub attempt_count: u32,
    /// Most recent failure, if any
    pub last_error: Option<RetrievalError>,
    /// Outstanding archive request; only set while `AwaitingArchive`
    pub archive_request: Option<RequestHandle>,
    /// URL obtained from the descriptor or an archive request, reused by retries
    pub download_url: Option<String>,
    /// Readiness polls issued against the current archive request
    pub polls: u32,
    /// Consecutive transient poll failures
    pub poll_failures: u32,
    /// Earliest time a requeued item may be transferred again
    pub not_before: Option<tokio::time::Instant>,
}

impl WorkItem {
    /// Wrap a descriptor as a fresh pending item
    pub fn new(descriptor: ProductDescriptor) -> Self {
        Self {
            descriptor,
            status: WorkStatus::Pending,
            attempt_count: 0,
            last_error: None,
            archive_request: None,
            download_url: None,
            polls: 0,
            poll_failures: 0,
            not_before: None,
        }
    }

    /// Identifier of the wrapped product
    pub fn id(&self) -> &ProductId {
        &self.descriptor.id
    }
}

/// Terminal result of one product, as published on the done queue
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    /// The product this outcome belongs to
    pub product_id: ProductId,
    /// Either `Done` or `Failed`
    pub status: WorkStatus,
    /// Where the product was written (set when `Done`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Retrieval attempts consumed
    pub attempts: u32,
    /// Failure reason (set when `Failed`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the product reached its terminal state
    pub finished_at: DateTime<Utc>,
}

impl Outcome {
    /// Whether the product was retrieved successfully
    pub fn is_success(&self) -> bool {
        self.status == WorkStatus::Done
    }
}

/// Event emitted during the bulk download lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Product added to the pending queue
    Queued {
        /// Product ID
        id: ProductId,
    },

    /// Archive request issued for a product without a direct URL
    ArchiveRequested {
        /// Product ID
        id: ProductId,
        /// Archive request handle
        request: RequestHandle,
    },

    /// Readiness poll reported the archive request as not ready yet
    AwaitingArchive {
        /// Product ID
        id: ProductId,
        /// Polls issued so far
        polls: u32,
    },

    /// Transfer started
    Downloading {
        /// Product ID
        id: ProductId,
        /// Attempt number (1-based)
        attempt: u32,
    },

    /// Transient failure, product requeued
    Retrying {
        /// Product ID
        id: ProductId,
        /// Attempt that failed
        attempt: u32,
        /// Failure reason
        error: String,
        /// Backoff before the next transfer
        delay_ms: u64,
    },

    /// Product written successfully
    Complete {
        /// Product ID
        id: ProductId,
        /// Output file
        path: PathBuf,
    },

    /// Product failed permanently or exhausted its attempts
    Failed {
        /// Product ID
        id: ProductId,
        /// Failure reason
        error: String,
    },

    /// Bulk downloader shut down
    Shutdown,
}

/// Snapshot of the pool's queues
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Items waiting for a worker
    pub pending: usize,
    /// Items currently held by a worker
    pub in_flight: usize,
    /// In-flight items waiting on an archive request
    pub awaiting_archive: usize,
    /// Outcomes not yet drained
    pub done: usize,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_deserializes_search_result() {
        let json = r#"{
            "supplierId": "S1B_IW_GRDH_1SDV_20190528T105030",
            "downloadUrl": "https://example.com/S1B.zip",
            "satelliteName": "Sentinel-1B",
            "coverage": 0.92
        }"#;
        let descriptor: ProductDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(descriptor.id.as_str(), "S1B_IW_GRDH_1SDV_20190528T105030");
        assert_eq!(
            descriptor.download_url.as_deref(),
            Some("https://example.com/S1B.zip")
        );
        assert_eq!(descriptor.metadata["satelliteName"], "Sentinel-1B");
        assert!(!descriptor.metadata.contains_key("supplierId"));
    }

    #[test]
    fn test_archived_descriptor_has_no_url() {
        let json = r#"{ "supplierId": "S2A_MSIL1C", "cloudCover": 12 }"#;
        let descriptor: ProductDescriptor = serde_json::from_str(json).unwrap();
        assert!(descriptor.download_url.is_none());

        let back = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(back["supplierId"], "S2A_MSIL1C");
        assert_eq!(back["cloudCover"], 12);
        assert!(back.get("downloadUrl").is_none());
    }

    #[test]
    fn test_file_name_encodes_separators() {
        assert_eq!(
            ProductId::from("S1B_IW_GRDH_1SDV.SAFE").file_name("zip"),
            "S1B_IW_GRDH_1SDV.SAFE.zip"
        );
        assert_eq!(ProductId::from("a/b\\c").file_name(".zip"), "a%2Fb%5Cc.zip");
        assert_eq!(ProductId::from("..").file_name("zip"), "%2E%2E.zip");
    }

    #[test]
    fn test_file_name_is_distinct_per_product() {
        let ids = ["x:1", "x?1", "x_1", "x%3A1", "x/1", ".", "%2E"];
        let names: std::collections::HashSet<String> = ids
            .iter()
            .map(|id| ProductId::from(*id).file_name("zip"))
            .collect();
        assert_eq!(names.len(), ids.len());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(WorkStatus::Done.is_terminal());
        assert!(WorkStatus::Failed.is_terminal());
        assert!(!WorkStatus::Pending.is_terminal());
        assert!(!WorkStatus::AwaitingArchive.is_terminal());
        assert!(!WorkStatus::Downloading.is_terminal());
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = Event::Retrying {
            id: ProductId::from("p1"),
            attempt: 2,
            error: "timeout".to_string(),
            delay_ms: 2000,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "retrying");
        assert_eq!(json["id"], "p1");
        assert_eq!(json["attempt"], 2);
    }

    #[test]
    fn test_new_work_item_is_pending() {
        let item = WorkItem::new(ProductDescriptor::archived("p1"));
        assert_eq!(item.status, WorkStatus::Pending);
        assert_eq!(item.attempt_count, 0);
        assert!(item.archive_request.is_none());
        assert_eq!(item.id().as_str(), "p1");
    }
}
