//! Blob file system types and read configuration.

use bitflags::bitflags;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

bitflags! {
    /// Flags a file is opened with.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpenFlags: u8 {
        /// Open for reading; allocates the read-ahead buffer.
        const READ = 1 << 0;
        /// Open for writing. Not supported by this file system.
        const WRITE = 1 << 1;
        /// Bypass the read-ahead buffer, every read fetches its exact range.
        const DIRECT_IO = 1 << 2;
    }
}

/// Read tuning taken from the host's settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AzureReadOptions {
    /// Number of parallel requests used for one ranged download.
    pub transfer_concurrency: usize,
    /// Size in bytes of each request a ranged download is split into.
    pub transfer_chunk_size: usize,
    /// Size in bytes of the per-handle read-ahead buffer.
    pub buffer_size: usize,
}

impl Default for AzureReadOptions {
    fn default() -> Self {
        Self {
            transfer_concurrency: 5,
            transfer_chunk_size: 1024 * 1024,
            buffer_size: 1024 * 1024,
        }
    }
}

/// Options passed to a ranged download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOptions {
    pub concurrency: usize,
    pub chunk_size: usize,
}

impl From<&AzureReadOptions> for TransferOptions {
    fn from(options: &AzureReadOptions) -> Self {
        Self {
            concurrency: options.transfer_concurrency.max(1),
            chunk_size: options.transfer_chunk_size,
        }
    }
}

/// Properties of a single blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobProperties {
    /// Size in bytes.
    pub size: u64,
    /// Last modification time, if the service reported one.
    pub last_modified: Option<DateTime<Utc>>,
}

/// A blob returned by a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobItem {
    /// Key of the blob inside its container.
    pub name: String,
}

/// Options for one listing request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListBlobsOptions {
    /// Only keys starting with this prefix are returned.
    pub prefix: String,
    /// Token returned by the previous page.
    pub continuation_token: Option<String>,
}

/// One page of a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListBlobsPage {
    pub blobs: Vec<BlobItem>,
    /// Present while more pages remain.
    pub next_page_token: Option<String>,
}
