//! Storage client traits.
//!
//! The file system talks to blob storage through three levels of client,
//! mirroring the storage service's own object model:
//!
//! - [`BlobServiceClient`]: one storage account
//! - [`BlobContainerClient`]: one container of that account
//! - [`BlobClient`]: one blob of that container

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use super::error::StorageResult;
use super::types::{BlobProperties, ListBlobsOptions, ListBlobsPage, TransferOptions};

/// Client for a storage account.
pub trait BlobServiceClient: Send + Sync {
    /// Name of the account this client is connected to.
    fn account_name(&self) -> &str;

    /// Client for a container of this account.
    fn container_client(&self, container: &str) -> StorageResult<Arc<dyn BlobContainerClient>>;
}

/// Client for a container.
#[async_trait]
pub trait BlobContainerClient: Send + Sync {
    /// Client for a blob of this container.
    fn blob_client(&self, blob_name: &str) -> Arc<dyn BlobClient>;

    /// List one page of blobs.
    ///
    /// Callers keep requesting pages with the returned
    /// [`ListBlobsPage::next_page_token`] until it is `None`.
    async fn list_blobs(&self, options: &ListBlobsOptions) -> StorageResult<ListBlobsPage>;
}

/// Client for a single blob.
#[async_trait]
pub trait BlobClient: Send + Sync {
    /// Fetch size and modification time.
    async fn get_properties(&self) -> StorageResult<BlobProperties>;

    /// Download `length` bytes starting at `offset`.
    async fn download_range(
        &self,
        offset: u64,
        length: u64,
        options: TransferOptions,
    ) -> StorageResult<Bytes>;
}

/// A shared service client.
pub type SharedServiceClient = Arc<dyn BlobServiceClient>;
