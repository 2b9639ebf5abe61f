//! The Azure blob file system exposed to the host.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::connector::{SettingsConnector, StorageAccountConnector};
use super::context::get_or_create_storage_context;
use super::error::{BlobFsError, Result};
use super::glob;
use super::handle::BlobFileHandle;
use super::types::{ListBlobsOptions, OpenFlags};
use super::url::{self, AzureParsedUrl};
use crate::services::host::FileOpener;

/// Read-only file system over `azure://` and `az://` paths.
///
/// # Example
///
/// ```ignore
/// use azblobfs::{AzureBlobFileSystem, OpenFlags, SettingsFileOpener};
///
/// let fs = AzureBlobFileSystem::default();
/// let opener = SettingsFileOpener::new().with_setting("azure_account_name", "myaccount");
///
/// for path in fs.glob("az://logs/2024/**/*.csv", Some(&opener)).await? {
///     let mut handle = fs.open_file(&path, OpenFlags::READ, Some(&opener)).await?;
///     let mut header = vec![0; 128];
///     let n = fs.read(&mut handle, &mut header).await?;
/// }
/// ```
#[derive(Clone)]
pub struct AzureBlobFileSystem {
    connector: Arc<dyn StorageAccountConnector>,
}

impl Default for AzureBlobFileSystem {
    fn default() -> Self {
        Self::new(Arc::new(SettingsConnector))
    }
}

impl AzureBlobFileSystem {
    pub fn new(connector: Arc<dyn StorageAccountConnector>) -> Self {
        Self { connector }
    }

    pub fn name(&self) -> &'static str {
        "AzureBlobStorageFileSystem"
    }

    pub fn can_handle_file(&self, path: &str) -> bool {
        url::can_handle(path)
    }

    /// Open a blob for reading.
    pub async fn open_file(
        &self,
        path: &str,
        flags: OpenFlags,
        opener: Option<&dyn FileOpener>,
    ) -> Result<BlobFileHandle> {
        if flags.contains(OpenFlags::WRITE) {
            return Err(BlobFsError::NotImplemented(
                "Writing to Azure containers is currently not supported".to_string(),
            ));
        }

        let opener = opener.ok_or_else(|| {
            BlobFsError::Internal("Cannot do Azure storage CreateHandle without FileOpener".to_string())
        })?;

        let parsed_url = AzureParsedUrl::parse(path)?;
        let context =
            get_or_create_storage_context(self.connector.as_ref(), opener, path, &parsed_url).await?;
        let container = context.container_client(&parsed_url.container)?;
        let blob_client = container.blob_client(&parsed_url.path);

        BlobFileHandle::open(path, flags, blob_client, context.read_options.clone()).await
    }

    pub fn file_size(&self, handle: &BlobFileHandle) -> u64 {
        handle.length()
    }

    pub fn last_modified_time(&self, handle: &BlobFileHandle) -> Option<DateTime<Utc>> {
        handle.last_modified()
    }

    pub fn seek(&self, handle: &mut BlobFileHandle, location: u64) {
        handle.seek(location);
    }

    pub fn seek_position(&self, handle: &BlobFileHandle) -> u64 {
        handle.position()
    }

    /// Sequential read from the handle's current offset.
    pub async fn read(&self, handle: &mut BlobFileHandle, buffer: &mut [u8]) -> Result<usize> {
        handle.read(buffer).await
    }

    /// Positional read filling `buffer` from `location`.
    pub async fn read_at(
        &self,
        handle: &mut BlobFileHandle,
        buffer: &mut [u8],
        location: u64,
    ) -> Result<()> {
        handle.read_at(buffer, location).await
    }

    pub async fn write(
        &self,
        _handle: &mut BlobFileHandle,
        _buffer: &[u8],
        _location: u64,
    ) -> Result<()> {
        Err(BlobFsError::NotImplemented(
            "Writing to Azure containers is currently not supported".to_string(),
        ))
    }

    pub fn file_sync(&self, _handle: &mut BlobFileHandle) -> Result<()> {
        Err(BlobFsError::NotImplemented(
            "FileSync for Azure Storage files not implemented".to_string(),
        ))
    }

    /// Whether `path` names a non-empty blob. Never fails.
    pub async fn file_exists(&self, path: &str, opener: Option<&dyn FileOpener>) -> bool {
        match self.open_file(path, OpenFlags::READ, opener).await {
            Ok(handle) => handle.length() > 0,
            Err(e) => {
                tracing::debug!("{} treated as missing: {}", path, e);
                false
            }
        }
    }

    /// Expand a glob into the full URLs of the matching blobs.
    ///
    /// Patterns without wildcards are returned as-is without contacting the
    /// service.
    pub async fn glob(&self, path: &str, opener: Option<&dyn FileOpener>) -> Result<Vec<String>> {
        let opener = opener.ok_or_else(|| {
            BlobFsError::Internal("Cannot do Azure storage Glob without FileOpener".to_string())
        })?;

        let parsed_url = AzureParsedUrl::parse(path)?;
        let Some(shared_prefix) = glob::shared_prefix(&parsed_url.path) else {
            return Ok(vec![path.to_string()]);
        };

        let context =
            get_or_create_storage_context(self.connector.as_ref(), opener, path, &parsed_url).await?;
        let container = context.container_client(&parsed_url.container)?;

        let pattern: Vec<&str> = parsed_url.path.split('/').collect();
        let mut options = ListBlobsOptions {
            prefix: shared_prefix.to_string(),
            continuation_token: None,
        };
        let mut result = Vec::new();

        loop {
            let page = container
                .list_blobs(&options)
                .await
                .map_err(|e| BlobFsError::from_storage("glob", path, e))?;
            tracing::debug!(
                "Listed {} blobs under '{}' in container '{}'",
                page.blobs.len(),
                options.prefix,
                parsed_url.container
            );

            result.reserve(page.blobs.len());
            for blob in &page.blobs {
                let key: Vec<&str> = blob.name.split('/').collect();
                if glob::match_segments(&key, &pattern) {
                    result.push(parsed_url.object_url(&blob.name));
                }
            }

            match page.next_page_token {
                Some(token) => options.continuation_token = Some(token),
                None => break,
            }
        }

        Ok(result)
    }
}

impl std::fmt::Debug for AzureBlobFileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureBlobFileSystem").finish_non_exhaustive()
    }
}
