//! Per-account storage contexts and their session cache.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::connector::StorageAccountConnector;
use super::error::{BlobFsError, Result};
use super::traits::{BlobContainerClient, SharedServiceClient};
use super::types::AzureReadOptions;
use super::url::AzureParsedUrl;
use crate::services::host::{ClientContextState, FileOpener, get_setting};

pub const TRANSFER_CONCURRENCY_SETTING: &str = "azure_read_transfer_concurrency";
pub const TRANSFER_CHUNK_SIZE_SETTING: &str = "azure_read_transfer_chunk_size";
pub const BUFFER_SIZE_SETTING: &str = "azure_read_buffer_size";
pub const CONTEXT_CACHING_SETTING: &str = "azure_context_caching";

/// Connection to one storage account, shared by the handles of a query.
pub struct AzureBlobContextState {
    pub read_options: AzureReadOptions,
    service_client: SharedServiceClient,
    is_valid: AtomicBool,
}

impl AzureBlobContextState {
    pub fn new(service_client: SharedServiceClient, read_options: AzureReadOptions) -> Self {
        Self {
            read_options,
            service_client,
            is_valid: AtomicBool::new(true),
        }
    }

    pub fn container_client(&self, container: &str) -> Result<Arc<dyn BlobContainerClient>> {
        self.service_client
            .container_client(container)
            .map_err(|e| BlobFsError::from_storage("open container", container, e))
    }

    pub fn account_name(&self) -> &str {
        self.service_client.account_name()
    }

    /// False once the query that created this context has ended.
    pub fn is_valid(&self) -> bool {
        self.is_valid.load(Ordering::Acquire)
    }
}

impl ClientContextState for AzureBlobContextState {
    /// Settings and secrets may change between queries, so the next query
    /// reconnects.
    fn query_end(&self) {
        self.is_valid.store(false, Ordering::Release);
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl std::fmt::Debug for AzureBlobContextState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureBlobContextState")
            .field("account", &self.account_name())
            .field("read_options", &self.read_options)
            .field("is_valid", &self.is_valid())
            .finish()
    }
}

/// Read tuning from the host settings, falling back to the defaults.
pub fn parse_read_options(opener: &dyn FileOpener) -> Result<AzureReadOptions> {
    let mut options = AzureReadOptions::default();

    if let Some(concurrency) = get_setting(opener, TRANSFER_CONCURRENCY_SETTING)? {
        options.transfer_concurrency = concurrency;
    }
    if let Some(chunk_size) = get_setting(opener, TRANSFER_CHUNK_SIZE_SETTING)? {
        options.transfer_chunk_size = chunk_size;
    }
    if let Some(buffer_size) = get_setting(opener, BUFFER_SIZE_SETTING)? {
        options.buffer_size = buffer_size;
    }

    Ok(options)
}

/// Registry key of the context for `account`.
fn registry_key(account: &str) -> String {
    format!("azure_blob_context:{}", account)
}

/// Return the cached context for the URL's account, creating it if missing
/// or invalidated by the end of a previous query.
pub async fn get_or_create_storage_context(
    connector: &dyn StorageAccountConnector,
    opener: &dyn FileOpener,
    path: &str,
    parsed_url: &AzureParsedUrl,
) -> Result<Arc<AzureBlobContextState>> {
    let caching = get_setting::<bool>(opener, CONTEXT_CACHING_SETTING)?.unwrap_or(true);
    if !caching {
        return create_storage_context(connector, opener, path, parsed_url).await;
    }

    let client_context = opener.client_context().ok_or_else(|| {
        BlobFsError::Internal("Cannot cache Azure storage contexts without a client context".to_string())
    })?;

    let key = registry_key(&parsed_url.storage_account_name);
    let mut registry = client_context.registered_state().await;

    if let Some(existing) = registry.get(&key).cloned() {
        let state = existing.as_any().downcast::<AzureBlobContextState>().map_err(|_| {
            BlobFsError::Internal(format!("Registered state '{}' is not an Azure storage context", key))
        })?;
        if state.is_valid() {
            tracing::debug!("Reusing storage context for account '{}'", state.account_name());
            return Ok(state);
        }
        tracing::debug!("Storage context for '{}' expired, reconnecting", state.account_name());
    }

    let state = create_storage_context(connector, opener, path, parsed_url).await?;
    registry.insert(key, state.clone());
    Ok(state)
}

/// Build a new context: resolve read options and connect to the account.
pub async fn create_storage_context(
    connector: &dyn StorageAccountConnector,
    opener: &dyn FileOpener,
    path: &str,
    parsed_url: &AzureParsedUrl,
) -> Result<Arc<AzureBlobContextState>> {
    let read_options = parse_read_options(opener)?;
    let service_client = connector.connect(opener, path, parsed_url).await?;
    tracing::debug!(
        "Created storage context for account '{}' ({:?})",
        service_client.account_name(),
        read_options
    );
    Ok(Arc::new(AzureBlobContextState::new(service_client, read_options)))
}
