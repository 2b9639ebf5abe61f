//! Storage clients backed by Apache OpenDAL.
//!
//! Real accounts use OpenDAL's `azblob` service with one operator per
//! container. For development and testing a single operator (typically the
//! in-memory service) can stand in for a whole account, with every container
//! stored under a top-level directory of the same name.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use opendal::layers::LoggingLayer;
use opendal::services::{Azblob, Memory};
use opendal::{EntryMode, Operator};
use url::Url;

use super::error::{StorageError, StorageResult};
use super::traits::{BlobClient, BlobContainerClient, BlobServiceClient};
use super::types::{BlobItem, BlobProperties, ListBlobsOptions, ListBlobsPage, TransferOptions};

/// Default endpoint suffix of Azure public cloud blob accounts.
pub const DEFAULT_ENDPOINT: &str = "blob.core.windows.net";

/// Credentials for the `azblob` service.
#[derive(Clone, Default)]
pub enum AzblobCredentials {
    /// Anonymous access to public containers.
    #[default]
    Anonymous,
    /// Shared account key.
    AccountKey(String),
    /// Shared access signature token.
    SasToken(String),
}

impl std::fmt::Debug for AzblobCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AzblobCredentials::Anonymous => write!(f, "Anonymous"),
            AzblobCredentials::AccountKey(_) => write!(f, "AccountKey(***)"),
            AzblobCredentials::SasToken(_) => write!(f, "SasToken(***)"),
        }
    }
}

#[derive(Debug, Clone)]
enum OperatorSource {
    Azblob {
        endpoint: String,
        credentials: AzblobCredentials,
    },
    Shared(Operator),
}

/// Account-level client handing out OpenDAL-backed container clients.
#[derive(Debug, Clone)]
pub struct OpendalServiceClient {
    account_name: String,
    source: OperatorSource,
}

impl OpendalServiceClient {
    /// Client for an Azure storage account.
    ///
    /// `endpoint` is either a full URL (`https://acct.blob.core.windows.net`)
    /// or an endpoint suffix (`blob.core.windows.net`) that the account name
    /// is prepended to.
    pub fn azblob(
        account_name: impl Into<String>,
        endpoint: &str,
        credentials: AzblobCredentials,
    ) -> StorageResult<Self> {
        let account_name = account_name.into();
        let endpoint = if endpoint.contains("://") {
            endpoint.trim_end_matches('/').to_string()
        } else {
            format!("https://{}.{}", account_name, endpoint)
        };

        Url::parse(&endpoint).map_err(|e| {
            StorageError::new(
                "InvalidUri",
                "The requested URI does not represent any resource on the server.",
                format!("invalid endpoint '{}': {}", endpoint, e),
            )
        })?;

        Ok(Self {
            account_name,
            source: OperatorSource::Azblob {
                endpoint,
                credentials,
            },
        })
    }

    /// Client serving every container from one operator.
    pub fn shared(account_name: impl Into<String>, operator: Operator) -> Self {
        Self {
            account_name: account_name.into(),
            source: OperatorSource::Shared(operator),
        }
    }

    /// Client backed by a fresh in-memory store.
    pub fn memory(account_name: impl Into<String>) -> StorageResult<Self> {
        let operator = Operator::new(Memory::default())?
            .layer(LoggingLayer::default())
            .finish();
        Ok(Self::shared(account_name, operator))
    }

    /// Endpoint URL, for `azblob` clients.
    pub fn endpoint(&self) -> Option<&str> {
        match &self.source {
            OperatorSource::Azblob { endpoint, .. } => Some(endpoint),
            OperatorSource::Shared(_) => None,
        }
    }

    fn build_azblob_operator(
        &self,
        container: &str,
        endpoint: &str,
        credentials: &AzblobCredentials,
    ) -> StorageResult<Operator> {
        let mut builder = Azblob::default()
            .root("/")
            .container(container)
            .endpoint(endpoint)
            .account_name(&self.account_name);

        builder = match credentials {
            AzblobCredentials::Anonymous => builder,
            AzblobCredentials::AccountKey(key) => builder.account_key(key),
            AzblobCredentials::SasToken(token) => builder.sas_token(token),
        };

        let op = Operator::new(builder)?
            .layer(LoggingLayer::default())
            .finish();

        Ok(op)
    }
}

impl BlobServiceClient for OpendalServiceClient {
    fn account_name(&self) -> &str {
        &self.account_name
    }

    fn container_client(&self, container: &str) -> StorageResult<Arc<dyn BlobContainerClient>> {
        let client = match &self.source {
            OperatorSource::Azblob {
                endpoint,
                credentials,
            } => OpendalContainerClient {
                operator: self.build_azblob_operator(container, endpoint, credentials)?,
                root: String::new(),
            },
            OperatorSource::Shared(operator) => OpendalContainerClient {
                operator: operator.clone(),
                root: format!("{}/", container),
            },
        };

        Ok(Arc::new(client))
    }
}

/// Container client over an OpenDAL operator.
#[derive(Debug, Clone)]
pub struct OpendalContainerClient {
    operator: Operator,
    /// Directory of the container inside the operator, empty or ending with `/`.
    root: String,
}

#[async_trait]
impl BlobContainerClient for OpendalContainerClient {
    fn blob_client(&self, blob_name: &str) -> Arc<dyn BlobClient> {
        Arc::new(OpendalBlobClient {
            name: blob_name.to_string(),
            path: format!("{}{}", self.root, blob_name),
            operator: self.operator.clone(),
        })
    }

    /// OpenDAL follows the service's continuation markers inside its lister,
    /// so the whole listing is returned as a single page.
    async fn list_blobs(&self, options: &ListBlobsOptions) -> StorageResult<ListBlobsPage> {
        let full_prefix = format!("{}{}", self.root, options.prefix);
        let dir = match full_prefix.rfind('/') {
            Some(pos) => &full_prefix[..=pos],
            None => "/",
        };

        let mut lister = self.operator.lister_with(dir).recursive(true).await?;
        let mut blobs = Vec::new();

        while let Some(entry) = lister.next().await {
            let entry = entry?;
            if entry.metadata().mode() == EntryMode::DIR {
                continue;
            }
            let path = entry.path().trim_start_matches('/');
            let Some(name) = path.strip_prefix(self.root.as_str()) else {
                continue;
            };
            if !name.starts_with(options.prefix.as_str()) {
                continue;
            }
            blobs.push(BlobItem {
                name: name.to_string(),
            });
        }

        Ok(ListBlobsPage {
            blobs,
            next_page_token: None,
        })
    }
}

/// Blob client over an OpenDAL operator.
#[derive(Debug, Clone)]
pub struct OpendalBlobClient {
    name: String,
    path: String,
    operator: Operator,
}

#[async_trait]
impl BlobClient for OpendalBlobClient {
    async fn get_properties(&self) -> StorageResult<BlobProperties> {
        let metadata = self.operator.stat(&self.path).await?;
        if metadata.mode() == EntryMode::DIR {
            return Err(StorageError::new(
                "BlobNotFound",
                "The specified blob does not exist.",
                format!("'{}' is a directory", self.name),
            ));
        }

        Ok(BlobProperties {
            size: metadata.content_length(),
            last_modified: metadata.last_modified(),
        })
    }

    async fn download_range(
        &self,
        offset: u64,
        length: u64,
        options: TransferOptions,
    ) -> StorageResult<Bytes> {
        if length == 0 {
            return Ok(Bytes::new());
        }

        let mut read = self
            .operator
            .read_with(&self.path)
            .range(offset..offset + length)
            .concurrent(options.concurrency);
        if options.chunk_size > 0 {
            read = read.chunk(options.chunk_size);
        }
        Ok(read.await?.to_bytes())
    }
}
