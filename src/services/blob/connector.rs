//! Storage account connectors.
//!
//! Resolving credentials for an account is the host's business. The file
//! system asks a [`StorageAccountConnector`] for a service client whenever it
//! needs a new storage context.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use opendal::Operator;
use opendal::layers::LoggingLayer;
use opendal::services::Memory;

use super::azblob::{AzblobCredentials, DEFAULT_ENDPOINT, OpendalServiceClient};
use super::error::{BlobFsError, Result};
use super::traits::SharedServiceClient;
use super::url::AzureParsedUrl;
use crate::services::host::{FileOpener, get_setting};

pub const CONNECTION_STRING_SETTING: &str = "azure_storage_connection_string";
pub const ACCOUNT_NAME_SETTING: &str = "azure_account_name";
pub const ACCOUNT_KEY_SETTING: &str = "azure_account_key";
pub const SAS_TOKEN_SETTING: &str = "azure_sas_token";
pub const ENDPOINT_SETTING: &str = "azure_endpoint";

/// Builds a service client for the account an object path points at.
#[async_trait]
pub trait StorageAccountConnector: Send + Sync {
    async fn connect(
        &self,
        opener: &dyn FileOpener,
        path: &str,
        parsed_url: &AzureParsedUrl,
    ) -> Result<SharedServiceClient>;
}

/// Parsed `Key=Value;...` storage connection string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionString {
    pub account_name: Option<String>,
    pub account_key: Option<String>,
    pub sas_token: Option<String>,
    pub blob_endpoint: Option<String>,
}

impl ConnectionString {
    pub fn parse(s: &str) -> Result<Self> {
        let mut fields = HashMap::new();
        for part in s.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = part.split_once('=').ok_or_else(|| BlobFsError::InvalidSetting {
                key: CONNECTION_STRING_SETTING.to_string(),
                message: format!("malformed entry '{}'", part.split('=').next().unwrap_or(part)),
            })?;
            fields.insert(key.trim(), value.trim());
        }

        let account_name = fields.get("AccountName").map(|v| v.to_string());
        let blob_endpoint = match (fields.get("BlobEndpoint"), fields.get("EndpointSuffix")) {
            (Some(endpoint), _) => Some(endpoint.to_string()),
            (None, Some(suffix)) => account_name.as_ref().map(|account| {
                let protocol = fields.get("DefaultEndpointsProtocol").copied().unwrap_or("https");
                format!("{}://{}.blob.{}", protocol, account, suffix)
            }),
            (None, None) => None,
        };

        Ok(Self {
            account_name,
            account_key: fields.get("AccountKey").map(|v| v.to_string()),
            sas_token: fields.get("SharedAccessSignature").map(|v| v.to_string()),
            blob_endpoint,
        })
    }
}

/// Connector resolving accounts and credentials from host settings.
///
/// Resolution order for each piece:
///
/// - account: the URL when fully qualified, `azure_account_name`, then the
///   connection string
/// - endpoint: the URL when fully qualified, `azure_endpoint`, the connection
///   string, then the public cloud default
/// - credentials: `azure_account_key`, `azure_sas_token`, the connection
///   string, otherwise anonymous
#[derive(Debug, Default, Clone, Copy)]
pub struct SettingsConnector;

#[async_trait]
impl StorageAccountConnector for SettingsConnector {
    async fn connect(
        &self,
        opener: &dyn FileOpener,
        path: &str,
        parsed_url: &AzureParsedUrl,
    ) -> Result<SharedServiceClient> {
        let connection_string = get_setting::<String>(opener, CONNECTION_STRING_SETTING)?
            .map(|s| ConnectionString::parse(&s))
            .transpose()?
            .unwrap_or_default();

        let account_name = if parsed_url.is_fully_qualified {
            Some(parsed_url.storage_account_name.clone())
        } else {
            get_setting::<String>(opener, ACCOUNT_NAME_SETTING)?.or(connection_string.account_name.clone())
        };
        let account_name = account_name.filter(|a| !a.is_empty()).ok_or_else(|| {
            BlobFsError::InvalidSetting {
                key: ACCOUNT_NAME_SETTING.to_string(),
                message: format!(
                    "no storage account for '{}', set it or use a fully qualified URL",
                    path
                ),
            }
        })?;

        let endpoint = if parsed_url.is_fully_qualified {
            parsed_url.endpoint.clone()
        } else {
            get_setting::<String>(opener, ENDPOINT_SETTING)?
                .or(connection_string.blob_endpoint.clone())
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
        };

        let credentials = if let Some(key) = get_setting::<String>(opener, ACCOUNT_KEY_SETTING)? {
            AzblobCredentials::AccountKey(key)
        } else if let Some(token) = get_setting::<String>(opener, SAS_TOKEN_SETTING)? {
            AzblobCredentials::SasToken(token)
        } else if let Some(key) = connection_string.account_key {
            AzblobCredentials::AccountKey(key)
        } else if let Some(token) = connection_string.sas_token {
            AzblobCredentials::SasToken(token)
        } else {
            AzblobCredentials::Anonymous
        };

        tracing::debug!(
            "Connecting to storage account '{}' at '{}' for {}",
            account_name,
            endpoint,
            path
        );

        let client = OpendalServiceClient::azblob(account_name, &endpoint, credentials)
            .map_err(|e| BlobFsError::from_storage("connect to account for", path, e))?;
        Ok(Arc::new(client))
    }
}

/// Connector serving every account from one in-memory store.
///
/// Containers live under top-level directories of [`MemoryConnector::operator`].
#[derive(Debug)]
pub struct MemoryConnector {
    operator: Operator,
    connects: AtomicUsize,
}

impl MemoryConnector {
    pub fn new() -> Result<Self> {
        let operator = Operator::new(Memory::default())
            .map_err(|e| BlobFsError::from_storage("create", "memory store", e.into()))?
            .layer(LoggingLayer::default())
            .finish();

        Ok(Self {
            operator,
            connects: AtomicUsize::new(0),
        })
    }

    /// The backing store, for seeding blobs as `<container>/<key>`.
    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    /// Number of service clients handed out so far.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageAccountConnector for MemoryConnector {
    async fn connect(
        &self,
        _opener: &dyn FileOpener,
        _path: &str,
        parsed_url: &AzureParsedUrl,
    ) -> Result<SharedServiceClient> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let account = if parsed_url.storage_account_name.is_empty() {
            "memory"
        } else {
            parsed_url.storage_account_name.as_str()
        };
        Ok(Arc::new(OpendalServiceClient::shared(account, self.operator.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::host::SettingsFileOpener;

    #[test]
    fn test_parse_connection_string() {
        let cs = ConnectionString::parse(
            "DefaultEndpointsProtocol=https;AccountName=acct;AccountKey=a2V5==;EndpointSuffix=core.windows.net",
        )
        .unwrap();
        assert_eq!(cs.account_name.as_deref(), Some("acct"));
        assert_eq!(cs.account_key.as_deref(), Some("a2V5=="));
        assert_eq!(cs.blob_endpoint.as_deref(), Some("https://acct.blob.core.windows.net"));
        assert_eq!(cs.sas_token, None);
    }

    #[test]
    fn test_parse_connection_string_with_blob_endpoint() {
        let cs = ConnectionString::parse(
            "BlobEndpoint=http://127.0.0.1:10000/devstoreaccount1;SharedAccessSignature=sv=2022&sig=abc;",
        )
        .unwrap();
        assert_eq!(cs.blob_endpoint.as_deref(), Some("http://127.0.0.1:10000/devstoreaccount1"));
        assert_eq!(cs.sas_token.as_deref(), Some("sv=2022&sig=abc"));
    }

    #[test]
    fn test_parse_connection_string_rejects_garbage() {
        assert!(ConnectionString::parse("AccountName").is_err());
    }

    #[tokio::test]
    async fn test_settings_connector_fully_qualified() {
        let opener = SettingsFileOpener::new();
        let url = AzureParsedUrl::parse("az://acct.blob.core.windows.net/c/k").unwrap();

        let client = SettingsConnector.connect(&opener, "az://...", &url).await.unwrap();
        assert_eq!(client.account_name(), "acct");
    }

    #[tokio::test]
    async fn test_settings_connector_account_from_settings() {
        let opener = SettingsFileOpener::new()
            .with_setting(ACCOUNT_NAME_SETTING, "fromsettings")
            .with_setting(SAS_TOKEN_SETTING, "sv=1&sig=x");
        let url = AzureParsedUrl::parse("az://c/k").unwrap();

        let client = SettingsConnector.connect(&opener, "az://c/k", &url).await.unwrap();
        assert_eq!(client.account_name(), "fromsettings");
    }

    #[tokio::test]
    async fn test_settings_connector_requires_account() {
        let opener = SettingsFileOpener::new();
        let url = AzureParsedUrl::parse("az://c/k").unwrap();

        let err = SettingsConnector.connect(&opener, "az://c/k", &url).await.err().unwrap();
        assert!(matches!(err, BlobFsError::InvalidSetting { .. }));
    }

    #[tokio::test]
    async fn test_memory_connector_counts_connects() {
        let connector = MemoryConnector::new().unwrap();
        let opener = SettingsFileOpener::new();
        let url = AzureParsedUrl::parse("az://c/k").unwrap();

        connector.connect(&opener, "az://c/k", &url).await.unwrap();
        connector.connect(&opener, "az://c/k", &url).await.unwrap();
        assert_eq!(connector.connect_count(), 2);
    }
}
