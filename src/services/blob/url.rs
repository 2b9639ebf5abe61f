//! Azure object path parsing.
//!
//! Two URL shapes are accepted:
//!
//! ```text
//! az://<container>/<path>                               (short form)
//! az://<account>.<endpoint>/<container>/<path>          (fully qualified)
//! ```
//!
//! `azure://` is accepted wherever `az://` is. In the short form the storage
//! account comes from the host's settings or secrets.

use serde::{Deserialize, Serialize};

use super::error::{BlobFsError, Result};

/// Schemes handled by this file system.
pub const SCHEMES: [&str; 2] = ["azure://", "az://"];

/// A parsed `azure://` or `az://` path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzureParsedUrl {
    /// Whether the account and endpoint are part of the URL.
    pub is_fully_qualified: bool,
    /// Scheme including the `//`, e.g. `az://`.
    pub prefix: String,
    /// Storage account name (empty in the short form).
    pub storage_account_name: String,
    /// Endpoint suffix, e.g. `blob.core.windows.net` (empty in the short form).
    pub endpoint: String,
    /// Container name.
    pub container: String,
    /// Object key inside the container, without a leading `/`.
    pub path: String,
}

impl AzureParsedUrl {
    /// Parse an object path.
    pub fn parse(url: &str) -> Result<Self> {
        let prefix = SCHEMES
            .iter()
            .find(|scheme| url.starts_with(**scheme))
            .ok_or_else(|| invalid(url, "URL needs to start with azure:// or az://"))?;

        let rest = &url[prefix.len()..];
        let slash_pos = rest
            .find('/')
            .ok_or_else(|| invalid(url, "URL needs to contain a '/' after the host"))?;
        let host = &rest[..slash_pos];
        let after_host = &rest[slash_pos + 1..];

        let parsed = match host.find('.') {
            Some(dot_pos) => {
                let (container, path) = match after_host.find('/') {
                    Some(pos) => (&after_host[..pos], &after_host[pos + 1..]),
                    None => (after_host, ""),
                };
                if dot_pos == 0 {
                    return Err(invalid(url, "URL needs to contain a storage account name"));
                }
                AzureParsedUrl {
                    is_fully_qualified: true,
                    prefix: prefix.to_string(),
                    storage_account_name: host[..dot_pos].to_string(),
                    endpoint: host[dot_pos + 1..].to_string(),
                    container: container.to_string(),
                    path: path.to_string(),
                }
            }
            None => AzureParsedUrl {
                is_fully_qualified: false,
                prefix: prefix.to_string(),
                storage_account_name: String::new(),
                endpoint: String::new(),
                container: host.to_string(),
                path: after_host.to_string(),
            },
        };

        if parsed.container.is_empty() {
            return Err(invalid(url, "URL needs to contain a container"));
        }

        Ok(parsed)
    }

    /// Prefix that object keys are appended to when rebuilding full URLs.
    pub fn result_prefix(&self) -> String {
        if self.is_fully_qualified {
            format!(
                "{}{}.{}/{}",
                self.prefix, self.storage_account_name, self.endpoint, self.container
            )
        } else {
            format!("{}{}", self.prefix, self.container)
        }
    }

    /// Full URL for a key in the same container.
    pub fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.result_prefix(), key)
    }
}

/// Whether `path` uses one of the schemes this file system handles.
pub fn can_handle(path: &str) -> bool {
    SCHEMES.iter().any(|scheme| path.starts_with(scheme))
}

fn invalid(url: &str, reason: &str) -> BlobFsError {
    BlobFsError::InvalidUrl {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}
