//! Settings lookup.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, anyhow};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{ClientContext, FileOpener};
use crate::services::blob::{BlobFsError, Result};

/// A setting value as handed over by the host.
pub type SettingValue = Value;

/// Read a typed setting.
///
/// String values are also accepted when their contents parse as the target
/// type, so `"1048576"` works for a byte size and `"false"` for a flag.
pub fn get_setting<T: DeserializeOwned>(opener: &dyn FileOpener, key: &str) -> Result<Option<T>> {
    let Some(value) = opener.try_get_current_setting(key) else {
        return Ok(None);
    };

    let parsed = match serde_json::from_value::<T>(value.clone()) {
        Ok(parsed) => parsed,
        Err(err) => match &value {
            Value::String(s) => serde_json::from_str::<T>(s).map_err(|_| invalid(key, &err))?,
            _ => return Err(invalid(key, &err)),
        },
    };

    Ok(Some(parsed))
}

fn invalid(key: &str, err: &serde_json::Error) -> BlobFsError {
    BlobFsError::InvalidSetting {
        key: key.to_string(),
        message: err.to_string(),
    }
}

/// In-memory [`FileOpener`], optionally loaded from a JSON file.
///
/// Stands in for the host's settings store in the command line tool and in
/// tests.
#[derive(Debug)]
pub struct SettingsFileOpener {
    settings: HashMap<String, Value>,
    client_context: Option<ClientContext>,
}

impl Default for SettingsFileOpener {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsFileOpener {
    /// Opener with no settings and a fresh client context.
    pub fn new() -> Self {
        Self {
            settings: HashMap::new(),
            client_context: Some(ClientContext::new()),
        }
    }

    /// Opener without a client context.
    pub fn without_client_context() -> Self {
        Self {
            settings: HashMap::new(),
            client_context: None,
        }
    }

    /// Load settings from a JSON object file, e.g.
    ///
    /// ```json
    /// { "azure_account_name": "myaccount", "azure_read_buffer_size": 4194304 }
    /// ```
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        let value: Value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings file {}", path.display()))?;

        let Value::Object(map) = value else {
            return Err(anyhow!(
                "Settings file {} must contain a JSON object",
                path.display()
            ));
        };

        let mut opener = Self::new();
        opener.settings.extend(map);
        Ok(opener)
    }

    /// Set a setting, builder style.
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Set a setting.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.settings.insert(key.into(), value.into());
    }
}

impl FileOpener for SettingsFileOpener {
    fn try_get_current_setting(&self, key: &str) -> Option<SettingValue> {
        self.settings.get(key).cloned()
    }

    fn client_context(&self) -> Option<&ClientContext> {
        self.client_context.as_ref()
    }
}
