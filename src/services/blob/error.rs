//! Error types for the blob file system.
//!
//! Every failure the host sees is a [`BlobFsError`]. Its [`ErrorKind`] tells
//! the host whether to report an I/O failure or an internal usage error.

use thiserror::Error;

/// Category reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Remote storage, URL, configuration or unsupported-operation failures.
    Io,
    /// The host called an operation without the context it requires.
    Internal,
}

/// Errors raised by the blob file system.
#[derive(Error, Debug)]
pub enum BlobFsError {
    #[error(
        "AzureBlobStorageFileSystem {operation} '{path}' failed with code '{code}', Reason Phrase: '{reason}', Message: '{message}'"
    )]
    Storage {
        operation: &'static str,
        path: String,
        code: String,
        reason: String,
        message: String,
    },

    #[error(
        "AzureBlobStorageFileSystem could not {operation} '{path}', unknown error occurred, this could mean the credentials used were wrong. Original error message: '{message}'"
    )]
    Unknown {
        operation: &'static str,
        path: String,
        message: String,
    },

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Invalid Azure URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid value for setting '{key}': {message}")]
    InvalidSetting { key: String, message: String },

    #[error("Read of {length} bytes at offset {offset} is out of range for '{path}' ({file_size} bytes)")]
    OutOfRange {
        path: String,
        offset: u64,
        length: u64,
        file_size: u64,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BlobFsError {
    /// The category this error is reported under.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BlobFsError::Internal(_) => ErrorKind::Internal,
            _ => ErrorKind::Io,
        }
    }

    /// Wrap a failure reported by a storage client.
    ///
    /// Failures that carry a remote error code become [`BlobFsError::Storage`];
    /// everything else is reported as [`BlobFsError::Unknown`].
    pub fn from_storage(operation: &'static str, path: &str, err: StorageError) -> Self {
        if err.code.is_empty() {
            BlobFsError::Unknown {
                operation,
                path: path.to_string(),
                message: err.message,
            }
        } else {
            BlobFsError::Storage {
                operation,
                path: path.to_string(),
                code: err.code,
                reason: err.reason_phrase,
                message: err.message,
            }
        }
    }
}

/// Result type for blob file system operations
pub type Result<T> = std::result::Result<T, BlobFsError>;

/// Failure reported by a storage client (service, container or blob level).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code} ({reason_phrase}): {message}")]
pub struct StorageError {
    /// Remote error code, e.g. `BlobNotFound`. Empty when the failure did not
    /// come from the storage service.
    pub code: String,
    /// HTTP reason phrase accompanying the code.
    pub reason_phrase: String,
    /// Human-readable message.
    pub message: String,
}

impl StorageError {
    pub fn new(code: impl Into<String>, reason_phrase: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            reason_phrase: reason_phrase.into(),
            message: message.into(),
        }
    }

    /// A failure with no storage error code attached.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new("", "", message)
    }
}

impl From<opendal::Error> for StorageError {
    fn from(err: opendal::Error) -> Self {
        use opendal::ErrorKind as K;

        let (code, reason) = match err.kind() {
            K::NotFound => ("BlobNotFound", "The specified blob does not exist."),
            K::PermissionDenied => (
                "AuthorizationPermissionMismatch",
                "This request is not authorized to perform this operation using this permission.",
            ),
            K::RateLimited => ("ServerBusy", "The server is currently unable to receive requests."),
            K::RangeNotSatisfied => ("InvalidRange", "The range specified is invalid for the current size of the resource."),
            K::ConditionNotMatch => ("ConditionNotMet", "The condition specified using HTTP conditional header(s) is not met."),
            K::IsADirectory => ("InvalidResourceName", "The specified resource is a directory."),
            K::ConfigInvalid => ("InvalidConfiguration", "The storage client configuration is invalid."),
            K::Unsupported => ("UnsupportedOperation", "The operation is not supported by the storage service."),
            _ => ("", ""),
        };

        StorageError::new(code, reason, err.to_string())
    }
}

/// Result type for storage client calls
pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_with_code_is_reported_as_storage_failure() {
        let err = BlobFsError::from_storage(
            "open file",
            "az://c/a.csv",
            StorageError::new("BlobNotFound", "Not Found", "missing"),
        );
        assert_eq!(err.kind(), ErrorKind::Io);
        let msg = err.to_string();
        assert!(msg.contains("'BlobNotFound'"));
        assert!(msg.contains("Reason Phrase: 'Not Found'"));
        assert!(msg.contains("Message: 'missing'"));
    }

    #[test]
    fn test_storage_error_without_code_mentions_credentials() {
        let err = BlobFsError::from_storage("open file", "az://c/a.csv", StorageError::unknown("boom"));
        assert!(matches!(err, BlobFsError::Unknown { .. }));
        assert!(err.to_string().contains("credentials"));
    }

    #[test]
    fn test_opendal_not_found_maps_to_blob_not_found() {
        let err: StorageError = opendal::Error::new(opendal::ErrorKind::NotFound, "no such blob").into();
        assert_eq!(err.code, "BlobNotFound");
        assert!(err.message.contains("no such blob"));
    }

    #[test]
    fn test_opendal_unexpected_has_no_code() {
        let err: StorageError = opendal::Error::new(opendal::ErrorKind::Unexpected, "dns failure").into();
        assert!(err.code.is_empty());
    }

    #[test]
    fn test_internal_kind() {
        assert_eq!(BlobFsError::Internal("x".into()).kind(), ErrorKind::Internal);
        assert_eq!(BlobFsError::NotImplemented("x".into()).kind(), ErrorKind::Io);
    }
}
