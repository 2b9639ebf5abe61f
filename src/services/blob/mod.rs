//! Azure Blob Storage file system.
//!
//! This module exposes remote blobs addressed as `azure://...` or `az://...`
//! as seekable, byte-addressable files for a host query engine. Storage access
//! goes through Apache OpenDAL.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  AzureBlobFileSystem                        │
//! │  - open / read / seek / glob / exists                       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Storage context cache (per account)            │
//! │  - lives in the host's ClientContext                        │
//! │  - invalidated when a query ends                            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │              StorageAccountConnector                        │
//! │  - resolves account, endpoint and credentials               │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!              ┌───────────────┴───────────────┐
//!              ▼                               ▼
//! ┌──────────────────────────┐   ┌──────────────────────────┐
//! │  OpenDAL azblob          │   │  OpenDAL memory          │
//! │  (one operator/container)│   │  (development, tests)    │
//! └──────────────────────────┘   └──────────────────────────┘
//! ```
//!
//! Reads are served from a per-handle read-ahead buffer sized by the
//! `azure_read_buffer_size` setting; see [`BlobFileHandle`].

mod azblob;
mod blocking;
mod connector;
mod context;
mod error;
mod filesystem;
pub mod glob;
mod handle;
mod traits;
mod types;
mod url;

pub use azblob::{AzblobCredentials, DEFAULT_ENDPOINT, OpendalServiceClient};
pub use blocking::BlockingBlobFile;
pub use connector::{
    ACCOUNT_KEY_SETTING, ACCOUNT_NAME_SETTING, CONNECTION_STRING_SETTING, ConnectionString,
    ENDPOINT_SETTING, MemoryConnector, SAS_TOKEN_SETTING, SettingsConnector,
    StorageAccountConnector,
};
pub use context::{
    AzureBlobContextState, BUFFER_SIZE_SETTING, CONTEXT_CACHING_SETTING,
    TRANSFER_CHUNK_SIZE_SETTING, TRANSFER_CONCURRENCY_SETTING, get_or_create_storage_context,
    parse_read_options,
};
pub use error::{BlobFsError, ErrorKind, Result, StorageError, StorageResult};
pub use filesystem::AzureBlobFileSystem;
pub use handle::BlobFileHandle;
pub use traits::{BlobClient, BlobContainerClient, BlobServiceClient, SharedServiceClient};
pub use types::{
    AzureReadOptions, BlobItem, BlobProperties, ListBlobsOptions, ListBlobsPage, OpenFlags,
    TransferOptions,
};
pub use url::{AzureParsedUrl, can_handle};
