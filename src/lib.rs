//! Read-only Azure Blob Storage file system for query engines.
//!
//! Host engines register [`AzureBlobFileSystem`] for the `azure://` and
//! `az://` schemes and hand it a [`FileOpener`] giving access to settings and
//! per-session state.

pub mod services;

pub use services::blob::{
    AzureBlobFileSystem, AzureParsedUrl, AzureReadOptions, BlobFileHandle, BlobFsError,
    BlockingBlobFile, ErrorKind, MemoryConnector, OpenFlags, Result, SettingsConnector,
    StorageAccountConnector,
};
pub use services::host::{ClientContext, ClientContextState, FileOpener, SettingsFileOpener};
