//! Synchronous access for hosts whose readers are blocking.

use std::io::{self, Read, Seek, SeekFrom};

use tokio::runtime::Handle;

use super::error::BlobFsError;
use super::handle::BlobFileHandle;

/// A [`BlobFileHandle`] behind `std::io::Read` and `std::io::Seek`.
///
/// Every call blocks the current thread on `runtime`, so it must not be used
/// from inside an async task of that runtime.
#[derive(Debug)]
pub struct BlockingBlobFile {
    handle: BlobFileHandle,
    runtime: Handle,
}

impl BlockingBlobFile {
    pub fn new(handle: BlobFileHandle, runtime: Handle) -> Self {
        Self { handle, runtime }
    }

    pub fn handle(&self) -> &BlobFileHandle {
        &self.handle
    }

    pub fn into_inner(self) -> BlobFileHandle {
        self.handle
    }

    /// Fill `buf` from `location` without moving past it afterwards.
    pub fn read_exact_at(&mut self, buf: &mut [u8], location: u64) -> io::Result<()> {
        self.runtime
            .block_on(self.handle.read_at(buf, location))
            .map_err(io::Error::from)
    }
}

impl Read for BlockingBlobFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.runtime
            .block_on(self.handle.read(buf))
            .map_err(io::Error::from)
    }
}

impl Seek for BlockingBlobFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.handle.length().checked_add_signed(delta),
            SeekFrom::Current(delta) => self.handle.position().checked_add_signed(delta),
        };

        let target = target.ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid seek before the start of {}", self.handle.path()),
            )
        })?;

        self.handle.seek(target);
        Ok(target)
    }
}

impl From<BlobFsError> for io::Error {
    fn from(err: BlobFsError) -> Self {
        let kind = match &err {
            BlobFsError::Storage { code, .. } if code == "BlobNotFound" => io::ErrorKind::NotFound,
            BlobFsError::Storage { code, .. } if code == "AuthorizationPermissionMismatch" => {
                io::ErrorKind::PermissionDenied
            }
            BlobFsError::NotImplemented(_) => io::ErrorKind::Unsupported,
            BlobFsError::InvalidUrl { .. } | BlobFsError::InvalidSetting { .. } => {
                io::ErrorKind::InvalidInput
            }
            BlobFsError::OutOfRange { .. } => io::ErrorKind::UnexpectedEof,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}
