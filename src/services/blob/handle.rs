//! Open blob handles and their read-ahead buffer.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use super::error::{BlobFsError, Result, StorageError};
use super::traits::BlobClient;
use super::types::{AzureReadOptions, OpenFlags, TransferOptions};

/// An open blob.
///
/// Reads go through a fixed-size read-ahead buffer. The buffer holds the
/// bytes `buffer_start..buffer_end` of the blob; `buffer_idx` is the cursor
/// inside it and `buffer_available` the bytes left after the cursor.
pub struct BlobFileHandle {
    path: String,
    flags: OpenFlags,
    blob_client: Arc<dyn BlobClient>,
    read_options: AzureReadOptions,

    length: u64,
    last_modified: Option<DateTime<Utc>>,

    read_buffer: Vec<u8>,
    buffer_start: u64,
    buffer_end: u64,
    buffer_idx: usize,
    buffer_available: usize,
    file_offset: u64,
}

impl BlobFileHandle {
    /// Open a blob, fetching its properties.
    pub async fn open(
        path: impl Into<String>,
        flags: OpenFlags,
        blob_client: Arc<dyn BlobClient>,
        read_options: AzureReadOptions,
    ) -> Result<Self> {
        let path = path.into();
        let properties = blob_client
            .get_properties()
            .await
            .map_err(|e| BlobFsError::from_storage("open file", &path, e))?;

        let read_buffer = if flags.contains(OpenFlags::READ) {
            vec![0; read_options.buffer_size]
        } else {
            Vec::new()
        };

        tracing::debug!(
            "Opened {} ({} bytes, buffer {} bytes)",
            path,
            properties.size,
            read_buffer.len()
        );

        Ok(Self {
            path,
            flags,
            blob_client,
            read_options,
            length: properties.size,
            last_modified: properties.last_modified,
            read_buffer,
            buffer_start: 0,
            buffer_end: 0,
            buffer_idx: 0,
            buffer_available: 0,
            file_offset: 0,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn flags(&self) -> OpenFlags {
        self.flags
    }

    /// Blob size in bytes, as of opening.
    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.last_modified
    }

    /// Current logical offset.
    pub fn position(&self) -> u64 {
        self.file_offset
    }

    pub fn seek(&mut self, location: u64) {
        self.file_offset = location;
    }

    /// Read from the current offset, at most up to the end of the blob.
    ///
    /// Returns the number of bytes read, `0` at end of file.
    pub async fn read(&mut self, out: &mut [u8]) -> Result<usize> {
        let remaining = self.length.saturating_sub(self.file_offset);
        let nr_bytes = (out.len() as u64).min(remaining) as usize;
        self.read_at(&mut out[..nr_bytes], self.file_offset).await?;
        Ok(nr_bytes)
    }

    /// Fill `out` with the bytes starting at `location`.
    pub async fn read_at(&mut self, out: &mut [u8], location: u64) -> Result<()> {
        let nr_bytes = out.len();
        if nr_bytes > 0 && location.saturating_add(nr_bytes as u64) > self.length {
            return Err(BlobFsError::OutOfRange {
                path: self.path.clone(),
                offset: location,
                length: nr_bytes as u64,
                file_size: self.length,
            });
        }

        if self.flags.contains(OpenFlags::DIRECT_IO) && nr_bytes > 0 {
            let data = self.fetch(location, nr_bytes).await?;
            out.copy_from_slice(&data);
            self.buffer_available = 0;
            self.buffer_idx = 0;
            self.file_offset = location + nr_bytes as u64;
            return Ok(());
        }

        if location >= self.buffer_start && location < self.buffer_end {
            self.file_offset = location;
            self.buffer_idx = (location - self.buffer_start) as usize;
            self.buffer_available = (self.buffer_end - self.buffer_start) as usize - self.buffer_idx;
        } else {
            self.buffer_available = 0;
            self.buffer_idx = 0;
            self.file_offset = location;
        }

        let mut to_read = nr_bytes;
        let mut out_offset = 0;
        while to_read > 0 {
            let buffer_read_len = self.buffer_available.min(to_read);
            if buffer_read_len > 0 {
                debug_assert!(
                    self.buffer_start + (self.buffer_idx + buffer_read_len) as u64 <= self.buffer_end
                );
                out[out_offset..out_offset + buffer_read_len].copy_from_slice(
                    &self.read_buffer[self.buffer_idx..self.buffer_idx + buffer_read_len],
                );

                out_offset += buffer_read_len;
                to_read -= buffer_read_len;

                self.buffer_idx += buffer_read_len;
                self.buffer_available -= buffer_read_len;
                self.file_offset += buffer_read_len as u64;
            }

            if to_read > 0 && self.buffer_available == 0 {
                let new_buffer_available = (self.read_buffer.len() as u64)
                    .min(self.length - self.file_offset) as usize;

                if to_read > new_buffer_available {
                    // Larger than the buffer, fetch straight into the output.
                    tracing::trace!(
                        "{}: bypassing buffer for {} bytes at {}",
                        self.path,
                        to_read,
                        self.file_offset
                    );
                    let data = self.fetch(self.file_offset, to_read).await?;
                    out[out_offset..].copy_from_slice(&data);
                    self.buffer_available = 0;
                    self.buffer_idx = 0;
                    self.file_offset += to_read as u64;
                    break;
                }

                tracing::trace!(
                    "{}: refilling buffer with {} bytes at {}",
                    self.path,
                    new_buffer_available,
                    self.file_offset
                );
                let data = self.fetch(self.file_offset, new_buffer_available).await?;
                self.read_buffer[..new_buffer_available].copy_from_slice(&data);
                self.buffer_available = new_buffer_available;
                self.buffer_idx = 0;
                self.buffer_start = self.file_offset;
                self.buffer_end = self.buffer_start + new_buffer_available as u64;
            }
        }

        Ok(())
    }

    /// Download exactly `length` bytes at `offset`.
    async fn fetch(&self, offset: u64, length: usize) -> Result<Bytes> {
        let data = self
            .blob_client
            .download_range(offset, length as u64, TransferOptions::from(&self.read_options))
            .await
            .map_err(|e| BlobFsError::from_storage("read", &self.path, e))?;

        if data.len() != length {
            return Err(BlobFsError::from_storage(
                "read",
                &self.path,
                StorageError::new(
                    "InvalidRange",
                    "The range specified is invalid for the current size of the resource.",
                    format!(
                        "requested {} bytes at offset {}, received {}",
                        length,
                        offset,
                        data.len()
                    ),
                ),
            ));
        }

        Ok(data)
    }
}

impl std::fmt::Debug for BlobFileHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobFileHandle")
            .field("path", &self.path)
            .field("flags", &self.flags)
            .field("length", &self.length)
            .field("file_offset", &self.file_offset)
            .field("buffer", &(self.buffer_start..self.buffer_end))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::blob::error::StorageResult;
    use crate::services::blob::types::BlobProperties;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Serves ranges of an in-memory blob and records every download.
    struct RecordingBlob {
        data: Bytes,
        downloads: Mutex<Vec<(u64, u64)>>,
        transfers: Mutex<Vec<TransferOptions>>,
    }

    impl RecordingBlob {
        fn new(len: usize) -> Arc<Self> {
            let data: Vec<u8> = (0..len).map(|i| (i * 7 % 251) as u8).collect();
            Arc::new(Self {
                data: Bytes::from(data),
                downloads: Mutex::new(Vec::new()),
                transfers: Mutex::new(Vec::new()),
            })
        }

        fn downloads(&self) -> Vec<(u64, u64)> {
            self.downloads.lock().unwrap().clone()
        }

        fn transfers(&self) -> Vec<TransferOptions> {
            self.transfers.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BlobClient for RecordingBlob {
        async fn get_properties(&self) -> StorageResult<BlobProperties> {
            Ok(BlobProperties {
                size: self.data.len() as u64,
                last_modified: DateTime::from_timestamp(1_700_000_000, 0),
            })
        }

        async fn download_range(
            &self,
            offset: u64,
            length: u64,
            options: TransferOptions,
        ) -> StorageResult<Bytes> {
            self.downloads.lock().unwrap().push((offset, length));
            self.transfers.lock().unwrap().push(options);
            let end = offset + length;
            if end > self.data.len() as u64 {
                return Err(StorageError::new("InvalidRange", "Range Not Satisfiable", "past end"));
            }
            Ok(self.data.slice(offset as usize..end as usize))
        }
    }

    async fn open(blob: &Arc<RecordingBlob>, flags: OpenFlags, buffer_size: usize) -> BlobFileHandle {
        let options = AzureReadOptions {
            buffer_size,
            ..Default::default()
        };
        BlobFileHandle::open("az://c/recorded.bin", flags, blob.clone(), options)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_open_caches_properties() {
        let blob = RecordingBlob::new(100);
        let handle = open(&blob, OpenFlags::READ, 16).await;
        assert_eq!(handle.length(), 100);
        assert_eq!(handle.last_modified().unwrap().timestamp(), 1_700_000_000);
        assert!(blob.downloads().is_empty());
    }

    #[tokio::test]
    async fn test_sequential_reads_refill_buffer_once_per_window() {
        let blob = RecordingBlob::new(100);
        let mut handle = open(&blob, OpenFlags::READ, 16).await;

        let mut out = Vec::new();
        let mut chunk = [0u8; 10];
        loop {
            let n = handle.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
        }

        assert_eq!(out, blob.data.to_vec());
        assert_eq!(
            blob.downloads(),
            vec![(0, 16), (16, 16), (32, 16), (48, 16), (64, 16), (80, 16), (96, 4)]
        );
    }

    #[tokio::test]
    async fn test_large_read_bypasses_buffer() {
        let blob = RecordingBlob::new(100);
        let mut handle = open(&blob, OpenFlags::READ, 16).await;

        let mut out = [0u8; 40];
        handle.read_at(&mut out, 0).await.unwrap();

        assert_eq!(&out[..], &blob.data[..40]);
        assert_eq!(blob.downloads(), vec![(0, 40)]);
        assert_eq!(handle.position(), 40);
    }

    #[tokio::test]
    async fn test_buffer_tail_then_bypass() {
        let blob = RecordingBlob::new(100);
        let mut handle = open(&blob, OpenFlags::READ, 16).await;

        let mut head = [0u8; 10];
        handle.read_at(&mut head, 0).await.unwrap();
        let mut rest = [0u8; 30];
        handle.read_at(&mut rest, 10).await.unwrap();

        assert_eq!(&rest[..], &blob.data[10..40]);
        assert_eq!(blob.downloads(), vec![(0, 16), (16, 24)]);
    }

    #[tokio::test]
    async fn test_backward_read_inside_window_is_served_from_buffer() {
        let blob = RecordingBlob::new(100);
        let mut handle = open(&blob, OpenFlags::READ, 32).await;

        let mut out = [0u8; 4];
        handle.read_at(&mut out, 20).await.unwrap();
        handle.read_at(&mut out, 22).await.unwrap();
        handle.read_at(&mut out, 21).await.unwrap();

        assert_eq!(&out[..], &blob.data[21..25]);
        assert_eq!(blob.downloads(), vec![(20, 32)]);
    }

    #[tokio::test]
    async fn test_direct_io_never_buffers() {
        let blob = RecordingBlob::new(100);
        let mut handle = open(&blob, OpenFlags::READ | OpenFlags::DIRECT_IO, 16).await;

        let mut out = [0u8; 4];
        handle.read_at(&mut out, 0).await.unwrap();
        handle.read_at(&mut out, 4).await.unwrap();

        assert_eq!(&out[..], &blob.data[4..8]);
        assert_eq!(blob.downloads(), vec![(0, 4), (4, 4)]);
        assert_eq!(handle.position(), 8);
    }

    #[tokio::test]
    async fn test_random_access_matches_full_fetch() {
        let blob = RecordingBlob::new(1000);
        let mut handle = open(&blob, OpenFlags::READ, 64).await;

        let mut seed: u64 = 42;
        let mut next = move |bound: u64| {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (seed >> 33) % bound
        };

        for _ in 0..200 {
            let offset = next(1000);
            let len = next(1000 - offset + 1) as usize;
            let mut out = vec![0u8; len];
            handle.read_at(&mut out, offset).await.unwrap();
            assert_eq!(&out[..], &blob.data[offset as usize..offset as usize + len]);
        }
    }

    #[tokio::test]
    async fn test_read_past_end_is_rejected() {
        let blob = RecordingBlob::new(100);
        let mut handle = open(&blob, OpenFlags::READ, 16).await;

        let mut out = [0u8; 10];
        let err = handle.read_at(&mut out, 95).await.unwrap_err();
        assert!(matches!(err, BlobFsError::OutOfRange { .. }));
        assert!(blob.downloads().is_empty());
    }

    #[tokio::test]
    async fn test_sequential_read_clamps_at_end() {
        let blob = RecordingBlob::new(100);
        let mut handle = open(&blob, OpenFlags::READ, 16).await;

        handle.seek(95);
        let mut out = [0u8; 10];
        assert_eq!(handle.read(&mut out).await.unwrap(), 5);
        assert_eq!(&out[..5], &blob.data[95..]);
        assert_eq!(handle.read(&mut out).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_handle_without_read_flag_has_no_buffer() {
        let blob = RecordingBlob::new(100);
        let mut handle = open(&blob, OpenFlags::empty(), 16).await;

        let mut out = [0u8; 4];
        handle.read_at(&mut out, 0).await.unwrap();
        handle.read_at(&mut out, 4).await.unwrap();
        assert_eq!(blob.downloads(), vec![(0, 4), (4, 4)]);
    }

    #[tokio::test]
    async fn test_fetches_carry_transfer_options() {
        let blob = RecordingBlob::new(100);
        let options = AzureReadOptions {
            transfer_concurrency: 3,
            transfer_chunk_size: 4096,
            buffer_size: 16,
        };
        let mut handle = BlobFileHandle::open("az://c/recorded.bin", OpenFlags::READ, blob.clone(), options)
            .await
            .unwrap();

        let mut small = [0u8; 4];
        handle.read_at(&mut small, 0).await.unwrap();
        let mut large = [0u8; 40];
        handle.read_at(&mut large, 50).await.unwrap();

        assert_eq!(blob.downloads(), vec![(0, 16), (50, 40)]);
        let expected = TransferOptions {
            concurrency: 3,
            chunk_size: 4096,
        };
        assert_eq!(blob.transfers(), vec![expected, expected]);
    }

    /// Returns one byte less than requested.
    struct TruncatingBlob {
        data: Bytes,
    }

    #[async_trait]
    impl BlobClient for TruncatingBlob {
        async fn get_properties(&self) -> StorageResult<BlobProperties> {
            Ok(BlobProperties {
                size: self.data.len() as u64,
                last_modified: None,
            })
        }

        async fn download_range(
            &self,
            offset: u64,
            length: u64,
            _options: TransferOptions,
        ) -> StorageResult<Bytes> {
            let end = (offset + length - 1) as usize;
            Ok(self.data.slice(offset as usize..end))
        }
    }

    #[tokio::test]
    async fn test_short_download_is_an_error() {
        let blob = Arc::new(TruncatingBlob {
            data: Bytes::from(vec![7u8; 100]),
        });

        for (flags, len) in [
            (OpenFlags::READ, 4),
            (OpenFlags::READ, 40),
            (OpenFlags::READ | OpenFlags::DIRECT_IO, 4),
        ] {
            let options = AzureReadOptions {
                buffer_size: 16,
                ..Default::default()
            };
            let mut handle = BlobFileHandle::open("az://c/short.bin", flags, blob.clone(), options)
                .await
                .unwrap();

            let mut out = vec![0u8; len];
            let err = handle.read_at(&mut out, 0).await.unwrap_err();
            match err {
                BlobFsError::Storage { code, .. } => assert_eq!(code, "InvalidRange"),
                other => panic!("unexpected error: {:?}", other),
            }
        }
    }
}
