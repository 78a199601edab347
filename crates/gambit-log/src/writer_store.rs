//! One writer's on-disk, append-only record file.
//!
//! Records are framed as `[u32 LE length][payload]`. On open, the file is
//! read front-to-back; a record whose declared length runs past the end of
//! the file (the `fsync` after a crash-interrupted write never happened)
//! causes the file to be truncated to the end of the last good record and
//! reading to stop there — the interrupted tail is discarded rather than
//! surfaced as an error, matching an append-only log's usual crash-recovery
//! contract.

use crate::error::Result;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

/// Append-only storage for one writer's raw (already-encoded) records.
pub struct WriterStore {
    path: PathBuf,
}

impl WriterStore {
    /// Opens (creating if absent) the writer file at `path`, performing
    /// crash recovery, and returns the store plus the records found.
    pub async fn open(path: impl Into<PathBuf>) -> Result<(Self, Vec<Vec<u8>>)> {
        let path = path.into();
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tokio::fs::write(&path, []).await?;
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        let (records, good_len) = parse_records(&path, &bytes);
        if good_len != bytes.len() as u64 {
            tracing::warn!(
                path = %path.display(),
                good_len,
                file_len = bytes.len(),
                "truncating writer file to last good record"
            );
            let file = OpenOptions::new().write(true).open(&path).await?;
            file.set_len(good_len).await?;
            file.sync_all().await?;
        }

        Ok((Self { path }, records))
    }

    /// Appends one record, fsync'ing before returning so a crash
    /// immediately after this call cannot lose the write.
    pub async fn append(&self, payload: &[u8]) -> Result<()> {
        let mut file = OpenOptions::new().append(true).open(&self.path).await?;
        let len = (payload.len() as u32).to_le_bytes();
        file.write_all(&len).await?;
        file.write_all(payload).await?;
        file.sync_all().await?;
        Ok(())
    }

    /// This writer's on-disk path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn parse_records(path: &Path, bytes: &[u8]) -> (Vec<Vec<u8>>, u64) {
    let mut records = Vec::new();
    let mut pos = 0usize;
    loop {
        if pos == bytes.len() {
            return (records, pos as u64);
        }
        if pos + 4 > bytes.len() {
            tracing::warn!(path = %path.display(), pos, "short length prefix, truncating");
            return (records, pos as u64);
        }
        let len = u32::from_le_bytes(bytes[pos..pos + 4].try_into().unwrap()) as usize;
        let payload_start = pos + 4;
        let payload_end = payload_start + len;
        if payload_end > bytes.len() {
            tracing::warn!(path = %path.display(), pos, len, "short payload, truncating");
            return (records, pos as u64);
        }
        records.push(bytes[payload_start..payload_end].to_vec());
        pos = payload_end;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_then_open_replays_all_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("writer.log");
        let (store, records) = WriterStore::open(&path).await.unwrap();
        assert!(records.is_empty());

        store.append(b"one").await.unwrap();
        store.append(b"two").await.unwrap();

        let (_store2, records) = WriterStore::open(&path).await.unwrap();
        assert_eq!(records, vec![b"one".to_vec(), b"two".to_vec()]);
    }

    #[tokio::test]
    async fn truncated_tail_is_dropped_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("writer.log");
        let (store, _) = WriterStore::open(&path).await.unwrap();
        store.append(b"good").await.unwrap();

        // Simulate a crash mid-write: append a length prefix claiming more
        // payload bytes than actually got flushed to disk.
        let mut raw = tokio::fs::read(&path).await.unwrap();
        raw.extend_from_slice(&100u32.to_le_bytes());
        raw.extend_from_slice(b"partial");
        tokio::fs::write(&path, &raw).await.unwrap();

        let (_store2, records) = WriterStore::open(&path).await.unwrap();
        assert_eq!(records, vec![b"good".to_vec()]);

        let recovered_len = tokio::fs::metadata(&path).await.unwrap().len();
        let expected_len = 4 + 4; // length prefix + "good"
        assert_eq!(recovered_len, expected_len);
    }

    #[tokio::test]
    async fn empty_file_has_no_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("writer.log");
        let (_store, records) = WriterStore::open(&path).await.unwrap();
        assert!(records.is_empty());
    }
}
