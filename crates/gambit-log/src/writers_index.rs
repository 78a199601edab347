//! `writers.json`: authorized writer public keys and their committed lengths.

use crate::error::{LogError, Result};
use gambit_identity::PublicKey;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Clone, Serialize, Deserialize)]
struct WriterRecord {
    public_key: PublicKey,
    committed_length: u64,
}

#[derive(Default, Serialize, Deserialize)]
struct WritersFile {
    writers: Vec<WriterRecord>,
}

/// The on-disk record of which writers are authorized to append to a log,
/// and each writer's last-known committed length — a cache over the
/// per-writer files, rebuilt from them at open if missing or stale.
pub struct WritersIndex {
    path: PathBuf,
    writers: Vec<WriterRecord>,
}

impl WritersIndex {
    /// Loads `writers.json` from `dir`, creating an empty index if absent.
    pub async fn open(dir: &Path) -> Result<Self> {
        let path = dir.join("writers.json");
        let writers = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let file: WritersFile = serde_json::from_slice(&bytes)
                    .map_err(|e| LogError::CorruptIndex(e.to_string()))?;
                file.writers
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        let index = Self { path, writers };
        if !index.path.exists() {
            index.persist().await?;
        }
        Ok(index)
    }

    /// The currently authorized writers, in index order (oldest-authorized first).
    #[must_use]
    pub fn writers(&self) -> Vec<PublicKey> {
        self.writers.iter().map(|w| w.public_key).collect()
    }

    /// Whether `key` is authorized to append.
    #[must_use]
    pub fn contains(&self, key: &PublicKey) -> bool {
        self.writers.iter().any(|w| &w.public_key == key)
    }

    /// The last-known committed length recorded for `key`, or 0 if unknown.
    #[must_use]
    pub fn committed_length(&self, key: &PublicKey) -> u64 {
        self.writers
            .iter()
            .find(|w| &w.public_key == key)
            .map_or(0, |w| w.committed_length)
    }

    /// Authorizes `key`. Returns [`LogError::WriterAlreadyAuthorized`] if it
    /// already is.
    pub async fn add(&mut self, key: PublicKey) -> Result<()> {
        if self.contains(&key) {
            return Err(LogError::WriterAlreadyAuthorized(key.to_string()));
        }
        self.writers.push(WriterRecord {
            public_key: key,
            committed_length: 0,
        });
        self.persist().await
    }

    /// Records that `key` now has `length` committed records, and persists
    /// the updated index.
    pub async fn set_committed_length(&mut self, key: &PublicKey, length: u64) -> Result<()> {
        if let Some(record) = self.writers.iter_mut().find(|w| &w.public_key == key) {
            record.committed_length = length;
        }
        self.persist().await
    }

    async fn persist(&self) -> Result<()> {
        let file = WritersFile {
            writers: self.writers.clone(),
        };
        let body = serde_json::to_vec_pretty(&file)?;
        tokio::fs::write(&self.path, body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gambit_identity::Keypair;

    #[tokio::test]
    async fn fresh_directory_starts_empty_and_persists_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let index = WritersIndex::open(dir.path()).await.unwrap();
        assert!(index.writers().is_empty());
        assert!(dir.path().join("writers.json").exists());
    }

    #[tokio::test]
    async fn add_then_reopen_recovers_the_writer() {
        let dir = tempfile::tempdir().unwrap();
        let key = Keypair::generate().public_key();
        {
            let mut index = WritersIndex::open(dir.path()).await.unwrap();
            index.add(key).await.unwrap();
        }
        let index = WritersIndex::open(dir.path()).await.unwrap();
        assert!(index.contains(&key));
    }

    #[tokio::test]
    async fn adding_twice_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let key = Keypair::generate().public_key();
        let mut index = WritersIndex::open(dir.path()).await.unwrap();
        index.add(key).await.unwrap();
        assert!(index.add(key).await.is_err());
    }

    #[tokio::test]
    async fn committed_length_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let key = Keypair::generate().public_key();
        let mut index = WritersIndex::open(dir.path()).await.unwrap();
        index.add(key).await.unwrap();
        index.set_committed_length(&key, 7).await.unwrap();

        let reopened = WritersIndex::open(dir.path()).await.unwrap();
        assert_eq!(reopened.committed_length(&key), 7);
    }
}
