//! Topic-keyed peer discovery.
//!
//! The spec models discovery as "find other participants announcing the
//! same topic on a public DHT". No DHT client exists anywhere in this
//! workspace's dependency stack, and a real one can't be exercised
//! without running code, so [`Rendezvous`] abstracts discovery behind a
//! small trait and [`FsRendezvous`] backs it with a shared directory —
//! every participant that can reach the same filesystem path (a local
//! multi-process test, a shared volume) discovers each other by writing
//! and reading small JSON announcement files. Swapping in a real DHT
//! client later means implementing this one trait.

use crate::error::{Result, SwarmError};
use crate::peer::PeerId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Discovers and announces participants for a 32-byte swarm topic.
#[async_trait]
pub trait Rendezvous: Send + Sync {
    /// Advertises this peer's address under `topic`.
    async fn announce(&self, topic: &[u8; 32], peer_id: PeerId, addr: SocketAddr) -> Result<()>;

    /// Returns the currently-announced peers for `topic`, excluding `self_id`.
    async fn discover(&self, topic: &[u8; 32], self_id: PeerId) -> Result<Vec<(PeerId, SocketAddr)>>;

    /// Withdraws this peer's advertisement for `topic`.
    async fn revoke(&self, topic: &[u8; 32], peer_id: PeerId) -> Result<()>;
}

#[derive(Serialize, Deserialize)]
struct Announcement {
    addr: SocketAddr,
}

/// A filesystem-backed [`Rendezvous`]: one directory per topic, one file
/// per announced peer.
#[derive(Debug, Clone)]
pub struct FsRendezvous {
    root: PathBuf,
}

impl FsRendezvous {
    /// Creates a rendezvous backed by `root`, which is created on demand.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn topic_dir(&self, topic: &[u8; 32]) -> PathBuf {
        self.root.join(hex::encode(topic))
    }
}

#[async_trait]
impl Rendezvous for FsRendezvous {
    async fn announce(&self, topic: &[u8; 32], peer_id: PeerId, addr: SocketAddr) -> Result<()> {
        let dir = self.topic_dir(topic);
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(format!("{peer_id}.json"));
        let body = serde_json::to_vec(&Announcement { addr })
            .map_err(|e| SwarmError::Rendezvous(e.to_string()))?;
        tokio::fs::write(path, body).await?;
        Ok(())
    }

    async fn discover(
        &self,
        topic: &[u8; 32],
        self_id: PeerId,
    ) -> Result<Vec<(PeerId, SocketAddr)>> {
        let dir = self.topic_dir(topic);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut peers = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(stem) = file_name.to_str().and_then(|s| s.strip_suffix(".json")) else {
                continue;
            };
            let Ok(peer_id) = PeerId::parse(stem) else {
                continue;
            };
            if peer_id == self_id {
                continue;
            }
            let body = tokio::fs::read(entry.path()).await?;
            let Ok(announcement) = serde_json::from_slice::<Announcement>(&body) else {
                continue;
            };
            peers.push((peer_id, announcement.addr));
        }
        Ok(peers)
    }

    async fn revoke(&self, topic: &[u8; 32], peer_id: PeerId) -> Result<()> {
        let path = self.topic_dir(topic).join(format!("{peer_id}.json"));
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
