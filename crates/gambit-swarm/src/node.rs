//! The swarm transport: topic join/leave, peer connections, framing.

use crate::error::{Result, SwarmError};
use crate::message::PeerMessage;
use crate::peer::{PeerId, PeerInfo};
use crate::rendezvous::Rendezvous;
use async_trait::async_trait;
use gambit_identity::{Keypair, PublicKey};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Default connection limit for a player session.
pub const DEFAULT_PLAYER_MAX_PEERS: usize = 2;

/// Default connection limit for a spectator session.
pub const DEFAULT_SPECTATOR_MAX_PEERS: usize = 10;

/// The interval at which a joined-as-client topic re-polls rendezvous
/// for newly-announced peers.
const DISCOVERY_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Options passed to [`Node::join`].
#[derive(Debug, Clone, Copy)]
pub struct JoinOptions {
    /// Dial peers discovered via rendezvous.
    pub client: bool,
    /// Advertise presence and accept inbound connections.
    pub server: bool,
    /// Maximum simultaneous connections for this topic.
    pub max_peers: usize,
}

impl JoinOptions {
    /// The default options for a two-player game.
    #[must_use]
    pub fn player(client: bool, server: bool) -> Self {
        Self {
            client,
            server,
            max_peers: DEFAULT_PLAYER_MAX_PEERS,
        }
    }

    /// The default options for a read-only spectator.
    #[must_use]
    pub fn spectator() -> Self {
        Self {
            client: true,
            server: false,
            max_peers: DEFAULT_SPECTATOR_MAX_PEERS,
        }
    }
}

/// Callbacks invoked by the swarm as connection and message events occur.
///
/// A small, closed interface — the spec treats these as a fixed
/// capability set rather than an open-ended plugin point.
#[async_trait]
pub trait SwarmCallbacks: Send + Sync {
    /// A peer connected (inbound or outbound) and completed id exchange.
    async fn on_connect(&self, peer_id: PeerId, info: PeerInfo);
    /// A peer disconnected.
    async fn on_disconnect(&self, peer_id: PeerId, reason: String);
    /// A well-formed message arrived from a peer.
    async fn on_message(&self, peer_id: PeerId, message: PeerMessage);
    /// A non-fatal transport error occurred.
    async fn on_error(&self, err: SwarmError);
}

struct PeerHandle {
    outbox: mpsc::UnboundedSender<String>,
}

struct TopicState {
    topic: [u8; 32],
    max_peers: usize,
    connections: Arc<RwLock<HashMap<PeerId, PeerHandle>>>,
    tasks: Vec<JoinHandle<()>>,
}

/// A swarm transport node: one participant's view of at most one joined
/// topic at a time, matching the Session's exclusive ownership of its
/// Swarm subscription.
pub struct Node {
    keypair: Keypair,
    bind_addr: SocketAddr,
    rendezvous: Arc<dyn Rendezvous>,
    callbacks: Arc<dyn SwarmCallbacks>,
    state: Arc<tokio::sync::Mutex<Option<TopicState>>>,
}

impl Node {
    /// Creates a node bound to `bind_addr`, using `rendezvous` for peer
    /// discovery and `callbacks` for connection/message events.
    #[must_use]
    pub fn new(
        keypair: Keypair,
        bind_addr: SocketAddr,
        rendezvous: Arc<dyn Rendezvous>,
        callbacks: Arc<dyn SwarmCallbacks>,
    ) -> Self {
        Self {
            keypair,
            bind_addr,
            rendezvous,
            callbacks,
            state: Arc::new(tokio::sync::Mutex::new(None)),
        }
    }

    /// Returns this node's public key.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        self.keypair.public_key()
    }

    /// Returns this node's peer id.
    #[must_use]
    pub fn peer_id(&self) -> PeerId {
        PeerId::from_public_key(&self.public_key())
    }

    /// Joins `topic`: advertises presence when `server` is set, dials
    /// discovered peers when `client` is set.
    ///
    /// # Errors
    ///
    /// Returns [`SwarmError::TopicJoinFailed`] only if the underlying
    /// network stack is unusable (e.g. the bind address cannot be bound).
    pub async fn join(&self, topic: [u8; 32], options: JoinOptions) -> Result<()> {
        let connections = Arc::new(RwLock::new(HashMap::new()));
        let mut tasks = Vec::new();

        if options.server {
            let listener = TcpListener::bind(self.bind_addr)
                .await
                .map_err(|e| SwarmError::TopicJoinFailed(e.to_string()))?;
            let local_addr = listener
                .local_addr()
                .map_err(|e| SwarmError::TopicJoinFailed(e.to_string()))?;

            self.rendezvous
                .announce(&topic, self.peer_id(), local_addr)
                .await
                .map_err(|e| SwarmError::TopicJoinFailed(e.to_string()))?;

            tasks.push(self.spawn_accept_loop(listener, topic, connections.clone(), options.max_peers));
        }

        if options.client {
            tasks.push(self.spawn_dial_loop(topic, connections.clone(), options.max_peers));
        }

        *self.state.lock().await = Some(TopicState {
            topic,
            max_peers: options.max_peers,
            connections,
            tasks,
        });

        Ok(())
    }

    /// Leaves the currently-joined topic: revokes the advertisement and
    /// closes every open channel.
    pub async fn leave(&self) {
        let mut guard = self.state.lock().await;
        if let Some(topic_state) = guard.take() {
            for task in topic_state.tasks {
                task.abort();
            }
            topic_state.connections.write().clear();
            let _ = self
                .rendezvous
                .revoke(&topic_state.topic, self.peer_id())
                .await;
        }
    }

    /// Sends `message` to a specific peer.
    ///
    /// Best-effort and non-blocking; returns `false` if the peer is no
    /// longer connected.
    pub async fn send(&self, peer_id: PeerId, message: &PeerMessage) -> bool {
        let guard = self.state.lock().await;
        let Some(topic_state) = guard.as_ref() else {
            return false;
        };
        let Ok(line) = serde_json::to_string(message) else {
            return false;
        };
        let connections = topic_state.connections.read();
        match connections.get(&peer_id) {
            Some(handle) => handle.outbox.send(line).is_ok(),
            None => false,
        }
    }

    /// Sends `message` to every connected peer, returning the count sent.
    pub async fn broadcast(&self, message: &PeerMessage) -> usize {
        let guard = self.state.lock().await;
        let Some(topic_state) = guard.as_ref() else {
            return 0;
        };
        let Ok(line) = serde_json::to_string(message) else {
            return 0;
        };
        let connections = topic_state.connections.read();
        connections
            .values()
            .filter(|handle| handle.outbox.send(line.clone()).is_ok())
            .count()
    }

    /// Returns the number of peers currently connected on the joined topic.
    pub async fn peer_count(&self) -> usize {
        let guard = self.state.lock().await;
        guard
            .as_ref()
            .map(|s| s.connections.read().len())
            .unwrap_or(0)
    }

    fn spawn_accept_loop(
        &self,
        listener: TcpListener,
        topic: [u8; 32],
        connections: Arc<RwLock<HashMap<PeerId, PeerHandle>>>,
        max_peers: usize,
    ) -> JoinHandle<()> {
        let local_peer_id = self.peer_id();
        let callbacks = self.callbacks.clone();
        tokio::spawn(async move {
            loop {
                let (stream, addr) = match listener.accept().await {
                    Ok(pair) => pair,
                    Err(e) => {
                        callbacks
                            .on_error(SwarmError::Io(e))
                            .await;
                        continue;
                    }
                };
                if connections.read().len() >= max_peers {
                    drop(stream);
                    continue;
                }
                spawn_connection(
                    stream,
                    addr,
                    topic,
                    local_peer_id,
                    false,
                    connections.clone(),
                    callbacks.clone(),
                );
            }
        })
    }

    fn spawn_dial_loop(
        &self,
        topic: [u8; 32],
        connections: Arc<RwLock<HashMap<PeerId, PeerHandle>>>,
        max_peers: usize,
    ) -> JoinHandle<()> {
        let local_peer_id = self.peer_id();
        let rendezvous = self.rendezvous.clone();
        let callbacks = self.callbacks.clone();
        tokio::spawn(async move {
            loop {
                if connections.read().len() < max_peers {
                    match rendezvous.discover(&topic, local_peer_id).await {
                        Ok(peers) => {
                            for (peer_id, addr) in peers {
                                if connections.read().len() >= max_peers {
                                    break;
                                }
                                if connections.read().contains_key(&peer_id) {
                                    continue;
                                }
                                match TcpStream::connect(addr).await {
                                    Ok(stream) => spawn_connection(
                                        stream,
                                        addr,
                                        topic,
                                        local_peer_id,
                                        true,
                                        connections.clone(),
                                        callbacks.clone(),
                                    ),
                                    Err(e) => callbacks.on_error(SwarmError::Io(e)).await,
                                }
                            }
                        }
                        Err(e) => callbacks.on_error(e).await,
                    }
                }
                tokio::time::sleep(DISCOVERY_POLL_INTERVAL).await;
            }
        })
    }
}

/// Spawns the reader/writer tasks for one accepted or dialed connection.
///
/// Both sides first exchange a single identity line (`"<peer_id hex>\n"`)
/// so the swarm layer can hand `onConnect` a `PeerId` before any
/// application-level handshake message arrives.
fn spawn_connection(
    stream: TcpStream,
    addr: SocketAddr,
    _topic: [u8; 32],
    local_peer_id: PeerId,
    inbound: bool,
    connections: Arc<RwLock<HashMap<PeerId, PeerHandle>>>,
    callbacks: Arc<dyn SwarmCallbacks>,
) {
    tokio::spawn(async move {
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        if write_half
            .write_all(format!("{local_peer_id}\n").as_bytes())
            .await
            .is_err()
        {
            return;
        }

        let mut id_line = String::new();
        if reader.read_line(&mut id_line).await.unwrap_or(0) == 0 {
            return;
        }
        let Ok(remote_peer_id) = PeerId::parse(id_line.trim()) else {
            return;
        };

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        connections
            .write()
            .insert(remote_peer_id, PeerHandle { outbox: tx });

        callbacks
            .on_connect(
                remote_peer_id,
                PeerInfo {
                    address: addr,
                    inbound,
                },
            )
            .await;

        let writer_task = tokio::spawn(async move {
            while let Some(line) = rx.recv().await {
                if write_half.write_all(line.as_bytes()).await.is_err() {
                    break;
                }
                if write_half.write_all(b"\n").await.is_err() {
                    break;
                }
            }
        });

        let mut line = String::new();
        let disconnect_reason = loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => break "connection closed".to_string(),
                Ok(_) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<PeerMessage>(trimmed) {
                        Ok(message) => callbacks.on_message(remote_peer_id, message).await,
                        Err(e) => {
                            tracing::warn!(peer = %remote_peer_id, error = %e, "dropping unparseable frame");
                        }
                    }
                }
                Err(e) => break e.to_string(),
            }
        };

        connections.write().remove(&remote_peer_id);
        writer_task.abort();
        callbacks.on_disconnect(remote_peer_id, disconnect_reason).await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendezvous::FsRendezvous;
    use gambit_identity::Keypair;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    struct RecordingCallbacks {
        connects: AtomicUsize,
        messages: parking_lot::Mutex<Vec<PeerMessage>>,
        notify: Notify,
    }

    impl RecordingCallbacks {
        fn new() -> Self {
            Self {
                connects: AtomicUsize::new(0),
                messages: parking_lot::Mutex::new(Vec::new()),
                notify: Notify::new(),
            }
        }
    }

    #[async_trait]
    impl SwarmCallbacks for RecordingCallbacks {
        async fn on_connect(&self, _peer_id: PeerId, _info: PeerInfo) {
            self.connects.fetch_add(1, Ordering::SeqCst);
            self.notify.notify_waiters();
        }
        async fn on_disconnect(&self, _peer_id: PeerId, _reason: String) {
            self.notify.notify_waiters();
        }
        async fn on_message(&self, _peer_id: PeerId, message: PeerMessage) {
            self.messages.lock().push(message);
            self.notify.notify_waiters();
        }
        async fn on_error(&self, _err: SwarmError) {}
    }

    fn free_addr() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[tokio::test]
    async fn two_nodes_connect_and_exchange_a_message() {
        let dir = tempfile::tempdir().unwrap();
        let rendezvous: Arc<dyn Rendezvous> = Arc::new(FsRendezvous::new(dir.path()));
        let topic = [5u8; 32];

        let host_callbacks = Arc::new(RecordingCallbacks::new());
        let host = Node::new(
            Keypair::generate(),
            free_addr(),
            rendezvous.clone(),
            host_callbacks.clone(),
        );
        host.join(topic, JoinOptions::player(true, true))
            .await
            .unwrap();

        let guest_callbacks = Arc::new(RecordingCallbacks::new());
        let guest = Node::new(
            Keypair::generate(),
            free_addr(),
            rendezvous.clone(),
            guest_callbacks.clone(),
        );
        guest
            .join(topic, JoinOptions::player(true, false))
            .await
            .unwrap();

        // The guest's dial loop polls rendezvous every 2s; give it a
        // few rounds to discover and connect to the host.
        for _ in 0..50 {
            if host.peer_count().await >= 1 && guest.peer_count().await >= 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(host.peer_count().await, 1);
        assert_eq!(guest.peer_count().await, 1);

        let game_id = gambit_types::GameId::from_bytes(&[9u8; 32]).unwrap();
        let msg = PeerMessage::SyncComplete {
            game_id,
            timestamp: 7,
        };
        // From the guest's connection table, the only peer is the host.
        let sent = guest.send(host.peer_id(), &msg).await;
        assert!(sent);

        for _ in 0..50 {
            if !host_callbacks.messages.lock().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert_eq!(host_callbacks.messages.lock().len(), 1);
    }

    #[tokio::test]
    async fn leave_revokes_advertisement() {
        let dir = tempfile::tempdir().unwrap();
        let rendezvous: Arc<dyn Rendezvous> = Arc::new(FsRendezvous::new(dir.path()));
        let topic = [6u8; 32];

        let callbacks = Arc::new(RecordingCallbacks::new());
        let node = Node::new(Keypair::generate(), free_addr(), rendezvous.clone(), callbacks);
        node.join(topic, JoinOptions::player(false, true))
            .await
            .unwrap();
        node.leave().await;

        let discovered = rendezvous
            .discover(&topic, PeerId::from_public_key(&Keypair::generate().public_key()))
            .await
            .unwrap();
        assert!(discovered.is_empty());
    }
}
