//! Read-only game viewing.
//!
//! A spectator never authorizes a writer or appends to a log — it has no
//! use for [`gambit_log`] at all. It just accumulates the moves it is
//! shown over the swarm into an in-memory history, deduped the same way
//! a [`crate::Session`] dedups its fast/slow sync paths.

use crate::callbacks::SessionCallbacks;
use crate::error::{Result, SessionError};
use crate::rules::{CachedFenRules, ChessRules, STANDARD_START_FEN};
use gambit_identity::Keypair;
use gambit_swarm::{JoinOptions, Node, PeerId, PeerInfo, PeerMessage, Rendezvous, SwarmCallbacks, SwarmError};
use gambit_types::{GameId, InviteCode, Move, PlayerColor};
use parking_lot::RwLock as SyncRwLock;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Notify;

/// How long a spectator waits for a `full_game_sync` before giving up and
/// watching live moves only.
pub const FULL_SYNC_TIMEOUT: Duration = Duration::from_secs(30);

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Parameters for connecting as a spectator.
pub struct SpectatorConnectOptions {
    /// The invite code of the game to watch.
    pub invite_code: InviteCode,
    /// Local address to bind the swarm listener to.
    pub bind_addr: SocketAddr,
    /// Peer-discovery backend.
    pub rendezvous: Arc<dyn Rendezvous>,
    /// This node's identity (spectators still need one to join the swarm).
    pub keypair: Keypair,
}

struct Hooks {
    session: SyncRwLock<Weak<SpectatorSession>>,
}

impl Hooks {
    fn new() -> Self {
        Self {
            session: SyncRwLock::new(Weak::new()),
        }
    }

    fn bind(&self, session: &Arc<SpectatorSession>) {
        *self.session.write() = Arc::downgrade(session);
    }

    fn session(&self) -> Option<Arc<SpectatorSession>> {
        self.session.read().upgrade()
    }
}

#[async_trait::async_trait]
impl SwarmCallbacks for Hooks {
    async fn on_connect(&self, peer_id: PeerId, info: PeerInfo) {
        if let Some(session) = self.session() {
            session.handle_connect(peer_id, info).await;
        }
    }

    async fn on_disconnect(&self, peer_id: PeerId, reason: String) {
        if let Some(session) = self.session() {
            session.callbacks.on_connection_change(peer_id, &reason).await;
        }
    }

    async fn on_message(&self, peer_id: PeerId, message: PeerMessage) {
        if let Some(session) = self.session() {
            session.handle_message(peer_id, message).await;
        }
    }

    async fn on_error(&self, err: SwarmError) {
        if let Some(session) = self.session() {
            tracing::warn!(error = %err, "swarm transport error");
            session
                .callbacks
                .on_error(&SessionError::TransportTransient(err.to_string()))
                .await;
        }
    }
}

/// A read-only, spectator-side view of a game in progress.
pub struct SpectatorSession {
    game_id: GameId,
    invite_code: InviteCode,
    node: Node,
    callbacks: Arc<dyn SessionCallbacks>,
    rules: Arc<dyn ChessRules>,
    history: SyncRwLock<Vec<Move>>,
    seen: SyncRwLock<HashSet<(u64, String, String, PlayerColor)>>,
    fen: SyncRwLock<String>,
    /// The ply the viewer is currently looking at, independent of the
    /// live tip — `0..=total_moves()`. Auto-advances with live moves only
    /// while it is sitting at the tip; scrubbing back leaves it behind.
    position: AtomicUsize,
    got_full_sync: AtomicBool,
    full_sync: Notify,
}

impl SpectatorSession {
    /// Joins the swarm topic for `options.invite_code` as a spectator,
    /// waiting up to [`FULL_SYNC_TIMEOUT`] for a `full_game_sync` before
    /// returning with whatever history has arrived (possibly none, if
    /// the game started before this spectator connected and no host has
    /// replied in time).
    pub async fn connect(
        options: SpectatorConnectOptions,
        callbacks: Arc<dyn SessionCallbacks>,
    ) -> Result<Arc<SpectatorSession>> {
        let game_id = GameId::from_invite_code(&options.invite_code);
        let hooks = Arc::new(Hooks::new());
        let node = Node::new(
            options.keypair,
            options.bind_addr,
            options.rendezvous,
            hooks.clone() as Arc<dyn SwarmCallbacks>,
        );

        let session = Arc::new(SpectatorSession {
            game_id,
            invite_code: options.invite_code,
            node,
            callbacks,
            rules: Arc::new(CachedFenRules),
            history: SyncRwLock::new(Vec::new()),
            seen: SyncRwLock::new(HashSet::new()),
            fen: SyncRwLock::new(STANDARD_START_FEN.to_string()),
            position: AtomicUsize::new(0),
            got_full_sync: AtomicBool::new(false),
            full_sync: Notify::new(),
        });
        hooks.bind(&session);

        session
            .node
            .join(*game_id.as_bytes(), JoinOptions::spectator())
            .await
            .map_err(|e| SessionError::TransportFatal(e.to_string()))?;

        let notified = session.full_sync.notified();
        tokio::pin!(notified);
        if !session.got_full_sync.load(Ordering::SeqCst) {
            let _ = tokio::time::timeout(FULL_SYNC_TIMEOUT, notified).await;
        }

        Ok(session)
    }

    /// This game's id.
    #[must_use]
    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    /// The invite code this spectator is watching.
    #[must_use]
    pub fn invite_code(&self) -> InviteCode {
        self.invite_code
    }

    /// The move history observed so far.
    #[must_use]
    pub fn history(&self) -> Vec<Move> {
        self.history.read().clone()
    }

    /// The live tip's position, in FEN (not affected by scrubbing).
    #[must_use]
    pub fn current_fen(&self) -> String {
        self.fen.read().clone()
    }

    /// The ply the viewer is currently looking at, `0..=total_moves()`.
    #[must_use]
    pub fn current_position(&self) -> usize {
        self.position.load(Ordering::SeqCst)
    }

    /// The number of moves played so far.
    #[must_use]
    pub fn total_moves(&self) -> usize {
        self.history.read().len()
    }

    /// Moves the viewer's pointer to `ply` half-moves and returns the
    /// resulting position, in FEN. `ply` is clamped to
    /// `0..=total_moves()`. Does not mutate the live history; a later
    /// live move only advances the pointer again if it was left at the
    /// tip (see [`SpectatorSession::apply_live_move`]).
    pub fn scrub_to(&self, ply: usize) -> String {
        let history = self.history.read();
        let ply = ply.min(history.len());
        self.position.store(ply, Ordering::SeqCst);
        self.rules.fen_at(STANDARD_START_FEN, &history, ply)
    }

    /// Leaves the swarm topic.
    pub async fn destroy(&self) {
        self.node.leave().await;
    }

    async fn handle_connect(&self, peer_id: PeerId, _info: PeerInfo) {
        self.callbacks.on_connection_change(peer_id, "connected").await;
        let handshake = PeerMessage::SpectatorHandshake {
            game_id: self.game_id,
            invite_code: self.invite_code.formatted(),
            request_full_sync: true,
            timestamp: now_ms(),
        };
        self.node.send(peer_id, &handshake).await;
    }

    async fn handle_message(&self, _peer_id: PeerId, message: PeerMessage) {
        match message {
            PeerMessage::FullGameSync {
                move_history,
                current_fen,
                ..
            } => self.apply_full_sync(move_history, current_fen).await,
            PeerMessage::Move { mv, .. } => self.apply_live_move(mv).await,
            PeerMessage::GameEnd { result, .. } => self.callbacks.on_game_end(&result).await,
            PeerMessage::Handshake { .. }
            | PeerMessage::SpectatorHandshake { .. }
            | PeerMessage::GameStateRequest { .. }
            | PeerMessage::GameStateResponse { .. }
            | PeerMessage::SyncComplete { .. } => {
                tracing::debug!("ignoring player-sync message on a spectator session");
            }
        }
    }

    async fn apply_full_sync(&self, move_history: Vec<Move>, current_fen: String) {
        {
            let mut seen = self.seen.write();
            seen.clear();
            for mv in &move_history {
                seen.insert(mv.dedup_key());
            }
        }
        let tip = move_history.len();
        *self.history.write() = move_history;
        *self.fen.write() = current_fen;
        self.position.store(tip, Ordering::SeqCst);
        self.got_full_sync.store(true, Ordering::SeqCst);
        self.full_sync.notify_waiters();
    }

    async fn apply_live_move(&self, mv: Move) {
        let key = mv.dedup_key();
        if !self.seen.write().insert(key) {
            return;
        }
        *self.fen.write() = mv.fen.clone();
        let was_at_tip = {
            let mut history = self.history.write();
            let tip = history.len();
            history.push(mv.clone());
            self.position.load(Ordering::SeqCst) == tip
        };
        if was_at_tip {
            self.position.fetch_add(1, Ordering::SeqCst);
        }
        self.callbacks.on_move_received(&mv).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gambit_swarm::FsRendezvous;

    struct RecordingCallbacks {
        moves: parking_lot::Mutex<Vec<Move>>,
        game_end: parking_lot::Mutex<Option<String>>,
        errors: AtomicUsize,
    }

    impl RecordingCallbacks {
        fn new() -> Self {
            Self {
                moves: parking_lot::Mutex::new(Vec::new()),
                game_end: parking_lot::Mutex::new(None),
                errors: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl SessionCallbacks for RecordingCallbacks {
        async fn on_game_state_change(&self, _state: gambit_types::SessionState, _status: &str) {}
        async fn on_move_received(&self, mv: &Move) {
            self.moves.lock().push(mv.clone());
        }
        async fn on_connection_change(&self, _peer_id: PeerId, _status: &str) {}
        async fn on_error(&self, _err: &SessionError) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
        async fn on_game_end(&self, result: &str) {
            *self.game_end.lock() = Some(result.to_string());
        }
    }

    fn sample_move(fen: &str) -> Move {
        sample_move_at(1, fen)
    }

    fn sample_move_at(timestamp: u64, fen: &str) -> Move {
        Move {
            timestamp,
            player: PlayerColor::White,
            from: "e2".into(),
            to: "e4".into(),
            piece: 'p',
            captured: None,
            promotion: None,
            check: false,
            checkmate: false,
            fen: fen.into(),
            san: "e4".into(),
            game_id: GameId::from_bytes(&[9u8; 32]).unwrap(),
        }
    }

    fn free_addr() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[tokio::test]
    async fn full_sync_replaces_history_and_dedups_against_it() {
        let rendezvous_dir = tempfile::tempdir().unwrap();
        let rendezvous: Arc<dyn Rendezvous> = Arc::new(FsRendezvous::new(rendezvous_dir.path()));
        let callbacks = Arc::new(RecordingCallbacks::new());
        let session = SpectatorSession::connect(
            SpectatorConnectOptions {
                invite_code: InviteCode::generate(),
                bind_addr: free_addr(),
                rendezvous,
                keypair: Keypair::generate(),
            },
            callbacks.clone(),
        )
        .await
        .unwrap();

        let moved_history = vec![sample_move("fen-1"), sample_move("fen-2")];
        session
            .apply_full_sync(moved_history.clone(), "fen-2".to_string())
            .await;
        assert_eq!(session.history(), moved_history);
        assert_eq!(session.current_fen(), "fen-2");

        // A live move that duplicates one already in the synced history
        // must not be appended twice.
        session.apply_live_move(moved_history[0].clone()).await;
        assert_eq!(session.history().len(), 2);
        assert!(callbacks.moves.lock().is_empty());

        session.destroy().await;
    }

    #[tokio::test]
    async fn joining_mid_game_starts_at_the_tip_and_auto_advances_with_live_moves() {
        let rendezvous_dir = tempfile::tempdir().unwrap();
        let rendezvous: Arc<dyn Rendezvous> = Arc::new(FsRendezvous::new(rendezvous_dir.path()));
        let callbacks = Arc::new(RecordingCallbacks::new());
        let session = SpectatorSession::connect(
            SpectatorConnectOptions {
                invite_code: InviteCode::generate(),
                bind_addr: free_addr(),
                rendezvous,
                keypair: Keypair::generate(),
            },
            callbacks,
        )
        .await
        .unwrap();

        let history: Vec<Move> = (0..10)
            .map(|i| sample_move_at(i, &format!("fen-{i}")))
            .collect();
        session.apply_full_sync(history, "fen-9".to_string()).await;

        assert_eq!(session.total_moves(), 10);
        assert_eq!(session.current_position(), 10);

        // Still at the tip, so a live move advances the pointer too.
        session.apply_live_move(sample_move_at(10, "fen-10")).await;
        assert_eq!(session.total_moves(), 11);
        assert_eq!(session.current_position(), 11);

        session.destroy().await;
    }

    #[tokio::test]
    async fn scrubbing_back_leaves_the_pointer_behind_on_a_live_move() {
        let rendezvous_dir = tempfile::tempdir().unwrap();
        let rendezvous: Arc<dyn Rendezvous> = Arc::new(FsRendezvous::new(rendezvous_dir.path()));
        let callbacks = Arc::new(RecordingCallbacks::new());
        let session = SpectatorSession::connect(
            SpectatorConnectOptions {
                invite_code: InviteCode::generate(),
                bind_addr: free_addr(),
                rendezvous,
                keypair: Keypair::generate(),
            },
            callbacks,
        )
        .await
        .unwrap();

        session
            .apply_full_sync(
                vec![sample_move_at(1, "fen-1"), sample_move_at(2, "fen-2")],
                "fen-2".into(),
            )
            .await;
        assert_eq!(session.current_position(), 2);

        session.scrub_to(0);
        assert_eq!(session.current_position(), 0);

        // The viewer was browsing history, not at the tip, so the new
        // move must not drag the pointer forward.
        session.apply_live_move(sample_move_at(3, "fen-3")).await;
        assert_eq!(session.total_moves(), 3);
        assert_eq!(session.current_position(), 0);

        session.destroy().await;
    }

    #[tokio::test]
    async fn scrub_to_uses_each_moves_own_cached_fen() {
        let rendezvous_dir = tempfile::tempdir().unwrap();
        let rendezvous: Arc<dyn Rendezvous> = Arc::new(FsRendezvous::new(rendezvous_dir.path()));
        let callbacks = Arc::new(RecordingCallbacks::new());
        let session = SpectatorSession::connect(
            SpectatorConnectOptions {
                invite_code: InviteCode::generate(),
                bind_addr: free_addr(),
                rendezvous,
                keypair: Keypair::generate(),
            },
            callbacks,
        )
        .await
        .unwrap();

        session
            .apply_full_sync(vec![sample_move("fen-1"), sample_move("fen-2")], "fen-2".into())
            .await;

        assert_eq!(session.scrub_to(0), STANDARD_START_FEN);
        assert_eq!(session.scrub_to(1), "fen-1");
        assert_eq!(session.scrub_to(2), "fen-2");

        session.destroy().await;
    }
}
