//! The heart of the system: one [`Session`] per live game.
//!
//! Owns the swarm connection, the replicated move log, and persistence,
//! and drives the state machine `waiting -> connecting -> syncing ->
//! active -> finished`. Both players run the same state machine; only
//! the host/guest branches at handshake and history-sync time differ.

use crate::callbacks::SessionCallbacks;
use crate::error::{Result, SessionError};
use crate::rules::STANDARD_START_FEN;
use gambit_identity::{Keypair, PublicKey};
use gambit_log::{Log, LinearizedEntry, LogApplication, View};
use gambit_storage::Persistence;
use gambit_swarm::{
    JoinOptions, Node, PeerId, PeerInfo, PeerMessage, Rendezvous, SwarmCallbacks, SwarmError,
};
use gambit_types::{
    ConnectionInfo, GameId, GameSnapshot, InviteCode, Move, PlayerColor, Players, SessionState,
};
use parking_lot::RwLock as SyncRwLock;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

/// Reply timeout for a guest's initial handshake, after which
/// [`SessionError::HandshakeTimeout`] is surfaced if still unconnected.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a guest waits in `syncing` before activating anyway, so a
/// brand-new game (nothing to sync) never deadlocks waiting for a
/// `game_state_response` the host has no reason to send.
const GUEST_SYNC_GUARD: Duration = Duration::from_millis(1000);

/// The reconnect backoff schedule, in seconds between successive
/// rejoin attempts; its length is also the attempt cap.
const RECONNECT_SCHEDULE_SECS: &[u64] = &[1, 2, 4, 8, 10];

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Parameters for hosting a new game.
pub struct CreateGameOptions {
    /// Directory under which the game's log and snapshots are stored.
    pub storage_dir: PathBuf,
    /// Local address to bind the swarm listener to.
    pub bind_addr: SocketAddr,
    /// Peer-discovery backend.
    pub rendezvous: Arc<dyn Rendezvous>,
    /// This node's identity; also the log's writer id.
    pub keypair: Keypair,
}

/// Parameters for joining an existing game by invite code.
pub struct JoinGameOptions {
    /// The invite code shared by the host.
    pub invite_code: InviteCode,
    /// Directory under which the game's log and snapshots are stored.
    pub storage_dir: PathBuf,
    /// Local address to bind the swarm listener to.
    pub bind_addr: SocketAddr,
    /// Peer-discovery backend.
    pub rendezvous: Arc<dyn Rendezvous>,
    /// This node's identity; also the log's writer id.
    pub keypair: Keypair,
}

struct PeerConnection {
    peer_id: PeerId,
    writer_public_key: Option<PublicKey>,
}

/// Forwards swarm and log events back to the owning [`Session`] without
/// either side owning the other outright — `Session` owns a `Node` and a
/// `Log`, each of which hold a `Hooks` that only holds a `Weak<Session>`.
struct Hooks {
    session: SyncRwLock<Weak<Session>>,
}

impl Hooks {
    fn new() -> Self {
        Self {
            session: SyncRwLock::new(Weak::new()),
        }
    }

    fn bind(&self, session: &Arc<Session>) {
        *self.session.write() = Arc::downgrade(session);
    }

    fn session(&self) -> Option<Arc<Session>> {
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
            session.handle_disconnect(peer_id, reason).await;
        }
    }

    async fn on_message(&self, peer_id: PeerId, message: PeerMessage) {
        if let Some(session) = self.session() {
            session.handle_message(peer_id, message).await;
        }
    }

    async fn on_error(&self, err: SwarmError) {
        if let Some(session) = self.session() {
            session.handle_transport_error(err).await;
        }
    }
}

#[async_trait::async_trait]
impl LogApplication for Hooks {
    async fn apply(&self, batch: &[LinearizedEntry], _view: &View) {
        if let Some(session) = self.session() {
            session.handle_log_apply(batch).await;
        }
    }
}

/// One live game: the swarm connection, the replicated log, persistence,
/// and the state machine tying them together.
pub struct Session {
    game_id: GameId,
    invite_code: InviteCode,
    player_color: PlayerColor,
    is_host: bool,
    local_writer: PublicKey,
    node: Node,
    log: Log,
    persistence: Persistence,
    callbacks: Arc<dyn SessionCallbacks>,
    state: SyncRwLock<SessionState>,
    peer: SyncRwLock<Option<PeerConnection>>,
    start_time: u64,
    reconnect_attempts: AtomicU32,
    tasks: AsyncMutex<Vec<JoinHandle<()>>>,
    seen: SyncRwLock<HashSet<(u64, String, String, PlayerColor)>>,
    self_weak: SyncRwLock<Weak<Session>>,
}

impl Session {
    /// Hosts a new game: generates an invite code, opens the log, joins
    /// the swarm topic as both client and server, and enters `waiting`.
    pub async fn create(
        options: CreateGameOptions,
        callbacks: Arc<dyn SessionCallbacks>,
    ) -> Result<Arc<Session>> {
        let invite_code = InviteCode::generate();
        let game_id = GameId::from_invite_code(&invite_code);
        Self::start(
            game_id,
            invite_code,
            PlayerColor::White,
            true,
            options.storage_dir,
            options.bind_addr,
            options.rendezvous,
            options.keypair,
            callbacks,
            SessionState::Waiting,
        )
        .await
    }

    /// Joins an existing game by invite code, joining as client only,
    /// and enters `connecting`.
    pub async fn join(
        options: JoinGameOptions,
        callbacks: Arc<dyn SessionCallbacks>,
    ) -> Result<Arc<Session>> {
        let game_id = GameId::from_invite_code(&options.invite_code);
        Self::start(
            game_id,
            options.invite_code,
            PlayerColor::Black,
            false,
            options.storage_dir,
            options.bind_addr,
            options.rendezvous,
            options.keypair,
            callbacks,
            SessionState::Connecting,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn start(
        game_id: GameId,
        invite_code: InviteCode,
        player_color: PlayerColor,
        is_host: bool,
        storage_dir: PathBuf,
        bind_addr: SocketAddr,
        rendezvous: Arc<dyn Rendezvous>,
        keypair: Keypair,
        callbacks: Arc<dyn SessionCallbacks>,
        initial_state: SessionState,
    ) -> Result<Arc<Session>> {
        let local_writer = keypair.public_key();
        let hooks = Arc::new(Hooks::new());

        let log_dir = storage_dir.join("games").join(game_id.sanitized());
        let log = Log::open(
            log_dir,
            game_id,
            local_writer,
            hooks.clone() as Arc<dyn LogApplication>,
        )
        .await?;
        let persistence = Persistence::open(storage_dir).await?;
        let node = Node::new(
            keypair,
            bind_addr,
            rendezvous,
            hooks.clone() as Arc<dyn SwarmCallbacks>,
        );

        let session = Arc::new(Session {
            game_id,
            invite_code,
            player_color,
            is_host,
            local_writer,
            node,
            log,
            persistence,
            callbacks,
            state: SyncRwLock::new(initial_state),
            peer: SyncRwLock::new(None),
            start_time: now_ms(),
            reconnect_attempts: AtomicU32::new(0),
            tasks: AsyncMutex::new(Vec::new()),
            seen: SyncRwLock::new(HashSet::new()),
            self_weak: SyncRwLock::new(Weak::new()),
        });
        hooks.bind(&session);
        *session.self_weak.write() = Arc::downgrade(&session);

        let join_opts = JoinOptions::player(true, is_host);
        session
            .node
            .join(*game_id.as_bytes(), join_opts)
            .await
            .map_err(|e| SessionError::TransportFatal(e.to_string()))?;

        let info = ConnectionInfo::new(game_id, invite_code, player_color, is_host, now_ms());
        session.persistence.save_connection_info(&game_id, &info).await?;

        let status = if is_host { "waiting_for_peer" } else { "connecting" };
        session.callbacks.on_game_state_change(initial_state, status).await;

        if !is_host {
            session.spawn_handshake_watchdog();
        }

        Ok(session)
    }

    /// This game's id.
    #[must_use]
    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    /// The invite code a peer uses to join this game.
    #[must_use]
    pub fn invite_code(&self) -> InviteCode {
        self.invite_code
    }

    /// This participant's color.
    #[must_use]
    pub fn player_color(&self) -> PlayerColor {
        self.player_color
    }

    /// The session's current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Submits a local move: refuses unless `active` and it is this
    /// player's turn, validates the move's fields, appends it to the
    /// log, broadcasts it, and persists a snapshot.
    pub async fn send_move(&self, mut mv: Move) -> Result<()> {
        if let Err(e) = self.validate_send_move() {
            return Err(self.fail(e).await);
        }
        if let Err(e) = mv.validate_fields() {
            return Err(self.fail(SessionError::from(e)).await);
        }

        mv.game_id = self.game_id;
        mv.player = self.player_color;
        mv.timestamp = now_ms();

        let entry = match self.log.append(mv).await {
            Ok(entry) => entry,
            Err(e) => return Err(self.fail(SessionError::from(e)).await),
        };
        self.seen.write().insert(entry.value.dedup_key());

        let sent = self
            .node
            .broadcast(&PeerMessage::Move {
                game_id: self.game_id,
                mv: entry.value.clone(),
                timestamp: entry.timestamp,
            })
            .await;
        if sent == 0 {
            tracing::warn!("no connected peer to broadcast move to");
        }

        self.persist_snapshot().await?;

        if entry.value.checkmate {
            let result = format!("{}_wins", self.player_color);
            self.finish(&result, true).await;
        }

        Ok(())
    }

    fn validate_send_move(&self) -> std::result::Result<(), SessionError> {
        if *self.state.read() != SessionState::Active {
            return Err(SessionError::StateViolation(
                "session is not active".into(),
            ));
        }
        let current_turn = self.current_turn();
        if current_turn != self.player_color {
            return Err(SessionError::StateViolation(format!(
                "expected {current_turn} to move"
            )));
        }
        Ok(())
    }

    /// Tears the session down: aborts background timers and leaves the
    /// swarm topic. Does not delete anything already persisted.
    pub async fn destroy(&self) {
        for task in self.tasks.lock().await.drain(..) {
            task.abort();
        }
        self.node.leave().await;
    }

    /// Lists games with a saved snapshot under `storage_dir`.
    pub async fn list_saved_games(storage_dir: impl Into<PathBuf>) -> Result<Vec<GameId>> {
        let persistence = Persistence::open(storage_dir).await?;
        Ok(persistence.list_games().await?)
    }

    /// Loads a previously saved game's snapshot, for resuming a session.
    pub async fn restore_game_state(
        storage_dir: impl Into<PathBuf>,
        game_id: GameId,
    ) -> Result<GameSnapshot> {
        let persistence = Persistence::open(storage_dir).await?;
        Ok(persistence.load_game(&game_id).await?)
    }

    fn current_turn(&self) -> PlayerColor {
        self.log
            .view()
            .to_vec()
            .last()
            .map(|e| e.value.player.opposite())
            .unwrap_or(PlayerColor::White)
    }

    fn writer_for_color(&self, color: PlayerColor) -> Option<PublicKey> {
        if color == self.player_color {
            Some(self.local_writer)
        } else {
            self.peer.read().as_ref().and_then(|c| c.writer_public_key)
        }
    }

    fn players_info(&self) -> Players {
        let local_id = self.node.peer_id().to_string();
        let peer_id_str = self.peer.read().as_ref().map(|c| c.peer_id.to_string());
        if self.player_color == PlayerColor::White {
            Players {
                white: Some(local_id),
                black: peer_id_str,
            }
        } else {
            Players {
                white: peer_id_str,
                black: Some(local_id),
            }
        }
    }

    async fn transition(&self, new_state: SessionState, status: &str) {
        *self.state.write() = new_state;
        self.callbacks.on_game_state_change(new_state, status).await;
    }

    async fn fail(&self, err: SessionError) -> SessionError {
        self.callbacks.on_error(&err).await;
        err
    }

    fn arc_self(&self) -> Arc<Session> {
        self.self_weak
            .read()
            .upgrade()
            .expect("session is always kept alive by the caller holding its Arc")
    }

    async fn handle_connect(&self, peer_id: PeerId, _info: PeerInfo) {
        *self.peer.write() = Some(PeerConnection {
            peer_id,
            writer_public_key: None,
        });
        self.callbacks.on_connection_change(peer_id, "connected").await;
        self.reconnect_attempts.store(0, Ordering::SeqCst);

        let handshake = PeerMessage::Handshake {
            game_id: self.game_id,
            player_color: self.player_color,
            is_host: self.is_host,
            writer_public_key: self.local_writer,
            timestamp: now_ms(),
        };
        self.node.send(peer_id, &handshake).await;

        if matches!(*self.state.read(), SessionState::Waiting | SessionState::Connecting) {
            self.transition(SessionState::Syncing, "peer_connected").await;
        }
    }

    async fn handle_disconnect(&self, peer_id: PeerId, reason: String) {
        self.callbacks.on_connection_change(peer_id, &reason).await;

        let was_this_peer = {
            let mut guard = self.peer.write();
            if guard.as_ref().map(|c| c.peer_id) == Some(peer_id) {
                *guard = None;
                true
            } else {
                false
            }
        };
        if !was_this_peer {
            return;
        }

        let was_active = *self.state.read() == SessionState::Active;
        if was_active && self.node.peer_count().await == 0 {
            self.transition(SessionState::Waiting, "peer_disconnected").await;
            self.spawn_reconnect_watchdog();
        }
    }

    async fn handle_transport_error(&self, err: SwarmError) {
        tracing::warn!(error = %err, "swarm transport error");
        self.callbacks
            .on_error(&SessionError::TransportTransient(err.to_string()))
            .await;
    }

    async fn handle_log_apply(&self, batch: &[LinearizedEntry]) {
        for entry in batch {
            self.callbacks.on_move_received(&entry.value).await;
        }
    }

    async fn handle_message(&self, peer_id: PeerId, message: PeerMessage) {
        match message {
            PeerMessage::Handshake {
                player_color: _,
                is_host: _,
                writer_public_key,
                ..
            } => self.handle_handshake(peer_id, writer_public_key).await,
            PeerMessage::GameStateRequest { .. } => self.handle_game_state_request(peer_id).await,
            PeerMessage::GameStateResponse { moves, .. } => {
                self.handle_game_state_response(peer_id, moves).await;
            }
            PeerMessage::Move { mv, .. } => self.handle_move_message(mv).await,
            PeerMessage::SyncComplete { .. } => {
                if *self.state.read() == SessionState::Syncing {
                    self.transition(SessionState::Active, "sync_complete").await;
                }
            }
            PeerMessage::GameEnd { result, .. } => self.finish(&result, false).await,
            PeerMessage::SpectatorHandshake { .. } | PeerMessage::FullGameSync { .. } => {
                tracing::debug!("ignoring spectator-only message on a player session");
            }
        }
    }

    async fn handle_handshake(&self, peer_id: PeerId, writer_public_key: PublicKey) {
        {
            let mut guard = self.peer.write();
            if let Some(conn) = guard.as_mut() {
                if conn.peer_id == peer_id {
                    conn.writer_public_key = Some(writer_public_key);
                }
            }
        }
        if let Err(e) = self.log.add_writer(writer_public_key).await {
            if !matches!(e, gambit_log::LogError::WriterAlreadyAuthorized(_)) {
                tracing::warn!(error = %e, "failed to authorize remote writer");
            }
        }

        if matches!(*self.state.read(), SessionState::Waiting | SessionState::Connecting) {
            self.transition(SessionState::Syncing, "handshake_received").await;
        }

        if self.is_host {
            self.node
                .send(
                    peer_id,
                    &PeerMessage::SyncComplete {
                        game_id: self.game_id,
                        timestamp: now_ms(),
                    },
                )
                .await;
            self.transition(SessionState::Active, "sync_complete_sent").await;
        } else if self.log.view().length() == 0 {
            self.transition(SessionState::Active, "no_history_to_sync").await;
        } else {
            self.node
                .send(
                    peer_id,
                    &PeerMessage::GameStateRequest {
                        game_id: self.game_id,
                        timestamp: now_ms(),
                    },
                )
                .await;
            self.spawn_guest_sync_guard();
        }
    }

    async fn handle_game_state_request(&self, peer_id: PeerId) {
        let moves: Vec<Move> = self
            .log
            .view()
            .to_vec()
            .into_iter()
            .map(|e| e.value)
            .collect();
        let game_state = gambit_swarm::GameStateSummary {
            current_turn: moves.last().map_or(PlayerColor::White, |m| m.player.opposite()),
            is_game_over: moves.last().is_some_and(|m| m.checkmate),
            fen: moves
                .last()
                .map_or_else(|| STANDARD_START_FEN.to_string(), |m| m.fen.clone()),
        };
        self.node
            .send(
                peer_id,
                &PeerMessage::GameStateResponse {
                    game_id: self.game_id,
                    moves,
                    game_state,
                    timestamp: now_ms(),
                },
            )
            .await;
    }

    async fn handle_game_state_response(&self, peer_id: PeerId, moves: Vec<Move>) {
        for mv in moves {
            self.ingest_remote_move(mv).await;
        }
        if *self.state.read() != SessionState::Active {
            self.transition(SessionState::Active, "sync_complete").await;
        }
        self.node
            .send(
                peer_id,
                &PeerMessage::SyncComplete {
                    game_id: self.game_id,
                    timestamp: now_ms(),
                },
            )
            .await;
    }

    async fn handle_move_message(&self, mv: Move) {
        if mv.player == self.player_color {
            return;
        }
        self.ingest_remote_move(mv).await;
    }

    async fn ingest_remote_move(&self, mv: Move) {
        let key = mv.dedup_key();
        if !self.seen.write().insert(key) {
            return;
        }

        let Some(writer) = self.writer_for_color(mv.player) else {
            tracing::warn!("no known writer for move's color, dropping");
            return;
        };
        if writer == self.local_writer {
            return;
        }

        let checkmate = mv.checkmate;
        if let Err(e) = self.log.apply_remote(writer, mv).await {
            let err = SessionError::from(e);
            self.callbacks.on_error(&err).await;
            return;
        }
        if checkmate {
            let result = format!("{}_wins", self.current_turn_opponent());
            self.finish(&result, false).await;
        }
    }

    fn current_turn_opponent(&self) -> PlayerColor {
        self.current_turn().opposite()
    }

    async fn persist_snapshot(&self) -> Result<()> {
        let history: Vec<Move> = self
            .log
            .view()
            .to_vec()
            .into_iter()
            .map(|e| e.value)
            .collect();
        let current_turn = history
            .last()
            .map(|m| m.player.opposite())
            .unwrap_or(PlayerColor::White);
        let fen = history
            .last()
            .map(|m| m.fen.clone())
            .unwrap_or_else(|| STANDARD_START_FEN.to_string());
        let players = self.players_info();
        let snapshot = GameSnapshot::new(
            self.game_id,
            players,
            history,
            current_turn,
            self.start_time,
            self.player_color,
            self.is_host,
            fen,
            now_ms(),
        );
        if let Err(e) = self.persistence.save_game(&self.game_id, &snapshot).await {
            let err = SessionError::from(e);
            self.callbacks.on_error(&err).await;
            return Err(err);
        }
        Ok(())
    }

    async fn finish(&self, result: &str, announce: bool) {
        self.transition(SessionState::Finished, "game_ended").await;

        if announce {
            if let Some(peer_id) = self.peer.read().as_ref().map(|c| c.peer_id) {
                self.node
                    .send(
                        peer_id,
                        &PeerMessage::GameEnd {
                            game_id: self.game_id,
                            result: result.to_string(),
                            timestamp: now_ms(),
                        },
                    )
                    .await;
            }
        }

        let history: Vec<Move> = self
            .log
            .view()
            .to_vec()
            .into_iter()
            .map(|e| e.value)
            .collect();
        let current_turn = history
            .last()
            .map(|m| m.player.opposite())
            .unwrap_or(PlayerColor::White);
        let fen = history
            .last()
            .map(|m| m.fen.clone())
            .unwrap_or_else(|| STANDARD_START_FEN.to_string());
        let mut snapshot = GameSnapshot::new(
            self.game_id,
            self.players_info(),
            history,
            current_turn,
            self.start_time,
            self.player_color,
            self.is_host,
            fen,
            now_ms(),
        );
        snapshot.is_game_over = true;
        snapshot.result = Some(result.to_string());
        if let Err(e) = self.persistence.save_game(&self.game_id, &snapshot).await {
            tracing::warn!(error = %e, "failed to persist final snapshot");
        }

        self.callbacks.on_game_end(result).await;
    }

    fn spawn_handshake_watchdog(&self) {
        let session = self.arc_self();
        let registrar = self.arc_self();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(HANDSHAKE_TIMEOUT).await;
            if matches!(*session.state.read(), SessionState::Connecting | SessionState::Waiting) {
                session
                    .callbacks
                    .on_error(&SessionError::HandshakeTimeout)
                    .await;
            }
        });
        tokio::spawn(async move {
            registrar.tasks.lock().await.push(handle);
        });
    }

    fn spawn_guest_sync_guard(&self) {
        let session = self.arc_self();
        let registrar = self.arc_self();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(GUEST_SYNC_GUARD).await;
            if *session.state.read() == SessionState::Syncing {
                session.transition(SessionState::Active, "sync_guard_elapsed").await;
            }
        });
        tokio::spawn(async move {
            registrar.tasks.lock().await.push(handle);
        });
    }

    fn spawn_reconnect_watchdog(&self) {
        let session = self.arc_self();
        let handle = tokio::spawn(async move {
            for &secs in RECONNECT_SCHEDULE_SECS {
                if *session.state.read() != SessionState::Waiting {
                    return;
                }
                session.reconnect_attempts.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(secs)).await;
                if *session.state.read() != SessionState::Waiting {
                    return;
                }

                session.node.leave().await;
                session.transition(SessionState::Connecting, "reconnecting").await;
                let join_opts = JoinOptions::player(true, session.is_host);
                if let Err(e) = session.node.join(*session.game_id.as_bytes(), join_opts).await {
                    tracing::warn!(error = %e, "rejoin attempt failed");
                }

                tokio::time::sleep(Duration::from_millis(500)).await;
                if *session.state.read() == SessionState::Connecting {
                    session
                        .transition(SessionState::Waiting, "reconnect_attempt_timed_out")
                        .await;
                }
            }
            if *session.state.read() == SessionState::Waiting {
                session
                    .callbacks
                    .on_error(&SessionError::TransportFatal(
                        "reconnect attempts exhausted".into(),
                    ))
                    .await;
            }
        });
        let registrar = self.arc_self();
        tokio::spawn(async move {
            registrar.tasks.lock().await.push(handle);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gambit_swarm::FsRendezvous;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    struct RecordingCallbacks {
        states: parking_lot::Mutex<Vec<SessionState>>,
        moves: parking_lot::Mutex<Vec<Move>>,
        errors: AtomicUsize,
        game_end: parking_lot::Mutex<Option<String>>,
        notify: Notify,
    }

    impl RecordingCallbacks {
        fn new() -> Self {
            Self {
                states: parking_lot::Mutex::new(Vec::new()),
                moves: parking_lot::Mutex::new(Vec::new()),
                errors: AtomicUsize::new(0),
                game_end: parking_lot::Mutex::new(None),
                notify: Notify::new(),
            }
        }
    }

    #[async_trait::async_trait]
    impl SessionCallbacks for RecordingCallbacks {
        async fn on_game_state_change(&self, state: SessionState, _status: &str) {
            self.states.lock().push(state);
            self.notify.notify_waiters();
        }
        async fn on_move_received(&self, mv: &Move) {
            self.moves.lock().push(mv.clone());
            self.notify.notify_waiters();
        }
        async fn on_connection_change(&self, _peer_id: PeerId, _status: &str) {}
        async fn on_error(&self, _err: &SessionError) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
        async fn on_game_end(&self, result: &str) {
            *self.game_end.lock() = Some(result.to_string());
            self.notify.notify_waiters();
        }
    }

    fn free_addr() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    fn sample_move(player: PlayerColor, from: &str, to: &str) -> Move {
        Move {
            timestamp: 0,
            player,
            from: from.into(),
            to: to.into(),
            piece: 'p',
            captured: None,
            promotion: None,
            check: false,
            checkmate: false,
            fen: "irrelevant".into(),
            san: format!("{from}{to}"),
            game_id: GameId::from_bytes(&[0u8; 32]).unwrap(),
        }
    }

    async fn wait_for<F: Fn() -> bool>(notify: &Notify, condition: F) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            let _ = tokio::time::timeout(Duration::from_millis(50), notify.notified()).await;
        }
    }

    #[tokio::test]
    async fn host_and_guest_reach_active_and_exchange_a_move() {
        let rendezvous_dir = tempfile::tempdir().unwrap();
        let rendezvous: Arc<dyn Rendezvous> = Arc::new(FsRendezvous::new(rendezvous_dir.path()));

        let host_dir = tempfile::tempdir().unwrap();
        let host_callbacks = Arc::new(RecordingCallbacks::new());
        let host = Session::create(
            CreateGameOptions {
                storage_dir: host_dir.path().to_path_buf(),
                bind_addr: free_addr(),
                rendezvous: rendezvous.clone(),
                keypair: Keypair::generate(),
            },
            host_callbacks.clone(),
        )
        .await
        .unwrap();

        let guest_dir = tempfile::tempdir().unwrap();
        let guest_callbacks = Arc::new(RecordingCallbacks::new());
        let guest = Session::join(
            JoinGameOptions {
                invite_code: host.invite_code(),
                storage_dir: guest_dir.path().to_path_buf(),
                bind_addr: free_addr(),
                rendezvous: rendezvous.clone(),
                keypair: Keypair::generate(),
            },
            guest_callbacks.clone(),
        )
        .await
        .unwrap();

        wait_for(&host_callbacks.notify, || host.state() == SessionState::Active).await;
        wait_for(&guest_callbacks.notify, || guest.state() == SessionState::Active).await;
        assert_eq!(host.state(), SessionState::Active);
        assert_eq!(guest.state(), SessionState::Active);

        host.send_move(sample_move(PlayerColor::White, "e2", "e4"))
            .await
            .unwrap();

        wait_for(&guest_callbacks.notify, || !guest_callbacks.moves.lock().is_empty()).await;
        assert_eq!(guest_callbacks.moves.lock().len(), 1);
        assert_eq!(guest.log.view().length(), 1);

        host.destroy().await;
        guest.destroy().await;
    }

    #[tokio::test]
    async fn send_move_out_of_turn_is_rejected() {
        let rendezvous_dir = tempfile::tempdir().unwrap();
        let rendezvous: Arc<dyn Rendezvous> = Arc::new(FsRendezvous::new(rendezvous_dir.path()));
        let host_dir = tempfile::tempdir().unwrap();
        let callbacks = Arc::new(RecordingCallbacks::new());

        let host = Session::create(
            CreateGameOptions {
                storage_dir: host_dir.path().to_path_buf(),
                bind_addr: free_addr(),
                rendezvous,
                keypair: Keypair::generate(),
            },
            callbacks.clone(),
        )
        .await
        .unwrap();

        // Not active yet (no peer), so sendMove must be refused.
        let result = host
            .send_move(sample_move(PlayerColor::White, "e2", "e4"))
            .await;
        assert!(matches!(result, Err(SessionError::StateViolation(_))));
        assert_eq!(callbacks.errors.load(Ordering::SeqCst), 1);

        host.destroy().await;
    }

    #[tokio::test]
    async fn duplicate_move_is_only_ever_applied_once() {
        let rendezvous_dir = tempfile::tempdir().unwrap();
        let rendezvous: Arc<dyn Rendezvous> = Arc::new(FsRendezvous::new(rendezvous_dir.path()));
        let host_dir = tempfile::tempdir().unwrap();
        let callbacks = Arc::new(RecordingCallbacks::new());
        let host = Session::create(
            CreateGameOptions {
                storage_dir: host_dir.path().to_path_buf(),
                bind_addr: free_addr(),
                rendezvous,
                keypair: Keypair::generate(),
            },
            callbacks,
        )
        .await
        .unwrap();

        // Simulates the same move arriving once as a live `Move` message
        // and once as part of a `game_state_response` replay: the dedup
        // set must accept the key exactly once regardless of path.
        let mv = sample_move(PlayerColor::Black, "e7", "e5");
        let key = mv.dedup_key();
        assert!(host.seen.write().insert(key.clone()));
        assert!(!host.seen.write().insert(key));

        host.destroy().await;
    }
}
