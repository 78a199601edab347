//! The upward interface a session reports through.
//!
//! A small, closed capability set — mirroring
//! [`gambit_swarm::SwarmCallbacks`] one layer up the stack, from "a peer
//! connected" to "the game state changed".

use crate::error::SessionError;
use gambit_swarm::PeerId;
use gambit_types::{Move, SessionState};

/// Callbacks a UI or host process supplies when creating, joining, or
/// spectating a session.
#[async_trait::async_trait]
pub trait SessionCallbacks: Send + Sync {
    /// The session's lifecycle state changed. `status` is a short
    /// human-readable reason, e.g. `"peer_connected"`, `"sync_timeout"`.
    async fn on_game_state_change(&self, state: SessionState, status: &str);

    /// A move was linearized into the log, whether made locally or
    /// received from a peer.
    async fn on_move_received(&self, mv: &Move);

    /// A peer's connection status changed. `status` is one of
    /// `"connected"` or a disconnect reason string.
    async fn on_connection_change(&self, peer_id: PeerId, status: &str);

    /// A caller-visible error occurred, alongside the synchronous `Err`
    /// of whatever operation triggered it.
    async fn on_error(&self, err: &SessionError);

    /// The game concluded. `result` is e.g. `"white_wins"`, `"draw"`.
    async fn on_game_end(&self, result: &str);
}
