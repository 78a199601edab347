//! The game session's lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The Session's lifecycle state.
///
/// ```text
/// waiting -> connecting -> syncing -> active -> finished
///               ^             ^
///               '-- reconnection (exponential backoff) --'
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Host only, no peer has connected yet.
    Waiting,
    /// Transport is dialing a discovered peer.
    Connecting,
    /// Peer connected, handshake exchanged, history being exchanged.
    Syncing,
    /// Handshake complete, ready to send and receive moves.
    Active,
    /// Game result recorded; no further moves accepted.
    Finished,
}

impl SessionState {
    /// Whether `sendMove` may be accepted in this state.
    #[must_use]
    pub fn accepts_moves(self) -> bool {
        matches!(self, Self::Active)
    }

    /// Whether the session is still trying to establish or restore
    /// connectivity (as opposed to actively playing or done).
    #[must_use]
    pub fn is_connecting(self) -> bool {
        matches!(self, Self::Waiting | Self::Connecting | Self::Syncing)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Waiting => "waiting",
            Self::Connecting => "connecting",
            Self::Syncing => "syncing",
            Self::Active => "active",
            Self::Finished => "finished",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_active_accepts_moves() {
        assert!(!SessionState::Waiting.accepts_moves());
        assert!(!SessionState::Connecting.accepts_moves());
        assert!(!SessionState::Syncing.accepts_moves());
        assert!(SessionState::Active.accepts_moves());
        assert!(!SessionState::Finished.accepts_moves());
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&SessionState::Syncing).unwrap();
        assert_eq!(json, "\"syncing\"");
    }
}
