//! The peer message schema (JSON over line-delimited frames).

use gambit_identity::PublicKey;
use gambit_types::{GameId, Move, PlayerColor};
use serde::{Deserialize, Serialize};

/// Game metadata accompanying a spectator's `full_game_sync` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameInfo {
    /// When the game started, unix ms.
    pub start_time: u64,
    /// Whether the sender created the game.
    pub is_host: bool,
}

/// Compact game state summary returned in `game_state_response`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateSummary {
    /// Whose turn it is next.
    pub current_turn: PlayerColor,
    /// Whether the game has concluded.
    pub is_game_over: bool,
    /// The current position, in FEN.
    pub fen: String,
}

/// The two players, by swarm peer id, included with `full_game_sync`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayersInfo {
    /// The white player's peer id, if known.
    pub white: Option<String>,
    /// The black player's peer id, if known.
    pub black: Option<String>,
}

/// A message exchanged between peers over a swarm channel.
///
/// One JSON object per line; unknown `type` values are logged and
/// ignored rather than treated as a framing error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PeerMessage {
    /// Sent on every new connect.
    #[serde(rename_all = "camelCase")]
    Handshake {
        /// The game this connection is about.
        game_id: GameId,
        /// The sender's color.
        player_color: PlayerColor,
        /// Whether the sender created the game.
        is_host: bool,
        /// The sender's log writer id, so the receiver can authorize it.
        writer_public_key: PublicKey,
        /// Unix ms when sent.
        timestamp: u64,
    },
    /// The spectator variant of `handshake`.
    #[serde(rename_all = "camelCase")]
    SpectatorHandshake {
        /// The game this connection is about.
        game_id: GameId,
        /// The invite code used to join.
        invite_code: String,
        /// Whether the spectator wants a full history snapshot.
        request_full_sync: bool,
        /// Unix ms when sent.
        timestamp: u64,
    },
    /// Live move broadcast.
    #[serde(rename_all = "camelCase")]
    Move {
        /// The game this move belongs to.
        game_id: GameId,
        /// The move itself.
        #[serde(rename = "move")]
        mv: Move,
        /// Unix ms when sent.
        timestamp: u64,
    },
    /// Ask a peer for history.
    #[serde(rename_all = "camelCase")]
    GameStateRequest {
        /// The game whose history is requested.
        game_id: GameId,
        /// Unix ms when sent.
        timestamp: u64,
    },
    /// Reply to a `game_state_request`.
    #[serde(rename_all = "camelCase")]
    GameStateResponse {
        /// The game this reply is about.
        game_id: GameId,
        /// The moves the requester is missing.
        moves: Vec<Move>,
        /// A compact summary of the current state.
        game_state: GameStateSummary,
        /// Unix ms when sent.
        timestamp: u64,
    },
    /// Spectator reply: the entire linearized move list and current FEN.
    #[serde(rename_all = "camelCase")]
    FullGameSync {
        /// The game this reply is about.
        game_id: GameId,
        /// The full linearized move history.
        move_history: Vec<Move>,
        /// The current position, in FEN.
        current_fen: String,
        /// Game metadata.
        game_info: GameInfo,
        /// The two players.
        players: PlayersInfo,
    },
    /// Host -> guest, sent after sync completes.
    #[serde(rename_all = "camelCase")]
    SyncComplete {
        /// The game this message is about.
        game_id: GameId,
        /// Unix ms when sent.
        timestamp: u64,
    },
    /// Either peer -> other, announcing the game has ended.
    #[serde(rename_all = "camelCase")]
    GameEnd {
        /// The game this message is about.
        game_id: GameId,
        /// The game result (e.g. `"white_wins"`, `"draw"`).
        result: String,
        /// Unix ms when sent.
        timestamp: u64,
    },
}

impl PeerMessage {
    /// The game id this message is about.
    #[must_use]
    pub fn game_id(&self) -> GameId {
        match self {
            Self::Handshake { game_id, .. }
            | Self::SpectatorHandshake { game_id, .. }
            | Self::Move { game_id, .. }
            | Self::GameStateRequest { game_id, .. }
            | Self::GameStateResponse { game_id, .. }
            | Self::FullGameSync { game_id, .. }
            | Self::SyncComplete { game_id, .. }
            | Self::GameEnd { game_id, .. } => *game_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_round_trips_through_json() {
        let game_id = GameId::from_bytes(&[3u8; 32]).unwrap();
        let writer_public_key = gambit_identity::Keypair::generate().public_key();
        let msg = PeerMessage::Handshake {
            game_id,
            player_color: PlayerColor::White,
            is_host: true,
            writer_public_key,
            timestamp: 42,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"handshake\""));
        let parsed: PeerMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, parsed);
    }

    #[test]
    fn unknown_type_fails_to_parse_and_is_dropped_by_the_caller() {
        let line = r#"{"type":"something_new","gameId":"x"}"#;
        assert!(serde_json::from_str::<PeerMessage>(line).is_err());
    }

    #[test]
    fn move_field_serializes_as_move_not_mv() {
        let game_id = GameId::from_bytes(&[4u8; 32]).unwrap();
        let mv = Move {
            timestamp: 1,
            player: PlayerColor::White,
            from: "e2".into(),
            to: "e4".into(),
            piece: 'p',
            captured: None,
            promotion: None,
            check: false,
            checkmate: false,
            fen: "fen".into(),
            san: "e4".into(),
            game_id,
        };
        let msg = PeerMessage::Move {
            game_id,
            mv,
            timestamp: 2,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"move\":"));
        assert!(!json.contains("\"mv\":"));
    }
}
