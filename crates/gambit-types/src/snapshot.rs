//! Persisted game state: [`GameSnapshot`] and [`ConnectionInfo`].

use crate::chess_move::{Move, PlayerColor};
use crate::game_id::{GameId, InviteCode};
use serde::{Deserialize, Serialize};

/// The current schema version for persisted blobs (§6.4).
pub const PERSISTENCE_VERSION: u32 = 1;

/// The two players in a game, identified by their swarm peer id (or
/// `None` before that seat has connected).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Players {
    /// The white player's peer id, if known.
    pub white: Option<String>,
    /// The black player's peer id, if known.
    pub black: Option<String>,
}

/// A full, resumable game snapshot, as written by [`saveGame`](crate).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    /// Schema version; always [`PERSISTENCE_VERSION`] on write.
    pub version: u32,
    /// When this snapshot was written, unix ms.
    pub timestamp: u64,
    /// The game this snapshot belongs to.
    pub game_id: GameId,
    /// The two players.
    pub players: Players,
    /// The full linearized move history at the time of saving.
    pub move_history: Vec<Move>,
    /// Whose turn it is next.
    pub current_turn: PlayerColor,
    /// Whether the game has concluded.
    pub is_game_over: bool,
    /// The game result, if concluded (e.g. `"white_wins"`, `"draw"`).
    pub result: Option<String>,
    /// When the game started, unix ms.
    pub start_time: u64,
    /// The color of the participant who saved this snapshot.
    pub player_color: PlayerColor,
    /// Whether the saver created the game (as opposed to having joined it).
    pub is_host: bool,
    /// The current position, in FEN.
    pub fen: String,
}

impl GameSnapshot {
    /// Stamps a snapshot with the current schema version and timestamp.
    #[must_use]
    pub fn new(
        game_id: GameId,
        players: Players,
        move_history: Vec<Move>,
        current_turn: PlayerColor,
        start_time: u64,
        player_color: PlayerColor,
        is_host: bool,
        fen: String,
        now: u64,
    ) -> Self {
        Self {
            version: PERSISTENCE_VERSION,
            timestamp: now,
            game_id,
            players,
            move_history,
            current_turn,
            is_game_over: false,
            result: None,
            start_time,
            player_color,
            is_host,
            fen,
        }
    }
}

/// Reconnection metadata saved alongside a [`GameSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    /// Schema version; always [`PERSISTENCE_VERSION`] on write.
    pub version: u32,
    /// When this record was written, unix ms.
    pub timestamp: u64,
    /// The game this record belongs to.
    pub game_id: GameId,
    /// The human-shareable invite code for the game.
    pub invite_code: InviteCode,
    /// The swarm topic key, hex-encoded.
    pub game_key: String,
    /// The color of the participant who saved this record.
    pub player_color: PlayerColor,
    /// Whether the saver created the game.
    pub is_host: bool,
}

impl ConnectionInfo {
    /// Stamps a connection info record with the current schema version.
    #[must_use]
    pub fn new(
        game_id: GameId,
        invite_code: InviteCode,
        player_color: PlayerColor,
        is_host: bool,
        now: u64,
    ) -> Self {
        let game_key = game_id.to_hex();
        Self {
            version: PERSISTENCE_VERSION,
            timestamp: now,
            game_id,
            invite_code,
            game_key,
            player_color,
            is_host,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_round_trips_through_json() {
        let game_id = GameId::from_bytes(&[7u8; 32]).unwrap();
        let snapshot = GameSnapshot::new(
            game_id,
            Players::default(),
            vec![],
            PlayerColor::White,
            1_000,
            PlayerColor::White,
            true,
            "startpos".into(),
            1_000,
        );

        let json = serde_json::to_string(&snapshot).unwrap();
        let parsed: GameSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snapshot, parsed);
        assert_eq!(parsed.version, PERSISTENCE_VERSION);
    }

    #[test]
    fn connection_info_derives_game_key_from_game_id() {
        let code = InviteCode::parse("A1B-2C3").unwrap();
        let game_id = GameId::from_invite_code(&code);
        let info = ConnectionInfo::new(game_id, code, PlayerColor::Black, false, 42);
        assert_eq!(info.game_key, game_id.to_hex());
    }
}
