//! The self-describing move record that is the log's value type.

use crate::error::{Result, TypesError};
use crate::game_id::GameId;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static SQUARE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-h][1-8]$").expect("static regex"));

/// Late-arrival tolerance for a move's timestamp, in milliseconds.
pub const TIMESTAMP_PAST_TOLERANCE_MS: u64 = 300_000;

/// Clock-skew tolerance for a move's timestamp, in milliseconds.
pub const TIMESTAMP_FUTURE_TOLERANCE_MS: u64 = 5_000;

/// A player's color, also used as the per-writer color assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerColor {
    /// White moves first.
    White,
    /// Black moves second.
    Black,
}

impl PlayerColor {
    /// Returns the color that moves after this one.
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::White => Self::Black,
            Self::Black => Self::White,
        }
    }
}

impl fmt::Display for PlayerColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::White => write!(f, "white"),
            Self::Black => write!(f, "black"),
        }
    }
}

/// A single chess move entry, as it is appended to the log.
///
/// Self-describing: `fen` is the source of truth for the resulting
/// position, `san` is for display only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Move {
    /// Unix milliseconds when the move was made.
    pub timestamp: u64,
    /// The color that made this move.
    pub player: PlayerColor,
    /// Origin square, e.g. `e2`.
    pub from: String,
    /// Destination square, e.g. `e4`.
    pub to: String,
    /// The piece that moved, one of `p n b r q k`.
    pub piece: char,
    /// The captured piece, if any.
    pub captured: Option<char>,
    /// The promotion piece, if any, one of `q r b n`.
    pub promotion: Option<char>,
    /// Whether this move delivers check.
    pub check: bool,
    /// Whether this move delivers checkmate.
    pub checkmate: bool,
    /// The resulting position, in FEN.
    pub fen: String,
    /// Standard algebraic notation, for display.
    pub san: String,
    /// The game this move belongs to.
    pub game_id: GameId,
}

const VALID_PIECES: &[char] = &['p', 'n', 'b', 'r', 'q', 'k'];
const VALID_PROMOTIONS: &[char] = &['q', 'r', 'b', 'n'];

impl Move {
    /// Validates the structural fields of this move: square format,
    /// piece/promotion alphabet, and presence of required fields.
    ///
    /// Does not check turn discipline or timestamp bounds — those are
    /// contextual and handled by the session against the log tip.
    pub fn validate_fields(&self) -> Result<()> {
        if self.from.is_empty() {
            return Err(TypesError::MissingField("from"));
        }
        if self.to.is_empty() {
            return Err(TypesError::MissingField("to"));
        }
        if !SQUARE_RE.is_match(&self.from) {
            return Err(TypesError::InvalidSquare(self.from.clone()));
        }
        if !SQUARE_RE.is_match(&self.to) {
            return Err(TypesError::InvalidSquare(self.to.clone()));
        }
        if !VALID_PIECES.contains(&self.piece) {
            return Err(TypesError::MissingField("piece"));
        }
        if let Some(promo) = self.promotion {
            if !VALID_PROMOTIONS.contains(&promo) {
                return Err(TypesError::MissingField("promotion"));
            }
        }
        Ok(())
    }

    /// Checks the timestamp invariant: `timestamp` must be no earlier than
    /// `previous_timestamp - 300_000` ms and no later than `now + 5_000` ms.
    pub fn validate_timestamp(&self, previous_timestamp: u64, now: u64) -> Result<()> {
        let lower = previous_timestamp.saturating_sub(TIMESTAMP_PAST_TOLERANCE_MS);
        let upper = now + TIMESTAMP_FUTURE_TOLERANCE_MS;
        if self.timestamp < lower || self.timestamp > upper {
            return Err(TypesError::TimestampOutOfBounds(
                self.timestamp,
                previous_timestamp,
                now,
            ));
        }
        Ok(())
    }

    /// The dedup key used to collapse the Swarm fast path and Log slow
    /// path into a single `onMoveReceived` (Property 4).
    #[must_use]
    pub fn dedup_key(&self) -> (u64, String, String, PlayerColor) {
        (self.timestamp, self.from.clone(), self.to.clone(), self.player)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_move(game_id: GameId) -> Move {
        Move {
            timestamp: 1_000,
            player: PlayerColor::White,
            from: "e2".into(),
            to: "e4".into(),
            piece: 'p',
            captured: None,
            promotion: None,
            check: false,
            checkmate: false,
            fen: "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2".into(),
            san: "e4".into(),
            game_id,
        }
    }

    fn game_id() -> GameId {
        GameId::from_bytes(&[1u8; 32]).unwrap()
    }

    #[test]
    fn move_validates_well_formed_fields() {
        assert!(sample_move(game_id()).validate_fields().is_ok());
    }

    #[test]
    fn move_rejects_bad_square() {
        let mut mv = sample_move(game_id());
        mv.to = "e9".into();
        assert!(matches!(
            mv.validate_fields(),
            Err(TypesError::InvalidSquare(_))
        ));
    }

    #[test]
    fn move_rejects_bad_piece() {
        let mut mv = sample_move(game_id());
        mv.piece = 'x';
        assert!(mv.validate_fields().is_err());
    }

    #[test]
    fn move_rejects_bad_promotion() {
        let mut mv = sample_move(game_id());
        mv.promotion = Some('k');
        assert!(mv.validate_fields().is_err());
    }

    #[test]
    fn move_timestamp_within_bounds() {
        let mv = sample_move(game_id());
        assert!(mv.validate_timestamp(900, 1_500).is_ok());
    }

    #[test]
    fn move_timestamp_too_far_past() {
        let mut mv = sample_move(game_id());
        mv.timestamp = 0;
        assert!(mv
            .validate_timestamp(400_000, 500_000)
            .is_err());
    }

    #[test]
    fn move_timestamp_too_far_future() {
        let mut mv = sample_move(game_id());
        mv.timestamp = 100_000;
        assert!(mv.validate_timestamp(0, 0).is_err());
    }

    #[test]
    fn move_dedup_key_ignores_fen_and_piece() {
        let a = sample_move(game_id());
        let mut b = sample_move(game_id());
        b.fen = "different".into();
        b.san = "different".into();
        assert_eq!(a.dedup_key(), b.dedup_key());
    }
}
