//! The seam where real chess legality would plug in.
//!
//! Move legality is explicitly out of scope: every [`gambit_types::Move`]
//! already carries the FEN it results in, stamped by whoever made it, so
//! history scrubbing for a spectator never needs to replay a position —
//! it just looks the cached FEN up. [`ChessRules`] exists so a real
//! rules/legality engine has a named place to be substituted in later
//! without touching [`crate::SpectatorSession`].

use gambit_types::Move;

/// The starting position, in FEN.
pub const STANDARD_START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/8/RNBQKBNR w KQkq - 0 1";

/// Resolves the board position at a given point in a move history.
pub trait ChessRules: Send + Sync {
    /// The FEN after `ply` half-moves of `history` have been played,
    /// starting from `start_fen`. `ply == 0` is the starting position.
    fn fen_at(&self, start_fen: &str, history: &[Move], ply: usize) -> String;
}

/// Looks the position up from each move's own cached `fen` field rather
/// than replaying moves against a legality engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct CachedFenRules;

impl ChessRules for CachedFenRules {
    fn fen_at(&self, start_fen: &str, history: &[Move], ply: usize) -> String {
        if ply == 0 {
            start_fen.to_string()
        } else {
            history
                .get(ply - 1)
                .map(|mv| mv.fen.clone())
                .unwrap_or_else(|| start_fen.to_string())
        }
    }
}
