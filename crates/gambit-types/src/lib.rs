//! # Gambit Types
//!
//! The shared data model for a gambit game: identifiers, the move record
//! that flows through the replicated log, and the snapshots written to
//! disk for resumption.
//!
//! Nothing in this crate touches the network, disk, or a log — it is the
//! vocabulary the other `gambit-*` crates share.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod chess_move;
mod error;
mod game_id;
mod session_state;
mod snapshot;

pub use chess_move::{
    Move, PlayerColor, TIMESTAMP_FUTURE_TOLERANCE_MS, TIMESTAMP_PAST_TOLERANCE_MS,
};
pub use error::{Result, TypesError};
pub use game_id::{GameId, InviteCode};
pub use session_state::SessionState;
pub use snapshot::{ConnectionInfo, GameSnapshot, Players, PERSISTENCE_VERSION};
