//! # Gambit Session
//!
//! Per-game session state machine: handshake, history sync, move
//! submission, reconnection, and read-only spectator viewing. Sits
//! above [`gambit_swarm`] (transport), [`gambit_log`] (the replicated
//! move log), and [`gambit_storage`] (snapshots), and wires them
//! together into the lifecycle `waiting -> connecting -> syncing ->
//! active -> finished`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod callbacks;
mod error;
mod rules;
mod session;
mod spectator;

pub use callbacks::SessionCallbacks;
pub use error::{Result, SessionError};
pub use rules::{CachedFenRules, ChessRules, STANDARD_START_FEN};
pub use session::{CreateGameOptions, JoinGameOptions, Session};
pub use spectator::{SpectatorConnectOptions, SpectatorSession, FULL_SYNC_TIMEOUT};
