//! # Gambit Swarm
//!
//! Peer discovery by a 32-byte topic and a duplex, framed, line-JSON
//! channel per connected peer. One [`Node`] represents a single
//! participant's exclusive ownership of at most one joined topic, matching
//! the Session's ownership of its swarm subscription.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod message;
mod node;
mod peer;
mod rendezvous;

pub use error::{Result, SwarmError};
pub use message::{GameInfo, GameStateSummary, PeerMessage, PlayersInfo};
pub use node::{
    JoinOptions, Node, SwarmCallbacks, DEFAULT_PLAYER_MAX_PEERS, DEFAULT_SPECTATOR_MAX_PEERS,
};
pub use peer::{PeerId, PeerInfo};
pub use rendezvous::{FsRendezvous, Rendezvous};
