//! Swarm transport error types.

use thiserror::Error;

/// Errors that can occur during swarm operations.
#[derive(Debug, Error)]
pub enum SwarmError {
    /// The underlying network stack could not be used to join a topic.
    #[error("failed to join topic: {0}")]
    TopicJoinFailed(String),

    /// A connection limit was reached for a topic.
    #[error("connection limit reached: {0}")]
    ConnectionLimit(usize),

    /// The rendezvous backend failed.
    #[error("rendezvous error: {0}")]
    Rendezvous(String),

    /// I/O error while accepting or dialing a connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized Result type for swarm operations.
pub type Result<T> = std::result::Result<T, SwarmError>;
