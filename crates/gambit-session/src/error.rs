//! The session error taxonomy.
//!
//! Recoverable kinds (`TransportTransient`, `LogCorruption`) are handled
//! and logged internally and never escape a public method; the rest are
//! delivered to the caller two ways at once: as the synchronous `Err` of
//! the operation that triggered them, and via
//! [`crate::SessionCallbacks::on_error`] for callers that only watch the
//! callback stream.

use thiserror::Error;

/// Errors a [`crate::Session`] or [`crate::SpectatorSession`] can produce.
#[derive(Debug, Error, Clone)]
pub enum SessionError {
    /// A send/receive over the swarm transport failed but the connection
    /// may still recover on its own (handled internally, logged).
    #[error("transient transport error: {0}")]
    TransportTransient(String),

    /// The swarm transport failed in a way reconnection cannot fix.
    #[error("fatal transport error: {0}")]
    TransportFatal(String),

    /// Two writers' logs disagree in a way that cannot be linearized.
    #[error("log conflict: {0}")]
    LogConflict(String),

    /// An on-disk log record was corrupt (handled internally via
    /// truncate-to-last-good-record, logged).
    #[error("log corruption: {0}")]
    LogCorruption(String),

    /// A move failed field validation or turn discipline.
    #[error("invalid move: {0}")]
    MoveInvalid(String),

    /// An operation was attempted in a state that forbids it (e.g.
    /// `sendMove` while not `active`).
    #[error("state violation: {0}")]
    StateViolation(String),

    /// No peer handshake arrived within the handshake timeout.
    #[error("handshake timed out")]
    HandshakeTimeout,
}

/// A specialized `Result` for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

impl From<gambit_log::LogError> for SessionError {
    fn from(err: gambit_log::LogError) -> Self {
        Self::LogCorruption(err.to_string())
    }
}

impl From<gambit_storage::StorageError> for SessionError {
    fn from(err: gambit_storage::StorageError) -> Self {
        Self::TransportFatal(err.to_string())
    }
}

impl From<gambit_types::TypesError> for SessionError {
    fn from(err: gambit_types::TypesError) -> Self {
        Self::MoveInvalid(err.to_string())
    }
}
