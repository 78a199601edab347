//! Error type for [`crate::EngineAdapter`] operations.

use thiserror::Error;

/// Errors returned while resolving, driving, or tearing down an engine
/// subprocess.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No usable engine binary was found (no explicit path, nothing on
    /// `PATH`, nothing at a well-known system path).
    #[error("no chess engine binary found")]
    BinaryNotFound,

    /// The subprocess could not be spawned.
    #[error("failed to spawn engine process: {0}")]
    Spawn(String),

    /// A correlated request (`uci`, `isready`, `go`, `stop`) did not
    /// receive its matching reply before its deadline.
    #[error("engine request timed out waiting for {0}")]
    Timeout(String),

    /// A newer correlated request on the same token superseded this one.
    #[error("engine request for {0} was superseded by a newer request")]
    Superseded(String),

    /// The engine process exited before replying.
    #[error("engine process exited unexpectedly")]
    ProcessExited,

    /// A line from the engine could not be parsed as a known reply.
    #[error("unparseable engine output: {0}")]
    Protocol(String),

    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias for [`EngineError`]-returning results.
pub type Result<T> = std::result::Result<T, EngineError>;
