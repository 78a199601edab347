//! Error type for [`crate::Log`] operations.

use thiserror::Error;

/// Errors returned by log storage, replication, and codec operations.
#[derive(Debug, Error)]
pub enum LogError {
    /// The writer is not present in `writers.json`.
    #[error("writer {0} is not authorized for this log")]
    UnknownWriter(String),

    /// A writer was already authorized; `addWriter` is not idempotent-by-error.
    #[error("writer {0} is already authorized")]
    WriterAlreadyAuthorized(String),

    /// A record's declared length or encoding was invalid and could not be decoded.
    #[error("corrupt log record in writer file {0} at offset {1}: {2}")]
    CorruptRecord(String, u64, String),

    /// The on-disk `writers.json` index could not be parsed.
    #[error("corrupt writers index: {0}")]
    CorruptIndex(String),

    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Underlying JSON (de)serialization failure.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Convenience alias for [`LogError`]-returning results.
pub type Result<T> = std::result::Result<T, LogError>;
