//! Error type for [`crate::Persistence`] operations.

use thiserror::Error;

/// Errors returned while saving or loading persisted game state.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No snapshot/connection-info file exists for the requested game.
    #[error("no saved data for game {0}")]
    NotFound(String),

    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Underlying JSON (de)serialization failure.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Convenience alias for [`StorageError`]-returning results.
pub type Result<T> = std::result::Result<T, StorageError>;
