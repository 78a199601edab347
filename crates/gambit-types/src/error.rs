//! Error types for the shared data model.

use thiserror::Error;

/// Errors that can occur while constructing or validating gambit types.
#[derive(Debug, Error)]
pub enum TypesError {
    /// An invite code did not match `^[A-F0-9]{3}-[A-F0-9]{3}$`.
    #[error("invalid invite code: {0}")]
    InvalidInviteCode(String),

    /// A game identifier was not 32 bytes.
    #[error("invalid game id: expected 32 bytes, got {0}")]
    InvalidGameId(usize),

    /// A move referenced a square outside `[a-h][1-8]`.
    #[error("invalid square: {0}")]
    InvalidSquare(String),

    /// A move was missing a required field.
    #[error("move missing required field: {0}")]
    MissingField(&'static str),

    /// A move's timestamp fell outside the allowed bound relative to the
    /// previous move or the current time.
    #[error("move timestamp {0} out of bounds (previous {1}, now {2})")]
    TimestampOutOfBounds(u64, u64, u64),
}

/// A specialized Result type for gambit-types operations.
pub type Result<T> = std::result::Result<T, TypesError>;
