//! # Gambit Storage
//!
//! Atomic, garbage-collected persistence for saved games and connection
//! info: one JSON blob per game per kind, written via write-temp-then-rename
//! so a crash mid-write never corrupts the previous good copy.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod persistence;

pub use error::{Result, StorageError};
pub use persistence::{Persistence, DEFAULT_MAX_SNAPSHOTS};
