//! # Gambit Log
//!
//! A multi-writer, append-only, crash-safe replicated log of chess moves.
//!
//! Every authorized writer owns one on-disk file of its own records; a
//! [`Log`] linearizes all writers' records into a single deterministic
//! order (timestamp ascending, writer id byte-lexicographic on ties) and
//! exposes that order as a [`View`]. Local writes go through
//! [`Log::append`]; remote writers' entries arrive through
//! [`Log::replicate`]. Both paths invoke the same [`LogApplication::apply`]
//! hook, so a game session only needs one code path for "a move happened".

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod entry;
mod error;
mod log;
mod view;
mod writer_store;
mod writers_index;

pub use codec::{decode_move, encode_move};
pub use entry::LinearizedEntry;
pub use error::{LogError, Result};
pub use log::{Log, LogApplication};
pub use view::View;
