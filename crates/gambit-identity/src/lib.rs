//! # Gambit Identity
//!
//! Cryptographic identity management for gambit peers using Ed25519
//! signatures. A single keypair serves double duty in the surrounding
//! crates: its public key is the `WriterId` authorized to append to a
//! [`gambit_log`](../gambit_log/index.html) and, truncated, the `PeerId`
//! used for swarm peer addressing.
//!
//! ## Example
//!
//! ```rust
//! use gambit_identity::Keypair;
//!
//! let keypair = Keypair::generate();
//! let message = b"e2e4";
//! let signature = keypair.sign(message);
//! assert!(keypair.verify(message, &signature).is_ok());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod keypair;
mod public_key;
mod signature;

pub use error::{IdentityError, Result};
pub use keypair::Keypair;
pub use public_key::PublicKey;
pub use signature::Signature;
