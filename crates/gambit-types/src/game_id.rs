//! `GameId` / `InviteCode` — the swarm topic and its human-shareable form.

use crate::error::{Result, TypesError};
use once_cell::sync::Lazy;
use rand::RngCore;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static INVITE_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Fa-f0-9]{3}-[A-Fa-f0-9]{3}$").expect("static regex"));

/// A 32-byte swarm topic / game identifier.
///
/// Derived from an [`InviteCode`] by taking its six hex characters as the
/// first 3 bytes and zero-padding the rest, so the same code always maps
/// to the same `GameId`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GameId([u8; 32]);

impl GameId {
    /// The length of a game id in bytes.
    pub const LEN: usize = 32;

    /// Builds a `GameId` from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if `bytes` is not exactly 32 bytes long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::LEN {
            return Err(TypesError::InvalidGameId(bytes.len()));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    /// Returns the raw bytes of this game id.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns the hex representation (64 characters).
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a `GameId` from its 64-character hex representation.
    ///
    /// # Errors
    ///
    /// Returns an error if `s` is not valid hex or does not decode to
    /// exactly 32 bytes.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|_| TypesError::InvalidGameId(s.len()))?;
        Self::from_bytes(&bytes)
    }

    /// Derives a `GameId` from an invite code: the code's 3 raw bytes,
    /// right-padded with zero bytes to 32.
    #[must_use]
    pub fn from_invite_code(code: &InviteCode) -> Self {
        let mut bytes = [0u8; 32];
        bytes[..3].copy_from_slice(&code.to_bytes());
        Self(bytes)
    }

    /// Recovers the [`InviteCode`] this game id was derived from, by
    /// reading back its first 3 bytes.
    #[must_use]
    pub fn to_invite_code(&self) -> InviteCode {
        InviteCode::from_bytes([self.0[0], self.0[1], self.0[2]])
    }

    /// A filesystem-safe name for this game id, suitable for use as a
    /// storage directory / snapshot filename stem.
    #[must_use]
    pub fn sanitized(&self) -> String {
        self.to_hex()
    }
}

impl fmt::Debug for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GameId({})", self.to_hex())
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// A human-shareable six-hex-character invite code, formatted `XXX-XXX`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InviteCode([u8; 3]);

impl InviteCode {
    /// Generates a fresh invite code from random bytes.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 3];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Parses an invite code from its `XXX-XXX` textual form.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::InvalidInviteCode`] if `s` does not match
    /// `^[A-F0-9]{3}-[A-F0-9]{3}$` (case-insensitive).
    pub fn parse(s: &str) -> Result<Self> {
        if !INVITE_CODE_RE.is_match(s) {
            return Err(TypesError::InvalidInviteCode(s.to_string()));
        }
        let stripped: String = s.chars().filter(|c| *c != '-').collect();
        let bytes = hex::decode(stripped.to_lowercase())
            .map_err(|e| TypesError::InvalidInviteCode(e.to_string()))?;
        let mut arr = [0u8; 3];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    fn from_bytes(bytes: [u8; 3]) -> Self {
        Self(bytes)
    }

    /// Returns the raw 3 bytes this code encodes.
    #[must_use]
    pub fn to_bytes(self) -> [u8; 3] {
        self.0
    }

    /// Formats the code as uppercase `XXX-XXX`.
    #[must_use]
    pub fn formatted(&self) -> String {
        let hex = hex::encode_upper(self.0);
        format!("{}-{}", &hex[..3], &hex[3..])
    }
}

impl fmt::Debug for InviteCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InviteCode({})", self.formatted())
    }
}

impl fmt::Display for InviteCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.formatted())
    }
}

impl std::str::FromStr for InviteCode {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for InviteCode {
    type Error = TypesError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<InviteCode> for String {
    fn from(code: InviteCode) -> Self {
        code.formatted()
    }
}
