//! Peer identity and connection metadata.

use gambit_identity::PublicKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;

/// A stable 16-hex-char prefix of a remote peer's public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerId(
    #[serde(with = "hex_16")]
    [u8; 8],
);

impl PeerId {
    /// Derives a peer id from a public key (its first 8 bytes).
    #[must_use]
    pub fn from_public_key(key: &PublicKey) -> Self {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&key.as_bytes()[..8]);
        Self(bytes)
    }

    /// Parses a peer id from its 16-hex-char form.
    ///
    /// # Errors
    ///
    /// Returns an error if `s` is not exactly 16 hex characters.
    pub fn parse(s: &str) -> Result<Self, hex::FromHexError> {
        let decoded = hex::decode(s)?;
        if decoded.len() != 8 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&decoded);
        Ok(Self(bytes))
    }

    /// Returns the raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

mod hex_16 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8; 8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 8], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let decoded = hex::decode(&s).map_err(serde::de::Error::custom)?;
        if decoded.len() != 8 {
            return Err(serde::de::Error::custom("invalid peer id length"));
        }
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&decoded);
        Ok(bytes)
    }
}

/// Information about a connected peer, surfaced via `onConnect`.
#[derive(Debug, Clone, Copy)]
pub struct PeerInfo {
    /// The peer's observed network address.
    pub address: SocketAddr,
    /// Whether this connection was inbound (we were dialed) or outbound.
    pub inbound: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use gambit_identity::Keypair;

    #[test]
    fn peer_id_round_trips_through_hex() {
        let pk = Keypair::generate().public_key();
        let peer_id = PeerId::from_public_key(&pk);
        let parsed = PeerId::parse(&peer_id.to_string()).unwrap();
        assert_eq!(peer_id, parsed);
        assert_eq!(peer_id.to_string().len(), 16);
    }

    #[test]
    fn peer_id_serde_roundtrip() {
        let pk = Keypair::generate().public_key();
        let peer_id = PeerId::from_public_key(&pk);
        let json = serde_json::to_string(&peer_id).unwrap();
        let parsed: PeerId = serde_json::from_str(&json).unwrap();
        assert_eq!(peer_id, parsed);
    }
}
