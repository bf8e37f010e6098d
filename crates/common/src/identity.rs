//! # Identities
//!
//! An [`Identity`] is the opaque address of an actor: the owner, a provider,
//! or the oracle's designated callback caller. Identities are derived from
//! Ed25519 public keys but the protocol never interprets them beyond
//! equality, so tests and callers may also build them from raw bytes.
//!
//! The all-zero identity is reserved as the "null" address and is rejected
//! wherever a role is assigned.

use serde::{Deserialize, Serialize};

use crate::crypto::{PublicKey, SecretKey, PUBLIC_KEY_SIZE};

/// Size of an identity in bytes
pub const IDENTITY_SIZE: usize = PUBLIC_KEY_SIZE;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity([u8; IDENTITY_SIZE]);

impl Identity {
    /// The reserved null identity
    pub const ZERO: Identity = Identity([0; IDENTITY_SIZE]);

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    pub fn as_bytes(&self) -> &[u8; IDENTITY_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse an identity from a hexadecimal string
    ///
    /// Accepts both plain hex and "0x"-prefixed hex strings.
    pub fn from_hex(hex: &str) -> Result<Self, IdentityError> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        let mut buff = [0; IDENTITY_SIZE];
        hex::decode_to_slice(hex, &mut buff).map_err(|_| IdentityError::InvalidHex)?;
        Ok(Identity(buff))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity hex decode error")]
    InvalidHex,
}

impl From<[u8; IDENTITY_SIZE]> for Identity {
    fn from(bytes: [u8; IDENTITY_SIZE]) -> Self {
        Identity(bytes)
    }
}

impl From<&PublicKey> for Identity {
    fn from(key: &PublicKey) -> Self {
        Identity(key.to_bytes())
    }
}

impl From<PublicKey> for Identity {
    fn from(key: PublicKey) -> Self {
        Identity::from(&key)
    }
}

impl From<&SecretKey> for Identity {
    fn from(key: &SecretKey) -> Self {
        Identity::from(key.public())
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl std::fmt::Debug for Identity {
    // short form keeps log lines readable
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Identity(0x{})", &self.to_hex()[..12])
    }
}
