//! Encrypted aggregation
//!
//! The pipeline never looks inside ciphertexts. It deals in
//! [`CiphertextHandle`]s, stable references to blobs in a
//! [`CiphertextStore`], and asks an [`AggregateEngine`] to fold a list of
//! handles into a single aggregate handle.
//!
//! Engines must be deterministic: the same ordered inputs always yield the
//! same aggregate handle. The reconciliation protocol relies on this to
//! recompute a request's fingerprint when the oracle calls back.
//!
//! [`MaskedSumEngine`] is the bundled engine: additive masking over `u64`
//! standing in for homomorphic addition.

mod masked;
mod store;

use serde::{Deserialize, Serialize};

use crate::crypto::BLAKE3_HASH_SIZE;

pub use masked::{MaskedCiphertext, MaskedSumEngine, NONCE_SIZE};
pub use store::{CiphertextStore, StoreError};

/// Content address of a ciphertext blob (BLAKE3 of its bytes)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CiphertextHandle([u8; BLAKE3_HASH_SIZE]);

impl CiphertextHandle {
    pub fn for_bytes(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; BLAKE3_HASH_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; BLAKE3_HASH_SIZE]> for CiphertextHandle {
    fn from(bytes: [u8; BLAKE3_HASH_SIZE]) -> Self {
        Self(bytes)
    }
}

impl std::fmt::Display for CiphertextHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::fmt::Debug for CiphertextHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CiphertextHandle({})", &self.to_hex()[..12])
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    /// An input was missing or the input list was empty
    #[error("encrypted input not initialized: {0}")]
    NotInitialized(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("aggregate engine error: {0}")]
    Default(#[from] anyhow::Error),
}

/// Opaque homomorphic capability: fold ciphertexts into one.
pub trait AggregateEngine: Send + Sync + std::fmt::Debug {
    /// Combine `inputs`, in order, into a single aggregate ciphertext.
    ///
    /// Must fail with [`AggregateError::NotInitialized`] rather than
    /// aggregate over an empty list or an unresolvable handle.
    fn aggregate(&self, inputs: &[CiphertextHandle]) -> Result<CiphertextHandle, AggregateError>;
}

/// Which accepted contributions feed the aggregate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionPolicy {
    /// Contributions tagged with the current batch id, in submission order
    #[default]
    CurrentBatch,
    /// Every accepted contribution, in submission order
    AllBatches,
}
