//! Decryption oracle boundary
//!
//! The oracle is an external, asynchronous service. The pipeline hands it an
//! ordered list of ciphertext handles and gets back a [`RequestId`]; some time
//! later the oracle calls
//! [`Pipeline::on_decryption_result`](crate::pipeline::Pipeline::on_decryption_result)
//! with the cleartext and a [`DecryptionProof`].
//!
//! # Wire formats
//!
//! - **Cleartext**: one little-endian `u64` per decrypted handle, in request order.
//! - **Proof**: a 64-byte Ed25519 signature by the oracle key over
//!   [`proof_message`].
//!
//! [`LocalOracle`] and [`OracleWorker`] implement both sides in-process.

mod local;

use serde::{Deserialize, Serialize};

use crate::aggregate::{AggregateError, CiphertextHandle};
use crate::crypto::{PublicKey, SecretKey, Signature};
use crate::identity::Identity;

pub use local::{LocalOracle, OracleJob, OracleJobReceiver, OracleWorker};

const PROOF_DOMAIN: &[u8] = b"sealbatch/decryption-proof/v1";

/// Size of an encoded aggregate value in bytes
pub const CLEARTEXT_VALUE_SIZE: usize = 8;

/// Oracle-assigned identifier of a decryption request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Opaque authenticity proof delivered with a cleartext
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionProof(Vec<u8>);

impl DecryptionProof {
    /// Sign `cleartext` for `request_id` with the oracle key
    pub fn sign(key: &SecretKey, request_id: RequestId, cleartext: &[u8]) -> Self {
        let signature = key.sign(&proof_message(request_id, cleartext));
        Self(signature.to_bytes().to_vec())
    }

    /// Check the proof against the oracle's public key.
    ///
    /// Malformed proofs simply fail verification.
    pub fn verify(&self, key: &PublicKey, request_id: RequestId, cleartext: &[u8]) -> bool {
        let Ok(signature) = Signature::from_slice(&self.0) else {
            return false;
        };
        key.verify(&proof_message(request_id, cleartext), &signature)
            .is_ok()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for DecryptionProof {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// The message an oracle signs to attest a decryption result
pub fn proof_message(request_id: RequestId, cleartext: &[u8]) -> Vec<u8> {
    let mut msg = Vec::with_capacity(PROOF_DOMAIN.len() + 16 + cleartext.len());
    msg.extend_from_slice(PROOF_DOMAIN);
    msg.extend_from_slice(&request_id.0.to_be_bytes());
    msg.extend_from_slice(&(cleartext.len() as u64).to_be_bytes());
    msg.extend_from_slice(cleartext);
    msg
}

pub fn encode_values(values: &[u64]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode a cleartext holding exactly one value
pub fn decode_value(cleartext: &[u8]) -> Option<u64> {
    let bytes: [u8; CLEARTEXT_VALUE_SIZE] = cleartext.try_into().ok()?;
    Some(u64::from_le_bytes(bytes))
}

/// A result as delivered by the oracle to the callback entry point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptionResult {
    pub request_id: RequestId,
    pub cleartext: Vec<u8>,
    pub proof: DecryptionProof,
}

#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("oracle unavailable: {0}")]
    Unavailable(String),
    #[error("oracle reissued request id {0}")]
    DuplicateRequest(RequestId),
    #[error("oracle could not decrypt: {0}")]
    Decrypt(#[from] AggregateError),
    #[error("oracle error: {0}")]
    Default(#[from] anyhow::Error),
}

/// The consumed half of the oracle integration
pub trait DecryptionOracle: Send + Sync + std::fmt::Debug {
    /// Queue decryption of `handles`. The order given here is the order the
    /// cleartext values come back in.
    fn submit_decryption_request(
        &self,
        handles: &[CiphertextHandle],
    ) -> Result<RequestId, OracleError>;

    /// Attestation check for a delivered result
    fn verify_proof(&self, request_id: RequestId, cleartext: &[u8], proof: &DecryptionProof)
        -> bool;

    /// The only identity allowed to deliver callbacks, when the pipeline
    /// restricts callers
    fn caller(&self) -> Identity;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proof_binds_request_and_cleartext() {
        let key = SecretKey::generate();
        let cleartext = encode_values(&[42]);
        let proof = DecryptionProof::sign(&key, RequestId(1), &cleartext);

        assert!(proof.verify(&key.public(), RequestId(1), &cleartext));
        assert!(!proof.verify(&key.public(), RequestId(2), &cleartext));
        assert!(!proof.verify(&key.public(), RequestId(1), &encode_values(&[43])));
        assert!(!proof.verify(&SecretKey::generate().public(), RequestId(1), &cleartext));
    }

    #[test]
    fn test_malformed_proof_fails_verification() {
        let key = SecretKey::generate();
        let proof = DecryptionProof::from(vec![0u8; 12]);
        assert!(!proof.verify(&key.public(), RequestId(1), &[0u8; 8]));
    }

    #[test]
    fn test_value_codec() {
        assert_eq!(decode_value(&encode_values(&[7])), Some(7));
        assert_eq!(decode_value(&encode_values(&[7, 8])), None);
        assert_eq!(decode_value(&[]), None);
    }
}
