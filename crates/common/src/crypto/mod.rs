//! Cryptographic primitives for sealbatch
//!
//! - **Identity & Attestation**: Ed25519 keypairs. Actor identities are derived
//!   from public keys; the decryption oracle signs every result it delivers.
//! - **Masking**: a keyed BLAKE3 PRF used by the masked-sum aggregate engine.
//!
//! # Proofs
//!
//! A decryption proof is an Ed25519 signature by the oracle key over a
//! domain-tagged encoding of `(request_id, cleartext)`; see
//! [`proof_message`](crate::oracle::proof_message). A proof for one request
//! never verifies for another, and any change to the cleartext invalidates it.

mod keys;
mod secret;

pub use ed25519_dalek::Signature;
pub use keys::{KeyError, PublicKey, SecretKey, PRIVATE_KEY_SIZE, PUBLIC_KEY_SIZE};
pub use secret::{Secret, SecretError, BLAKE3_HASH_SIZE, SECRET_SIZE};
