//! Additive masking over `u64`
//!
//! `Enc_k(m; r) = (m + PRF_k(r)) mod 2^64`, with the nonce `r` carried next to
//! the masked word. Adding two ciphertexts adds the masked words and
//! concatenates the nonce lists, so an aggregate unmasks with the key alone:
//! subtract the PRF of every nonce it carries.
//!
//! This exists to give the pipeline a deterministic, key-dependent engine to
//! reconcile against. It makes no confidentiality claims beyond that.

use serde::{Deserialize, Serialize};

use crate::crypto::Secret;

use super::{AggregateEngine, AggregateError, CiphertextHandle, CiphertextStore};

/// Size of a masking nonce in bytes
pub const NONCE_SIZE: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskedCiphertext {
    masked: u64,
    nonces: Vec<[u8; NONCE_SIZE]>,
}

impl MaskedCiphertext {
    /// Encrypt `value` under `key` with a fresh random nonce
    pub fn encrypt(key: &Secret, value: u64) -> Self {
        let mut nonce = [0u8; NONCE_SIZE];
        getrandom::getrandom(&mut nonce).expect("failed to generate random bytes");
        Self::encrypt_with_nonce(key, value, nonce)
    }

    pub fn encrypt_with_nonce(key: &Secret, value: u64, nonce: [u8; NONCE_SIZE]) -> Self {
        Self {
            masked: value.wrapping_add(key.mask(&nonce)),
            nonces: vec![nonce],
        }
    }

    pub fn decrypt(&self, key: &Secret) -> u64 {
        self.nonces
            .iter()
            .fold(self.masked, |acc, nonce| acc.wrapping_sub(key.mask(nonce)))
    }

    /// Homomorphic addition
    pub fn combine(&self, other: &MaskedCiphertext) -> MaskedCiphertext {
        let mut nonces = self.nonces.clone();
        nonces.extend_from_slice(&other.nonces);
        MaskedCiphertext {
            masked: self.masked.wrapping_add(other.masked),
            nonces,
        }
    }

    /// Number of encrypted terms folded into this ciphertext
    pub fn terms(&self) -> usize {
        self.nonces.len()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, AggregateError> {
        bincode::serialize(self)
            .map_err(|e| anyhow::anyhow!("failed to encode ciphertext: {}", e).into())
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, AggregateError> {
        bincode::deserialize(data)
            .map_err(|e| anyhow::anyhow!("failed to decode ciphertext: {}", e).into())
    }
}

/// Sums masked ciphertexts held in a [`CiphertextStore`]
///
/// The aggregate is written back to the store so the oracle can fetch it
/// by handle.
#[derive(Debug, Clone)]
pub struct MaskedSumEngine {
    store: CiphertextStore,
}

impl MaskedSumEngine {
    pub fn new(store: CiphertextStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &CiphertextStore {
        &self.store
    }

    fn load(&self, handle: &CiphertextHandle) -> Result<MaskedCiphertext, AggregateError> {
        let data = self.store.get(handle)?.ok_or_else(|| {
            AggregateError::NotInitialized(format!("ciphertext {} is not in the store", handle))
        })?;
        MaskedCiphertext::from_bytes(&data)
    }
}

impl AggregateEngine for MaskedSumEngine {
    fn aggregate(&self, inputs: &[CiphertextHandle]) -> Result<CiphertextHandle, AggregateError> {
        let (first, rest) = inputs.split_first().ok_or_else(|| {
            AggregateError::NotInitialized("no encrypted inputs to aggregate".to_string())
        })?;

        let mut total = self.load(first)?;
        for handle in rest {
            total = total.combine(&self.load(handle)?);
        }

        let handle = self.store.put(total.to_bytes()?)?;
        tracing::debug!(
            "aggregated {} inputs ({} terms) into {}",
            inputs.len(),
            total.terms(),
            handle
        );
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put(store: &CiphertextStore, key: &Secret, value: u64) -> CiphertextHandle {
        let ciphertext = MaskedCiphertext::encrypt(key, value);
        store.put(ciphertext.to_bytes().unwrap()).unwrap()
    }

    #[test]
    fn test_sum_decrypts_with_key() {
        let key = Secret::generate();
        let store = CiphertextStore::new();
        let engine = MaskedSumEngine::new(store.clone());

        let inputs = vec![put(&store, &key, 3), put(&store, &key, 5), put(&store, &key, 7)];
        let aggregate = engine.aggregate(&inputs).unwrap();

        let data = store.get(&aggregate).unwrap().unwrap();
        let ciphertext = MaskedCiphertext::from_bytes(&data).unwrap();
        assert_eq!(ciphertext.terms(), 3);
        assert_eq!(ciphertext.decrypt(&key), 15);
        assert_ne!(ciphertext.decrypt(&Secret::generate()), 15);
    }

    #[test]
    fn test_aggregate_is_deterministic_and_order_sensitive() {
        let key = Secret::generate();
        let store = CiphertextStore::new();
        let engine = MaskedSumEngine::new(store.clone());

        let a = put(&store, &key, 1);
        let b = put(&store, &key, 2);

        assert_eq!(
            engine.aggregate(&[a, b]).unwrap(),
            engine.aggregate(&[a, b]).unwrap()
        );
        assert_ne!(
            engine.aggregate(&[a, b]).unwrap(),
            engine.aggregate(&[b, a]).unwrap()
        );
    }

    #[test]
    fn test_wrapping_values_round_trip() {
        let key = Secret::generate();
        let a = MaskedCiphertext::encrypt(&key, u64::MAX);
        let b = MaskedCiphertext::encrypt(&key, 2);
        assert_eq!(a.combine(&b).decrypt(&key), 1);
    }

    #[test]
    fn test_uninitialized_inputs_fail_fast() {
        let engine = MaskedSumEngine::new(CiphertextStore::new());

        assert!(matches!(
            engine.aggregate(&[]),
            Err(AggregateError::NotInitialized(_))
        ));
        assert!(matches!(
            engine.aggregate(&[CiphertextHandle::from([7u8; 32])]),
            Err(AggregateError::NotInitialized(_))
        ));
        assert!(engine.store().is_empty().unwrap());
    }
}
