use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::CiphertextHandle;

/// In-memory, content-addressed ciphertext store
///
/// Clones share the same underlying map, so the engine, the oracle worker
/// and encrypting clients can all hold a handle to one store.
#[derive(Debug, Clone, Default)]
pub struct CiphertextStore {
    inner: Arc<RwLock<HashMap<CiphertextHandle, Vec<u8>>>>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("ciphertext store error: {0}")]
    Internal(String),
}

impl CiphertextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a blob and return its handle. Storing the same bytes twice is a no-op.
    pub fn put(&self, data: Vec<u8>) -> Result<CiphertextHandle, StoreError> {
        let handle = CiphertextHandle::for_bytes(&data);
        let mut inner = self.inner.write().map_err(|e| {
            StoreError::Internal(format!("failed to acquire write lock: {}", e))
        })?;
        inner.entry(handle).or_insert(data);
        Ok(handle)
    }

    pub fn get(&self, handle: &CiphertextHandle) -> Result<Option<Vec<u8>>, StoreError> {
        let inner = self.inner.read().map_err(|e| {
            StoreError::Internal(format!("failed to acquire read lock: {}", e))
        })?;
        Ok(inner.get(handle).cloned())
    }

    pub fn contains(&self, handle: &CiphertextHandle) -> Result<bool, StoreError> {
        let inner = self.inner.read().map_err(|e| {
            StoreError::Internal(format!("failed to acquire read lock: {}", e))
        })?;
        Ok(inner.contains_key(handle))
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        let inner = self.inner.read().map_err(|e| {
            StoreError::Internal(format!("failed to acquire read lock: {}", e))
        })?;
        Ok(inner.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_is_content_addressed() {
        let store = CiphertextStore::new();
        let a = store.put(b"ciphertext-a".to_vec()).unwrap();
        let again = store.put(b"ciphertext-a".to_vec()).unwrap();
        let b = store.put(b"ciphertext-b".to_vec()).unwrap();

        assert_eq!(a, again);
        assert_ne!(a, b);
        assert_eq!(store.len().unwrap(), 2);
        assert_eq!(store.get(&a).unwrap().unwrap(), b"ciphertext-a".to_vec());
    }

    #[test]
    fn test_clones_share_contents() {
        let store = CiphertextStore::new();
        let clone = store.clone();
        let handle = clone.put(vec![1, 2, 3]).unwrap();
        assert!(store.contains(&handle).unwrap());
        assert!(store.get(&CiphertextHandle::from([0u8; 32])).unwrap().is_none());
    }
}
