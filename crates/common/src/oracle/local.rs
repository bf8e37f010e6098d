//! In-process oracle
//!
//! [`LocalOracle`] is the request side: it numbers requests and pushes them
//! onto a flume channel. [`OracleWorker`] is the other end: it owns the
//! signing and masking keys, decrypts queued jobs and calls back into a
//! [`SharedPipeline`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

use crate::aggregate::{AggregateError, CiphertextHandle, CiphertextStore, MaskedCiphertext};
use crate::crypto::{PublicKey, Secret, SecretKey};
use crate::identity::Identity;
use crate::pipeline::{CallbackReport, SharedPipeline};

use super::{
    encode_values, DecryptionOracle, DecryptionProof, DecryptionResult, OracleError, RequestId,
};

/// A queued decryption request
#[derive(Debug, Clone)]
pub struct OracleJob {
    pub request_id: RequestId,
    pub handles: Vec<CiphertextHandle>,
}

/// Request side of the in-process oracle
///
/// Cheap to clone; clones share the request counter and the queue.
#[derive(Debug, Clone)]
pub struct LocalOracle {
    next_id: Arc<AtomicU64>,
    tx: flume::Sender<OracleJob>,
    public_key: PublicKey,
}

impl LocalOracle {
    /// Create the oracle and the receiver its worker drains
    pub fn new(public_key: PublicKey) -> (Self, OracleJobReceiver) {
        let (tx, rx) = flume::unbounded();
        (
            Self {
                next_id: Arc::new(AtomicU64::new(1)),
                tx,
                public_key,
            },
            OracleJobReceiver { rx },
        )
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }
}

impl DecryptionOracle for LocalOracle {
    fn submit_decryption_request(
        &self,
        handles: &[CiphertextHandle],
    ) -> Result<RequestId, OracleError> {
        let request_id = RequestId(self.next_id.fetch_add(1, Ordering::SeqCst));
        tracing::debug!(
            "LOCAL_ORACLE: queueing request {} for {} handles",
            request_id,
            handles.len()
        );
        self.tx
            .send(OracleJob {
                request_id,
                handles: handles.to_vec(),
            })
            .map_err(|_| OracleError::Unavailable("oracle worker has been dropped".to_string()))?;
        Ok(request_id)
    }

    fn verify_proof(
        &self,
        request_id: RequestId,
        cleartext: &[u8],
        proof: &DecryptionProof,
    ) -> bool {
        proof.verify(&self.public_key, request_id, cleartext)
    }

    fn caller(&self) -> Identity {
        Identity::from(&self.public_key)
    }
}

/// Receiving end of the oracle queue
#[derive(Debug)]
pub struct OracleJobReceiver {
    rx: flume::Receiver<OracleJob>,
}

impl OracleJobReceiver {
    /// Try to receive a job without blocking
    ///
    /// Returns None if no jobs are queued or all senders have been dropped.
    pub fn try_recv(&self) -> Option<OracleJob> {
        self.rx.try_recv().ok()
    }

    /// Wait for the next job. Returns None once every sender is gone.
    pub async fn recv_async(&self) -> Option<OracleJob> {
        self.rx.recv_async().await.ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// Fulfillment side of the in-process oracle
#[derive(Debug, Clone)]
pub struct OracleWorker {
    signing_key: SecretKey,
    masking_key: Secret,
    store: CiphertextStore,
}

impl OracleWorker {
    pub fn new(signing_key: SecretKey, masking_key: Secret, store: CiphertextStore) -> Self {
        Self {
            signing_key,
            masking_key,
            store,
        }
    }

    /// The identity callbacks from this worker are delivered as
    pub fn identity(&self) -> Identity {
        Identity::from(&self.signing_key)
    }

    /// Decrypt a job's handles and sign the result
    pub fn fulfill(&self, job: &OracleJob) -> Result<DecryptionResult, OracleError> {
        let mut values = Vec::with_capacity(job.handles.len());
        for handle in &job.handles {
            let data = self.store.get(handle).map_err(AggregateError::from)?;
            let data = data.ok_or_else(|| {
                OracleError::Default(anyhow::anyhow!("ciphertext {} is not in the store", handle))
            })?;
            let ciphertext = MaskedCiphertext::from_bytes(&data)?;
            values.push(ciphertext.decrypt(&self.masking_key));
        }

        let cleartext = encode_values(&values);
        let proof = DecryptionProof::sign(&self.signing_key, job.request_id, &cleartext);
        Ok(DecryptionResult {
            request_id: job.request_id,
            cleartext,
            proof,
        })
    }

    /// Drain the queue, delivering each result to `pipeline`
    ///
    /// Every callback outcome is logged and, if `reports` is set, forwarded
    /// there. The loop ends on shutdown or once the oracle side is dropped.
    pub async fn run(
        self,
        jobs: OracleJobReceiver,
        pipeline: SharedPipeline,
        reports: Option<flume::Sender<CallbackReport>>,
        mut shutdown_rx: watch::Receiver<()>,
    ) {
        tracing::info!("Oracle worker started as {}", self.identity());
        loop {
            tokio::select! {
                job = jobs.recv_async() => {
                    let Some(job) = job else {
                        tracing::info!("Oracle queue closed, worker exiting");
                        break;
                    };
                    let report = match self.fulfill(&job) {
                        Ok(result) => {
                            let outcome = pipeline.deliver(self.identity(), &result).await;
                            CallbackReport { request_id: job.request_id, outcome }
                        }
                        Err(e) => {
                            tracing::error!("Oracle failed to fulfill request {}: {}", job.request_id, e);
                            continue;
                        }
                    };
                    if let Some(reports) = &reports {
                        if reports.send(report).is_err() {
                            tracing::debug!("callback report receiver dropped");
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    tracing::info!("Oracle worker shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_ids_are_unique_and_queued_in_order() {
        let key = SecretKey::generate();
        let (oracle, jobs) = LocalOracle::new(key.public());
        let handle = CiphertextHandle::from([1u8; 32]);

        let first = oracle.submit_decryption_request(&[handle]).unwrap();
        let second = oracle.clone().submit_decryption_request(&[handle]).unwrap();
        assert!(second > first);

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs.try_recv().unwrap().request_id, first);
        assert_eq!(jobs.try_recv().unwrap().request_id, second);
        assert!(jobs.try_recv().is_none());
    }

    #[test]
    fn test_submit_fails_once_worker_side_is_dropped() {
        let (oracle, jobs) = LocalOracle::new(SecretKey::generate().public());
        drop(jobs);
        assert!(matches!(
            oracle.submit_decryption_request(&[]),
            Err(OracleError::Unavailable(_))
        ));
    }

    #[test]
    fn test_fulfill_produces_verifiable_result() {
        let signing_key = SecretKey::generate();
        let masking_key = Secret::generate();
        let store = CiphertextStore::new();
        let handle = store
            .put(MaskedCiphertext::encrypt(&masking_key, 99).to_bytes().unwrap())
            .unwrap();

        let (oracle, _jobs) = LocalOracle::new(signing_key.public());
        let worker = OracleWorker::new(signing_key, masking_key, store);
        let job = OracleJob {
            request_id: RequestId(5),
            handles: vec![handle],
        };

        let result = worker.fulfill(&job).unwrap();
        assert_eq!(crate::oracle::decode_value(&result.cleartext), Some(99));
        assert!(oracle.verify_proof(RequestId(5), &result.cleartext, &result.proof));
        assert_eq!(worker.identity(), oracle.caller());
    }
}
