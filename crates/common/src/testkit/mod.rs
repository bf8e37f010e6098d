//! In-process harness for driving a pipeline end to end
//!
//! Wires a [`Pipeline`] to a [`MaskedSumEngine`], a [`LocalOracle`] and an
//! [`OracleWorker`] sharing one [`CiphertextStore`], all on a
//! [`ManualClock`]. Oracle jobs are not processed until the test asks for
//! them, so callbacks can be delayed, reordered, replayed or tampered with.
//!
//! # Example
//!
//! ```rust,ignore
//! use common::testkit::Harness;
//!
//! let mut h = Harness::new();
//! let alice = h.provider();
//! h.open_batch();
//! h.submit(alice, 3)?;
//!
//! let request_id = h.request()?;
//! let result = h.next_result().unwrap();
//! assert_eq!(h.deliver(&result)?, 3);
//! ```
use std::sync::Arc;

use crate::aggregate::{CiphertextHandle, CiphertextStore, MaskedCiphertext, MaskedSumEngine};
use crate::batch::BatchId;
use crate::crypto::{Secret, SecretKey};
use crate::identity::Identity;
use crate::oracle::{DecryptionResult, LocalOracle, OracleJob, OracleJobReceiver, OracleWorker, RequestId};
use crate::pipeline::{Pipeline, PipelineConfig, PipelineError, SharedPipeline};
use crate::rate_limit::ManualClock;

/// Unix time every harness clock starts at
pub const HARNESS_START: u64 = 1_700_000_000;

pub struct Harness {
    pub pipeline: Pipeline,
    pub clock: ManualClock,
    pub owner: Identity,
    pub store: CiphertextStore,
    pub masking_key: Secret,
    pub oracle: LocalOracle,
    pub worker: OracleWorker,
    pub jobs: OracleJobReceiver,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(PipelineConfig::default())
    }

    pub fn with_config(config: PipelineConfig) -> Self {
        let clock = ManualClock::new(HARNESS_START);
        let owner = Identity::from(&SecretKey::generate());
        let store = CiphertextStore::new();
        let masking_key = Secret::generate();
        let oracle_key = SecretKey::generate();

        let (oracle, jobs) = LocalOracle::new(oracle_key.public());
        let worker = OracleWorker::new(oracle_key, masking_key.clone(), store.clone());
        let pipeline = Pipeline::new(
            config,
            owner,
            Arc::new(MaskedSumEngine::new(store.clone())),
            Arc::new(oracle.clone()),
            Arc::new(clock.clone()),
        )
        .expect("harness owner is never zero");

        Self {
            pipeline,
            clock,
            owner,
            store,
            masking_key,
            oracle,
            worker,
            jobs,
        }
    }

    /// Register a fresh provider identity
    pub fn provider(&mut self) -> Identity {
        let provider = Identity::from(&SecretKey::generate());
        self.pipeline
            .add_provider(self.owner, provider)
            .expect("owner can add providers while unpaused");
        provider
    }

    pub fn open_batch(&mut self) -> BatchId {
        self.pipeline
            .open_batch(self.owner)
            .expect("owner can open a batch while unpaused")
    }

    pub fn close_batch(&mut self) -> BatchId {
        self.pipeline
            .close_batch(self.owner)
            .expect("owner can close an open batch")
    }

    /// Encrypt `value` under the harness key and store it
    pub fn encrypt(&self, value: u64) -> CiphertextHandle {
        let ciphertext = MaskedCiphertext::encrypt(&self.masking_key, value);
        self.store
            .put(ciphertext.to_bytes().expect("ciphertext encodes"))
            .expect("store lock is healthy")
    }

    pub fn submit(&mut self, provider: Identity, value: u64) -> Result<BatchId, PipelineError> {
        let handle = self.encrypt(value);
        self.pipeline.submit_encrypted_data(provider, handle)
    }

    /// Request decryption as the owner
    pub fn request(&mut self) -> Result<RequestId, PipelineError> {
        self.pipeline.request_aggregate_decryption(self.owner)
    }

    /// Advance the clock past the cooldown
    pub fn cool_down(&self) -> u64 {
        self.clock.advance(self.pipeline.cooldown_secs())
    }

    pub fn next_job(&self) -> Option<OracleJob> {
        self.jobs.try_recv()
    }

    /// Fulfill the oldest queued oracle job without delivering it
    pub fn next_result(&self) -> Option<DecryptionResult> {
        let job = self.next_job()?;
        Some(self.worker.fulfill(&job).expect("queued job decrypts"))
    }

    /// Deliver a result as the oracle
    pub fn deliver(&mut self, result: &DecryptionResult) -> Result<u64, PipelineError> {
        self.deliver_as(self.oracle_identity(), result)
    }

    pub fn deliver_as(
        &mut self,
        caller: Identity,
        result: &DecryptionResult,
    ) -> Result<u64, PipelineError> {
        self.pipeline
            .on_decryption_result(caller, result.request_id, &result.cleartext, &result.proof)
    }

    pub fn oracle_identity(&self) -> Identity {
        self.worker.identity()
    }

    /// Move the pipeline behind a lock for async tests. The job queue is
    /// handed back separately for the worker task to drain.
    pub fn into_shared(self) -> (SharedHarness, OracleJobReceiver) {
        let shared = SharedHarness {
            pipeline: SharedPipeline::new(self.pipeline),
            clock: self.clock,
            owner: self.owner,
            store: self.store,
            masking_key: self.masking_key,
            oracle: self.oracle,
            worker: self.worker,
        };
        (shared, self.jobs)
    }
}

/// A [`Harness`] whose pipeline is shared with an oracle worker task
pub struct SharedHarness {
    pub pipeline: SharedPipeline,
    pub clock: ManualClock,
    pub owner: Identity,
    pub store: CiphertextStore,
    pub masking_key: Secret,
    pub oracle: LocalOracle,
    pub worker: OracleWorker,
}

impl SharedHarness {
    pub fn encrypt(&self, value: u64) -> CiphertextHandle {
        let ciphertext = MaskedCiphertext::encrypt(&self.masking_key, value);
        self.store
            .put(ciphertext.to_bytes().expect("ciphertext encodes"))
            .expect("store lock is healthy")
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
