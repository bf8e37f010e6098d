/**
 * Who may act on a pipeline.
 *  Owner, providers and the pause flag.
 */
pub mod access;
/**
 * Encrypted aggregation over opaque
 *  ciphertext handles, plus the bundled
 *  additive-masking engine and its store.
 */
pub mod aggregate;
/**
 * Open/closed batch lifecycle and
 *  batch numbering.
 */
pub mod batch;
/**
 * Cryptographic types and operations.
 *  - Ed25519 keys for owners and the oracle
 *  - Symmetric masking keys
 */
pub mod crypto;
pub mod identity;
/**
 * The asynchronous decryption oracle boundary
 *  and an in-process implementation of it.
 */
pub mod oracle;
/**
 * The pipeline itself: every entry point,
 *  the two-phase decryption reconciliation,
 *  events and configuration.
 */
pub mod pipeline;
pub mod rate_limit;
/**
 * Harness for driving a pipeline and its
 *  oracle in-process from tests.
 */
pub mod testkit;

pub mod prelude {
    pub use crate::access::{AccessError, Role};
    pub use crate::aggregate::{
        AggregateEngine, CiphertextHandle, CiphertextStore, ContributionPolicy, MaskedCiphertext,
        MaskedSumEngine,
    };
    pub use crate::batch::{Batch, BatchId};
    pub use crate::crypto::{PublicKey, Secret, SecretKey};
    pub use crate::identity::Identity;
    pub use crate::oracle::{
        DecryptionOracle, DecryptionProof, DecryptionResult, LocalOracle, OracleWorker, RequestId,
    };
    pub use crate::pipeline::{
        Event, Pipeline, PipelineConfig, PipelineError, SharedPipeline,
    };
    pub use crate::rate_limit::{ActionClass, Clock, ManualClock, SystemClock};
}
