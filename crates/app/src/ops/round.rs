use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use tokio::sync::watch;

use common::aggregate::{
    AggregateError, CiphertextHandle, CiphertextStore, MaskedCiphertext, MaskedSumEngine,
    StoreError,
};
use common::batch::BatchId;
use common::crypto::SecretKey;
use common::identity::Identity;
use common::oracle::{LocalOracle, OracleWorker, RequestId};
use common::pipeline::{Fingerprint, Pipeline, PipelineError, SharedPipeline};
use common::rate_limit::SystemClock;

use crate::state::{AppState, StateError};

/// What the late provider submits under `--drift`
const DRIFT_VALUE: u64 = 1;

/// Run one collection round against an in-process oracle
#[derive(Args, Debug, Clone)]
pub struct Round {
    /// Values to contribute, one fresh provider per value
    #[arg(long, value_delimiter = ',', required = true)]
    pub values: Vec<u64>,

    /// Land an extra submission between the request and the callback
    #[arg(long)]
    pub drift: bool,

    /// Seconds to wait for the oracle callback
    #[arg(long, default_value_t = 10)]
    pub timeout_secs: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum RoundError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("no callback from the oracle within {0}s")]
    Timeout(u64),
    #[error("oracle worker stopped before reporting")]
    WorkerStopped,
}

#[derive(Debug)]
pub struct RoundOutput {
    pub batch_id: BatchId,
    pub providers: usize,
    pub request_id: RequestId,
    pub fingerprint: Fingerprint,
    pub expected: u64,
    pub outcome: Result<u64, PipelineError>,
}

impl std::fmt::Display for RoundOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Batch {} with {} providers", self.batch_id, self.providers)?;
        writeln!(
            f,
            "Decryption request {} (fingerprint {})",
            self.request_id, self.fingerprint
        )?;
        match &self.outcome {
            Ok(value) => write!(f, "Finalized: {} (expected {})", value, self.expected),
            Err(e) => write!(f, "Rejected: {}", e),
        }
    }
}

#[async_trait::async_trait]
impl crate::op::Op for Round {
    type Error = RoundError;
    type Output = RoundOutput;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = AppState::load(ctx.config_path.clone())?;
        let owner = Identity::from(&state.load_owner_key()?);
        let oracle_key = state.load_oracle_key()?;
        let masking_key = state.load_masking_key()?;

        let store = CiphertextStore::new();
        let (oracle, jobs) = LocalOracle::new(oracle_key.public());
        let worker = OracleWorker::new(oracle_key, masking_key.clone(), store.clone());
        let pipeline = SharedPipeline::new(Pipeline::new(
            state.config.pipeline.clone(),
            owner,
            Arc::new(MaskedSumEngine::new(store.clone())),
            Arc::new(oracle),
            Arc::new(SystemClock),
        )?);

        let (reports_tx, reports_rx) = flume::unbounded();
        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let worker_handle = tokio::spawn(worker.run(
            jobs,
            pipeline.clone(),
            Some(reports_tx),
            shutdown_rx,
        ));

        let encrypt = |value: u64| -> Result<CiphertextHandle, RoundError> {
            let bytes = MaskedCiphertext::encrypt(&masking_key, value).to_bytes()?;
            Ok(store.put(bytes)?)
        };

        // everything up to the drift submission happens under one lock, so
        // the worker cannot call back in between
        let (batch_id, request_id, fingerprint) = {
            let mut pipeline = pipeline.lock().await;
            let batch_id = pipeline.open_batch(owner)?;
            for value in &self.values {
                let provider = Identity::from(&SecretKey::generate());
                pipeline.add_provider(owner, provider)?;
                pipeline.submit_encrypted_data(provider, encrypt(*value)?)?;
            }

            let request_id = pipeline.request_aggregate_decryption(owner)?;
            let fingerprint = pipeline
                .decryption_context(request_id)
                .map(|context| context.fingerprint)
                .ok_or(PipelineError::UnknownRequest(request_id))?;

            if self.drift {
                let late = Identity::from(&SecretKey::generate());
                pipeline.add_provider(owner, late)?;
                pipeline.submit_encrypted_data(late, encrypt(DRIFT_VALUE)?)?;
                tracing::info!(
                    "drift: {} submitted after request {}",
                    DRIFT_VALUE,
                    request_id
                );
            }
            (batch_id, request_id, fingerprint)
        };

        let report = tokio::time::timeout(
            Duration::from_secs(self.timeout_secs),
            reports_rx.recv_async(),
        )
        .await;

        let _ = shutdown_tx.send(());
        if let Err(e) = worker_handle.await {
            tracing::error!("oracle worker task failed: {}", e);
        }

        let report = report
            .map_err(|_| RoundError::Timeout(self.timeout_secs))?
            .map_err(|_| RoundError::WorkerStopped)?;
        pipeline.lock().await.close_batch(owner)?;

        Ok(RoundOutput {
            batch_id,
            providers: self.values.len(),
            request_id,
            fingerprint,
            expected: self
                .values
                .iter()
                .fold(0u64, |acc, value| acc.wrapping_add(*value)),
            outcome: report.outcome,
        })
    }
}
