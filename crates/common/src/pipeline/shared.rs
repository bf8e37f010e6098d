use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use crate::identity::Identity;
use crate::oracle::{DecryptionResult, RequestId};

use super::{Pipeline, PipelineError};

/// A pipeline shared between async tasks
///
/// Every entry point runs under the lock, so two callbacks for the same
/// request can never both observe it as pending.
#[derive(Debug, Clone)]
pub struct SharedPipeline(Arc<Mutex<Pipeline>>);

impl SharedPipeline {
    pub fn new(pipeline: Pipeline) -> Self {
        Self(Arc::new(Mutex::new(pipeline)))
    }

    pub async fn lock(&self) -> MutexGuard<'_, Pipeline> {
        self.0.lock().await
    }

    /// Hand an oracle result to the callback entry point
    pub async fn deliver(
        &self,
        caller: Identity,
        result: &DecryptionResult,
    ) -> Result<u64, PipelineError> {
        let outcome = self.0.lock().await.on_decryption_result(
            caller,
            result.request_id,
            &result.cleartext,
            &result.proof,
        );
        match &outcome {
            Ok(value) => tracing::info!("request {} finalized with {}", result.request_id, value),
            Err(e) if e.is_oracle_fault() => {
                tracing::error!("oracle fault on request {}: {}", result.request_id, e)
            }
            Err(e) => tracing::warn!("request {} not finalized: {}", result.request_id, e),
        }
        outcome
    }
}

/// Outcome of one callback delivered by the oracle worker
#[derive(Debug)]
pub struct CallbackReport {
    pub request_id: RequestId,
    pub outcome: Result<u64, PipelineError>,
}
