//! Decryption reconciliation
//!
//! Phase 1 ([`Pipeline::request_aggregate_decryption`]) derives the aggregate
//! from current state, fingerprints the ordered handles, hands them to the
//! oracle and persists a [`DecryptionContext`]. Phase 2
//! ([`Pipeline::on_decryption_result`]) runs when the oracle calls back and
//! finalizes only if, in order:
//!
//! 1. the caller is the oracle (when restricted)
//! 2. the request exists and is still pending (replay gate)
//! 3. the request has not expired (when a TTL is configured)
//! 4. the fingerprint recomputed from *current* state matches the stored one
//! 5. the oracle's proof verifies for this request and cleartext
//! 6. the cleartext decodes
//!
//! Any failure leaves the context untouched. A context moves
//! `Pending -> Processed` exactly once and is never removed.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::{CiphertextHandle, ContributionPolicy};
use crate::batch::BatchId;
use crate::identity::Identity;
use crate::oracle::{decode_value, DecryptionProof, OracleError, RequestId};
use crate::rate_limit::ActionClass;

use super::events::Event;
use super::{Pipeline, PipelineError};

const FINGERPRINT_CONTEXT: &str = "sealbatch 2025-01 decryption request fingerprint v1";

/// Digest binding a request to the exact ordered handles it covers
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// BLAKE3 in derive-key mode over the instance id, the handle count and
    /// each handle in order
    pub fn compute(instance_id: &Uuid, handles: &[CiphertextHandle]) -> Self {
        let mut hasher = blake3::Hasher::new_derive_key(FINGERPRINT_CONTEXT);
        hasher.update(instance_id.as_bytes());
        hasher.update(&(handles.len() as u64).to_be_bytes());
        for handle in handles {
            hasher.update(handle.as_bytes());
        }
        Fingerprint(*hasher.finalize().as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl std::fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

/// Everything needed to resume a request when its callback arrives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptionContext {
    pub request_id: RequestId,
    pub batch_id: BatchId,
    pub fingerprint: Fingerprint,
    pub processed: bool,
    pub requester: Identity,
    pub requested_at: u64,
    /// Set together with `processed`
    pub result: Option<u64>,
}

impl DecryptionContext {
    fn is_expired(&self, ttl_secs: Option<u64>, now: u64) -> bool {
        match ttl_secs {
            Some(ttl) => now >= self.requested_at.saturating_add(ttl),
            None => false,
        }
    }
}

impl Pipeline {
    fn aggregate_inputs(&self) -> Vec<CiphertextHandle> {
        let batch_id = self.batches.id();
        self.contributions
            .iter()
            .filter(|c| match self.config.contribution_policy {
                ContributionPolicy::CurrentBatch => c.batch_id == batch_id,
                ContributionPolicy::AllBatches => true,
            })
            .map(|c| c.handle)
            .collect()
    }

    /// The ordered handles a decryption request would cover right now, and
    /// their fingerprint
    pub fn current_decryption_target(
        &self,
    ) -> Result<(Vec<CiphertextHandle>, Fingerprint), PipelineError> {
        let inputs = self.aggregate_inputs();
        let aggregate = self.engine.aggregate(&inputs)?;
        let handles = vec![aggregate];
        let fingerprint = Fingerprint::compute(&self.config.instance_id, &handles);
        tracing::debug!(
            "derived aggregate {} from {} inputs, fingerprint {}",
            aggregate,
            inputs.len(),
            fingerprint
        );
        Ok((handles, fingerprint))
    }

    /// Pending requests that can still be finalized at `now`
    pub fn live_pending_requests(&self, now: u64) -> usize {
        self.contexts
            .values()
            .filter(|c| !c.processed && !c.is_expired(self.config.request_ttl_secs, now))
            .count()
    }

    /// Phase 1: ask the oracle to decrypt the current aggregate.
    ///
    /// Open to any caller while unpaused, subject to the caller's
    /// decryption-request cooldown. Not gated on the batch being open.
    pub fn request_aggregate_decryption(
        &mut self,
        caller: Identity,
    ) -> Result<RequestId, PipelineError> {
        let now = self.clock.now();
        self.access.ensure_not_paused()?;
        self.limiter
            .check(&caller, ActionClass::DecryptionRequest, now)?;
        if let Some(limit) = self.config.max_pending_requests {
            if self.live_pending_requests(now) >= limit {
                return Err(PipelineError::TooManyPendingRequests { limit });
            }
        }

        let (handles, fingerprint) = self.current_decryption_target()?;
        let request_id = self.oracle.submit_decryption_request(&handles)?;
        if self.contexts.contains_key(&request_id) {
            return Err(OracleError::DuplicateRequest(request_id).into());
        }

        self.limiter
            .record(&caller, ActionClass::DecryptionRequest, now);
        let batch_id = self.batches.id();
        self.contexts.insert(
            request_id,
            DecryptionContext {
                request_id,
                batch_id,
                fingerprint,
                processed: false,
                requester: caller,
                requested_at: now,
                result: None,
            },
        );
        self.events.emit(Event::DecryptionRequested {
            request_id,
            batch_id,
            fingerprint,
        });
        Ok(request_id)
    }

    /// Phase 2: the oracle's callback. Returns the published value.
    pub fn on_decryption_result(
        &mut self,
        caller: Identity,
        request_id: RequestId,
        cleartext: &[u8],
        proof: &DecryptionProof,
    ) -> Result<u64, PipelineError> {
        if self.config.restrict_callback_caller && caller != self.oracle.caller() {
            tracing::warn!("rejected callback for {} from {}", request_id, caller);
            return Err(PipelineError::NotOracle { caller });
        }

        let now = self.clock.now();
        let context = self
            .contexts
            .get(&request_id)
            .ok_or(PipelineError::UnknownRequest(request_id))?;
        if context.processed {
            tracing::warn!("replayed callback for processed request {}", request_id);
            return Err(PipelineError::Replay(request_id));
        }
        if context.is_expired(self.config.request_ttl_secs, now) {
            tracing::warn!("callback for expired request {}", request_id);
            return Err(PipelineError::RequestExpired(request_id));
        }
        let stored = context.fingerprint;

        let current = match self.current_decryption_target() {
            Ok((_, fingerprint)) => fingerprint,
            // inputs that aggregated at request time no longer do
            Err(PipelineError::NotInitialized(reason)) => {
                tracing::warn!(
                    "request {} is stale, aggregate no longer derivable: {}",
                    request_id,
                    reason
                );
                return Err(PipelineError::StateMismatch(request_id));
            }
            Err(e) => return Err(e),
        };
        if current != stored {
            tracing::warn!(
                "request {} is stale: fingerprint {} now {}",
                request_id,
                stored,
                current
            );
            return Err(PipelineError::StateMismatch(request_id));
        }

        if !self.oracle.verify_proof(request_id, cleartext, proof) {
            tracing::warn!("invalid proof for request {}", request_id);
            return Err(PipelineError::InvalidProof(request_id));
        }

        let value = decode_value(cleartext).ok_or(PipelineError::MalformedCleartext {
            request_id,
            len: cleartext.len(),
        })?;

        let context = self
            .contexts
            .get_mut(&request_id)
            .ok_or(PipelineError::UnknownRequest(request_id))?;
        context.processed = true;
        context.result = Some(value);
        let batch_id = context.batch_id;

        self.events.emit(Event::DecryptionCompleted {
            request_id,
            batch_id,
            value,
        });
        Ok(value)
    }
}
