//! The pipeline state machine
//!
//! [`Pipeline`] owns every piece of protocol state (access registry,
//! cooldowns, batch lifecycle, accepted contributions, decryption contexts)
//! and exposes one method per entry point. Methods take `&mut self` and run
//! to completion, so each entry point is a single, non-interleaved state
//! transition; [`SharedPipeline`] serializes access across async tasks.
//!
//! Every entry point checks everything it needs before mutating anything:
//! a call either applies all of its effects or returns an error having
//! changed nothing.
//!
//! # Entry points
//!
//! | entry point                      | who              | pause-gated |
//! |----------------------------------|------------------|-------------|
//! | `transfer_ownership`             | owner            | no          |
//! | `set_paused`                     | owner            | no          |
//! | `set_cooldown`                   | owner            | no          |
//! | `add_provider`/`remove_provider` | owner            | yes         |
//! | `open_batch`/`close_batch`       | owner            | yes         |
//! | `submit_encrypted_data`          | provider         | yes         |
//! | `request_aggregate_decryption`   | anyone           | yes         |
//! | `on_decryption_result`           | oracle           | no          |

mod config;
mod error;
mod events;
mod reconcile;
mod shared;

use std::collections::BTreeMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::access::AccessRegistry;
use crate::aggregate::{AggregateEngine, CiphertextHandle};
use crate::batch::{Batch, BatchId, BatchLifecycle};
use crate::identity::Identity;
use crate::oracle::{DecryptionOracle, RequestId};
use crate::rate_limit::{ActionClass, Clock, RateLimiter};

pub use config::{PipelineConfig, DEFAULT_COOLDOWN_SECS};
pub use error::{ErrorKind, PipelineError};
pub use events::Event;
pub use reconcile::{DecryptionContext, Fingerprint};
pub use shared::{CallbackReport, SharedPipeline};

use events::EventLog;

/// An encrypted value accepted from a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contribution {
    pub batch_id: BatchId,
    pub provider: Identity,
    pub handle: CiphertextHandle,
    pub submitted_at: u64,
}

#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    access: AccessRegistry,
    limiter: RateLimiter,
    batches: BatchLifecycle,
    contributions: Vec<Contribution>,
    contexts: BTreeMap<RequestId, DecryptionContext>,
    engine: Arc<dyn AggregateEngine>,
    oracle: Arc<dyn DecryptionOracle>,
    clock: Arc<dyn Clock>,
    events: EventLog,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        owner: Identity,
        engine: Arc<dyn AggregateEngine>,
        oracle: Arc<dyn DecryptionOracle>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, PipelineError> {
        if owner.is_zero() {
            return Err(crate::access::AccessError::ZeroIdentity.into());
        }
        tracing::info!(
            "Pipeline {} created, owner {}, cooldown {}s, policy {:?}",
            config.instance_id,
            owner,
            config.cooldown_secs,
            config.contribution_policy
        );
        Ok(Self {
            limiter: RateLimiter::new(config.cooldown_secs),
            config,
            access: AccessRegistry::new(owner),
            batches: BatchLifecycle::new(),
            contributions: Vec::new(),
            contexts: BTreeMap::new(),
            engine,
            oracle,
            clock,
            events: EventLog::default(),
        })
    }

    /* Administrative surface */

    pub fn transfer_ownership(
        &mut self,
        caller: Identity,
        new_owner: Identity,
    ) -> Result<(), PipelineError> {
        let previous = self.access.transfer_ownership(&caller, new_owner)?;
        self.events.emit(Event::OwnershipTransferred {
            previous,
            new: new_owner,
        });
        Ok(())
    }

    pub fn add_provider(&mut self, caller: Identity, provider: Identity) -> Result<(), PipelineError> {
        self.access.ensure_not_paused()?;
        if self.access.add_provider(&caller, provider)? {
            self.events.emit(Event::ProviderAdded { provider });
        }
        Ok(())
    }

    pub fn remove_provider(
        &mut self,
        caller: Identity,
        provider: Identity,
    ) -> Result<(), PipelineError> {
        self.access.ensure_not_paused()?;
        if self.access.remove_provider(&caller, &provider)? {
            self.events.emit(Event::ProviderRemoved { provider });
        }
        Ok(())
    }

    pub fn set_paused(&mut self, caller: Identity, paused: bool) -> Result<(), PipelineError> {
        self.access.set_paused(&caller, paused)?;
        self.events.emit(if paused {
            Event::Paused { by: caller }
        } else {
            Event::Unpaused { by: caller }
        });
        Ok(())
    }

    pub fn set_cooldown(&mut self, caller: Identity, cooldown_secs: u64) -> Result<(), PipelineError> {
        self.access.ensure_owner(&caller)?;
        self.limiter.set_cooldown(cooldown_secs);
        self.config.cooldown_secs = cooldown_secs;
        self.events.emit(Event::CooldownUpdated { cooldown_secs });
        Ok(())
    }

    pub fn open_batch(&mut self, caller: Identity) -> Result<BatchId, PipelineError> {
        self.access.ensure_not_paused()?;
        self.access.ensure_owner(&caller)?;
        let batch_id = self.batches.open();
        self.events.emit(Event::BatchOpened { batch_id });
        Ok(batch_id)
    }

    pub fn close_batch(&mut self, caller: Identity) -> Result<BatchId, PipelineError> {
        self.access.ensure_not_paused()?;
        self.access.ensure_owner(&caller)?;
        let batch_id = self.batches.close()?;
        self.events.emit(Event::BatchClosed { batch_id });
        Ok(batch_id)
    }

    /* Provider surface */

    /// Accept an encrypted contribution into the open batch.
    ///
    /// The handle is not resolved here; an unknown handle surfaces as
    /// `NotInitialized` when the aggregate is next derived.
    pub fn submit_encrypted_data(
        &mut self,
        caller: Identity,
        handle: CiphertextHandle,
    ) -> Result<BatchId, PipelineError> {
        let now = self.clock.now();
        self.access.ensure_not_paused()?;
        self.access.ensure_provider(&caller)?;
        self.limiter.check(&caller, ActionClass::Submission, now)?;
        let batch_id = self.batches.ensure_open()?;

        self.limiter.record(&caller, ActionClass::Submission, now);
        self.contributions.push(Contribution {
            batch_id,
            provider: caller,
            handle,
            submitted_at: now,
        });
        self.events.emit(Event::ContributionSubmitted {
            batch_id,
            provider: caller,
            handle,
        });
        Ok(batch_id)
    }

    /* Read surface */

    pub fn instance_id(&self) -> Uuid {
        self.config.instance_id
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn owner(&self) -> Identity {
        self.access.owner()
    }

    pub fn is_provider(&self, id: &Identity) -> bool {
        self.access.is_provider(id)
    }

    pub fn providers(&self) -> Vec<Identity> {
        self.access.providers().copied().collect()
    }

    pub fn is_paused(&self) -> bool {
        self.access.is_paused()
    }

    pub fn batch(&self) -> Batch {
        self.batches.current()
    }

    pub fn cooldown_secs(&self) -> u64 {
        self.limiter.cooldown_secs()
    }

    pub fn last_action(&self, actor: &Identity, class: ActionClass) -> Option<u64> {
        self.limiter.last_action(actor, class)
    }

    pub fn contributions(&self) -> &[Contribution] {
        &self.contributions
    }

    pub fn batch_contributions(&self, batch_id: BatchId) -> impl Iterator<Item = &Contribution> {
        self.contributions
            .iter()
            .filter(move |c| c.batch_id == batch_id)
    }

    pub fn decryption_context(&self, request_id: RequestId) -> Option<&DecryptionContext> {
        self.contexts.get(&request_id)
    }

    pub fn decryption_contexts(&self) -> impl Iterator<Item = &DecryptionContext> {
        self.contexts.values()
    }

    pub fn events(&self) -> &[Event] {
        self.events.history()
    }

    /// Receive every event emitted from now on
    pub fn subscribe(&mut self) -> flume::Receiver<Event> {
        self.events.subscribe()
    }
}
