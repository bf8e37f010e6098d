//! # Access registry
//!
//! Tracks who may do what:
//! - exactly one **owner**, replaced only through an explicit transfer
//! - a set of **providers** allowed to submit encrypted contributions
//! - a process-wide **pause flag**
//!
//! The registry only answers questions and applies changes; deciding which
//! entry points are pause-gated is the pipeline's job.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::identity::Identity;

/// The role an identity holds on the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Administers the pipeline: providers, pause flag, cooldown, batches.
    Owner,
    /// Submits encrypted contributions while a batch is open.
    Provider,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Owner => write!(f, "Owner"),
            Role::Provider => write!(f, "Provider"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("{caller} is not the owner")]
    NotOwner { caller: Identity },
    #[error("{caller} is not a registered provider")]
    NotProvider { caller: Identity },
    #[error("pipeline is paused")]
    Paused,
    #[error("the zero identity cannot hold a role")]
    ZeroIdentity,
}

#[derive(Debug, Clone)]
pub struct AccessRegistry {
    owner: Identity,
    providers: BTreeSet<Identity>,
    paused: bool,
}

impl AccessRegistry {
    pub fn new(owner: Identity) -> Self {
        Self {
            owner,
            providers: BTreeSet::new(),
            paused: false,
        }
    }

    pub fn owner(&self) -> Identity {
        self.owner
    }

    pub fn is_provider(&self, id: &Identity) -> bool {
        self.providers.contains(id)
    }

    pub fn providers(&self) -> impl Iterator<Item = &Identity> {
        self.providers.iter()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Every role the identity currently holds
    pub fn roles(&self, id: &Identity) -> Vec<Role> {
        let mut roles = Vec::new();
        if *id == self.owner {
            roles.push(Role::Owner);
        }
        if self.is_provider(id) {
            roles.push(Role::Provider);
        }
        roles
    }

    pub fn ensure_owner(&self, caller: &Identity) -> Result<(), AccessError> {
        if *caller != self.owner {
            return Err(AccessError::NotOwner { caller: *caller });
        }
        Ok(())
    }

    pub fn ensure_provider(&self, caller: &Identity) -> Result<(), AccessError> {
        if !self.is_provider(caller) {
            return Err(AccessError::NotProvider { caller: *caller });
        }
        Ok(())
    }

    pub fn ensure_not_paused(&self) -> Result<(), AccessError> {
        if self.paused {
            return Err(AccessError::Paused);
        }
        Ok(())
    }

    /// Hand ownership to `new_owner`, returning the previous owner.
    pub fn transfer_ownership(
        &mut self,
        caller: &Identity,
        new_owner: Identity,
    ) -> Result<Identity, AccessError> {
        self.ensure_owner(caller)?;
        if new_owner.is_zero() {
            return Err(AccessError::ZeroIdentity);
        }
        let previous = std::mem::replace(&mut self.owner, new_owner);
        Ok(previous)
    }

    /// Ensure `id` is a provider. Returns whether membership changed.
    pub fn add_provider(&mut self, caller: &Identity, id: Identity) -> Result<bool, AccessError> {
        self.ensure_owner(caller)?;
        if id.is_zero() {
            return Err(AccessError::ZeroIdentity);
        }
        Ok(self.providers.insert(id))
    }

    /// Ensure `id` is not a provider. Returns whether membership changed.
    pub fn remove_provider(
        &mut self,
        caller: &Identity,
        id: &Identity,
    ) -> Result<bool, AccessError> {
        self.ensure_owner(caller)?;
        Ok(self.providers.remove(id))
    }

    pub fn set_paused(&mut self, caller: &Identity, paused: bool) -> Result<(), AccessError> {
        self.ensure_owner(caller)?;
        self.paused = paused;
        Ok(())
    }
}
