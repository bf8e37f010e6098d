//! Per-actor cooldowns
//!
//! One cooldown window governs every action class, but the last-action time
//! is tracked separately per `(actor, class)`. An action may proceed once
//! `now >= last + cooldown`; an actor with no recorded action is always ready.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::identity::Identity;

/// Source of the current time in unix seconds
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> u64;
}

/// Wall clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        // clamp pre-epoch clocks to zero
        time::OffsetDateTime::now_utc().unix_timestamp().max(0) as u64
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Arc<AtomicU64>);

impl ManualClock {
    pub fn new(start: u64) -> Self {
        Self(Arc::new(AtomicU64::new(start)))
    }

    pub fn set(&self, now: u64) {
        self.0.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) -> u64 {
        self.0.fetch_add(secs, Ordering::SeqCst) + secs
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// The kinds of action that carry independent cooldowns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionClass {
    Submission,
    DecryptionRequest,
}

impl std::fmt::Display for ActionClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionClass::Submission => write!(f, "submission"),
            ActionClass::DecryptionRequest => write!(f, "decryption request"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RateLimitError {
    #[error("{class} cooldown active for {actor}, retry in {remaining_secs}s")]
    CooldownActive {
        actor: Identity,
        class: ActionClass,
        remaining_secs: u64,
    },
}

#[derive(Debug, Clone, Default)]
pub struct RateLimiter {
    cooldown_secs: u64,
    last_action: HashMap<(Identity, ActionClass), u64>,
}

impl RateLimiter {
    pub fn new(cooldown_secs: u64) -> Self {
        Self {
            cooldown_secs,
            last_action: HashMap::new(),
        }
    }

    pub fn cooldown_secs(&self) -> u64 {
        self.cooldown_secs
    }

    /// Applies to every check from now on. Recorded timestamps are kept, so
    /// a shorter window can release an actor early and a longer one holds
    /// them back longer.
    pub fn set_cooldown(&mut self, cooldown_secs: u64) {
        self.cooldown_secs = cooldown_secs;
    }

    pub fn last_action(&self, actor: &Identity, class: ActionClass) -> Option<u64> {
        self.last_action.get(&(*actor, class)).copied()
    }

    /// Fail if `actor` is still cooling down for `class` at `now`.
    pub fn check(&self, actor: &Identity, class: ActionClass, now: u64) -> Result<(), RateLimitError> {
        let Some(last) = self.last_action(actor, class) else {
            return Ok(());
        };
        let ready_at = last.saturating_add(self.cooldown_secs);
        if now < ready_at {
            return Err(RateLimitError::CooldownActive {
                actor: *actor,
                class,
                remaining_secs: ready_at - now,
            });
        }
        Ok(())
    }

    pub fn record(&mut self, actor: &Identity, class: ActionClass, now: u64) {
        self.last_action.insert((*actor, class), now);
    }

    /// Check and, on success, record `now` as the last action time.
    pub fn enforce_cooldown(
        &mut self,
        actor: &Identity,
        class: ActionClass,
        now: u64,
    ) -> Result<(), RateLimitError> {
        self.check(actor, class, now)?;
        self.record(actor, class, now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(byte: u8) -> Identity {
        Identity::from([byte; 32])
    }

    #[test]
    fn test_cooldown_boundary() {
        let mut limiter = RateLimiter::new(60);
        let alice = actor(1);

        limiter
            .enforce_cooldown(&alice, ActionClass::Submission, 1_000)
            .unwrap();

        let err = limiter
            .enforce_cooldown(&alice, ActionClass::Submission, 1_059)
            .unwrap_err();
        assert_eq!(
            err,
            RateLimitError::CooldownActive {
                actor: alice,
                class: ActionClass::Submission,
                remaining_secs: 1,
            }
        );
        // a failed check does not move the window
        assert_eq!(limiter.last_action(&alice, ActionClass::Submission), Some(1_000));

        limiter
            .enforce_cooldown(&alice, ActionClass::Submission, 1_060)
            .unwrap();
        assert_eq!(limiter.last_action(&alice, ActionClass::Submission), Some(1_060));
    }

    #[test]
    fn test_classes_and_actors_are_independent() {
        let mut limiter = RateLimiter::new(60);

        limiter
            .enforce_cooldown(&actor(1), ActionClass::Submission, 10)
            .unwrap();
        limiter
            .enforce_cooldown(&actor(1), ActionClass::DecryptionRequest, 10)
            .unwrap();
        limiter
            .enforce_cooldown(&actor(2), ActionClass::Submission, 10)
            .unwrap();

        assert!(limiter.check(&actor(1), ActionClass::Submission, 11).is_err());
        assert!(limiter.check(&actor(3), ActionClass::Submission, 11).is_ok());
    }

    #[test]
    fn test_set_cooldown_applies_to_later_checks() {
        let mut limiter = RateLimiter::new(60);
        limiter
            .enforce_cooldown(&actor(1), ActionClass::Submission, 100)
            .unwrap();
        assert!(limiter.check(&actor(1), ActionClass::Submission, 130).is_err());

        limiter.set_cooldown(30);
        assert!(limiter.check(&actor(1), ActionClass::Submission, 130).is_ok());

        limiter.set_cooldown(0);
        limiter
            .enforce_cooldown(&actor(1), ActionClass::Submission, 130)
            .unwrap();
        limiter
            .enforce_cooldown(&actor(1), ActionClass::Submission, 130)
            .unwrap();
    }

    #[test]
    fn test_manual_clock_is_shared_between_clones() {
        let clock = ManualClock::new(5);
        let other = clock.clone();
        assert_eq!(other.advance(10), 15);
        assert_eq!(clock.now(), 15);
        clock.set(3);
        assert_eq!(other.now(), 3);
    }
}
