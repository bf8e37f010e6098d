//! Integration tests for per-actor, per-class cooldowns

mod common;

use ::common::pipeline::{ErrorKind, Event, PipelineError};
use ::common::rate_limit::{ActionClass, RateLimitError};

#[test]
fn test_submission_cooldown_boundary() {
    let (mut h, provider) = common::setup_open_batch();
    h.submit(provider, 1).unwrap();

    h.clock.advance(common::TEST_COOLDOWN - 1);
    let err = h.submit(provider, 2).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::RateLimit(RateLimitError::CooldownActive {
            class: ActionClass::Submission,
            remaining_secs: 1,
            ..
        })
    ));
    assert_eq!(err.kind(), ErrorKind::Rate);
    assert!(err.is_retryable());

    // exactly at the boundary is allowed
    h.clock.advance(1);
    h.submit(provider, 3).unwrap();
    assert_eq!(h.pipeline.contributions().len(), 2);
}

#[test]
fn test_request_cooldown_boundary() {
    let (mut h, provider) = common::setup_open_batch();
    h.submit(provider, 1).unwrap();

    h.request().unwrap();
    h.clock.advance(common::TEST_COOLDOWN - 1);
    assert!(matches!(
        h.request(),
        Err(PipelineError::RateLimit(RateLimitError::CooldownActive {
            class: ActionClass::DecryptionRequest,
            ..
        }))
    ));
    h.clock.advance(1);
    h.request().unwrap();
}

#[test]
fn test_classes_and_actors_do_not_share_windows() {
    let (mut h, alice) = common::setup_open_batch();
    let bob = h.provider();

    h.submit(alice, 1).unwrap();
    h.submit(bob, 2).unwrap();
    // alice just submitted but has never requested
    h.pipeline.request_aggregate_decryption(alice).unwrap();
    h.pipeline.request_aggregate_decryption(bob).unwrap();
}

#[test]
fn test_set_cooldown_is_not_retroactive() {
    let (mut h, provider) = common::setup_open_batch();
    let owner = h.owner;
    let start = h.clock.advance(0);
    h.submit(provider, 1).unwrap();

    h.pipeline.set_cooldown(owner, 300).unwrap();
    h.clock.advance(common::TEST_COOLDOWN);
    assert!(h.submit(provider, 2).is_err());

    h.clock.set(start + 300);
    h.submit(provider, 2).unwrap();

    h.pipeline.set_cooldown(owner, 0).unwrap();
    h.submit(provider, 3).unwrap();

    assert_eq!(h.pipeline.cooldown_secs(), 0);
    assert!(h
        .pipeline
        .events()
        .contains(&Event::CooldownUpdated { cooldown_secs: 300 }));
}

#[test]
fn test_failed_request_does_not_start_cooldown() {
    let (mut h, _provider) = common::setup_open_batch();
    let owner = h.owner;

    // nothing submitted yet, so the aggregate cannot be derived
    assert!(matches!(h.request(), Err(PipelineError::NotInitialized(_))));
    assert_eq!(
        h.pipeline.last_action(&owner, ActionClass::DecryptionRequest),
        None
    );
    assert!(h.pipeline.decryption_contexts().next().is_none());
}
