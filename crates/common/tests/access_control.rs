//! Integration tests for owner, provider and pause gating

mod common;

use ::common::access::AccessError;
use ::common::crypto::SecretKey;
use ::common::identity::Identity;
use ::common::pipeline::{ErrorKind, Event, PipelineError};
use ::common::testkit::Harness;

fn stranger() -> Identity {
    Identity::from(&SecretKey::generate())
}

#[test]
fn test_non_owner_cannot_administer() {
    let mut h = Harness::with_config(common::test_config());
    let mallory = stranger();

    let err = h.pipeline.add_provider(mallory, mallory).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Access(AccessError::NotOwner { caller }) if caller == mallory
    ));
    assert_eq!(err.kind(), ErrorKind::Authorization);
    assert!(!err.is_retryable());

    assert!(h.pipeline.set_paused(mallory, true).is_err());
    assert!(h.pipeline.set_cooldown(mallory, 0).is_err());
    assert!(h.pipeline.open_batch(mallory).is_err());
    assert!(h.pipeline.transfer_ownership(mallory, mallory).is_err());

    assert!(!h.pipeline.is_provider(&mallory));
    assert!(!h.pipeline.is_paused());
    assert_eq!(h.pipeline.cooldown_secs(), common::TEST_COOLDOWN);
    assert!(!h.pipeline.batch().open);
    assert!(h.pipeline.events().is_empty());
}

#[test]
fn test_non_provider_cannot_submit() {
    let (mut h, _provider) = common::setup_open_batch();
    let mallory = stranger();

    let err = h.submit(mallory, 1).unwrap_err();
    assert!(common::is_access_err(&err, |e| matches!(e, AccessError::NotProvider { .. })));
    assert!(h.pipeline.contributions().is_empty());
    assert_eq!(h.pipeline.last_action(&mallory, ::common::rate_limit::ActionClass::Submission), None);
}

#[test]
fn test_pause_rejects_gated_calls_regardless_of_role() {
    let (mut h, provider) = common::setup_open_batch();
    let owner = h.owner;
    h.pipeline.set_paused(owner, true).unwrap();

    // pause is reported even to callers who lack the role
    let mallory = stranger();
    for err in [
        h.pipeline.add_provider(mallory, mallory).unwrap_err(),
        h.pipeline.add_provider(owner, stranger()).unwrap_err(),
        h.pipeline.remove_provider(owner, provider).unwrap_err(),
        h.pipeline.open_batch(owner).unwrap_err(),
        h.pipeline.close_batch(owner).unwrap_err(),
        h.submit(provider, 1).unwrap_err(),
        h.submit(mallory, 1).unwrap_err(),
        h.pipeline.request_aggregate_decryption(mallory).unwrap_err(),
    ] {
        assert!(matches!(err, PipelineError::Access(AccessError::Paused)), "{err}");
        assert_eq!(err.kind(), ErrorKind::Availability);
        assert!(err.is_retryable());
    }

    // the owner can still manage the pipeline while paused
    h.pipeline.set_cooldown(owner, 5).unwrap();
    let successor = stranger();
    h.pipeline.transfer_ownership(owner, successor).unwrap();
    h.pipeline.set_paused(successor, false).unwrap();

    h.submit(provider, 1).unwrap();
    assert_eq!(h.pipeline.contributions().len(), 1);
}

#[test]
fn test_provider_membership_is_idempotent_and_evented_once() {
    let mut h = Harness::with_config(common::test_config());
    let owner = h.owner;
    let alice = stranger();

    h.pipeline.add_provider(owner, alice).unwrap();
    h.pipeline.add_provider(owner, alice).unwrap();
    assert_eq!(h.pipeline.providers(), vec![alice]);

    h.pipeline.remove_provider(owner, alice).unwrap();
    h.pipeline.remove_provider(owner, alice).unwrap();
    assert!(h.pipeline.providers().is_empty());

    assert_eq!(
        h.pipeline.events(),
        &[
            Event::ProviderAdded { provider: alice },
            Event::ProviderRemoved { provider: alice },
        ]
    );
}

#[test]
fn test_removed_provider_cannot_submit() {
    let (mut h, provider) = common::setup_open_batch();
    h.submit(provider, 1).unwrap();
    h.pipeline.remove_provider(h.owner, provider).unwrap();
    h.cool_down();

    let err = h.submit(provider, 2).unwrap_err();
    assert!(common::is_access_err(&err, |e| matches!(e, AccessError::NotProvider { .. })));
}

#[test]
fn test_ownership_transfer() {
    let mut h = Harness::with_config(common::test_config());
    let previous = h.owner;
    let next = stranger();
    let subscriber = h.pipeline.subscribe();

    let err = h
        .pipeline
        .transfer_ownership(previous, Identity::ZERO)
        .unwrap_err();
    assert!(common::is_access_err(&err, |e| *e == AccessError::ZeroIdentity));

    h.pipeline.transfer_ownership(previous, next).unwrap();
    assert_eq!(h.pipeline.owner(), next);
    assert_eq!(
        subscriber.try_recv().unwrap(),
        Event::OwnershipTransferred {
            previous,
            new: next
        }
    );

    // the old owner has lost every owner right
    assert!(h.pipeline.open_batch(previous).is_err());
    assert!(h.pipeline.open_batch(next).is_ok());
}

#[test]
fn test_pause_events() {
    let mut h = Harness::new();
    let owner = h.owner;
    h.pipeline.set_paused(owner, true).unwrap();
    h.pipeline.set_paused(owner, false).unwrap();

    assert_eq!(
        h.pipeline.events(),
        &[Event::Paused { by: owner }, Event::Unpaused { by: owner }]
    );
}
