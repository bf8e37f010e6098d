//! Shared test utilities for pipeline integration tests
#![allow(dead_code)]

use common::identity::Identity;
use common::pipeline::{PipelineConfig, PipelineError};
use common::testkit::Harness;

/// Short cooldown so tests can step past it explicitly
pub const TEST_COOLDOWN: u64 = 30;

pub fn test_config() -> PipelineConfig {
    PipelineConfig {
        cooldown_secs: TEST_COOLDOWN,
        ..Default::default()
    }
}

/// A harness with an open batch and one registered provider
pub fn setup_open_batch() -> (Harness, Identity) {
    let mut h = Harness::with_config(test_config());
    let provider = h.provider();
    h.open_batch();
    (h, provider)
}

/// Submit one value per provider, stepping past the cooldown between rounds
pub fn submit_all(h: &mut Harness, provider: Identity, values: &[u64]) {
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            h.cool_down();
        }
        h.submit(provider, *value).unwrap();
    }
}

pub fn is_access_err(err: &PipelineError, f: impl Fn(&common::access::AccessError) -> bool) -> bool {
    matches!(err, PipelineError::Access(e) if f(e))
}
