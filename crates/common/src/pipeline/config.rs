use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::ContributionPolicy;

pub const DEFAULT_COOLDOWN_SECS: u64 = 60;

/// Tunables for a [`Pipeline`](super::Pipeline)
///
/// Every field has a default so partial TOML tables load cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Domain-separation tag mixed into every request fingerprint
    #[serde(default = "Uuid::new_v4")]
    pub instance_id: Uuid,
    /// Cooldown shared by both action classes
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// Which contributions feed the aggregate
    #[serde(default)]
    pub contribution_policy: ContributionPolicy,
    /// Only accept callbacks from the oracle's designated caller identity
    #[serde(default = "default_restrict_callback_caller")]
    pub restrict_callback_caller: bool,
    /// Seconds after which a pending request can no longer be finalized
    #[serde(default)]
    pub request_ttl_secs: Option<u64>,
    /// Cap on unexpired pending requests
    #[serde(default)]
    pub max_pending_requests: Option<usize>,
}

fn default_cooldown_secs() -> u64 {
    DEFAULT_COOLDOWN_SECS
}

fn default_restrict_callback_caller() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            cooldown_secs: default_cooldown_secs(),
            contribution_policy: ContributionPolicy::default(),
            restrict_callback_caller: default_restrict_callback_caller(),
            request_ttl_secs: None,
            max_pending_requests: None,
        }
    }
}
