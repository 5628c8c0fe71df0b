//! Runtime configuration of the lifecycle service and its pollers.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::retry::duration_ms;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Bound on every store / registry call.
    #[serde(rename = "store_timeout_ms", with = "duration_ms")]
    pub store_timeout: Duration,

    /// Idle wait of a poller when its queue is empty.
    #[serde(rename = "poll_interval_ms", with = "duration_ms")]
    pub poll_interval: Duration,

    /// Wait of a poller after an infrastructure error.
    #[serde(rename = "error_backoff_ms", with = "duration_ms")]
    pub error_backoff: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_secs(1),
            error_backoff: Duration::from_secs(5),
        }
    }
}

impl LifecycleConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
