//! Executor configuration: the policy attached to a named consumer role.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::ExecutorId;
use super::retry::RetryPolicy;

/// Durability level requested from the backing store.
/// Advisory: carried with the config, not enforced by the lifecycle core.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteConcern {
    Unacknowledged,
    #[default]
    ReplicaAcknowledged,
    Majority,
    Journaled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DlqConfig {
    pub enabled: bool,
    #[serde(default)]
    pub queue_name: String,
}

/// Caller-supplied part of an executor config (create / update input).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorSpec {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub write_concern: WriteConcern,
    #[serde(default)]
    pub retry_policy: RetryPolicy,
    #[serde(default)]
    pub dlq_config: DlqConfig,
}

fn default_enabled() -> bool {
    true
}

impl ExecutorSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            write_concern: WriteConcern::default(),
            retry_policy: RetryPolicy::default(),
            dlq_config: DlqConfig::default(),
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_write_concern(mut self, write_concern: WriteConcern) -> Self {
        self.write_concern = write_concern;
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Enable the dead-letter queue. An empty name falls back to `<executor>_dlq`.
    pub fn with_dlq(mut self, queue_name: impl Into<String>) -> Self {
        self.dlq_config = DlqConfig {
            enabled: true,
            queue_name: queue_name.into(),
        };
        self
    }

    /// Fill in derived defaults.
    pub(crate) fn normalized(mut self) -> Self {
        if self.dlq_config.enabled && self.dlq_config.queue_name.is_empty() {
            self.dlq_config.queue_name = format!("{}_dlq", self.name);
        }
        self
    }
}

/// Stored executor config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    pub id: ExecutorId,
    pub name: String,
    pub enabled: bool,
    pub write_concern: WriteConcern,
    pub retry_policy: RetryPolicy,
    pub dlq_config: DlqConfig,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExecutorConfig {
    pub fn from_spec(id: ExecutorId, spec: ExecutorSpec, now: DateTime<Utc>) -> Self {
        let spec = spec.normalized();
        Self {
            id,
            name: spec.name,
            enabled: spec.enabled,
            write_concern: spec.write_concern,
            retry_policy: spec.retry_policy,
            dlq_config: spec.dlq_config,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply an update. `id`, `name` and `created_at` are kept.
    pub fn apply(&mut self, spec: ExecutorSpec, now: DateTime<Utc>) {
        let spec = ExecutorSpec {
            name: self.name.clone(),
            ..spec
        }
        .normalized();
        self.enabled = spec.enabled;
        self.write_concern = spec.write_concern;
        self.retry_policy = spec.retry_policy;
        self.dlq_config = spec.dlq_config;
        self.updated_at = now;
    }
}
