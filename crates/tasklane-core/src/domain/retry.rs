//! Retry policy: how many times a failing task is re-queued and how long it
//! stays invisible in between.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Backoff curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryKind {
    /// delay = base
    Constant,
    /// delay = base * (retry_count + 1)
    Linear,
    /// delay = base * 2^retry_count
    Exponential,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(rename = "type")]
    pub kind: RetryKind,

    /// Number of re-queues allowed. 0 means unlimited.
    pub max_attempts: u32,

    #[serde(rename = "base_interval_ms", with = "duration_ms")]
    pub base_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            kind: RetryKind::Exponential,
            max_attempts: 5,
            base_interval: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(kind: RetryKind, max_attempts: u32, base_interval: Duration) -> Self {
        Self {
            kind,
            max_attempts,
            base_interval,
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.max_attempts == 0
    }

    /// May a task that has already been re-queued `retry_count` times be re-queued again?
    pub fn allows_retry(&self, retry_count: u32) -> bool {
        self.is_unlimited() || retry_count < self.max_attempts
    }

    /// Delay before a task re-queued with the given (pre-increment) `retry_count`
    /// becomes claimable again.
    ///
    /// Saturates at `Duration::MAX` instead of overflowing.
    pub fn next_delay(&self, retry_count: u32) -> Duration {
        let base = self.base_interval;
        match self.kind {
            RetryKind::Constant => base,
            RetryKind::Linear => base.saturating_mul(retry_count.saturating_add(1)),
            RetryKind::Exponential => match 2u32.checked_pow(retry_count) {
                Some(factor) => base.saturating_mul(factor),
                None if base.is_zero() => Duration::ZERO,
                None => Duration::MAX,
            },
        }
    }
}

/// Serde helper: `Duration` as integer milliseconds.
pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
