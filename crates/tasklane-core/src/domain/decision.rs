//! Decision model: next state of a task after an executor reports an outcome.
//!
//! The Decider is a pure function of (task, outcome, executor policy, now).
//! Applying the decision to the store is the lifecycle service's job.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use super::executor::ExecutorConfig;
use super::outcome::{Outcome, ReportedStatus};
use super::task::Task;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// InProgress -> Completed.
    Complete,

    /// InProgress -> Pending, retry_count + 1, hidden until `next_eligible_at`.
    Retry {
        delay: Duration,
        next_eligible_at: DateTime<Utc>,
        error: String,
    },

    /// Retries exhausted, DLQ enabled.
    DeadLetter { queue_name: String, error: String },

    /// Retries exhausted (or no policy left), DLQ disabled.
    Fail { error: String },
}

pub trait Decider: Send + Sync {
    /// # Arguments
    /// * `task` - the record as currently stored (InProgress)
    /// * `outcome` - what the executor reported
    /// * `config` - the owning executor's config, `None` if it was deleted meanwhile
    /// * `now` - decision time; the retry deadline is computed from it
    fn decide(
        &self,
        task: &Task,
        outcome: &Outcome,
        config: Option<&ExecutorConfig>,
        now: DateTime<Utc>,
    ) -> Decision;
}

/// Attempt-count retry with the executor's backoff curve, then DLQ or Failed.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDecider;

impl Decider for DefaultDecider {
    fn decide(
        &self,
        task: &Task,
        outcome: &Outcome,
        config: Option<&ExecutorConfig>,
        now: DateTime<Utc>,
    ) -> Decision {
        if outcome.status == ReportedStatus::Completed {
            return Decision::Complete;
        }

        let error = outcome
            .error_message()
            .unwrap_or("task failed without an error message")
            .to_string();

        let Some(config) = config else {
            return Decision::Fail {
                error: format!("{error} (executor `{}` no longer exists)", task.executor_name),
            };
        };

        let policy = &config.retry_policy;
        if policy.allows_retry(task.retry_count) {
            let delay = policy.next_delay(task.retry_count);
            return Decision::Retry {
                delay,
                next_eligible_at: deadline(now, delay),
                error,
            };
        }

        if config.dlq_config.enabled {
            Decision::DeadLetter {
                queue_name: config.dlq_config.queue_name.clone(),
                error,
            }
        } else {
            Decision::Fail { error }
        }
    }
}

/// `now + delay`, clamped to the representable range.
fn deadline(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(delay)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
