//! Task lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Task status.
///
/// State transitions:
/// - Pending -> InProgress (claim)
/// - InProgress -> Completed
/// - InProgress -> Pending (retry, gated by `next_eligible_at`)
/// - InProgress -> DeadLettered (retries exhausted, DLQ enabled)
/// - InProgress -> Failed (retries exhausted, DLQ disabled)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting to be claimed.
    Pending,

    /// Claimed by exactly one caller.
    InProgress,

    Completed,

    /// Failed permanently, no DLQ configured.
    Failed,

    /// Retries exhausted and copied into the dead-letter store.
    #[serde(rename = "dlq")]
    DeadLettered,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Completed,
        TaskStatus::Failed,
        TaskStatus::DeadLettered,
    ];

    /// No further transitions from here.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::DeadLettered
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::DeadLettered => "dlq",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task status `{0}`")]
pub struct ParseStatusError(pub String);

impl FromStr for TaskStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseStatusError(s.to_string()))
    }
}
