//! Outcome model: what an executor reports after running a claimed task.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::state::ParseStatusError;

/// Terminal result of one processing attempt, as seen by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportedStatus {
    Completed,
    Failed,
}

impl fmt::Display for ReportedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportedStatus::Completed => f.write_str("completed"),
            ReportedStatus::Failed => f.write_str("failed"),
        }
    }
}

impl FromStr for ReportedStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "completed" => Ok(ReportedStatus::Completed),
            "failed" => Ok(ReportedStatus::Failed),
            _ => Err(ParseStatusError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub status: ReportedStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Outcome {
    pub fn completed() -> Self {
        Self {
            status: ReportedStatus::Completed,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: ReportedStatus::Failed,
            error: Some(error.into()),
        }
    }

    /// Empty messages are treated as absent.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref().filter(|e| !e.is_empty())
    }
}
