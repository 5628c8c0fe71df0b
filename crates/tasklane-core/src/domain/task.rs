//! Task record and its state transitions.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::TaskId;
use super::state::TaskStatus;

/// Submission input: everything the producer decides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub executor_name: String,
    #[serde(default)]
    pub payload: Vec<u8>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl NewTask {
    pub fn new(executor_name: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            executor_name: executor_name.into(),
            payload: payload.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// The single source of truth for a task.
///
/// Mutation goes through the methods below so the timestamp rules live in one place:
/// - `started_at` is stamped on every claim
/// - `completed_at` is stamped on entry into a terminal status
/// - `updated_at` is stamped on every change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub executor_name: String,
    pub status: TaskStatus,
    pub payload: Vec<u8>,
    pub metadata: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Earliest time a re-queued task may be claimed again.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_eligible_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(id: TaskId, new_task: NewTask, now: DateTime<Utc>) -> Self {
        Self {
            id,
            executor_name: new_task.executor_name,
            status: TaskStatus::Pending,
            payload: new_task.payload,
            metadata: new_task.metadata,
            error: None,
            retry_count: 0,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            next_eligible_at: None,
        }
    }

    /// Pending and past its backoff.
    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        self.status == TaskStatus::Pending && self.next_eligible_at.is_none_or(|at| at <= now)
    }

    /// Pending -> InProgress.
    pub fn claim(&mut self, now: DateTime<Utc>) {
        self.status = TaskStatus::InProgress;
        self.started_at = Some(now);
        self.updated_at = now;
    }

    /// Unconditional status change. `completed_at` is set only while the
    /// status is terminal.
    pub fn set_status(&mut self, status: TaskStatus, error: Option<String>, now: DateTime<Utc>) {
        self.status = status;
        self.error = error;
        if status == TaskStatus::InProgress {
            self.started_at = Some(now);
        }
        self.completed_at = status.is_terminal().then_some(now);
        self.updated_at = now;
    }

    /// InProgress -> Pending, one more retry consumed.
    pub fn requeue(&mut self, error: String, next_eligible_at: DateTime<Utc>, now: DateTime<Utc>) {
        self.status = TaskStatus::Pending;
        self.retry_count = self.retry_count.saturating_add(1);
        self.error = Some(error);
        self.next_eligible_at = Some(next_eligible_at);
        self.updated_at = now;
    }
}
