//! TaskStore port - the source of truth for task state.
//!
//! Any backend offering an atomic conditional update can implement this trait
//! (a document store's find-and-modify, `UPDATE ... WHERE status = ...
//! RETURNING *` in SQL, a single lock in memory).
//!
//! # Contract
//! - `claim_next` is one atomic step: select an eligible Pending task and flip it
//!   to InProgress. Two concurrent callers never receive the same task.
//! - `update_if` and `move_to_dead_letter` only apply when the stored status
//!   matches; otherwise `StoreError::Conflict` carries the current record.
//! - A failed call leaves the stored record untouched.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{NewTask, Task, TaskId, TaskStatus};
use crate::error::StoreError;
use crate::observability::StatusCounts;

/// A guarded transition out of InProgress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskUpdate {
    Complete {
        error: Option<String>,
    },
    Requeue {
        error: String,
        next_eligible_at: DateTime<Utc>,
    },
    Fail {
        error: String,
    },
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert a new Pending task with a fresh ID.
    async fn submit(&self, new_task: NewTask, now: DateTime<Utc>) -> Result<Task, StoreError>;

    async fn get(&self, id: TaskId) -> Result<Task, StoreError>;

    /// Atomically claim the oldest eligible Pending task of `executor_name`
    /// (oldest `created_at`, then lowest id). `Ok(None)` when nothing is eligible.
    ///
    /// Once the store has applied the claim, only the returned record knows about it:
    /// callers must await the future to completion rather than drop it on shutdown.
    async fn claim_next(
        &self,
        executor_name: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Task>, StoreError>;

    /// Status change with the timestamp rules of `Task::set_status`.
    ///
    /// Terminal statuses are final: moving a Completed, Failed or DeadLettered task
    /// to any other status is a `Conflict` carrying the current record.
    async fn set_status(
        &self,
        id: TaskId,
        status: TaskStatus,
        error: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Task, StoreError>;

    /// Apply `update` only if the stored status equals `expected`.
    async fn update_if(
        &self,
        id: TaskId,
        expected: TaskStatus,
        update: TaskUpdate,
        now: DateTime<Utc>,
    ) -> Result<Task, StoreError>;

    /// Mark the task DeadLettered (with `task.error`) and copy it into the
    /// dead-letter collection of its executor. Idempotent by id: a task that is
    /// already DeadLettered is returned unchanged and not copied twice.
    async fn move_to_dead_letter(&self, task: &Task, now: DateTime<Utc>)
    -> Result<Task, StoreError>;

    async fn list_dead_letters(&self, executor_name: &str) -> Result<Vec<Task>, StoreError>;

    /// Returns how many entries were removed.
    async fn clear_dead_letters(&self, executor_name: &str) -> Result<usize, StoreError>;

    /// Counts over all tasks, or over one executor's tasks.
    async fn counts_by_status(
        &self,
        executor_name: Option<&str>,
    ) -> Result<StatusCounts, StoreError>;
}
