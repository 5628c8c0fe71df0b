//! TaskProcessor port - business logic run against a claimed task.
//!
//! The lifecycle core never looks inside `Task::payload`; processors own its
//! format and publish it through `task_schema`.

use async_trait::async_trait;

use crate::domain::Task;
use crate::error::ProcessError;

#[async_trait]
pub trait TaskProcessor: Send + Sync {
    /// `Err` is a business failure, reported as a failed outcome.
    async fn process_task(&self, task: &Task) -> Result<(), ProcessError>;

    /// JSON schema of the payload this processor expects.
    fn task_schema(&self) -> &str;
}
