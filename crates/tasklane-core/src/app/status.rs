//! Status - read-side views returned by the lifecycle service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Task, TaskId, TaskStatus};

/// Answer to "where is my task?".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatusView {
    pub id: TaskId,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_eligible_at: Option<DateTime<Utc>>,
}

impl From<&Task> for TaskStatusView {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id,
            status: task.status,
            error: task.error.clone(),
            retry_count: task.retry_count,
            next_eligible_at: task
                .next_eligible_at
                .filter(|_| task.status == TaskStatus::Pending),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewTask;
    use chrono::TimeDelta;
    use ulid::Ulid;

    #[test]
    fn backoff_deadline_only_shown_while_pending() {
        let now = Utc::now();
        let mut task = Task::new(TaskId::from_ulid(Ulid::new()), NewTask::new("orders", vec![]), now);
        task.claim(now);
        task.requeue("boom".into(), now + TimeDelta::seconds(1), now);

        let view = TaskStatusView::from(&task);
        assert_eq!(view.status, TaskStatus::Pending);
        assert_eq!(view.error.as_deref(), Some("boom"));
        assert!(view.next_eligible_at.is_some());

        task.claim(now + TimeDelta::seconds(1));
        assert_eq!(TaskStatusView::from(&task).next_eligible_at, None);
    }
}
