use serde::{Deserialize, Serialize};

use crate::domain::TaskStatus;

/// Number of tasks per status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
    pub dead_lettered: usize,
}

impl StatusCounts {
    pub fn record(&mut self, status: TaskStatus) {
        match status {
            TaskStatus::Pending => self.pending += 1,
            TaskStatus::InProgress => self.in_progress += 1,
            TaskStatus::Completed => self.completed += 1,
            TaskStatus::Failed => self.failed += 1,
            TaskStatus::DeadLettered => self.dead_lettered += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.pending + self.in_progress + self.completed + self.failed + self.dead_lettered
    }

    /// Nothing left to claim or finish.
    pub fn is_drained(&self) -> bool {
        self.pending == 0 && self.in_progress == 0
    }
}

impl FromIterator<TaskStatus> for StatusCounts {
    fn from_iter<I: IntoIterator<Item = TaskStatus>>(iter: I) -> Self {
        let mut counts = StatusCounts::default();
        for status in iter {
            counts.record(status);
        }
        counts
    }
}
