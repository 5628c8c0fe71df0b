//! In-memory task store.
//!
//! One `tokio::sync::Mutex` guards the whole state, so every operation is a
//! single critical section: the find-and-update of `claim_next` cannot
//! interleave with another claim or report on the same task.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::{NewTask, Task, TaskId, TaskStatus};
use crate::error::StoreError;
use crate::observability::StatusCounts;
use crate::ports::{IdGenerator, SystemClock, TaskStore, TaskUpdate, UlidGenerator};

/// Claim order key: oldest first, ties broken by id.
type ReadyKey = (DateTime<Utc>, TaskId);

/// Backoff key: earliest `next_eligible_at` first, then claim order.
type DelayedKey = (DateTime<Utc>, DateTime<Utc>, TaskId);

/// Pending tasks of one executor. Holds keys only.
///
/// Tasks still backing off sit in `delayed` until a claim at or past their
/// `next_eligible_at` promotes them, so a claim never walks tasks it cannot take.
#[derive(Default)]
struct PendingQueue {
    ready: BTreeSet<ReadyKey>,
    delayed: BTreeSet<DelayedKey>,
}

impl PendingQueue {
    fn insert(&mut self, task: &Task) {
        match task.next_eligible_at {
            Some(at) => {
                self.delayed.insert((at, task.created_at, task.id));
            }
            None => {
                self.ready.insert((task.created_at, task.id));
            }
        }
    }

    fn remove(&mut self, task: &Task) {
        self.ready.remove(&(task.created_at, task.id));
        if let Some(at) = task.next_eligible_at {
            self.delayed.remove(&(at, task.created_at, task.id));
        }
    }

    fn promote(&mut self, now: DateTime<Utc>) {
        while let Some(&(at, created_at, id)) = self.delayed.first() {
            if at > now {
                break;
            }
            self.delayed.pop_first();
            self.ready.insert((created_at, id));
        }
    }

    fn first_ready(&self) -> Option<TaskId> {
        self.ready.first().map(|&(_, id)| id)
    }
}

#[derive(Default)]
struct InMemoryTaskState {
    /// All task records (single source of truth).
    tasks: HashMap<TaskId, Task>,

    /// Pending tasks per executor, in claim order.
    pending: HashMap<String, PendingQueue>,

    /// Dead-letter copies per executor, in arrival order.
    dead_letters: HashMap<String, Vec<Task>>,
}

impl InMemoryTaskState {
    fn task_mut(&mut self, id: TaskId) -> Result<&mut Task, StoreError> {
        self.tasks
            .get_mut(&id)
            .ok_or_else(|| StoreError::task_not_found(id))
    }

    fn index_pending(&mut self, task: &Task) {
        self.pending
            .entry(task.executor_name.clone())
            .or_default()
            .insert(task);
    }

    fn unindex_pending(&mut self, task: &Task) {
        if let Some(queue) = self.pending.get_mut(&task.executor_name) {
            queue.remove(task);
        }
    }

    fn next_claimable(&mut self, executor_name: &str, now: DateTime<Utc>) -> Option<TaskId> {
        let queue = self.pending.get_mut(executor_name)?;
        queue.promote(now);
        queue.first_ready()
    }

    /// Mutate a task and keep the pending index in sync with its status.
    fn mutate<F>(&mut self, id: TaskId, f: F) -> Result<Task, StoreError>
    where
        F: FnOnce(&mut Task),
    {
        let before = self.task_mut(id)?.clone();
        let task = self.task_mut(id)?;
        f(task);
        let after = task.clone();

        if before.status == TaskStatus::Pending {
            self.unindex_pending(&before);
        }
        if after.status == TaskStatus::Pending {
            self.index_pending(&after);
        }
        Ok(after)
    }
}

pub struct InMemoryTaskStore {
    state: Mutex<InMemoryTaskState>,
    ids: Arc<dyn IdGenerator>,
}

impl InMemoryTaskStore {
    pub fn new(ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            state: Mutex::new(InMemoryTaskState::default()),
            ids,
        }
    }
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new(Arc::new(UlidGenerator::new(SystemClock)))
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn submit(&self, new_task: NewTask, now: DateTime<Utc>) -> Result<Task, StoreError> {
        let task = Task::new(self.ids.generate_task_id(), new_task, now);
        let mut state = self.state.lock().await;
        state.index_pending(&task);
        state.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn get(&self, id: TaskId) -> Result<Task, StoreError> {
        let state = self.state.lock().await;
        state
            .tasks
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::task_not_found(id))
    }

    async fn claim_next(
        &self,
        executor_name: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Task>, StoreError> {
        let mut state = self.state.lock().await;
        let Some(id) = state.next_claimable(executor_name, now) else {
            return Ok(None);
        };
        state.mutate(id, |task| task.claim(now)).map(Some)
    }

    async fn set_status(
        &self,
        id: TaskId,
        status: TaskStatus,
        error: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Task, StoreError> {
        let mut state = self.state.lock().await;
        let current = state.task_mut(id)?;
        if current.status.is_terminal() && current.status != status {
            return Err(StoreError::Conflict {
                current: Box::new(current.clone()),
            });
        }
        state.mutate(id, |task| task.set_status(status, error, now))
    }

    async fn update_if(
        &self,
        id: TaskId,
        expected: TaskStatus,
        update: TaskUpdate,
        now: DateTime<Utc>,
    ) -> Result<Task, StoreError> {
        let mut state = self.state.lock().await;
        let current = state.task_mut(id)?;
        if current.status != expected {
            return Err(StoreError::Conflict {
                current: Box::new(current.clone()),
            });
        }

        state.mutate(id, |task| match update {
            TaskUpdate::Complete { error } => task.set_status(TaskStatus::Completed, error, now),
            TaskUpdate::Requeue {
                error,
                next_eligible_at,
            } => task.requeue(error, next_eligible_at, now),
            TaskUpdate::Fail { error } => task.set_status(TaskStatus::Failed, Some(error), now),
        })
    }

    async fn move_to_dead_letter(
        &self,
        task: &Task,
        now: DateTime<Utc>,
    ) -> Result<Task, StoreError> {
        let mut state = self.state.lock().await;
        let current = state.task_mut(task.id)?;
        match current.status {
            TaskStatus::DeadLettered => return Ok(current.clone()),
            TaskStatus::InProgress => {}
            _ => {
                return Err(StoreError::Conflict {
                    current: Box::new(current.clone()),
                });
            }
        }

        let error = task.error.clone();
        let moved = state.mutate(task.id, |t| t.set_status(TaskStatus::DeadLettered, error, now))?;
        state
            .dead_letters
            .entry(moved.executor_name.clone())
            .or_default()
            .push(moved.clone());
        Ok(moved)
    }

    async fn list_dead_letters(&self, executor_name: &str) -> Result<Vec<Task>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .dead_letters
            .get(executor_name)
            .cloned()
            .unwrap_or_default())
    }

    async fn clear_dead_letters(&self, executor_name: &str) -> Result<usize, StoreError> {
        let mut state = self.state.lock().await;
        Ok(state
            .dead_letters
            .remove(executor_name)
            .map_or(0, |entries| entries.len()))
    }

    async fn counts_by_status(
        &self,
        executor_name: Option<&str>,
    ) -> Result<StatusCounts, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .tasks
            .values()
            .filter(|task| executor_name.is_none_or(|name| task.executor_name == name))
            .map(|task| task.status)
            .collect())
    }
}
