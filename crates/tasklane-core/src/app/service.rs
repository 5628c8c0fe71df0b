//! LifecycleService - the request/response boundary over the task store,
//! the executor registry and the decider.
//!
//! # Design
//! - Stateless: every field is a shared handle or immutable config, so any number
//!   of clones (or processes sharing one backend) can serve requests.
//! - All coordination is delegated to the store's conditional updates.
//! - Every store call is bounded by `LifecycleConfig::store_timeout`; a timeout
//!   surfaces as a retryable `LifecycleError::Timeout` and changes nothing.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::app::status::TaskStatusView;
use crate::config::LifecycleConfig;
use crate::domain::{
    Decider, Decision, DefaultDecider, ExecutorConfig, ExecutorSpec, NewTask, Outcome,
    ReportedStatus, Task, TaskId, TaskStatus,
};
use crate::error::{LifecycleError, StoreError};
use crate::impls::{InMemoryExecutorRegistry, InMemoryTaskStore};
use crate::observability::StatusCounts;
use crate::ports::{
    Clock, ExecutorRegistry, IdGenerator, SystemClock, TaskStore, TaskUpdate, UlidGenerator,
};

#[derive(Clone)]
pub struct LifecycleService {
    tasks: Arc<dyn TaskStore>,
    executors: Arc<dyn ExecutorRegistry>,
    clock: Arc<dyn Clock>,
    decider: Arc<dyn Decider>,
    config: LifecycleConfig,
}

impl LifecycleService {
    pub fn new(tasks: Arc<dyn TaskStore>, executors: Arc<dyn ExecutorRegistry>) -> Self {
        Self {
            tasks,
            executors,
            clock: Arc::new(SystemClock),
            decider: Arc::new(DefaultDecider),
            config: LifecycleConfig::default(),
        }
    }

    /// Service over fresh in-memory adapters. IDs and timestamps both follow `clock`.
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        let ids: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(Arc::clone(&clock)));
        Self::new(
            Arc::new(InMemoryTaskStore::new(Arc::clone(&ids))),
            Arc::new(InMemoryExecutorRegistry::new(ids)),
        )
        .with_clock(clock)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_decider(mut self, decider: Arc<dyn Decider>) -> Self {
        self.decider = decider;
        self
    }

    pub fn with_config(mut self, config: LifecycleConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    // ---- tasks ----

    pub async fn submit_task(&self, new_task: NewTask) -> Result<Task, LifecycleError> {
        require_name("executor_name", &new_task.executor_name)?;
        let now = self.clock.now();
        let task = self.call("submit", self.tasks.submit(new_task, now)).await?;
        info!(task_id = %task.id, executor = %task.executor_name, "task submitted");
        Ok(task)
    }

    pub async fn get_task(&self, id: TaskId) -> Result<Task, LifecycleError> {
        self.call("get_task", self.tasks.get(id)).await
    }

    pub async fn get_task_status(&self, id: TaskId) -> Result<TaskStatusView, LifecycleError> {
        let task = self.get_task(id).await?;
        Ok(TaskStatusView::from(&task))
    }

    /// Claim one eligible Pending task for `executor_name`.
    ///
    /// The registry is checked first; a missing or disabled executor fails
    /// without touching the task store. `Ok(None)` means "nothing to do now".
    pub async fn claim_next(&self, executor_name: &str) -> Result<Option<Task>, LifecycleError> {
        self.active_executor(executor_name).await?;
        let now = self.clock.now();
        let claimed = self
            .call("claim_next", self.tasks.claim_next(executor_name, now))
            .await?;
        match &claimed {
            Some(task) => info!(
                task_id = %task.id,
                executor = %executor_name,
                retry_count = task.retry_count,
                "task claimed"
            ),
            None => debug!(executor = %executor_name, "no claimable task"),
        }
        Ok(claimed)
    }

    /// Record the outcome of a claimed task and move it to its next state.
    ///
    /// Safe under at-least-once delivery: if the task is no longer InProgress
    /// (already terminal, or already re-queued by an earlier copy of the same
    /// report) the current record is returned and nothing changes.
    pub async fn report_outcome(
        &self,
        task_id: TaskId,
        outcome: Outcome,
    ) -> Result<Task, LifecycleError> {
        let task = self.get_task(task_id).await?;
        if task.status != TaskStatus::InProgress {
            debug!(task_id = %task.id, status = %task.status, "outcome ignored, task not in progress");
            return Ok(task);
        }

        let config = match outcome.status {
            ReportedStatus::Completed => None,
            ReportedStatus::Failed => {
                self.call("get_executor", self.executors.get(&task.executor_name))
                    .await?
            }
        };
        if outcome.status == ReportedStatus::Failed && config.is_none() {
            warn!(
                task_id = %task.id,
                executor = %task.executor_name,
                "executor config missing, failing task without retry"
            );
        }

        let now = self.clock.now();
        let decision = self.decider.decide(&task, &outcome, config.as_ref(), now);
        self.apply_decision(task, &outcome, decision).await
    }

    async fn apply_decision(
        &self,
        mut task: Task,
        outcome: &Outcome,
        decision: Decision,
    ) -> Result<Task, LifecycleError> {
        let now = self.clock.now();
        let update = match decision {
            Decision::Complete => TaskUpdate::Complete {
                error: outcome.error_message().map(str::to_string),
            },
            Decision::Retry {
                delay,
                next_eligible_at,
                error,
            } => {
                info!(
                    task_id = %task.id,
                    executor = %task.executor_name,
                    retry_count = task.retry_count.saturating_add(1),
                    ?delay,
                    %next_eligible_at,
                    "task re-queued"
                );
                TaskUpdate::Requeue {
                    error,
                    next_eligible_at,
                }
            }
            Decision::Fail { error } => TaskUpdate::Fail { error },
            Decision::DeadLetter { queue_name, error } => {
                warn!(
                    task_id = %task.id,
                    executor = %task.executor_name,
                    queue = %queue_name,
                    retry_count = task.retry_count,
                    "retries exhausted, moving task to dead-letter queue"
                );
                task.error = Some(error);
                let moved = self
                    .timed("move_to_dead_letter", self.tasks.move_to_dead_letter(&task, now))
                    .await?;
                return settle(moved);
            }
        };

        let updated = self
            .timed(
                "update_task",
                self.tasks
                    .update_if(task.id, TaskStatus::InProgress, update, now),
            )
            .await?;
        let updated = settle(updated)?;
        info!(task_id = %updated.id, status = %updated.status, "outcome recorded");
        Ok(updated)
    }

    // ---- executors ----

    /// Verify that `name` exists and is enabled.
    pub async fn register_executor(&self, name: &str) -> Result<ExecutorConfig, LifecycleError> {
        let config = self.active_executor(name).await?;
        info!(executor = %name, "executor registered");
        Ok(config)
    }

    pub async fn create_executor(
        &self,
        spec: ExecutorSpec,
    ) -> Result<ExecutorConfig, LifecycleError> {
        require_name("name", &spec.name)?;
        let now = self.clock.now();
        let config = self
            .call("create_executor", self.executors.create(spec, now))
            .await?;
        info!(executor = %config.name, id = %config.id, "executor created");
        Ok(config)
    }

    pub async fn update_executor(
        &self,
        name: &str,
        spec: ExecutorSpec,
    ) -> Result<ExecutorConfig, LifecycleError> {
        require_name("name", name)?;
        let now = self.clock.now();
        let config = self
            .call("update_executor", self.executors.update(name, spec, now))
            .await?;
        info!(executor = %config.name, enabled = config.enabled, "executor updated");
        Ok(config)
    }

    pub async fn get_executor(&self, name: &str) -> Result<ExecutorConfig, LifecycleError> {
        require_name("name", name)?;
        self.call("get_executor", self.executors.get(name))
            .await?
            .ok_or_else(|| StoreError::executor_not_found(name).into())
    }

    pub async fn list_executors(&self) -> Result<Vec<ExecutorConfig>, LifecycleError> {
        self.call("list_executors", self.executors.list()).await
    }

    /// Tasks already submitted for the executor stay in the store; claims for
    /// it fail with NotFound from now on.
    pub async fn delete_executor(&self, name: &str) -> Result<(), LifecycleError> {
        require_name("name", name)?;
        let removed = self
            .call("delete_executor", self.executors.delete(name))
            .await?;
        info!(executor = %removed.name, "executor deleted");
        Ok(())
    }

    // ---- dead letters / observability ----

    pub async fn list_dead_letters(&self, executor_name: &str) -> Result<Vec<Task>, LifecycleError> {
        require_name("executor_name", executor_name)?;
        self.call("list_dead_letters", self.tasks.list_dead_letters(executor_name))
            .await
    }

    pub async fn clear_dead_letters(&self, executor_name: &str) -> Result<usize, LifecycleError> {
        require_name("executor_name", executor_name)?;
        let cleared = self
            .call("clear_dead_letters", self.tasks.clear_dead_letters(executor_name))
            .await?;
        info!(executor = %executor_name, cleared, "dead-letter queue cleared");
        Ok(cleared)
    }

    pub async fn status_counts(
        &self,
        executor_name: Option<&str>,
    ) -> Result<StatusCounts, LifecycleError> {
        self.call("counts_by_status", self.tasks.counts_by_status(executor_name))
            .await
    }

    // ---- helpers ----

    async fn active_executor(&self, name: &str) -> Result<ExecutorConfig, LifecycleError> {
        require_name("executor_name", name)?;
        let config = self
            .call("get_executor", self.executors.get(name))
            .await?
            .ok_or_else(|| LifecycleError::from(StoreError::executor_not_found(name)))?;
        if !config.enabled {
            return Err(LifecycleError::ExecutorDisabled(name.to_string()));
        }
        Ok(config)
    }

    /// Run a store call under the configured timeout. The inner store error is
    /// left for the caller to inspect.
    async fn timed<T, F>(&self, op: &'static str, fut: F) -> Result<Result<T, StoreError>, LifecycleError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let timeout = self.config.store_timeout;
        tokio::time::timeout(timeout, fut).await.map_err(|_| {
            warn!(op, ?timeout, "store call timed out");
            LifecycleError::Timeout { op, timeout }
        })
    }

    async fn call<T, F>(&self, op: &'static str, fut: F) -> Result<T, LifecycleError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        self.timed(op, fut).await?.map_err(LifecycleError::from)
    }
}

/// A conditional update that lost to a concurrent report is not an error:
/// the winner's record is the answer.
fn settle(result: Result<Task, StoreError>) -> Result<Task, LifecycleError> {
    match result {
        Ok(task) => Ok(task),
        Err(StoreError::Conflict { current }) => {
            debug!(task_id = %current.id, status = %current.status, "concurrent outcome already applied");
            Ok(*current)
        }
        Err(other) => Err(other.into()),
    }
}

fn require_name(field: &str, value: &str) -> Result<(), LifecycleError> {
    if value.trim().is_empty() {
        return Err(LifecycleError::InvalidArgument(format!(
            "{field} must not be empty"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RetryKind, RetryPolicy};
    use crate::error::ErrorCode;
    use crate::ports::ManualClock;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn service() -> (LifecycleService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(t0()));
        let svc = LifecycleService::in_memory(clock.clone());
        (svc, clock)
    }

    fn order_processor(max_attempts: u32, dlq: bool) -> ExecutorSpec {
        let spec = ExecutorSpec::new("order_processor").with_retry_policy(RetryPolicy::new(
            RetryKind::Exponential,
            max_attempts,
            Duration::from_secs(1),
        ));
        if dlq { spec.with_dlq("order_processor_dlq") } else { spec }
    }

    async fn claim(svc: &LifecycleService) -> Option<Task> {
        svc.claim_next("order_processor").await.unwrap()
    }

    async fn fail(svc: &LifecycleService, id: TaskId) -> Task {
        svc.report_outcome(id, Outcome::failed("payment gateway down"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn submit_rejects_empty_executor_name() {
        let (svc, _) = service();
        let err = svc.submit_task(NewTask::new("  ", vec![])).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
    }

    #[tokio::test]
    async fn submit_then_status() {
        let (svc, _) = service();
        let task = svc
            .submit_task(NewTask::new("order_processor", b"{}".to_vec()))
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.created_at, t0());

        let view = svc.get_task_status(task.id).await.unwrap();
        assert_eq!(view.status, TaskStatus::Pending);
        assert_eq!(view.error, None);
    }

    #[tokio::test]
    async fn success_completes_task() {
        let (svc, clock) = service();
        svc.create_executor(order_processor(3, true)).await.unwrap();
        let task = svc
            .submit_task(NewTask::new("order_processor", vec![]))
            .await
            .unwrap();
        let claimed = claim(&svc).await.unwrap();
        assert_eq!(claimed.id, task.id);
        assert_eq!(claimed.status, TaskStatus::InProgress);

        clock.advance(Duration::from_secs(2));
        let done = svc.report_outcome(task.id, Outcome::completed()).await.unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.completed_at, Some(t0() + TimeDelta::seconds(2)));
        assert_eq!(done.retry_count, 0);
    }

    #[tokio::test]
    async fn order_processor_scenario_ends_in_dead_letter_queue() {
        let (svc, clock) = service();
        svc.create_executor(order_processor(3, true)).await.unwrap();
        let t1 = svc
            .submit_task(NewTask::new("order_processor", br#"{"order_id":"A-1"}"#.to_vec()))
            .await
            .unwrap();

        let mut retry_counts = vec![t1.retry_count];
        // (retry_count after the failure, backoff before the next claim)
        for (expected_retries, backoff_secs) in [(1, 1), (2, 2), (3, 4)] {
            let claimed = claim(&svc).await.unwrap();
            assert_eq!(claimed.id, t1.id);
            assert_eq!(claimed.status, TaskStatus::InProgress);

            let requeued = fail(&svc, t1.id).await;
            assert_eq!(requeued.status, TaskStatus::Pending);
            assert_eq!(requeued.retry_count, expected_retries);
            assert_eq!(requeued.error.as_deref(), Some("payment gateway down"));
            assert_eq!(
                requeued.next_eligible_at,
                Some(clock.now() + TimeDelta::seconds(backoff_secs))
            );
            retry_counts.push(requeued.retry_count);

            // not claimable while backing off
            clock.advance(Duration::from_secs(backoff_secs as u64) - Duration::from_millis(1));
            assert_eq!(claim(&svc).await, None);
            clock.advance(Duration::from_millis(1));
        }

        claim(&svc).await.unwrap();
        let dead = fail(&svc, t1.id).await;
        assert_eq!(dead.status, TaskStatus::DeadLettered);
        assert_eq!(dead.retry_count, 3);
        assert!(dead.completed_at.is_some());
        retry_counts.push(dead.retry_count);
        assert!(retry_counts.windows(2).all(|w| w[0] <= w[1]));

        let dlq = svc.list_dead_letters("order_processor").await.unwrap();
        assert_eq!(dlq.len(), 1);
        assert_eq!(dlq[0].id, t1.id);
        assert_eq!(claim(&svc).await, None);
    }

    #[tokio::test]
    async fn exhaustion_without_dlq_fails_terminally() {
        let (svc, clock) = service();
        svc.create_executor(order_processor(2, false)).await.unwrap();
        let task = svc
            .submit_task(NewTask::new("order_processor", vec![]))
            .await
            .unwrap();

        let mut last = task.clone();
        for _ in 0..3 {
            clock.advance(Duration::from_secs(60));
            claim(&svc).await.unwrap();
            last = fail(&svc, task.id).await;
        }
        assert_eq!(last.status, TaskStatus::Failed);
        assert_eq!(last.retry_count, 2);
        assert!(svc.list_dead_letters("order_processor").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unlimited_retries_still_back_off() {
        let (svc, clock) = service();
        svc.create_executor(order_processor(0, true)).await.unwrap();
        let task = svc
            .submit_task(NewTask::new("order_processor", vec![]))
            .await
            .unwrap();

        for round in 0..10u32 {
            claim(&svc).await.unwrap();
            let requeued = fail(&svc, task.id).await;
            assert_eq!(requeued.status, TaskStatus::Pending);
            assert_eq!(requeued.retry_count, round + 1);
            assert_eq!(claim(&svc).await, None);
            clock.advance(Duration::from_secs(1 << round));
        }
    }

    #[tokio::test]
    async fn duplicate_reports_are_no_ops() {
        let (svc, _) = service();
        svc.create_executor(order_processor(3, true)).await.unwrap();

        let done = svc
            .submit_task(NewTask::new("order_processor", vec![]))
            .await
            .unwrap();
        claim(&svc).await.unwrap();
        let first = svc.report_outcome(done.id, Outcome::completed()).await.unwrap();
        let second = svc.report_outcome(done.id, Outcome::completed()).await.unwrap();
        assert_eq!(first, second);

        let retried = svc
            .submit_task(NewTask::new("order_processor", vec![]))
            .await
            .unwrap();
        claim(&svc).await.unwrap();
        let first = fail(&svc, retried.id).await;
        let second = fail(&svc, retried.id).await;
        assert_eq!(first, second);
        assert_eq!(second.retry_count, 1);
    }

    #[tokio::test]
    async fn duplicate_dead_letter_report_keeps_single_entry() {
        let (svc, clock) = service();
        svc.create_executor(order_processor(1, true)).await.unwrap();
        let task = svc
            .submit_task(NewTask::new("order_processor", vec![]))
            .await
            .unwrap();

        claim(&svc).await.unwrap();
        fail(&svc, task.id).await;
        clock.advance(Duration::from_secs(1));
        claim(&svc).await.unwrap();

        let first = fail(&svc, task.id).await;
        let second = fail(&svc, task.id).await;
        assert_eq!(first.status, TaskStatus::DeadLettered);
        assert_eq!(first, second);
        assert_eq!(svc.list_dead_letters("order_processor").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn claim_against_missing_or_disabled_executor() {
        let (svc, _) = service();
        let err = svc.claim_next("ghost").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);

        svc.create_executor(ExecutorSpec::new("paused").enabled(false))
            .await
            .unwrap();
        let err = svc.claim_next("paused").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::FailedPrecondition);
        let err = svc.register_executor("paused").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::FailedPrecondition);

        let err = svc.register_executor("").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
    }

    #[tokio::test]
    async fn deleted_executor_strands_claims_and_fails_in_flight_tasks() {
        let (svc, _) = service();
        svc.create_executor(order_processor(3, true)).await.unwrap();
        let task = svc
            .submit_task(NewTask::new("order_processor", vec![]))
            .await
            .unwrap();
        claim(&svc).await.unwrap();

        svc.delete_executor("order_processor").await.unwrap();
        let err = svc.claim_next("order_processor").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);

        let failed = fail(&svc, task.id).await;
        assert_eq!(failed.status, TaskStatus::Failed);
        assert_eq!(failed.retry_count, 0);
    }

    #[tokio::test]
    async fn executor_crud_round_trip() {
        let (svc, clock) = service();
        let created = svc.create_executor(order_processor(3, true)).await.unwrap();
        let err = svc.create_executor(order_processor(3, true)).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::AlreadyExists);

        clock.advance(Duration::from_secs(1));
        let updated = svc
            .update_executor("order_processor", order_processor(5, false))
            .await
            .unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.retry_policy.max_attempts, 5);
        assert!(!updated.dlq_config.enabled);
        assert_eq!(svc.get_executor("order_processor").await.unwrap(), updated);
        assert_eq!(svc.list_executors().await.unwrap(), vec![updated]);

        svc.delete_executor("order_processor").await.unwrap();
        assert_eq!(
            svc.get_executor("order_processor").await.unwrap_err().code(),
            ErrorCode::NotFound
        );
        assert_eq!(
            svc.delete_executor("order_processor").await.unwrap_err().code(),
            ErrorCode::NotFound
        );
        assert_eq!(
            svc.update_executor("order_processor", order_processor(1, false))
                .await
                .unwrap_err()
                .code(),
            ErrorCode::NotFound
        );
    }

    #[tokio::test]
    async fn clear_dead_letters_reports_count() {
        let (svc, _) = service();
        svc.create_executor(order_processor(0, true)).await.unwrap();
        svc.update_executor(
            "order_processor",
            ExecutorSpec::new("order_processor")
                .with_retry_policy(RetryPolicy::new(RetryKind::Constant, 1, Duration::ZERO))
                .with_dlq(""),
        )
        .await
        .unwrap();
        assert_eq!(svc.clear_dead_letters("order_processor").await.unwrap(), 0);

        for _ in 0..2 {
            let task = svc
                .submit_task(NewTask::new("order_processor", vec![]))
                .await
                .unwrap();
            // first failure requeues with zero delay, second exhausts
            claim(&svc).await.unwrap();
            fail(&svc, task.id).await;
            claim(&svc).await.unwrap();
            assert_eq!(fail(&svc, task.id).await.status, TaskStatus::DeadLettered);
        }
        let counts = svc.status_counts(Some("order_processor")).await.unwrap();
        assert_eq!(counts.dead_lettered, 2);

        assert_eq!(svc.clear_dead_letters("order_processor").await.unwrap(), 2);
        assert!(svc.list_dead_letters("order_processor").await.unwrap().is_empty());
        assert_eq!(svc.clear_dead_letters("order_processor").await.unwrap(), 0);
        assert_eq!(
            svc.clear_dead_letters("").await.unwrap_err().code(),
            ErrorCode::InvalidArgument
        );
    }

    #[tokio::test]
    async fn unknown_task_is_not_found() {
        let (svc, _) = service();
        let id = UlidGenerator::new(SystemClock).generate_task_id();
        assert_eq!(svc.get_task(id).await.unwrap_err().code(), ErrorCode::NotFound);
        assert_eq!(
            svc.report_outcome(id, Outcome::completed())
                .await
                .unwrap_err()
                .code(),
            ErrorCode::NotFound
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn one_pending_task_has_exactly_one_claimant() {
        let (svc, _) = service();
        svc.create_executor(order_processor(3, true)).await.unwrap();
        let task = svc
            .submit_task(NewTask::new("order_processor", vec![]))
            .await
            .unwrap();

        let callers = 32;
        let barrier = Arc::new(tokio::sync::Barrier::new(callers));
        let mut joins = Vec::with_capacity(callers);
        for _ in 0..callers {
            let svc = svc.clone();
            let barrier = Arc::clone(&barrier);
            joins.push(tokio::spawn(async move {
                barrier.wait().await;
                svc.claim_next("order_processor").await.unwrap()
            }));
        }

        let mut winners = Vec::new();
        for join in joins {
            if let Some(claimed) = join.await.unwrap() {
                winners.push(claimed);
            }
        }
        assert_eq!(winners.len(), 1);
        assert_eq!(winners[0].id, task.id);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_pollers_split_tasks_without_duplicates() {
        let (svc, _) = service();
        svc.create_executor(order_processor(3, true)).await.unwrap();
        for i in 0..50u8 {
            svc.submit_task(NewTask::new("order_processor", vec![i]))
                .await
                .unwrap();
        }

        let mut joins = Vec::new();
        for _ in 0..8 {
            let svc = svc.clone();
            joins.push(tokio::spawn(async move {
                let mut mine = Vec::new();
                while let Some(task) = svc.claim_next("order_processor").await.unwrap() {
                    mine.push(task.id);
                }
                mine
            }));
        }

        let mut all = Vec::new();
        for join in joins {
            all.extend(join.await.unwrap());
        }
        let total = all.len();
        all.sort();
        all.dedup();
        assert_eq!(total, 50);
        assert_eq!(all.len(), 50);
    }

    // ---- store call accounting / timeouts ----

    struct CountingStore {
        inner: InMemoryTaskStore,
        calls: AtomicUsize,
    }

    impl CountingStore {
        fn hit(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl TaskStore for CountingStore {
        async fn submit(&self, new_task: NewTask, now: DateTime<Utc>) -> Result<Task, StoreError> {
            self.hit();
            self.inner.submit(new_task, now).await
        }
        async fn get(&self, id: TaskId) -> Result<Task, StoreError> {
            self.hit();
            self.inner.get(id).await
        }
        async fn claim_next(
            &self,
            executor_name: &str,
            now: DateTime<Utc>,
        ) -> Result<Option<Task>, StoreError> {
            self.hit();
            self.inner.claim_next(executor_name, now).await
        }
        async fn set_status(
            &self,
            id: TaskId,
            status: TaskStatus,
            error: Option<String>,
            now: DateTime<Utc>,
        ) -> Result<Task, StoreError> {
            self.hit();
            self.inner.set_status(id, status, error, now).await
        }
        async fn update_if(
            &self,
            id: TaskId,
            expected: TaskStatus,
            update: TaskUpdate,
            now: DateTime<Utc>,
        ) -> Result<Task, StoreError> {
            self.hit();
            self.inner.update_if(id, expected, update, now).await
        }
        async fn move_to_dead_letter(
            &self,
            task: &Task,
            now: DateTime<Utc>,
        ) -> Result<Task, StoreError> {
            self.hit();
            self.inner.move_to_dead_letter(task, now).await
        }
        async fn list_dead_letters(&self, executor_name: &str) -> Result<Vec<Task>, StoreError> {
            self.hit();
            self.inner.list_dead_letters(executor_name).await
        }
        async fn clear_dead_letters(&self, executor_name: &str) -> Result<usize, StoreError> {
            self.hit();
            self.inner.clear_dead_letters(executor_name).await
        }
        async fn counts_by_status(
            &self,
            executor_name: Option<&str>,
        ) -> Result<StatusCounts, StoreError> {
            self.hit();
            self.inner.counts_by_status(executor_name).await
        }
    }

    #[tokio::test]
    async fn rejected_claims_never_reach_the_task_store() {
        let store = Arc::new(CountingStore {
            inner: InMemoryTaskStore::default(),
            calls: AtomicUsize::new(0),
        });
        let svc = LifecycleService::new(store.clone(), Arc::new(InMemoryExecutorRegistry::default()));
        svc.create_executor(ExecutorSpec::new("paused").enabled(false))
            .await
            .unwrap();

        for name in ["paused", "ghost"] {
            assert!(svc.register_executor(name).await.is_err());
            assert!(svc.claim_next(name).await.is_err());
        }
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);

        svc.create_executor(ExecutorSpec::new("live")).await.unwrap();
        assert_eq!(svc.claim_next("live").await.unwrap(), None);
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    struct StalledStore(InMemoryTaskStore);

    #[async_trait]
    impl TaskStore for StalledStore {
        async fn submit(&self, new_task: NewTask, now: DateTime<Utc>) -> Result<Task, StoreError> {
            self.0.submit(new_task, now).await
        }
        async fn get(&self, id: TaskId) -> Result<Task, StoreError> {
            self.0.get(id).await
        }
        async fn claim_next(
            &self,
            _executor_name: &str,
            _now: DateTime<Utc>,
        ) -> Result<Option<Task>, StoreError> {
            std::future::pending().await
        }
        async fn set_status(
            &self,
            id: TaskId,
            status: TaskStatus,
            error: Option<String>,
            now: DateTime<Utc>,
        ) -> Result<Task, StoreError> {
            self.0.set_status(id, status, error, now).await
        }
        async fn update_if(
            &self,
            id: TaskId,
            expected: TaskStatus,
            update: TaskUpdate,
            now: DateTime<Utc>,
        ) -> Result<Task, StoreError> {
            self.0.update_if(id, expected, update, now).await
        }
        async fn move_to_dead_letter(
            &self,
            task: &Task,
            now: DateTime<Utc>,
        ) -> Result<Task, StoreError> {
            self.0.move_to_dead_letter(task, now).await
        }
        async fn list_dead_letters(&self, executor_name: &str) -> Result<Vec<Task>, StoreError> {
            self.0.list_dead_letters(executor_name).await
        }
        async fn clear_dead_letters(&self, executor_name: &str) -> Result<usize, StoreError> {
            self.0.clear_dead_letters(executor_name).await
        }
        async fn counts_by_status(
            &self,
            executor_name: Option<&str>,
        ) -> Result<StatusCounts, StoreError> {
            self.0.counts_by_status(executor_name).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_store_call_times_out_as_retryable() {
        let svc = LifecycleService::new(
            Arc::new(StalledStore(InMemoryTaskStore::default())),
            Arc::new(InMemoryExecutorRegistry::default()),
        );
        svc.create_executor(ExecutorSpec::new("orders")).await.unwrap();
        let task = svc.submit_task(NewTask::new("orders", vec![])).await.unwrap();

        let err = svc.claim_next("orders").await.unwrap_err();
        assert!(matches!(err, LifecycleError::Timeout { op: "claim_next", .. }));
        assert!(err.is_retryable());
        assert_eq!(err.code(), ErrorCode::Internal);

        // nothing half-applied
        assert_eq!(svc.get_task(task.id).await.unwrap().status, TaskStatus::Pending);
    }
}
