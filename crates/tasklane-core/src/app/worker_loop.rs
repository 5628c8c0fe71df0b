//! WorkerLoop - executor-side polling loop.
//!
//! # Flow
//! 1. `register_executor` once per processor (fail fast on unknown / disabled)
//! 2. `claim_next`; when nothing is claimable wait `poll_interval`
//! 3. `TaskProcessor::process_task`
//! 4. `report_outcome` (retry / DLQ decisions belong to the service)
//!
//! Infrastructure errors never stop a poller; it waits `error_backoff` and tries again.
//! A claim in flight is never abandoned: shutdown is only observed between claims
//! and while waiting.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::app::processors::ProcessorRegistry;
use crate::app::service::LifecycleService;
use crate::domain::{Outcome, Task};
use crate::error::LifecycleError;
use crate::ports::TaskProcessor;

/// Worker group handle.
/// - `request_shutdown()` stops every poller before its next claim
/// - `shutdown_and_join()` waits for every poller to exit
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Register every processor's executor, then spawn `pollers_per_executor`
    /// pollers for each.
    ///
    /// Nothing is spawned if any registration fails.
    pub async fn spawn(
        service: LifecycleService,
        processors: Arc<ProcessorRegistry>,
        pollers_per_executor: usize,
    ) -> Result<Self, LifecycleError> {
        for name in processors.names() {
            service.register_executor(name).await?;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut joins = Vec::with_capacity(processors.len() * pollers_per_executor);
        for (name, processor) in processors.iter() {
            for poller_id in 0..pollers_per_executor {
                let poller = Poller {
                    poller_id,
                    executor_name: name.to_string(),
                    processor: Arc::clone(processor),
                    service: service.clone(),
                };
                let mut rx = shutdown_rx.clone();
                joins.push(tokio::spawn(async move { poller.run(&mut rx).await }));
            }
        }
        info!(
            executors = processors.len(),
            pollers = joins.len(),
            "worker group started"
        );

        Ok(Self { shutdown_tx, joins })
    }

    /// Request shutdown for all pollers.
    /// In-flight processing is not cancelled; its outcome is still reported.
    pub fn request_shutdown(&self) {
        // ignore send error: receivers may already be dropped
        let _ = self.shutdown_tx.send(true);
    }

    /// Shutdown and wait for all pollers.
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            if let Err(err) = join.await {
                error!(error = %err, "poller task panicked");
            }
        }
        info!("worker group stopped");
    }
}

struct Poller {
    poller_id: usize,
    executor_name: String,
    processor: Arc<dyn TaskProcessor>,
    service: LifecycleService,
}

impl Poller {
    async fn run(self, shutdown_rx: &mut watch::Receiver<bool>) {
        let poll_interval = self.service.config().poll_interval;
        let error_backoff = self.service.config().error_backoff;

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            // not raced against shutdown: a claim the store applied must reach `handle`
            let wait = match self.service.claim_next(&self.executor_name).await {
                Ok(Some(task)) => {
                    if self.handle(task, shutdown_rx).await {
                        break;
                    }
                    continue;
                }
                Ok(None) => poll_interval,
                Err(err) => {
                    warn!(
                        executor = %self.executor_name,
                        poller = self.poller_id,
                        error = %err,
                        "claim failed, backing off"
                    );
                    error_backoff
                }
            };

            if idle(shutdown_rx, wait).await {
                break;
            }
        }
        debug!(executor = %self.executor_name, poller = self.poller_id, "poller exited");
    }

    /// Process one claimed task and report its outcome. Returns `true` if
    /// shutdown arrived while a report was waiting to be retried.
    async fn handle(&self, task: Task, shutdown_rx: &mut watch::Receiver<bool>) -> bool {
        let outcome = match self.processor.process_task(&task).await {
            Ok(()) => Outcome::completed(),
            Err(err) => {
                info!(
                    task_id = %task.id,
                    executor = %self.executor_name,
                    error = %err,
                    "processing failed"
                );
                Outcome::failed(err.message())
            }
        };

        let error_backoff = self.service.config().error_backoff;
        loop {
            let err = match self.service.report_outcome(task.id, outcome.clone()).await {
                Ok(_) => return false,
                Err(err) => err,
            };
            if !err.is_retryable() {
                error!(
                    task_id = %task.id,
                    executor = %self.executor_name,
                    error = %err,
                    "outcome report rejected"
                );
                return false;
            }

            warn!(
                task_id = %task.id,
                executor = %self.executor_name,
                error = %err,
                "outcome report failed, retrying"
            );
            if idle(shutdown_rx, error_backoff).await {
                error!(
                    task_id = %task.id,
                    executor = %self.executor_name,
                    "shutdown before outcome was recorded, task left in progress"
                );
                return true;
            }
        }
    }
}

/// Sleep for `wait` unless shutdown arrives first. Returns `true` on shutdown.
async fn idle(shutdown_rx: &mut watch::Receiver<bool>, wait: Duration) -> bool {
    let changed = tokio::select! {
        changed = shutdown_rx.changed() => changed,
        _ = tokio::time::sleep(wait) => return false,
    };
    changed.is_err() || *shutdown_rx.borrow()
}
