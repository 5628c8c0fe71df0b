//! tasklane - demo driver for the task lifecycle core.
//!
//! Usage:
//!   tasklane run --executors demos/executors.json --orders 3 --fail-first 2
//!   tasklane schema order_processor
//!   tasklane executors --executors demos/executors.json

mod processors;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::json;
use tasklane_core::domain::{ExecutorSpec, NewTask};
use tasklane_core::ports::SystemClock;
use tasklane_core::{
    LifecycleConfig, LifecycleError, LifecycleService, ProcessorRegistry, WorkerGroup,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::processors::{EXAMPLE_PROCESSOR, ExampleProcessor, ORDER_PROCESSOR, OrderProcessor};

#[derive(Parser, Debug)]
#[command(name = "tasklane", about = "Task lifecycle demo: claim, retry, dead-letter")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Seed executors, submit demo tasks and process them until drained
    Run {
        /// Lifecycle config (JSON); defaults apply when omitted
        #[arg(long)]
        config: Option<PathBuf>,

        /// Executor seed file (JSON array of executor specs)
        #[arg(long)]
        executors: Option<PathBuf>,

        /// Number of order_processor tasks
        #[arg(long, default_value = "3")]
        orders: u32,

        /// Number of example_processor tasks
        #[arg(long, default_value = "2")]
        examples: u32,

        /// Attempts the order processor fails on purpose before succeeding
        #[arg(long, default_value = "2")]
        fail_first: u32,

        /// Pollers per executor
        #[arg(long, default_value = "2")]
        pollers: usize,

        /// Give up waiting after this many seconds
        #[arg(long, default_value = "60")]
        timeout_secs: u64,
    },

    /// Print the payload schema of a built-in processor
    Schema { processor: String },

    /// Show the executor configs a seed file resolves to
    Executors {
        #[arg(long)]
        executors: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    match Cli::parse().command {
        Command::Run {
            config,
            executors,
            orders,
            examples,
            fail_first,
            pollers,
            timeout_secs,
        } => {
            let config = load_config(config.as_deref())?;
            let specs = load_executor_specs(executors.as_deref())?;
            run(
                config,
                specs,
                DemoLoad {
                    orders,
                    examples,
                    fail_first,
                    pollers,
                    timeout: Duration::from_secs(timeout_secs),
                },
            )
            .await
        }
        Command::Schema { processor } => {
            let registry = processors(0)?;
            let Some(schema) = registry.schema(&processor) else {
                bail!(
                    "unknown processor `{processor}` (known: {})",
                    registry.names().collect::<Vec<_>>().join(", ")
                );
            };
            println!("{schema}");
            Ok(())
        }
        Command::Executors { executors } => {
            let service = LifecycleService::in_memory(Arc::new(SystemClock));
            seed_executors(&service, load_executor_specs(executors.as_deref())?).await?;
            let configs = service.list_executors().await?;
            println!("{}", serde_json::to_string_pretty(&configs)?);
            Ok(())
        }
    }
}

struct DemoLoad {
    orders: u32,
    examples: u32,
    fail_first: u32,
    pollers: usize,
    timeout: Duration,
}

async fn run(config: LifecycleConfig, specs: Vec<ExecutorSpec>, load: DemoLoad) -> Result<()> {
    let service = LifecycleService::in_memory(Arc::new(SystemClock)).with_config(config);
    seed_executors(&service, specs).await?;

    for i in 0..load.orders {
        let payload = json!({ "id": format!("order-{i}"), "user_id": format!("user-{}", i % 2), "items": ["sku-1"] });
        let task = service
            .submit_task(
                NewTask::new(ORDER_PROCESSOR, serde_json::to_vec(&payload)?)
                    .with_metadata("source", "tasklane-cli"),
            )
            .await?;
        info!(task_id = %task.id, "order submitted");
    }
    for i in 0..load.examples {
        let payload = json!({ "message": format!("hello #{i}"), "priority": 5 });
        service
            .submit_task(NewTask::new(EXAMPLE_PROCESSOR, serde_json::to_vec(&payload)?))
            .await?;
    }

    let registry = Arc::new(processors(load.fail_first)?);
    let group = WorkerGroup::spawn(service.clone(), Arc::clone(&registry), load.pollers).await?;

    let started = Instant::now();
    let drained = loop {
        let counts = service.status_counts(None).await?;
        if counts.is_drained() {
            break true;
        }
        if started.elapsed() >= load.timeout {
            break false;
        }
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                warn!("interrupted");
                break false;
            }
            _ = tokio::time::sleep(Duration::from_millis(100)) => {}
        }
    };
    group.shutdown_and_join().await;
    if !drained {
        warn!("stopped before every task reached a terminal state");
    }

    let mut summary = serde_json::Map::new();
    for name in registry.names() {
        let counts = service.status_counts(Some(name)).await?;
        let dead_letters = service.list_dead_letters(name).await?;
        summary.insert(
            name.to_string(),
            json!({ "counts": counts, "dead_letters": dead_letters.len() }),
        );
    }
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn processors(fail_first: u32) -> Result<ProcessorRegistry> {
    let mut registry = ProcessorRegistry::new();
    registry.register(ORDER_PROCESSOR, Arc::new(OrderProcessor::new(fail_first)))?;
    registry.register(
        EXAMPLE_PROCESSOR,
        Arc::new(ExampleProcessor::new(Duration::from_millis(100))),
    )?;
    Ok(registry)
}

/// Create each executor; an existing one is updated in place.
async fn seed_executors(service: &LifecycleService, specs: Vec<ExecutorSpec>) -> Result<()> {
    for spec in specs {
        let name = spec.name.clone();
        match service.create_executor(spec.clone()).await {
            Ok(_) => {}
            Err(LifecycleError::AlreadyExists { .. }) => {
                service.update_executor(&name, spec).await?;
            }
            Err(err) => return Err(err).with_context(|| format!("seeding executor `{name}`")),
        }
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<LifecycleConfig> {
    let Some(path) = path else {
        return Ok(LifecycleConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    LifecycleConfig::from_json(&raw).with_context(|| format!("parsing config {}", path.display()))
}

fn load_executor_specs(path: Option<&Path>) -> Result<Vec<ExecutorSpec>> {
    let Some(path) = path else {
        return Ok(vec![
            OrderProcessor::executor_spec(),
            ExampleProcessor::executor_spec(),
        ]);
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading executors {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing executors {}", path.display()))
}
