//! Built-in demo processors.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tasklane_core::domain::{
    DlqConfig, ExecutorSpec, RetryKind, RetryPolicy, Task, WriteConcern,
};
use tasklane_core::ports::TaskProcessor;
use tasklane_core::ProcessError;
use tracing::info;

pub const ORDER_PROCESSOR: &str = "order_processor";
pub const EXAMPLE_PROCESSOR: &str = "example_processor";

const ORDER_SCHEMA: &str = r#"{
  "type": "object",
  "properties": {
    "id": { "type": "string" },
    "user_id": { "type": "string" },
    "items": { "type": "array", "items": { "type": "string" } }
  },
  "required": ["id", "user_id"]
}"#;

const EXAMPLE_SCHEMA: &str = r#"{
  "type": "object",
  "properties": {
    "message": { "type": "string", "description": "Message to process" },
    "priority": { "type": "integer", "description": "Task priority", "minimum": 1, "maximum": 10 }
  },
  "required": ["message"]
}"#;

#[derive(Debug, Deserialize)]
struct Order {
    id: String,
    user_id: String,
    #[serde(default)]
    items: Vec<String>,
}

/// Processes orders. The first `remaining_failures` attempts fail on purpose
/// so the retry path can be watched.
pub struct OrderProcessor {
    remaining_failures: AtomicU32,
}

impl OrderProcessor {
    pub fn new(fail_first: u32) -> Self {
        Self {
            remaining_failures: AtomicU32::new(fail_first),
        }
    }

    /// Executor config this processor expects when none is seeded.
    pub fn executor_spec() -> ExecutorSpec {
        ExecutorSpec::new(ORDER_PROCESSOR)
            .with_write_concern(WriteConcern::Majority)
            .with_retry_policy(RetryPolicy::new(
                RetryKind::Exponential,
                5,
                Duration::from_secs(1),
            ))
            .with_dlq("order_processor_dlq")
    }
}

#[async_trait]
impl TaskProcessor for OrderProcessor {
    async fn process_task(&self, task: &Task) -> Result<(), ProcessError> {
        let order: Order = serde_json::from_slice(&task.payload)
            .map_err(|e| ProcessError::new(format!("failed to decode order: {e}")))?;

        let left = self
            .remaining_failures
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
        if let Ok(left) = left {
            return Err(ProcessError::new(format!(
                "payment gateway unavailable (intentional, left={left})"
            )));
        }

        info!(
            task_id = %task.id,
            order_id = %order.id,
            user_id = %order.user_id,
            items = order.items.len(),
            "order processed"
        );
        Ok(())
    }

    fn task_schema(&self) -> &str {
        ORDER_SCHEMA
    }
}

/// Accepts any JSON object with a string `message`.
pub struct ExampleProcessor {
    delay: Duration,
}

impl ExampleProcessor {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn executor_spec() -> ExecutorSpec {
        ExecutorSpec {
            dlq_config: DlqConfig {
                enabled: true,
                queue_name: String::new(),
            },
            ..ExecutorSpec::new(EXAMPLE_PROCESSOR)
        }
    }
}

#[async_trait]
impl TaskProcessor for ExampleProcessor {
    async fn process_task(&self, task: &Task) -> Result<(), ProcessError> {
        let data: HashMap<String, serde_json::Value> = serde_json::from_slice(&task.payload)
            .map_err(|e| ProcessError::new(format!("failed to decode task data: {e}")))?;
        let Some(message) = data.get("message").and_then(|m| m.as_str()) else {
            return Err(ProcessError::new("`message` is required"));
        };

        tokio::time::sleep(self.delay).await;
        info!(task_id = %task.id, message, "example task processed");
        Ok(())
    }

    fn task_schema(&self) -> &str {
        EXAMPLE_SCHEMA
    }
}
