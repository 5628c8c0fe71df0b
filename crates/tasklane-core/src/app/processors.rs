use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::LifecycleError;
use crate::ports::TaskProcessor;

/// Registry of processors (executor name -> processor).
///
/// Design:
/// - Built during initialization (mutable).
/// - Shared with the worker group afterwards (immutable), so no locks.
#[derive(Default)]
pub struct ProcessorRegistry {
    processors: BTreeMap<String, Arc<dyn TaskProcessor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the processor serving `executor_name`. One processor per name.
    pub fn register(
        &mut self,
        executor_name: impl Into<String>,
        processor: Arc<dyn TaskProcessor>,
    ) -> Result<(), LifecycleError> {
        let executor_name = executor_name.into();
        if executor_name.trim().is_empty() {
            return Err(LifecycleError::InvalidArgument(
                "executor_name must not be empty".into(),
            ));
        }
        if self.processors.contains_key(&executor_name) {
            return Err(LifecycleError::AlreadyExists {
                entity: "processor",
                key: executor_name,
            });
        }
        self.processors.insert(executor_name, processor);
        Ok(())
    }

    pub fn get(&self, executor_name: &str) -> Option<&Arc<dyn TaskProcessor>> {
        self.processors.get(executor_name)
    }

    /// Payload schema published by the processor of `executor_name`.
    pub fn schema(&self, executor_name: &str) -> Option<&str> {
        self.get(executor_name).map(|p| p.task_schema())
    }

    /// Registered executor names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.processors.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn TaskProcessor>)> {
        self.processors.iter().map(|(name, p)| (name.as_str(), p))
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}
