//! In-memory executor registry.
//!
//! Keyed by executor name; concurrent `get`s share the read lock.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::{ExecutorConfig, ExecutorSpec};
use crate::error::StoreError;
use crate::ports::{ExecutorRegistry, IdGenerator, SystemClock, UlidGenerator};

pub struct InMemoryExecutorRegistry {
    /// name -> config
    executors: RwLock<BTreeMap<String, ExecutorConfig>>,
    ids: Arc<dyn IdGenerator>,
}

impl InMemoryExecutorRegistry {
    pub fn new(ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            executors: RwLock::new(BTreeMap::new()),
            ids,
        }
    }
}

impl Default for InMemoryExecutorRegistry {
    fn default() -> Self {
        Self::new(Arc::new(UlidGenerator::new(SystemClock)))
    }
}

#[async_trait]
impl ExecutorRegistry for InMemoryExecutorRegistry {
    async fn create(
        &self,
        spec: ExecutorSpec,
        now: DateTime<Utc>,
    ) -> Result<ExecutorConfig, StoreError> {
        let mut executors = self.executors.write().await;
        if executors.contains_key(&spec.name) {
            return Err(StoreError::AlreadyExists {
                entity: "executor",
                key: spec.name,
            });
        }
        let config = ExecutorConfig::from_spec(self.ids.generate_executor_id(), spec, now);
        executors.insert(config.name.clone(), config.clone());
        Ok(config)
    }

    async fn update(
        &self,
        name: &str,
        spec: ExecutorSpec,
        now: DateTime<Utc>,
    ) -> Result<ExecutorConfig, StoreError> {
        let mut executors = self.executors.write().await;
        let config = executors
            .get_mut(name)
            .ok_or_else(|| StoreError::executor_not_found(name))?;
        config.apply(spec, now);
        Ok(config.clone())
    }

    async fn get(&self, name: &str) -> Result<Option<ExecutorConfig>, StoreError> {
        Ok(self.executors.read().await.get(name).cloned())
    }

    async fn list(&self) -> Result<Vec<ExecutorConfig>, StoreError> {
        Ok(self.executors.read().await.values().cloned().collect())
    }

    async fn delete(&self, name: &str) -> Result<ExecutorConfig, StoreError> {
        self.executors
            .write()
            .await
            .remove(name)
            .ok_or_else(|| StoreError::executor_not_found(name))
    }
}
