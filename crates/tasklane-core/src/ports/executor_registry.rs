//! ExecutorRegistry port - executor configs by unique name.
//!
//! Read on every poll, written rarely: adapters should make `get` a cheap
//! point lookup.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{ExecutorConfig, ExecutorSpec};
use crate::error::StoreError;

#[async_trait]
pub trait ExecutorRegistry: Send + Sync {
    /// `AlreadyExists` if the name is taken.
    async fn create(&self, spec: ExecutorSpec, now: DateTime<Utc>)
    -> Result<ExecutorConfig, StoreError>;

    /// `NotFound` if absent. Keeps id, name and created_at.
    async fn update(
        &self,
        name: &str,
        spec: ExecutorSpec,
        now: DateTime<Utc>,
    ) -> Result<ExecutorConfig, StoreError>;

    /// `Ok(None)` if absent.
    async fn get(&self, name: &str) -> Result<Option<ExecutorConfig>, StoreError>;

    /// Ordered by name.
    async fn list(&self) -> Result<Vec<ExecutorConfig>, StoreError>;

    /// `NotFound` if absent.
    async fn delete(&self, name: &str) -> Result<ExecutorConfig, StoreError>;
}
