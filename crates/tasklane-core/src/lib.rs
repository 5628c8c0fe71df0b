//! tasklane-core
//!
//! Task lifecycle core: submission, atomic claiming, retry with backoff,
//! and dead-lettering of exhausted tasks.
//!
//! # Modules
//! - **domain**: domain model (ids, state, task, executor, retry, outcome, decision)
//! - **ports**: seams (TaskStore, ExecutorRegistry, Clock, IdGenerator, TaskProcessor)
//! - **impls**: in-memory adapters
//! - **app**: LifecycleService, ProcessorRegistry, WorkerGroup
//! - **config**: LifecycleConfig
//! - **error**: StoreError / LifecycleError / ProcessError
//! - **observability**: StatusCounts

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod observability;
pub mod ports;

pub use app::{LifecycleService, ProcessorRegistry, TaskStatusView, WorkerGroup};
pub use config::LifecycleConfig;
pub use error::{ErrorCode, LifecycleError, ProcessError, StoreError};
