//! Error taxonomy.
//!
//! - `StoreError`: what a storage adapter reports.
//! - `LifecycleError`: what the lifecycle boundary reports to callers.
//! - `ProcessError`: a business failure raised by a processor. It never becomes a
//!   `LifecycleError`; it is reported back through `report_outcome`.

use std::time::Duration;

use thiserror::Error;

use crate::domain::Task;

/// Errors raised by `TaskStore` / `ExecutorRegistry` adapters.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("{entity} already exists: {key}")]
    AlreadyExists { entity: &'static str, key: String },

    /// A conditional update did not match the stored state.
    /// Carries the record as it is now, so the caller can decide what to do.
    #[error("conditional update rejected for task {}: status is {}", .current.id, .current.status)]
    Conflict { current: Box<Task> },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn task_not_found(key: impl ToString) -> Self {
        Self::NotFound {
            entity: "task",
            key: key.to_string(),
        }
    }

    pub fn executor_not_found(key: impl ToString) -> Self {
        Self::NotFound {
            entity: "executor",
            key: key.to_string(),
        }
    }
}

/// Status code exposed at the request/response boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidArgument,
    NotFound,
    AlreadyExists,
    FailedPrecondition,
    Internal,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::AlreadyExists => "ALREADY_EXISTS",
            ErrorCode::FailedPrecondition => "FAILED_PRECONDITION",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("{entity} already exists: {key}")]
    AlreadyExists { entity: &'static str, key: String },

    #[error("executor is disabled: {0}")]
    ExecutorDisabled(String),

    #[error("store call `{op}` timed out after {timeout:?}")]
    Timeout { op: &'static str, timeout: Duration },

    #[error("internal error: {0}")]
    Internal(String),
}

impl LifecycleError {
    pub fn code(&self) -> ErrorCode {
        match self {
            LifecycleError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            LifecycleError::NotFound { .. } => ErrorCode::NotFound,
            LifecycleError::AlreadyExists { .. } => ErrorCode::AlreadyExists,
            LifecycleError::ExecutorDisabled(_) => ErrorCode::FailedPrecondition,
            LifecycleError::Timeout { .. } | LifecycleError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Infrastructure failures: the caller should back off and retry the whole call.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LifecycleError::Timeout { .. } | LifecycleError::Internal(_)
        )
    }
}

impl From<StoreError> for LifecycleError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, key } => LifecycleError::NotFound { entity, key },
            StoreError::AlreadyExists { entity, key } => {
                LifecycleError::AlreadyExists { entity, key }
            }
            other @ (StoreError::Conflict { .. } | StoreError::Unavailable(_)) => {
                LifecycleError::Internal(other.to_string())
            }
        }
    }
}

/// A business-logic failure reported by a processor.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ProcessError(String);

impl ProcessError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}
