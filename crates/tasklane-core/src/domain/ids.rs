//! Domain identifiers (strongly-typed IDs).
//!
//! IDs are ULIDs wrapped in a phantom-typed `Id<T>`:
//! - sortable by creation time (the timestamp is the high 48 bits)
//! - generated without coordination
//! - `TaskId` and `ExecutorId` cannot be mixed up at compile time
//!
//! The display form carries a prefix (`task-01H...`) and `FromStr` accepts
//! both the prefixed and the bare ULID form.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use ulid::Ulid;

/// Marker trait providing the display prefix of an ID type.
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed id `{0}`")]
pub struct ParseIdError(String);

impl<T: IdMarker> FromStr for Id<T> {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix(T::prefix()).unwrap_or(s);
        Ulid::from_string(raw)
            .map(Self::from_ulid)
            .map_err(|_| ParseIdError(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskMarker {}

impl IdMarker for TaskMarker {
    fn prefix() -> &'static str {
        "task-"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExecutorMarker {}

impl IdMarker for ExecutorMarker {
    fn prefix() -> &'static str {
        "executor-"
    }
}

/// Identifier of a Task, assigned by the task store.
pub type TaskId = Id<TaskMarker>;

/// Identifier of an ExecutorConfig, assigned by the registry.
pub type ExecutorId = Id<ExecutorMarker>;
