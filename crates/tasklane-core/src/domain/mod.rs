//! Domain model: identifiers, task and executor records, retry policy,
//! outcomes and the retry/dead-letter decision.

pub mod decision;
pub mod executor;
pub mod ids;
pub mod outcome;
pub mod retry;
pub mod state;
pub mod task;

pub use decision::{Decider, Decision, DefaultDecider};
pub use executor::{DlqConfig, ExecutorConfig, ExecutorSpec, WriteConcern};
pub use ids::{ExecutorId, Id, IdMarker, ParseIdError, TaskId};
pub use outcome::{Outcome, ReportedStatus};
pub use retry::{RetryKind, RetryPolicy};
pub use state::{ParseStatusError, TaskStatus};
pub use task::{NewTask, Task};
