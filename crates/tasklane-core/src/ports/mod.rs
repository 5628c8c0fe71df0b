//! Ports - the seams between the lifecycle core and the outside world.
//!
//! The store and registry traits are what a persistent backend implements;
//! `impls` holds the in-memory adapters.

pub mod clock;
pub mod executor_registry;
pub mod id_generator;
pub mod processor;
pub mod task_store;

pub use self::clock::{Clock, ManualClock, SystemClock};
pub use self::executor_registry::ExecutorRegistry;
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::processor::TaskProcessor;
pub use self::task_store::{TaskStore, TaskUpdate};
