//! App - application layer
//!
//! Composes the ports into the task lifecycle.
//!
//! # Components
//! - **LifecycleService**: submit / claim / report, executor management, DLQ operations
//! - **ProcessorRegistry**: executor name -> TaskProcessor
//! - **WorkerGroup**: polling loop (register -> claim -> process -> report)
//! - **TaskStatusView**: read-side view

pub mod processors;
pub mod service;
pub mod status;
pub mod worker_loop;

pub use self::processors::ProcessorRegistry;
pub use self::service::LifecycleService;
pub use self::status::TaskStatusView;
pub use self::worker_loop::WorkerGroup;
