//! Impls - in-memory adapters for the store ports.
//!
//! Suitable for tests, demos and single-process deployments. A persistent
//! backend implements the same `TaskStore` / `ExecutorRegistry` traits.

pub mod memory_registry;
pub mod memory_store;

pub use self::memory_registry::InMemoryExecutorRegistry;
pub use self::memory_store::InMemoryTaskStore;
