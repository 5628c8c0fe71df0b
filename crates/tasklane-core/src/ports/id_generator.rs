//! IdGenerator port - ID generation abstraction.
//!
//! # Implementations
//! - **UlidGenerator**: ULID from the clock's current millisecond plus 80 random bits

use ulid::Ulid;

use crate::domain::{ExecutorId, TaskId};
use crate::ports::Clock;

/// # Thread Safety
/// - `Send + Sync`: shared by every store call
pub trait IdGenerator: Send + Sync {
    fn generate_task_id(&self) -> TaskId;

    fn generate_executor_id(&self) -> ExecutorId;
}

/// ULID generator driven by a `Clock`, so a `ManualClock` yields IDs whose
/// timestamp part is deterministic.
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = u64::try_from(self.clock.now().timestamp_millis()).unwrap_or(0);
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_task_id(&self) -> TaskId {
        TaskId::from_ulid(self.next_ulid())
    }

    fn generate_executor_id(&self) -> ExecutorId {
        ExecutorId::from_ulid(self.next_ulid())
    }
}
