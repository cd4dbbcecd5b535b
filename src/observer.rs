//! Observability records emitted from inside the buffer's critical section.
//!
//! Because the record is produced while the exclusion lock is held, the
//! occupancy it reports is exact for that instant.

use crate::item::{Role, WorkerId};
use std::fmt;

/// One successful `put` or `get`.
#[derive(Debug, Clone, Copy)]
pub struct BufferEvent<'a, T> {
    pub role: Role,
    pub worker: WorkerId,
    pub item: &'a T,
    pub occupancy: usize,
    pub capacity: usize,
}

impl<T: fmt::Display> fmt::Display for BufferEvent<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} {}] {} {} (buffer size: {}/{})",
            self.role,
            self.worker,
            self.role.verb(),
            self.item,
            self.occupancy,
            self.capacity
        )
    }
}

/// Receives a record for every successful buffer operation.
///
/// Called with the buffer lock held: implementations must not call back into
/// the same buffer.
pub trait BufferObserver<T>: Send + Sync {
    fn on_event(&self, event: &BufferEvent<'_, T>);
}

/// Emits each record through `tracing` at INFO level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl<T: fmt::Display> BufferObserver<T> for TracingObserver {
    fn on_event(&self, event: &BufferEvent<'_, T>) {
        tracing::info!(
            role = %event.role,
            worker = event.worker.0,
            item = %event.item,
            occupancy = event.occupancy,
            capacity = event.capacity,
            "{event}"
        );
    }
}

/// Discards every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl<T> BufferObserver<T> for NullObserver {
    fn on_event(&self, _event: &BufferEvent<'_, T>) {}
}
