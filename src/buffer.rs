//! Fixed-capacity FIFO buffer shared between producer and consumer threads.
//!
//! Three signals coordinate access:
//!
//! - `empty_slots`: counting semaphore, starts at `capacity`, taken by `put`
//! - `filled_slots`: counting semaphore, starts at `0`, taken by `get`
//! - `slots`: mutex over the sequence itself
//!
//! Every operation follows the same order: take a permit from its counting
//! semaphore, lock, mutate, unlock, then release the permit into the
//! opposite semaphore. Nobody ever waits for capacity while holding the lock.
//!
//! ```
//! use bounded_buffer::{BoundedBuffer, WorkerId};
//!
//! let buffer = BoundedBuffer::silent(2).unwrap();
//! buffer.put("A", WorkerId(0));
//! buffer.put("B", WorkerId(0));
//! assert!(buffer.is_full());
//! assert_eq!(buffer.get(WorkerId(1)), "A");
//! assert_eq!(buffer.get(WorkerId(1)), "B");
//! ```

use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::ConfigError;
use crate::item::{Role, WorkerId};
use crate::observer::{BufferEvent, BufferObserver, NullObserver, TracingObserver};
use crate::semaphore::{Permit, Semaphore};

// =============================================================================
// Capacity
// =============================================================================

/// Validated buffer capacity, guaranteed non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacity(NonZeroUsize);

impl Capacity {
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        NonZeroUsize::new(capacity)
            .map(Capacity)
            .ok_or(ConfigError::ZeroCapacity)
    }

    pub fn get(self) -> usize {
        self.0.get()
    }
}

// =============================================================================
// Stats
// =============================================================================

/// Snapshot of the buffer taken under the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BufferStats {
    pub capacity: usize,
    pub occupancy: usize,
    pub total_put: u64,
    pub total_get: u64,
    pub high_water: usize,
    pub overlaps: usize,
}

// =============================================================================
// Exclusion monitor
// =============================================================================

/// Detects two threads inside the critical section at once. The mutex makes
/// that impossible, so `overlaps` staying at zero is the check.
#[derive(Debug, Default)]
struct ExclusionMonitor {
    inside: AtomicBool,
    overlaps: AtomicUsize,
}

impl ExclusionMonitor {
    fn enter(&self) -> Section<'_> {
        let was_inside = self.inside.swap(true, Ordering::AcqRel);
        if was_inside {
            self.overlaps.fetch_add(1, Ordering::Relaxed);
        }
        debug_assert!(!was_inside, "overlapping critical sections");
        Section(self)
    }

    fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::Relaxed)
    }
}

struct Section<'a>(&'a ExclusionMonitor);

impl Drop for Section<'_> {
    fn drop(&mut self) {
        self.0.inside.store(false, Ordering::Release);
    }
}

// =============================================================================
// BoundedBuffer
// =============================================================================

struct Slots<T> {
    items: VecDeque<T>,
    total_put: u64,
    total_get: u64,
    high_water: usize,
}

pub struct BoundedBuffer<T> {
    slots: Mutex<Slots<T>>,
    capacity: Capacity,
    empty_slots: Semaphore,
    filled_slots: Semaphore,
    exclusion: ExclusionMonitor,
    observer: Box<dyn BufferObserver<T>>,
}

impl<T: fmt::Display> BoundedBuffer<T> {
    /// Buffer that reports every operation through `tracing`.
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        Self::with_observer(capacity, TracingObserver)
    }
}

impl<T> BoundedBuffer<T> {
    pub fn with_observer(
        capacity: usize,
        observer: impl BufferObserver<T> + 'static,
    ) -> Result<Self, ConfigError> {
        let capacity = Capacity::new(capacity)?;
        Ok(BoundedBuffer {
            slots: Mutex::new(Slots {
                items: VecDeque::new(),
                total_put: 0,
                total_get: 0,
                high_water: 0,
            }),
            capacity,
            empty_slots: Semaphore::new(capacity.get()),
            filled_slots: Semaphore::new(0),
            exclusion: ExclusionMonitor::default(),
            observer: Box::new(observer),
        })
    }

    /// Buffer without observability records.
    pub fn silent(capacity: usize) -> Result<Self, ConfigError> {
        Self::with_observer(capacity, NullObserver)
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    pub fn len(&self) -> usize {
        self.lock_slots().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    pub fn stats(&self) -> BufferStats {
        let slots = self.lock_slots();
        BufferStats {
            capacity: self.capacity(),
            occupancy: slots.items.len(),
            total_put: slots.total_put,
            total_get: slots.total_get,
            high_water: slots.high_water,
            overlaps: self.exclusion.overlaps(),
        }
    }

    /// Appends `item`, blocking while the buffer is full.
    pub fn put(&self, item: T, producer: WorkerId) {
        let permit = self.empty_slots.acquire();
        self.insert(permit, item, producer);
    }

    /// Removes the oldest item, blocking while the buffer is empty.
    pub fn get(&self, consumer: WorkerId) -> T {
        let permit = self.filled_slots.acquire();
        self.remove(permit, consumer)
    }

    /// Appends `item` only if a slot is free right now; hands it back otherwise.
    pub fn try_put(&self, item: T, producer: WorkerId) -> Result<(), T> {
        match self.empty_slots.try_acquire() {
            Some(permit) => {
                self.insert(permit, item, producer);
                Ok(())
            }
            None => Err(item),
        }
    }

    pub fn try_get(&self, consumer: WorkerId) -> Option<T> {
        self.filled_slots
            .try_acquire()
            .map(|permit| self.remove(permit, consumer))
    }

    /// Like `put`, but gives up and returns the item after `timeout`.
    pub fn put_timeout(&self, item: T, producer: WorkerId, timeout: Duration) -> Result<(), T> {
        match self.empty_slots.acquire_timeout(timeout) {
            Some(permit) => {
                self.insert(permit, item, producer);
                Ok(())
            }
            None => Err(item),
        }
    }

    pub fn get_timeout(&self, consumer: WorkerId, timeout: Duration) -> Option<T> {
        self.filled_slots
            .acquire_timeout(timeout)
            .map(|permit| self.remove(permit, consumer))
    }

    // The permit protocol keeps the sequence and the semaphores in agreement
    // even when a critical section unwinds, so a poisoned lock is still usable.
    fn lock_slots(&self) -> MutexGuard<'_, Slots<T>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // `permit` is an empty-slot permit. It goes back to `empty_slots` if we
    // unwind before the push, and to `filled_slots` after it. Either way it is
    // released only once the lock guard is gone.
    fn insert<'a>(&'a self, mut permit: Permit<'a>, item: T, producer: WorkerId) {
        {
            let mut slots = self.lock_slots();
            let _section = self.exclusion.enter();

            slots.items.push_back(item);
            slots.total_put += 1;
            let occupancy = slots.items.len();
            slots.high_water = slots.high_water.max(occupancy);
            permit.redirect(&self.filled_slots);

            if let Some(item) = slots.items.back() {
                self.observer.on_event(&BufferEvent {
                    role: Role::Producer,
                    worker: producer,
                    item,
                    occupancy,
                    capacity: self.capacity(),
                });
            }
        }
        drop(permit);
    }

    fn remove<'a>(&'a self, mut permit: Permit<'a>, consumer: WorkerId) -> T {
        let item = {
            let mut slots = self.lock_slots();
            let _section = self.exclusion.enter();

            let item = slots
                .items
                .pop_front()
                .expect("filled-slot permit held while the buffer is empty");
            slots.total_get += 1;
            permit.redirect(&self.empty_slots);

            self.observer.on_event(&BufferEvent {
                role: Role::Consumer,
                worker: consumer,
                item: &item,
                occupancy: slots.items.len(),
                capacity: self.capacity(),
            });
            item
        };
        drop(permit);
        item
    }
}

impl<T> fmt::Debug for BoundedBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedBuffer")
            .field("capacity", &self.capacity())
            .field("empty_slots", &self.empty_slots.available())
            .field("filled_slots", &self.filled_slots.available())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
