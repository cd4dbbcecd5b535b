//! Producer and consumer driver loops.
//!
//! A worker only ever calls `put` or `get`, one at a time, a fixed number of
//! times. What to produce is described by a `ProductionPlan`, a lazy and
//! restartable sequence of items.

use rand::Rng;
use serde::Serialize;
use std::ops::Range;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::buffer::BoundedBuffer;
use crate::config::DelayConfig;
use crate::item::{Item, Role, WorkerId};

// =============================================================================
// Production plan
// =============================================================================

/// The items one producer will emit, generated on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductionPlan {
    pub producer: WorkerId,
    pub count: usize,
}

impl ProductionPlan {
    pub fn new(producer: WorkerId, count: usize) -> Self {
        ProductionPlan { producer, count }
    }

    pub fn iter(&self) -> PlanIter {
        PlanIter {
            producer: self.producer,
            seqs: 0..self.count,
        }
    }
}

impl IntoIterator for ProductionPlan {
    type Item = Item;
    type IntoIter = PlanIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl IntoIterator for &ProductionPlan {
    type Item = Item;
    type IntoIter = PlanIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Debug, Clone)]
pub struct PlanIter {
    producer: WorkerId,
    seqs: Range<usize>,
}

impl Iterator for PlanIter {
    type Item = Item;

    fn next(&mut self) -> Option<Item> {
        self.seqs.next().map(|seq| Item::new(self.producer, seq))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.seqs.size_hint()
    }
}

impl ExactSizeIterator for PlanIter {}

// =============================================================================
// Delay
// =============================================================================

/// Uniformly random pause simulating the time to make or use an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delay {
    min: Duration,
    max: Duration,
}

impl Delay {
    /// `min` greater than `max` is clamped to a fixed `min` pause.
    pub fn new(min: Duration, max: Duration) -> Self {
        Delay {
            min,
            max: max.max(min),
        }
    }

    pub fn none() -> Self {
        Delay::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn sample(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        rand::thread_rng().gen_range(self.min..=self.max)
    }

    pub fn pause(&self) {
        let pause = self.sample();
        if !pause.is_zero() {
            thread::sleep(pause);
        }
    }
}

impl From<DelayConfig> for Delay {
    fn from(config: DelayConfig) -> Self {
        Delay::new(config.min(), config.max())
    }
}

// =============================================================================
// Workers
// =============================================================================

/// What a worker did, in the order it did it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerSummary {
    pub role: Role,
    pub id: WorkerId,
    pub items: Vec<Item>,
}

impl WorkerSummary {
    pub fn count(&self) -> usize {
        self.items.len()
    }
}

pub struct Producer {
    plan: ProductionPlan,
    buffer: Arc<BoundedBuffer<Item>>,
    delay: Delay,
}

impl Producer {
    pub fn new(plan: ProductionPlan, buffer: Arc<BoundedBuffer<Item>>, delay: Delay) -> Self {
        Producer {
            plan,
            buffer,
            delay,
        }
    }

    pub fn id(&self) -> WorkerId {
        self.plan.producer
    }

    pub fn run(self) -> WorkerSummary {
        tracing::debug!(producer = self.plan.producer.0, quota = self.plan.count, "producer started");

        let mut items = Vec::new();
        for item in &self.plan {
            self.delay.pause();
            self.buffer.put(item, self.plan.producer);
            items.push(item);
        }

        tracing::debug!(producer = self.plan.producer.0, produced = items.len(), "producer finished");
        WorkerSummary {
            role: Role::Producer,
            id: self.plan.producer,
            items,
        }
    }
}

pub struct Consumer {
    id: WorkerId,
    quota: usize,
    buffer: Arc<BoundedBuffer<Item>>,
    delay: Delay,
}

impl Consumer {
    pub fn new(id: WorkerId, quota: usize, buffer: Arc<BoundedBuffer<Item>>, delay: Delay) -> Self {
        Consumer {
            id,
            quota,
            buffer,
            delay,
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn run(self) -> WorkerSummary {
        tracing::debug!(consumer = self.id.0, quota = self.quota, "consumer started");

        let items: Vec<Item> = (0..self.quota)
            .map(|_| {
                self.delay.pause();
                self.buffer.get(self.id)
            })
            .collect();

        tracing::debug!(consumer = self.id.0, consumed = items.len(), "consumer finished");
        WorkerSummary {
            role: Role::Consumer,
            id: self.id,
            items,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
