//! Runs one producer/consumer simulation: spawns named worker threads around
//! a shared buffer, collects one outcome per worker and checks that every
//! produced item was consumed exactly once. The first worker panic ends the
//! run without waiting on the others.

use crossbeam::channel::{self, Receiver, Sender};
use serde::Serialize;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::buffer::{BoundedBuffer, BufferStats};
use crate::config::SimulationConfig;
use crate::error::{ConfigError, SimulationError};
use crate::item::{Item, Role, WorkerId};
use crate::observer::{BufferObserver, TracingObserver};
use crate::worker::{Consumer, Delay, Producer, ProductionPlan, WorkerSummary};

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub run_id: Uuid,
    pub produced: usize,
    pub consumed: usize,
    pub producers: Vec<WorkerCount>,
    pub consumers: Vec<WorkerCount>,
    pub buffer: BufferStats,
    #[serde(with = "millis")]
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkerCount {
    pub id: WorkerId,
    pub count: usize,
}

impl From<&WorkerSummary> for WorkerCount {
    fn from(summary: &WorkerSummary) -> Self {
        WorkerCount {
            id: summary.id,
            count: summary.count(),
        }
    }
}

mod millis {
    use serde::Serializer;
    use std::time::Duration;

    /// Whole milliseconds, saturating at `u64::MAX`.
    pub fn as_u64(elapsed: Duration) -> u64 {
        u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
    }

    pub fn serialize<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(as_u64(*elapsed))
    }
}

/// What a worker thread reports when it stops: its summary, or `None` if it
/// panicked.
struct WorkerOutcome {
    name: String,
    summary: Option<WorkerSummary>,
}

pub struct Simulation {
    config: SimulationConfig,
    buffer: Arc<BoundedBuffer<Item>>,
}

impl Simulation {
    /// Validates `config` and builds a buffer that traces through `tracing`.
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        Self::with_observer(config, TracingObserver)
    }

    pub fn with_observer(
        config: SimulationConfig,
        observer: impl BufferObserver<Item> + 'static,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let buffer = BoundedBuffer::with_observer(config.capacity, observer)?;
        Ok(Simulation {
            config,
            buffer: Arc::new(buffer),
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn buffer(&self) -> &Arc<BoundedBuffer<Item>> {
        &self.buffer
    }

    pub fn run(&self) -> Result<SimulationReport, SimulationError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("simulation", %run_id);
        let _entered = span.enter();

        tracing::info!(
            capacity = self.config.capacity,
            producers = self.config.producers,
            consumers = self.config.consumers,
            items_per_producer = self.config.items_per_producer,
            "starting simulation"
        );

        let started = Instant::now();
        let delay = Delay::from(self.config.delay);

        let quotas = self.config.consumer_quotas()?;
        let (outcomes, results) = channel::unbounded();
        let mut workers = Vec::new();

        for id in 0..self.config.producers {
            let plan = ProductionPlan::new(WorkerId(id), self.config.items_per_producer);
            let worker = Producer::new(plan, Arc::clone(&self.buffer), delay);
            match spawn_worker(format!("Producer-{id}"), outcomes.clone(), move || worker.run()) {
                Ok(spawned) => workers.push(spawned),
                Err(err) => {
                    warn_detached(&workers);
                    return Err(err);
                }
            }
        }

        for (id, quota) in quotas.into_iter().enumerate() {
            let worker = Consumer::new(WorkerId(id), quota, Arc::clone(&self.buffer), delay);
            match spawn_worker(format!("Consumer-{id}"), outcomes.clone(), move || worker.run()) {
                Ok(spawned) => workers.push(spawned),
                Err(err) => {
                    warn_detached(&workers);
                    return Err(err);
                }
            }
        }
        drop(outcomes);

        let (produced, consumed) = collect_outcomes(&results, &workers)?;
        join_all(workers)?;

        let report = SimulationReport {
            run_id,
            produced: produced.iter().map(WorkerSummary::count).sum(),
            consumed: consumed.iter().map(WorkerSummary::count).sum(),
            producers: produced.iter().map(WorkerCount::from).collect(),
            consumers: consumed.iter().map(WorkerCount::from).collect(),
            buffer: self.buffer.stats(),
            elapsed: started.elapsed(),
        };

        verify(&report, &consumed)?;
        tracing::info!(
            produced = report.produced,
            consumed = report.consumed,
            elapsed_ms = millis::as_u64(report.elapsed),
            "simulation finished"
        );
        Ok(report)
    }
}

// =============================================================================
// Worker threads
// =============================================================================

type Worker = (String, JoinHandle<()>);

/// Spawns a named thread that runs `work` and always sends exactly one
/// outcome, even when `work` panics.
fn spawn_worker<F>(name: String, outcomes: Sender<WorkerOutcome>, work: F) -> Result<Worker, SimulationError>
where
    F: FnOnce() -> WorkerSummary + Send + 'static,
{
    let thread_name = name.clone();
    let spawned = thread::Builder::new().name(name.clone()).spawn(move || {
        let summary = panic::catch_unwind(AssertUnwindSafe(work)).ok();
        // The run may already have returned and dropped the receiver.
        let _ = outcomes.send(WorkerOutcome {
            name: thread_name,
            summary,
        });
    });

    match spawned {
        Ok(handle) => Ok((name, handle)),
        Err(err) => Err(SimulationError::spawn(name, err)),
    }
}

/// Waits for one outcome per worker and splits the summaries by role, sorted
/// by worker id. Returns on the first panic without waiting for the rest:
/// a dead producer leaves consumers blocked in `get` for good.
fn collect_outcomes(
    results: &Receiver<WorkerOutcome>,
    workers: &[Worker],
) -> Result<(Vec<WorkerSummary>, Vec<WorkerSummary>), SimulationError> {
    let mut produced = Vec::new();
    let mut consumed = Vec::new();

    for outcome in results.iter().take(workers.len()) {
        match outcome.summary {
            Some(summary) if summary.role == Role::Producer => produced.push(summary),
            Some(summary) => consumed.push(summary),
            None => {
                tracing::error!(worker = %outcome.name, "worker panicked");
                warn_detached(workers);
                return Err(SimulationError::worker_panicked(outcome.name));
            }
        }
    }

    produced.sort_by_key(|summary| summary.id);
    consumed.sort_by_key(|summary| summary.id);
    Ok((produced, consumed))
}

/// Logs the workers a failed run leaves behind. They hold their own handle
/// on the buffer and are never joined.
fn warn_detached(workers: &[Worker]) {
    let detached = still_running(workers);
    if !detached.is_empty() {
        tracing::warn!(workers = ?detached, "detaching workers that are still running");
    }
}

fn still_running(workers: &[Worker]) -> Vec<&str> {
    workers
        .iter()
        .filter(|(_, handle)| !handle.is_finished())
        .map(|(name, _)| name.as_str())
        .collect()
}

/// Joins workers that have all reported; none of them can block here.
fn join_all(workers: Vec<Worker>) -> Result<(), SimulationError> {
    for (name, handle) in workers {
        if handle.join().is_err() {
            return Err(SimulationError::worker_panicked(name));
        }
    }
    Ok(())
}

fn verify(report: &SimulationReport, consumed: &[WorkerSummary]) -> Result<(), SimulationError> {
    if report.produced != report.consumed || report.buffer.occupancy != 0 {
        tracing::error!(
            produced = report.produced,
            consumed = report.consumed,
            occupancy = report.buffer.occupancy,
            "conservation violated"
        );
        return Err(SimulationError::Conservation {
            produced: report.produced,
            consumed: report.consumed,
        });
    }

    let mut seen = HashSet::new();
    for item in consumed.iter().flat_map(|summary| &summary.items) {
        if !seen.insert(*item) {
            tracing::error!(%item, "item consumed twice");
            return Err(SimulationError::Duplicate { item: *item });
        }
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
