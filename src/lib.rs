//! # bounded-buffer
//!
//! A fixed-capacity FIFO buffer shared by several producer and consumer
//! threads, coordinated with the classic three-signal scheme: a counting
//! semaphore of empty slots, a counting semaphore of filled slots, and a
//! mutex around the sequence itself.
//!
//! Around the buffer sit the pieces needed to run a simulation: validated
//! configuration, producer/consumer driver loops and an orchestrator that
//! joins every worker and checks that nothing was lost or duplicated.
//!
//! ```
//! use bounded_buffer::{NullObserver, Simulation, SimulationConfig};
//!
//! let config = SimulationConfig::builder()
//!     .capacity(1)
//!     .producers(1)
//!     .consumers(1)
//!     .items_per_producer(2)
//!     .no_delay()
//!     .build()
//!     .unwrap();
//!
//! let report = Simulation::with_observer(config, NullObserver)
//!     .unwrap()
//!     .run()
//!     .unwrap();
//! assert_eq!(report.consumed, 2);
//! ```

pub mod buffer;
pub mod config;
pub mod error;
pub mod item;
pub mod observer;
pub mod semaphore;
pub mod simulation;
pub mod telemetry;
pub mod worker;

pub use buffer::{BoundedBuffer, BufferStats, Capacity};
pub use config::{split_quota, DelayConfig, SimulationConfig, SimulationConfigBuilder};
pub use error::{ConfigError, SimulationError};
pub use item::{Item, Role, WorkerId};
pub use observer::{BufferEvent, BufferObserver, NullObserver, TracingObserver};
pub use semaphore::{Permit, Semaphore};
pub use simulation::{Simulation, SimulationReport, WorkerCount};
pub use worker::{Consumer, Delay, Producer, ProductionPlan, WorkerSummary};
