//! Discrete-time simulation of Suzuki-Kasami token-based mutual exclusion.
//!
//! A fixed set of processes contends for one critical section. The single
//! token carries the `LN` vector and the waiting queue; every process keeps an
//! `RN` vector of the highest request serial it has seen from each peer.
//! Requests travel over a broadcast bus with one tick of latency, and a
//! [`Simulation`] drives everything in lockstep.
//!
//! ```
//! use sksim::{Schedule, SimConfig, Simulation, StopReason};
//!
//! let mut sim = Simulation::new(SimConfig::default(), Schedule::default_scenario()).unwrap();
//! let report = sim.run().unwrap();
//! assert_eq!(report.reason, StopReason::Quiescent);
//! assert_eq!(report.final_holder, Some(4));
//! ```

pub mod config;
pub mod error;
pub mod protocol;
pub mod schedule;
pub mod simulator;
pub mod trace;

pub use config::{SimConfig, StopCondition, StopHandle};
pub use error::{ConfigError, InvariantViolation, SimError};
pub use schedule::{Schedule, ScheduledRequest};
pub use simulator::{ProcessSnapshot, RunReport, Simulation, StopReason, TokenSnapshot};
pub use trace::{Trace, TraceEntry, TraceEvent};
