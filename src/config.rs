use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::ConfigError;
use crate::protocol::{Tick, DEFAULT_CS_DURATION};

pub const DEFAULT_NUM_PROCESSES: usize = 5;
pub const DEFAULT_MAX_TICKS: Tick = 10_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopCondition {
    /// run exactly this many ticks
    Ticks(Tick),
    /// stop once nothing is left to do, or after `max_ticks`
    Quiescence { max_ticks: Tick },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimConfig {              // unit         default
    pub num_processes: usize,      //              5
    pub cs_duration: u32,          // ticks        3
    pub tick_delay: Duration,      // wall clock   0 (no pacing)
    pub stop: StopCondition,       //              quiescence, 10000 ticks
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            num_processes: DEFAULT_NUM_PROCESSES,
            cs_duration: DEFAULT_CS_DURATION,
            tick_delay: Duration::ZERO,
            stop: StopCondition::Quiescence {
                max_ticks: DEFAULT_MAX_TICKS,
            },
        }
    }
}

impl SimConfig {
    pub fn new(num_processes: usize) -> Self {
        SimConfig {
            num_processes,
            ..Default::default()
        }
    }

    pub fn with_cs_duration(mut self, cs_duration: u32) -> Self {
        self.cs_duration = cs_duration;
        self
    }

    pub fn with_tick_delay(mut self, tick_delay: Duration) -> Self {
        self.tick_delay = tick_delay;
        self
    }

    pub fn with_stop(mut self, stop: StopCondition) -> Self {
        self.stop = stop;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_processes == 0 {
            return Err(ConfigError::NoProcesses);
        }
        if self.cs_duration == 0 {
            return Err(ConfigError::ZeroCsDuration);
        }
        Ok(())
    }
}

/// Shared flag for asking a running simulation to stop at the next safe tick boundary.
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
