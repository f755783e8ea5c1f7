use std::thread;

use log::{error, info, trace, warn};
use serde::Serialize;

use super::context::Context;
use super::invariants::InvariantChecker;
use crate::config::{SimConfig, StopCondition, StopHandle};
use crate::error::{ConfigError, SimError};
use crate::protocol::*;
use crate::schedule::Schedule;
use crate::trace::{Trace, TraceEvent};

/// The process that owns the token when the run starts.
pub const INITIAL_HOLDER: ProcId = 0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// schedule done, nobody in CS, bus empty
    Quiescent,
    TickBudget,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub ticks: Tick,
    pub reason: StopReason,
    pub cs_entries: Vec<(Tick, ProcId)>,
    pub final_holder: Option<ProcId>,
    /// request copies still buffered when the run ended
    pub undelivered: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProcessSnapshot {
    pub id: ProcId,
    pub rn: Vec<SeqNo>,
    pub holds_token: bool,
    pub in_cs: bool,
    pub cs_timer: u32,
    pub requesting: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TokenSnapshot {
    pub holder: Option<ProcId>,
    pub ln: Vec<SeqNo>,
    pub queue: Vec<ProcId>,
}

/// Discrete-tick driver. Each tick:
///   1. trigger the scheduled requests of the current tick
///   2. advance the clock
///   3. deliver the requests buffered on the bus
///   4. advance every process timer, in ascending id order
pub struct Simulation {
    config: SimConfig,
    processes: Vec<Process>,
    bus: Bus,
    token: TokenCell,
    schedule: Schedule,
    trace: Trace,
    checker: InvariantChecker,
    stop: StopHandle,
    time: Tick,
}

impl Simulation {
    pub fn new(config: SimConfig, schedule: Schedule) -> Result<Self, ConfigError> {
        config.validate()?;
        let n = config.num_processes;
        schedule.validate(n)?;

        let mut trace = Trace::new();
        let mut processes = (0..n)
            .map(|id| {
                trace.record(0, TraceEvent::ProcessCreated { process: id });
                Process::new(id, n)
            })
            .collect::<Vec<_>>();

        // the holder's implicit first grant counts as request 1, served, everywhere
        let mut token = TokenCell::new(n, INITIAL_HOLDER);
        for p in &mut processes {
            p.seed_rn(INITIAL_HOLDER, 1);
        }
        if let Some(t) = token.token_mut(INITIAL_HOLDER) {
            t.ln[INITIAL_HOLDER] = 1;
        }
        trace.record(0, TraceEvent::TokenAssigned { process: INITIAL_HOLDER });
        info!(
            "simulation of {} processes, CS duration {} ticks, {} scheduled requests",
            n,
            config.cs_duration,
            schedule.len()
        );

        let checker = InvariantChecker::new(&processes);
        Ok(Simulation {
            config,
            processes,
            bus: Bus::new(n),
            token,
            schedule,
            trace,
            checker,
            stop: StopHandle::new(),
            time: 0,
        })
    }

    // helper functions

    /// Runs one process input with a fresh context, then lands any token the
    /// input handed off, still inside the same step.
    fn with_process<R>(&mut self, id: ProcId, f: impl FnOnce(&mut Process, &mut Context<'_>) -> R) -> R {
        let Simulation {
            config,
            processes,
            bus,
            token,
            trace,
            time,
            ..
        } = self;
        let mut ctx = Context {
            now: *time,
            cs_duration: config.cs_duration,
            bus,
            token,
            trace,
            handoff: None,
        };
        let out = f(&mut processes[id], &mut ctx);
        if let Some(to) = ctx.take_handoff() {
            self.land_token(to);
        }
        out
    }

    fn land_token(&mut self, to: ProcId) {
        if !self.token.land(to) {
            error!("token hand-off to process {} found the token already held", to);
            return;
        }
        self.with_process(to, |p, ctx| p.on_token(ctx));
    }

    fn check(&mut self) -> Result<(), SimError> {
        self.checker
            .check(&self.processes, &self.token)
            .map_err(|violation| {
                error!("t={}: {}", self.time, violation);
                SimError::Invariant {
                    tick: self.time,
                    violation,
                }
            })
    }

    fn any_in_cs(&self) -> bool {
        self.processes.iter().any(|p| p.in_cs())
    }

    // driving

    /// Advances the simulation by one tick.
    pub fn step(&mut self) -> Result<(), SimError> {
        if !self.stop.is_stop_requested() {
            for req in self.schedule.take_due(self.time) {
                self.with_process(req.process, |p, ctx| p.request_cs(ctx));
            }
        }

        self.time += 1;
        trace!("t={}", self.time);

        for delivery in self.bus.take_due(self.time) {
            self.with_process(delivery.dest, |p, ctx| p.on_request(delivery.msg, ctx));
        }

        for id in 0..self.processes.len() {
            self.with_process(id, |p, ctx| p.on_tick(ctx));
        }

        self.check()?;

        if !self.config.tick_delay.is_zero() {
            thread::sleep(self.config.tick_delay);
        }
        Ok(())
    }

    /// Steps until the configured stop condition or a stop request ends the run.
    pub fn run(&mut self) -> Result<RunReport, SimError> {
        let started = self.time;
        let reason = loop {
            if self.stop.is_stop_requested() && !self.any_in_cs() {
                info!("stop requested, halting at t={}", self.time);
                break StopReason::Cancelled;
            }
            let elapsed = self.time - started;
            match self.config.stop {
                StopCondition::Ticks(budget) => {
                    if elapsed >= budget {
                        break StopReason::TickBudget;
                    }
                }
                StopCondition::Quiescence { max_ticks } => {
                    if self.is_quiescent() {
                        break StopReason::Quiescent;
                    }
                    if elapsed >= max_ticks {
                        warn!("not quiescent after {} ticks, giving up", max_ticks);
                        break StopReason::TickBudget;
                    }
                }
            }
            self.step()?;
        };

        info!("run ended at t={} ({:?})", self.time, reason);
        Ok(RunReport {
            ticks: self.time,
            reason,
            cs_entries: self.trace.cs_entries(),
            final_holder: self.token.holder(),
            undelivered: self.bus.len(),
        })
    }

    /// Asks `id` for the critical section right now, outside the schedule.
    pub fn request_cs(&mut self, id: ProcId) -> Result<RequestOutcome, ConfigError> {
        if id >= self.processes.len() {
            return Err(ConfigError::UnknownProcess {
                process: id,
                num_processes: self.processes.len(),
            });
        }
        Ok(self.with_process(id, |p, ctx| p.request_cs(ctx)))
    }

    // introspection

    pub fn time(&self) -> Tick {
        self.time
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn pending_deliveries(&self) -> Vec<PendingDelivery> {
        self.bus.pending()
    }

    pub fn is_quiescent(&self) -> bool {
        self.schedule.is_exhausted()
            && self.bus.is_empty()
            && self.processes.iter().all(|p| p.state() == ProcState::Idle)
    }

    pub fn snapshot(&self) -> Vec<ProcessSnapshot> {
        self.processes
            .iter()
            .map(|p| ProcessSnapshot {
                id: p.id,
                rn: p.rn().to_vec(),
                holds_token: self.token.is_held_by(p.id),
                in_cs: p.in_cs(),
                cs_timer: p.cs_timer(),
                requesting: p.is_requesting(),
            })
            .collect()
    }

    pub fn token(&self) -> TokenSnapshot {
        let t = self.token.token();
        TokenSnapshot {
            holder: self.token.holder(),
            ln: t.ln.clone(),
            queue: t.q.iter().copied().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InvariantViolation;
    use crate::protocol::IgnoreReason;

    fn sim(n: usize, pairs: &[(ProcId, Tick)]) -> Simulation {
        Simulation::new(SimConfig::new(n), Schedule::from_pairs(pairs)).unwrap()
    }

    #[test]
    fn initial_state() {
        let s = sim(3, &[]);
        let snap = s.snapshot();
        assert!(snap[0].holds_token);
        assert!(snap.iter().all(|p| p.rn == vec![1, 0, 0]));
        assert_eq!(s.token().ln, vec![1, 0, 0]);
        assert!(s.is_quiescent());
    }

    #[test]
    fn rejects_bad_schedule_before_running() {
        let err = Simulation::new(SimConfig::new(2), Schedule::from_pairs(&[(2, 0)]));
        assert!(matches!(err, Err(ConfigError::UnknownProcess { process: 2, .. })));
    }

    #[test]
    fn request_is_delivered_one_tick_later() {
        let mut s = sim(3, &[(1, 0)]);
        s.step().unwrap();
        // delivered at t=1 to the idle holder, which grants at once
        assert_eq!(s.time(), 1);
        let snap = s.snapshot();
        assert!(snap[1].holds_token && snap[1].in_cs);
        assert_eq!(snap[1].cs_timer, 2);
        assert_eq!(snap[0].rn[1], 1);
        assert_eq!(snap[2].rn[1], 1);
    }

    #[test]
    fn redundant_request_is_idempotent() {
        let mut s = sim(3, &[]);
        s.request_cs(0).unwrap();
        assert_eq!(s.request_cs(0).unwrap(), RequestOutcome::Ignored(IgnoreReason::InCs));
        s.request_cs(2).unwrap();
        assert_eq!(
            s.request_cs(2).unwrap(),
            RequestOutcome::Ignored(IgnoreReason::AlreadyRequesting)
        );
        assert_eq!(s.snapshot()[2].rn[2], 1);
        assert_eq!(s.pending_deliveries().len(), 2);
    }

    #[test]
    fn unknown_process_request_is_rejected() {
        let mut s = sim(2, &[]);
        assert!(s.request_cs(2).is_err());
    }

    #[test]
    fn single_process_runs_alone() {
        let mut s = sim(1, &[(0, 0), (0, 5)]);
        let report = s.run().unwrap();
        assert_eq!(report.reason, StopReason::Quiescent);
        assert_eq!(report.cs_entries, vec![(0, 0), (5, 0)]);
        assert_eq!(report.final_holder, Some(0));
    }

    #[test]
    fn tick_budget_stops_run() {
        let mut s = Simulation::new(
            SimConfig::new(2).with_stop(StopCondition::Ticks(4)),
            Schedule::from_pairs(&[(1, 10)]),
        )
        .unwrap();
        let report = s.run().unwrap();
        assert_eq!(report.reason, StopReason::TickBudget);
        assert_eq!(report.ticks, 4);
    }

    #[test]
    fn quiescence_gives_up_after_max_ticks() {
        let mut s = Simulation::new(
            SimConfig::new(2).with_stop(StopCondition::Quiescence { max_ticks: 3 }),
            Schedule::from_pairs(&[(1, 10)]),
        )
        .unwrap();
        let report = s.run().unwrap();
        assert_eq!(report.reason, StopReason::TickBudget);
        assert_eq!(report.ticks, 3);
        assert!(report.cs_entries.is_empty());
    }

    #[test]
    fn step_halts_on_cs_without_token() {
        let mut s = sim(3, &[]);
        s.processes[1].force_state(ProcState::InCs(5));
        assert_eq!(
            s.step(),
            Err(SimError::Invariant {
                tick: 1,
                violation: InvariantViolation::CsWithoutToken { process: 1 },
            })
        );
    }

    #[test]
    fn run_propagates_violation_and_stops_stepping() {
        let mut s = sim(3, &[(2, 0)]);
        s.token.token_unchecked().q.push_unchecked(1);
        s.token.token_unchecked().q.push_unchecked(1);
        let err = s.run().unwrap_err();
        assert_eq!(
            err,
            SimError::Invariant {
                tick: 1,
                violation: InvariantViolation::DuplicateQueueEntry { process: 1 },
            }
        );
        assert_eq!(s.time(), 1);
    }

    #[test]
    fn stop_request_waits_for_cs_exit() {
        let mut s = sim(3, &[(0, 0), (1, 1), (2, 20)]);
        s.step().unwrap();
        assert!(s.snapshot()[0].in_cs);
        s.stop_handle().request_stop();
        let report = s.run().unwrap();
        assert_eq!(report.reason, StopReason::Cancelled);
        assert_eq!(report.ticks, 3);
        assert_eq!(report.undelivered, 0);
        // nothing scheduled fires once the stop is requested
        assert!(!s
            .trace()
            .entries()
            .iter()
            .any(|e| matches!(e.event, TraceEvent::RequestBroadcast { .. })));
    }

    #[test]
    fn stop_from_another_thread() {
        let mut s = Simulation::new(
            SimConfig::new(2).with_stop(StopCondition::Ticks(Tick::MAX)),
            Schedule::default(),
        )
        .unwrap();
        let handle = s.stop_handle();
        let worker = thread::spawn(move || s.run().map(|r| r.reason));
        handle.request_stop();
        assert_eq!(worker.join().unwrap(), Ok(StopReason::Cancelled));
    }
}
