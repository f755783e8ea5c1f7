//! The externally supplied list of "process `p` asks for the CS at tick `t`".

use std::str::FromStr;

use crate::error::ConfigError;
use crate::protocol::{ProcId, Tick};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScheduledRequest {
    pub process: ProcId,
    pub time: Tick,
}

impl ScheduledRequest {
    pub fn new(process: ProcId, time: Tick) -> Self {
        ScheduledRequest { process, time }
    }
}

impl FromStr for ScheduledRequest {
    type Err = ConfigError;

    /// `PID:TIME` or `PID@TIME`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = |reason: &str| ConfigError::ScheduleEntry {
            entry: s.to_string(),
            reason: reason.to_string(),
        };
        let (pid, time) = s
            .split_once(|c: char| c == ':' || c == '@')
            .ok_or_else(|| bad("expected PID:TIME"))?;
        let process = pid
            .trim()
            .parse::<ProcId>()
            .map_err(|e| bad(&format!("process id: {e}")))?;
        let time = time
            .trim()
            .parse::<Tick>()
            .map_err(|e| bad(&format!("time: {e}")))?;
        Ok(ScheduledRequest { process, time })
    }
}

/// Requests sorted by `(time, process)`, consumed front to back.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Schedule {
    requests: Vec<ScheduledRequest>,
    next: usize,
}

impl Schedule {
    pub fn new(mut requests: Vec<ScheduledRequest>) -> Self {
        requests.sort_by_key(|r| (r.time, r.process));
        Schedule { requests, next: 0 }
    }

    pub fn from_pairs(pairs: &[(ProcId, Tick)]) -> Self {
        Self::new(
            pairs
                .iter()
                .map(|&(process, time)| ScheduledRequest { process, time })
                .collect(),
        )
    }

    /// `NUM_REQUESTS PID TIME PID TIME ...`
    pub fn from_flat<S: AsRef<str>>(args: &[S]) -> Result<Self, ConfigError> {
        let num = |s: &str, what: &str| -> Result<u64, ConfigError> {
            s.trim().parse::<u64>().map_err(|e| ConfigError::ScheduleEntry {
                entry: s.to_string(),
                reason: format!("{what}: {e}"),
            })
        };
        let (first, rest) = match args.split_first() {
            Some(split) => split,
            None => return Ok(Self::default()),
        };
        let declared = num(first.as_ref(), "request count")? as usize;
        if rest.len() % 2 != 0 || rest.len() / 2 != declared {
            return Err(ConfigError::RequestCount {
                declared,
                found: rest.len() / 2,
            });
        }
        let mut requests = Vec::with_capacity(declared);
        for pair in rest.chunks(2) {
            let process = num(pair[0].as_ref(), "process id")? as ProcId;
            let time = num(pair[1].as_ref(), "time")?;
            requests.push(ScheduledRequest { process, time });
        }
        Ok(Self::new(requests))
    }

    /// The five-process request set used when no requests are given.
    pub fn default_scenario() -> Self {
        Self::from_pairs(&[(0, 0), (1, 2), (2, 7), (3, 7), (4, 8)])
    }

    /// Smallest process count that can run every request, 0 when empty.
    pub fn min_processes(&self) -> usize {
        self.requests.iter().map(|r| r.process + 1).max().unwrap_or(0)
    }

    pub fn validate(&self, num_processes: usize) -> Result<(), ConfigError> {
        match self.requests.iter().find(|r| r.process >= num_processes) {
            Some(r) => Err(ConfigError::UnknownProcess {
                process: r.process,
                num_processes,
            }),
            None => Ok(()),
        }
    }

    /// Pops every request due at `now`, in ascending process order.
    pub fn take_due(&mut self, now: Tick) -> Vec<ScheduledRequest> {
        let mut due = Vec::new();
        while let Some(r) = self.requests.get(self.next) {
            // entries already in the past still fire
            if r.time > now {
                break;
            }
            due.push(*r);
            self.next += 1;
        }
        due
    }

    pub fn is_exhausted(&self) -> bool {
        self.next >= self.requests.len()
    }

    pub fn remaining(&self) -> &[ScheduledRequest] {
        &self.requests[self.next..]
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_separators() {
        assert_eq!("3:7".parse::<ScheduledRequest>(), Ok(ScheduledRequest::new(3, 7)));
        assert_eq!(" 2 @ 9 ".parse::<ScheduledRequest>(), Ok(ScheduledRequest::new(2, 9)));
    }

    #[test]
    fn rejects_malformed_entries() {
        for bad in ["", "3", "a:1", "1:b", "-1:2"] {
            assert!(
                matches!(bad.parse::<ScheduledRequest>(), Err(ConfigError::ScheduleEntry { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn sorts_by_time_then_process() {
        let s = Schedule::from_pairs(&[(4, 8), (3, 7), (1, 2), (2, 7)]);
        let order = s.remaining().iter().map(|r| (r.process, r.time)).collect::<Vec<_>>();
        assert_eq!(order, vec![(1, 2), (2, 7), (3, 7), (4, 8)]);
    }

    #[test]
    fn take_due_consumes_ties_together() {
        let mut s = Schedule::default_scenario();
        assert_eq!(s.take_due(0), vec![ScheduledRequest::new(0, 0)]);
        assert!(s.take_due(1).is_empty());
        assert_eq!(s.take_due(2).len(), 1);
        let ties = s.take_due(7);
        assert_eq!(ties, vec![ScheduledRequest::new(2, 7), ScheduledRequest::new(3, 7)]);
        assert_eq!(s.take_due(8).len(), 1);
        assert!(s.is_exhausted());
    }

    #[test]
    fn flat_form_is_count_then_pairs() {
        let s = Schedule::from_flat(&["2", "1", "4", "0", "3"]).unwrap();
        assert_eq!(
            s.remaining(),
            &[ScheduledRequest::new(0, 3), ScheduledRequest::new(1, 4)]
        );
    }

    #[test]
    fn flat_form_checks_count() {
        assert_eq!(
            Schedule::from_flat(&["3", "1", "4"]),
            Err(ConfigError::RequestCount { declared: 3, found: 1 })
        );
        assert_eq!(
            Schedule::from_flat(&["1", "1", "4", "2"]),
            Err(ConfigError::RequestCount { declared: 1, found: 1 })
        );
    }

    #[test]
    fn validate_rejects_unknown_process() {
        let s = Schedule::from_pairs(&[(0, 0), (5, 1)]);
        assert_eq!(
            s.validate(5),
            Err(ConfigError::UnknownProcess { process: 5, num_processes: 5 })
        );
        assert!(s.validate(6).is_ok());
    }

    #[test]
    fn min_processes_covers_highest_id() {
        assert_eq!(Schedule::default_scenario().min_processes(), 5);
        assert_eq!(Schedule::from_pairs(&[(2, 0), (0, 4)]).min_processes(), 3);
        assert_eq!(Schedule::default().min_processes(), 0);
    }
}
