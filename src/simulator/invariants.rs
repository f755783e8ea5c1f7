//! Tick-boundary audit of the protocol state.

use crate::error::InvariantViolation;
use crate::protocol::{Process, SeqNo, TokenCell};

pub struct InvariantChecker {
    own_rn: Vec<SeqNo>,
}

impl InvariantChecker {
    pub fn new(processes: &[Process]) -> Self {
        InvariantChecker {
            own_rn: processes.iter().map(|p| p.rn()[p.id]).collect(),
        }
    }

    /// Checks every invariant and remembers own sequence numbers for the next
    /// call. Returns the first violation found.
    pub fn check(&mut self, processes: &[Process], token: &TokenCell) -> Result<(), InvariantViolation> {
        // exactly one holder
        let holder = token.holder().ok_or(InvariantViolation::TokenAbsent)?;
        if holder >= processes.len() {
            return Err(InvariantViolation::TokenHolderOutOfRange { holder });
        }

        // at most one process in CS, and only the holder
        let in_cs = processes
            .iter()
            .filter(|p| p.in_cs())
            .map(|p| p.id)
            .collect::<Vec<_>>();
        if in_cs.len() > 1 {
            return Err(InvariantViolation::MutualExclusion { in_cs });
        }
        if let Some(&process) = in_cs.first() {
            if process != holder {
                return Err(InvariantViolation::CsWithoutToken { process });
            }
        }

        // own counters never go back
        for (p, before) in processes.iter().zip(self.own_rn.iter_mut()) {
            let after = p.rn()[p.id];
            if after < *before {
                return Err(InvariantViolation::SequenceRegressed {
                    process: p.id,
                    before: *before,
                    after,
                });
            }
            *before = after;
        }

        // LN never ahead of what the holder has seen requested
        let t = token.token();
        let rn = processes[holder].rn();
        for (process, (&granted, &requested)) in t.ln.iter().zip(rn.iter()).enumerate() {
            if granted > requested {
                return Err(InvariantViolation::GrantExceedsRequest {
                    process,
                    granted,
                    requested,
                });
            }
        }

        if let Some(&process) = t.q.duplicates().first() {
            return Err(InvariantViolation::DuplicateQueueEntry { process });
        }
        if let Some(&process) = in_cs.first() {
            if t.q.contains(process) {
                return Err(InvariantViolation::InCsEnqueued { process });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ProcState;

    fn procs(n: usize) -> Vec<Process> {
        (0..n).map(|i| Process::new(i, n)).collect()
    }

    #[test]
    fn fresh_state_is_valid() {
        let ps = procs(3);
        let cell = TokenCell::new(3, 0);
        assert_eq!(InvariantChecker::new(&ps).check(&ps, &cell), Ok(()));
    }

    #[test]
    fn token_in_transit_is_absent() {
        let ps = procs(2);
        let mut cell = TokenCell::new(2, 0);
        cell.release(0);
        assert_eq!(
            InvariantChecker::new(&ps).check(&ps, &cell),
            Err(InvariantViolation::TokenAbsent)
        );
    }

    #[test]
    fn holder_must_exist() {
        let ps = procs(2);
        let cell = TokenCell::new(2, 7);
        assert_eq!(
            InvariantChecker::new(&ps).check(&ps, &cell),
            Err(InvariantViolation::TokenHolderOutOfRange { holder: 7 })
        );
    }

    #[test]
    fn two_in_cs_is_reported() {
        let mut ps = procs(3);
        ps[0].force_state(ProcState::InCs(2));
        ps[2].force_state(ProcState::InCs(1));
        let cell = TokenCell::new(3, 0);
        assert_eq!(
            InvariantChecker::new(&ps).check(&ps, &cell),
            Err(InvariantViolation::MutualExclusion { in_cs: vec![0, 2] })
        );
    }

    #[test]
    fn cs_needs_the_token() {
        let mut ps = procs(3);
        ps[1].force_state(ProcState::InCs(3));
        let cell = TokenCell::new(3, 0);
        assert_eq!(
            InvariantChecker::new(&ps).check(&ps, &cell),
            Err(InvariantViolation::CsWithoutToken { process: 1 })
        );
    }

    #[test]
    fn ln_ahead_of_rn_is_reported() {
        let ps = procs(3);
        let mut cell = TokenCell::new(3, 0);
        cell.token_unchecked().ln[2] = 1;
        assert_eq!(
            InvariantChecker::new(&ps).check(&ps, &cell),
            Err(InvariantViolation::GrantExceedsRequest {
                process: 2,
                granted: 1,
                requested: 0
            })
        );
    }

    #[test]
    fn duplicate_queue_entry_is_reported() {
        let ps = procs(3);
        let mut cell = TokenCell::new(3, 0);
        cell.token_unchecked().q.push_unchecked(1);
        cell.token_unchecked().q.push_unchecked(1);
        assert_eq!(
            InvariantChecker::new(&ps).check(&ps, &cell),
            Err(InvariantViolation::DuplicateQueueEntry { process: 1 })
        );
    }

    #[test]
    fn regressed_counter_is_reported() {
        let mut ps = procs(2);
        ps[1].seed_rn(1, 4);
        let mut checker = InvariantChecker::new(&ps);
        let cell = TokenCell::new(2, 0);
        assert_eq!(checker.check(&ps, &cell), Ok(()));
        let ps = procs(2);
        assert_eq!(
            checker.check(&ps, &cell),
            Err(InvariantViolation::SequenceRegressed {
                process: 1,
                before: 4,
                after: 0
            })
        );
    }
}
