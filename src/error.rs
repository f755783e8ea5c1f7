use thiserror::Error;

use crate::protocol::{ProcId, SeqNo, Tick};

/// Rejected run configuration. Reported before any tick runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("at least one process is required")]
    NoProcesses,

    #[error("critical section duration must be at least one tick")]
    ZeroCsDuration,

    #[error("request for process {process}, but only {num_processes} processes exist")]
    UnknownProcess { process: ProcId, num_processes: usize },

    #[error("invalid schedule entry `{entry}`: {reason}")]
    ScheduleEntry { entry: String, reason: String },

    #[error("{declared} requests declared but {found} given")]
    RequestCount { declared: usize, found: usize },

    #[error("the default scenario needs {needed} processes, only {num_processes} configured; pass requests explicitly")]
    ScenarioTooSmall { needed: usize, num_processes: usize },
}

/// A broken protocol invariant. These are defects, never recoverable states.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("token is not held by any process")]
    TokenAbsent,

    #[error("token holder {holder} is not a process")]
    TokenHolderOutOfRange { holder: ProcId },

    #[error("mutual exclusion broken, processes {in_cs:?} are in CS together")]
    MutualExclusion { in_cs: Vec<ProcId> },

    #[error("process {process} is in CS without holding the token")]
    CsWithoutToken { process: ProcId },

    #[error("process {process} own sequence number went from {before} to {after}")]
    SequenceRegressed {
        process: ProcId,
        before: SeqNo,
        after: SeqNo,
    },

    #[error("LN[{process}] = {granted} exceeds holder's RN[{process}] = {requested}")]
    GrantExceedsRequest {
        process: ProcId,
        granted: SeqNo,
        requested: SeqNo,
    },

    #[error("process {process} appears more than once in the token queue")]
    DuplicateQueueEntry { process: ProcId },

    #[error("process {process} is queued while in CS")]
    InCsEnqueued { process: ProcId },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invariant violated at t={tick}: {violation}")]
    Invariant {
        tick: Tick,
        violation: InvariantViolation,
    },
}
