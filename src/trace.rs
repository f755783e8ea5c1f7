//! Deterministic event trace of a run.
//!
//! Every state change a test or an operator may want to assert on is appended
//! here, tagged with the tick it happened in. The trace serializes to JSON one
//! entry per line.

use serde::Serialize;
use std::fmt;

use crate::protocol::{GrantPath, IgnoreReason, ProcId, RequestMessage, SeqNo, Tick};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    ProcessCreated {
        process: ProcId,
    },
    TokenAssigned {
        process: ProcId,
    },
    RequestBroadcast {
        process: ProcId,
        serial: SeqNo,
    },
    RequestIgnored {
        process: ProcId,
        reason: IgnoreReason,
    },
    MessageDelivered {
        to: ProcId,
        msg: RequestMessage,
    },
    Enqueued {
        holder: ProcId,
        process: ProcId,
    },
    TokenGranted {
        from: ProcId,
        to: ProcId,
        path: GrantPath,
        /// holder's `RN[to]` at the moment of the grant
        requested: SeqNo,
        /// token's `LN[to]` at the moment of the grant
        last_granted: SeqNo,
    },
    CsEntered {
        process: ProcId,
    },
    CsExited {
        process: ProcId,
    },
    TokenParked {
        process: ProcId,
    },
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TraceEvent::*;
        match self {
            ProcessCreated { process } => write!(f, "process {process} created"),
            TokenAssigned { process } => write!(f, "token assigned to process {process}"),
            RequestBroadcast { process, serial } => {
                write!(f, "process {process} broadcasts REQUEST({process}, {serial})")
            }
            RequestIgnored { process, reason } => {
                write!(f, "process {process} request ignored: {reason}")
            }
            MessageDelivered { to, msg } => write!(f, "{msg} delivered to process {to}"),
            Enqueued { holder, process } => {
                write!(f, "process {holder} queues process {process}")
            }
            TokenGranted { from, to, path, requested, last_granted } => write!(
                f,
                "process {from} sends token to process {to} ({path:?}, RN={requested}, LN={last_granted})"
            ),
            CsEntered { process } => write!(f, "process {process} enters CS"),
            CsExited { process } => write!(f, "process {process} exits CS"),
            TokenParked { process } => write!(f, "token parked at process {process}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TraceEntry {
    pub tick: Tick,
    #[serde(flatten)]
    pub event: TraceEvent,
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[t={:>4}] {}", self.tick, self.event)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Trace {
    entries: Vec<TraceEntry>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, tick: Tick, event: TraceEvent) {
        self.entries.push(TraceEntry { tick, event });
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ticks at which `process` entered the CS.
    pub fn cs_entries_of(&self, process: ProcId) -> Vec<Tick> {
        self.entries
            .iter()
            .filter(|e| e.event == TraceEvent::CsEntered { process })
            .map(|e| e.tick)
            .collect()
    }

    /// `(tick, process)` for every CS entry, in order.
    pub fn cs_entries(&self) -> Vec<(Tick, ProcId)> {
        self.entries
            .iter()
            .filter_map(|e| match e.event {
                TraceEvent::CsEntered { process } => Some((e.tick, process)),
                _ => None,
            })
            .collect()
    }

    pub fn grants(&self) -> impl Iterator<Item = &TraceEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.event, TraceEvent::TokenGranted { .. }))
    }

    pub fn to_json_lines(&self) -> serde_json::Result<String> {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&serde_json::to_string(entry)?);
            out.push('\n');
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_line_is_flat_and_tagged() {
        let mut trace = Trace::new();
        trace.record(
            3,
            TraceEvent::TokenGranted {
                from: 0,
                to: 1,
                path: GrantPath::Queue,
                requested: 1,
                last_granted: 0,
            },
        );
        let line = trace.to_json_lines().unwrap();
        let value: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(value["tick"], 3);
        assert_eq!(value["event"], "token_granted");
        assert_eq!(value["path"], "queue");
        assert_eq!(value["to"], 1);
    }

    #[test]
    fn cs_entries_filters_by_process() {
        let mut trace = Trace::new();
        trace.record(0, TraceEvent::CsEntered { process: 0 });
        trace.record(3, TraceEvent::CsExited { process: 0 });
        trace.record(3, TraceEvent::CsEntered { process: 1 });
        trace.record(9, TraceEvent::CsEntered { process: 0 });
        assert_eq!(trace.cs_entries_of(0), vec![0, 9]);
        assert_eq!(trace.cs_entries(), vec![(0, 0), (3, 1), (9, 0)]);
    }

    #[test]
    fn display_has_tick_prefix() {
        let entry = TraceEntry {
            tick: 7,
            event: TraceEvent::CsEntered { process: 2 },
        };
        assert_eq!(entry.to_string(), "[t=   7] process 2 enters CS");
    }
}
