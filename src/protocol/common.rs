use serde::Serialize;
use std::fmt;

pub type ProcId = usize;
pub type Tick = u64;
pub type SeqNo = u64;

pub const DEFAULT_CS_DURATION: u32 = 3;

pub mod timing {
    use super::Tick;

    /// one simulated network hop for a broadcast request
    pub const REQUEST_HOP: Tick = 1;
}

// MESSAGE TYPES

/// `REQUEST(source, serial)`: the `serial`-th critical section request of `source`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RequestMessage {
    pub source: ProcId,
    pub serial: SeqNo,
}

impl fmt::Display for RequestMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "REQUEST({}, {})", self.source, self.serial)
    }
}

// how a holder came to hand the token over
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantPath {
    /// idle holder answered a request as it arrived
    Direct,
    /// head of the token queue at CS exit
    Queue,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    InCs,
    AlreadyRequesting,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgnoreReason::InCs => write!(f, "already in CS"),
            IgnoreReason::AlreadyRequesting => write!(f, "request already outstanding"),
        }
    }
}
