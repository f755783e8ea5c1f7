use log::{debug, error, info};

use crate::protocol::{Bus, GrantPath, ProcId, RequestMessage, SeqNo, Tick, Token, TokenCell};
use crate::trace::{Trace, TraceEvent};

/// What a process may touch while it handles one input.
///
/// Built by the simulation for the duration of a single call, so a process
/// never holds references to the bus, the token or its peers.
pub struct Context<'a> {
    pub(crate) now: Tick,
    pub(crate) cs_duration: u32,
    pub(crate) bus: &'a mut Bus,
    pub(crate) token: &'a mut TokenCell,
    pub(crate) trace: &'a mut Trace,
    pub(crate) handoff: Option<ProcId>,
}

impl<'a> Context<'a> {
    pub fn now(&self) -> Tick {
        self.now
    }

    pub fn cs_duration(&self) -> u32 {
        self.cs_duration
    }

    pub fn holds_token(&self, id: ProcId) -> bool {
        self.token.is_held_by(id)
    }

    pub fn token(&self) -> &Token {
        self.token.token()
    }

    pub fn token_mut(&mut self, id: ProcId) -> Option<&mut Token> {
        self.token.token_mut(id)
    }

    pub fn record(&mut self, event: TraceEvent) {
        self.trace.record(self.now, event);
    }

    pub fn broadcast(&mut self, sender: ProcId, msg: RequestMessage) {
        self.bus.broadcast(sender, msg, self.now);
        self.record(TraceEvent::RequestBroadcast {
            process: sender,
            serial: msg.serial,
        });
    }

    /// Starts handing the token from `from` to `to`. The simulation lands it at
    /// `to` as soon as the current call returns, within the same step.
    ///
    /// `requested` is the sender's `RN[to]`; it is recorded together with the
    /// token's `LN[to]` so grants can be audited from the trace.
    /// A sender that does not hold the token changes nothing.
    pub fn send_token(&mut self, from: ProcId, to: ProcId, path: GrantPath, requested: SeqNo) {
        let last_granted = self.token.token().ln[to];
        if !self.token.release(from) {
            error!("process {} cannot send a token it does not hold", from);
            return;
        }
        info!("process {} sends token to process {} ({:?})", from, to, path);
        self.record(TraceEvent::TokenGranted {
            from,
            to,
            path,
            requested,
            last_granted,
        });
        self.handoff = Some(to);
    }

    pub(crate) fn take_handoff(&mut self) -> Option<ProcId> {
        let h = self.handoff.take();
        if let Some(to) = h {
            debug!("token in transit to process {}", to);
        }
        h
    }
}
