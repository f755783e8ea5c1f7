use log::{debug, info, warn};

use super::common::*;
use crate::simulator::Context;
use crate::trace::TraceEvent;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ProcState {
    #[default]
    Idle,
    /// broadcast sent, waiting for the token
    Requesting,
    /// ticks left in the critical section
    InCs(u32),
}

/// Result of asking a process to enter the critical section.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestOutcome {
    Entered,
    Broadcast(RequestMessage),
    Ignored(IgnoreReason),
}

pub struct Process {
    pub id: ProcId,
    rn: Vec<SeqNo>,
    state: ProcState,
}

impl Process {
    pub fn new(id: ProcId, num_procs: usize) -> Self {
        Process {
            id,
            rn: vec![0; num_procs],
            state: ProcState::Idle,
        }
    }

    /// Marks request `serial` of `j` as known without a message, used for the
    /// token's implicit initial grant.
    pub(crate) fn seed_rn(&mut self, j: ProcId, serial: SeqNo) {
        self.rn[j] = self.rn[j].max(serial);
    }

    #[cfg(test)]
    pub(crate) fn force_state(&mut self, state: ProcState) {
        self.state = state;
    }

    pub fn rn(&self) -> &[SeqNo] {
        &self.rn
    }

    pub fn state(&self) -> ProcState {
        self.state
    }

    pub fn in_cs(&self) -> bool {
        matches!(self.state, ProcState::InCs(_))
    }

    pub fn is_requesting(&self) -> bool {
        self.state == ProcState::Requesting
    }

    pub fn cs_timer(&self) -> u32 {
        match self.state {
            ProcState::InCs(t) => t,
            _ => 0,
        }
    }

    // helper functions

    fn enter_cs(&mut self, ctx: &mut Context<'_>) {
        if self.in_cs() {
            return;
        }
        info!("process {} enters CS at t={}", self.id, ctx.now());
        self.state = ProcState::InCs(ctx.cs_duration());
        ctx.record(TraceEvent::CsEntered { process: self.id });
    }

    fn exit_cs(&mut self, ctx: &mut Context<'_>) {
        if !ctx.holds_token(self.id) {
            // stays in CS, the invariant checker reports this at the tick boundary
            warn!("process {} cannot leave CS without holding the token", self.id);
            return;
        }
        self.state = ProcState::Idle;
        info!("process {} exits CS at t={}", self.id, ctx.now());
        ctx.record(TraceEvent::CsExited { process: self.id });

        let mut queued = Vec::new();
        let next = match ctx.token_mut(self.id) {
            Some(token) => {
                token.ln[self.id] = self.rn[self.id];
                for (j, &rn_j) in self.rn.iter().enumerate() {
                    if j != self.id && token.is_outstanding(j, rn_j) && token.q.enqueue(j) {
                        queued.push(j);
                    }
                }
                token.q.dequeue()
            }
            None => return,
        };

        for j in queued {
            debug!("process {} queues process {}", self.id, j);
            ctx.record(TraceEvent::Enqueued {
                holder: self.id,
                process: j,
            });
        }

        match next {
            Some(j) => {
                ctx.send_token(self.id, j, GrantPath::Queue, self.rn[j]);
            }
            None => {
                debug!("token parked at process {}", self.id);
                ctx.record(TraceEvent::TokenParked { process: self.id });
            }
        }
    }

    // inputs

    /// The process wants the critical section.
    pub fn request_cs(&mut self, ctx: &mut Context<'_>) -> RequestOutcome {
        let ignored = match self.state {
            ProcState::InCs(_) => Some(IgnoreReason::InCs),
            ProcState::Requesting => Some(IgnoreReason::AlreadyRequesting),
            ProcState::Idle => None,
        };
        if let Some(reason) = ignored {
            warn!("process {} request ignored: {}", self.id, reason);
            ctx.record(TraceEvent::RequestIgnored {
                process: self.id,
                reason,
            });
            return RequestOutcome::Ignored(reason);
        }

        if ctx.holds_token(self.id) {
            self.enter_cs(ctx);
            return RequestOutcome::Entered;
        }

        self.rn[self.id] += 1;
        let msg = RequestMessage {
            source: self.id,
            serial: self.rn[self.id],
        };
        debug!("process {} broadcasts {}", self.id, msg);
        self.state = ProcState::Requesting;
        ctx.broadcast(self.id, msg);
        RequestOutcome::Broadcast(msg)
    }

    /// A request of another process arrived over the bus.
    pub fn on_request(&mut self, msg: RequestMessage, ctx: &mut Context<'_>) {
        debug!("process {} receives {}", self.id, msg);
        let src = msg.source;
        self.rn[src] = self.rn[src].max(msg.serial);
        ctx.record(TraceEvent::MessageDelivered { to: self.id, msg });

        // an idle holder answers right away, bypassing the queue
        if ctx.holds_token(self.id) && !self.in_cs() && ctx.token().is_outstanding(src, self.rn[src]) {
            ctx.send_token(self.id, src, GrantPath::Direct, self.rn[src]);
        }
    }

    /// The token landed here.
    pub fn on_token(&mut self, ctx: &mut Context<'_>) {
        if self.state == ProcState::Requesting {
            self.state = ProcState::Idle;
        }
        self.enter_cs(ctx);
    }

    pub fn on_tick(&mut self, ctx: &mut Context<'_>) {
        if let ProcState::InCs(remaining) = self.state {
            let remaining = remaining.saturating_sub(1);
            if remaining == 0 {
                self.exit_cs(ctx);
            } else {
                self.state = ProcState::InCs(remaining);
            }
        }
    }
}
