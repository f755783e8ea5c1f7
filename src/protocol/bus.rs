// broadcast medium with a fixed one-hop delay, built on a timestamp-ordered heap

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use log::debug;

use super::common::*;

/// A request copy addressed to one process, waiting for its delivery tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingDelivery {
    pub dest: ProcId,
    pub msg: RequestMessage,
    pub deliver_at: Tick,
}

/*
    the heap pops the smallest (deliver_at, source, ord). ord is a monotonic
    issue counter, so copies of one broadcast keep ascending destination order
    and a sender's messages never overtake each other.
 */

struct Timed {
    delivery: PendingDelivery,
    ord: u64,
}

impl Timed {
    fn key(&self) -> (Tick, ProcId, u64) {
        (self.delivery.deliver_at, self.delivery.msg.source, self.ord)
    }
}

impl Eq for Timed {}

impl PartialEq for Timed {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Ord for Timed {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed, BinaryHeap is a max-heap
        other.key().cmp(&self.key())
    }
}

impl PartialOrd for Timed {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub struct Bus {
    num_procs: usize,
    q: BinaryHeap<Timed>,
    ord_ctr: u64,
}

impl Bus {
    pub fn new(num_procs: usize) -> Self {
        Bus {
            num_procs,
            q: BinaryHeap::new(),
            ord_ctr: 0,
        }
    }

    /// Buffers one copy of `msg` for every process except `sender`, due one hop after `now`.
    pub fn broadcast(&mut self, sender: ProcId, msg: RequestMessage, now: Tick) {
        let deliver_at = now + timing::REQUEST_HOP;
        for dest in (0..self.num_procs).filter(|&d| d != sender) {
            self.q.push(Timed {
                delivery: PendingDelivery { dest, msg, deliver_at },
                ord: self.ord_ctr,
            });
            self.ord_ctr += 1;
        }
        debug!("bus: {} from {} buffered for t={}", msg, sender, deliver_at);
    }

    /// Removes and returns everything due at or before `now`, in delivery order.
    pub fn take_due(&mut self, now: Tick) -> Vec<PendingDelivery> {
        let mut due = Vec::new();
        while let Some(next) = self.q.peek() {
            if next.delivery.deliver_at > now {
                break;
            }
            if let Some(timed) = self.q.pop() {
                due.push(timed.delivery);
            }
        }
        due
    }

    pub fn is_empty(&self) -> bool {
        self.q.is_empty()
    }

    pub fn len(&self) -> usize {
        self.q.len()
    }

    /// Buffered deliveries in delivery order, without consuming them.
    pub fn pending(&self) -> Vec<PendingDelivery> {
        let mut all = self.q.iter().collect::<Vec<_>>();
        all.sort_by(|a, b| b.cmp(a));
        all.into_iter().map(|t| t.delivery).collect()
    }
}
