use std::collections::{HashSet, VecDeque};

use super::common::*;

/// FIFO of process ids waiting for the token. An id is held at most once.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenQueue {
    q: VecDeque<ProcId>,
}

impl TokenQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `id` unless it is already waiting. Returns whether it was added.
    pub fn enqueue(&mut self, id: ProcId) -> bool {
        if self.contains(id) {
            return false;
        }
        self.q.push_back(id);
        true
    }

    pub fn dequeue(&mut self) -> Option<ProcId> {
        self.q.pop_front()
    }

    pub fn contains(&self, id: ProcId) -> bool {
        self.q.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.q.len()
    }

    pub fn is_empty(&self) -> bool {
        self.q.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProcId> {
        self.q.iter()
    }

    /// Ids that occur more than once. Always empty unless the queue was corrupted.
    pub fn duplicates(&self) -> Vec<ProcId> {
        let mut seen = HashSet::with_capacity(self.q.len());
        let mut reported = HashSet::new();
        let mut dups = Vec::new();
        for &id in &self.q {
            if !seen.insert(id) && reported.insert(id) {
                dups.push(id);
            }
        }
        dups
    }

    #[cfg(test)]
    pub(crate) fn push_unchecked(&mut self, id: ProcId) {
        self.q.push_back(id);
    }
}

/// The privilege. `ln[i]` is the serial of the request of `i` that was served last.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub ln: Vec<SeqNo>,
    pub q: TokenQueue,
}

impl Token {
    pub fn new(num_procs: usize) -> Self {
        Token {
            ln: vec![0; num_procs],
            q: TokenQueue::new(),
        }
    }

    /// `rn_j` is exactly one ahead of the last served request of `j`
    pub fn is_outstanding(&self, j: ProcId, rn_j: SeqNo) -> bool {
        rn_j == self.ln[j] + 1
    }
}

/// Holds the single token and the id of its owner.
///
/// Ownership is a plain state update of `holder`; processes never own the
/// token value itself. `holder` is `None` only while a hand-off is in flight
/// inside one simulation step.
#[derive(Debug)]
pub struct TokenCell {
    token: Token,
    holder: Option<ProcId>,
}

impl TokenCell {
    pub fn new(num_procs: usize, initial_holder: ProcId) -> Self {
        TokenCell {
            token: Token::new(num_procs),
            holder: Some(initial_holder),
        }
    }

    pub fn holder(&self) -> Option<ProcId> {
        self.holder
    }

    pub fn is_held_by(&self, id: ProcId) -> bool {
        self.holder == Some(id)
    }

    pub fn in_transit(&self) -> bool {
        self.holder.is_none()
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    /// Mutable access, granted to the current holder only.
    pub fn token_mut(&mut self, id: ProcId) -> Option<&mut Token> {
        if self.is_held_by(id) {
            Some(&mut self.token)
        } else {
            None
        }
    }

    /// Releases the token from `from`. Fails if `from` is not the holder.
    pub fn release(&mut self, from: ProcId) -> bool {
        if !self.is_held_by(from) {
            return false;
        }
        self.holder = None;
        true
    }

    /// Completes a hand-off started by `release`.
    pub fn land(&mut self, to: ProcId) -> bool {
        if self.holder.is_some() {
            return false;
        }
        self.holder = Some(to);
        true
    }

    #[cfg(test)]
    pub(crate) fn token_unchecked(&mut self) -> &mut Token {
        &mut self.token
    }
}
