use std::collections::HashMap;

use crate::command::sequence_greater_than;

/// Upper bound on out-of-order transactions held for one peer.
pub const MAX_PENDING_TRANSACTIONS: usize = 256;

#[derive(Debug, PartialEq, Eq)]
pub enum Offer {
    /// The item is next in line; call [`TransactionLane::pop_ready`].
    Ready,
    /// Held until the gap before it closes.
    Buffered,
    /// Already applied or already waiting.
    Duplicate,
}

/// Restores per-sender order of transactional commands. Sequences start at 0
/// and wrap.
#[derive(Debug)]
pub struct TransactionLane<T> {
    next: u32,
    pending: HashMap<u32, T>,
}

impl<T> Default for TransactionLane<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TransactionLane<T> {
    pub fn new() -> Self {
        Self {
            next: 0,
            pending: HashMap::new(),
        }
    }

    pub fn offer(&mut self, sequence: u32, item: T) -> Offer {
        if sequence != self.next && !sequence_greater_than(sequence, self.next) {
            return Offer::Duplicate;
        }
        if self.pending.contains_key(&sequence) {
            return Offer::Duplicate;
        }

        self.pending.insert(sequence, item);
        if sequence == self.next {
            return Offer::Ready;
        }

        if self.pending.len() > MAX_PENDING_TRANSACTIONS {
            self.skip_gap();
            if self.pending.contains_key(&self.next) {
                return Offer::Ready;
            }
        }
        Offer::Buffered
    }

    fn skip_gap(&mut self) {
        let next = self.next;
        if let Some(lowest) = self
            .pending
            .keys()
            .copied()
            .min_by_key(|seq| seq.wrapping_sub(next))
        {
            log::warn!(
                "Transaction lane overflow, skipping sequences {}..{}",
                self.next,
                lowest
            );
            self.next = lowest;
        }
    }

    /// Takes the next in-order item, if it has arrived.
    pub fn pop_ready(&mut self) -> Option<(u32, T)> {
        let sequence = self.next;
        let item = self.pending.remove(&sequence)?;
        self.next = self.next.wrapping_add(1);
        Some((sequence, item))
    }

    pub fn next_expected(&self) -> u32 {
        self.next
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
