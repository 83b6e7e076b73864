//! Priority-ordered waiting list for calls blocked on the budget.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::application::ports::CallPriority;

#[derive(Debug, PartialEq, Eq)]
struct Ticket {
    priority: CallPriority,
    sequence: u64,
}

impl Ord for Ticket {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher priority first, then FIFO within a priority
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for Ticket {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Waiting tickets; the heap top is the next call allowed to dispatch.
#[derive(Debug, Default)]
pub(super) struct CallQueue {
    heap: BinaryHeap<Ticket>,
    next_sequence: u64,
}

impl CallQueue {
    pub(super) fn push(&mut self, priority: CallPriority) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(Ticket { priority, sequence });
        sequence
    }

    pub(super) fn head(&self) -> Option<u64> {
        self.heap.peek().map(|t| t.sequence)
    }

    pub(super) fn remove(&mut self, sequence: u64) {
        self.heap.retain(|t| t.sequence != sequence);
    }

    pub(super) fn len(&self) -> usize {
        self.heap.len()
    }
}
