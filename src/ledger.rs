//! Bookkeeping for connections currently lent out

use std::time::{Duration, Instant};

use dashmap::DashMap;

#[derive(Debug, Clone, Copy)]
struct CheckoutRecord {
    generation: u64,
    acquired_at: Instant,
}

/// Maps connection id to the checkout that currently holds it.
///
/// Each checkout of a connection bumps its generation, so a stale guard
/// (or a second release of the same checkout) never matches the record.
pub(crate) struct CheckoutLedger {
    records: DashMap<usize, CheckoutRecord>,
}

impl CheckoutLedger {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: DashMap::with_capacity(capacity),
        }
    }

    pub fn check_out(&self, id: usize, generation: u64) {
        let previous = self.records.insert(
            id,
            CheckoutRecord {
                generation,
                acquired_at: Instant::now(),
            },
        );
        debug_assert!(previous.is_none(), "connection {id} handed out twice");
    }

    /// Remove the record for `id`, returning how long it was held.
    ///
    /// `None` means the record was missing or belonged to another checkout.
    pub fn check_in(&self, id: usize, generation: u64) -> Option<Duration> {
        self.records
            .remove_if(&id, |_, record| record.generation == generation)
            .map(|(_, record)| record.acquired_at.elapsed())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Duration of the oldest outstanding checkout
    pub fn longest_held(&self) -> Option<Duration> {
        self.records
            .iter()
            .map(|entry| entry.value().acquired_at.elapsed())
            .max()
    }
}
