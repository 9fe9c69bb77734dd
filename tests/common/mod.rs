//! Mock connection shared by the integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use esox_connpool::Connection;
use parking_lot::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
#[error("mock open failed for connection {0}")]
pub struct MockError(pub usize);

/// Records every open and close so tests can check the pool's bookkeeping
#[derive(Default)]
pub struct Journal {
    next_serial: AtomicUsize,
    pub opened: Mutex<Vec<usize>>,
    pub closed: Mutex<Vec<(usize, usize)>>,
}

impl Journal {
    pub fn opened(&self) -> Vec<usize> {
        self.opened.lock().clone()
    }

    pub fn closed_serials(&self) -> Vec<usize> {
        let mut serials: Vec<_> = self.closed.lock().iter().map(|(serial, _)| *serial).collect();
        serials.sort_unstable();
        serials
    }

    /// Sum of the per-connection use counters reported at close
    pub fn total_uses(&self) -> usize {
        self.closed.lock().iter().map(|(_, uses)| *uses).sum()
    }
}

pub struct MockSpec {
    pub journal: Arc<Journal>,
    /// Zero-based serial of the open call that should fail
    pub fail_at: Option<usize>,
}

impl MockSpec {
    pub fn new() -> Self {
        Self {
            journal: Arc::new(Journal::default()),
            fail_at: None,
        }
    }

    pub fn failing_at(serial: usize) -> Self {
        Self {
            fail_at: Some(serial),
            ..Self::new()
        }
    }
}

pub struct MockConnection {
    pub serial: usize,
    pub uses: usize,
    pub in_use: AtomicBool,
    journal: Arc<Journal>,
}

impl MockConnection {
    /// Mark the connection as held, panicking if someone else already holds it
    pub fn enter(&self) {
        assert!(
            !self.in_use.swap(true, Ordering::SeqCst),
            "connection {} held by two callers",
            self.serial
        );
    }

    pub fn exit(&self) {
        self.in_use.store(false, Ordering::SeqCst);
    }
}

impl Connection for MockConnection {
    type Spec = MockSpec;
    type Error = MockError;

    fn open(spec: &MockSpec) -> Result<Self, MockError> {
        let serial = spec.journal.next_serial.fetch_add(1, Ordering::SeqCst);
        if spec.fail_at == Some(serial) {
            return Err(MockError(serial));
        }
        spec.journal.opened.lock().push(serial);

        Ok(MockConnection {
            serial,
            uses: 0,
            in_use: AtomicBool::new(false),
            journal: Arc::clone(&spec.journal),
        })
    }

    fn close(self) {
        self.journal.closed.lock().push((self.serial, self.uses));
    }
}
