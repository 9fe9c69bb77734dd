//! Core connection pool implementation

use crate::config::PoolConfiguration;
use crate::connection::Connection;
use crate::errors::{PoolError, PoolResult};
use crate::health::HealthStatus;
use crate::ledger::CheckoutLedger;
use crate::metrics::{MetricsTracker, PoolMetrics};
#[cfg(feature = "metrics")]
use crate::metrics::MetricsExporter;

use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// A connection owned by the pool, tagged with its identity
struct Slot<C> {
    id: usize,
    generation: u64,
    conn: C,
}

struct PoolState<C> {
    /// Idle connections; the top of the stack is the most recently released.
    /// `slots.len()` is the available count.
    slots: Vec<Slot<C>>,
    waiting: usize,
    closed: bool,
}

pub(crate) struct PoolShared<C: Connection> {
    state: Mutex<PoolState<C>>,
    available: Condvar,
    ledger: CheckoutLedger,
    metrics: MetricsTracker,
    capacity: usize,
    default_timeout: Duration,
    checkout_warn_threshold: Duration,
}

impl<C: Connection> PoolShared<C> {
    fn acquire(&self) -> Slot<C> {
        let mut state = self.state.lock();
        let mut waited_since = None;

        let slot = loop {
            if let Some(slot) = state.slots.pop() {
                break slot;
            }
            if waited_since.is_none() {
                waited_since = Some(Instant::now());
            }
            state.waiting += 1;
            self.available.wait(&mut state);
            state.waiting -= 1;
        };
        drop(state);

        self.check_out(slot, waited_since)
    }

    fn acquire_timeout(&self, timeout: Duration) -> PoolResult<Slot<C>> {
        // A timeout too large to represent as a deadline waits without one
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.state.lock();
        let mut waited_since = None;

        let slot = loop {
            if state.closed {
                return Err(PoolError::PoolClosed);
            }
            if let Some(slot) = state.slots.pop() {
                break slot;
            }
            if waited_since.is_none() {
                waited_since = Some(Instant::now());
            }
            state.waiting += 1;
            let timed_out = match deadline {
                Some(deadline) => self.available.wait_until(&mut state, deadline).timed_out(),
                None => {
                    self.available.wait(&mut state);
                    false
                }
            };
            state.waiting -= 1;

            if timed_out {
                if let Some(slot) = state.slots.pop() {
                    break slot;
                }
                drop(state);
                self.metrics.record_timeout();
                debug!(
                    timeout_ms = timeout.as_millis() as u64,
                    "timed out waiting for a connection"
                );
                return Err(PoolError::Timeout(timeout));
            }
        };
        drop(state);

        Ok(self.check_out(slot, waited_since))
    }

    fn try_acquire(&self) -> Option<Slot<C>> {
        let slot = self.state.lock().slots.pop()?;
        Some(self.check_out(slot, None))
    }

    fn check_out(&self, mut slot: Slot<C>, waited_since: Option<Instant>) -> Slot<C> {
        slot.generation += 1;
        self.ledger.check_out(slot.id, slot.generation);
        self.metrics.record_acquired(waited_since.is_some());

        if let Some(start) = waited_since {
            debug!(
                connection_id = slot.id,
                waited_ms = start.elapsed().as_millis() as u64,
                "acquired connection after waiting"
            );
        }
        slot
    }

    fn release(&self, slot: Slot<C>) {
        let held = self.ledger.check_in(slot.id, slot.generation);
        if held.is_none() {
            warn!(
                connection_id = slot.id,
                generation = slot.generation,
                "released connection has no matching checkout"
            );
        }
        debug_assert!(
            held.is_some(),
            "connection {} released without a matching checkout",
            slot.id
        );
        self.metrics.record_released();

        let mut state = self.state.lock();
        if state.closed {
            drop(state);
            debug!(connection_id = slot.id, "pool closed, closing returned connection");
            slot.conn.close();
            return;
        }
        state.slots.push(slot);
        debug_assert!(state.slots.len() <= self.capacity);
        drop(state);

        self.available.notify_one();
    }

    fn shutdown(&self) {
        let idle = {
            let mut state = self.state.lock();
            state.closed = true;
            std::mem::take(&mut state.slots)
        };
        self.available.notify_all();

        let outstanding = self.ledger.len();
        if outstanding > 0 {
            warn!(outstanding, "closing pool with connections still checked out");
        }

        for slot in idle {
            debug!(connection_id = slot.id, "closing connection");
            slot.conn.close();
        }
        info!(capacity = self.capacity, "connection pool closed");
    }

    /// Snapshot of (available, checked out, waiting).
    ///
    /// The checked out count comes from the ledger, so it can briefly lag
    /// the available count while a checkout or release is in flight.
    fn counts(&self) -> (usize, usize, usize) {
        let (available, waiting) = {
            let state = self.state.lock();
            (state.slots.len(), state.waiting)
        };
        (available, self.ledger.len(), waiting)
    }

    fn lend(self: &Arc<Self>, slot: Slot<C>) -> PooledConnection<C> {
        PooledConnection {
            slot: Some(slot),
            pool: Arc::downgrade(self),
        }
    }
}

/// A checked-out connection that returns to its pool when dropped
///
/// The guard holds only a weak back-reference to the pool. If the pool has
/// already been destroyed when the guard is released, the guard closes the
/// connection itself.
pub struct PooledConnection<C: Connection> {
    slot: Option<Slot<C>>,
    pool: Weak<PoolShared<C>>,
}

impl<C: Connection> PooledConnection<C> {
    /// Pool-assigned identity of this connection, in `0..capacity`
    pub fn id(&self) -> usize {
        self.slot.as_ref().map(|slot| slot.id).unwrap_or_default()
    }

    /// Return the connection to the pool it came from
    pub fn release(self) {
        drop(self);
    }

    fn belongs_to(&self, shared: &Arc<PoolShared<C>>) -> bool {
        std::ptr::eq(self.pool.as_ptr(), Arc::as_ptr(shared))
    }
}

impl<C: Connection> Deref for PooledConnection<C> {
    type Target = C;

    fn deref(&self) -> &Self::Target {
        &self.slot.as_ref().expect("Connection already released").conn
    }
}

impl<C: Connection> DerefMut for PooledConnection<C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.slot.as_mut().expect("Connection already released").conn
    }
}

impl<C: Connection> Drop for PooledConnection<C> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            match self.pool.upgrade() {
                Some(pool) => pool.release(slot),
                None => {
                    warn!(
                        connection_id = slot.id,
                        "pool destroyed before release, closing connection"
                    );
                    slot.conn.close();
                }
            }
        }
    }
}

/// Thread-safe pool with a fixed set of connections
///
/// All connections are opened up front and closed when the pool is
/// dropped. `acquire` hands out the most recently released connection
/// first and blocks while every connection is checked out.
///
/// # Examples
///
/// ```
/// use esox_connpool::{Connection, ConnectionPool, PoolConfiguration};
///
/// struct Session {
///     queries: usize,
/// }
///
/// impl Connection for Session {
///     type Spec = ();
///     type Error = std::io::Error;
///     fn open(_: &()) -> Result<Self, Self::Error> { Ok(Session { queries: 0 }) }
///     fn close(self) {}
/// }
///
/// let config = PoolConfiguration::new().with_capacity(2);
/// let pool = ConnectionPool::<Session>::new(&(), config).unwrap();
///
/// {
///     let mut conn = pool.acquire();
///     conn.queries += 1;
///     assert_eq!(pool.available_count(), 1);
/// }
///
/// assert_eq!(pool.available_count(), 2);
/// ```
pub struct ConnectionPool<C: Connection> {
    shared: Arc<PoolShared<C>>,
}

impl<C: Connection> ConnectionPool<C> {
    /// Open `config.capacity` connections and build the pool.
    ///
    /// Connections are opened one after another. For the first connection
    /// `on_first_connection` runs before `on_connection`; later connections
    /// run only `on_connection`. If any open or hook fails, every connection
    /// opened so far is closed and the error is returned.
    pub fn new(spec: &C::Spec, config: PoolConfiguration<C>) -> PoolResult<Self> {
        let capacity = config.capacity;
        if capacity == 0 {
            return Err(PoolError::InvalidCapacity);
        }

        let mut slots = Vec::with_capacity(capacity);
        for index in 0..capacity {
            match Self::open_connection(index, spec, &config) {
                Ok(conn) => {
                    debug!(index, "opened pooled connection");
                    slots.push(Slot {
                        id: index,
                        generation: 0,
                        conn,
                    });
                }
                Err(err) => {
                    warn!(
                        index,
                        opened = slots.len(),
                        error = %err,
                        "pool construction failed, rolling back"
                    );
                    for slot in slots {
                        slot.conn.close();
                    }
                    return Err(err);
                }
            }
        }

        info!(capacity, "connection pool opened");

        Ok(Self {
            shared: Arc::new(PoolShared {
                state: Mutex::new(PoolState {
                    slots,
                    waiting: 0,
                    closed: false,
                }),
                available: Condvar::new(),
                ledger: CheckoutLedger::new(capacity),
                metrics: MetricsTracker::new(),
                capacity,
                default_timeout: config.acquire_timeout,
                checkout_warn_threshold: config.checkout_warn_threshold,
            }),
        })
    }

    fn open_connection(
        index: usize,
        spec: &C::Spec,
        config: &PoolConfiguration<C>,
    ) -> PoolResult<C> {
        let mut conn = C::open(spec).map_err(|e| PoolError::open(index, e))?;

        if let Err(err) = config.run_hooks(index, &mut conn) {
            conn.close();
            return Err(err);
        }
        Ok(conn)
    }

    /// Get a connection, blocking until one is available
    ///
    /// Never fails. With every connection checked out this waits for as
    /// long as it takes another caller to release one.
    pub fn acquire(&self) -> PooledConnection<C> {
        let slot = self.shared.acquire();
        self.shared.lend(slot)
    }

    /// Get a connection, waiting at most `timeout`
    ///
    /// Unlike [`acquire`](Self::acquire) this can fail with
    /// [`PoolError::Timeout`], so callers lose the guarantee of eventually
    /// getting a connection.
    pub fn acquire_timeout(&self, timeout: Duration) -> PoolResult<PooledConnection<C>> {
        let slot = self.shared.acquire_timeout(timeout)?;
        Ok(self.shared.lend(slot))
    }

    /// Get a connection only if one is available right now
    pub fn try_acquire(&self) -> Option<PooledConnection<C>> {
        self.shared
            .try_acquire()
            .map(|slot| self.shared.lend(slot))
    }

    /// Get a connection asynchronously, bounded by the configured acquire timeout
    ///
    /// The wait runs on tokio's blocking pool. If this future is dropped
    /// before completion, a connection obtained in the meantime goes
    /// straight back to the pool.
    pub async fn acquire_async(&self) -> PoolResult<PooledConnection<C>> {
        let timeout = self.shared.default_timeout;
        let shared = Arc::clone(&self.shared);

        let task = tokio::task::spawn_blocking(move || {
            let slot = shared.acquire_timeout(timeout)?;
            Ok(shared.lend(slot))
        });

        match task.await {
            Ok(result) => result,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(_) => Err(PoolError::Cancelled),
        }
    }

    /// Return a connection to the pool
    ///
    /// Equivalent to dropping the guard. A guard from another pool is
    /// sent back to the pool it came from.
    pub fn release(&self, conn: PooledConnection<C>) {
        if !conn.belongs_to(&self.shared) {
            warn!(connection_id = conn.id(), "connection released to a pool that does not own it");
        }
        drop(conn);
    }

    /// Close every connection and destroy the pool
    ///
    /// Connections still checked out are closed when their guards are
    /// released.
    pub fn close(self) {
        drop(self);
    }

    /// Fixed number of connections in the pool
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Get available count
    pub fn available_count(&self) -> usize {
        self.shared.counts().0
    }

    /// Get checked out count
    pub fn checked_out_count(&self) -> usize {
        self.shared.counts().1
    }

    /// Number of callers currently blocked waiting for a connection
    pub fn waiting_count(&self) -> usize {
        self.shared.counts().2
    }

    /// Get pool metrics
    pub fn get_metrics(&self) -> PoolMetrics {
        let (available, checked_out, waiting) = self.shared.counts();
        self.shared
            .metrics
            .get_metrics(available, checked_out, waiting, self.shared.capacity)
    }

    /// Get health status
    pub fn get_health_status(&self) -> HealthStatus {
        let (available, checked_out, waiting) = self.shared.counts();
        HealthStatus::new(
            available,
            checked_out,
            self.shared.capacity,
            waiting,
            self.shared.ledger.longest_held(),
            self.shared.checkout_warn_threshold,
        )
    }

    /// Export metrics
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.get_metrics().export()
    }

    /// Export metrics in Prometheus format
    #[cfg(feature = "metrics")]
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> PoolResult<String> {
        MetricsExporter::export_prometheus(&self.get_metrics(), pool_name, tags)
    }
}

impl<C: Connection> Drop for ConnectionPool<C> {
    fn drop(&mut self) {
        self.shared.shutdown();
    }
}
