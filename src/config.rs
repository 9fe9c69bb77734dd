//! Pool configuration options

use std::fmt;
use std::time::Duration;

use crate::connection::Connection;
use crate::errors::{HookKind, PoolError, PoolResult};

/// Callback run against a freshly opened connection during construction
pub type ConnectionHook<C> =
    Box<dyn Fn(&mut C) -> Result<(), <C as Connection>::Error> + Send + Sync>;

/// Configuration for connection pool behavior
///
/// Everything here is fixed once the pool is built; the pool cannot be
/// resized afterwards.
///
/// # Examples
///
/// ```
/// use esox_connpool::{Connection, PoolConfiguration};
/// use std::time::Duration;
///
/// struct Session;
///
/// impl Connection for Session {
///     type Spec = ();
///     type Error = std::io::Error;
///     fn open(_: &()) -> Result<Self, Self::Error> { Ok(Session) }
///     fn close(self) {}
/// }
///
/// let config = PoolConfiguration::<Session>::new()
///     .with_capacity(8)
///     .with_acquire_timeout(Duration::from_secs(5))
///     .with_on_connection(|_session| Ok(()));
///
/// assert_eq!(config.capacity, 8);
/// assert_eq!(config.acquire_timeout, Duration::from_secs(5));
/// ```
pub struct PoolConfiguration<C: Connection> {
    /// Number of connections opened at construction and kept for the pool's lifetime
    pub capacity: usize,

    /// Timeout used by `acquire_async`
    pub acquire_timeout: Duration,

    /// Checkouts held longer than this are reported by the health status
    pub checkout_warn_threshold: Duration,

    /// Runs once, on the very first connection
    pub on_first_connection: Option<ConnectionHook<C>>,

    /// Runs on every connection, including the first
    pub on_connection: Option<ConnectionHook<C>>,
}

impl<C: Connection> Default for PoolConfiguration<C> {
    fn default() -> Self {
        Self {
            capacity: 4,
            acquire_timeout: Duration::from_secs(30),
            checkout_warn_threshold: Duration::from_secs(60),
            on_first_connection: None,
            on_connection: None,
        }
    }
}

impl<C: Connection> fmt::Debug for PoolConfiguration<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolConfiguration")
            .field("capacity", &self.capacity)
            .field("acquire_timeout", &self.acquire_timeout)
            .field("checkout_warn_threshold", &self.checkout_warn_threshold)
            .field("on_first_connection", &self.on_first_connection.is_some())
            .field("on_connection", &self.on_connection.is_some())
            .finish()
    }
}

impl<C: Connection> PoolConfiguration<C> {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of pooled connections
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the timeout for async acquisition
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Set the threshold after which a checkout is reported as long-held
    pub fn with_checkout_warn_threshold(mut self, threshold: Duration) -> Self {
        self.checkout_warn_threshold = threshold;
        self
    }

    /// Run `hook` on the first connection only, before `on_connection`
    ///
    /// Typical use is database-wide setup such as switching the journal mode.
    pub fn with_on_first_connection<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut C) -> Result<(), C::Error> + Send + Sync + 'static,
    {
        self.on_first_connection = Some(Box::new(hook));
        self
    }

    /// Run `hook` on every connection as it is opened
    pub fn with_on_connection<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut C) -> Result<(), C::Error> + Send + Sync + 'static,
    {
        self.on_connection = Some(Box::new(hook));
        self
    }

    /// Run the configured hooks for connection `index` in order
    pub(crate) fn run_hooks(&self, index: usize, conn: &mut C) -> PoolResult<()> {
        if index == 0
            && let Some(hook) = &self.on_first_connection
        {
            hook(conn).map_err(|e| PoolError::hook(index, HookKind::FirstConnection, e))?;
        }

        if let Some(hook) = &self.on_connection {
            hook(conn).map_err(|e| PoolError::hook(index, HookKind::EveryConnection, e))?;
        }

        Ok(())
    }
}
