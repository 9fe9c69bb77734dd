//! The connection collaborator consumed by the pool

/// A database session the pool can open and close.
///
/// The pool never looks inside a connection. It only sequences the
/// lifetime: every connection is opened by [`Connection::open`] during pool
/// construction and handed back to [`Connection::close`] exactly once.
///
/// A connection is never used by two holders at the same time, so
/// implementations do not need interior synchronisation. Closing two
/// *different* connections from two threads must be supported.
///
/// # Examples
///
/// ```
/// use esox_connpool::Connection;
///
/// struct Session {
///     dsn: String,
/// }
///
/// impl Connection for Session {
///     type Spec = String;
///     type Error = std::io::Error;
///
///     fn open(spec: &String) -> Result<Self, Self::Error> {
///         Ok(Session { dsn: spec.clone() })
///     }
///
///     fn close(self) {}
/// }
///
/// let session = Session::open(&"memory".to_string()).unwrap();
/// assert_eq!(session.dsn, "memory");
/// ```
pub trait Connection: Send + Sized + 'static {
    /// Parameters needed to open one connection (path, flags, ...)
    type Spec;

    /// Error reported by `open` and by construction hooks
    type Error: std::error::Error + Send + Sync + 'static;

    /// Open a new connection
    fn open(spec: &Self::Spec) -> Result<Self, Self::Error>;

    /// Close the connection, releasing its resources
    fn close(self);
}
