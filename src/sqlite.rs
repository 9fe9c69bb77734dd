//! SQLite connections for the pool, backed by `rusqlite`

use std::path::{Path, PathBuf};

use rusqlite::OpenFlags;
use tracing::{debug, warn};

use crate::connection::Connection;

/// How to open each pooled SQLite connection
///
/// # Examples
///
/// ```
/// use esox_connpool::{ConnectionPool, PoolConfiguration, SqliteSpec};
///
/// let config = PoolConfiguration::<rusqlite::Connection>::new()
///     .with_capacity(2)
///     .with_on_connection(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
///
/// let pool = ConnectionPool::new(&SqliteSpec::memory(), config).unwrap();
/// let conn = pool.acquire();
/// let enabled: i64 = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0)).unwrap();
/// assert_eq!(enabled, 1);
/// ```
#[derive(Debug, Clone)]
pub struct SqliteSpec {
    pub path: PathBuf,
    pub flags: OpenFlags,
}

impl SqliteSpec {
    /// Open (creating if missing) the database file at `path`
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            flags: OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        }
    }

    /// Private in-memory database; every pooled connection gets its own
    pub fn memory() -> Self {
        Self::file(":memory:")
    }

    /// Replace the open flags
    pub fn with_flags(mut self, flags: OpenFlags) -> Self {
        self.flags = flags;
        self
    }
}

impl Connection for rusqlite::Connection {
    type Spec = SqliteSpec;
    type Error = rusqlite::Error;

    fn open(spec: &SqliteSpec) -> Result<Self, Self::Error> {
        debug!(path = %spec.path.display(), "opening SQLite connection");
        rusqlite::Connection::open_with_flags(&spec.path, spec.flags)
    }

    fn close(self) {
        if let Err((_, err)) = rusqlite::Connection::close(self) {
            warn!(error = %err, "failed to close SQLite connection");
        }
    }
}
