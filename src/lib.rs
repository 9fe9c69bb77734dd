//! # Esox.ConnPool
//!
//! Fixed-capacity, thread-safe connection pool for Rust.
//!
//! ## Features
//!
//! - All connections opened up front, closed together on drop
//! - Blocking `acquire` that waits for a release, never fails
//! - LIFO reuse: the most recently released connection goes out first
//! - Automatic return of connections via RAII (Drop trait)
//! - Construction hooks for the first connection and for every connection
//! - Rollback of already opened connections when construction fails
//! - Bounded and async acquisition with timeout
//! - Health monitoring and metrics
//! - Prometheus metrics export
//! - SQLite support through `rusqlite` (`sqlite` feature)
//!
//! ## Quick Start
//!
//! ```rust
//! use esox_connpool::{Connection, ConnectionPool, PoolConfiguration};
//!
//! struct Session;
//!
//! impl Connection for Session {
//!     type Spec = ();
//!     type Error = std::io::Error;
//!     fn open(_: &()) -> Result<Self, Self::Error> { Ok(Session) }
//!     fn close(self) {}
//! }
//!
//! let config = PoolConfiguration::new().with_capacity(4);
//! let pool = ConnectionPool::<Session>::new(&(), config).unwrap();
//! {
//!     let conn = pool.acquire();
//!     println!("Got connection {}", conn.id());
//!     // Connection automatically returned when `conn` goes out of scope
//! }
//! ```

mod pool;
mod config;
mod connection;
mod metrics;
mod health;
mod ledger;
mod errors;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use pool::{ConnectionPool, PooledConnection};
pub use config::{ConnectionHook, PoolConfiguration};
pub use connection::Connection;
pub use metrics::PoolMetrics;
#[cfg(feature = "metrics")]
pub use metrics::MetricsExporter;
pub use health::HealthStatus;
pub use errors::{BoxError, HookKind, PoolError, PoolResult};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteSpec;
