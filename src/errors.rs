//! Error types for the connection pool

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Boxed error coming from the connection collaborator or a hook
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Which construction hook produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    /// Runs once, on the first connection only
    FirstConnection,

    /// Runs on every connection, including the first
    EveryConnection,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookKind::FirstConnection => f.write_str("on_first_connection"),
            HookKind::EveryConnection => f.write_str("on_connection"),
        }
    }
}

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Pool capacity must be at least 1")]
    InvalidCapacity,

    #[error("Failed to open connection {index}")]
    Open {
        index: usize,
        #[source]
        source: BoxError,
    },

    #[error("{hook} hook failed for connection {index}")]
    Hook {
        index: usize,
        hook: HookKind,
        #[source]
        source: BoxError,
    },

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Pool has been closed")]
    PoolClosed,

    #[cfg(feature = "metrics")]
    #[error("Metrics export failed: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl PoolError {
    pub(crate) fn open<E>(index: usize, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        PoolError::Open {
            index,
            source: Box::new(source),
        }
    }

    pub(crate) fn hook<E>(index: usize, hook: HookKind, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        PoolError::Hook {
            index,
            hook,
            source: Box::new(source),
        }
    }

    /// Index of the connection that failed during construction, if any
    pub fn connection_index(&self) -> Option<usize> {
        match self {
            PoolError::Open { index, .. } | PoolError::Hook { index, .. } => Some(*index),
            _ => None,
        }
    }
}

pub type PoolResult<T> = Result<T, PoolError>;
