//! Health monitoring for connection pools

use std::time::Duration;

/// Health status of a connection pool
///
/// # Examples
///
/// ```
/// use esox_connpool::HealthStatus;
/// use std::time::Duration;
///
/// let health = HealthStatus::new(3, 1, 4, 0, None, Duration::from_secs(60));
/// assert!(health.is_healthy());
/// assert_eq!(health.available_connections, 3);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "metrics", derive(serde::Serialize))]
pub struct HealthStatus {
    /// Whether the pool is healthy
    pub is_healthy: bool,

    /// Number of warnings detected
    pub warning_count: usize,

    /// Current pool utilization (0.0 to 1.0)
    pub utilization: f64,

    /// Available connections count
    pub available_connections: usize,

    /// Checked out connections count
    pub checked_out_connections: usize,

    /// Callers blocked in acquire
    pub waiting_callers: usize,

    /// Total capacity
    pub total_capacity: usize,

    /// Age of the oldest outstanding checkout
    pub longest_checkout: Option<Duration>,

    /// Warning messages
    pub warnings: Vec<String>,
}

impl HealthStatus {
    /// Create a new health status
    pub fn new(
        available: usize,
        checked_out: usize,
        capacity: usize,
        waiting: usize,
        longest_checkout: Option<Duration>,
        checkout_warn_threshold: Duration,
    ) -> Self {
        let utilization = if capacity > 0 {
            checked_out as f64 / capacity as f64
        } else {
            0.0
        };

        let mut warnings = Vec::new();
        let mut is_healthy = true;

        if utilization > 0.9 {
            warnings.push(format!("High utilization: {:.1}%", utilization * 100.0));
            is_healthy = false;
        }

        if available == 0 && waiting > 0 {
            warnings.push(format!("Pool exhausted with {} caller(s) waiting", waiting));
        }

        if let Some(held) = longest_checkout
            && held > checkout_warn_threshold
        {
            warnings.push(format!("Connection checked out for {:?}", held));
            is_healthy = false;
        }

        Self {
            is_healthy,
            warning_count: warnings.len(),
            utilization,
            available_connections: available,
            checked_out_connections: checked_out,
            waiting_callers: waiting,
            total_capacity: capacity,
            longest_checkout,
            warnings,
        }
    }

    /// Check if the pool is healthy
    pub fn is_healthy(&self) -> bool {
        self.is_healthy
    }
}
