//! Metrics collection and export for connection pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(feature = "metrics")]
use crate::errors::PoolResult;

/// Point-in-time metrics for a pool
///
/// # Examples
///
/// ```
/// use esox_connpool::{Connection, ConnectionPool, PoolConfiguration};
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
/// let config = PoolConfiguration::new().with_capacity(3);
/// let pool = ConnectionPool::<Session>::new(&(), config).unwrap();
///
/// {
///     let _conn = pool.acquire();
///     let metrics = pool.get_metrics();
///     assert_eq!(metrics.total_acquired, 1);
///     assert_eq!(metrics.checked_out, 1);
///     assert_eq!(metrics.available, 2);
/// }
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "metrics", derive(serde::Serialize))]
pub struct PoolMetrics {
    /// Total connections handed out
    pub total_acquired: usize,

    /// Total connections given back
    pub total_released: usize,

    /// Acquisitions that had to wait for a release
    pub wait_events: usize,

    /// Bounded acquisitions that gave up
    pub timeouts: usize,

    /// Connections currently available
    pub available: usize,

    /// Connections currently checked out
    pub checked_out: usize,

    /// Callers currently blocked waiting for a connection
    pub waiting: usize,

    /// Pool utilization ratio (0.0 to 1.0)
    pub utilization: f64,

    /// Fixed pool capacity
    pub capacity: usize,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("total_acquired".to_string(), self.total_acquired.to_string());
        metrics.insert("total_released".to_string(), self.total_released.to_string());
        metrics.insert("wait_events".to_string(), self.wait_events.to_string());
        metrics.insert("timeouts".to_string(), self.timeouts.to_string());
        metrics.insert("available".to_string(), self.available.to_string());
        metrics.insert("checked_out".to_string(), self.checked_out.to_string());
        metrics.insert("waiting".to_string(), self.waiting.to_string());
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization));
        metrics.insert("capacity".to_string(), self.capacity.to_string());
        metrics
    }
}

/// Metrics exporter for Prometheus format
#[cfg(feature = "metrics")]
pub struct MetricsExporter;

#[cfg(feature = "metrics")]
impl MetricsExporter {
    /// Export metrics in Prometheus text exposition format
    ///
    /// Every series carries a `pool` label plus any extra `tags`.
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_connpool::{MetricsExporter, PoolMetrics};
    /// use std::collections::HashMap;
    ///
    /// let metrics = PoolMetrics {
    ///     total_acquired: 10,
    ///     total_released: 9,
    ///     wait_events: 2,
    ///     timeouts: 0,
    ///     available: 3,
    ///     checked_out: 1,
    ///     waiting: 0,
    ///     utilization: 0.25,
    ///     capacity: 4,
    /// };
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("service".to_string(), "api".to_string());
    ///
    /// let output = MetricsExporter::export_prometheus(&metrics, "main", Some(&tags))
    ///     .unwrap();
    /// assert!(output.contains("connpool_connections_checked_out"));
    /// assert!(output.contains("service=\"api\""));
    /// ```
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> PoolResult<String> {
        use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Registry, TextEncoder};

        let registry = Registry::new_custom(
            Some("connpool".to_string()),
            Some(Self::labels(pool_name, tags)),
        )?;

        let gauges = [
            (
                "connections_available",
                "Current available connections",
                metrics.available,
            ),
            (
                "connections_checked_out",
                "Current checked out connections",
                metrics.checked_out,
            ),
            (
                "callers_waiting",
                "Callers blocked waiting for a connection",
                metrics.waiting,
            ),
            ("capacity", "Fixed pool capacity", metrics.capacity),
        ];
        for (name, help, value) in gauges {
            let gauge = IntGauge::new(name, help)?;
            gauge.set(value as i64);
            registry.register(Box::new(gauge))?;
        }

        let utilization = Gauge::new("utilization", "Pool utilization ratio")?;
        utilization.set(metrics.utilization);
        registry.register(Box::new(utilization))?;

        let counters = [
            (
                "acquired_total",
                "Total connections acquired",
                metrics.total_acquired,
            ),
            (
                "released_total",
                "Total connections released",
                metrics.total_released,
            ),
            (
                "wait_events_total",
                "Acquisitions that had to wait",
                metrics.wait_events,
            ),
            (
                "timeouts_total",
                "Acquisitions that timed out",
                metrics.timeouts,
            ),
        ];
        for (name, help, value) in counters {
            let counter = IntCounter::new(name, help)?;
            counter.inc_by(value as u64);
            registry.register(Box::new(counter))?;
        }

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()).into())
    }

    fn labels(pool_name: &str, tags: Option<&HashMap<String, String>>) -> HashMap<String, String> {
        let mut labels = HashMap::new();
        labels.insert("pool".to_string(), pool_name.to_string());

        if let Some(tags) = tags {
            for (key, value) in tags {
                labels.insert(key.clone(), value.clone());
            }
        }

        labels
    }
}

/// Internal metrics tracker
pub(crate) struct MetricsTracker {
    total_acquired: AtomicUsize,
    total_released: AtomicUsize,
    wait_events: AtomicUsize,
    timeouts: AtomicUsize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self {
            total_acquired: AtomicUsize::new(0),
            total_released: AtomicUsize::new(0),
            wait_events: AtomicUsize::new(0),
            timeouts: AtomicUsize::new(0),
        }
    }

    pub fn record_acquired(&self, waited: bool) {
        self.total_acquired.fetch_add(1, Ordering::Relaxed);
        if waited {
            self.wait_events.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_released(&self) {
        self.total_released.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_metrics(
        &self,
        available: usize,
        checked_out: usize,
        waiting: usize,
        capacity: usize,
    ) -> PoolMetrics {
        let utilization = if capacity > 0 {
            checked_out as f64 / capacity as f64
        } else {
            0.0
        };

        PoolMetrics {
            total_acquired: self.total_acquired.load(Ordering::Relaxed),
            total_released: self.total_released.load(Ordering::Relaxed),
            wait_events: self.wait_events.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            available,
            checked_out,
            waiting,
            utilization,
            capacity,
        }
    }
}

impl Default for MetricsTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_counts() {
        let tracker = MetricsTracker::new();
        tracker.record_acquired(false);
        tracker.record_acquired(true);
        tracker.record_released();
        tracker.record_timeout();

        let metrics = tracker.get_metrics(3, 1, 0, 4);
        assert_eq!(metrics.total_acquired, 2);
        assert_eq!(metrics.wait_events, 1);
        assert_eq!(metrics.total_released, 1);
        assert_eq!(metrics.timeouts, 1);
        assert!((metrics.utilization - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_export_map() {
        let metrics = MetricsTracker::new().get_metrics(2, 2, 1, 4);
        let exported = metrics.export();

        assert_eq!(exported["utilization"], "0.50");
        assert_eq!(exported["waiting"], "1");
        assert_eq!(exported.len(), 9);
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn test_prometheus_export_labels_every_series() {
        let metrics = MetricsTracker::new().get_metrics(4, 0, 0, 4);
        let output = MetricsExporter::export_prometheus(&metrics, "primary", None).unwrap();

        assert!(output.contains("# TYPE connpool_acquired_total counter"));
        assert!(output.contains("connpool_connections_available{pool=\"primary\"} 4"));
        assert!(output.contains("connpool_capacity{pool=\"primary\"} 4"));
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn test_snapshot_serializes() {
        let metrics = MetricsTracker::new().get_metrics(1, 0, 0, 1);
        let json = serde_json::to_value(&metrics).unwrap();

        assert_eq!(json["capacity"], 1);
        assert_eq!(json["available"], 1);
    }
}
