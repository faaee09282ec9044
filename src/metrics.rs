//! Metrics collection and export for connection pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Metrics snapshot for a pool
///
/// # Examples
///
/// ```
/// use pooled::{ConnectionPool, PoolConfig, ConnectionFactory, FactoryError};
///
/// struct Ints;
/// impl ConnectionFactory for Ints {
///     type Connection = i32;
///     fn connect(&self) -> Result<i32, FactoryError> { Ok(7) }
///     fn disconnect(&self, _conn: &i32) {}
/// }
///
/// let pool = ConnectionPool::new(Ints, PoolConfig::default());
/// let conn = pool.checkout().unwrap();
///
/// let metrics = pool.get_metrics();
/// assert_eq!(metrics.total_checkouts, 1);
/// assert_eq!(metrics.checked_out, 1);
/// # pool.checkin(&conn);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "metrics", derive(serde::Serialize))]
pub struct PoolMetrics {
    /// Total successful checkouts
    pub total_checkouts: usize,

    /// Total connections checked back in
    pub total_checkins: usize,

    /// Connections opened via the factory
    pub connections_opened: usize,

    /// Connections closed and removed from the pool
    pub connections_closed: usize,

    /// Checkouts that failed with an acquisition timeout
    pub acquisition_timeouts: usize,

    /// Reservations reclaimed from dead callers
    pub stale_reclaimed: usize,

    /// Connections currently checked out
    pub checked_out: usize,

    /// Connections currently idle in the pool
    pub idle_connections: usize,

    /// Connections currently tracked (checked out + idle)
    pub tracked_connections: usize,

    /// Configured maximum pool size
    pub max_size: usize,

    /// Pool utilization ratio (0.0 to 1.0)
    pub utilization: f64,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("total_checkouts".to_string(), self.total_checkouts.to_string());
        metrics.insert("total_checkins".to_string(), self.total_checkins.to_string());
        metrics.insert("connections_opened".to_string(), self.connections_opened.to_string());
        metrics.insert("connections_closed".to_string(), self.connections_closed.to_string());
        metrics.insert("acquisition_timeouts".to_string(), self.acquisition_timeouts.to_string());
        metrics.insert("stale_reclaimed".to_string(), self.stale_reclaimed.to_string());
        metrics.insert("checked_out".to_string(), self.checked_out.to_string());
        metrics.insert("idle_connections".to_string(), self.idle_connections.to_string());
        metrics.insert("tracked_connections".to_string(), self.tracked_connections.to_string());
        metrics.insert("max_size".to_string(), self.max_size.to_string());
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization));
        metrics
    }
}

/// Metrics exporter for Prometheus format
#[derive(Debug)]
pub struct MetricsExporter;

impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    ///
    /// # Examples
    ///
    /// ```
    /// use pooled::{ConnectionPool, PoolConfig, ConnectionFactory, FactoryError};
    /// use std::collections::HashMap;
    ///
    /// struct Ints;
    /// impl ConnectionFactory for Ints {
    ///     type Connection = i32;
    ///     fn connect(&self) -> Result<i32, FactoryError> { Ok(7) }
    ///     fn disconnect(&self, _conn: &i32) {}
    /// }
    ///
    /// let pool = ConnectionPool::new(Ints, PoolConfig::default());
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("service".to_string(), "api".to_string());
    ///
    /// let output = pool.export_metrics_prometheus("main_db", Some(&tags));
    /// assert!(output.contains("pooled_connections_checked_out"));
    /// assert!(output.contains("service=\"api\""));
    /// ```
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        let mut output = String::new();
        let labels = Self::format_labels(pool_name, tags);

        // Gauge metrics
        output.push_str("# HELP pooled_connections_checked_out Connections currently checked out\n");
        output.push_str("# TYPE pooled_connections_checked_out gauge\n");
        output.push_str(&format!("pooled_connections_checked_out{{{}}} {}\n", labels, metrics.checked_out));

        output.push_str("# HELP pooled_connections_idle Connections currently idle\n");
        output.push_str("# TYPE pooled_connections_idle gauge\n");
        output.push_str(&format!("pooled_connections_idle{{{}}} {}\n", labels, metrics.idle_connections));

        output.push_str("# HELP pooled_utilization Pool utilization ratio\n");
        output.push_str("# TYPE pooled_utilization gauge\n");
        output.push_str(&format!("pooled_utilization{{{}}} {:.2}\n", labels, metrics.utilization));

        // Counter metrics
        output.push_str("# HELP pooled_checkouts_total Total successful checkouts\n");
        output.push_str("# TYPE pooled_checkouts_total counter\n");
        output.push_str(&format!("pooled_checkouts_total{{{}}} {}\n", labels, metrics.total_checkouts));

        output.push_str("# HELP pooled_checkins_total Total checkins\n");
        output.push_str("# TYPE pooled_checkins_total counter\n");
        output.push_str(&format!("pooled_checkins_total{{{}}} {}\n", labels, metrics.total_checkins));

        output.push_str("# HELP pooled_connections_opened_total Connections opened\n");
        output.push_str("# TYPE pooled_connections_opened_total counter\n");
        output.push_str(&format!("pooled_connections_opened_total{{{}}} {}\n", labels, metrics.connections_opened));

        output.push_str("# HELP pooled_connections_closed_total Connections closed\n");
        output.push_str("# TYPE pooled_connections_closed_total counter\n");
        output.push_str(&format!("pooled_connections_closed_total{{{}}} {}\n", labels, metrics.connections_closed));

        output.push_str("# HELP pooled_acquisition_timeouts_total Checkouts that timed out\n");
        output.push_str("# TYPE pooled_acquisition_timeouts_total counter\n");
        output.push_str(&format!("pooled_acquisition_timeouts_total{{{}}} {}\n", labels, metrics.acquisition_timeouts));

        output.push_str("# HELP pooled_stale_reclaimed_total Reservations reclaimed from dead callers\n");
        output.push_str("# TYPE pooled_stale_reclaimed_total counter\n");
        output.push_str(&format!("pooled_stale_reclaimed_total{{{}}} {}\n", labels, metrics.stale_reclaimed));

        output
    }

    fn format_labels(pool_name: &str, tags: Option<&HashMap<String, String>>) -> String {
        let mut labels = vec![format!("pool=\"{}\"", pool_name)];
        if let Some(tags) = tags {
            let mut sorted: Vec<_> = tags.iter().collect();
            sorted.sort_by_key(|(k, _)| k.as_str());
            for (key, value) in sorted {
                labels.push(format!("{}=\"{}\"", key, value));
            }
        }
        labels.join(",")
    }
}

/// Internal counter block shared by all checkout/checkin paths
pub(crate) struct MetricsTracker {
    pub total_checkouts: AtomicUsize,
    pub total_checkins: AtomicUsize,
    pub connections_opened: AtomicUsize,
    pub connections_closed: AtomicUsize,
    pub acquisition_timeouts: AtomicUsize,
    pub stale_reclaimed: AtomicUsize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self {
            total_checkouts: AtomicUsize::new(0),
            total_checkins: AtomicUsize::new(0),
            connections_opened: AtomicUsize::new(0),
            connections_closed: AtomicUsize::new(0),
            acquisition_timeouts: AtomicUsize::new(0),
            stale_reclaimed: AtomicUsize::new(0),
        }
    }

    pub fn get_metrics(
        &self,
        checked_out: usize,
        idle: usize,
        tracked: usize,
        max_size: usize,
    ) -> PoolMetrics {
        let utilization = if max_size > 0 {
            checked_out as f64 / max_size as f64
        } else {
            0.0
        };

        PoolMetrics {
            total_checkouts: self.total_checkouts.load(Ordering::Relaxed),
            total_checkins: self.total_checkins.load(Ordering::Relaxed),
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            connections_closed: self.connections_closed.load(Ordering::Relaxed),
            acquisition_timeouts: self.acquisition_timeouts.load(Ordering::Relaxed),
            stale_reclaimed: self.stale_reclaimed.load(Ordering::Relaxed),
            checked_out,
            idle_connections: idle,
            tracked_connections: tracked,
            max_size,
            utilization,
        }
    }
}

impl Default for MetricsTracker {
    fn default() -> Self {
        Self::new()
    }
}
