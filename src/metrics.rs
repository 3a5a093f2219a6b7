//! Metrics collection for the Skylog client

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Client metrics collector
#[derive(Debug, Default)]
pub struct ClientMetrics {
    // Producer metrics
    pub records_sent: AtomicU64,
    pub bytes_sent: AtomicU64,
    pub send_errors: AtomicU64,
    pub send_latency_sum: AtomicU64,
    pub send_latency_count: AtomicU64,

    // Consumer metrics
    pub records_consumed: AtomicU64,
    pub bytes_consumed: AtomicU64,
    pub consume_errors: AtomicU64,
    pub poll_latency_sum: AtomicU64,
    pub poll_latency_count: AtomicU64,

    // Cancellation metrics
    pub wakeups_delivered: AtomicU64,
}

impl ClientMetrics {
    /// Record a successful send operation
    pub fn record_send(&self, record_count: u64, byte_count: u64, latency: Duration) {
        self.records_sent.fetch_add(record_count, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
        self.send_latency_sum
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
        self.send_latency_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a send error
    pub fn record_send_error(&self) {
        self.send_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful (non-empty) poll
    pub fn record_consume(&self, record_count: u64, byte_count: u64, latency: Duration) {
        self.records_consumed
            .fetch_add(record_count, Ordering::Relaxed);
        self.bytes_consumed.fetch_add(byte_count, Ordering::Relaxed);
        self.poll_latency_sum
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
        self.poll_latency_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a consume error
    pub fn record_consume_error(&self) {
        self.consume_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a delivered wakeup interruption
    pub fn record_wakeup(&self) {
        self.wakeups_delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Get average send latency in microseconds
    pub fn average_send_latency_us(&self) -> f64 {
        let sum = self.send_latency_sum.load(Ordering::Relaxed);
        let count = self.send_latency_count.load(Ordering::Relaxed);

        if count == 0 {
            0.0
        } else {
            sum as f64 / count as f64
        }
    }

    /// Get average poll latency in microseconds
    pub fn average_poll_latency_us(&self) -> f64 {
        let sum = self.poll_latency_sum.load(Ordering::Relaxed);
        let count = self.poll_latency_count.load(Ordering::Relaxed);

        if count == 0 {
            0.0
        } else {
            sum as f64 / count as f64
        }
    }

    /// Get snapshot of current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_sent: self.records_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
            average_send_latency_us: self.average_send_latency_us(),
            records_consumed: self.records_consumed.load(Ordering::Relaxed),
            bytes_consumed: self.bytes_consumed.load(Ordering::Relaxed),
            consume_errors: self.consume_errors.load(Ordering::Relaxed),
            average_poll_latency_us: self.average_poll_latency_us(),
            wakeups_delivered: self.wakeups_delivered.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub records_sent: u64,
    pub bytes_sent: u64,
    pub send_errors: u64,
    pub average_send_latency_us: f64,
    pub records_consumed: u64,
    pub bytes_consumed: u64,
    pub consume_errors: u64,
    pub average_poll_latency_us: f64,
    pub wakeups_delivered: u64,
}

/// Timing helper for measuring operation latency
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(self) -> Duration {
        self.start.elapsed()
    }
}

/// Global metrics instance
static GLOBAL_METRICS: once_cell::sync::Lazy<Arc<ClientMetrics>> =
    once_cell::sync::Lazy::new(|| Arc::new(ClientMetrics::default()));

/// Get the global metrics instance
pub fn global_metrics() -> Arc<ClientMetrics> {
    GLOBAL_METRICS.clone()
}
