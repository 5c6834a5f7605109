//! # Server Metrics
//!
//! Cheap atomic counters plus a fixed-bucket latency histogram, recorded
//! around every dispatched command and read as point-in-time snapshots.
//!
//! Counters use relaxed ordering: the fields are independent and only
//! need eventual consistency, so record calls stay allocation-free and
//! off the critical path.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Latency bucket upper bounds in microseconds. The histogram keeps one
/// extra overflow bucket past the last bound.
pub const LATENCY_BUCKETS_US: [u64; 12] =
    [1, 2, 5, 10, 20, 50, 100, 200, 500, 1_000, 2_000, 5_000];

/// Aggregated request counters for the server.
pub struct Metrics {
    requests_total: AtomicU64,
    errors_total: AtomicU64,
    inflight: AtomicU64,
    latency: LatencyHistogram,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics {
            requests_total: AtomicU64::new(0),
            errors_total: AtomicU64::new(0),
            inflight: AtomicU64::new(0),
            latency: LatencyHistogram::new(&LATENCY_BUCKETS_US),
        }
    }

    /// Call when a request has been parsed off the wire.
    pub fn record_request_start(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        self.inflight.fetch_add(1, Ordering::Relaxed);
    }

    /// Call once the reply has been produced.
    pub fn record_request_end(&self, latency: Duration) {
        self.inflight.fetch_sub(1, Ordering::Relaxed);
        self.latency.record(latency);
    }

    /// Call for every `-ERR` reply.
    pub fn record_error(&self) {
        self.errors_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time view of all counters and histogram buckets.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            errors_total: self.errors_total.load(Ordering::Relaxed),
            inflight: self.inflight.load(Ordering::Relaxed),
            latency: self.latency.snapshot(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of all server metrics at a point in time.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub errors_total: u64,
    pub inflight: u64,
    pub latency: LatencySnapshot,
}

/// Snapshot of the latency histogram.
#[derive(Debug, Clone)]
pub struct LatencySnapshot {
    /// Bucket upper bounds in microseconds.
    pub bounds_us: Vec<u64>,
    /// Bucket counts; the last entry is the overflow bucket.
    pub buckets: Vec<u64>,
    pub samples: u64,
    pub sum_us: u64,
}

/// Histogram with static bounds; bucket selection is a short linear scan
/// over a list that stays hot in cache.
struct LatencyHistogram {
    bounds_us: &'static [u64],
    buckets: Vec<AtomicU64>,
    samples: AtomicU64,
    sum_us: AtomicU64,
}

impl LatencyHistogram {
    fn new(bounds_us: &'static [u64]) -> Self {
        let buckets = (0..=bounds_us.len()).map(|_| AtomicU64::new(0)).collect();
        LatencyHistogram {
            bounds_us,
            buckets,
            samples: AtomicU64::new(0),
            sum_us: AtomicU64::new(0),
        }
    }

    fn record(&self, latency: Duration) {
        let micros = latency.as_micros() as u64;
        self.samples.fetch_add(1, Ordering::Relaxed);
        self.sum_us.fetch_add(micros, Ordering::Relaxed);

        let index = self
            .bounds_us
            .iter()
            .position(|&bound| micros <= bound)
            .unwrap_or(self.bounds_us.len());
        self.buckets[index].fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> LatencySnapshot {
        LatencySnapshot {
            bounds_us: self.bounds_us.to_vec(),
            buckets: self
                .buckets
                .iter()
                .map(|bucket| bucket.load(Ordering::Relaxed))
                .collect(),
            samples: self.samples.load(Ordering::Relaxed),
            sum_us: self.sum_us.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_requests_and_errors() {
        let metrics = Metrics::new();
        metrics.record_request_start();
        metrics.record_error();
        metrics.record_request_end(Duration::from_micros(3));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests_total, 1);
        assert_eq!(snapshot.errors_total, 1);
        assert_eq!(snapshot.inflight, 0);
        assert_eq!(snapshot.latency.samples, 1);
        assert_eq!(snapshot.latency.sum_us, 3);
    }

    #[test]
    fn inflight_tracks_open_requests() {
        let metrics = Metrics::new();
        metrics.record_request_start();
        metrics.record_request_start();
        assert_eq!(metrics.snapshot().inflight, 2);
        metrics.record_request_end(Duration::ZERO);
        assert_eq!(metrics.snapshot().inflight, 1);
    }

    #[test]
    fn latency_lands_in_the_right_bucket() {
        let metrics = Metrics::new();
        metrics.record_request_start();
        // 3us: bounds are [1, 2, 5, ...], so index 2.
        metrics.record_request_end(Duration::from_micros(3));

        let latency = metrics.snapshot().latency;
        assert_eq!(latency.buckets[2], 1);
        assert_eq!(latency.buckets.len(), LATENCY_BUCKETS_US.len() + 1);
    }

    #[test]
    fn oversized_latency_lands_in_the_overflow_bucket() {
        let metrics = Metrics::new();
        metrics.record_request_start();
        metrics.record_request_end(Duration::from_secs(1));

        let latency = metrics.snapshot().latency;
        assert_eq!(latency.buckets[LATENCY_BUCKETS_US.len()], 1);
    }
}
