//! Refresh statistics for the sensor.
//!
//! Tracks how refresh passes went: successes, failures, skipped calls,
//! rate anomalies, and running duration statistics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Running statistics for a single metric.
#[derive(Clone, Copy, Default)]
pub struct RunningStat {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    last: f64,
}

impl RunningStat {
    pub fn add(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
            self.last = value;
            self.sum = value;
            self.count = 1;
            return;
        }
        self.count += 1;
        self.sum += value;
        self.last = value;
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }

    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / (self.count as f64)
        }
    }
}

/// Thread-safe wrapper for running statistics.
#[derive(Default)]
pub struct Stat {
    inner: Mutex<RunningStat>,
}

/// Point-in-time copy of a `Stat`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatSnapshot {
    pub last: f64,
    pub avg: f64,
    pub max: f64,
    pub min: f64,
    pub count: u64,
}

impl Stat {
    pub fn add_sample(&self, value: f64) {
        if let Ok(mut s) = self.inner.lock() {
            s.add(value);
        }
    }

    pub fn snapshot(&self) -> StatSnapshot {
        if let Ok(s) = self.inner.lock() {
            StatSnapshot {
                last: s.last,
                avg: s.avg(),
                max: s.max,
                min: s.min,
                count: s.count,
            }
        } else {
            StatSnapshot::default()
        }
    }
}

/// Counters describing the refresh scheduler's behavior.
#[derive(Default)]
pub struct RefreshStats {
    pub refresh_duration_seconds: Stat,
    pub ports_sampled: Stat,
    pub refresh_success_count: AtomicU64,
    pub refresh_failure_count: AtomicU64,
    /// Update calls answered from a fresh cache.
    pub fresh_hits: AtomicU64,
    /// Update calls that found another refresh in progress.
    pub concurrent_skips: AtomicU64,
    pub rate_anomalies: AtomicU64,
}

impl RefreshStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, ports: usize, duration_seconds: f64) {
        self.refresh_success_count.fetch_add(1, Ordering::Relaxed);
        self.ports_sampled.add_sample(ports as f64);
        self.refresh_duration_seconds.add_sample(duration_seconds);
    }

    pub fn record_failure(&self, duration_seconds: f64) {
        self.refresh_failure_count.fetch_add(1, Ordering::Relaxed);
        self.refresh_duration_seconds.add_sample(duration_seconds);
    }

    pub fn record_fresh_hit(&self) {
        self.fresh_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_concurrent_skip(&self) {
        self.concurrent_skips.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_anomalies(&self, count: usize) {
        self.rate_anomalies.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn successes(&self) -> u64 {
        self.refresh_success_count.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.refresh_failure_count.load(Ordering::Relaxed)
    }

    pub fn anomalies(&self) -> u64 {
        self.rate_anomalies.load(Ordering::Relaxed)
    }
}
