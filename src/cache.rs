//! Cache of derived port metrics.
//!
//! This module provides the `MetricsCache` structure holding the last
//! derived metric set per port together with the freshness bookkeeping the
//! refresh scheduler works against.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::REFRESH_MARGIN_SECS;
use crate::rates::DerivedMetricSet;

/// Port number → derived metrics of that port.
pub type PortMetrics = BTreeMap<String, DerivedMetricSet>;

/// Cache state for derived metrics with update timing information.
///
/// `ports` is only ever replaced as a whole, so a reader holding the `Arc`
/// never sees a mix of two refresh passes.
#[derive(Debug, Clone)]
pub struct MetricsCache {
    pub ports: Arc<PortMetrics>,
    /// Touched at the end of every update call, fresh or not.
    pub last_updated: Option<Instant>,
    pub maximum_life_time: Duration,
    /// Wall-clock time of the last successful refresh pass.
    pub last_refreshed_at: Option<DateTime<Utc>>,
    pub update_duration_seconds: f64,
    pub update_success: bool,
    pub is_updating: bool,
}

impl MetricsCache {
    /// Creates an empty cache that is due for a refresh right away.
    pub fn new(maximum_life_time: Duration) -> Self {
        Self {
            ports: Arc::new(PortMetrics::new()),
            last_updated: None,
            maximum_life_time,
            last_refreshed_at: None,
            update_duration_seconds: 0.0,
            update_success: false,
            is_updating: false,
        }
    }

    /// Time since the last update; a cache that was never updated counts as
    /// exactly `maximum_life_time` old.
    pub fn elapsed_since_update(&self, now: Instant) -> Duration {
        match self.last_updated {
            Some(last) => now.saturating_duration_since(last),
            None => self.maximum_life_time,
        }
    }

    /// A refresh is due once `elapsed` exceeds the life time minus the margin.
    pub fn is_stale(&self, elapsed: Duration) -> bool {
        let threshold = self
            .maximum_life_time
            .saturating_sub(Duration::from_secs(REFRESH_MARGIN_SECS));
        elapsed > threshold
    }

    /// Cached value for one port and metric key.
    pub fn value(&self, port: &str, key: &str) -> Option<f64> {
        self.ports.get(port).and_then(|metrics| metrics.get(key)).copied()
    }
}
