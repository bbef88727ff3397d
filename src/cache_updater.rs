//! Cache update logic for the sensor.
//!
//! `RefreshScheduler::update` is called on every metric query. It decides
//! whether the cached metrics are still fresh and, if not, runs a complete
//! refresh pass: discover ports, sample each port, derive rates, swap the
//! new per-port map into the cache.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::cache::{MetricsCache, PortMetrics};
use crate::collectors::ibstat::discover_ports;
use crate::error::SensorResult;
use crate::query::CounterSource;
use crate::rates::{derive_rates, report_anomalies};
use crate::refresh_stats::RefreshStats;
use crate::sampler::sample_port;

/// Result of one `update` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The cache was fresh; nothing was queried.
    Fresh,
    /// Another call is refreshing; the current snapshot stays in place.
    InProgress,
    /// A full pass completed and replaced the cache contents.
    Refreshed { ports: usize },
    /// The pass was abandoned; the previous snapshot stays authoritative.
    Failed,
}

/// Owner of the metrics cache and the only component mutating it.
#[derive(Clone)]
pub struct RefreshScheduler {
    cache: Arc<RwLock<MetricsCache>>,
    source: Arc<dyn CounterSource>,
    stats: Arc<RefreshStats>,
}

impl RefreshScheduler {
    pub fn new(source: Arc<dyn CounterSource>, maximum_life_time: Duration) -> Self {
        Self {
            cache: Arc::new(RwLock::new(MetricsCache::new(maximum_life_time))),
            source,
            stats: Arc::new(RefreshStats::new()),
        }
    }

    pub fn stats(&self) -> &Arc<RefreshStats> {
        &self.stats
    }

    /// Copy of the current cache state.
    pub async fn snapshot(&self) -> MetricsCache {
        self.cache.read().await.clone()
    }

    /// Refreshes the cache if it is stale.
    ///
    /// The last-update timestamp is moved to "now" at the end of every call,
    /// including calls that found the cache fresh and passes that failed.
    /// The pass itself runs in its own task: dropping this future does not
    /// abandon it, so `is_updating` is always cleared.
    #[instrument(skip(self))]
    pub async fn update(&self) -> RefreshOutcome {
        let elapsed = {
            let mut cache = self.cache.write().await;
            let now = Instant::now();
            let elapsed = cache.elapsed_since_update(now);

            if !cache.is_stale(elapsed) {
                cache.last_updated = Some(now);
                self.stats.record_fresh_hit();
                return RefreshOutcome::Fresh;
            }
            if cache.is_updating {
                debug!("Cache update already in progress, serving stale cache");
                self.stats.record_concurrent_skip();
                return RefreshOutcome::InProgress;
            }
            cache.is_updating = true;
            elapsed
        };

        debug!("Update metrics after {:.3}s", elapsed.as_secs_f64());
        let scheduler = self.clone();
        let pass = tokio::spawn(async move { scheduler.refresh(elapsed).await });

        match pass.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Cache update task failed: {}", e);
                let mut cache = self.cache.write().await;
                cache.is_updating = false;
                cache.update_success = false;
                cache.last_updated = Some(Instant::now());
                self.stats.record_failure(0.0);
                RefreshOutcome::Failed
            }
        }
    }

    /// Runs one refresh pass and writes its result back into the cache.
    async fn refresh(&self, elapsed: Duration) -> RefreshOutcome {
        let start = Instant::now();
        let result = self.collect(elapsed.as_secs_f64()).await;
        let duration = start.elapsed().as_secs_f64();

        let mut cache = self.cache.write().await;
        cache.is_updating = false;
        cache.update_duration_seconds = duration;

        let outcome = match result {
            Ok(ports) => {
                let count = ports.len();
                cache.ports = Arc::new(ports);
                cache.update_success = true;
                cache.last_refreshed_at = Some(chrono::Utc::now());
                self.stats.record_success(count, duration);
                info!(
                    "Cache update completed: {} ports, {:.2}ms",
                    count,
                    duration * 1000.0
                );
                RefreshOutcome::Refreshed { ports: count }
            }
            Err(e) => {
                cache.update_success = false;
                self.stats.record_failure(duration);
                warn!("Cache update failed, keeping previous snapshot: {}", e);
                RefreshOutcome::Failed
            }
        };

        cache.last_updated = Some(Instant::now());
        outcome
    }

    /// Builds the complete next per-port map without touching the cache.
    async fn collect(&self, elapsed_seconds: f64) -> SensorResult<PortMetrics> {
        let status = self.source.adapter_status().await?;
        let ports = discover_ports(&status)?;
        debug!("Discovered {} ports", ports.len());

        let mut next = PortMetrics::new();
        for (port, lid) in &ports {
            let raw = sample_port(self.source.as_ref(), port, lid).await?;
            let derived = derive_rates(&raw, elapsed_seconds);

            let anomalies = report_anomalies(port, &derived);
            if anomalies > 0 {
                self.stats.record_anomalies(anomalies);
            }

            next.insert(port.clone(), derived);
        }
        Ok(next)
    }
}
