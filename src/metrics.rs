//! Prometheus metrics definitions for infiniband-sensor.
//!
//! Derived port metrics are exported as gauge families labeled by port and
//! metric key, next to the sensor's own refresh metrics.

use prometheus::{Counter, Gauge, GaugeVec, Opts, Registry};
use std::sync::atomic::Ordering;
use tokio::time::Instant;

use infiniband_sensor::cache::MetricsCache;
use infiniband_sensor::refresh_stats::RefreshStats;
use infiniband_sensor::registry::{classify_unit, Unit};

/// Collection of Prometheus metrics exported in serve mode.
#[derive(Clone)]
pub struct SensorMetrics {
    // ========== Port Metrics ==========
    pub port_bytes_per_second: GaugeVec,   // labels: port, metric
    pub port_packets_per_second: GaugeVec, // labels: port, metric
    pub port_counter: GaugeVec,            // labels: port, counter

    // ========== Sensor Metrics ==========
    pub ports: Gauge,
    pub cache_age_seconds: Gauge,
    pub refresh_duration_seconds: Gauge,
    pub refresh_success: Gauge,
    pub refresh_failures_total: Counter,
    pub rate_anomalies_total: Counter,
    pub scrape_duration_seconds: Gauge,
}

impl SensorMetrics {
    /// Creates and registers all Prometheus metrics with the registry.
    pub fn new(registry: &Registry, group: &str) -> Result<Self, prometheus::Error> {
        // ========== Port Metrics ==========
        let port_bytes_per_second = GaugeVec::new(
            Opts::new(
                format!("{}_port_bytes_per_second", group),
                "Port data rate in bytes per second over the last refresh interval",
            ),
            &["port", "metric"],
        )?;
        let port_packets_per_second = GaugeVec::new(
            Opts::new(
                format!("{}_port_packets_per_second", group),
                "Port packet rate per second over the last refresh interval",
            ),
            &["port", "metric"],
        )?;
        let port_counter = GaugeVec::new(
            Opts::new(
                format!("{}_port_counter", group),
                "Port error and diagnostic counters as read at the last refresh",
            ),
            &["port", "counter"],
        )?;

        // ========== Sensor Metrics ==========
        let ports = Gauge::new(
            format!("{}_sensor_ports", group),
            "Number of ports in the current cache snapshot",
        )?;
        let cache_age_seconds = Gauge::new(
            format!("{}_sensor_cache_age_seconds", group),
            "Seconds since the cache was last touched",
        )?;
        let refresh_duration_seconds = Gauge::new(
            format!("{}_sensor_refresh_duration_seconds", group),
            "Duration of the last refresh pass",
        )?;
        let refresh_success = Gauge::new(
            format!("{}_sensor_refresh_success", group),
            "Whether the last refresh pass succeeded (1) or failed (0)",
        )?;
        let refresh_failures_total = Counter::new(
            format!("{}_sensor_refresh_failures_total", group),
            "Refresh passes abandoned because of query or parse errors",
        )?;
        let rate_anomalies_total = Counter::new(
            format!("{}_sensor_rate_anomalies_total", group),
            "Derived rates flagged as implausible",
        )?;
        let scrape_duration_seconds = Gauge::new(
            format!("{}_sensor_scrape_duration_seconds", group),
            "Time spent serving the last /metrics request",
        )?;

        registry.register(Box::new(port_bytes_per_second.clone()))?;
        registry.register(Box::new(port_packets_per_second.clone()))?;
        registry.register(Box::new(port_counter.clone()))?;
        registry.register(Box::new(ports.clone()))?;
        registry.register(Box::new(cache_age_seconds.clone()))?;
        registry.register(Box::new(refresh_duration_seconds.clone()))?;
        registry.register(Box::new(refresh_success.clone()))?;
        registry.register(Box::new(refresh_failures_total.clone()))?;
        registry.register(Box::new(rate_anomalies_total.clone()))?;
        registry.register(Box::new(scrape_duration_seconds.clone()))?;

        Ok(Self {
            port_bytes_per_second,
            port_packets_per_second,
            port_counter,
            ports,
            cache_age_seconds,
            refresh_duration_seconds,
            refresh_success,
            refresh_failures_total,
            rate_anomalies_total,
            scrape_duration_seconds,
        })
    }

    /// Replaces all port series with the contents of `cache`.
    pub fn update_from_cache(&self, cache: &MetricsCache, stats: &RefreshStats) {
        // Ports that disappeared must not keep their last value
        self.port_bytes_per_second.reset();
        self.port_packets_per_second.reset();
        self.port_counter.reset();

        for (port, metrics) in cache.ports.iter() {
            for (key, value) in metrics {
                let family = match classify_unit(key) {
                    Unit::BytesPerSec => &self.port_bytes_per_second,
                    Unit::PacketsPerSec => &self.port_packets_per_second,
                    Unit::Counter => &self.port_counter,
                };
                family.with_label_values(&[port.as_str(), key.as_str()]).set(*value);
            }
        }

        self.ports.set(cache.ports.len() as f64);
        self.cache_age_seconds.set(
            cache
                .last_updated
                .map(|t| Instant::now().saturating_duration_since(t).as_secs_f64())
                .unwrap_or(0.0),
        );
        self.refresh_duration_seconds.set(cache.update_duration_seconds);
        self.refresh_success.set(if cache.update_success { 1.0 } else { 0.0 });

        // For counters, use reset + inc_by pattern to set absolute cumulative values
        self.refresh_failures_total.reset();
        self.refresh_failures_total
            .inc_by(stats.refresh_failure_count.load(Ordering::Relaxed) as f64);
        self.rate_anomalies_total.reset();
        self.rate_anomalies_total
            .inc_by(stats.rate_anomalies.load(Ordering::Relaxed) as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use infiniband_sensor::cache::PortMetrics;
    use infiniband_sensor::rates::DerivedMetricSet;
    use prometheus::{Encoder, TextEncoder};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_update_from_cache() {
        let registry = Registry::new();
        let metrics = SensorMetrics::new(&registry, "infiniband").unwrap();

        let mut derived = DerivedMetricSet::new();
        derived.insert("portxmitbytessec".into(), 40.0);
        derived.insert("portrcvpktssec".into(), 5.0);
        derived.insert("symbolerrorcounter".into(), 2.0);
        let mut ports = PortMetrics::new();
        ports.insert("1".into(), derived);

        let mut cache = MetricsCache::new(Duration::from_secs(20));
        cache.ports = Arc::new(ports);
        cache.update_success = true;

        let stats = RefreshStats::new();
        stats.record_failure(1.0);
        metrics.update_from_cache(&cache, &stats);

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert!(text.contains(
            "infiniband_port_bytes_per_second{metric=\"portxmitbytessec\",port=\"1\"} 40"
        ));
        assert!(text.contains(
            "infiniband_port_packets_per_second{metric=\"portrcvpktssec\",port=\"1\"} 5"
        ));
        assert!(text.contains("infiniband_port_counter{counter=\"symbolerrorcounter\",port=\"1\"} 2"));
        assert!(text.contains("infiniband_sensor_refresh_failures_total 1"));
        assert!(text.contains("infiniband_sensor_ports 1"));
    }
}
