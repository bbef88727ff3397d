//! Metric registry and callback dispatcher.
//!
//! `SensorModule` is the metric-module surface handed to a gmond-style host:
//! `init` registers one descriptor per (port, metric) pair found by the first
//! refresh, `metric_handler` resolves a descriptor name to its cached value,
//! `cleanup` runs at host shutdown.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::cache_updater::{RefreshOutcome, RefreshScheduler};
use crate::config::{Config, ModuleParams};
use crate::error::{SensorError, SensorResult};
use crate::query::CounterSource;
use crate::rates::{byte_rate_key, packet_rate_key, DATA_COUNTERS, PACKET_COUNTERS};

/// Extra seconds a host waits past `maximum_life_time` before declaring a metric dead.
pub const TIME_MAX_GRACE_SECS: u64 = 10;

/// Display format applied by the host.
pub const VALUE_FORMAT: &str = "%.0f";

/// Unit of a registered metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "bytes/sec")]
    BytesPerSec,
    #[serde(rename = "packets/sec")]
    PacketsPerSec,
    #[serde(rename = "counter")]
    Counter,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::BytesPerSec => "bytes/sec",
            Unit::PacketsPerSec => "packets/sec",
            Unit::Counter => "counter",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies a derived metric key by unit.
pub fn classify_unit(key: &str) -> Unit {
    if DATA_COUNTERS.iter().any(|c| byte_rate_key(c) == key) {
        Unit::BytesPerSec
    } else if PACKET_COUNTERS.iter().any(|c| packet_rate_key(c) == key) {
        Unit::PacketsPerSec
    } else {
        Unit::Counter
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Float,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slope {
    Both,
}

/// Dispatcher entry point resolving a descriptor's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Callback {
    MetricHandler,
}

/// Immutable description of one registered metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDescriptor {
    pub name: String,
    pub call_back: Callback,
    pub time_max: u64,
    pub value_type: ValueType,
    pub format: String,
    pub slope: Slope,
    pub units: Unit,
    pub groups: String,
}

/// Builds the descriptor name `<group>_<key>_port<port>`.
pub fn descriptor_name(group: &str, key: &str, port: &str) -> String {
    format!("{}_{}_port{}", group, key, port)
}

/// Splits a descriptor name into `(group, key, port)`.
pub fn parse_descriptor_name(name: &str) -> Option<(&str, &str, &str)> {
    let (group, rest) = name.split_once('_')?;
    let (key, port) = rest.rsplit_once("_port")?;
    if group.is_empty() || key.is_empty() || port.is_empty() {
        return None;
    }
    Some((group, key, port))
}

/// The metric module: owns the refresh scheduler and the descriptor list.
pub struct SensorModule {
    params: ModuleParams,
    scheduler: RefreshScheduler,
    descriptors: Vec<MetricDescriptor>,
}

impl SensorModule {
    /// Validates the parameter block, runs the initial refresh and registers
    /// one descriptor per cached (port, metric) pair.
    ///
    /// Missing or invalid `maximum_life_time` fails initialization. A failing
    /// initial refresh is only logged and leaves the module without
    /// descriptors.
    pub async fn init(config: &Config, source: Arc<dyn CounterSource>) -> SensorResult<Self> {
        let params = ModuleParams::from_config(config)?;
        Ok(Self::init_with_params(params, source).await)
    }

    /// Like `init`, for an already validated parameter block.
    pub async fn init_with_params(params: ModuleParams, source: Arc<dyn CounterSource>) -> Self {
        let scheduler = RefreshScheduler::new(source, params.maximum_life_time);

        match scheduler.update().await {
            RefreshOutcome::Refreshed { ports } => info!("Initial refresh found {} ports", ports),
            outcome => warn!("Initial refresh did not complete: {:?}", outcome),
        }

        let descriptors = build_descriptors(&params, &scheduler).await;
        info!("Registered {} metric descriptors", descriptors.len());

        Self {
            params,
            scheduler,
            descriptors,
        }
    }

    /// Descriptors registered at initialization.
    pub fn descriptors(&self) -> &[MetricDescriptor] {
        &self.descriptors
    }

    pub fn params(&self) -> &ModuleParams {
        &self.params
    }

    pub fn scheduler(&self) -> &RefreshScheduler {
        &self.scheduler
    }

    /// Resolves a descriptor name to its current value, refreshing first if
    /// the cache is stale.
    #[instrument(skip(self))]
    pub async fn metric_handler(&self, name: &str) -> SensorResult<f64> {
        let (group, key, port) = parse_descriptor_name(name)
            .ok_or_else(|| SensorError::lookup(name, "not a descriptor name"))?;
        if group != self.params.group {
            return Err(SensorError::lookup(
                name,
                format!("unknown metric group '{}'", group),
            ));
        }

        self.scheduler.update().await;

        let cache = self.scheduler.snapshot().await;
        let metrics = cache
            .ports
            .get(port)
            .ok_or_else(|| SensorError::lookup(name, format!("port {} not in cache", port)))?;
        metrics
            .get(key)
            .copied()
            .ok_or_else(|| SensorError::lookup(name, format!("metric {} not in cache", key)))
    }

    /// Host shutdown hook; nothing to release.
    pub fn cleanup(&self) {
        debug!("Metric module cleanup");
    }
}

async fn build_descriptors(
    params: &ModuleParams,
    scheduler: &RefreshScheduler,
) -> Vec<MetricDescriptor> {
    let cache = scheduler.snapshot().await;
    let time_max = params.maximum_life_time.as_secs() + TIME_MAX_GRACE_SECS;

    let mut descriptors = Vec::new();
    for (port, metrics) in cache.ports.iter() {
        for key in metrics.keys() {
            let descriptor = MetricDescriptor {
                name: descriptor_name(&params.group, key, port),
                call_back: Callback::MetricHandler,
                time_max,
                value_type: ValueType::Float,
                format: VALUE_FORMAT.to_string(),
                slope: Slope::Both,
                units: classify_unit(key),
                groups: params.group.clone(),
            };
            debug!("Register metric {} {}", descriptor.name, descriptor.units);
            descriptors.push(descriptor);
        }
    }
    descriptors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_unit() {
        assert_eq!(classify_unit("portxmitbytessec"), Unit::BytesPerSec);
        assert_eq!(classify_unit("portrcvbytessec"), Unit::BytesPerSec);
        for key in [
            "portxmitpktssec",
            "portrcvpktssec",
            "portunicastxmitpktssec",
            "portunicastrcvpktssec",
            "portmulticastxmitpktssec",
            "portmulticastrcvpktssec",
        ] {
            assert_eq!(classify_unit(key), Unit::PacketsPerSec, "{}", key);
        }
        assert_eq!(classify_unit("symbolerrorcounter"), Unit::Counter);
        assert_eq!(classify_unit("portxmitdata"), Unit::Counter);
    }

    #[test]
    fn test_descriptor_name_round_trip() {
        let name = descriptor_name("infiniband", "portxmitbytessec", "1");
        assert_eq!(name, "infiniband_portxmitbytessec_port1");
        assert_eq!(
            parse_descriptor_name(&name),
            Some(("infiniband", "portxmitbytessec", "1"))
        );
    }

    #[test]
    fn test_parse_malformed_names() {
        assert_eq!(parse_descriptor_name("infiniband"), None);
        assert_eq!(parse_descriptor_name("infiniband_portxmitbytessec"), None);
        assert_eq!(parse_descriptor_name("infiniband__port1"), None);
        assert_eq!(parse_descriptor_name("infiniband_portxmitbytessec_port"), None);
    }

    #[test]
    fn test_descriptor_serialization() {
        let descriptor = MetricDescriptor {
            name: "infiniband_portrcvpktssec_port1".into(),
            call_back: Callback::MetricHandler,
            time_max: 30,
            value_type: ValueType::Float,
            format: VALUE_FORMAT.into(),
            slope: Slope::Both,
            units: Unit::PacketsPerSec,
            groups: "infiniband".into(),
        };
        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(json["call_back"], "metric_handler");
        assert_eq!(json["value_type"], "float");
        assert_eq!(json["slope"], "both");
        assert_eq!(json["units"], "packets/sec");
        assert_eq!(json["time_max"], 30);
    }
}
