//! Application state shared by the HTTP handlers in serve mode.

use prometheus::Registry;
use std::sync::Arc;
use std::time::Instant;

use infiniband_sensor::{Config, SensorModule};

use crate::metrics::SensorMetrics;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Global application state shared across requests.
pub struct AppState {
    pub registry: Registry,
    pub metrics: SensorMetrics,
    /// Initialized metric module; owns the refresh scheduler and cache.
    pub module: Arc<SensorModule>,
    pub config: Arc<Config>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}
