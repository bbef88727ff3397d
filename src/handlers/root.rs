//! Root endpoint handler.
//!
//! Reports the sensor version, uptime and the state of the metrics cache as
//! JSON, without triggering a refresh.

use axum::{extract::State, response::IntoResponse, Json};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, instrument};

use crate::state::SharedState;

/// Body of the `/` response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub listen: String,
    pub group: String,
    pub maximum_life_time_seconds: u64,
    pub descriptors: usize,
    pub ports: Vec<String>,
    pub cache_age_seconds: Option<f64>,
    pub last_refreshed_at: Option<String>,
    pub last_refresh_success: bool,
    pub is_updating: bool,
    pub refresh_successes: u64,
    pub refresh_failures: u64,
    pub rate_anomalies: u64,
}

/// Handler for the root `/` endpoint.
#[instrument(skip(state))]
pub async fn root_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing / request");

    let module = &state.module;
    let scheduler = module.scheduler();
    let cache = scheduler.snapshot().await;
    let stats = scheduler.stats();

    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        listen: format!("{}:{}", state.config.bind, state.config.port),
        group: module.params().group.clone(),
        maximum_life_time_seconds: module.params().maximum_life_time.as_secs(),
        descriptors: module.descriptors().len(),
        ports: cache.ports.keys().cloned().collect(),
        cache_age_seconds: cache
            .last_updated
            .map(|t| Instant::now().saturating_duration_since(t).as_secs_f64()),
        last_refreshed_at: cache.last_refreshed_at.map(|t| t.to_rfc3339()),
        last_refresh_success: cache.update_success,
        is_updating: cache.is_updating,
        refresh_successes: stats.successes(),
        refresh_failures: stats.failures(),
        rate_anomalies: stats.anomalies(),
    })
}
