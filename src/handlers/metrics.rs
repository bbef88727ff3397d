//! Metrics endpoint handler for Prometheus scraping.
//!
//! Each scrape goes through the same freshness check as a metric callback:
//! a stale cache is refreshed before the snapshot is exported.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use prometheus::{Encoder, TextEncoder};
use std::time::Instant;
use tracing::{debug, error, instrument};

use crate::state::SharedState;

/// Buffer capacity for metrics encoding.
const BUFFER_CAP: usize = 64 * 1024;

/// Error type for metrics endpoint failures.
#[derive(Debug)]
pub enum MetricsError {
    EncodingFailed,
}

impl IntoResponse for MetricsError {
    fn into_response(self) -> axum::response::Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics",
        )
            .into_response()
    }
}

/// Handler for the /metrics endpoint.
#[instrument(skip(state))]
pub async fn metrics_handler(State(state): State<SharedState>) -> Result<String, MetricsError> {
    let start = Instant::now();
    debug!("Processing /metrics request");

    let scheduler = state.module.scheduler();
    let outcome = scheduler.update().await;
    debug!("Refresh outcome: {:?}", outcome);

    let cache = scheduler.snapshot().await;
    state.metrics.update_from_cache(&cache, scheduler.stats());

    let families = state.registry.gather();
    let mut buffer = Vec::with_capacity(BUFFER_CAP);
    let encoder = TextEncoder::new();

    if encoder.encode(&families, &mut buffer).is_err() {
        error!("Failed to encode Prometheus metrics");
        return Err(MetricsError::EncodingFailed);
    }

    state
        .metrics
        .scrape_duration_seconds
        .set(start.elapsed().as_secs_f64());

    debug!(
        "Metrics request completed: {} ports, {} bytes, {:.3}ms",
        cache.ports.len(),
        buffer.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    String::from_utf8(buffer).map_err(|_| MetricsError::EncodingFailed)
}
