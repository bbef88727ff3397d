//! HTTP endpoint handlers for serve mode.
//!
//! - `/`: JSON status of the refresh scheduler
//! - `/metrics`: Prometheus metrics endpoint

pub mod metrics;
pub mod root;

// Re-export handlers
pub use metrics::metrics_handler;
pub use root::root_handler;
