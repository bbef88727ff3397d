//! InfiniBand Port Counter Sensor Library
//!
//! This library samples InfiniBand adapter counters through `ibstat` and
//! `perfquery`, caches them under a time-to-live policy and derives
//! per-second link rates for a metric host.
//!
//! # Pipeline
//!
//! - **Port directory** ([`collectors::ibstat`]): port → LID from `ibstat`
//! - **Counter parsing** ([`collectors::perfquery`]): counter dumps → typed values
//! - **Sampling** ([`sampler`]): traffic then error counters per port
//! - **Rate derivation** ([`rates`]): bytes/sec and packets/sec
//! - **Refresh scheduling** ([`cache_updater`]): freshness check and cache swap
//! - **Registry** ([`registry`]): descriptors and the metric callback
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use infiniband_sensor::{Config, SensorModule, ShellCounterSource};
//!
//! # async fn run() -> Result<(), infiniband_sensor::SensorError> {
//! let config = Config::default();
//! let source = Arc::new(ShellCounterSource::from_config(&config));
//! let module = SensorModule::init(&config, source).await?;
//!
//! for descriptor in module.descriptors() {
//!     let value = module.metric_handler(&descriptor.name).await?;
//!     println!("{} = {} {}", descriptor.name, value, descriptor.units);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod cache_updater;
pub mod cli;
pub mod collectors;
pub mod config;
pub mod error;
pub mod query;
pub mod rates;
pub mod refresh_stats;
pub mod registry;
pub mod sampler;

// Re-export main types for convenience
pub use cache_updater::{RefreshOutcome, RefreshScheduler};
pub use config::{Config, ModuleParams};
pub use error::{SensorError, SensorResult};
pub use query::{CounterSource, ShellCounterSource};
pub use registry::{MetricDescriptor, SensorModule, Unit};
