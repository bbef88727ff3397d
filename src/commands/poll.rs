//! Poll command implementation.
//!
//! Runs the metric module the way a host would: initialize once, then call
//! the handler for every descriptor and sleep just under one life time.

use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};

use infiniband_sensor::{Config, SensorModule, ShellCounterSource};

/// Polls all registered metrics until interrupted or `iterations` rounds ran.
pub async fn command_poll(iterations: Option<usize>, config: &Config) -> anyhow::Result<()> {
    let source = Arc::new(ShellCounterSource::from_config(config));
    let module = SensorModule::init(config, source).await?;

    if module.descriptors().is_empty() {
        warn!("No metric descriptors registered; check ibstat and perfquery access");
    }

    let interval = module
        .params()
        .maximum_life_time
        .saturating_sub(Duration::from_secs(1));
    let mut round = 0usize;

    loop {
        for descriptor in module.descriptors() {
            match module.metric_handler(&descriptor.name).await {
                Ok(value) => println!("value for {} is {:.0}", descriptor.name, value),
                Err(e) => warn!("Metric {} unavailable: {}", descriptor.name, e),
            }
        }

        round += 1;
        if iterations.is_some_and(|n| round >= n) {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            result = signal::ctrl_c() => {
                result?;
                info!("Received SIGINT (Ctrl+C), stopping poll loop");
                break;
            }
        }
    }

    module.cleanup();
    Ok(())
}
