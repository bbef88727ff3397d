//! Descriptors command implementation.

use std::sync::Arc;

use infiniband_sensor::cli::ConfigFormat;
use infiniband_sensor::{Config, SensorModule, ShellCounterSource};

/// Initializes the module once and prints its descriptor list.
pub async fn command_descriptors(format: ConfigFormat, config: &Config) -> anyhow::Result<()> {
    let source = Arc::new(ShellCounterSource::from_config(config));
    let module = SensorModule::init(config, source).await?;

    let descriptors = module.descriptors();
    let content = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(descriptors)?,
        ConfigFormat::Yaml => serde_yaml::to_string(descriptors)?,
        ConfigFormat::Toml => {
            #[derive(serde::Serialize)]
            struct Listing<'a> {
                descriptor: &'a [infiniband_sensor::MetricDescriptor],
            }
            toml::to_string_pretty(&Listing {
                descriptor: descriptors,
            })?
        }
    };

    print!("{}", content);
    module.cleanup();
    Ok(())
}
