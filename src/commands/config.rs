//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use infiniband_sensor::cli::ConfigFormat;
use infiniband_sensor::config::render_config;
use infiniband_sensor::Config;

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let output = match output {
        Some(path) => path,
        None => PathBuf::from("infiniband-sensor.yaml"),
    };

    let mut content = render_config(&config, format)?;
    if commented && matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# InfiniBand Sensor Configuration
# ==============================
#
# Metric Module
# -------------
# maximum_life_time: 20        # Seconds a sample stays valid; must be > 5
# group: "infiniband"          # Metric group and descriptor name prefix
#
# Query Utilities
# ---------------
# ibstat_path: "ibstat"
# perfquery_path: "/usr/sbin/perfquery"
# use_sudo: true               # perfquery needs access to the umad device
# sudo_path: "sudo"
# extended_flag: "-x"          # "-e" on older infiniband-diags releases
# query_timeout_secs: 10       # Per invocation
#
# Serve Mode
# ----------
# bind: "0.0.0.0"
# port: 9315
"#;

    format!("{comments}\n{yaml}")
}
