//! Test command implementation.
//!
//! Runs ibstat and perfquery once per port and prints what was read.

use std::time::Instant;

use infiniband_sensor::collectors::discover_ports;
use infiniband_sensor::sampler::sample_port;
use infiniband_sensor::{Config, CounterSource, ShellCounterSource};

/// Samples every port once and prints the raw counters.
pub async fn command_test(verbose: bool, config: &Config) -> anyhow::Result<()> {
    println!("🧪 InfiniBand Sensor - Test Mode");
    println!("================================");
    println!("⚠️  Sampling resets the traffic and error counters of every port\n");

    let source = ShellCounterSource::from_config(config);

    let start = Instant::now();
    let status = source.adapter_status().await?;
    let ports = discover_ports(&status)?;
    println!("📁 Found {} ports", ports.len());

    let mut error_count = 0;
    for (port, lid) in &ports {
        match sample_port(&source, port, lid).await {
            Ok(raw) => {
                println!("   ├─ Port {} (LID {}): {} counters", port, lid, raw.len());
                if verbose {
                    let mut counters: Vec<_> = raw.iter().collect();
                    counters.sort();
                    for (name, value) in counters {
                        println!("   │  ├─ {}: {}", name, value);
                    }
                }
            }
            Err(e) => {
                error_count += 1;
                println!("   ├─ ❌ Port {} (LID {}): {}", port, lid, e);
            }
        }
    }

    println!(
        "\n   ⏱️  Scan duration: {:.2}ms",
        start.elapsed().as_secs_f64() * 1000.0
    );
    println!("   ❌ Errors: {}", error_count);

    if error_count > 0 {
        anyhow::bail!("{} of {} ports could not be sampled", error_count, ports.len());
    }
    println!("\n✅ Test completed successfully");
    Ok(())
}
