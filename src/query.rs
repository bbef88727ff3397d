//! Invocation of the adapter query utilities.
//!
//! `CounterSource` is the seam between the sampling pipeline and the
//! `ibstat` / `perfquery` processes. `ShellCounterSource` runs the real
//! binaries with `tokio::process`, each call bounded by a timeout.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, trace, warn};

use crate::config::Config;
use crate::error::{SensorError, SensorResult};

/// Reset mask selecting the error-class counters of the PortCounters attribute.
pub const ERROR_COUNTER_RESET_MASK: u32 = 0xf000;

/// Raw text producers for the three adapter queries.
#[async_trait]
pub trait CounterSource: Send + Sync {
    /// Adapter status text in `ibstat` format.
    async fn adapter_status(&self) -> SensorResult<String>;

    /// Error counter dump for one port; resets the counters selected by `reset_mask`.
    async fn error_counters(&self, lid: &str, port: &str, reset_mask: u32) -> SensorResult<String>;

    /// Extended traffic counter dump for one port.
    ///
    /// Reading resets the extended traffic counters: extended mode has no
    /// reset mask, so the query itself clears them.
    async fn traffic_counters(&self, lid: &str, port: &str) -> SensorResult<String>;
}

/// Runs `ibstat` and `perfquery` as child processes.
#[derive(Debug, Clone)]
pub struct ShellCounterSource {
    ibstat_path: String,
    perfquery_path: String,
    sudo_path: Option<String>,
    extended_flag: String,
    timeout: Duration,
}

impl ShellCounterSource {
    /// Builds a source from the effective configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            ibstat_path: config.ibstat_path.clone(),
            perfquery_path: config.perfquery_path.clone(),
            sudo_path: config.use_sudo.then(|| config.sudo_path.clone()),
            extended_flag: config.extended_flag.clone(),
            timeout: Duration::from_secs(config.query_timeout_secs),
        }
    }

    /// `perfquery` argument vector for the error counter query.
    pub fn error_counter_args(&self, lid: &str, port: &str, reset_mask: u32) -> Vec<String> {
        vec![
            "-r".to_string(),
            lid.to_string(),
            port.to_string(),
            format!("{:#x}", reset_mask),
        ]
    }

    /// `perfquery` argument vector for the extended traffic counter query.
    pub fn traffic_counter_args(&self, lid: &str, port: &str) -> Vec<String> {
        vec![self.extended_flag.clone(), lid.to_string(), port.to_string()]
    }

    async fn run(&self, program: &str, args: &[String]) -> SensorResult<String> {
        let (program, args): (&str, Vec<&str>) = match &self.sudo_path {
            Some(sudo) => (
                sudo.as_str(),
                std::iter::once(program)
                    .chain(args.iter().map(String::as_str))
                    .collect(),
            ),
            None => (program, args.iter().map(String::as_str).collect()),
        };
        let command_line = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");

        debug!(command = %command_line, "Execute command");

        let child = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(result) => result.map_err(|e| SensorError::QuerySpawn {
                command: command_line.clone(),
                source: e,
            })?,
            Err(_) => {
                warn!(command = %command_line, timeout_secs = self.timeout.as_secs(), "Command timed out");
                return Err(SensorError::QueryTimeout {
                    command: command_line,
                    timeout_secs: self.timeout.as_secs(),
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let exit_code = output.status.code().unwrap_or(-1);
            warn!(command = %command_line, exit_code, stderr = %stderr, "Command failed");
            return Err(SensorError::QueryFailed {
                command: command_line,
                exit_code,
                output: if stderr.is_empty() {
                    stdout.trim().to_string()
                } else {
                    stderr
                },
            });
        }

        trace!(command = %command_line, bytes = stdout.len(), "Command succeeded");
        Ok(stdout)
    }
}

#[async_trait]
impl CounterSource for ShellCounterSource {
    async fn adapter_status(&self) -> SensorResult<String> {
        self.run(&self.ibstat_path, &[]).await
    }

    async fn error_counters(&self, lid: &str, port: &str, reset_mask: u32) -> SensorResult<String> {
        let args = self.error_counter_args(lid, port, reset_mask);
        self.run(&self.perfquery_path, &args).await
    }

    async fn traffic_counters(&self, lid: &str, port: &str) -> SensorResult<String> {
        let args = self.traffic_counter_args(lid, port);
        self.run(&self.perfquery_path, &args).await
    }
}
