//! Configuration management for infiniband-sensor.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::cli::{Args, Commands, ConfigFormat};
use crate::error::{SensorError, SensorResult};

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9315;
pub const DEFAULT_MAXIMUM_LIFE_TIME: u64 = 20;
pub const DEFAULT_GROUP: &str = "infiniband";
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 10;

/// Seconds before `maximum_life_time` at which a refresh is already due.
pub const REFRESH_MARGIN_SECS: u64 = 5;

/// `maximum_life_time` as found in a module parameter block.
///
/// gmond hands module parameters over as strings, config files usually carry
/// plain integers; both are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LifeTimeParam {
    Seconds(i64),
    Text(String),
}

impl LifeTimeParam {
    /// Parses and validates the value as whole seconds.
    pub fn seconds(&self) -> SensorResult<u64> {
        let seconds = match self {
            LifeTimeParam::Seconds(s) => *s,
            LifeTimeParam::Text(text) => text.trim().parse::<i64>().map_err(|_| {
                SensorError::config(
                    "maximum_life_time",
                    format!("'{}' is not an integer number of seconds", text),
                )
            })?,
        };

        if seconds <= REFRESH_MARGIN_SECS as i64 {
            return Err(SensorError::config(
                "maximum_life_time",
                format!(
                    "{} must be greater than the {}s refresh margin",
                    seconds, REFRESH_MARGIN_SECS
                ),
            ));
        }
        Ok(seconds as u64)
    }
}

impl TryFrom<u64> for LifeTimeParam {
    type Error = SensorError;

    fn try_from(seconds: u64) -> SensorResult<Self> {
        i64::try_from(seconds)
            .map(LifeTimeParam::Seconds)
            .map_err(|_| {
                SensorError::config(
                    "maximum_life_time",
                    format!("{} seconds is out of range", seconds),
                )
            })
    }
}

/// Parameters consumed by the metric module entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleParams {
    /// Staleness bound of the cached metrics.
    pub maximum_life_time: Duration,
    /// Metric group and descriptor name prefix.
    pub group: String,
}

impl ModuleParams {
    /// Builds module parameters from a gmond-style key/value parameter block.
    pub fn from_pairs<'a, I>(pairs: I) -> SensorResult<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut life_time = None;
        let mut group = DEFAULT_GROUP.to_string();

        for (key, value) in pairs {
            match key {
                "maximum_life_time" => life_time = Some(LifeTimeParam::Text(value.to_string())),
                "group" => group = value.to_string(),
                _ => {}
            }
        }

        Self::build(life_time.as_ref(), group)
    }

    /// Builds module parameters from the effective configuration.
    pub fn from_config(config: &Config) -> SensorResult<Self> {
        Self::build(config.maximum_life_time.as_ref(), config.group.clone())
    }

    fn build(life_time: Option<&LifeTimeParam>, group: String) -> SensorResult<Self> {
        let seconds = life_time
            .ok_or_else(|| SensorError::config("maximum_life_time", "missing"))?
            .seconds()?;

        if group.is_empty() || group.contains('_') {
            return Err(SensorError::config(
                "group",
                format!("'{}' must be non-empty and must not contain '_'", group),
            ));
        }

        Ok(Self {
            maximum_life_time: Duration::from_secs(seconds),
            group,
        })
    }
}

fn default_group() -> String {
    DEFAULT_GROUP.to_string()
}
fn default_ibstat_path() -> String {
    "ibstat".to_string()
}
fn default_perfquery_path() -> String {
    "/usr/sbin/perfquery".to_string()
}
fn default_use_sudo() -> bool {
    true
}
fn default_sudo_path() -> String {
    "sudo".to_string()
}
fn default_extended_flag() -> String {
    "-x".to_string()
}
fn default_query_timeout_secs() -> u64 {
    DEFAULT_QUERY_TIMEOUT_SECS
}
fn default_bind() -> String {
    DEFAULT_BIND_ADDR.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}

/// Effective sensor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Staleness bound in seconds; required.
    #[serde(default, alias = "maximum-life-time")]
    pub maximum_life_time: Option<LifeTimeParam>,

    /// Metric group and descriptor name prefix
    #[serde(default = "default_group")]
    pub group: String,

    // Query utilities
    #[serde(default = "default_ibstat_path", alias = "ibstat-path")]
    pub ibstat_path: String,
    #[serde(default = "default_perfquery_path", alias = "perfquery-path")]
    pub perfquery_path: String,
    /// Prefix queries with sudo (perfquery needs access to the umad device)
    #[serde(default = "default_use_sudo", alias = "use-sudo")]
    pub use_sudo: bool,
    #[serde(default = "default_sudo_path", alias = "sudo-path")]
    pub sudo_path: String,
    /// perfquery flag selecting extended (64-bit) counters; older releases use "-e"
    #[serde(default = "default_extended_flag", alias = "extended-flag")]
    pub extended_flag: String,
    #[serde(default = "default_query_timeout_secs", alias = "query-timeout-secs")]
    pub query_timeout_secs: u64,

    // Prometheus exposition (serve mode)
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            maximum_life_time: Some(LifeTimeParam::Seconds(DEFAULT_MAXIMUM_LIFE_TIME as i64)),
            group: default_group(),
            ibstat_path: default_ibstat_path(),
            perfquery_path: default_perfquery_path(),
            use_sudo: default_use_sudo(),
            sudo_path: default_sudo_path(),
            extended_flag: default_extended_flag(),
            query_timeout_secs: default_query_timeout_secs(),
            bind: default_bind(),
            port: default_port(),
        }
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> SensorResult<()> {
    ModuleParams::from_config(cfg)?;

    if cfg.query_timeout_secs == 0 {
        return Err(SensorError::config("query_timeout_secs", "must be at least 1"));
    }
    if cfg.ibstat_path.trim().is_empty() {
        return Err(SensorError::config("ibstat_path", "must not be empty"));
    }
    if cfg.perfquery_path.trim().is_empty() {
        return Err(SensorError::config("perfquery_path", "must not be empty"));
    }
    if cfg.use_sudo && cfg.sudo_path.trim().is_empty() {
        return Err(SensorError::config("sudo_path", "use_sudo is set but sudo_path is empty"));
    }
    if !cfg.extended_flag.starts_with('-') {
        return Err(SensorError::config(
            "extended_flag",
            format!("'{}' is not a command line flag", cfg.extended_flag),
        ));
    }

    Ok(())
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(seconds) = args.maximum_life_time {
        config.maximum_life_time = Some(LifeTimeParam::try_from(seconds)?);
    }
    if let Some(group) = &args.group {
        config.group = group.clone();
    }
    if let Some(timeout) = args.query_timeout_secs {
        config.query_timeout_secs = timeout;
    }
    if args.no_sudo {
        config.use_sudo = false;
    }

    if let Some(Commands::Serve { bind, port }) = &args.command {
        if let Some(bind_ip) = bind {
            config.bind = bind_ip.to_string();
        }
        if let Some(cli_port) = port {
            config.port = *cli_port;
        }
    }

    Ok(config)
}

/// Configuration loading with multiple format support
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = if let Some(p) = path {
        PathBuf::from(p)
    } else {
        // Try default locations
        let defaults = [
            "/etc/infiniband-sensor/sensor.yaml",
            "/etc/infiniband-sensor/sensor.yml",
            "/etc/infiniband-sensor/sensor.json",
            "./infiniband-sensor.yaml",
            "./infiniband-sensor.yml",
            "./infiniband-sensor.json",
        ];

        match defaults.iter().find(|p| Path::new(p).exists()) {
            Some(found) => PathBuf::from(found),
            None => return Ok(Config::default()),
        }
    };

    if !path.exists() {
        return Err(format!("Config file not found: {}", path.display()).into());
    }

    let content = fs::read_to_string(&path)?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(&content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(&content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            // Default to YAML
            let config: Config = serde_yaml::from_str(&content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

/// Renders configuration in the requested format
pub fn render_config(
    config: &Config,
    format: ConfigFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}
