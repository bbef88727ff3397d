//! CLI arguments and subcommands for infiniband-sensor.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Output format for configuration and descriptor listings
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "infiniband-sensor",
    about = "InfiniBand port counter sampler with per-second rate derivation",
    long_about = "InfiniBand port counter sampler with per-second rate derivation.\n\n\
                  Reads port LIDs with ibstat, samples extended traffic and error counters \
                  with perfquery, and derives bytes/sec and packets/sec rates for a \
                  gmond-style metric host or a Prometheus scraper.",
    version,
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Log level
    #[arg(long, value_enum, default_value = "info", global = true)]
    pub log_level: LogLevel,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long, global = true)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Maximum age of cached metrics in seconds
    #[arg(short = 'm', long, global = true)]
    pub maximum_life_time: Option<u64>,

    /// Metric group / descriptor name prefix
    #[arg(long, global = true)]
    pub group: Option<String>,

    /// Timeout for each ibstat/perfquery invocation in seconds
    #[arg(long, global = true)]
    pub query_timeout_secs: Option<u64>,

    /// Run perfquery without sudo
    #[arg(long, global = true)]
    pub no_sudo: bool,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Poll every registered metric in a loop and print its value (default)
    Poll {
        /// Stop after N polling rounds
        #[arg(short = 'n', long)]
        iterations: Option<usize>,
    },

    /// Serve derived metrics on a Prometheus /metrics endpoint
    Serve {
        /// Bind to specific interface/IP
        #[arg(long)]
        bind: Option<IpAddr>,

        /// HTTP listen port
        #[arg(short = 'p', long)]
        port: Option<u16>,
    },

    /// Initialize the module once and print the registered metric descriptors
    Descriptors {
        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,
    },

    /// Run ibstat and perfquery once and print the raw counters per port
    Test {
        /// Show every counter, not only totals
        #[arg(long)]
        verbose: bool,
    },

    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },
}
