//! Error types for the InfiniBand sensor.
//!
//! All errors implement `std::error::Error` via `thiserror`. Parse and
//! external query errors abort a single refresh pass, lookup errors surface
//! to the metric host, configuration errors are fatal at initialization.

use std::io;
use thiserror::Error;

/// Result type alias for sensor operations.
pub type SensorResult<T> = Result<T, SensorError>;

/// Errors that can occur while sampling, deriving or serving counters.
#[derive(Debug, Error)]
pub enum SensorError {
    /// Malformed `ibstat` or `perfquery` output.
    #[error("Failed to parse {context}: {message}")]
    Parse {
        /// What was being parsed (e.g. "ibstat output", "counter line").
        context: String,
        /// Error message.
        message: String,
    },

    /// The query utility could not be spawned.
    #[error("Failed to execute '{command}': {source}")]
    QuerySpawn {
        /// The command line that failed to start.
        command: String,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// The query utility exited with a non-zero status.
    #[error("Query '{command}' failed (exit code {exit_code}): {output}")]
    QueryFailed {
        /// The command line.
        command: String,
        /// The exit code, -1 when killed by a signal.
        exit_code: i32,
        /// Captured stderr, or stdout if stderr was empty.
        output: String,
    },

    /// The query utility did not finish in time.
    #[error("Query '{command}' timed out after {timeout_secs}s")]
    QueryTimeout {
        /// The command line.
        command: String,
        /// The configured timeout.
        timeout_secs: u64,
    },

    /// A descriptor name does not resolve to a cached value.
    #[error("No cached value for '{name}': {reason}")]
    Lookup {
        /// The descriptor name that was queried.
        name: String,
        /// Why the lookup failed.
        reason: String,
    },

    /// Missing or invalid configuration.
    #[error("Invalid configuration for {field}: {message}")]
    Config {
        /// The offending field.
        field: String,
        /// Error message.
        message: String,
    },
}

impl SensorError {
    /// Creates a parse error.
    pub fn parse(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Creates a lookup error.
    pub fn lookup(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Lookup {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a configuration error.
    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Returns true for failures of the external query utilities
    /// (spawn error, non-zero exit, timeout).
    pub fn is_external_query(&self) -> bool {
        matches!(
            self,
            SensorError::QuerySpawn { .. }
                | SensorError::QueryFailed { .. }
                | SensorError::QueryTimeout { .. }
        )
    }

    /// Returns true if this error only aborts the current refresh pass
    /// and the next due cycle may succeed.
    pub fn is_transient(&self) -> bool {
        self.is_external_query() || matches!(self, SensorError::Parse { .. })
    }
}
