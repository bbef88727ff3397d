//! CLI command implementations for infiniband-sensor.
//!
//! - `poll`: standalone polling loop over every registered metric
//! - `descriptors`: descriptor listing
//! - `test`: one-shot raw counter dump
//! - `config`: configuration file generation

pub mod config;
pub mod descriptors;
pub mod poll;
pub mod test;

// Re-export command functions
pub use config::command_config;
pub use descriptors::command_descriptors;
pub use poll::command_poll;
pub use test::command_test;
