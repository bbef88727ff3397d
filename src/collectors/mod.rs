//! Collectors module for InfiniBand adapter text output.
//!
//! This module contains the parsers for `ibstat` (port directory) and
//! `perfquery` (counter dumps).

pub mod ibstat;
pub mod perfquery;

pub use ibstat::{discover_ports, PortDirectory};
pub use perfquery::{parse_counter_line, parse_counters, RawCounterSet};
