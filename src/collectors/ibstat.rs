//! Port directory built from `ibstat` output.
//!
//! `ibstat` prints one block per port:
//!
//! ```text
//!         Port 1:
//!                 State: Active
//!                 Physical state: LinkUp
//!                 Rate: 40
//!                 Base lid: 12
//! ```
//!
//! The LID sits on the fourth line below the port header.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

use crate::error::{SensorError, SensorResult};

/// Port number → LID, ordered by port.
pub type PortDirectory = BTreeMap<String, String>;

/// Lines between a `Port N:` header and its `Base lid:` line.
pub const LID_LINE_OFFSET: usize = 4;

static PORT_HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Port ([0-9]+):$").expect("Invalid regex pattern"));

enum BlockState {
    SeekingHeader,
    ReadingBlock { port: String, offset: usize },
}

/// Parses `ibstat` output into a port → LID mapping.
///
/// Returns an empty mapping when no port header is present. A port block
/// that ends before its LID line yields a parse error.
pub fn discover_ports(text: &str) -> SensorResult<PortDirectory> {
    let mut ports = PortDirectory::new();
    let mut state = BlockState::SeekingHeader;

    for line in text.lines() {
        let line = line.trim();

        state = match state {
            BlockState::SeekingHeader => match port_header(line) {
                Some(port) => BlockState::ReadingBlock { port, offset: 0 },
                None => BlockState::SeekingHeader,
            },
            BlockState::ReadingBlock { port, offset } => {
                let offset = offset + 1;
                if offset < LID_LINE_OFFSET {
                    if let Some(next) = port_header(line) {
                        return Err(truncated(&port, &format!("port {} header", next)));
                    }
                    BlockState::ReadingBlock { port, offset }
                } else {
                    let lid = lid_value(&port, line)?;
                    ports.insert(port, lid);
                    BlockState::SeekingHeader
                }
            }
        };
    }

    if let BlockState::ReadingBlock { port, .. } = state {
        return Err(truncated(&port, "end of output"));
    }

    Ok(ports)
}

fn port_header(line: &str) -> Option<String> {
    PORT_HEADER_RE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn lid_value(port: &str, line: &str) -> SensorResult<String> {
    let (_, value) = line.split_once(':').ok_or_else(|| {
        SensorError::parse(
            "ibstat output",
            format!("port {}: expected LID line, found '{}'", port, line),
        )
    })?;

    let value = value.trim();
    if value.is_empty() {
        return Err(SensorError::parse(
            "ibstat output",
            format!("port {}: empty LID value", port),
        ));
    }
    Ok(value.to_string())
}

fn truncated(port: &str, found: &str) -> SensorError {
    SensorError::parse(
        "ibstat output",
        format!("port {} block truncated before LID line ({})", port, found),
    )
}
