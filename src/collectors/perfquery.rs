//! Counter dump parser for `perfquery` output.
//!
//! Counter lines look like `PortXmitData:....................405429`.
//! Header lines, hex fields and anything else are ignored.

use ahash::AHashMap as HashMap;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{SensorError, SensorResult};

/// Lowercase counter name → cumulative value for one port.
pub type RawCounterSet = HashMap<String, u64>;

/// 32-bit traffic counters superseded by their 64-bit extended variants.
pub const EXCLUDED_COUNTERS: [&str; 4] = ["XmtData", "RcvData", "XmtPkts", "RcvPkts"];

static COUNTER_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z0-9]+):\.+([0-9]+)$").expect("Invalid regex pattern"));

/// Parses one line of counter dump text.
///
/// Returns `Ok(None)` for non-counter lines and for the excluded 32-bit
/// counters. A counter value that does not fit in `u64` is a parse error.
pub fn parse_counter_line(line: &str) -> SensorResult<Option<(String, u64)>> {
    let line = line.trim_end();
    let Some(caps) = COUNTER_LINE_RE.captures(line) else {
        return Ok(None);
    };

    let name = &caps[1];
    if EXCLUDED_COUNTERS
        .iter()
        .any(|excluded| excluded.eq_ignore_ascii_case(name))
    {
        return Ok(None);
    }

    let digits = caps[2].replace('.', "");
    let value = digits.parse::<u64>().map_err(|e| {
        SensorError::parse("counter line", format!("{}: '{}': {}", name, digits, e))
    })?;

    Ok(Some((name.to_ascii_lowercase(), value)))
}

/// Parses a complete counter dump. Later duplicates overwrite earlier ones.
pub fn parse_counters(text: &str) -> SensorResult<RawCounterSet> {
    let mut counters = RawCounterSet::new();
    for line in text.lines() {
        if let Some((name, value)) = parse_counter_line(line)? {
            counters.insert(name, value);
        }
    }
    Ok(counters)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERFQUERY_EXTENDED: &str = "# Port extended counters: Lid 12 port 1 (CapMask: 0x5A00)
PortSelect:......................1
CounterSelect:...................0x0000
PortXmitData:....................405429
PortRcvData:.....................397112
PortXmitPkts:....................5641
PortRcvPkts:.....................5520
PortUnicastXmitPkts:.............5600
PortUnicastRcvPkts:..............5480
PortMulticastXmitPkts:...........41
PortMulticastRcvPkts:............40
";

    #[test]
    fn test_counter_line() {
        assert_eq!(
            parse_counter_line("PortXmitData:....................405429").unwrap(),
            Some(("portxmitdata".to_string(), 405429))
        );
        assert_eq!(
            parse_counter_line("SymbolErrorCounter:..............0\n").unwrap(),
            Some(("symbolerrorcounter".to_string(), 0))
        );
    }

    #[test]
    fn test_excluded_32bit_counters() {
        for name in ["XmtData", "RcvData", "XmtPkts", "RcvPkts"] {
            let line = format!("{}:....................1234", name);
            assert_eq!(parse_counter_line(&line).unwrap(), None, "{}", name);
        }
    }

    #[test]
    fn test_non_counter_lines() {
        for line in [
            "# Port counters: Lid 12 port 1 (CapMask: 0x5A00)",
            "CounterSelect:...................0x0000",
            "PortXmitData: 405429",
            "PortXmitData:....",
            "Port Xmit Data:.......12",
            "PortXmitData:.......12 extra",
            "",
        ] {
            assert_eq!(parse_counter_line(line).unwrap(), None, "{:?}", line);
        }
    }

    #[test]
    fn test_overflow_is_parse_error() {
        let err = parse_counter_line("PortXmitData:....99999999999999999999999").unwrap_err();
        assert!(matches!(err, SensorError::Parse { .. }));
    }

    #[test]
    fn test_parse_counters_block() {
        let counters = parse_counters(PERFQUERY_EXTENDED).unwrap();
        assert_eq!(counters.len(), 9);
        assert_eq!(counters["portselect"], 1);
        assert_eq!(counters["portxmitdata"], 405429);
        assert_eq!(counters["portmulticastrcvpkts"], 40);
        assert!(!counters.contains_key("counterselect"));
    }

    #[test]
    fn test_parse_counters_last_write_wins() {
        let counters = parse_counters("LinkDownedCounter:....1\nLinkDownedCounter:....7\n").unwrap();
        assert_eq!(counters["linkdownedcounter"], 7);
    }

    #[test]
    fn test_parse_counters_is_deterministic() {
        let first = parse_counters(PERFQUERY_EXTENDED).unwrap();
        let second = parse_counters(PERFQUERY_EXTENDED).unwrap();
        assert_eq!(first, second);
    }
}
