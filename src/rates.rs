//! Rate derivation from cumulative port counters.
//!
//! The traffic counters are reset by every sample, so each cumulative value
//! is the amount accumulated since the previous refresh and dividing it by
//! the elapsed time gives the per-second rate.

use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::collectors::perfquery::RawCounterSet;

/// Metric key → value for one port, ordered by key.
pub type DerivedMetricSet = BTreeMap<String, f64>;

/// Data counters count quad-octets (IBA 1.2 vol 1, p. 948).
pub const OCTETS_PER_DATA_UNIT: f64 = 4.0;

/// 32-bit word counters converted to bytes per second.
pub const DATA_COUNTERS: [&str; 2] = ["portxmitdata", "portrcvdata"];

/// Packet counters converted to packets per second.
pub const PACKET_COUNTERS: [&str; 6] = [
    "portxmitpkts",
    "portrcvpkts",
    "portunicastxmitpkts",
    "portunicastrcvpkts",
    "portmulticastxmitpkts",
    "portmulticastrcvpkts",
];

/// Byte rates above this are reported as anomalies (800 Gb/s).
pub const MAX_PLAUSIBLE_BYTES_PER_SEC: f64 = 100.0e9;

/// Packet rates above this are reported as anomalies.
pub const MAX_PLAUSIBLE_PACKETS_PER_SEC: f64 = 2.0e9;

/// Key under which a data counter's byte rate is stored.
pub fn byte_rate_key(counter: &str) -> String {
    format!("{}sec", counter.replace("data", "bytes"))
}

/// Key under which a packet counter's rate is stored.
pub fn packet_rate_key(counter: &str) -> String {
    format!("{}sec", counter)
}

/// Derives per-second rates from one port's counters.
///
/// Data and packet counters are replaced by their renamed rate keys, all
/// other counters pass through unchanged. `elapsed_seconds` must be
/// positive; the refresh scheduler never calls this with a fresh cache.
pub fn derive_rates(raw: &RawCounterSet, elapsed_seconds: f64) -> DerivedMetricSet {
    let mut derived: DerivedMetricSet = raw
        .iter()
        .map(|(name, value)| (name.clone(), *value as f64))
        .collect();

    for counter in DATA_COUNTERS {
        match derived.remove(counter) {
            Some(words) => {
                let octets = words * OCTETS_PER_DATA_UNIT;
                derived.insert(byte_rate_key(counter), octets / elapsed_seconds);
            }
            None => debug!(counter, "Data counter missing from sample"),
        }
    }

    for counter in PACKET_COUNTERS {
        match derived.remove(counter) {
            Some(packets) => {
                derived.insert(packet_rate_key(counter), packets / elapsed_seconds);
            }
            None => debug!(counter, "Packet counter missing from sample"),
        }
    }

    derived
}

/// A derived rate that cannot come from monotonically counting hardware,
/// typically because the counters were reset or read outside this sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct RateAnomaly {
    pub key: String,
    pub rate: f64,
}

/// Returns the rates in `derived` that are non-finite, negative or above
/// the plausibility ceiling for their unit.
pub fn find_anomalies(derived: &DerivedMetricSet) -> Vec<RateAnomaly> {
    let byte_keys: Vec<String> = DATA_COUNTERS.iter().map(|c| byte_rate_key(c)).collect();
    let packet_keys: Vec<String> = PACKET_COUNTERS.iter().map(|c| packet_rate_key(c)).collect();

    derived
        .iter()
        .filter_map(|(key, &rate)| {
            let ceiling = if byte_keys.contains(key) {
                MAX_PLAUSIBLE_BYTES_PER_SEC
            } else if packet_keys.contains(key) {
                MAX_PLAUSIBLE_PACKETS_PER_SEC
            } else {
                return None;
            };
            (!rate.is_finite() || rate < 0.0 || rate > ceiling).then(|| RateAnomaly {
                key: key.clone(),
                rate,
            })
        })
        .collect()
}

/// Logs every anomaly for `port` and returns how many were found.
pub fn report_anomalies(port: &str, derived: &DerivedMetricSet) -> usize {
    let anomalies = find_anomalies(derived);
    for anomaly in &anomalies {
        warn!(
            port,
            key = %anomaly.key,
            rate = anomaly.rate,
            "Implausible rate, counters were probably reset externally"
        );
    }
    anomalies.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, u64)]) -> RawCounterSet {
        let mut set = RawCounterSet::new();
        for (name, value) in pairs {
            set.insert(name.to_string(), *value);
        }
        set
    }

    #[test]
    fn test_transmit_data_and_unicast_packets() {
        let derived = derive_rates(
            &raw(&[("portxmitdata", 100), ("portunicastxmitpkts", 50)]),
            10.0,
        );
        assert_eq!(derived.len(), 2);
        assert_eq!(derived["portxmitbytessec"], 40.0);
        assert_eq!(derived["portunicastxmitpktssec"], 5.0);
        assert!(!derived.contains_key("portxmitdata"));
        assert!(!derived.contains_key("portunicastxmitpkts"));
    }

    #[test]
    fn test_full_sample() {
        let derived = derive_rates(
            &raw(&[
                ("portxmitdata", 1000),
                ("portrcvdata", 500),
                ("portxmitpkts", 40),
                ("portrcvpkts", 20),
                ("portunicastxmitpkts", 30),
                ("portunicastrcvpkts", 10),
                ("portmulticastxmitpkts", 10),
                ("portmulticastrcvpkts", 10),
                ("symbolerrorcounter", 7),
                ("linkdownedcounter", 1),
            ]),
            20.0,
        );

        let keys: Vec<&str> = derived.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "linkdownedcounter",
                "portmulticastrcvpktssec",
                "portmulticastxmitpktssec",
                "portrcvbytessec",
                "portrcvpktssec",
                "portunicastrcvpktssec",
                "portunicastxmitpktssec",
                "portxmitbytessec",
                "portxmitpktssec",
                "symbolerrorcounter",
            ]
        );
        assert_eq!(derived["portrcvbytessec"], 100.0);
        assert_eq!(derived["portxmitpktssec"], 2.0);
        assert_eq!(derived["symbolerrorcounter"], 7.0);
        assert_eq!(derived["linkdownedcounter"], 1.0);
    }

    #[test]
    fn test_fractional_interval() {
        let derived = derive_rates(&raw(&[("portrcvpkts", 3)]), 2.0);
        assert_eq!(derived["portrcvpktssec"], 1.5);
    }

    #[test]
    fn test_rate_keys() {
        assert_eq!(byte_rate_key("portxmitdata"), "portxmitbytessec");
        assert_eq!(byte_rate_key("portrcvdata"), "portrcvbytessec");
        assert_eq!(packet_rate_key("portrcvpkts"), "portrcvpktssec");
    }

    #[test]
    fn test_anomalies() {
        let mut derived = DerivedMetricSet::new();
        derived.insert("portxmitbytessec".into(), 2.0e11);
        derived.insert("portrcvbytessec".into(), 1.0e9);
        derived.insert("portxmitpktssec".into(), f64::INFINITY);
        derived.insert("symbolerrorcounter".into(), 1.0e15);

        let anomalies = find_anomalies(&derived);
        let keys: Vec<&str> = anomalies.iter().map(|a| a.key.as_str()).collect();
        assert_eq!(keys, vec!["portxmitbytessec", "portxmitpktssec"]);
        assert_eq!(report_anomalies("1", &derived), 2);
    }
}
