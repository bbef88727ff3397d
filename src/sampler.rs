//! Per-port counter sampling.
//!
//! Reading the extended traffic counters resets them, and the error counter
//! query resets the error class through its mask. `sample_port` is the only
//! place both queries are issued, always traffic first.

use tracing::{debug, instrument};

use crate::collectors::perfquery::{parse_counters, RawCounterSet};
use crate::error::SensorResult;
use crate::query::{CounterSource, ERROR_COUNTER_RESET_MASK};

/// Error counters of one port, resetting them with `0xf000`.
pub(crate) async fn fetch_error_counters(
    source: &dyn CounterSource,
    lid: &str,
    port: &str,
) -> SensorResult<RawCounterSet> {
    let text = source
        .error_counters(lid, port, ERROR_COUNTER_RESET_MASK)
        .await?;
    parse_counters(&text)
}

/// Extended traffic counters of one port. The query resets them.
pub(crate) async fn fetch_traffic_counters(
    source: &dyn CounterSource,
    lid: &str,
    port: &str,
) -> SensorResult<RawCounterSet> {
    let text = source.traffic_counters(lid, port).await?;
    parse_counters(&text)
}

/// Combines traffic and error counters; error counters win on key collision.
pub fn merge_counters(traffic: RawCounterSet, errors: RawCounterSet) -> RawCounterSet {
    let mut merged = traffic;
    for (name, value) in errors {
        merged.insert(name, value);
    }
    merged
}

/// Samples all counters of one port.
///
/// The traffic query must run before the error query: the error query would
/// otherwise clear the traffic counters before they are captured.
#[instrument(skip(source))]
pub async fn sample_port(
    source: &dyn CounterSource,
    port: &str,
    lid: &str,
) -> SensorResult<RawCounterSet> {
    let traffic = fetch_traffic_counters(source, lid, port).await?;
    let errors = fetch_error_counters(source, lid, port).await?;
    debug!(
        traffic = traffic.len(),
        errors = errors.len(),
        "Sampled port counters"
    );
    Ok(merge_counters(traffic, errors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SensorError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSource {
        calls: Mutex<Vec<String>>,
        fail_errors: bool,
    }

    #[async_trait]
    impl CounterSource for RecordingSource {
        async fn adapter_status(&self) -> SensorResult<String> {
            Ok(String::new())
        }

        async fn error_counters(&self, lid: &str, port: &str, mask: u32) -> SensorResult<String> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("errors {} {} {:#x}", lid, port, mask));
            if self.fail_errors {
                return Err(SensorError::QueryFailed {
                    command: "perfquery".into(),
                    exit_code: 1,
                    output: "umad".into(),
                });
            }
            Ok("SymbolErrorCounter:....3\nPortXmitData:....1\n".into())
        }

        async fn traffic_counters(&self, lid: &str, port: &str) -> SensorResult<String> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("traffic {} {}", lid, port));
            Ok("PortXmitData:....100\nPortRcvData:....200\n".into())
        }
    }

    #[tokio::test]
    async fn test_traffic_before_errors() {
        let source = RecordingSource::default();
        sample_port(&source, "1", "12").await.unwrap();
        let calls = source.calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["traffic 12 1", "errors 12 1 0xf000"]);
    }

    #[tokio::test]
    async fn test_error_counters_win_on_collision() {
        let source = RecordingSource::default();
        let counters = sample_port(&source, "1", "12").await.unwrap();
        assert_eq!(counters["portxmitdata"], 1);
        assert_eq!(counters["portrcvdata"], 200);
        assert_eq!(counters["symbolerrorcounter"], 3);
    }

    #[tokio::test]
    async fn test_error_query_failure_propagates() {
        let source = RecordingSource {
            fail_errors: true,
            ..Default::default()
        };
        let err = sample_port(&source, "1", "12").await.unwrap_err();
        assert!(err.is_external_query());
    }

    #[test]
    fn test_merge_counters() {
        let mut traffic = RawCounterSet::new();
        traffic.insert("portxmitdata".into(), 10);
        let mut errors = RawCounterSet::new();
        errors.insert("linkdownedcounter".into(), 2);
        let merged = merge_counters(traffic, errors);
        assert_eq!(merged.len(), 2);
    }
}
