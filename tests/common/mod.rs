//! Scripted counter source shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use infiniband_sensor::{CounterSource, SensorError, SensorResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Two ports: port 1 with LID 12, port 2 with LID 13.
pub const IBSTAT_TWO_PORTS: &str = "CA 'mlx4_0'
\tCA type: MT4099
\tNumber of ports: 2
\tFirmware version: 2.30.3000
\tHardware version: 0
\tNode GUID: 0x0002c903002e1234
\tSystem image GUID: 0x0002c903002e1237
\tPort 1:
\t\tState: Active
\t\tPhysical state: LinkUp
\t\tRate: 40
\t\tBase lid: 12
\t\tLMC: 0
\t\tSM lid: 1
\t\tCapability mask: 0x02514868
\t\tPort GUID: 0x0002c903002e1235
\t\tLink layer: InfiniBand
\tPort 2:
\t\tState: Active
\t\tPhysical state: LinkUp
\t\tRate: 40
\t\tBase lid: 13
\t\tLMC: 0
\t\tSM lid: 1
\t\tCapability mask: 0x02514868
\t\tPort GUID: 0x0002c903002e1236
\t\tLink layer: InfiniBand
";

pub const TRAFFIC_COUNTERS: &str = "# Port extended counters: Lid 12 port 1 (CapMask: 0x5A00)
PortSelect:......................1
CounterSelect:...................0x0000
PortXmitData:....................100
PortRcvData:.....................200
PortXmitPkts:....................40
PortRcvPkts:.....................80
PortUnicastXmitPkts:.............32
PortUnicastRcvPkts:..............64
PortMulticastXmitPkts:...........8
PortMulticastRcvPkts:............16
";

pub const ERROR_COUNTERS: &str = "# Port counters: Lid 12 port 1 (CapMask: 0x5A00)
PortSelect:......................1
CounterSelect:...................0x1000
SymbolErrorCounter:..............3
LinkErrorRecoveryCounter:........0
LinkDownedCounter:...............1
PortRcvErrors:...................0
PortRcvRemotePhysicalErrors:.....0
PortRcvSwitchRelayErrors:........0
PortXmitDiscards:................7
PortXmitConstraintErrors:........0
PortRcvConstraintErrors:.........0
LocalLinkIntegrityErrors:........0
ExcessiveBufferOverrunErrors:....0
VL15Dropped:.....................0
XmtData:.........................4294967295
RcvData:.........................4294967295
XmtPkts:.........................4294967295
RcvPkts:.........................4294967295
PortXmitWait:....................5
";

/// Metric keys every port of the fake source yields: eight rates, portselect,
/// twelve error counters and portxmitwait.
pub const KEYS_PER_PORT: usize = 22;

/// Counter source answering from fixed text and recording every call.
pub struct FakeCounterSource {
    pub status: Mutex<String>,
    pub traffic: Mutex<String>,
    pub errors: Mutex<String>,
    pub calls: Mutex<Vec<String>>,
    pub fail: AtomicBool,
    pub delay: Option<Duration>,
}

impl Default for FakeCounterSource {
    fn default() -> Self {
        Self {
            status: Mutex::new(IBSTAT_TWO_PORTS.to_string()),
            traffic: Mutex::new(TRAFFIC_COUNTERS.to_string()),
            errors: Mutex::new(ERROR_COUNTERS.to_string()),
            calls: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
            delay: None,
        }
    }
}

impl FakeCounterSource {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_traffic(&self, text: &str) {
        *self.traffic.lock().unwrap() = text.to_string();
    }

    fn record(&self, call: String) -> SensorResult<()> {
        self.calls.lock().unwrap().push(call.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(SensorError::QueryFailed {
                command: call,
                exit_code: 1,
                output: "ibwarn: [1234] mad_rpc_open_port: can't open UMAD port".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl CounterSource for FakeCounterSource {
    async fn adapter_status(&self) -> SensorResult<String> {
        self.record("status".into())?;
        Ok(self.status.lock().unwrap().clone())
    }

    async fn error_counters(&self, lid: &str, port: &str, reset_mask: u32) -> SensorResult<String> {
        self.record(format!("errors {} {} {:#x}", lid, port, reset_mask))?;
        Ok(self.errors.lock().unwrap().clone())
    }

    async fn traffic_counters(&self, lid: &str, port: &str) -> SensorResult<String> {
        self.record(format!("traffic {} {}", lid, port))?;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.traffic.lock().unwrap().clone())
    }
}
