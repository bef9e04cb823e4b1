// ── Telemetry snapshot domain types ──
//
// One `MetricSnapshot` per poll, as delivered by the acquisition host.
// Field names are snake_case on the wire.

use serde::{Deserialize, Serialize};

/// Link-layer view of the current Wi-Fi association.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WifiInfo {
    pub connected: bool,
    pub ssid: Option<String>,
    /// Human band label, e.g. `"5 GHz"`.
    pub frequency_band: Option<String>,
    /// Raw channel descriptor, e.g. `"ch 149, 5 GHz, 80 MHz"`.
    pub channel: Option<String>,
    pub link_rate_mbps: Option<f64>,
    pub signal_dbm: Option<i32>,
    pub noise_dbm: Option<i32>,
}

impl WifiInfo {
    /// Signal-to-noise ratio in dB, when both readings are present. Readings
    /// too far apart to subtract yield `None`.
    pub fn snr_db(&self) -> Option<i32> {
        self.signal_dbm?.checked_sub(self.noise_dbm?)
    }
}

/// Result of a short ICMP burst against one host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PingResult {
    pub latency_ms: Option<f64>,
    pub jitter_ms: Option<f64>,
    pub packet_loss_percent: Option<f64>,
}

/// Resolver configuration and a sample lookup time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DnsInfo {
    #[serde(default)]
    pub servers: Vec<String>,
    pub lookup_latency_ms: Option<f64>,
}

/// Everything measured in one poll.
///
/// A `None` ping means the target was unreachable (or, for the router,
/// that no gateway was found). It is not an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub wifi: WifiInfo,
    pub router_ip: Option<String>,
    pub router_ping: Option<PingResult>,
    pub internet_ping: Option<PingResult>,
    pub dns: DnsInfo,
}
