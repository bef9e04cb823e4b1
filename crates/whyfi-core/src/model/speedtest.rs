use serde::{Deserialize, Serialize};

/// Summary of a completed speed test.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeedTestResult {
    #[serde(rename = "downloadBandwidth")]
    pub download_mbps: f64,
    #[serde(rename = "uploadBandwidth")]
    pub upload_mbps: f64,
    #[serde(rename = "latency")]
    pub latency_ms: f64,
    #[serde(rename = "jitter")]
    pub jitter_ms: f64,
}
