// ── Interference scan domain types ──

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Upper bound on the nearby-network list carried in an analysis.
pub const MAX_NEARBY_NETWORKS: usize = 64;

/// A neighbouring access point seen during a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyNetwork {
    pub ssid: String,
    pub channel: u32,
    pub frequency_ghz: f64,
}

impl NearbyNetwork {
    pub fn is_2ghz(&self) -> bool {
        self.frequency_ghz < 3.0
    }
}

/// Qualitative bucket for a signal-to-noise ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize)]
pub enum SnrQuality {
    Excellent,
    Good,
    Fair,
    Poor,
    #[serde(rename = "Very Poor")]
    #[strum(serialize = "Very Poor")]
    VeryPoor,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Overall congestion verdict for the current channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize)]
pub enum InterferenceLevel {
    Low,
    Moderate,
    High,
    Severe,
    /// Any level string this build does not recognise.
    #[default]
    #[serde(other)]
    Unknown,
}

/// Result of an interference scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterferenceAnalysis {
    pub snr_db: Option<i32>,
    pub snr_quality: SnrQuality,
    pub current_channel: Option<u32>,
    pub current_frequency_ghz: Option<f64>,
    pub same_channel_count: u32,
    pub overlapping_count: u32,
    #[serde(default)]
    pub nearby_networks: Vec<NearbyNetwork>,
    pub interference_level: InterferenceLevel,
    #[serde(default)]
    pub suggestions: Vec<String>,
}
