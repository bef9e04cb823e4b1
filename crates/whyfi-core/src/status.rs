// ── Health classification ──
//
// Pure threshold functions mapping a reading to a traffic-light status.
// Live telemetry classifiers return `Neutral` for a missing reading;
// speed-test classifiers treat a missing value as `Bad`.

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::history::Channel;
use crate::model::{InterferenceLevel, OverallHealth};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum HealthStatus {
    Good,
    Warning,
    Bad,
    Neutral,
}

// ── Live telemetry ──────────────────────────────────────────────────

/// Received signal strength in dBm.
pub fn classify_signal(dbm: Option<f64>) -> HealthStatus {
    match dbm {
        None => HealthStatus::Neutral,
        Some(v) if v > -60.0 => HealthStatus::Good,
        Some(v) if v >= -75.0 => HealthStatus::Warning,
        Some(_) => HealthStatus::Bad,
    }
}

/// Round-trip latency in ms (router, internet, DNS lookup).
pub fn classify_ping(ms: Option<f64>) -> HealthStatus {
    match ms {
        None => HealthStatus::Neutral,
        Some(v) if v < 20.0 => HealthStatus::Good,
        Some(v) if v <= 100.0 => HealthStatus::Warning,
        Some(_) => HealthStatus::Bad,
    }
}

pub fn classify_jitter(ms: Option<f64>) -> HealthStatus {
    match ms {
        None => HealthStatus::Neutral,
        Some(v) if v < 10.0 => HealthStatus::Good,
        Some(v) if v <= 50.0 => HealthStatus::Warning,
        Some(_) => HealthStatus::Bad,
    }
}

/// Packet loss in percent. Any loss at all is at least a warning.
#[allow(clippy::float_cmp)]
pub fn classify_loss(percent: Option<f64>) -> HealthStatus {
    match percent {
        None => HealthStatus::Neutral,
        Some(v) if v == 0.0 => HealthStatus::Good,
        Some(v) if v <= 5.0 => HealthStatus::Warning,
        Some(_) => HealthStatus::Bad,
    }
}

pub fn classify_link_rate(mbps: Option<f64>) -> HealthStatus {
    match mbps {
        None => HealthStatus::Neutral,
        Some(v) if v >= 200.0 => HealthStatus::Good,
        Some(v) if v >= 50.0 => HealthStatus::Warning,
        Some(_) => HealthStatus::Bad,
    }
}

pub fn classify_snr(db: Option<i32>) -> HealthStatus {
    match db {
        None => HealthStatus::Neutral,
        Some(v) if v >= 25 => HealthStatus::Good,
        Some(v) if v >= 15 => HealthStatus::Warning,
        Some(_) => HealthStatus::Bad,
    }
}

/// Status for a value as stored in [`MetricHistory`](crate::history::MetricHistory).
///
/// Signal is stored as a positive magnitude and is negated back to dBm
/// first. Noise has no threshold and is always neutral.
pub fn classify_channel(channel: Channel, value: f64) -> HealthStatus {
    let v = Some(value);
    match channel {
        Channel::LinkRate => classify_link_rate(v),
        Channel::Signal => classify_signal(Some(-value.abs())),
        Channel::Noise => HealthStatus::Neutral,
        Channel::RouterPing | Channel::InternetPing | Channel::DnsLookup => classify_ping(v),
        Channel::RouterJitter | Channel::InternetJitter => classify_jitter(v),
        Channel::RouterLoss | Channel::InternetLoss => classify_loss(v),
    }
}

// ── Speed test ──────────────────────────────────────────────────────

pub fn classify_download(mbps: Option<f64>) -> HealthStatus {
    match mbps {
        Some(v) if v >= 50.0 => HealthStatus::Good,
        Some(v) if v >= 10.0 => HealthStatus::Warning,
        _ => HealthStatus::Bad,
    }
}

pub fn classify_upload(mbps: Option<f64>) -> HealthStatus {
    match mbps {
        Some(v) if v >= 10.0 => HealthStatus::Good,
        Some(v) if v >= 3.0 => HealthStatus::Warning,
        _ => HealthStatus::Bad,
    }
}

/// Speed-test latency or jitter in ms.
pub fn classify_speed_latency(ms: Option<f64>) -> HealthStatus {
    match ms {
        Some(v) if v <= 30.0 => HealthStatus::Good,
        Some(v) if v <= 100.0 => HealthStatus::Warning,
        _ => HealthStatus::Bad,
    }
}

// ── Diagnostic results ──────────────────────────────────────────────

pub fn classify_interference_level(level: InterferenceLevel) -> HealthStatus {
    match level {
        InterferenceLevel::Low => HealthStatus::Good,
        InterferenceLevel::Moderate => HealthStatus::Warning,
        InterferenceLevel::High | InterferenceLevel::Severe => HealthStatus::Bad,
        InterferenceLevel::Unknown => HealthStatus::Neutral,
    }
}

pub fn classify_overall_health(health: OverallHealth) -> HealthStatus {
    match health {
        OverallHealth::Good => HealthStatus::Good,
        OverallHealth::Warning => HealthStatus::Warning,
        OverallHealth::Poor => HealthStatus::Bad,
    }
}
