// ── Interference analysis ──
//
// Turns the current association plus a raw nearby-network scan into an
// `InterferenceAnalysis`. Host adapters call `analyze()`; the scan itself
// happens outside this crate.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::model::{
    InterferenceAnalysis, InterferenceLevel, MAX_NEARBY_NETWORKS, NearbyNetwork, SnrQuality,
    WifiInfo,
};

/// Channels that do not overlap each other on 2.4 GHz.
const NON_OVERLAPPING_2GHZ: [u32; 3] = [1, 6, 11];
/// Two 5 GHz channels closer than this (MHz, centre to centre) overlap.
const OVERLAP_WIDTH_5GHZ_MHZ: f64 = 40.0;
/// 2.4 GHz channels this many numbers apart (or fewer) share spectrum.
const OVERLAP_SPAN_2GHZ: u32 = 4;

static CHANNEL_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"ch\s*(\d+)").ok());
static GHZ_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*GHz").ok());

/// Build a full analysis from the current link and a scan of neighbours.
pub fn analyze(wifi: &WifiInfo, mut nearby: Vec<NearbyNetwork>) -> InterferenceAnalysis {
    let snr_db = wifi.snr_db();
    let snr_quality = classify_snr_quality(snr_db);
    let (current_channel, current_frequency_ghz) = wifi
        .channel
        .as_deref()
        .map_or((None, None), parse_channel_info);

    let (same_channel_count, overlapping_count) =
        channel_congestion(current_channel, current_frequency_ghz, &nearby);
    let interference_level = classify_interference(snr_db, same_channel_count, overlapping_count);

    let suggestions = suggestions(&Congestion {
        snr_db,
        snr_quality,
        channel: current_channel,
        frequency_ghz: current_frequency_ghz,
        same_channel: same_channel_count,
        overlapping: overlapping_count,
        nearby_5ghz: nearby.iter().filter(|n| n.frequency_ghz >= 5.0).count(),
    });

    debug!(
        ?snr_db,
        channel = ?current_channel,
        same_channel_count,
        overlapping_count,
        nearby = nearby.len(),
        level = %interference_level,
        "interference analysis complete"
    );

    nearby.truncate(MAX_NEARBY_NETWORKS);

    InterferenceAnalysis {
        snr_db,
        snr_quality,
        current_channel,
        current_frequency_ghz,
        same_channel_count,
        overlapping_count,
        nearby_networks: nearby,
        interference_level,
        suggestions,
    }
}

// ── Channel descriptor parsing ──────────────────────────────────────

/// Extract channel number and band from a descriptor like
/// `"ch 149, 5 GHz, 80 MHz"`. Without an explicit band, channels up to 14
/// are assumed to be 2.4 GHz and anything above 5 GHz.
pub fn parse_channel_info(descriptor: &str) -> (Option<u32>, Option<f64>) {
    let Some(channel) = first_capture(&CHANNEL_RE, descriptor) else {
        return (None, None);
    };
    let frequency = first_capture(&GHZ_RE, descriptor).unwrap_or_else(|| default_band(channel));
    (Some(channel), Some(frequency))
}

fn default_band(channel: u32) -> f64 {
    if channel <= 14 { 2.4 } else { 5.0 }
}

/// Parse the first capture group of `re` in `s`. A pattern that failed to
/// compile matches nothing.
fn first_capture<T: FromStr>(re: &LazyLock<Option<Regex>>, s: &str) -> Option<T> {
    re.as_ref()?.captures(s)?.get(1)?.as_str().parse().ok()
}

// ── Scoring ─────────────────────────────────────────────────────────

pub fn classify_snr_quality(snr_db: Option<i32>) -> SnrQuality {
    match snr_db {
        Some(s) if s >= 40 => SnrQuality::Excellent,
        Some(s) if s >= 25 => SnrQuality::Good,
        Some(s) if s >= 15 => SnrQuality::Fair,
        Some(s) if s >= 10 => SnrQuality::Poor,
        Some(_) => SnrQuality::VeryPoor,
        None => SnrQuality::Unknown,
    }
}

/// Count neighbours on the same channel and on overlapping channels.
pub fn channel_congestion(
    channel: Option<u32>,
    frequency_ghz: Option<f64>,
    nearby: &[NearbyNetwork],
) -> (u32, u32) {
    let Some(mine) = channel else {
        return (0, 0);
    };
    let on_2ghz = frequency_ghz.unwrap_or_else(|| default_band(mine)) < 3.0;

    let mut same = 0_u32;
    let mut overlapping = 0_u32;
    for network in nearby {
        if network.channel == mine {
            same += 1;
        } else if on_2ghz && network.is_2ghz() {
            if network.channel.abs_diff(mine) <= OVERLAP_SPAN_2GHZ {
                overlapping += 1;
            }
        } else if !on_2ghz
            && network.frequency_ghz >= 5.0
            && (center_mhz_5ghz(mine) - center_mhz_5ghz(network.channel)).abs()
                < OVERLAP_WIDTH_5GHZ_MHZ
        {
            overlapping += 1;
        }
    }
    (same, overlapping)
}

fn center_mhz_5ghz(channel: u32) -> f64 {
    5000.0 + f64::from(channel) * 5.0
}

/// Combine SNR and congestion into a single level.
pub fn classify_interference(
    snr_db: Option<i32>,
    same_channel: u32,
    overlapping: u32,
) -> InterferenceLevel {
    let snr_score = match snr_db {
        Some(s) if s >= 40 => 0,
        None | Some(25..) => 1,
        Some(15..) => 2,
        Some(_) => 3,
    };

    let congestion_score = match (same_channel, overlapping) {
        (0, 0) => 0,
        (0, o) if o <= 2 => 1,
        (s, _) if s <= 1 => 1,
        (s, o) if s <= 2 && o <= 3 => 2,
        _ => 3,
    };

    match snr_score + congestion_score {
        0..=1 => InterferenceLevel::Low,
        2..=3 => InterferenceLevel::Moderate,
        4..=5 => InterferenceLevel::High,
        _ => InterferenceLevel::Severe,
    }
}

// ── Suggestions ─────────────────────────────────────────────────────

struct Congestion {
    snr_db: Option<i32>,
    snr_quality: SnrQuality,
    channel: Option<u32>,
    frequency_ghz: Option<f64>,
    same_channel: u32,
    overlapping: u32,
    nearby_5ghz: usize,
}

fn suggestions(c: &Congestion) -> Vec<String> {
    let mut out = Vec::new();
    let on_2ghz = c.frequency_ghz.is_some_and(|f| f < 3.0);

    if c.snr_db.is_some_and(|s| s < 15) {
        out.push("Move closer to your router or remove physical obstructions".to_owned());
    }
    if c.same_channel >= 2 {
        out.push(format!(
            "{} networks on the same channel. Consider changing to a less congested channel",
            c.same_channel
        ));
    }
    if c.overlapping >= 3 {
        out.push("Many overlapping networks. Try using 5 GHz if available".to_owned());
    }
    if on_2ghz && c.nearby_5ghz < 3 {
        out.push("Consider switching to 5 GHz band for less interference".to_owned());
    }
    if let Some(ch) = c.channel.filter(|ch| on_2ghz && !NON_OVERLAPPING_2GHZ.contains(ch)) {
        out.push(format!(
            "Channel {ch} overlaps with neighbors. Use channel 1, 6, or 11 on 2.4 GHz"
        ));
    }
    if c.snr_quality == SnrQuality::Excellent && c.same_channel == 0 && c.overlapping <= 1 {
        out.push("Your Wi-Fi environment looks good!".to_owned());
    }
    if out.is_empty() {
        out.push("No major issues detected".to_owned());
    }
    out
}
