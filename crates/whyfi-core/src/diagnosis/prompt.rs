// ── Diagnosis prompt rendering ──
//
// Deterministic text rendering of everything the monitor knows. The same
// input always yields byte-identical output.

use std::fmt::Write as _;

use crate::history::{Channel, MetricHistory};
use crate::model::{InterferenceAnalysis, MetricSnapshot, SpeedTestResult};

/// Everything fed to a diagnosis.
#[derive(Debug, Clone, Default)]
pub struct DiagnosisInput {
    pub snapshot: Option<MetricSnapshot>,
    pub history: MetricHistory,
    pub interference: Option<InterferenceAnalysis>,
    pub speed_test: Option<SpeedTestResult>,
}

const PREAMBLE: &str = "You are a Wi-Fi network diagnostic expert. Analyze the following network metrics and provide actionable recommendations to improve the user's Wi-Fi experience.

The data below includes time series measurements (oldest to newest) to help you identify trends and patterns.

## Network Configuration
";

const INSTRUCTIONS: &str = r#"
## Instructions
Analyze the above data and respond with a JSON object in this exact format:
{
  "summary": "A one-paragraph summary of the overall network health and main findings",
  "overallHealth": "good" | "warning" | "poor",
  "issues": [
    {
      "description": "Description of an identified issue",
      "severity": "high" | "medium" | "low"
    }
  ],
  "recommendations": [
    "Specific actionable recommendation"
  ]
}

Guidelines:
- Provide exactly the top 3 most important issues, prioritized by severity and impact
- Provide exactly 3 highly actionable recommendations, prioritized by impact (most impactful first)
- Recommendations must be specific actions the user can take immediately (e.g., "Move your router away from the microwave" not "Reduce interference")
- Analyze the time series data for trends: improving, degrading, stable, or intermittent patterns
- Look for correlations between metrics (e.g., signal drops coinciding with latency spikes)
- Signal strength: -30 to -50 dBm is excellent, -50 to -60 is good, -60 to -70 is fair, below -70 is weak
- Ping latency: under 20ms is excellent, 20-50ms is good, 50-100ms is acceptable, over 100ms is problematic
- Any packet loss above 0% is concerning
- If interference analysis is available, consider channel congestion
- Respond ONLY with the JSON object, no additional text
"#;

/// Render the diagnosis prompt, including at most `samples` trailing
/// values per history channel.
pub fn build_prompt(input: &DiagnosisInput, samples: usize) -> String {
    let mut out = String::from(PREAMBLE);

    if let Some(snap) = &input.snapshot {
        let dns = if snap.dns.servers.is_empty() {
            "None configured".to_owned()
        } else {
            snap.dns.servers.join(", ")
        };
        let _ = write!(
            out,
            "- Frequency Band: {}\n- Channel: {}\n- DNS Servers: {dns}\n",
            or_unknown(snap.wifi.frequency_band.as_deref()),
            or_unknown(snap.wifi.channel.as_deref()),
        );
    }

    let h = &input.history;
    let sample_count = h.len_of(Channel::Signal).min(samples);
    let series = |c: Channel| format_series(h, c, samples);

    let _ = write!(
        out,
        "
## Time Series Metrics ({sample_count} samples, oldest to newest)

### Wi-Fi Signal Quality
- Signal Strength (dBm): {}
- Noise Level (dBm): {}
- Link Rate (Mbps): {}

### Router Connection
- Latency (ms): {}
- Jitter (ms): {}
- Packet Loss (%): {}

### Internet Connection (to 1.1.1.1)
- Latency (ms): {}
- Jitter (ms): {}
- Packet Loss (%): {}

### DNS
- Lookup Latency (ms): {}
",
        series(Channel::Signal),
        series(Channel::Noise),
        series(Channel::LinkRate),
        series(Channel::RouterPing),
        series(Channel::RouterJitter),
        series(Channel::RouterLoss),
        series(Channel::InternetPing),
        series(Channel::InternetJitter),
        series(Channel::InternetLoss),
        series(Channel::DnsLookup),
    );

    if let Some(a) = &input.interference {
        let snr = a
            .snr_db
            .map_or_else(|| "Unknown".to_owned(), |db| format!("{db} dB"));
        let channel = a
            .current_channel
            .filter(|c| *c != 0)
            .map_or_else(|| "Unknown".to_owned(), |c| c.to_string());
        let _ = write!(
            out,
            "
### Interference Analysis
- Interference Level: {}
- Signal-to-Noise Ratio: {snr} ({})
- Current Channel: {channel}
- Networks on Same Channel: {}
- Overlapping Networks: {}
- Total Nearby Networks: {}
",
            a.interference_level,
            a.snr_quality,
            a.same_channel_count,
            a.overlapping_count,
            a.nearby_networks.len(),
        );
    }

    if let Some(s) = &input.speed_test {
        let _ = write!(
            out,
            "
### Speed Test Results
- Download Speed: {:.1} Mbps
- Upload Speed: {:.1} Mbps
- Latency: {:.0} ms
- Jitter: {:.0} ms
",
            s.download_mbps, s.upload_mbps, s.latency_ms, s.jitter_ms,
        );
    }

    out.push_str(INSTRUCTIONS);
    out
}

fn or_unknown(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or("Unknown")
}

/// `[a, b, c] unit`, or `No data` for an empty channel.
fn format_series(history: &MetricHistory, channel: Channel, samples: usize) -> String {
    let values = history.tail(channel, samples);
    if values.is_empty() {
        return "No data".to_owned();
    }
    let joined = values
        .iter()
        .map(f64::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{joined}] {}", channel.unit())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{
        DnsInfo, InterferenceLevel, NearbyNetwork, PingResult, SnrQuality, WifiInfo,
    };

    fn snapshot() -> MetricSnapshot {
        MetricSnapshot {
            wifi: WifiInfo {
                connected: true,
                ssid: Some("home".into()),
                frequency_band: Some("5 GHz".into()),
                channel: Some("ch 149, 5 GHz, 80 MHz".into()),
                link_rate_mbps: Some(866.0),
                signal_dbm: Some(-58),
                noise_dbm: Some(-92),
            },
            router_ip: Some("192.168.1.1".into()),
            router_ping: Some(PingResult {
                latency_ms: Some(2.5),
                jitter_ms: Some(0.5),
                packet_loss_percent: Some(0.0),
            }),
            internet_ping: None,
            dns: DnsInfo {
                servers: vec!["1.1.1.1".into(), "8.8.8.8".into()],
                lookup_latency_ms: Some(14.0),
            },
        }
    }

    #[test]
    fn empty_history_renders_no_data() {
        let prompt = build_prompt(&DiagnosisInput::default(), 10);
        assert!(prompt.contains("## Time Series Metrics (0 samples, oldest to newest)"));
        assert!(prompt.contains("- Signal Strength (dBm): No data"));
        assert!(prompt.contains("- Lookup Latency (ms): No data"));
        assert!(!prompt.contains("## Network Configuration\n- Frequency Band"));
        assert!(!prompt.contains("### Interference Analysis"));
        assert!(!prompt.contains("### Speed Test Results"));
        assert!(prompt.ends_with("- Respond ONLY with the JSON object, no additional text\n"));
    }

    #[test]
    fn renders_configuration_and_series() {
        let snap = snapshot();
        let mut history = MetricHistory::new(30);
        history.record(&snap);
        history.record(&snap);

        let prompt = build_prompt(
            &DiagnosisInput {
                snapshot: Some(snap),
                history,
                ..DiagnosisInput::default()
            },
            10,
        );

        assert!(prompt.contains(
            "## Network Configuration\n- Frequency Band: 5 GHz\n- Channel: ch 149, 5 GHz, 80 MHz\n- DNS Servers: 1.1.1.1, 8.8.8.8\n"
        ));
        assert!(prompt.contains("(2 samples, oldest to newest)"));
        assert!(prompt.contains("- Signal Strength (dBm): [58, 58] dBm"));
        assert!(prompt.contains("- Link Rate (Mbps): [866, 866] Mbps"));
        assert!(prompt.contains("### Router Connection\n- Latency (ms): [2.5, 2.5] ms"));
        assert!(prompt.contains(
            "### Internet Connection (to 1.1.1.1)\n- Latency (ms): [0, 0] ms"
        ));
    }

    #[test]
    fn only_last_samples_are_rendered() {
        let mut history = MetricHistory::new(30);
        for v in 1..=25 {
            history.push(Channel::Signal, f64::from(v));
        }
        let prompt = build_prompt(
            &DiagnosisInput {
                history,
                ..DiagnosisInput::default()
            },
            10,
        );
        assert!(prompt.contains("(10 samples, oldest to newest)"));
        assert!(prompt.contains(
            "- Signal Strength (dBm): [16, 17, 18, 19, 20, 21, 22, 23, 24, 25] dBm"
        ));
    }

    #[test]
    fn renders_optional_sections() {
        let input = DiagnosisInput {
            interference: Some(InterferenceAnalysis {
                snr_db: Some(34),
                snr_quality: SnrQuality::Good,
                current_channel: Some(149),
                current_frequency_ghz: Some(5.0),
                same_channel_count: 1,
                overlapping_count: 2,
                nearby_networks: vec![NearbyNetwork {
                    ssid: "neighbour".into(),
                    channel: 149,
                    frequency_ghz: 5.0,
                }],
                interference_level: InterferenceLevel::Moderate,
                suggestions: vec![],
            }),
            speed_test: Some(SpeedTestResult {
                download_mbps: 312.46,
                upload_mbps: 40.04,
                latency_ms: 11.6,
                jitter_ms: 2.2,
            }),
            ..DiagnosisInput::default()
        };

        let prompt = build_prompt(&input, 10);
        assert!(prompt.contains(
            "
### Interference Analysis
- Interference Level: Moderate
- Signal-to-Noise Ratio: 34 dB (Good)
- Current Channel: 149
- Networks on Same Channel: 1
- Overlapping Networks: 2
- Total Nearby Networks: 1
"
        ));
        assert!(prompt.contains(
            "
### Speed Test Results
- Download Speed: 312.5 Mbps
- Upload Speed: 40.0 Mbps
- Latency: 12 ms
- Jitter: 2 ms
"
        ));
    }

    #[test]
    fn rendering_is_deterministic() {
        let input = DiagnosisInput {
            snapshot: Some(snapshot()),
            ..DiagnosisInput::default()
        };
        assert_eq!(build_prompt(&input, 10), build_prompt(&input, 10));
    }
}
