//! Interference scan command handler.

use std::sync::Arc;

use tabled::Tabled;

use whyfi_core::status::{classify_interference_level, classify_snr};
use whyfi_core::{InterferenceAnalysis, NearbyNetwork, Orchestrator, TaskKind};

use crate::cli::{GlobalOpts, InterferenceArgs};
use crate::config;
use crate::error::CliError;
use crate::output;
use crate::source::{self, RecordedSource};

use super::await_task;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct NetworkRow {
    #[tabled(rename = "SSID")]
    ssid: String,
    #[tabled(rename = "Channel")]
    channel: u32,
    #[tabled(rename = "Band")]
    band: String,
}

impl From<&NearbyNetwork> for NetworkRow {
    fn from(n: &NearbyNetwork) -> Self {
        Self {
            ssid: if n.ssid.is_empty() {
                "(hidden)".into()
            } else {
                n.ssid.clone()
            },
            channel: n.channel,
            band: format!("{} GHz", n.frequency_ghz),
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: InterferenceArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let scan = source::load_scan(&args.scan)?;
    let loaded = config::load(global)?;
    let orch = config::orchestrator(
        &loaded,
        global,
        Arc::new(RecordedSource::new(Vec::new(), Some(scan))),
    )?;

    let analysis = run(&orch).await?;

    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &analysis,
        |a| detail(a, color),
        |a| a.interference_level.to_string(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

/// Start an interference scan on `orch` and wait for it.
pub async fn run(orch: &Orchestrator) -> Result<InterferenceAnalysis, CliError> {
    orch.start_interference()?;
    await_task(orch, TaskKind::Interference, |s| &s.interference, |_| {})
        .await?
        .map_err(|message| CliError::Acquisition { message })
}

fn detail(a: &InterferenceAnalysis, color: bool) -> String {
    let snr = a
        .snr_db
        .map_or_else(|| "-".into(), |db| format!("{db} dB ({})", a.snr_quality));
    let channel = match (a.current_channel, a.current_frequency_ghz) {
        (Some(ch), Some(ghz)) => format!("{ch} ({ghz} GHz)"),
        (Some(ch), None) => ch.to_string(),
        _ => "-".into(),
    };

    let mut lines = vec![
        format!(
            "Level:         {}",
            output::with_status(
                &a.interference_level.to_string(),
                classify_interference_level(a.interference_level),
                color
            )
        ),
        format!(
            "SNR:           {}",
            output::with_status(&snr, classify_snr(a.snr_db), color)
        ),
        format!("Channel:       {channel}"),
        format!("Same channel:  {}", a.same_channel_count),
        format!("Overlapping:   {}", a.overlapping_count),
    ];

    if !a.suggestions.is_empty() {
        lines.push(String::new());
        lines.push("Suggestions:".into());
        lines.extend(a.suggestions.iter().map(|s| format!("  - {s}")));
    }

    if !a.nearby_networks.is_empty() {
        let rows: Vec<NetworkRow> = a.nearby_networks.iter().map(NetworkRow::from).collect();
        lines.push(String::new());
        lines.push(format!("Nearby networks ({}):", rows.len()));
        lines.push(output::render_table(&rows));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use whyfi_core::{InterferenceLevel, SnrQuality};

    use super::*;

    #[test]
    fn detail_lists_suggestions_and_networks() {
        let analysis = InterferenceAnalysis {
            snr_db: Some(37),
            snr_quality: SnrQuality::Excellent,
            current_channel: Some(6),
            current_frequency_ghz: Some(2.4),
            same_channel_count: 2,
            overlapping_count: 1,
            nearby_networks: vec![NearbyNetwork {
                ssid: String::new(),
                channel: 6,
                frequency_ghz: 2.4,
            }],
            interference_level: InterferenceLevel::Moderate,
            suggestions: vec!["Switch to channel 1".into()],
        };
        let text = detail(&analysis, false);
        assert!(text.contains("Level:         Moderate  [warning]"));
        assert!(text.contains("SNR:           37 dB (Excellent)  [good]"));
        assert!(text.contains("Channel:       6 (2.4 GHz)"));
        assert!(text.contains("  - Switch to channel 1"));
        assert!(text.contains("(hidden)"));
    }
}
