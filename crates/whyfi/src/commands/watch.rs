//! Watch command: drives the metrics poller over a recording and prints
//! each reading as it lands, then a history summary.
//!
//! The poller publishes through a `watch` channel, which keeps only the
//! latest state. If several polls land before a reading is printed, only
//! the newest snapshot is shown; the skipped ones still reach the history
//! summary and are reported with a warning.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use strum::IntoEnumIterator;
use tabled::Tabled;

use whyfi_core::status::{
    classify_channel, classify_jitter, classify_link_rate, classify_ping, classify_signal,
};
use whyfi_core::{Channel, MetricHistory, MetricSnapshot, MetricsPoller, PingResult};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::config;
use crate::error::CliError;
use crate::output;
use crate::source::{self, RecordedSource};

use super::fmt_opt;

#[derive(Tabled)]
struct ChannelRow {
    #[tabled(rename = "Metric")]
    metric: &'static str,
    #[tabled(rename = "Latest")]
    latest: String,
    #[tabled(rename = "Min")]
    min: String,
    #[tabled(rename = "Max")]
    max: String,
    #[tabled(rename = "Samples")]
    samples: usize,
}

pub async fn handle(args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let snapshots = source::load_snapshots(&args.snapshots)?;
    let loaded = config::load(global)?;
    let mut monitor = config::monitor_config(&loaded, global)?;
    if let Some(ms) = args.interval_ms {
        if ms == 0 {
            return Err(CliError::Validation {
                field: "interval-ms".into(),
                reason: "must be greater than zero".into(),
            });
        }
        monitor.poll_interval = Duration::from_millis(ms);
    }

    let source = Arc::new(RecordedSource::new(snapshots, None));
    let count = args
        .count
        .unwrap_or_else(|| u64::try_from(source.recorded()).unwrap_or(u64::MAX));
    if count == 0 {
        return Ok(());
    }

    let color = output::should_color(&global.color);
    let poller = MetricsPoller::spawn(source, &monitor);
    let mut rx = poller.subscribe();
    let mut seen = 0_u64;

    let history = loop {
        let state = rx.borrow_and_update().clone();
        if state.polls > seen {
            let skipped = state.polls - seen - 1;
            if skipped > 0 {
                tracing::warn!(skipped, "readings merged before they could be printed");
            }
            seen = state.polls;
            if let Some(snap) = &state.snapshot {
                let line = reading_line(&global.output, seen, state.last_updated, snap, color);
                output::print_output(&line, global.quiet);
            }
        } else if let Some(error) = &state.error {
            tracing::warn!(%error, "poll failed, stopping");
            break state.history;
        }
        if seen >= count {
            break state.history;
        }

        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => {
                poller.shutdown().await;
                return Err(CliError::Interrupted);
            }
            changed = rx.changed() => {
                if changed.is_err() {
                    break state.history;
                }
            }
        }
    };
    poller.shutdown().await;

    if matches!(global.output, OutputFormat::Table) {
        output::print_output(&summary(&history), global.quiet);
    }
    Ok(())
}

// ── Rendering ───────────────────────────────────────────────────────

fn reading_line(
    format: &OutputFormat,
    n: u64,
    at: Option<DateTime<Utc>>,
    snap: &MetricSnapshot,
    color: bool,
) -> String {
    match format {
        OutputFormat::Table => live_line(n, at, snap, color),
        OutputFormat::Plain => format!(
            "{n}\t{}\t{}\t{}",
            snap.wifi.signal_dbm.map_or_else(|| "-".into(), |d| d.to_string()),
            ping_ms(snap.router_ping.as_ref()).map_or_else(|| "-".into(), |v| v.to_string()),
            ping_ms(snap.internet_ping.as_ref()).map_or_else(|| "-".into(), |v| v.to_string()),
        ),
        // One document per line so the stream stays parseable.
        OutputFormat::Json | OutputFormat::JsonCompact => output::render_json_compact(snap),
        OutputFormat::Yaml => output::render_yaml_document(snap),
    }
}

fn ping_ms(ping: Option<&PingResult>) -> Option<f64> {
    ping.and_then(|p| p.latency_ms)
}

fn live_line(n: u64, at: Option<DateTime<Utc>>, snap: &MetricSnapshot, color: bool) -> String {
    let time = at.map_or_else(
        || "--:--:--".into(),
        |t| t.with_timezone(&Local).format("%H:%M:%S").to_string(),
    );
    let signal = snap.wifi.signal_dbm.map(f64::from);
    let router = ping_ms(snap.router_ping.as_ref());
    let internet = ping_ms(snap.internet_ping.as_ref());
    let jitter = snap.internet_ping.and_then(|p| p.jitter_ms);
    let link = snap.wifi.link_rate_mbps;

    let ssid = if snap.wifi.connected {
        snap.wifi.ssid.as_deref().unwrap_or("(hidden)")
    } else {
        "(disconnected)"
    };

    format!(
        "{time} #{n:<3} {ssid}  signal {}  link {}  router {}  internet {}  jitter {}  dns {}",
        output::paint(&fmt_opt(signal, "dBm"), classify_signal(signal), color),
        output::paint(&fmt_opt(link, "Mbps"), classify_link_rate(link), color),
        output::paint(&fmt_opt(router, "ms"), classify_ping(router), color),
        output::paint(&fmt_opt(internet, "ms"), classify_ping(internet), color),
        output::paint(&fmt_opt(jitter, "ms"), classify_jitter(jitter), color),
        output::paint(
            &fmt_opt(snap.dns.lookup_latency_ms, "ms"),
            classify_ping(snap.dns.lookup_latency_ms),
            color
        ),
    )
}

/// Display value for a stored history sample. Signal and noise are kept
/// as magnitudes and shown as negative dBm again.
fn display_value(channel: Channel, value: f64) -> f64 {
    if channel.stores_magnitude() {
        -value
    } else {
        value
    }
}

fn summary(history: &MetricHistory) -> String {
    let rows: Vec<ChannelRow> = Channel::iter()
        .map(|channel| {
            let values: Vec<f64> = history
                .snapshot(channel)
                .into_iter()
                .map(|v| display_value(channel, v))
                .collect();
            let shown = |v: f64| fmt_opt(Some(v), channel.unit());
            let min = values.iter().copied().reduce(f64::min);
            let max = values.iter().copied().reduce(f64::max);
            let latest = history.latest(channel).map_or_else(
                || "-".into(),
                |v| {
                    format!(
                        "{}  [{}]",
                        shown(display_value(channel, v)),
                        classify_channel(channel, v)
                    )
                },
            );
            ChannelRow {
                metric: channel.label(),
                latest,
                min: min.map_or_else(|| "-".into(), shown),
                max: max.map_or_else(|| "-".into(), shown),
                samples: history.len_of(channel),
            }
        })
        .collect();
    output::render_table(&rows)
}
