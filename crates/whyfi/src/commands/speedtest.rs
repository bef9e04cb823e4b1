//! Speed test command handler.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use whyfi_core::status::{classify_download, classify_speed_latency, classify_upload};
use whyfi_core::{Orchestrator, SpeedTestResult, TaskKind};

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;
use crate::output;
use crate::source::RecordedSource;

use super::{await_task, fmt_opt};

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let loaded = config::load(global)?;
    let orch = config::orchestrator(&loaded, global, Arc::new(RecordedSource::default()))?;

    let result = run(&orch, global).await?;

    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &result,
        |r| detail(r, color),
        |r| {
            format!(
                "{:.2}\n{:.2}\n{:.2}\n{:.2}",
                r.download_mbps, r.upload_mbps, r.latency_ms, r.jitter_ms
            )
        },
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

/// Start a speed test on `orch` and wait for it, showing the status line
/// on a spinner when stderr is a terminal.
pub async fn run(orch: &Orchestrator, global: &GlobalOpts) -> Result<SpeedTestResult, CliError> {
    orch.start_speed_test()?;

    let spinner = spinner(global.quiet);
    let outcome = await_task(
        orch,
        TaskKind::SpeedTest,
        |s| &s.speed_test,
        |s| {
            if !s.speed_status.is_empty() {
                spinner.set_message(s.speed_status.clone());
            }
        },
    )
    .await;
    spinner.finish_and_clear();

    outcome?.map_err(|message| CliError::SpeedTest { message })
}

fn spinner(quiet: bool) -> ProgressBar {
    if quiet || !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn detail(r: &SpeedTestResult, color: bool) -> String {
    [
        format!(
            "Download:  {}",
            output::with_status(
                &fmt_opt(Some(r.download_mbps), "Mbps"),
                classify_download(Some(r.download_mbps)),
                color
            )
        ),
        format!(
            "Upload:    {}",
            output::with_status(
                &fmt_opt(Some(r.upload_mbps), "Mbps"),
                classify_upload(Some(r.upload_mbps)),
                color
            )
        ),
        format!(
            "Latency:   {}",
            output::with_status(
                &fmt_opt(Some(r.latency_ms), "ms"),
                classify_speed_latency(Some(r.latency_ms)),
                color
            )
        ),
        format!(
            "Jitter:    {}",
            output::with_status(
                &fmt_opt(Some(r.jitter_ms), "ms"),
                classify_speed_latency(Some(r.jitter_ms)),
                color
            )
        ),
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_classifies_each_figure() {
        let result = SpeedTestResult {
            download_mbps: 120.0,
            upload_mbps: 5.0,
            latency_ms: 150.0,
            jitter_ms: 4.0,
        };
        let text = detail(&result, false);
        assert!(text.contains("Download:  120.0 Mbps  [good]"));
        assert!(text.contains("Upload:    5.0 Mbps  [warning]"));
        assert!(text.contains("Latency:   150.0 ms  [bad]"));
        assert!(text.contains("Jitter:    4.0 ms  [good]"));
    }
}
