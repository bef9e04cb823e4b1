//! AI diagnosis command handler.
//!
//! Replays the recorded snapshots into the history the prompt is built
//! from, optionally runs an interference scan and a speed test so their
//! results are included, then asks the completion service for a report.

use std::sync::Arc;

use tabled::Tabled;
use tokio::sync::watch;

use whyfi_core::status::classify_overall_health;
use whyfi_core::{DiagnosisResult, IssueSeverity, PollerState, TaskKind};

use crate::cli::{DiagnoseArgs, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;
use crate::source::{self, RecordedSource};

use super::{await_task, interference, speedtest};

#[derive(Tabled)]
struct IssueRow {
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Issue")]
    description: String,
}

pub async fn handle(args: DiagnoseArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let snapshots = source::load_snapshots(&args.snapshots)?;
    let scan = args.scan.as_deref().map(source::load_scan).transpose()?;
    let has_scan = scan.is_some();

    let loaded = config::load(global)?;
    let orch = config::orchestrator(
        &loaded,
        global,
        Arc::new(RecordedSource::new(Vec::new(), scan)),
    )?;
    if !orch.diagnosis_available() {
        return Err(CliError::NoApiKey);
    }

    if snapshots.is_empty() {
        tracing::warn!("recording holds no snapshots; diagnosing without telemetry");
    }
    let telemetry = PollerState::replay(snapshots, loaded.config.monitor.history_capacity);
    let (_telemetry_tx, telemetry_rx) = watch::channel(telemetry);
    orch.attach_telemetry(telemetry_rx);

    if has_scan {
        interference::run(&orch).await?;
    }
    if args.speedtest {
        speedtest::run(&orch, global).await?;
    }

    orch.start_diagnosis()?;
    let report = await_task(&orch, TaskKind::Diagnosis, |s| &s.diagnosis, |_| {})
        .await?
        .map_err(CliError::from_diagnosis_message)?;

    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &report,
        |r| detail(r, color),
        |r| r.overall_health.to_string(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

fn detail(r: &DiagnosisResult, color: bool) -> String {
    let health = classify_overall_health(r.overall_health);
    let mut lines = vec![
        format!(
            "Health:   {}",
            output::paint(&r.overall_health.to_string(), health, color)
        ),
        format!("Summary:  {}", r.summary),
    ];

    if !r.issues.is_empty() {
        let mut issues: Vec<_> = r.issues.iter().collect();
        issues.sort_by_key(|i| i.severity);
        let rows: Vec<IssueRow> = issues
            .into_iter()
            .map(|i| IssueRow {
                severity: output::paint(&i.severity.to_string(), severity_status(i.severity), color),
                description: i.description.clone(),
            })
            .collect();
        lines.push(String::new());
        lines.push(output::render_table(&rows));
    }

    if !r.recommendations.is_empty() {
        lines.push(String::new());
        lines.push("Recommendations:".into());
        lines.extend(
            r.recommendations
                .iter()
                .enumerate()
                .map(|(n, rec)| format!("  {}. {rec}", n + 1)),
        );
    }

    lines.join("\n")
}

fn severity_status(severity: IssueSeverity) -> whyfi_core::HealthStatus {
    match severity {
        IssueSeverity::High => whyfi_core::HealthStatus::Bad,
        IssueSeverity::Medium => whyfi_core::HealthStatus::Warning,
        IssueSeverity::Low => whyfi_core::HealthStatus::Neutral,
    }
}
