//! Network-health telemetry engine behind the `whyfi` CLI.
//!
//! This crate owns the business logic and reactive state for Wi-Fi
//! diagnostics. It never touches the host or the network directly; every
//! external collaborator arrives through the traits in [`ports`].
//!
//! - **[`MetricsPoller`]**: single-flight polling loop. Pulls a
//!   [`MetricSnapshot`] on a fixed, start-anchored cadence, records it into
//!   the rolling [`MetricHistory`] and publishes [`PollerState`] through a
//!   `tokio::sync::watch` channel.
//!
//! - **[`Orchestrator`]**: runs at most one of the on-demand tasks
//!   (interference scan, speed test, AI diagnosis) and tracks their
//!   results behind a single [`ActivePanel`]. Late completions are
//!   fenced off by per-task generations.
//!
//! - **[`SpeedTestPipeline`]**: latency, download and upload phases
//!   aggregated into a [`SpeedTestResult`].
//!
//! - **[`DiagnosisEngine`]**: prompt rendering, completion dispatch and
//!   tolerant reply parsing into a [`DiagnosisResult`].
//!
//! - **[`status`]** and **[`interference`]**: pure classification and
//!   channel-congestion scoring.

pub mod config;
pub mod diagnosis;
pub mod error;
pub mod history;
pub mod interference;
pub mod model;
pub mod orchestrator;
pub mod poller;
pub mod ports;
pub mod speedtest;
pub mod status;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::MonitorConfig;
pub use diagnosis::{DiagnosisEngine, DiagnosisInput};
pub use error::{AcquisitionError, CoreError, DiagnosisError};
pub use history::{Channel, MetricHistory, RingBuffer};
pub use orchestrator::{ActivePanel, Orchestrator, OrchestratorState, TaskKind, TaskStart, TaskView};
pub use poller::{MetricsPoller, PollerHandle, PollerPhase, PollerState};
pub use ports::{
    CompletionService, MemorySettingsStore, MetricsSource, Ports, SettingsStore, SpeedProbe,
};
pub use speedtest::{PhaseKind, SpeedTestError, SpeedTestPipeline, SpeedTestPlan};
pub use status::HealthStatus;

// Re-export model types at the crate root for ergonomics.
pub use model::{
    // Diagnosis
    DiagnosisIssue,
    DiagnosisResult,
    // Telemetry
    DnsInfo,
    // Interference
    InterferenceAnalysis,
    InterferenceLevel,
    IssueSeverity,
    MetricSnapshot,
    NearbyNetwork,
    OverallHealth,
    PingResult,
    // Settings
    Settings,
    SnrQuality,
    // Speed test
    SpeedTestResult,
    WifiInfo,
};
