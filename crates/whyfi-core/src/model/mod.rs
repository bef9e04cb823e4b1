// ── Domain model ──
//
// Canonical types shared by the poller, the diagnostic tasks and the
// consumers that render them.

pub mod diagnosis;
pub mod interference;
pub mod metrics;
pub mod settings;
pub mod speedtest;

pub use diagnosis::{DiagnosisIssue, DiagnosisResult, IssueSeverity, OverallHealth};
pub use interference::{
    InterferenceAnalysis, InterferenceLevel, MAX_NEARBY_NETWORKS, NearbyNetwork, SnrQuality,
};
pub use metrics::{DnsInfo, MetricSnapshot, PingResult, WifiInfo};
pub use settings::Settings;
pub use speedtest::SpeedTestResult;
