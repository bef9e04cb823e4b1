// ── Runtime configuration for the monitor ──
//
// Built by `whyfi-config` from file/env layers, or constructed directly
// in tests. No I/O happens here.

use std::time::Duration;

use whyfi_api::TransportConfig;

use crate::speedtest::SpeedTestPlan;

/// Default telemetry cadence.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(3000);
/// Default samples retained per history channel.
pub const DEFAULT_HISTORY_CAPACITY: usize = 30;
/// Default completion model.
pub const DEFAULT_MODEL: &str = "gpt-5-mini";
/// Default samples per channel rendered into the diagnosis prompt.
pub const DEFAULT_PROMPT_SAMPLES: usize = 10;

/// Configuration shared by the poller, speed pipeline and diagnosis engine.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Interval between telemetry polls, anchored to poller start.
    pub poll_interval: Duration,
    /// Ring buffer capacity per history channel.
    pub history_capacity: usize,
    /// Completion model identifier.
    pub model: String,
    /// How many trailing samples per channel go into the diagnosis prompt.
    pub prompt_samples: usize,
    /// Measurement phases run by a speed test.
    pub speed_plan: SpeedTestPlan,
    /// Endpoint root for the completion service.
    pub completion_base_url: String,
    /// Endpoint root for the speed-test server.
    pub speed_base_url: String,
    /// HTTP timeouts applied to both services.
    pub transport: TransportConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            model: DEFAULT_MODEL.into(),
            prompt_samples: DEFAULT_PROMPT_SAMPLES,
            speed_plan: SpeedTestPlan::default(),
            completion_base_url: whyfi_api::completion::DEFAULT_BASE_URL.into(),
            speed_base_url: whyfi_api::speed::DEFAULT_BASE_URL.into(),
            transport: TransportConfig::default(),
        }
    }
}
