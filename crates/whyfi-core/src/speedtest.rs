// ── Speed measurement pipeline ──
//
// Runs a plan of latency / download / upload phases against a `SpeedProbe`
// and reduces the per-request timings to a `SpeedTestResult` using the
// same rules as Cloudflare's speed-test engine.

use std::time::Duration;

use strum::Display;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use whyfi_api::Transfer;

use crate::model::SpeedTestResult;
use crate::ports::SpeedProbe;

/// Bandwidth trials shorter than this are too noisy to count, unless
/// nothing else is available.
const MIN_BANDWIDTH_DURATION: Duration = Duration::from_millis(10);
/// Percentile used for the bandwidth figure.
const BANDWIDTH_PERCENTILE: f64 = 0.9;

// ── Plan ────────────────────────────────────────────────────────────

/// Measurement family a phase belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum PhaseKind {
    Latency,
    Download,
    Upload,
}

impl PhaseKind {
    /// Status line shown while this family runs.
    pub fn status_line(self) -> &'static str {
        match self {
            Self::Latency => "Testing latency...",
            Self::Download => "Testing download...",
            Self::Upload => "Testing upload...",
        }
    }
}

/// One step of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measurement {
    /// `packets` empty round trips.
    Latency { packets: u32 },
    /// `count` downloads of `bytes` each.
    Download { bytes: u64, count: u32 },
    /// `count` uploads of `bytes` each.
    Upload { bytes: u64, count: u32 },
}

impl Measurement {
    pub fn kind(self) -> PhaseKind {
        match self {
            Self::Latency { .. } => PhaseKind::Latency,
            Self::Download { .. } => PhaseKind::Download,
            Self::Upload { .. } => PhaseKind::Upload,
        }
    }
}

/// Ordered list of measurements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeedTestPlan {
    pub measurements: Vec<Measurement>,
}

impl Default for SpeedTestPlan {
    fn default() -> Self {
        Self {
            measurements: vec![
                Measurement::Latency { packets: 20 },
                Measurement::Download { bytes: 1_000_000, count: 4 },
                Measurement::Download { bytes: 10_000_000, count: 4 },
                Measurement::Download { bytes: 25_000_000, count: 4 },
                Measurement::Upload { bytes: 1_000_000, count: 4 },
                Measurement::Upload { bytes: 5_000_000, count: 4 },
                Measurement::Upload { bytes: 10_000_000, count: 4 },
            ],
        }
    }
}

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SpeedTestError {
    /// The run was paused. Callers drop this silently.
    #[error("speed test cancelled")]
    Cancelled,

    #[error("{0}")]
    Probe(#[from] whyfi_api::Error),
}

// ── Pipeline ────────────────────────────────────────────────────────

/// Executes a [`SpeedTestPlan`].
pub struct SpeedTestPipeline;

impl SpeedTestPipeline {
    /// Run every measurement in order.
    ///
    /// `progress` is called whenever the measurement family changes. Once
    /// `cancel` fires, no further progress is reported and the run ends
    /// with [`SpeedTestError::Cancelled`].
    pub async fn run<F>(
        probe: &dyn SpeedProbe,
        plan: &SpeedTestPlan,
        mut progress: F,
        cancel: &CancellationToken,
    ) -> Result<SpeedTestResult, SpeedTestError>
    where
        F: FnMut(PhaseKind) + Send,
    {
        let mut samples = Samples::default();
        let mut current: Option<PhaseKind> = None;

        for measurement in &plan.measurements {
            let kind = measurement.kind();
            if current != Some(kind) {
                if cancel.is_cancelled() {
                    return Err(SpeedTestError::Cancelled);
                }
                debug!(phase = %kind, "speed test phase");
                progress(kind);
                current = Some(kind);
            }

            match *measurement {
                Measurement::Latency { packets } => {
                    for _ in 0..packets {
                        let t = guarded(cancel, probe.latency()).await?;
                        samples.latency.push(t.network_time());
                    }
                }
                Measurement::Download { bytes, count } => {
                    for _ in 0..count {
                        let t = guarded(cancel, probe.download(bytes)).await?;
                        samples.download.push(t);
                    }
                }
                Measurement::Upload { bytes, count } => {
                    for _ in 0..count {
                        let t = guarded(cancel, probe.upload(bytes)).await?;
                        samples.upload.push(t);
                    }
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(SpeedTestError::Cancelled);
        }

        let result = samples.summarize();
        info!(
            download_mbps = result.download_mbps,
            upload_mbps = result.upload_mbps,
            latency_ms = result.latency_ms,
            jitter_ms = result.jitter_ms,
            "speed test complete"
        );
        Ok(result)
    }
}

/// Await `fut` unless `cancel` fires first.
async fn guarded<F>(cancel: &CancellationToken, fut: F) -> Result<Transfer, SpeedTestError>
where
    F: Future<Output = Result<Transfer, whyfi_api::Error>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(SpeedTestError::Cancelled),
        r = fut => {
            if cancel.is_cancelled() {
                return Err(SpeedTestError::Cancelled);
            }
            Ok(r?)
        }
    }
}

// ── Aggregation ─────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Samples {
    latency: Vec<Duration>,
    download: Vec<Transfer>,
    upload: Vec<Transfer>,
}

impl Samples {
    fn summarize(&self) -> SpeedTestResult {
        let rtts: Vec<f64> = self
            .latency
            .iter()
            .map(|d| d.as_secs_f64() * 1000.0)
            .collect();
        SpeedTestResult {
            download_mbps: bandwidth_bps(&self.download).map_or(0.0, bytes_per_sec_to_mbps),
            upload_mbps: bandwidth_bps(&self.upload).map_or(0.0, bytes_per_sec_to_mbps),
            latency_ms: median(&rtts).unwrap_or(0.0),
            jitter_ms: jitter(&rtts).unwrap_or(0.0),
        }
    }
}

/// Bytes per second to megabits per second.
pub fn bytes_per_sec_to_mbps(bytes_per_sec: f64) -> f64 {
    bytes_per_sec * 8.0 / 1_000_000.0
}

pub fn median(values: &[f64]) -> Option<f64> {
    percentile(values, 0.5)
}

/// Mean absolute difference between consecutive values.
pub fn jitter(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let diffs: Vec<f64> = values.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
    Some(mean(&diffs))
}

/// Linear-interpolated percentile, `p` in `0.0..=1.0`.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = p.clamp(0.0, 1.0) * to_f64(sorted.len() - 1);
    let lower = rank.floor();
    let frac = rank - lower;
    let lo = sorted.get(to_index(lower))?;
    let hi = sorted.get(to_index(rank.ceil())).unwrap_or(lo);
    Some(lo + (hi - lo) * frac)
}

/// Per-direction bandwidth in bytes/sec: the 90th percentile of trial
/// throughputs, skipping trials under 10 ms unless none are longer.
pub fn bandwidth_bps(transfers: &[Transfer]) -> Option<f64> {
    let throughput = |t: &Transfer| {
        let secs = t.network_time().as_secs_f64();
        (secs > 0.0).then(|| bytes_to_f64(t.bytes) / secs)
    };

    let long: Vec<f64> = transfers
        .iter()
        .filter(|t| t.network_time() >= MIN_BANDWIDTH_DURATION)
        .filter_map(throughput)
        .collect();
    let usable = if long.is_empty() {
        transfers.iter().filter_map(throughput).collect()
    } else {
        long
    };
    percentile(&usable, BANDWIDTH_PERCENTILE)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / to_f64(values.len())
}

#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
fn to_f64(n: usize) -> f64 {
    n as f64
}

#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
fn bytes_to_f64(n: u64) -> f64 {
    n as f64
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::as_conversions
)]
fn to_index(rank: f64) -> usize {
    rank.max(0.0) as usize
}
