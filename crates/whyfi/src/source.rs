//! Telemetry replayed from JSON recordings.
//!
//! The collector that measures the link runs outside this binary and
//! writes what it saw to disk. `RecordedSource` feeds those files to the
//! core through the same `MetricsSource` port a live host would.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, ready};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use whyfi_core::interference::analyze;
use whyfi_core::{
    AcquisitionError, InterferenceAnalysis, MetricSnapshot, MetricsSource, NearbyNetwork, WifiInfo,
};

use crate::error::CliError;

/// A snapshot file holds either one object or an array, oldest first.
#[derive(Deserialize)]
#[serde(untagged)]
enum Recording {
    Many(Vec<MetricSnapshot>),
    One(Box<MetricSnapshot>),
}

/// A nearby-network scan together with the link it was taken from.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanRecording {
    pub wifi: WifiInfo,
    #[serde(default)]
    pub networks: Vec<NearbyNetwork>,
}

#[derive(Debug, Default)]
pub struct RecordedSource {
    snapshots: Vec<MetricSnapshot>,
    next: AtomicUsize,
    scan: Option<ScanRecording>,
}

impl RecordedSource {
    pub fn new(snapshots: Vec<MetricSnapshot>, scan: Option<ScanRecording>) -> Self {
        Self {
            snapshots,
            next: AtomicUsize::new(0),
            scan,
        }
    }

    /// Number of snapshots in the recording.
    pub fn recorded(&self) -> usize {
        self.snapshots.len()
    }
}

impl MetricsSource for RecordedSource {
    fn get_network_metrics(&self) -> BoxFuture<'_, Result<MetricSnapshot, AcquisitionError>> {
        let index = self.next.fetch_add(1, Ordering::Relaxed);
        let result = self
            .snapshots
            .get(index)
            .cloned()
            .ok_or_else(|| AcquisitionError::new("no more recorded snapshots"));
        ready(result).boxed()
    }

    fn check_interference(&self) -> BoxFuture<'_, Result<InterferenceAnalysis, AcquisitionError>> {
        let result = self
            .scan
            .as_ref()
            .map(|scan| analyze(&scan.wifi, scan.networks.clone()))
            .ok_or_else(|| AcquisitionError::new("no nearby-network scan recorded (pass --scan)"));
        ready(result).boxed()
    }
}

// ── Loading ─────────────────────────────────────────────────────────

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|source| CliError::Json {
        path: path.display().to_string(),
        source,
    })
}

pub fn load_snapshots(path: &Path) -> Result<Vec<MetricSnapshot>, CliError> {
    let snapshots = match read_json::<Recording>(path)? {
        Recording::Many(all) => all,
        Recording::One(one) => vec![*one],
    };
    tracing::debug!(path = %path.display(), count = snapshots.len(), "snapshots loaded");
    Ok(snapshots)
}

pub fn load_scan(path: &Path) -> Result<ScanRecording, CliError> {
    let scan: ScanRecording = read_json(path)?;
    tracing::debug!(path = %path.display(), networks = scan.networks.len(), "scan loaded");
    Ok(scan)
}
