// ── External collaborator ports ──
//
// The core never talks to the host, the filesystem or the network
// directly. Everything it needs from outside comes through these traits.
// They are object-safe (boxed futures) so the orchestrator can hold them
// as `Arc<dyn ..>`.

use std::sync::{Arc, RwLock};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use secrecy::SecretString;
use whyfi_api::{CompletionClient, SpeedClient, Transfer};

use crate::config::MonitorConfig;
use crate::error::{AcquisitionError, CoreError};
use crate::model::{InterferenceAnalysis, MetricSnapshot, Settings};

/// Host-side telemetry acquisition.
pub trait MetricsSource: Send + Sync {
    /// One complete telemetry reading.
    fn get_network_metrics(&self) -> BoxFuture<'_, Result<MetricSnapshot, AcquisitionError>>;

    /// Scan neighbouring networks and analyse the current channel.
    fn check_interference(&self) -> BoxFuture<'_, Result<InterferenceAnalysis, AcquisitionError>>;
}

/// Persistence for [`Settings`].
pub trait SettingsStore: Send + Sync {
    fn load(&self) -> Result<Settings, CoreError>;
    fn save(&self, settings: &Settings) -> Result<(), CoreError>;
}

/// Single-shot text completion.
pub trait CompletionService: Send + Sync {
    fn complete<'a>(
        &'a self,
        api_key: &'a SecretString,
        model: &'a str,
        prompt: &'a str,
    ) -> BoxFuture<'a, Result<String, whyfi_api::Error>>;
}

/// Timed transfers against a speed-test server.
pub trait SpeedProbe: Send + Sync {
    fn latency(&self) -> BoxFuture<'_, Result<Transfer, whyfi_api::Error>>;
    fn download(&self, bytes: u64) -> BoxFuture<'_, Result<Transfer, whyfi_api::Error>>;
    fn upload(&self, bytes: u64) -> BoxFuture<'_, Result<Transfer, whyfi_api::Error>>;
}

// ── HTTP-backed implementations ─────────────────────────────────────

impl CompletionService for CompletionClient {
    fn complete<'a>(
        &'a self,
        api_key: &'a SecretString,
        model: &'a str,
        prompt: &'a str,
    ) -> BoxFuture<'a, Result<String, whyfi_api::Error>> {
        CompletionClient::complete(self, api_key, model, prompt).boxed()
    }
}

impl SpeedProbe for SpeedClient {
    fn latency(&self) -> BoxFuture<'_, Result<Transfer, whyfi_api::Error>> {
        SpeedClient::latency(self).boxed()
    }

    fn download(&self, bytes: u64) -> BoxFuture<'_, Result<Transfer, whyfi_api::Error>> {
        SpeedClient::download(self, bytes).boxed()
    }

    fn upload(&self, bytes: u64) -> BoxFuture<'_, Result<Transfer, whyfi_api::Error>> {
        SpeedClient::upload(self, bytes).boxed()
    }
}

// ── In-memory settings ──────────────────────────────────────────────

/// Settings held only for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    settings: RwLock<Settings>,
}

impl MemorySettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: RwLock::new(settings),
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Result<Settings, CoreError> {
        self.settings
            .read()
            .map(|s| s.clone())
            .map_err(|_| CoreError::Settings {
                message: "settings lock poisoned".into(),
            })
    }

    fn save(&self, settings: &Settings) -> Result<(), CoreError> {
        let mut guard = self.settings.write().map_err(|_| CoreError::Settings {
            message: "settings lock poisoned".into(),
        })?;
        *guard = settings.clone();
        Ok(())
    }
}

// ── Bundle ──────────────────────────────────────────────────────────

/// Everything the orchestrator needs from outside.
#[derive(Clone)]
pub struct Ports {
    pub metrics: Arc<dyn MetricsSource>,
    pub settings: Arc<dyn SettingsStore>,
    pub completion: Arc<dyn CompletionService>,
    pub speed: Arc<dyn SpeedProbe>,
}

impl Ports {
    /// Wire the HTTP clients described by `config` alongside the host's
    /// metrics source and settings store.
    pub fn http(
        config: &MonitorConfig,
        metrics: Arc<dyn MetricsSource>,
        settings: Arc<dyn SettingsStore>,
    ) -> Result<Self, whyfi_api::Error> {
        let completion = CompletionClient::new(&config.completion_base_url, &config.transport)?;
        let speed = SpeedClient::new(&config.speed_base_url, &config.transport)?;
        Ok(Self {
            metrics,
            settings,
            completion: Arc::new(completion),
            speed: Arc::new(speed),
        })
    }
}

impl std::fmt::Debug for Ports {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ports").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn memory_store_round_trips_key() {
        let store = MemorySettingsStore::default();
        assert!(!store.load().expect("load").has_api_key());

        store
            .save(&Settings::with_api_key(SecretString::from("sk-1".to_owned())))
            .expect("save");
        let loaded = store.load().expect("load");
        assert_eq!(
            loaded.api_key.as_ref().map(|k| k.expose_secret().to_owned()),
            Some("sk-1".to_owned())
        );
    }
}
