//! Shared configuration for the whyfi CLI.
//!
//! TOML config file, credential resolution (env + keyring + plaintext),
//! `SettingsStore` implementations backed by those sources, and
//! translation to `whyfi_core::MonitorConfig`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use whyfi_api::TransportConfig;
use whyfi_core::{CoreError, MonitorConfig, Settings, SettingsStore, SpeedTestPlan};

/// Keyring service name.
pub const KEYRING_SERVICE: &str = "whyfi";
/// Keyring account holding the completion API key.
pub const KEYRING_USER: &str = "api-key";
/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "WHYFI_CONFIG";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl From<ConfigError> for CoreError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Keyring(e) => Self::Settings {
                message: e.to_string(),
            },
            other => Self::Config {
                message: other.to_string(),
            },
        }
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub monitor: MonitorSection,

    #[serde(default)]
    pub diagnosis: DiagnosisSection,

    #[serde(default)]
    pub speedtest: SpeedTestSection,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Whole-request timeout in seconds. 0 disables it.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    120
}
fn default_connect_timeout() -> u64 {
    10
}

/// Telemetry polling.
#[derive(Debug, Deserialize, Serialize)]
pub struct MonitorSection {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            history_capacity: default_history_capacity(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    u64::try_from(whyfi_core::config::DEFAULT_POLL_INTERVAL.as_millis()).unwrap_or(3000)
}
fn default_history_capacity() -> usize {
    whyfi_core::config::DEFAULT_HISTORY_CAPACITY
}

/// AI diagnosis.
#[derive(Debug, Deserialize, Serialize)]
pub struct DiagnosisSection {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_prompt_samples")]
    pub prompt_samples: usize,

    #[serde(default = "default_completion_url")]
    pub base_url: String,

    /// API key (plaintext, prefer keyring or env var).
    pub api_key: Option<String>,

    /// Environment variable name containing the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for DiagnosisSection {
    fn default() -> Self {
        Self {
            model: default_model(),
            prompt_samples: default_prompt_samples(),
            base_url: default_completion_url(),
            api_key: None,
            api_key_env: default_api_key_env(),
        }
    }
}

fn default_model() -> String {
    whyfi_core::config::DEFAULT_MODEL.into()
}
fn default_prompt_samples() -> usize {
    whyfi_core::config::DEFAULT_PROMPT_SAMPLES
}
fn default_completion_url() -> String {
    whyfi_api::completion::DEFAULT_BASE_URL.into()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}

/// Speed-test endpoint.
#[derive(Debug, Deserialize, Serialize)]
pub struct SpeedTestSection {
    #[serde(default = "default_speed_url")]
    pub base_url: String,
}

impl Default for SpeedTestSection {
    fn default() -> Self {
        Self {
            base_url: default_speed_url(),
        }
    }
}

fn default_speed_url() -> String {
    whyfi_api::speed::DEFAULT_BASE_URL.into()
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path: `WHYFI_CONFIG`, else XDG / platform
/// conventions.
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }
    ProjectDirs::from("com", "whyfi", "whyfi").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("whyfi");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load from `path` (missing file is fine) layered under `WHYFI_` env
/// vars, e.g. `WHYFI_DIAGNOSIS__MODEL`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("WHYFI_").split("__"));

    let config: Config = figment.extract()?;
    debug!(path = %path.display(), "config loaded");
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

fn validate_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url: url::Url = value.parse().map_err(|_| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL: {value}"),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Validation {
            field: field.into(),
            reason: format!("expected http or https, got '{}'", url.scheme()),
        });
    }
    Ok(())
}

/// Build a `MonitorConfig` from the file/env layers.
pub fn to_monitor_config(cfg: &Config) -> Result<MonitorConfig, ConfigError> {
    validate_url("diagnosis.base_url", &cfg.diagnosis.base_url)?;
    validate_url("speedtest.base_url", &cfg.speedtest.base_url)?;

    if cfg.monitor.poll_interval_ms == 0 {
        return Err(ConfigError::Validation {
            field: "monitor.poll_interval_ms".into(),
            reason: "must be greater than zero".into(),
        });
    }
    if cfg.monitor.history_capacity == 0 {
        return Err(ConfigError::Validation {
            field: "monitor.history_capacity".into(),
            reason: "must be greater than zero".into(),
        });
    }

    let timeout = (cfg.defaults.timeout > 0).then(|| Duration::from_secs(cfg.defaults.timeout));

    Ok(MonitorConfig {
        poll_interval: Duration::from_millis(cfg.monitor.poll_interval_ms),
        history_capacity: cfg.monitor.history_capacity,
        model: cfg.diagnosis.model.clone(),
        prompt_samples: cfg.diagnosis.prompt_samples,
        speed_plan: SpeedTestPlan::default(),
        completion_base_url: cfg.diagnosis.base_url.clone(),
        speed_base_url: cfg.speedtest.base_url.clone(),
        transport: TransportConfig {
            timeout,
            connect_timeout: Duration::from_secs(cfg.defaults.connect_timeout),
        },
    })
}

// ── Credential sources ──────────────────────────────────────────────

/// Where the active API key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Env,
    Keyring,
    File,
}

impl std::fmt::Display for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Env => "environment",
            Self::Keyring => "keyring",
            Self::File => "config file",
        })
    }
}

fn non_blank(value: String) -> Option<SecretString> {
    (!value.trim().is_empty()).then(|| SecretString::from(value))
}

/// API key stored in the OS keyring.
#[derive(Debug, Clone)]
pub struct KeyringSettingsStore {
    service: String,
    user: String,
}

impl Default for KeyringSettingsStore {
    fn default() -> Self {
        Self::new(KEYRING_SERVICE, KEYRING_USER)
    }
}

impl KeyringSettingsStore {
    pub fn new(service: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            user: user.into(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, ConfigError> {
        Ok(keyring::Entry::new(&self.service, &self.user)?)
    }

    /// The stored key, `None` if there is no entry.
    pub fn read(&self) -> Result<Option<SecretString>, ConfigError> {
        match self.entry()?.get_password() {
            Ok(secret) => Ok(non_blank(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn write(&self, key: Option<&SecretString>) -> Result<(), ConfigError> {
        let entry = self.entry()?;
        match key {
            Some(key) => entry.set_password(key.expose_secret())?,
            None => match entry.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => {}
                Err(e) => return Err(e.into()),
            },
        }
        Ok(())
    }
}

impl SettingsStore for KeyringSettingsStore {
    fn load(&self) -> Result<Settings, CoreError> {
        Ok(Settings {
            api_key: self.read()?,
        })
    }

    fn save(&self, settings: &Settings) -> Result<(), CoreError> {
        Ok(self.write(settings.api_key.as_ref())?)
    }
}

/// API key kept as plaintext in the config file.
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file(&self) -> Result<Config, ConfigError> {
        let config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&self.path))
            .extract()?;
        Ok(config)
    }

    pub fn read(&self) -> Result<Option<SecretString>, ConfigError> {
        Ok(self.read_file()?.diagnosis.api_key.and_then(non_blank))
    }

    pub fn write(&self, key: Option<&SecretString>) -> Result<(), ConfigError> {
        let mut config = self.read_file()?;
        config.diagnosis.api_key = key.map(|k| k.expose_secret().to_owned());
        save_config_to(&config, &self.path)
    }
}

impl SettingsStore for FileSettingsStore {
    fn load(&self) -> Result<Settings, CoreError> {
        Ok(Settings {
            api_key: self.read()?,
        })
    }

    fn save(&self, settings: &Settings) -> Result<(), CoreError> {
        Ok(self.write(settings.api_key.as_ref())?)
    }
}

/// Resolves the key from env → keyring → config file. Saving prefers the
/// keyring and falls back to the file when no keyring is available.
#[derive(Debug, Clone)]
pub struct CredentialChain {
    api_key_env: String,
    keyring: KeyringSettingsStore,
    file: FileSettingsStore,
}

impl CredentialChain {
    pub fn new(cfg: &Config, file_path: impl Into<PathBuf>) -> Self {
        Self {
            api_key_env: cfg.diagnosis.api_key_env.clone(),
            keyring: KeyringSettingsStore::default(),
            file: FileSettingsStore::new(file_path),
        }
    }

    /// Resolve the active key and where it came from.
    pub fn resolve(&self) -> Option<(SecretString, KeySource)> {
        if let Some(key) = std::env::var(&self.api_key_env).ok().and_then(non_blank) {
            return Some((key, KeySource::Env));
        }

        match self.keyring.read() {
            Ok(Some(key)) => return Some((key, KeySource::Keyring)),
            Ok(None) => {}
            Err(e) => debug!(error = %e, "keyring unavailable"),
        }

        match self.file.read() {
            Ok(key) => key.map(|k| (k, KeySource::File)),
            Err(e) => {
                warn!(error = %e, "could not read API key from config file");
                None
            }
        }
    }

    /// Store `key` in the keyring, or in the config file if `plaintext` is
    /// set or the keyring refuses.
    pub fn store(&self, key: &SecretString, plaintext: bool) -> Result<KeySource, ConfigError> {
        if !plaintext {
            match self.keyring.write(Some(key)) {
                Ok(()) => return Ok(KeySource::Keyring),
                Err(e) => warn!(error = %e, "keyring write failed, storing in config file"),
            }
        }
        self.file.write(Some(key))?;
        Ok(KeySource::File)
    }

    /// Remove the key from the keyring and the config file. An env var
    /// cannot be cleared from here.
    pub fn clear(&self) -> Result<(), ConfigError> {
        if let Err(e) = self.keyring.write(None) {
            debug!(error = %e, "keyring clear skipped");
        }
        if self.file.read()?.is_some() {
            self.file.write(None)?;
        }
        Ok(())
    }
}

impl SettingsStore for CredentialChain {
    fn load(&self) -> Result<Settings, CoreError> {
        Ok(Settings {
            api_key: self.resolve().map(|(key, _)| key),
        })
    }

    fn save(&self, settings: &Settings) -> Result<(), CoreError> {
        match &settings.api_key {
            Some(key) => self.store(key, false).map(|_| ())?,
            None => self.clear()?,
        }
        Ok(())
    }
}
