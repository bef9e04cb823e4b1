//! CLI configuration: thin wrapper around `whyfi_config`.
//!
//! Resolves the config path and applies `GlobalOpts` overrides on top of
//! the file/env layers before the core is wired up.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use whyfi_config::{Config, CredentialChain};
use whyfi_core::{MetricsSource, MonitorConfig, Orchestrator, Ports};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Loaded configuration plus the file it came from.
#[derive(Debug)]
pub struct Loaded {
    pub config: Config,
    pub path: PathBuf,
}

impl Loaded {
    pub fn credentials(&self) -> CredentialChain {
        CredentialChain::new(&self.config, &self.path)
    }
}

/// `--config` (or `WHYFI_CONFIG`), else the platform default.
pub fn resolve_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(whyfi_config::config_path)
}

pub fn load(global: &GlobalOpts) -> Result<Loaded, CliError> {
    let path = resolve_path(global);
    let config = whyfi_config::load_config_from(&path)?;
    Ok(Loaded { config, path })
}

/// Translate the file/env layers into a `MonitorConfig`, applying the
/// `--timeout` override. Zero disables the request timeout.
pub fn monitor_config(loaded: &Loaded, global: &GlobalOpts) -> Result<MonitorConfig, CliError> {
    let mut monitor = whyfi_config::to_monitor_config(&loaded.config)?;
    if let Some(secs) = global.timeout {
        monitor.transport.timeout = (secs > 0).then(|| Duration::from_secs(secs));
    }
    Ok(monitor)
}

/// Wire an orchestrator over `metrics`, the credential chain and the
/// HTTP-backed services.
pub fn orchestrator(
    loaded: &Loaded,
    global: &GlobalOpts,
    metrics: Arc<dyn MetricsSource>,
) -> Result<Orchestrator, CliError> {
    let monitor = monitor_config(loaded, global)?;
    let ports = Ports::http(&monitor, metrics, Arc::new(loaded.credentials())).map_err(|e| {
        CliError::Transport {
            message: e.to_string(),
        }
    })?;
    Ok(Orchestrator::new(monitor, ports))
}
