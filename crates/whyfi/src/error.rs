//! CLI error types with miette diagnostics.
//!
//! Maps core, config and task failures into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use whyfi_config::ConfigError;
use whyfi_core::{CoreError, DiagnosisError, TaskKind};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const INTERRUPTED: i32 = 130;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Credentials ──────────────────────────────────────────────────

    #[error("No API key configured")]
    #[diagnostic(
        code(whyfi::no_api_key),
        help(
            "Store one with: whyfi key set\n\
             Or set the OPENAI_API_KEY environment variable."
        )
    )]
    NoApiKey,

    #[error("{message}")]
    #[diagnostic(
        code(whyfi::auth_failed),
        help("Replace the key with: whyfi key set")
    )]
    AuthFailed { message: String },

    // ── Remote services ──────────────────────────────────────────────

    #[error("{message}")]
    #[diagnostic(code(whyfi::rate_limited))]
    RateLimited { message: String },

    #[error("{message}")]
    #[diagnostic(
        code(whyfi::timeout),
        help("Increase the timeout with --timeout or try again later.")
    )]
    Timeout { message: String },

    #[error("{message}")]
    #[diagnostic(code(whyfi::service_unavailable))]
    ServiceUnavailable { message: String },

    #[error("Could not set up HTTP client: {message}")]
    #[diagnostic(code(whyfi::transport))]
    Transport { message: String },

    // ── Tasks ────────────────────────────────────────────────────────

    #[error("AI diagnosis failed: {message}")]
    #[diagnostic(
        code(whyfi::diagnosis),
        help("The model reply could not be used. Run again, or try -vv to see the raw exchange.")
    )]
    Diagnosis { message: String },

    #[error("Speed test failed: {message}")]
    #[diagnostic(
        code(whyfi::speedtest),
        help("Check your internet connection and the speedtest.base_url setting.")
    )]
    SpeedTest { message: String },

    #[error("Telemetry unavailable: {message}")]
    #[diagnostic(
        code(whyfi::acquisition),
        help("Check the recording file passed with --snapshots or --scan.")
    )]
    Acquisition { message: String },

    #[error("{running} is already running")]
    #[diagnostic(code(whyfi::busy))]
    Busy { running: TaskKind },

    #[error("Interrupted")]
    #[diagnostic(code(whyfi::interrupted))]
    Interrupted,

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(whyfi::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Configuration file already exists")]
    #[diagnostic(
        code(whyfi::config_exists),
        help("Use --force to overwrite it.\nPath: {path}")
    )]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(code(whyfi::config))]
    Config(#[from] ConfigError),

    #[error("Settings error: {message}")]
    #[diagnostic(code(whyfi::settings))]
    Settings { message: String },

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON in {path}: {source}")]
    #[diagnostic(
        code(whyfi::json),
        help("Check the file contents and try again.")
    )]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoApiKey | Self::AuthFailed { .. } => exit_code::AUTH,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::ServiceUnavailable { .. } | Self::Transport { .. } | Self::SpeedTest { .. } => {
                exit_code::CONNECTION
            }
            Self::Busy { .. } | Self::ConfigExists { .. } => exit_code::CONFLICT,
            Self::Validation { .. } | Self::Json { .. } => exit_code::USAGE,
            Self::Interrupted => exit_code::INTERRUPTED,
            _ => exit_code::GENERAL,
        }
    }

    /// Classify a diagnosis failure published by the orchestrator.
    pub fn from_diagnosis_message(message: String) -> Self {
        let is = |e: DiagnosisError| e.to_string() == message;
        let (auth, rate, timeout, unavailable) = (
            is(DiagnosisError::Credential),
            is(DiagnosisError::RateLimit),
            is(DiagnosisError::Timeout),
            is(DiagnosisError::ServiceUnavailable),
        );
        if auth {
            Self::AuthFailed { message }
        } else if rate {
            Self::RateLimited { message }
        } else if timeout {
            Self::Timeout { message }
        } else if unavailable {
            Self::ServiceUnavailable { message }
        } else {
            Self::Diagnosis { message }
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::MissingApiKey => Self::NoApiKey,
            CoreError::TaskBusy { running } => Self::Busy { running },
            CoreError::Acquisition(e) => Self::Acquisition { message: e.message },
            CoreError::SpeedTest(e) => Self::SpeedTest {
                message: e.to_string(),
            },
            CoreError::Diagnosis(e) => Self::from_diagnosis_message(e.to_string()),
            CoreError::Settings { message } => Self::Settings { message },
            CoreError::Config { message } => Self::Validation {
                field: "config".into(),
                reason: message,
            },
        }
    }
}
