// ── Core error types ──
//
// User-facing errors surfaced by the orchestrator and poller. API-level
// failures are translated into these at the task boundary so consumers
// never need to match on `whyfi_api::Error` directly.

use thiserror::Error;

use crate::orchestrator::TaskKind;
use crate::speedtest::SpeedTestError;

/// Top-level error for operations exposed by `whyfi-core`.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    #[error("{running} is already running")]
    TaskBusy { running: TaskKind },

    #[error("No API key configured. Add your OpenAI API key in Settings.")]
    MissingApiKey,

    #[error(transparent)]
    SpeedTest(#[from] SpeedTestError),

    #[error(transparent)]
    Diagnosis(#[from] DiagnosisError),

    #[error("Settings error: {message}")]
    Settings { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// A metric acquisition or nearby-network scan failed on the host side.
///
/// The message is carried through verbatim; the poller publishes it as
/// the current error string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct AcquisitionError {
    pub message: String,
}

impl AcquisitionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for AcquisitionError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for AcquisitionError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

// ── Diagnosis errors ────────────────────────────────────────────────

/// Failure modes of a single AI diagnosis invocation.
///
/// Display strings are what the user sees.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiagnosisError {
    /// No JSON object in the reply, or the object did not decode.
    #[error("{message}")]
    Parse { message: String },

    /// The object decoded but did not match the report schema.
    #[error("Invalid response format from AI")]
    Validation { reason: String },

    #[error("Invalid API key. Please check your OpenAI API key in Settings.")]
    Credential,

    #[error("Rate limit exceeded. Please wait a moment and try again.")]
    RateLimit,

    #[error("Request timed out. Please try again.")]
    Timeout,

    #[error("OpenAI service is temporarily unavailable. Please try again later.")]
    ServiceUnavailable,

    #[error("{0}")]
    Unknown(String),
}

impl DiagnosisError {
    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }
}

fn mentions_timeout(message: &str) -> bool {
    message.contains("timeout") || message.contains("ETIMEDOUT")
}

impl From<whyfi_api::Error> for DiagnosisError {
    fn from(err: whyfi_api::Error) -> Self {
        use whyfi_api::Error as Api;

        match err {
            Api::Unauthorized { .. } => Self::Credential,
            Api::RateLimited { .. } => Self::RateLimit,
            Api::Timeout { .. } => Self::Timeout,
            Api::ServiceUnavailable { status, message } => match status {
                500 | 502 | 503 => Self::ServiceUnavailable,
                _ if mentions_timeout(&message) => Self::Timeout,
                _ => Self::Unknown(format!("API error: {message}")),
            },
            Api::Api { message, .. } => {
                if mentions_timeout(&message) {
                    Self::Timeout
                } else {
                    Self::Unknown(format!("API error: {message}"))
                }
            }
            Api::Transport(e) => {
                let message = e.to_string();
                if e.is_timeout() || mentions_timeout(&message) {
                    Self::Timeout
                } else {
                    Self::Unknown(message)
                }
            }
            other => {
                let message = other.to_string();
                if mentions_timeout(&message) {
                    Self::Timeout
                } else {
                    Self::Unknown(message)
                }
            }
        }
    }
}
