use thiserror::Error;

/// Top-level error type for the `whyfi-api` crate.
///
/// Covers every failure mode of the two HTTP surfaces (text completion and
/// speed-test endpoints). `whyfi-core` maps these into user-facing messages.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The service rejected the credential (HTTP 401).
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out (HTTP 408 or transport-level timeout).
    #[error("Request timed out: {message}")]
    Timeout { message: String },

    /// TLS or client construction error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Service ─────────────────────────────────────────────────────
    /// Throttled by the service (HTTP 429).
    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after_secs: Option<u64>,
    },

    /// Upstream 5xx-class failure.
    #[error("Service unavailable (HTTP {status}): {message}")]
    ServiceUnavailable { status: u16, message: String },

    /// Any other non-success response.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// HTTP status associated with this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { .. } => Some(401),
            Self::RateLimited { .. } => Some(429),
            Self::ServiceUnavailable { status, .. } | Self::Api { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Returns `true` if the request never completed in time.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Transport(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// Returns `true` if this is a transient error worth retrying later.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } | Self::RateLimited { .. } | Self::ServiceUnavailable { .. } => {
                true
            }
            _ => false,
        }
    }

    /// Classify a non-success HTTP response.
    pub(crate) fn from_status(status: u16, message: String, retry_after_secs: Option<u64>) -> Self {
        match status {
            401 => Self::Unauthorized { message },
            408 => Self::Timeout { message },
            429 => Self::RateLimited {
                message,
                retry_after_secs,
            },
            500 | 502 | 503 | 504 => Self::ServiceUnavailable { status, message },
            _ => Self::Api { status, message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn from_status_maps_known_codes() {
        assert!(matches!(
            Error::from_status(401, "bad key".into(), None),
            Error::Unauthorized { .. }
        ));
        assert!(matches!(
            Error::from_status(408, "slow".into(), None),
            Error::Timeout { .. }
        ));
        assert!(matches!(
            Error::from_status(429, "slow down".into(), Some(3)),
            Error::RateLimited {
                retry_after_secs: Some(3),
                ..
            }
        ));
        assert!(matches!(
            Error::from_status(503, "down".into(), None),
            Error::ServiceUnavailable { status: 503, .. }
        ));
        assert!(matches!(
            Error::from_status(400, "bad request".into(), None),
            Error::Api { status: 400, .. }
        ));
    }

    #[test]
    fn transient_classification() {
        assert!(Error::from_status(429, String::new(), None).is_transient());
        assert!(Error::from_status(502, String::new(), None).is_transient());
        assert!(!Error::from_status(401, String::new(), None).is_transient());
        assert!(Error::from_status(408, String::new(), None).is_timeout());
    }
}
