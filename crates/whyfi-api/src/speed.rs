// Async HTTP client for Cloudflare-style speed-test endpoints.
//
// Download: GET  {base}/__down?bytes=N
// Upload:   POST {base}/__up   (N-byte body)
// Latency:  GET  {base}/__down?bytes=0

use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{debug, trace};
use url::Url;

use crate::Error;
use crate::transport::TransportConfig;

/// Default speed-test server.
pub const DEFAULT_BASE_URL: &str = "https://speed.cloudflare.com/";

/// Timing of a single request/response exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    /// Payload bytes moved in the measured direction.
    pub bytes: u64,
    /// Wall time from sending the request to receiving the full body.
    pub elapsed: Duration,
    /// Server-side processing time, from the `server-timing` header when present.
    pub server_time: Option<Duration>,
}

impl Transfer {
    /// Time attributable to the network: `elapsed` minus server processing.
    pub fn network_time(&self) -> Duration {
        self.server_time
            .map_or(self.elapsed, |s| self.elapsed.saturating_sub(s))
    }
}

/// Client for the measurement endpoints of a speed-test server.
#[derive(Debug, Clone)]
pub struct SpeedClient {
    http: reqwest::Client,
    base_url: Url,
}

impl SpeedClient {
    pub fn new(base_url: &str, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Self::from_reqwest(base_url, http)
    }

    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        let mut url = Url::parse(base_url)?;
        let path = url.path().trim_end_matches('/').to_owned();
        url.set_path(&format!("{path}/"));
        Ok(Self {
            http,
            base_url: url,
        })
    }

    /// One round trip with an empty payload.
    pub async fn latency(&self) -> Result<Transfer, Error> {
        self.download(0).await
    }

    /// Fetch `bytes` bytes from the server.
    pub async fn download(&self, bytes: u64) -> Result<Transfer, Error> {
        let url = self.base_url.join("__down")?;
        trace!(%url, bytes, "GET download probe");

        let started = Instant::now();
        let resp = self
            .http
            .get(url)
            .query(&[("bytes", bytes)])
            .send()
            .await?;
        let resp = check_status(resp).await?;
        let server_time = server_timing(resp.headers());
        let body = resp.bytes().await?;
        let elapsed = started.elapsed();

        let received = u64::try_from(body.len()).unwrap_or(u64::MAX);
        debug!(requested = bytes, received, ?elapsed, "download probe complete");

        Ok(Transfer {
            bytes: received,
            elapsed,
            server_time,
        })
    }

    /// Send `bytes` zero bytes to the server.
    pub async fn upload(&self, bytes: u64) -> Result<Transfer, Error> {
        let url = self.base_url.join("__up")?;
        trace!(%url, bytes, "POST upload probe");

        let len = usize::try_from(bytes).map_err(|_| Error::Api {
            status: 0,
            message: format!("upload size {bytes} exceeds addressable memory"),
        })?;
        let payload = Bytes::from(vec![0_u8; len]);

        let started = Instant::now();
        let resp = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain;charset=UTF-8")
            .body(payload)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        let server_time = server_timing(resp.headers());
        // Drain the (small) acknowledgement so the timing covers the full exchange.
        let _ = resp.bytes().await?;
        let elapsed = started.elapsed();

        debug!(bytes, ?elapsed, "upload probe complete");

        Ok(Transfer {
            bytes,
            elapsed,
            server_time,
        })
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let raw = resp.text().await.unwrap_or_default();
    let message = if raw.is_empty() {
        format!("HTTP {status}")
    } else {
        raw.chars().take(200).collect()
    };
    Err(Error::from_status(status.as_u16(), message, None))
}

/// Parse `server-timing: cfRequestDuration;dur=12.3` (milliseconds).
fn server_timing(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    let value = headers.get("server-timing")?.to_str().ok()?;
    parse_server_timing(value)
}

fn parse_server_timing(value: &str) -> Option<Duration> {
    value
        .split(';')
        .filter_map(|part| part.trim().strip_prefix("dur="))
        .find_map(|ms| ms.trim().parse::<f64>().ok())
        .filter(|ms| ms.is_finite() && *ms >= 0.0)
        .map(|ms| Duration::from_secs_f64(ms / 1000.0))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{Transfer, parse_server_timing};

    #[test]
    fn server_timing_reads_duration() {
        assert_eq!(
            parse_server_timing("cfRequestDuration;dur=12.5"),
            Some(Duration::from_micros(12_500))
        );
        assert_eq!(parse_server_timing("cfRequestDuration"), None);
        assert_eq!(parse_server_timing("cfRequestDuration;dur=abc"), None);
    }

    #[test]
    fn network_time_subtracts_server_time() {
        let t = Transfer {
            bytes: 0,
            elapsed: Duration::from_millis(30),
            server_time: Some(Duration::from_millis(5)),
        };
        assert_eq!(t.network_time(), Duration::from_millis(25));

        let saturated = Transfer {
            server_time: Some(Duration::from_millis(50)),
            ..t
        };
        assert_eq!(saturated.network_time(), Duration::ZERO);
    }
}
