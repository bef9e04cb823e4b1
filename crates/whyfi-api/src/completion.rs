// Async HTTP client for an OpenAI-compatible chat completions endpoint.
//
// Base path: {base}/chat/completions
// Auth: `Authorization: Bearer <key>`, supplied per request

use reqwest::header::{AUTHORIZATION, HeaderValue, RETRY_AFTER};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::Error;
use crate::transport::TransportConfig;

/// Default endpoint root for the hosted OpenAI API.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/";

// ── Wire types ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

// ── Client ───────────────────────────────────────────────────────────

/// Async client for single-shot text completions.
///
/// One request carries one user prompt; the first choice's text is
/// returned verbatim. No streaming, no retries.
#[derive(Debug, Clone)]
pub struct CompletionClient {
    http: reqwest::Client,
    base_url: Url,
}

impl CompletionClient {
    /// Build a client for the given endpoint root (e.g. `https://api.openai.com/v1`).
    pub fn new(base_url: &str, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Self::from_reqwest(base_url, http)
    }

    /// Wrap an existing `reqwest::Client`.
    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        let base_url = normalize_base_url(base_url)?;
        Ok(Self { http, base_url })
    }

    /// The endpoint root, always ending in `/`.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Send `prompt` as a single user message and return the reply text.
    ///
    /// A response with no choices or a null message yields an empty string;
    /// interpreting the text is the caller's job.
    pub async fn complete(
        &self,
        api_key: &SecretString,
        model: &str,
        prompt: &str,
    ) -> Result<String, Error> {
        let url = self.base_url.join("chat/completions")?;
        debug!(%url, model, prompt_len = prompt.len(), "POST chat completion");

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key.expose_secret()))
            .map_err(|e| Error::Unauthorized {
                message: format!("invalid API key header value: {e}"),
            })?;
        auth.set_sensitive(true);

        let body = ChatRequest {
            model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let resp = self
            .http
            .post(url)
            .header(AUTHORIZATION, auth)
            .json(&body)
            .send()
            .await
            .map_err(map_transport)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(parse_error(resp).await);
        }

        let raw = resp.text().await.map_err(map_transport)?;
        let parsed: ChatResponse = serde_json::from_str(&raw).map_err(|e| {
            let snippet = preview(&raw);
            Error::Deserialization {
                message: format!("{e} (body preview: {snippet:?})"),
                body: raw.clone(),
            }
        })?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_default();

        debug!(response_len = text.len(), "chat completion received");
        Ok(text)
    }
}

fn normalize_base_url(raw: &str) -> Result<Url, Error> {
    let mut url = Url::parse(raw)?;
    let path = url.path().trim_end_matches('/').to_owned();
    url.set_path(&format!("{path}/"));
    Ok(url)
}

/// First 200 characters of a response body, for error messages.
fn preview(body: &str) -> String {
    body.chars().take(200).collect()
}

fn map_transport(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Timeout {
            message: err.to_string(),
        }
    } else {
        Error::Transport(err)
    }
}

async fn parse_error(resp: reqwest::Response) -> Error {
    let status = resp.status().as_u16();
    let retry_after = resp
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());

    let raw = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&raw)
        .ok()
        .and_then(|r| r.error)
        .and_then(|e| e.message)
        .unwrap_or_else(|| {
            if raw.is_empty() {
                format!("HTTP {status}")
            } else {
                preview(&raw)
            }
        });

    Error::from_status(status, message, retry_after)
}

#[cfg(test)]
mod tests {
    use super::normalize_base_url;

    #[test]
    fn base_url_gains_trailing_slash() {
        let url = normalize_base_url("https://api.openai.com/v1").expect("valid url");
        assert_eq!(url.as_str(), "https://api.openai.com/v1/");
        assert_eq!(
            url.join("chat/completions").expect("join").as_str(),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn base_url_keeps_single_slash() {
        let url = normalize_base_url("http://localhost:8080/v1/").expect("valid url");
        assert_eq!(url.as_str(), "http://localhost:8080/v1/");
    }
}
