#![allow(clippy::unwrap_used)]
// Integration tests for `CompletionClient` using wiremock.

use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use whyfi_api::{CompletionClient, Error};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, CompletionClient) {
    let server = MockServer::start().await;
    let client =
        CompletionClient::from_reqwest(&format!("{}/v1", server.uri()), reqwest::Client::new())
            .unwrap();
    (server, client)
}

fn key() -> SecretString {
    SecretString::from("sk-test".to_string())
}

fn error_body(message: &str) -> serde_json::Value {
    json!({ "error": { "message": message, "type": "invalid_request_error" } })
}

// ── Success ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_complete_returns_first_choice() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-5-mini",
            "messages": [{ "role": "user", "content": "hello" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "choices": [
                { "index": 0, "message": { "role": "assistant", "content": "{\"summary\":\"ok\"}" } },
                { "index": 1, "message": { "role": "assistant", "content": "ignored" } }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let text = client.complete(&key(), "gpt-5-mini", "hello").await.unwrap();
    assert_eq!(text, "{\"summary\":\"ok\"}");
}

#[tokio::test]
async fn test_complete_without_choices_is_empty() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let text = client.complete(&key(), "gpt-5-mini", "hello").await.unwrap();
    assert!(text.is_empty());
}

#[tokio::test]
async fn test_complete_rejects_non_json_body() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy</html>"))
        .mount(&server)
        .await;

    let result = client.complete(&key(), "gpt-5-mini", "hello").await;
    assert!(
        matches!(result, Err(Error::Deserialization { .. })),
        "expected Deserialization error, got: {result:?}"
    );
}

// ── Error mapping ───────────────────────────────────────────────────

#[tokio::test]
async fn test_unauthorized() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(error_body("Incorrect API key")))
        .mount(&server)
        .await;

    let result = client.complete(&key(), "gpt-5-mini", "hello").await;
    match result {
        Err(Error::Unauthorized { message }) => assert_eq!(message, "Incorrect API key"),
        other => panic!("expected Unauthorized, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_rate_limited_reads_retry_after() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "7")
                .set_body_json(error_body("Rate limit reached")),
        )
        .mount(&server)
        .await;

    let result = client.complete(&key(), "gpt-5-mini", "hello").await;
    assert!(
        matches!(
            result,
            Err(Error::RateLimited {
                retry_after_secs: Some(7),
                ..
            })
        ),
        "expected RateLimited, got: {result:?}"
    );
}

#[tokio::test]
async fn test_request_timeout_status() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(408))
        .mount(&server)
        .await;

    let err = client
        .complete(&key(), "gpt-5-mini", "hello")
        .await
        .unwrap_err();
    assert!(err.is_timeout(), "expected timeout, got: {err:?}");
}

#[tokio::test]
async fn test_service_unavailable() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let result = client.complete(&key(), "gpt-5-mini", "hello").await;
    match result {
        Err(Error::ServiceUnavailable { status, message }) => {
            assert_eq!(status, 503);
            assert_eq!(message, "upstream down");
        }
        other => panic!("expected ServiceUnavailable, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_other_status_is_api_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(400).set_body_json(error_body("model not found")))
        .mount(&server)
        .await;

    let result = client.complete(&key(), "gpt-5-mini", "hello").await;
    match result {
        Err(Error::Api { status, message }) => {
            assert_eq!(status, 400);
            assert_eq!(message, "model not found");
        }
        other => panic!("expected Api error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_transport_timeout_maps_to_timeout() {
    let server = MockServer::start().await;
    let transport = whyfi_api::TransportConfig::default()
        .with_timeout(Some(std::time::Duration::from_millis(50)));
    let client = CompletionClient::new(&format!("{}/v1", server.uri()), &transport).unwrap();

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(std::time::Duration::from_millis(500))
                .set_body_json(json!({ "choices": [] })),
        )
        .mount(&server)
        .await;

    let err = client
        .complete(&key(), "gpt-5-mini", "hello")
        .await
        .unwrap_err();
    assert!(err.is_timeout(), "expected timeout, got: {err:?}");
}
