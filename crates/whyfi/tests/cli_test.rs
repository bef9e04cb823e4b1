//! Integration tests for the `whyfi` CLI binary.
//!
//! These tests cover argument parsing, configuration handling and the
//! task commands over recorded telemetry. Remote services are replaced
//! by wiremock; nothing touches the user's real configuration.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Env var the tests point `diagnosis.api_key_env` at, so a real
/// `OPENAI_API_KEY` in the developer's shell never leaks in.
const TEST_KEY_ENV: &str = "WHYFI_TEST_API_KEY";

/// Build a [`Command`] for the `whyfi` binary with env isolation.
///
/// Clears `WHYFI_*` env vars and points the config file into `dir`.
fn whyfi_cmd(dir: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("whyfi");
    cmd.env("HOME", dir)
        .env("XDG_CONFIG_HOME", dir)
        .env("WHYFI_CONFIG", dir.join("config.toml"))
        .env("WHYFI_DIAGNOSIS__API_KEY_ENV", TEST_KEY_ENV)
        .env("NO_COLOR", "1")
        .env_remove(TEST_KEY_ENV)
        .env_remove("WHYFI_OUTPUT")
        .env_remove("WHYFI_TIMEOUT")
        .env_remove("WHYFI_DIAGNOSIS__BASE_URL")
        .env_remove("WHYFI_SPEEDTEST__BASE_URL")
        .env_remove("RUST_LOG");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

fn write_json(dir: &Path, name: &str, value: &serde_json::Value) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, serde_json::to_string(value).unwrap()).unwrap();
    path
}

fn snapshot(signal: i32, internet_ms: f64) -> serde_json::Value {
    json!({
        "wifi": {
            "connected": true,
            "ssid": "home",
            "frequency_band": "5 GHz",
            "channel": "ch 36, 5 GHz, 80 MHz",
            "link_rate_mbps": 866.0,
            "signal_dbm": signal,
            "noise_dbm": -92
        },
        "router_ip": "192.168.1.1",
        "router_ping": { "latency_ms": 2.0, "jitter_ms": 0.5, "packet_loss_percent": 0.0 },
        "internet_ping": { "latency_ms": internet_ms, "jitter_ms": 3.0, "packet_loss_percent": 0.0 },
        "dns": { "servers": ["1.1.1.1"], "lookup_latency_ms": 12.0 }
    })
}

fn scan() -> serde_json::Value {
    json!({
        "wifi": {
            "connected": true,
            "channel": "ch 6, 2.4 GHz, 20 MHz",
            "signal_dbm": -50,
            "noise_dbm": -90
        },
        "networks": [
            { "ssid": "neighbour", "channel": 6, "frequency_ghz": 2.4 },
            { "ssid": "cafe", "channel": 4, "frequency_ghz": 2.4 },
            { "ssid": "upstairs", "channel": 149, "frequency_ghz": 5.0 }
        ]
    })
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let dir = tempfile::tempdir().unwrap();
    let output = whyfi_cmd(dir.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_lists_commands() {
    let dir = tempfile::tempdir().unwrap();
    whyfi_cmd(dir.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("speedtest")
            .and(predicate::str::contains("diagnose"))
            .and(predicate::str::contains("interference"))
            .and(predicate::str::contains("watch")),
    );
}

#[test]
fn test_version_flag() {
    let dir = tempfile::tempdir().unwrap();
    whyfi_cmd(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("whyfi"));
}

#[test]
fn test_invalid_subcommand() {
    let dir = tempfile::tempdir().unwrap();
    let output = whyfi_cmd(dir.path()).arg("foobar").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_honours_env() {
    let dir = tempfile::tempdir().unwrap();
    whyfi_cmd(dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_init_then_conflict() {
    let dir = tempfile::tempdir().unwrap();
    whyfi_cmd(dir.path())
        .args(["config", "init"])
        .assert()
        .success();
    let written = std::fs::read_to_string(dir.path().join("config.toml")).unwrap();
    assert!(written.contains("poll_interval_ms"), "{written}");

    let output = whyfi_cmd(dir.path())
        .args(["config", "init"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(6));
    assert!(combined_output(&output).contains("--force"));

    whyfi_cmd(dir.path())
        .args(["config", "init", "--force"])
        .assert()
        .success();
}

#[test]
fn test_config_show_masks_key() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        "[diagnosis]\napi_key = \"sk-secret\"\n",
    )
    .unwrap();
    whyfi_cmd(dir.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("****").and(predicate::str::contains("sk-secret").not()));
}

#[test]
fn test_invalid_base_url_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let scan_path = write_json(dir.path(), "scan.json", &scan());
    let output = whyfi_cmd(dir.path())
        .env("WHYFI_SPEEDTEST__BASE_URL", "ftp://example.com")
        .args(["interference", "--scan"])
        .arg(&scan_path)
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(combined_output(&output).contains("speedtest.base_url"));
}

// ── Key ─────────────────────────────────────────────────────────────

#[test]
fn test_key_set_plaintext_then_status() {
    let dir = tempfile::tempdir().unwrap();
    whyfi_cmd(dir.path())
        .args(["key", "set", "--plaintext", "--key", "sk-test"])
        .assert()
        .success();

    whyfi_cmd(dir.path())
        .args(["key", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("configured"));

    whyfi_cmd(dir.path())
        .env(TEST_KEY_ENV, "sk-env")
        .args(["key", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("environment"));
}

#[test]
fn test_key_set_rejects_blank() {
    let dir = tempfile::tempdir().unwrap();
    let output = whyfi_cmd(dir.path())
        .args(["key", "set", "--plaintext", "--key", "   "])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

// ── Tasks ───────────────────────────────────────────────────────────

#[test]
fn test_interference_from_scan() {
    let dir = tempfile::tempdir().unwrap();
    let scan_path = write_json(dir.path(), "scan.json", &scan());
    let output = whyfi_cmd(dir.path())
        .args(["-o", "json", "interference", "--scan"])
        .arg(&scan_path)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let analysis: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(analysis["current_channel"], 6);
    assert_eq!(analysis["same_channel_count"], 1);
    assert_eq!(analysis["snr_db"], 40);
    assert_eq!(analysis["nearby_networks"].as_array().unwrap().len(), 3);
}

#[test]
fn test_interference_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let output = whyfi_cmd(dir.path())
        .args(["interference", "--scan", "/nonexistent/scan.json"])
        .output()
        .unwrap();
    assert!(!output.status.success());
}

#[test]
fn test_diagnose_without_key() {
    let dir = tempfile::tempdir().unwrap();
    let snaps = write_json(dir.path(), "snaps.json", &json!([snapshot(-55, 20.0)]));
    let output = whyfi_cmd(dir.path())
        .args(["diagnose", "--snapshots"])
        .arg(&snaps)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3), "{}", combined_output(&output));
    assert!(combined_output(&output).contains("whyfi key set"));
}

#[test]
fn test_watch_replays_recording() {
    let dir = tempfile::tempdir().unwrap();
    let snaps = write_json(
        dir.path(),
        "snaps.json",
        &json!([snapshot(-55, 20.0), snapshot(-70, 80.0), snapshot(-80, 150.0)]),
    );
    let output = whyfi_cmd(dir.path())
        .args(["watch", "-n", "2", "--interval-ms", "10", "--snapshots"])
        .arg(&snaps)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("#1"), "{stdout}");
    assert!(stdout.contains("#2"), "{stdout}");
    assert!(!stdout.contains("#3"), "{stdout}");
    assert!(stdout.contains("Signal Strength"), "{stdout}");
}

#[test]
fn test_watch_json_is_line_delimited() {
    let dir = tempfile::tempdir().unwrap();
    let snaps = write_json(
        dir.path(),
        "snaps.json",
        &json!([snapshot(-55, 20.0), snapshot(-60, 25.0)]),
    );
    let output = whyfi_cmd(dir.path())
        .args(["-o", "json", "watch", "--interval-ms", "10", "--snapshots"])
        .arg(&snaps)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let lines: Vec<serde_json::Value> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[1]["wifi"]["signal_dbm"], -60);
}

#[test]
fn test_watch_yaml_is_a_document_stream() {
    let dir = tempfile::tempdir().unwrap();
    let snaps = write_json(
        dir.path(),
        "snaps.json",
        &json!([snapshot(-55, 20.0), snapshot(-60, 25.0)]),
    );
    let output = whyfi_cmd(dir.path())
        .args(["-o", "yaml", "watch", "--interval-ms", "10", "--snapshots"])
        .arg(&snaps)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().filter(|l| *l == "---").count(), 2, "{stdout}");
    assert!(stdout.contains("signal_dbm: -60"), "{stdout}");
    assert!(!stdout.contains('{'), "{stdout}");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_diagnose_against_mock_service() {
    let server = MockServer::start().await;
    let report = json!({
        "summary": "Connection looks healthy.",
        "overallHealth": "good",
        "issues": [{ "description": "Slightly elevated DNS lookup", "severity": "low" }],
        "recommendations": ["Keep the router where it is"]
    });
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": report.to_string() } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let base_url = format!("{}/v1", server.uri());
    let output = tokio::task::spawn_blocking(move || {
        let dir = tempfile::tempdir().unwrap();
        let snaps = write_json(
            dir.path(),
            "snaps.json",
            &json!([snapshot(-55, 20.0), snapshot(-58, 22.0)]),
        );
        whyfi_cmd(dir.path())
            .env(TEST_KEY_ENV, "sk-test")
            .env("WHYFI_DIAGNOSIS__BASE_URL", &base_url)
            .args(["-o", "json", "diagnose", "--snapshots"])
            .arg(&snaps)
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert!(output.status.success(), "{}", combined_output(&output));
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["overallHealth"], "good");
    assert_eq!(parsed["issues"][0]["severity"], "low");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_diagnose_rejected_key_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "message": "Incorrect API key provided" }
        })))
        .mount(&server)
        .await;

    let base_url = format!("{}/v1", server.uri());
    let output = tokio::task::spawn_blocking(move || {
        let dir = tempfile::tempdir().unwrap();
        let snaps = write_json(dir.path(), "snaps.json", &snapshot(-55, 20.0));
        whyfi_cmd(dir.path())
            .env(TEST_KEY_ENV, "sk-bad")
            .env("WHYFI_DIAGNOSIS__BASE_URL", &base_url)
            .args(["diagnose", "--snapshots"])
            .arg(&snaps)
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert_eq!(output.status.code(), Some(3), "{}", combined_output(&output));
    assert!(combined_output(&output).contains("Invalid API key"));
}
