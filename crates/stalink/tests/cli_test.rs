//! Integration tests for the `stalink` CLI binary.
//!
//! Argument parsing, config handling and error exit codes run without a
//! service; entity commands run against a wiremock server.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `stalink` binary with env isolation.
fn stalink_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("stalink");
    cmd.env("HOME", "/tmp/stalink-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/stalink-cli-test-nonexistent")
        .env_remove("STALINK_ENDPOINT")
        .env_remove("STALINK_MQTT_HOST")
        .env_remove("STALINK_TIMEOUT")
        .env_remove("STALINK_INSECURE")
        .env_remove("RUST_LOG");
    cmd
}

/// Run the binary off the async runtime and collect its output.
async fn run(args: Vec<String>) -> std::process::Output {
    tokio::task::spawn_blocking(move || stalink_cmd().args(args).output().unwrap())
        .await
        .unwrap()
}

fn args(server: &MockServer, rest: &[&str]) -> Vec<String> {
    let mut args = vec!["--endpoint".to_owned(), format!("{}/v1.1", server.uri())];
    args.extend(rest.iter().map(|s| (*s).to_owned()));
    args
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = stalink_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Usage"));
}

#[test]
fn test_help_flag() {
    stalink_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("SensorThings")
            .and(predicate::str::contains("list"))
            .and(predicate::str::contains("watch")),
    );
}

#[test]
fn test_completions_bash() {
    stalink_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

// ── Local failures ──────────────────────────────────────────────────

#[test]
fn test_missing_endpoint() {
    stalink_cmd()
        .args(["list", "Things"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("No service endpoint configured"));
}

#[test]
fn test_unknown_collection_fails_before_any_request() {
    stalink_cmd()
        .args(["--endpoint", "http://127.0.0.1:9/v1.1", "list", "Gadgets"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Gadgets"));
}

#[test]
fn test_watch_requires_mqtt() {
    stalink_cmd()
        .args(["--endpoint", "http://127.0.0.1:9/v1.1", "watch", "Things"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("MQTT is not configured"));
}

#[test]
fn test_config_init_then_show() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    let config = config.to_str().unwrap();

    stalink_cmd()
        .args([
            "--config",
            config,
            "config",
            "init",
            "--endpoint",
            "https://example.org/v1.1",
            "--mqtt-host",
            "broker.example.org",
        ])
        .assert()
        .success();

    stalink_cmd()
        .args(["--config", config, "config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("endpoint = \"https://example.org/v1.1\"")
                .and(predicate::str::contains("host = \"broker.example.org\"")),
        );
}

// ── Against a mock service ──────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_get_prints_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1.1/Things(1)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "@iot.id": 1,
            "@iot.selfLink": "ignored",
            "name": "Lamp"
        })))
        .mount(&server)
        .await;

    let output = run(args(&server, &["-o", "json", "get", "Things(1)"])).await;
    assert!(output.status.success());
    let printed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(printed, json!({ "@iot.id": 1, "name": "Lamp" }));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_list_plain_ids() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1.1/Things(1)/Datastreams"))
        .and(query_param("$select", "id,name"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{ "@iot.id": 4 }, { "@iot.id": 5 }]
        })))
        .mount(&server)
        .await;

    let output = run(args(
        &server,
        &["-o", "plain", "list", "Things(1)/Datastreams", "--select", "id,name"],
    ))
    .await;
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "4\n5\n");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_not_found_exit_code() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1.1/Sensors(9)"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let output = run(args(&server, &["get", "Sensors(9)"])).await;
    assert_eq!(output.status.code(), Some(4));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_delete_requires_confirmation() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v1.1/Sensors(9)"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let output = run(args(&server, &["delete", "Sensors(9)"])).await;
    assert_eq!(output.status.code(), Some(2));

    let output = run(args(&server, &["--yes", "delete", "Sensors(9)"])).await;
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Deleted Sensors(9)"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_create_reports_location() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1.1/Things"))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("Location", format!("{}/v1.1/Things(42)", server.uri())),
        )
        .mount(&server)
        .await;

    let output = run(args(
        &server,
        &["-o", "plain", "create", "Things", "--data", r#"{"name":"Lamp","description":"Desk"}"#],
    ))
    .await;
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "42\n");
    assert!(String::from_utf8_lossy(&output.stderr).contains("Created Things(42)"));
}
