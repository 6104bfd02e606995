//! Integration tests for the `iotdash` binary.
//!
//! Argument parsing, config handling and a few commands against a mock
//! backend. Nothing here needs a real device.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// `iotdash` with env isolation: no `IOTDASH_*` overrides and config
/// directories pointed at `home`.
fn iotdash_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("iotdash");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home)
        .env("NO_COLOR", "1")
        .env_remove("IOTDASH_PROFILE")
        .env_remove("IOTDASH_URL")
        .env_remove("IOTDASH_CONFIG")
        .env_remove("IOTDASH_OUTPUT")
        .env_remove("IOTDASH_INSECURE")
        .env_remove("IOTDASH_TIMEOUT")
        .env_remove("RUST_LOG");
    cmd
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

async fn mount_get(server: &MockServer, route: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn no_args_shows_help() {
    let home = tempfile::tempdir().unwrap();
    let output = iotdash_cmd(home.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("Usage"));
}

#[test]
fn help_lists_commands() {
    let home = tempfile::tempdir().unwrap();
    iotdash_cmd(home.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("devices")
            .and(predicate::str::contains("relays"))
            .and(predicate::str::contains("sensors"))
            .and(predicate::str::contains("watch")),
    );
}

#[test]
fn version_flag() {
    let home = tempfile::tempdir().unwrap();
    iotdash_cmd(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("iotdash"));
}

#[test]
fn completions_zsh() {
    let home = tempfile::tempdir().unwrap();
    iotdash_cmd(home.path())
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn invalid_output_format_is_rejected() {
    let home = tempfile::tempdir().unwrap();
    let output = iotdash_cmd(home.path())
        .args(["--output", "xml", "devices", "list"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(combined_output(&output).contains("possible values"));
}

// ── Configuration ───────────────────────────────────────────────────

#[test]
fn devices_without_backend_is_a_usage_error() {
    let home = tempfile::tempdir().unwrap();
    let config = home.path().join("config.toml");
    iotdash_cmd(home.path())
        .args(["--config", config.to_str().unwrap(), "devices", "list"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("No backend configured"));
}

#[test]
fn unknown_profile_is_reported() {
    let home = tempfile::tempdir().unwrap();
    let config = home.path().join("config.toml");
    iotdash_cmd(home.path())
        .args([
            "--config",
            config.to_str().unwrap(),
            "--profile",
            "attic",
            "--url",
            "http://127.0.0.1:9",
            "devices",
            "list",
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("attic"));
}

#[test]
fn config_init_then_show() {
    let home = tempfile::tempdir().unwrap();
    let config = home.path().join("iotdash").join("config.toml");
    let config_arg = config.to_str().unwrap();

    iotdash_cmd(home.path())
        .args([
            "--config",
            config_arg,
            "--url",
            "http://gateway.local:5000",
            "config",
            "init",
            "--name",
            "lab",
            "--push",
        ])
        .assert()
        .success();
    assert!(config.exists());

    iotdash_cmd(home.path())
        .args(["--config", config_arg, "config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("[profiles.lab]")
                .and(predicate::str::contains("http://gateway.local:5000"))
                .and(predicate::str::contains("push = true"))
                .and(predicate::str::contains("default_profile = \"lab\"")),
        );

    iotdash_cmd(home.path())
        .args(["--config", config_arg, "config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn config_init_rejects_bad_url() {
    let home = tempfile::tempdir().unwrap();
    let config = home.path().join("config.toml");
    iotdash_cmd(home.path())
        .args([
            "--config",
            config.to_str().unwrap(),
            "--url",
            "not a url",
            "config",
            "init",
        ])
        .assert()
        .code(2);
    assert!(!config.exists());
}

// ── Backend commands ────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn devices_list_as_json() {
    let server = MockServer::start().await;
    mount_get(
        &server,
        "/api/devices",
        json!([
            {"id": 1, "name": "Greenhouse", "ip_address": "10.0.0.21", "is_active": true},
            {"id": 2, "name": "Garage", "is_active": false}
        ]),
    )
    .await;
    mount_get(
        &server,
        "/api/relays",
        json!([{"id": 3, "device_id": 1, "name": "Fan", "gpio_pin": 17, "status": false}]),
    )
    .await;
    mount_get(&server, "/api/motion_sensors", json!([])).await;

    let home = tempfile::tempdir().unwrap();
    let config = home.path().join("config.toml");
    let output = iotdash_cmd(home.path())
        .args([
            "--config",
            config.to_str().unwrap(),
            "--url",
            &server.uri(),
            "-o",
            "json",
            "devices",
            "list",
        ])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let cards: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(cards[0]["name"], "Greenhouse");
    assert_eq!(cards[0]["relay_count"], 1);
    assert_eq!(cards[1]["status_label"], "Inactive");
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_device_list_offers_first_device() {
    let server = MockServer::start().await;
    mount_get(&server, "/api/devices", json!([])).await;
    mount_get(&server, "/api/relays", json!([])).await;
    mount_get(&server, "/api/motion_sensors", json!([])).await;

    let home = tempfile::tempdir().unwrap();
    let config = home.path().join("config.toml");
    iotdash_cmd(home.path())
        .args([
            "--config",
            config.to_str().unwrap(),
            "--url",
            &server.uri(),
            "devices",
            "list",
        ])
        .assert()
        .success()
        .stderr(predicate::str::contains("Add First Device"));
}

#[tokio::test(flavor = "multi_thread")]
async fn relay_on_reports_refetched_state() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/relays/3"))
        .and(body_json(json!({"status": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;
    mount_get(
        &server,
        "/api/relays",
        json!([{"id": 3, "device_id": 1, "name": "Fan", "gpio_pin": 17, "status": "on"}]),
    )
    .await;

    let home = tempfile::tempdir().unwrap();
    let config = home.path().join("config.toml");
    let output = iotdash_cmd(home.path())
        .args([
            "--config",
            config.to_str().unwrap(),
            "--url",
            &server.uri(),
            "-o",
            "json-compact",
            "relays",
            "on",
            "3",
        ])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let relay: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(relay["status"], true);
    assert_eq!(relay["name"], "Fan");
}

#[tokio::test(flavor = "multi_thread")]
async fn updating_unknown_relay_exits_not_found() {
    let server = MockServer::start().await;
    mount_get(&server, "/api/relays", json!([])).await;

    let home = tempfile::tempdir().unwrap();
    let config = home.path().join("config.toml");
    iotdash_cmd(home.path())
        .args([
            "--config",
            config.to_str().unwrap(),
            "--url",
            &server.uri(),
            "relays",
            "update",
            "99",
            "--name",
            "Pump",
        ])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("relays list"));
}

#[tokio::test(flavor = "multi_thread")]
async fn deleting_a_vanished_device_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/devices/7"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "Device not found"})))
        .mount(&server)
        .await;
    mount_get(&server, "/api/devices", json!([])).await;
    mount_get(&server, "/api/relays", json!([])).await;
    mount_get(&server, "/api/motion_sensors", json!([])).await;

    let home = tempfile::tempdir().unwrap();
    let config = home.path().join("config.toml");
    iotdash_cmd(home.path())
        .args([
            "--config",
            config.to_str().unwrap(),
            "--url",
            &server.uri(),
            "--yes",
            "devices",
            "delete",
            "7",
        ])
        .assert()
        .success()
        .stderr(predicate::str::contains("already gone"));
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_without_yes_needs_a_terminal() {
    let server = MockServer::start().await;

    let home = tempfile::tempdir().unwrap();
    let config = home.path().join("config.toml");
    iotdash_cmd(home.path())
        .args([
            "--config",
            config.to_str().unwrap(),
            "--url",
            &server.uri(),
            "relays",
            "delete",
            "3",
        ])
        .write_stdin("")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--yes"));
}
