use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper to create a test command
fn infractl() -> Command {
    let mut cmd = Command::cargo_bin("infractl").unwrap();
    cmd.env_remove("INFRACTL_PROFILE")
        .env_remove("INFRACTL_CONFIG_FILE")
        .env_remove("RUST_LOG");
    cmd
}

/// Write a config with one profile pointing at `endpoint`
fn write_config(dir: &Path, endpoint: &str) -> String {
    let config_path = dir.join("config.toml");
    fs::write(
        &config_path,
        format!(
            r#"
default_profile = "mock"

[profiles.mock]
endpoint = "{endpoint}/v1"
token = "tok-abc"
region = "eu-1"
"#
        ),
    )
    .unwrap();
    config_path.display().to_string()
}

// ============================================================================
// Help and version
// ============================================================================

#[test]
fn test_help_flag() {
    infractl()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Infrastructure control plane CLI"))
        .stdout(predicate::str::contains("EXAMPLES:"));
}

#[test]
fn test_version_flag() {
    infractl()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("infractl"))
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_version_command_json() {
    infractl()
        .args(["version", "-o", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"version\""));
}

#[test]
fn test_no_args_shows_help() {
    infractl()
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn test_invalid_subcommand() {
    infractl()
        .arg("invalid-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_wait_requires_target() {
    infractl()
        .args(["wait", "/networks/net-1"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("--target"));
}

// ============================================================================
// Profiles
// ============================================================================

#[test]
fn test_profile_lifecycle() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.toml").display().to_string();

    infractl()
        .args(["--config-file", &config, "profile", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No profiles configured"));

    infractl()
        .args([
            "--config-file",
            &config,
            "profile",
            "set",
            "prod",
            "--endpoint",
            "https://cp.example.com/v1",
            "--token",
            "secret-token-1234",
            "--region",
            "eu-1",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Profile 'prod' saved"));

    infractl()
        .args(["--config-file", &config, "profile", "show", "prod"])
        .assert()
        .success()
        .stdout(predicate::str::contains("https://cp.example.com/v1"))
        .stdout(predicate::str::contains("****1234"))
        .stdout(predicate::str::contains("secret-token").not());

    infractl()
        .args(["--config-file", &config, "profile", "list", "-o", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"default\": true"));

    infractl()
        .args(["--config-file", &config, "profile", "remove", "prod"])
        .assert()
        .success();

    infractl()
        .args(["--config-file", &config, "profile", "show", "prod"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Profile 'prod' not found"));
}

#[test]
fn test_default_requires_existing_profile() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.toml").display().to_string();

    infractl()
        .args(["--config-file", &config, "profile", "default", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("infractl profile list"));
}

#[test]
fn test_api_without_profile_suggests_setup() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.toml").display().to_string();

    infractl()
        .args(["--config-file", &config, "api", "get", "/networks"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("No profile configured"));
}

// ============================================================================
// Against a mock control plane
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_api_get_prints_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/networks/net-1"))
        .and(header("authorization", "Bearer tok-abc"))
        .and(query_param("region", "eu-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "net-1", "status": "ACTIVE"})),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), &server.uri());

    infractl()
        .args(["--config-file", &config, "api", "get", "networks/net-1", "-o", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"ACTIVE\""));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_api_rejection_exits_nonzero() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(409).set_body_string("name already taken"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), &server.uri());

    infractl()
        .args([
            "--config-file",
            &config,
            "api",
            "post",
            "/networks",
            "--data",
            r#"{"name":"edge"}"#,
        ])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("HTTP 409"))
        .stderr(predicate::str::contains("name already taken"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_wait_reaches_target() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/networks/net-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "net-1", "state": {"phase": "RUNNING"}})),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), &server.uri());

    infractl()
        .args([
            "--config-file",
            &config,
            "wait",
            "/networks/net-1",
            "--target",
            "RUNNING",
            "--status-field",
            "state.phase",
            "--interval",
            "0",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("/networks/net-1 reached RUNNING"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_wait_failure_state_exits_nonzero() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ERROR"})))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), &server.uri());

    infractl()
        .args([
            "--config-file",
            &config,
            "wait",
            "/networks/net-1",
            "--target",
            "ACTIVE",
            "--failure",
            "ERROR",
            "--interval",
            "0",
        ])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("failure state 'ERROR'"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_wait_absent_ok_after_delete() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), &server.uri());

    infractl()
        .args([
            "--config-file",
            &config,
            "wait",
            "/networks/net-1",
            "--target",
            "DELETED",
            "--absent-ok",
            "--interval",
            "0",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("no longer exists"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_wait_deadline_reports_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "PENDING"})))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), &server.uri());

    infractl()
        .args([
            "--config-file",
            &config,
            "wait",
            "/networks/net-1",
            "--target",
            "ACTIVE",
            "--timeout",
            "1",
            "--interval",
            "1",
        ])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Timeout"));
}
