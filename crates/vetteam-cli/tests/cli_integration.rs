//! Integration tests for the vetteam binary.
//!
//! The compiled `vetteam` executable is used both as the CLI under test and
//! as a real child-process tool host.

use std::path::Path;
use std::process::{Command, Output};
use std::time::Duration;

use serde_json::{Map, Value};
use vetteam_core::error::SessionStatus;
use vetteam_core::tools::{ToolClient, SEARCH_VET_MARKET_DATA, VET_MARKET_OVERVIEW};
use vetteam_core::transport::LaunchSpec;

const BIN: &str = env!("CARGO_BIN_EXE_vetteam");

/// Run the binary inside `dir` with an isolated environment.
fn vetteam(dir: &Path, args: &[&str]) -> Output {
    Command::new(BIN)
        .args(args)
        .current_dir(dir)
        .env_remove("VETTEAM_CONFIG")
        .env_remove("GOOGLE_API_KEY")
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run vetteam binary")
}

fn write_config(dir: &Path, yaml: &str) -> String {
    let path = dir.join("vetteam.yaml");
    std::fs::write(&path, yaml).unwrap();
    path.to_string_lossy().to_string()
}

#[tokio::test]
async fn test_tool_host_subcommand_serves_the_catalogue() {
    let client = ToolClient::default();
    let session = client
        .open(&LaunchSpec::new(BIN, ["tool-host"]).with_env("RUST_LOG", "warn"))
        .await
        .expect("tool host should complete the handshake");
    assert_eq!(session.status(), SessionStatus::Ready);
    assert_eq!(
        session.host_info().unwrap().server_info.name,
        "Vet Market Researcher"
    );

    let tools = session.discover().await.unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, SEARCH_VET_MARKET_DATA);

    let mut args = Map::new();
    args.insert("query".to_string(), Value::String("Vet market 2020-2025 data".into()));
    let result = tokio::time::timeout(
        Duration::from_secs(10),
        session.invoke(SEARCH_VET_MARKET_DATA, args),
    )
    .await
    .expect("invoke timed out")
    .unwrap();
    assert_eq!(result.text(), VET_MARKET_OVERVIEW);

    session.close().await;
    session.close().await;
    assert_eq!(session.status(), SessionStatus::Closed);
}

#[test]
fn test_offline_run_prints_json_outcome() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "research:\n  query: \"Vet market 2020-2025 data\"\n");

    let output = vetteam(dir.path(), &["run", "--offline", "--json", "--config", &config]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let outcome: Value = serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(outcome["researchData"], VET_MARKET_OVERVIEW);
    let report = outcome["analystReport"].as_str().unwrap();
    assert!(report.contains(VET_MARKET_OVERVIEW));
    assert!(outcome["businessStrategy"].as_str().unwrap().contains(report));
}

#[test]
fn test_offline_run_with_missing_host_still_completes() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        "tool_host:\n  command: /nonexistent/vet-host\n",
    );

    let output = vetteam(dir.path(), &["run", "--offline", "--json", "--config", &config]);
    assert!(output.status.success());

    let outcome: Value = serde_json::from_slice(&output.stdout).unwrap();
    let research = outcome["researchData"].as_str().unwrap();
    assert!(research.starts_with("Error connecting to tool host"));
    assert!(!outcome["businessStrategy"].as_str().unwrap().is_empty());
}

#[test]
fn test_online_run_without_key_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "completion:\n  provider: gemini\n");

    let output = vetteam(dir.path(), &["run", "--config", &config]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error:"));
    assert!(stderr.contains("GOOGLE_API_KEY"));
}

#[test]
fn test_config_command_redacts_key() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        "completion:\n  api_key: AIzaSuperSecretKeyValue\n",
    );

    let output = vetteam(dir.path(), &["config", "--config", &config]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("# source:"));
    assert!(stdout.contains("provider: gemini"));
    assert!(!stdout.contains("SuperSecret"));
}

#[test]
fn test_dotenv_supplies_the_key() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".env"), "GOOGLE_API_KEY=from-dotenv-file\n").unwrap();
    let config = write_config(dir.path(), "research:\n  query: q\n");

    let output = vetteam(dir.path(), &["config", "--config", &config]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("from****"));
    assert!(!stdout.contains("from-dotenv-file"));
}
