//! Orchestrator integration tests.
//!
//! Tests the full flow: config -> build -> start -> health check -> shutdown.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tailgrok_core::config::TailgrokConfig;
use tailgrok_daemon::orchestrator::Orchestrator;

fn patterns_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../conf/logstash_patterns")
}

fn append(path: &Path, text: &str) {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .unwrap();
    file.write_all(text.as_bytes()).unwrap();
}

/// Config tailing `log` into `output` with short idle windows.
fn test_config(log: &Path, output: &Path, patterns: &Path) -> TailgrokConfig {
    let toml_str = format!(
        r#"
[general]
log_level = "debug"
log_format = "json"

[source]
file = "{file}"
pattern_directory = "{patterns}"
file_record_mapping = "%{{TIMESTAMP_ISO8601:timestamp}} %{{LOGLEVEL:level}} %{{GREEDYDATA:message}}"
tailer_delay_ms = 20
max_event_flush_delay_ms = 100
last_read_wait_time_for_kill_ms = 200
number_of_consumers = 2

[channel]
capacity = 1000
wait_time_since_last_put_before_stop_ms = 200

[sink]
output = "{output}"
wait_time_since_last_put_ms = 200
poll_interval_ms = 20
"#,
        file = log.display(),
        patterns = patterns.display(),
        output = output.display(),
    );
    TailgrokConfig::parse(&toml_str).expect("failed to parse test config")
}

#[tokio::test]
async fn test_build_fails_for_missing_pattern_directory() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("app.log");
    append(&log, "");
    let config = test_config(&log, &dir.path().join("out.jsonl"), &dir.path().join("nope"));

    let err = Orchestrator::build_from_config(config).await.err().unwrap();
    assert!(err.to_string().contains("pattern library"));
}

#[tokio::test]
async fn test_build_fails_for_unknown_charset() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("app.log");
    append(&log, "");
    let mut config = test_config(&log, &dir.path().join("out.jsonl"), &patterns_dir());
    config.source.charset = "no-such-charset".to_owned();

    let err = Orchestrator::build_from_config(config).await.err().unwrap();
    assert!(err.to_string().contains("charset"));
}

#[tokio::test]
async fn test_start_fails_for_missing_source_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(
        &dir.path().join("missing.log"),
        &dir.path().join("out.jsonl"),
        &patterns_dir(),
    );

    let mut orchestrator = Orchestrator::build_from_config(config).await.unwrap();
    let err = orchestrator.start().await.unwrap_err();
    assert!(err.to_string().contains("log pipeline"));
}

#[tokio::test]
async fn test_lines_are_written_as_json_and_survive_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("app.log");
    let output = dir.path().join("events.jsonl");
    append(&log, "");

    let config = test_config(&log, &output, &patterns_dir());
    let mut orchestrator = Orchestrator::build_from_config(config).await.unwrap();
    orchestrator.start().await.unwrap();
    assert!(orchestrator.health().await.status.is_healthy());

    tokio::time::sleep(Duration::from_millis(100)).await;
    append(
        &log,
        "2024-01-15T12:00:00Z INFO service started\n\
         2024-01-15T12:00:01Z WARN cache miss ratio high\n\
         free-form line\n",
    );

    // Stop right away: the idle windows keep everything alive until delivered.
    orchestrator.shutdown().await.unwrap();

    let content = std::fs::read_to_string(&output).unwrap();
    let events: Vec<serde_json::Value> = content
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(events.len(), 3);

    let started = events
        .iter()
        .find(|e| e["message"] == "2024-01-15T12:00:00Z INFO service started")
        .expect("first line delivered");
    assert_eq!(started["fields"]["level"], "INFO");
    assert_eq!(started["fields"]["timestamp"], "2024-01-15T12:00:00Z");
    assert_eq!(started["fields"]["message"], "service started");

    let free_form = events
        .iter()
        .find(|e| e["message"] == "free-form line")
        .expect("unmatched line delivered");
    assert!(free_form["fields"].as_object().unwrap().is_empty());

    assert!(orchestrator.health().await.status.is_unhealthy());
}
