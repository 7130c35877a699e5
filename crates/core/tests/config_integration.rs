//! tailgrok.toml integration tests
//!
//! - tailgrok.toml.example parsing
//! - partial configs (single sections)
//! - environment override precedence
//! - empty / malformed input

use tailgrok_core::config::TailgrokConfig;
use tailgrok_core::error::{ConfigError, TailgrokError};

const EXAMPLE: &str = include_str!("../../../tailgrok.toml.example");

// =============================================================================
// tailgrok.toml.example
// =============================================================================

#[test]
fn example_config_parses_successfully() {
    let config = TailgrokConfig::parse(EXAMPLE).expect("example config should parse");

    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.general.log_format, "json");
    assert_eq!(config.source.file, "/var/log/app/application.log");
    assert!(config.source.file_record_mapping.contains("%{LOGLEVEL:level}"));
}

#[test]
fn example_config_passes_validation() {
    let config = TailgrokConfig::parse(EXAMPLE).expect("should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[test]
fn example_config_matches_code_defaults() {
    let example = TailgrokConfig::parse(EXAMPLE).expect("should parse");
    let defaults = TailgrokConfig::default();

    let (e, d) = (&example.source, &defaults.source);
    assert_eq!(e.pattern_directory, d.pattern_directory);
    assert_eq!(e.input_buffer_size, d.input_buffer_size);
    assert_eq!(e.tailer_delay_ms, d.tailer_delay_ms);
    assert_eq!(e.tailer_start_from_end, d.tailer_start_from_end);
    assert_eq!(e.tailer_reopen, d.tailer_reopen);
    assert_eq!(e.shared_queue_capacity, d.shared_queue_capacity);
    assert_eq!(e.number_of_consumers, d.number_of_consumers);
    assert_eq!(e.event_batch_size, d.event_batch_size);
    assert_eq!(e.max_event_flush_delay_ms, d.max_event_flush_delay_ms);
    assert_eq!(e.charset, d.charset);
    assert_eq!(
        e.last_read_wait_time_for_kill_ms,
        d.last_read_wait_time_for_kill_ms
    );

    assert_eq!(example.channel.capacity, defaults.channel.capacity);
    assert_eq!(
        example.channel.wait_time_since_last_put_before_stop_ms,
        defaults.channel.wait_time_since_last_put_before_stop_ms
    );
    assert_eq!(example.sink.output, defaults.sink.output);
    assert_eq!(
        example.sink.wait_time_since_last_put_ms,
        defaults.sink.wait_time_since_last_put_ms
    );
    assert_eq!(example.sink.batch_size, defaults.sink.batch_size);
    assert_eq!(example.sink.poll_interval_ms, defaults.sink.poll_interval_ms);
    assert_eq!(example.metrics.enabled, defaults.metrics.enabled);
    assert_eq!(example.metrics.port, defaults.metrics.port);
}

// =============================================================================
// partial configs
// =============================================================================

#[test]
fn partial_config_general_only() {
    let config = TailgrokConfig::parse(
        r#"
[general]
log_level = "debug"
log_format = "pretty"
"#,
    )
    .expect("should parse");

    assert_eq!(config.general.log_level, "debug");
    assert_eq!(config.general.log_format, "pretty");
    assert_eq!(config.source.number_of_consumers, 2);
    assert_eq!(config.channel.capacity, 10_000);
}

#[test]
fn partial_config_channel_and_sink() {
    let config = TailgrokConfig::parse(
        r#"
[channel]
wait_time_since_last_put_before_stop_ms = 0

[sink]
output = "/tmp/tailgrok-events.jsonl"
"#,
    )
    .expect("should parse");

    assert_eq!(config.channel.wait_time_since_last_put_before_stop_ms, 0);
    assert_eq!(config.channel.capacity, 10_000);
    assert_eq!(config.sink.output, "/tmp/tailgrok-events.jsonl");
    assert_eq!(config.sink.wait_time_since_last_put_ms, 5000);
}

// =============================================================================
// environment overrides
// =============================================================================

#[test]
#[serial_test::serial]
fn env_override_takes_precedence_over_toml() {
    let mut config = TailgrokConfig::parse(
        r#"
[source]
file = "/var/log/a.log"
number_of_consumers = 3
"#,
    )
    .expect("should parse");

    // SAFETY: serialised with every other env-mutating test
    unsafe {
        std::env::set_var("TAILGROK_SOURCE_FILE", "/var/log/b.log");
        std::env::set_var("TAILGROK_SOURCE_NUMBER_OF_CONSUMERS", "8");
    }
    config.apply_env_overrides();
    unsafe {
        std::env::remove_var("TAILGROK_SOURCE_FILE");
        std::env::remove_var("TAILGROK_SOURCE_NUMBER_OF_CONSUMERS");
    }

    assert_eq!(config.source.file, "/var/log/b.log");
    assert_eq!(config.source.number_of_consumers, 8);
}

#[test]
#[serial_test::serial]
fn env_override_bool_field() {
    let mut config = TailgrokConfig::default();
    assert!(config.source.tailer_start_from_end);

    unsafe {
        std::env::set_var("TAILGROK_SOURCE_TAILER_START_FROM_END", "false");
    }
    config.apply_env_overrides();
    unsafe {
        std::env::remove_var("TAILGROK_SOURCE_TAILER_START_FROM_END");
    }

    assert!(!config.source.tailer_start_from_end);
}

#[test]
#[serial_test::serial]
fn env_override_invalid_number_is_ignored() {
    let mut config = TailgrokConfig::default();

    unsafe {
        std::env::set_var("TAILGROK_SOURCE_EVENT_BATCH_SIZE", "lots");
    }
    config.apply_env_overrides();
    unsafe {
        std::env::remove_var("TAILGROK_SOURCE_EVENT_BATCH_SIZE");
    }

    assert_eq!(config.source.event_batch_size, 10);
}

#[test]
#[serial_test::serial]
fn env_override_channel_and_sink_windows() {
    let mut config = TailgrokConfig::default();

    unsafe {
        std::env::set_var(
            "TAILGROK_CHANNEL_WAIT_TIME_SINCE_LAST_PUT_BEFORE_STOP_MS",
            "250",
        );
        std::env::set_var("TAILGROK_SINK_WAIT_TIME_SINCE_LAST_PUT_MS", "750");
    }
    config.apply_env_overrides();
    unsafe {
        std::env::remove_var("TAILGROK_CHANNEL_WAIT_TIME_SINCE_LAST_PUT_BEFORE_STOP_MS");
        std::env::remove_var("TAILGROK_SINK_WAIT_TIME_SINCE_LAST_PUT_MS");
    }

    assert_eq!(config.channel.wait_time_since_last_put_before_stop_ms, 250);
    assert_eq!(config.sink.wait_time_since_last_put_ms, 750);
}

#[test]
#[serial_test::serial]
fn env_override_missing_var_keeps_toml_value() {
    unsafe {
        std::env::remove_var("TAILGROK_SOURCE_CHARSET");
    }
    let mut config = TailgrokConfig::parse("[source]\ncharset = \"ISO-8859-1\"").expect("parse");
    config.apply_env_overrides();
    assert_eq!(config.source.charset, "ISO-8859-1");
}

// =============================================================================
// empty / malformed input
// =============================================================================

#[test]
fn comments_only_parses_with_defaults() {
    let config = TailgrokConfig::parse("# nothing here\n# at all\n").expect("should parse");
    assert_eq!(config.source.shared_queue_capacity, 10_000);
}

#[test]
fn malformed_toml_returns_parse_error() {
    let err = TailgrokConfig::parse("[source\nfile =").unwrap_err();
    assert!(matches!(
        err,
        TailgrokError::Config(ConfigError::ParseFailed { .. })
    ));
}

#[test]
fn wrong_type_for_numeric_field() {
    let err = TailgrokConfig::parse("[source]\nevent_batch_size = \"ten\"").unwrap_err();
    assert!(matches!(
        err,
        TailgrokError::Config(ConfigError::ParseFailed { .. })
    ));
}

#[test]
fn unknown_section_is_ignored() {
    let config = TailgrokConfig::parse(
        r#"
[future_section]
key = "value"

[general]
log_level = "warn"
"#,
    )
    .expect("unknown sections should be ignored");
    assert_eq!(config.general.log_level, "warn");
}

#[tokio::test]
async fn from_file_nonexistent_returns_file_not_found() {
    let err = TailgrokConfig::from_file("/nonexistent/path/tailgrok.toml")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TailgrokError::Config(ConfigError::FileNotFound { .. })
    ));
}

#[tokio::test]
#[serial_test::serial]
async fn load_example_config_from_disk() {
    let dir = std::env::temp_dir().join(format!("tailgrok-config-{}", std::process::id()));
    tokio::fs::create_dir_all(&dir).await.expect("create dir");
    let path = dir.join("tailgrok.toml");
    tokio::fs::write(&path, EXAMPLE).await.expect("write");

    let config = TailgrokConfig::load(&path).await.expect("should load");
    assert_eq!(config.sink.output, "stdout");

    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[test]
fn serialize_and_reparse_roundtrip() {
    let original = TailgrokConfig::parse(EXAMPLE).expect("should parse");
    let toml_str = toml::to_string_pretty(&original).expect("should serialize");
    let reparsed = TailgrokConfig::parse(&toml_str).expect("should reparse");
    assert_eq!(reparsed.source.file, original.source.file);
    assert_eq!(
        reparsed.source.file_record_mapping,
        original.source.file_record_mapping
    );
}
