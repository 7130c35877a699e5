//! Configuration -- `tailgrok.toml` parsing and runtime settings
//!
//! [`TailgrokConfig`] is the top-level structure holding every section.
//!
//! # Precedence
//! 1. CLI arguments (daemon only)
//! 2. Environment variables (`TAILGROK_SOURCE_FILE=/var/log/app.log`)
//! 3. Config file (`tailgrok.toml`)
//! 4. Defaults (`Default` impls)
//!
//! # Example
//! ```no_run
//! # async fn example() -> Result<(), tailgrok_core::error::TailgrokError> {
//! use tailgrok_core::config::TailgrokConfig;
//!
//! let config = TailgrokConfig::load("tailgrok.toml").await?;
//!
//! let config = TailgrokConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, TailgrokError};

/// tailgrok configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TailgrokConfig {
    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,
    /// Tail source settings
    #[serde(default)]
    pub source: SourceConfig,
    /// Downstream channel settings
    #[serde(default)]
    pub channel: ChannelConfig,
    /// Downstream sink settings
    #[serde(default)]
    pub sink: SinkConfig,
    /// Metrics endpoint settings
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl TailgrokConfig {
    /// Loads a TOML file and applies environment overrides.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, TailgrokError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads a TOML file without environment overrides.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, TailgrokError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TailgrokError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                TailgrokError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// Parses a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, TailgrokError> {
        toml::from_str(toml_str).map_err(|e| {
            TailgrokError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// Overrides values from the environment.
    ///
    /// Naming: `TAILGROK_{SECTION}_{FIELD}`, e.g. `TAILGROK_SOURCE_NUMBER_OF_CONSUMERS=4`.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "TAILGROK_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "TAILGROK_GENERAL_LOG_FORMAT");

        // Source
        override_string(&mut self.source.file, "TAILGROK_SOURCE_FILE");
        override_string(
            &mut self.source.pattern_directory,
            "TAILGROK_SOURCE_PATTERN_DIRECTORY",
        );
        override_string(
            &mut self.source.file_record_mapping,
            "TAILGROK_SOURCE_FILE_RECORD_MAPPING",
        );
        override_usize(
            &mut self.source.input_buffer_size,
            "TAILGROK_SOURCE_INPUT_BUFFER_SIZE",
        );
        override_u64(
            &mut self.source.tailer_delay_ms,
            "TAILGROK_SOURCE_TAILER_DELAY_MS",
        );
        override_bool(
            &mut self.source.tailer_start_from_end,
            "TAILGROK_SOURCE_TAILER_START_FROM_END",
        );
        override_bool(
            &mut self.source.tailer_reopen,
            "TAILGROK_SOURCE_TAILER_REOPEN",
        );
        override_usize(
            &mut self.source.shared_queue_capacity,
            "TAILGROK_SOURCE_SHARED_QUEUE_CAPACITY",
        );
        override_usize(
            &mut self.source.number_of_consumers,
            "TAILGROK_SOURCE_NUMBER_OF_CONSUMERS",
        );
        override_usize(
            &mut self.source.event_batch_size,
            "TAILGROK_SOURCE_EVENT_BATCH_SIZE",
        );
        override_u64(
            &mut self.source.max_event_flush_delay_ms,
            "TAILGROK_SOURCE_MAX_EVENT_FLUSH_DELAY_MS",
        );
        override_string(&mut self.source.charset, "TAILGROK_SOURCE_CHARSET");
        override_u64(
            &mut self.source.last_read_wait_time_for_kill_ms,
            "TAILGROK_SOURCE_LAST_READ_WAIT_TIME_FOR_KILL_MS",
        );

        // Channel
        override_usize(&mut self.channel.capacity, "TAILGROK_CHANNEL_CAPACITY");
        override_u64(
            &mut self.channel.wait_time_since_last_put_before_stop_ms,
            "TAILGROK_CHANNEL_WAIT_TIME_SINCE_LAST_PUT_BEFORE_STOP_MS",
        );

        // Sink
        override_string(&mut self.sink.output, "TAILGROK_SINK_OUTPUT");
        override_u64(
            &mut self.sink.wait_time_since_last_put_ms,
            "TAILGROK_SINK_WAIT_TIME_SINCE_LAST_PUT_MS",
        );
        override_usize(&mut self.sink.batch_size, "TAILGROK_SINK_BATCH_SIZE");
        override_u64(&mut self.sink.poll_interval_ms, "TAILGROK_SINK_POLL_INTERVAL_MS");

        // Metrics
        override_bool(&mut self.metrics.enabled, "TAILGROK_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "TAILGROK_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "TAILGROK_METRICS_PORT");
    }

    /// Validates values that do not depend on the file system.
    ///
    /// Source-specific checks (target file exists, encoding label is known, ...)
    /// live in the log pipeline crate, which owns those semantics.
    pub fn validate(&self) -> Result<(), TailgrokError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        if self.channel.capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "channel.capacity".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        if self.sink.output.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "sink.output".to_owned(),
                reason: "must be 'stdout' or a file path".to_owned(),
            }
            .into());
        }

        if self.sink.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sink.batch_size".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        if self.sink.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sink.poll_interval_ms".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        if self.metrics.enabled && self.metrics.endpoint != "/metrics" {
            return Err(ConfigError::InvalidValue {
                field: "metrics.endpoint".to_owned(),
                reason: "only '/metrics' is supported".to_owned(),
            }
            .into());
        }

        Ok(())
    }
}

/// General settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log format (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// Tail source settings
///
/// Field names follow the option keys of the source (`fileRecordMapping`,
/// `sharedQueueCapacity`, ...) in snake case.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// File to tail (required)
    pub file: String,
    /// Directory (or single file) of grok pattern definitions
    pub pattern_directory: String,
    /// Grok expression describing the fields to extract (required)
    pub file_record_mapping: String,
    /// Read chunk size in bytes
    pub input_buffer_size: usize,
    /// Delay between checks of the file for new content
    pub tailer_delay_ms: u64,
    /// Start at the end of the file instead of the beginning
    pub tailer_start_from_end: bool,
    /// Close and reopen the file between polls
    pub tailer_reopen: bool,
    /// Capacity of the queue shared by the reader and its consumers
    pub shared_queue_capacity: usize,
    /// Number of consumers extracting fields and delivering batches
    pub number_of_consumers: usize,
    /// Flush threshold by count
    pub event_batch_size: usize,
    /// Flush threshold by time
    pub max_event_flush_delay_ms: u64,
    /// Encoding label of the tailed file
    pub charset: String,
    /// Reader idle window before it is allowed to stop
    pub last_read_wait_time_for_kill_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            file: String::new(),
            pattern_directory: "./conf/logstash_patterns".to_owned(),
            file_record_mapping: String::new(),
            input_buffer_size: 1024,
            tailer_delay_ms: 500,
            tailer_start_from_end: true,
            tailer_reopen: true,
            shared_queue_capacity: 10_000,
            number_of_consumers: 2,
            event_batch_size: 10,
            max_event_flush_delay_ms: 1000,
            charset: "UTF-8".to_owned(),
            last_read_wait_time_for_kill_ms: 10_000,
        }
    }
}

/// Downstream channel settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Maximum number of buffered events
    pub capacity: usize,
    /// Idle window since the last put/take before the channel may stop
    pub wait_time_since_last_put_before_stop_ms: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            wait_time_since_last_put_before_stop_ms: 5000,
        }
    }
}

/// Downstream sink settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// `stdout` or a file path receiving JSON lines
    pub output: String,
    /// Idle window since the last transmission before the sink may stop
    pub wait_time_since_last_put_ms: u64,
    /// Maximum events taken from the channel per delivery
    pub batch_size: usize,
    /// Delay between channel polls when the channel is empty
    pub poll_interval_ms: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            output: "stdout".to_owned(),
            wait_time_since_last_put_ms: 5000,
            batch_size: 100,
            poll_interval_ms: 100,
        }
    }
}

/// Prometheus endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Expose the endpoint
    pub enabled: bool,
    /// Listen address
    pub listen_addr: String,
    /// Listen port
    pub port: u16,
    /// HTTP path
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9464,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- environment override helpers ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_documented_values() {
        let config = TailgrokConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.source.pattern_directory, "./conf/logstash_patterns");
        assert_eq!(config.source.input_buffer_size, 1024);
        assert_eq!(config.source.tailer_delay_ms, 500);
        assert!(config.source.tailer_start_from_end);
        assert!(config.source.tailer_reopen);
        assert_eq!(config.source.shared_queue_capacity, 10_000);
        assert_eq!(config.source.number_of_consumers, 2);
        assert_eq!(config.source.event_batch_size, 10);
        assert_eq!(config.source.max_event_flush_delay_ms, 1000);
        assert_eq!(config.source.charset, "UTF-8");
        assert_eq!(config.source.last_read_wait_time_for_kill_ms, 10_000);
        assert_eq!(config.channel.wait_time_since_last_put_before_stop_ms, 5000);
        assert_eq!(config.sink.wait_time_since_last_put_ms, 5000);
    }

    #[test]
    fn default_config_passes_validation() {
        TailgrokConfig::default().validate().unwrap();
    }

    #[test]
    fn parse_empty_toml_uses_defaults() {
        let config = TailgrokConfig::parse("").unwrap();
        assert_eq!(config.source.number_of_consumers, 2);
        assert_eq!(config.sink.output, "stdout");
    }

    #[test]
    fn parse_partial_toml_merges_with_defaults() {
        let toml = r#"
[source]
file = "/var/log/app.log"
file_record_mapping = "%{LOGLEVEL:level} %{GREEDYDATA:message}"
number_of_consumers = 4
"#;
        let config = TailgrokConfig::parse(toml).unwrap();
        assert_eq!(config.source.file, "/var/log/app.log");
        assert_eq!(config.source.number_of_consumers, 4);
        assert_eq!(config.source.event_batch_size, 10);
    }

    #[test]
    fn parse_rejects_malformed_toml() {
        let err = TailgrokConfig::parse("[source\nfile = 1").unwrap_err();
        assert!(matches!(
            err,
            TailgrokError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_unknown_log_format() {
        let mut config = TailgrokConfig::default();
        config.general.log_format = "xml".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("general.log_format"));
    }

    #[test]
    fn validate_rejects_zero_channel_capacity() {
        let mut config = TailgrokConfig::default();
        config.channel.capacity = 0;
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn from_file_missing_reports_path() {
        let err = TailgrokConfig::from_file("/nonexistent/tailgrok.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TailgrokError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
