//! Log pipeline configuration
//!
//! [`PipelineConfig`] is derived from the core [`SourceConfig`](tailgrok_core::config::SourceConfig)
//! and carries the settings the reader and consumers run with.
//!
//! # Example
//! ```ignore
//! use tailgrok_core::config::TailgrokConfig;
//! use tailgrok_log_pipeline::config::PipelineConfig;
//!
//! let core_config = TailgrokConfig::default();
//! let config = PipelineConfig::from_core(&core_config.source);
//! ```

use std::path::Path;
use std::time::Duration;

use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};

use crate::error::LogPipelineError;

/// Option keys, as named in error messages.
pub mod keys {
    pub const FILE: &str = "file";
    pub const PATTERN_DIRECTORY: &str = "patternDirectory";
    pub const FILE_RECORD_MAPPING: &str = "fileRecordMapping";
    pub const INPUT_BUFFER_SIZE: &str = "inputBufferSize";
    pub const TAILER_DELAY_MS: &str = "tailerDelayMs";
    pub const SHARED_QUEUE_CAPACITY: &str = "sharedQueueCapacity";
    pub const NUMBER_OF_CONSUMERS: &str = "numberOfConsumers";
    pub const EVENT_BATCH_SIZE: &str = "eventBatchSize";
    pub const MAX_EVENT_FLUSH_DELAY_MS: &str = "maxEventFlushDelayInMs";
    pub const CHARSET: &str = "charset";
    pub const LAST_READ_WAIT_TIME_FOR_KILL_MS: &str = "lastReadWaitTimeForKillInMs";
}

/// Log pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// File to tail
    pub file: String,
    /// Grok pattern directory or file
    pub pattern_directory: String,
    /// Grok expression applied to every line
    pub file_record_mapping: String,
    /// Read chunk size in bytes
    pub input_buffer_size: usize,
    /// Delay between polls of the tailed file (ms)
    pub tailer_delay_ms: u64,
    /// Start at EOF instead of offset 0
    pub tailer_start_from_end: bool,
    /// Close the file between polls
    pub tailer_reopen: bool,
    /// Capacity of the reader -> consumer queue
    pub shared_queue_capacity: usize,
    /// Number of consumers
    pub number_of_consumers: usize,
    /// Flush threshold by count
    pub event_batch_size: usize,
    /// Flush threshold by time (ms)
    pub max_event_flush_delay_ms: u64,
    /// Encoding label of the tailed file
    pub charset: String,
    /// Reader quiescence window (ms)
    pub last_read_wait_time_for_kill_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_core(&tailgrok_core::config::SourceConfig::default())
    }
}

impl PipelineConfig {
    /// Creates the pipeline settings from the core `[source]` section.
    pub fn from_core(core: &tailgrok_core::config::SourceConfig) -> Self {
        Self {
            file: core.file.clone(),
            pattern_directory: core.pattern_directory.clone(),
            file_record_mapping: core.file_record_mapping.clone(),
            input_buffer_size: core.input_buffer_size,
            tailer_delay_ms: core.tailer_delay_ms,
            tailer_start_from_end: core.tailer_start_from_end,
            tailer_reopen: core.tailer_reopen,
            shared_queue_capacity: core.shared_queue_capacity,
            number_of_consumers: core.number_of_consumers,
            event_batch_size: core.event_batch_size,
            max_event_flush_delay_ms: core.max_event_flush_delay_ms,
            charset: core.charset.clone(),
            last_read_wait_time_for_kill_ms: core.last_read_wait_time_for_kill_ms,
        }
    }

    /// Validates values without touching the file system.
    pub fn validate(&self) -> Result<(), LogPipelineError> {
        if self.file.trim().is_empty() {
            return Err(LogPipelineError::config(keys::FILE, "must be specified"));
        }

        if self.pattern_directory.trim().is_empty() {
            return Err(LogPipelineError::config(
                keys::PATTERN_DIRECTORY,
                "must be specified",
            ));
        }

        if self.file_record_mapping.trim().is_empty() {
            return Err(LogPipelineError::config(
                keys::FILE_RECORD_MAPPING,
                "must be specified",
            ));
        }

        let positive = [
            (keys::INPUT_BUFFER_SIZE, self.input_buffer_size as u64),
            (keys::TAILER_DELAY_MS, self.tailer_delay_ms),
            (keys::SHARED_QUEUE_CAPACITY, self.shared_queue_capacity as u64),
            (keys::NUMBER_OF_CONSUMERS, self.number_of_consumers as u64),
            (keys::EVENT_BATCH_SIZE, self.event_batch_size as u64),
            (keys::MAX_EVENT_FLUSH_DELAY_MS, self.max_event_flush_delay_ms),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(LogPipelineError::config(field, "must be greater than 0"));
            }
        }

        self.encoding()?;
        Ok(())
    }

    /// Checks that the tailed file exists and is a regular file.
    pub fn validate_paths(&self) -> Result<(), LogPipelineError> {
        let path = Path::new(&self.file);
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_file() => Ok(()),
            Ok(_) => Err(LogPipelineError::config(
                keys::FILE,
                format!("'{}' is not a regular file", self.file),
            )),
            Err(e) => Err(LogPipelineError::config(
                keys::FILE,
                format!("'{}' is not accessible: {e}", self.file),
            )),
        }
    }

    /// Resolves the `charset` label.
    ///
    /// Lines are split on `\n` before decoding, so only ASCII-compatible
    /// encodings are accepted (UTF-16 is not).
    pub fn encoding(&self) -> Result<&'static Encoding, LogPipelineError> {
        let encoding = Encoding::for_label(self.charset.trim().as_bytes()).ok_or_else(|| {
            LogPipelineError::config(
                keys::CHARSET,
                format!("unknown character encoding '{}'", self.charset),
            )
        })?;
        if !encoding.is_ascii_compatible() {
            return Err(LogPipelineError::config(
                keys::CHARSET,
                format!("'{}' is not an ASCII-compatible encoding", encoding.name()),
            ));
        }
        Ok(encoding)
    }

    pub fn tailer_delay(&self) -> Duration {
        Duration::from_millis(self.tailer_delay_ms)
    }

    pub fn max_event_flush_delay(&self) -> Duration {
        Duration::from_millis(self.max_event_flush_delay_ms)
    }

    pub fn reader_quiescence(&self) -> Duration {
        Duration::from_millis(self.last_read_wait_time_for_kill_ms)
    }
}

/// Pipeline settings builder
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, path: impl Into<String>) -> Self {
        self.config.file = path.into();
        self
    }

    pub fn pattern_directory(mut self, dir: impl Into<String>) -> Self {
        self.config.pattern_directory = dir.into();
        self
    }

    pub fn file_record_mapping(mut self, mapping: impl Into<String>) -> Self {
        self.config.file_record_mapping = mapping.into();
        self
    }

    pub fn input_buffer_size(mut self, size: usize) -> Self {
        self.config.input_buffer_size = size;
        self
    }

    pub fn tailer_delay_ms(mut self, ms: u64) -> Self {
        self.config.tailer_delay_ms = ms;
        self
    }

    pub fn tailer_start_from_end(mut self, from_end: bool) -> Self {
        self.config.tailer_start_from_end = from_end;
        self
    }

    pub fn tailer_reopen(mut self, reopen: bool) -> Self {
        self.config.tailer_reopen = reopen;
        self
    }

    pub fn shared_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.shared_queue_capacity = capacity;
        self
    }

    pub fn number_of_consumers(mut self, count: usize) -> Self {
        self.config.number_of_consumers = count;
        self
    }

    pub fn event_batch_size(mut self, size: usize) -> Self {
        self.config.event_batch_size = size;
        self
    }

    pub fn max_event_flush_delay_ms(mut self, ms: u64) -> Self {
        self.config.max_event_flush_delay_ms = ms;
        self
    }

    pub fn charset(mut self, label: impl Into<String>) -> Self {
        self.config.charset = label.into();
        self
    }

    pub fn last_read_wait_time_for_kill_ms(mut self, ms: u64) -> Self {
        self.config.last_read_wait_time_for_kill_ms = ms;
        self
    }

    /// Validates and returns the settings.
    pub fn build(self) -> Result<PipelineConfig, LogPipelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
