//! Log pipeline error types
//!
//! [`LogPipelineError`] covers every failure inside the pipeline. It converts
//! into [`TailgrokError`] so upper layers can propagate with `?`.

use tailgrok_core::error::{ConfigError, PipelineError, TailgrokError};

/// Log pipeline domain error
#[derive(Debug, thiserror::Error)]
pub enum LogPipelineError {
    /// Invalid or missing option, named by its option key
    #[error("config error: {field}: {reason}")]
    Config {
        /// Option key (e.g. `fileRecordMapping`)
        field: String,
        /// Reason
        reason: String,
    },

    /// Expanded grok expression is not a valid regular expression
    #[error("pattern syntax error in '{expression}': {reason}")]
    PatternSyntax {
        /// Fully expanded expression
        expression: String,
        /// Regex engine message
        reason: String,
    },

    /// Pattern source unreadable or absent
    #[error("pattern load error: {path}: {reason}")]
    PatternLoad {
        /// File or directory path
        path: String,
        /// Reason
        reason: String,
    },

    /// Tailed file momentarily missing or rotated
    #[error("source error: {path}: {reason}")]
    Source {
        /// Tailed file path
        path: String,
        /// Reason
        reason: String,
    },

    /// Downstream rejected a batch
    #[error("delivery error: {0}")]
    Delivery(String),

    /// Channel closed or full
    #[error("channel error: {0}")]
    Channel(String),

    /// Operation not allowed in the component's current state
    #[error("invalid state: {0}")]
    State(String),

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl LogPipelineError {
    pub(crate) fn config(field: &str, reason: impl Into<String>) -> Self {
        Self::Config {
            field: field.to_owned(),
            reason: reason.into(),
        }
    }
}

impl From<LogPipelineError> for TailgrokError {
    fn from(err: LogPipelineError) -> Self {
        match err {
            LogPipelineError::Config { field, reason } => {
                TailgrokError::Config(ConfigError::InvalidValue { field, reason })
            }
            LogPipelineError::Delivery(reason) => {
                TailgrokError::Pipeline(PipelineError::Delivery(reason))
            }
            LogPipelineError::Io(e) => TailgrokError::Io(e),
            other => TailgrokError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}
