//! Error types shared by every tailgrok crate.

/// Top-level tailgrok error.
#[derive(Debug, thiserror::Error)]
pub enum TailgrokError {
    /// Configuration errors
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline lifecycle and delivery errors
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// I/O errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file does not exist
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// Config file is not valid TOML
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// A value is out of range or otherwise unusable
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Pipeline errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Pipeline could not be assembled
    #[error("pipeline init failed: {0}")]
    InitFailed(String),

    /// `start()` called on a running pipeline
    #[error("pipeline is already running")]
    AlreadyRunning,

    /// `stop()` called on a pipeline that is not running
    #[error("pipeline is not running")]
    NotRunning,

    /// Downstream rejected a batch
    #[error("delivery failed: {0}")]
    Delivery(String),

    /// A worker task terminated abnormally
    #[error("worker '{worker}' failed: {reason}")]
    WorkerFailed { worker: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts_to_top_level() {
        let err: TailgrokError = ConfigError::InvalidValue {
            field: "source.file".to_owned(),
            reason: "must not be empty".to_owned(),
        }
        .into();
        assert!(matches!(err, TailgrokError::Config(_)));
        assert!(err.to_string().contains("source.file"));
    }

    #[test]
    fn worker_failed_display_names_worker() {
        let err = PipelineError::WorkerFailed {
            worker: "consumer-1".to_owned(),
            reason: "delivery failed".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("consumer-1"));
        assert!(msg.contains("delivery failed"));
    }
}
