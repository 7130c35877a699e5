//! Diagnostic logging for the daemon.
//!
//! The daemon's own logs always go to stderr: stdout may be the event sink,
//! and interleaving diagnostics with JSON events would corrupt the stream.

use anyhow::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use tailgrok_core::config::GeneralConfig;

/// Output shape of the diagnostic log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line
    Json,
    /// Multi-line human-readable records
    Pretty,
}

impl LogFormat {
    /// Parses the `general.log_format` value.
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(anyhow::anyhow!(
                "unknown log format '{other}', expected 'json' or 'pretty'"
            )),
        }
    }

    fn layer(self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let fmt = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
        match self {
            Self::Json => fmt.json().boxed(),
            Self::Pretty => fmt.pretty().boxed(),
        }
    }
}

/// Builds the level filter; `RUST_LOG` wins over `general.log_level`.
fn level_filter(config: &GeneralConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.log_level)
        .map_err(|e| anyhow::anyhow!("invalid log level '{}': {}", config.log_level, e))
}

/// Installs the global tracing subscriber.
///
/// Call once, before the first tracing macro; a second call fails.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let format = LogFormat::parse(&config.log_format)?;
    let filter = level_filter(config)?;

    tracing_subscriber::registry()
        .with(format.layer())
        .with(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize {format:?} tracing subscriber: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_formats() {
        assert_eq!(LogFormat::parse("json").unwrap(), LogFormat::Json);
        assert_eq!(LogFormat::parse("pretty").unwrap(), LogFormat::Pretty);
    }

    #[test]
    fn rejects_unknown_format() {
        let config = GeneralConfig {
            log_level: "info".to_owned(),
            log_format: "xml".to_owned(),
        };
        let err = init_tracing(&config).unwrap_err();
        assert!(err.to_string().contains("unknown log format 'xml'"));
    }
}
