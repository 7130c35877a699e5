//! Prometheus scrape endpoint.
//!
//! The exporter's built-in HTTP listener serves every tailgrok metric at
//! `http://<listen_addr>:<port>/metrics`; flush durations use the fixed
//! buckets declared in `tailgrok_core::metrics`.

use std::net::SocketAddr;

use anyhow::Result;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use tailgrok_core::config::MetricsConfig;
use tailgrok_core::metrics as m;

/// Path the built-in listener answers on.
pub const SCRAPE_PATH: &str = "/metrics";

/// Resolves the socket the scrape endpoint binds to.
///
/// # Errors
/// The endpoint is not [`SCRAPE_PATH`], or `listen_addr:port` is not a socket
/// address.
pub fn scrape_addr(config: &MetricsConfig) -> Result<SocketAddr> {
    if config.endpoint != SCRAPE_PATH {
        return Err(anyhow::anyhow!(
            "unsupported metrics endpoint '{}': only '{SCRAPE_PATH}' is served",
            config.endpoint
        ));
    }
    format!("{}:{}", config.listen_addr, config.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid metrics listen address: {}", e))
}

/// Installs the global recorder and starts serving scrapes.
///
/// Only one recorder may exist per process.
///
/// # Errors
/// See [`scrape_addr`]; also fails when the socket cannot be bound or a
/// recorder is already installed.
pub fn install_metrics_recorder(config: &MetricsConfig) -> Result<()> {
    let addr = scrape_addr(config)?;
    if addr.ip().is_unspecified() {
        tracing::warn!(
            listen_addr = %addr,
            "metrics endpoint listens on every interface"
        );
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full(m::FLUSH_DURATION_SECONDS.to_owned()),
            &m::FLUSH_DURATION_BUCKETS,
        )
        .map_err(|e| anyhow::anyhow!("invalid flush duration buckets: {}", e))?
        .install()
        .map_err(|e| anyhow::anyhow!("failed to install metrics recorder: {}", e))?;
    m::describe_all();

    tracing::info!(listen_addr = %addr, path = SCRAPE_PATH, "serving tailgrok metrics");
    Ok(())
}
