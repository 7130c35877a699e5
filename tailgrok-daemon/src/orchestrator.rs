//! Component orchestration -- assembly, startup ordering and graceful shutdown.
//!
//! The [`Orchestrator`] loads configuration, builds the pattern library, the
//! downstream channel and sink, the sink runner and the log pipeline, then
//! manages their lifecycles.
//!
//! # Data Flow
//!
//! ```text
//! LogPipeline --deliver--> [gated] MemoryChannel --> SinkRunner --> [gated] JsonLinesSink
//! ```
//!
//! # Startup Order (consumers before producers)
//!
//! 1. Sink
//! 2. Channel
//! 3. Sink runner
//! 4. Log pipeline
//!
//! # Shutdown Order (producers first)
//!
//! 1. Log pipeline (reader drains until idle, consumers drain the queue)
//! 2. Sink runner (drains the channel)
//! 3. Channel (waits until idle)
//! 4. Sink (waits a full idle window, then flushes)

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::broadcast;

use tailgrok_core::config::TailgrokConfig;
use tailgrok_core::pipeline::{HealthStatus, Pipeline};
use tailgrok_log_pipeline::{
    ActivityGated, JsonLinesSink, Lifecycle, LogPipeline, LogPipelineBuilder, MemoryChannel,
    PatternLibrary, PipelineConfig, SinkRunner,
};

use crate::health::{ComponentHealth, DaemonHealth, aggregate_status};
use crate::metrics_server;

type GatedChannel = ActivityGated<MemoryChannel>;
type GatedSink = ActivityGated<JsonLinesSink>;

/// Interval between periodic health log lines.
const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(30);

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: TailgrokConfig,
    pipeline: LogPipeline<GatedChannel>,
    channel: Arc<GatedChannel>,
    sink: Arc<GatedSink>,
    runner: SinkRunner<GatedChannel, GatedSink>,
    /// Shutdown broadcast sender (signals background tasks).
    shutdown_tx: broadcast::Sender<()>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Orchestrator {
    /// Load configuration and build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read, parsed or validated
    /// - The pattern library cannot be loaded
    /// - The record mapping does not compile
    /// - The sink output cannot be opened
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = TailgrokConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config).await
    }

    /// Build from an already-loaded configuration.
    pub async fn build_from_config(config: TailgrokConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            tracing::info!(port = config.metrics.port, "metrics endpoint enabled");
        }

        let pipeline_config = PipelineConfig::from_core(&config.source);
        pipeline_config
            .validate()
            .map_err(|e| anyhow::anyhow!("source config validation failed: {}", e))?;
        let encoding = pipeline_config
            .encoding()
            .map_err(|e| anyhow::anyhow!("source config validation failed: {}", e))?;

        let library = PatternLibrary::load(&pipeline_config.pattern_directory)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load pattern library: {}", e))?;
        tracing::info!(
            directory = pipeline_config.pattern_directory.as_str(),
            patterns = library.len(),
            "pattern library loaded"
        );

        let json_sink = JsonLinesSink::open(&config.sink.output, encoding)
            .await
            .map_err(|e| anyhow::anyhow!("failed to open sink: {}", e))?;
        let sink = Arc::new(
            ActivityGated::new(
                json_sink,
                "json-lines-sink",
                Duration::from_millis(config.sink.wait_time_since_last_put_ms),
            )
            .touch_on_stop(true),
        );

        let channel = Arc::new(ActivityGated::new(
            MemoryChannel::new(config.channel.capacity),
            "memory-channel",
            Duration::from_millis(config.channel.wait_time_since_last_put_before_stop_ms),
        ));

        let runner = SinkRunner::new(
            Arc::clone(&channel),
            Arc::clone(&sink),
            config.sink.batch_size,
            Duration::from_millis(config.sink.poll_interval_ms),
        );

        let pipeline = LogPipelineBuilder::new()
            .config(pipeline_config)
            .library(library)
            .sink(Arc::clone(&channel))
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build log pipeline: {}", e))?;

        if config.metrics.enabled {
            record_daemon_metrics();
        }

        let (shutdown_tx, _) = broadcast::channel(16);
        tracing::info!("orchestrator initialized");

        Ok(Self {
            config,
            pipeline,
            channel,
            sink,
            runner,
            shutdown_tx,
            start_time: Instant::now(),
        })
    }

    /// Start every component, downstream first.
    ///
    /// On failure, components already started are stopped again.
    pub async fn start(&mut self) -> Result<()> {
        tracing::info!("starting components");
        self.sink
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("failed to start sink: {}", e))?;
        self.channel
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("failed to start channel: {}", e))?;
        self.runner
            .start()
            .map_err(|e| anyhow::anyhow!("failed to start sink runner: {}", e))?;

        if let Err(e) = self.pipeline.start().await {
            tracing::warn!(error = %e, "startup failed, rolling back already-started components");
            if let Err(stop_err) = self.stop_downstream().await {
                tracing::error!(
                    startup_error = %e,
                    rollback_error = %stop_err,
                    "rollback also failed during startup failure cleanup"
                );
            }
            return Err(anyhow::anyhow!("failed to start log pipeline: {}", e));
        }

        self.start_time = Instant::now();
        tracing::info!(
            file = self.config.source.file.as_str(),
            output = self.config.sink.output.as_str(),
            "tailgrok-daemon running"
        );
        Ok(())
    }

    /// Start all components and block until a shutdown signal is received.
    ///
    /// # Shutdown Triggers
    ///
    /// - `SIGTERM` (from systemd, Docker, or `kill`)
    /// - `SIGINT` (Ctrl+C)
    pub async fn run(&mut self) -> Result<()> {
        self.start().await?;

        let mut uptime_updater_task = if self.config.metrics.enabled {
            let shutdown_rx = self.shutdown_tx.subscribe();
            Some(spawn_uptime_updater(self.start_time, shutdown_rx))
        } else {
            None
        };

        tracing::info!("entering main loop");
        let signal = {
            let shutdown = wait_for_shutdown_signal();
            tokio::pin!(shutdown);
            let mut health_interval = tokio::time::interval(HEALTH_LOG_INTERVAL);
            health_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            health_interval.tick().await;

            loop {
                tokio::select! {
                    signal = &mut shutdown => break signal?,
                    _ = health_interval.tick() => self.log_health().await,
                }
            }
        };
        tracing::info!(signal = signal, "shutdown signal received");

        let _ = self.shutdown_tx.send(());
        if let Some(task) = uptime_updater_task.take() {
            let _ = task.await;
        }

        self.shutdown().await
    }

    /// Stop every component, producers first.
    ///
    /// Every component is stopped even when an earlier one fails; the first
    /// failure is returned.
    pub async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("stopping log pipeline");
        let pipeline_result = self.pipeline.stop().await;
        if let Err(e) = &pipeline_result {
            tracing::error!(error = %e, "log pipeline stopped with errors");
        }

        let downstream_result = self.stop_downstream().await;

        pipeline_result.map_err(|e| anyhow::anyhow!("log pipeline shutdown failed: {}", e))?;
        downstream_result?;
        tracing::info!("tailgrok-daemon shut down");
        Ok(())
    }

    async fn stop_downstream(&mut self) -> Result<()> {
        let mut first_error = None;

        match self.runner.stop().await {
            Ok(delivered) => tracing::info!(delivered, "sink runner stopped"),
            Err(e) => {
                tracing::error!(error = %e, "sink runner stopped with errors");
                first_error.get_or_insert(anyhow::anyhow!("sink runner shutdown failed: {}", e));
            }
        }
        if let Err(e) = self.channel.stop().await {
            tracing::error!(error = %e, "failed to stop channel");
            first_error.get_or_insert(anyhow::anyhow!("channel shutdown failed: {}", e));
        }
        if let Err(e) = self.sink.stop().await {
            tracing::error!(error = %e, "failed to stop sink");
            first_error.get_or_insert(anyhow::anyhow!("sink shutdown failed: {}", e));
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Get the current aggregated health status.
    pub async fn health(&self) -> DaemonHealth {
        let channel = self.channel.inner();
        let channel_status = if !channel.is_running() {
            HealthStatus::Unhealthy("not running".to_owned())
        } else if channel.len() * 10 > channel.capacity() * 9 {
            HealthStatus::Degraded(format!(
                "channel nearly full: {}/{}",
                channel.len(),
                channel.capacity()
            ))
        } else {
            HealthStatus::Healthy
        };
        let runner_status = if self.runner.is_running() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy("not running".to_owned())
        };

        let components = vec![
            ComponentHealth::new("log-pipeline", self.pipeline.health_check().await),
            ComponentHealth::new("memory-channel", channel_status),
            ComponentHealth::new("sink-runner", runner_status),
        ];

        let uptime_secs = self.start_time.elapsed().as_secs();
        if self.config.metrics.enabled {
            use tailgrok_core::metrics as m;
            #[allow(clippy::cast_precision_loss)]
            metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(uptime_secs as f64);
        }

        DaemonHealth {
            status: aggregate_status(&components),
            uptime_secs,
            components,
        }
    }

    async fn log_health(&self) {
        let health = self.health().await;
        match &health.status {
            HealthStatus::Healthy => tracing::debug!(
                uptime_secs = health.uptime_secs,
                "daemon healthy"
            ),
            HealthStatus::Degraded(reason) => tracing::warn!(
                uptime_secs = health.uptime_secs,
                reason = reason.as_str(),
                "daemon degraded"
            ),
            HealthStatus::Unhealthy(reason) => tracing::error!(
                uptime_secs = health.uptime_secs,
                reason = reason.as_str(),
                "daemon unhealthy"
            ),
        }
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &TailgrokConfig {
        &self.config
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
///
/// # Errors
///
/// Returns an error if signal handlers cannot be installed.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Record daemon-level metrics (build info).
fn record_daemon_metrics() {
    use tailgrok_core::metrics as m;

    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "daemon metrics recorded");
}

/// Spawn a background task that periodically updates the uptime metric.
///
/// Updates every 10 seconds to keep the metric fresh for Prometheus scrapes.
fn spawn_uptime_updater(
    start_time: Instant,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    use tailgrok_core::metrics as m;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(10));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let uptime_secs = start_time.elapsed().as_secs();
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(uptime_secs as f64);
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!("uptime updater shutting down");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spawn_uptime_updater_shutdown_signal() {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = spawn_uptime_updater(Instant::now(), shutdown_rx);

        let _ = shutdown_tx.send(());

        let result = tokio::time::timeout(Duration::from_millis(100), task).await;
        assert!(result.is_ok(), "uptime updater should shut down within timeout");
    }
}
