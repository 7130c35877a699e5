//! Pipeline lifecycle trait and health reporting.
//!
//! Every long-running component the daemon assembles implements [`Pipeline`].
//!
//! # Lifecycle
//! ```text
//! Initialized -> start() -> Running -> stop() -> Stopped
//! ```

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::TailgrokError;

/// Component health as reported by [`Pipeline::health_check`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// Operating normally
    Healthy,
    /// Operating with reduced capacity or after a partial failure
    Degraded(String),
    /// Not operating
    Unhealthy(String),
}

impl HealthStatus {
    /// `true` for [`HealthStatus::Healthy`].
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// `true` for [`HealthStatus::Unhealthy`].
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded(reason) => write!(f, "degraded: {reason}"),
            Self::Unhealthy(reason) => write!(f, "unhealthy: {reason}"),
        }
    }
}

/// Start/stop lifecycle of a pipeline.
///
/// `stop()` is expected to drain in-flight work before returning and to
/// surface the first worker failure, if any.
pub trait Pipeline: Send {
    /// Spawns the pipeline workers.
    fn start(&mut self) -> impl Future<Output = Result<(), TailgrokError>> + Send;

    /// Stops the workers, draining queued work.
    fn stop(&mut self) -> impl Future<Output = Result<(), TailgrokError>> + Send;

    /// Reports current health.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}
