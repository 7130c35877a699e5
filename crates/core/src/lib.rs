//! # tailgrok-core
//!
//! Types shared by the tailgrok crates:
//!
//! - [`config`]: `tailgrok.toml` parsing, defaults and environment overrides
//! - [`error`]: the top-level error taxonomy
//! - [`event`]: [`LogEvent`] and its metadata
//! - [`pipeline`]: the [`Pipeline`] lifecycle trait and [`HealthStatus`]
//! - [`metrics`]: Prometheus metric names

pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod pipeline;

// --- re-exports ---

pub use config::TailgrokConfig;
pub use error::{ConfigError, PipelineError, TailgrokError};
pub use event::{EventMetadata, FieldMapping, LogEvent};
pub use pipeline::{HealthStatus, Pipeline};
