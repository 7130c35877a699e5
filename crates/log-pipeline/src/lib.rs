//! Tails a log file, extracts fields with grok patterns and delivers batched
//! events downstream without losing in-flight lines on shutdown.
//!
//! # Modules
//!
//! - [`grok`]: pattern library loading, compilation and field extraction
//! - [`collector`]: file tailing with rotation detection ([`TailReader`])
//! - [`queue`]: bounded line queue between the reader and the consumers
//! - [`consumer`]: batching consumers flushing by size or time
//! - [`activity`]: activity clock and idle-gated shutdown wrapper
//! - [`sink`]: downstream contracts plus in-process channel and JSON lines sink
//! - [`pipeline`]: orchestration (implements the core `Pipeline` trait)
//! - [`config`]: pipeline settings (built from the core `[source]` section)
//! - [`error`]: domain error type
//!
//! # Architecture
//!
//! ```text
//! file --TailReader--> BoundedLineQueue --BatchConsumer x N--> EventSink
//!                                              |
//!                                        FieldExtractor
//! ```

pub mod activity;
pub mod collector;
pub mod config;
pub mod consumer;
pub mod error;
pub mod grok;
pub mod pipeline;
pub mod queue;
pub mod sink;

// --- re-exports ---

// pipeline
pub use pipeline::{LogPipeline, LogPipelineBuilder};

// config
pub use config::{PipelineConfig, PipelineConfigBuilder};

// errors
pub use error::LogPipelineError;

// grok
pub use grok::{CompiledPattern, FieldExtractor, GrokCompiler, PatternLibrary};

// workers
pub use collector::{ReaderState, TailReader};
pub use consumer::BatchConsumer;
pub use queue::BoundedLineQueue;

// downstream
pub use activity::{ActivityClock, ActivityGated};
pub use sink::{EventChannel, EventSink, JsonLinesSink, Lifecycle, MemoryChannel, SinkRunner};
