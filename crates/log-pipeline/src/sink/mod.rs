//! Downstream delivery -- where flushed batches go.
//!
//! Consumers only depend on [`EventSink`]. The in-process defaults are:
//! - [`MemoryChannel`]: bounded event buffer (a batch is accepted whole or not at all)
//! - [`JsonLinesSink`]: one JSON object per line to stdout or a file
//! - [`SinkRunner`]: moves events from a channel to a sink
//!
//! Wrap a channel or sink in [`ActivityGated`](crate::activity::ActivityGated)
//! to defer its shutdown until it has been idle.
//!
//! # Architecture
//! ```text
//! BatchConsumer --deliver--> [gated] MemoryChannel --take--> SinkRunner --deliver--> [gated] JsonLinesSink
//! ```

pub mod channel;
pub mod json_lines;
pub mod runner;

pub use channel::MemoryChannel;
pub use json_lines::JsonLinesSink;
pub use runner::SinkRunner;

use std::future::Future;
use std::sync::Arc;

use tailgrok_core::event::LogEvent;

use crate::error::LogPipelineError;

/// Receives whole batches.
///
/// A failure means the batch was not accepted; the caller does not retry.
pub trait EventSink: Send + Sync + 'static {
    fn deliver(
        &self,
        batch: Vec<LogEvent>,
    ) -> impl Future<Output = Result<(), LogPipelineError>> + Send;
}

/// Event buffer between producers and a sink.
pub trait EventChannel: Send + Sync + 'static {
    /// Adds one event.
    fn put(&self, event: LogEvent) -> impl Future<Output = Result<(), LogPipelineError>> + Send;

    /// Removes the oldest event, if any. Does not wait.
    fn take(&self) -> impl Future<Output = Option<LogEvent>> + Send;
}

/// Start/stop of a downstream resource.
pub trait Lifecycle: Send + Sync + 'static {
    fn start(&self) -> impl Future<Output = Result<(), LogPipelineError>> + Send;

    fn stop(&self) -> impl Future<Output = Result<(), LogPipelineError>> + Send;

    /// Name used in logs.
    fn name(&self) -> &str;
}

impl<S: EventSink> EventSink for Arc<S> {
    fn deliver(
        &self,
        batch: Vec<LogEvent>,
    ) -> impl Future<Output = Result<(), LogPipelineError>> + Send {
        (**self).deliver(batch)
    }
}

impl<C: EventChannel> EventChannel for Arc<C> {
    fn put(&self, event: LogEvent) -> impl Future<Output = Result<(), LogPipelineError>> + Send {
        (**self).put(event)
    }

    fn take(&self) -> impl Future<Output = Option<LogEvent>> + Send {
        (**self).take()
    }
}

impl<L: Lifecycle> Lifecycle for Arc<L> {
    fn start(&self) -> impl Future<Output = Result<(), LogPipelineError>> + Send {
        (**self).start()
    }

    fn stop(&self) -> impl Future<Output = Result<(), LogPipelineError>> + Send {
        (**self).stop()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
