//! Sink runner -- moves events from a channel into a sink.

use std::sync::Arc;
use std::time::Duration;

use tailgrok_core::event::LogEvent;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{EventChannel, EventSink};
use crate::error::LogPipelineError;

/// Drains a channel into a sink in batches until stopped.
///
/// After a stop request the runner keeps going until the channel is empty.
/// A failed delivery is retried after the poll interval; once stopped, the
/// failure is returned instead.
pub struct SinkRunner<C, S> {
    channel: Arc<C>,
    sink: Arc<S>,
    batch_size: usize,
    poll_interval: Duration,
    cancel: CancellationToken,
    handle: Option<JoinHandle<Result<u64, LogPipelineError>>>,
}

impl<C: EventChannel, S: EventSink> SinkRunner<C, S> {
    pub fn new(channel: Arc<C>, sink: Arc<S>, batch_size: usize, poll_interval: Duration) -> Self {
        Self {
            channel,
            sink,
            batch_size: batch_size.max(1),
            poll_interval,
            cancel: CancellationToken::new(),
            handle: None,
        }
    }

    /// Spawns the delivery loop.
    pub fn start(&mut self) -> Result<(), LogPipelineError> {
        if self.handle.is_some() {
            return Err(LogPipelineError::Channel(
                "sink runner already started".to_owned(),
            ));
        }
        let channel = Arc::clone(&self.channel);
        let sink = Arc::clone(&self.sink);
        let cancel = self.cancel.clone();
        let (batch_size, poll_interval) = (self.batch_size, self.poll_interval);

        self.handle = Some(tokio::spawn(async move {
            run_loop(channel, sink, batch_size, poll_interval, cancel).await
        }));
        info!(batch_size = self.batch_size, "sink runner started");
        Ok(())
    }

    /// Requests a stop and waits for the channel to be drained.
    ///
    /// Returns the number of delivered events.
    pub async fn stop(&mut self) -> Result<u64, LogPipelineError> {
        self.cancel.cancel();
        let Some(handle) = self.handle.take() else {
            return Ok(0);
        };
        let delivered = handle
            .await
            .map_err(|e| LogPipelineError::Channel(format!("sink runner task failed: {e}")))??;
        info!(delivered, "sink runner stopped");
        Ok(delivered)
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

async fn run_loop<C: EventChannel, S: EventSink>(
    channel: Arc<C>,
    sink: Arc<S>,
    batch_size: usize,
    poll_interval: Duration,
    cancel: CancellationToken,
) -> Result<u64, LogPipelineError> {
    let mut delivered = 0u64;
    let mut pending: Vec<LogEvent> = Vec::with_capacity(batch_size);

    loop {
        while pending.len() < batch_size {
            match channel.take().await {
                Some(event) => pending.push(event),
                None => break,
            }
        }

        if pending.is_empty() {
            if cancel.is_cancelled() {
                return Ok(delivered);
            }
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(poll_interval) => {}
            }
            continue;
        }

        let count = pending.len();
        match sink.deliver(pending.clone()).await {
            Ok(()) => {
                delivered += count as u64;
                pending.clear();
                debug!(count, "delivered events to sink");
            }
            Err(e) if cancel.is_cancelled() => {
                error!(error = %e, count, "sink delivery failed during shutdown");
                return Err(e);
            }
            Err(e) => {
                warn!(error = %e, count, "sink delivery failed, retrying");
                tokio::time::sleep(poll_interval).await;
            }
        }
    }
}
