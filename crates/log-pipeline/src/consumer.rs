//! Batch consumer -- turns queued lines into events and flushes them in batches.
//!
//! Several consumers compete for lines from one [`BoundedLineQueue`]; each
//! owns its own batch. A batch is flushed when it is full, when the max flush
//! delay has passed since the previous flush, or as soon as a stop has been
//! requested. After a stop request the consumer keeps draining the queue and
//! exits only once it is empty, with one final flush of whatever is left.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use encoding_rs::Encoding;
use tailgrok_core::event::LogEvent;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::PipelineConfig;
use crate::error::LogPipelineError;
use crate::grok::FieldExtractor;
use crate::queue::BoundedLineQueue;
use crate::sink::EventSink;

/// Wait for one queue poll before the stop token is re-checked.
pub const POLL_TIMEOUT: Duration = Duration::from_millis(250);

/// Counters returned by [`BatchConsumer::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub lines: u64,
    pub unmatched: u64,
    pub batches: u64,
}

pub struct BatchConsumer<S> {
    id: usize,
    queue: BoundedLineQueue,
    extractor: FieldExtractor,
    sink: Arc<S>,
    encoding: &'static Encoding,
    source: Arc<str>,
    batch_size: usize,
    max_flush_delay: Duration,
    poll_timeout: Duration,
    stop: CancellationToken,
}

impl<S: EventSink> BatchConsumer<S> {
    pub fn new(
        id: usize,
        queue: BoundedLineQueue,
        extractor: FieldExtractor,
        sink: Arc<S>,
        config: &PipelineConfig,
    ) -> Result<Self, LogPipelineError> {
        Ok(Self {
            id,
            queue,
            extractor,
            sink,
            encoding: config.encoding()?,
            source: Arc::from(config.file.as_str()),
            batch_size: config.event_batch_size.max(1),
            max_flush_delay: config.max_event_flush_delay(),
            poll_timeout: POLL_TIMEOUT,
            stop: CancellationToken::new(),
        })
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Token that stops this consumer once the queue is drained.
    pub fn stop_handle(&self) -> CancellationToken {
        self.stop.clone()
    }

    pub fn request_stop(&self) {
        self.stop.cancel();
    }

    /// Consume loop. Ends after a stop request once the queue is empty.
    ///
    /// # Errors
    /// The first delivery failure ends this consumer and is returned.
    pub async fn run(self) -> Result<ConsumerStats, LogPipelineError> {
        info!(consumer = self.id, batch_size = self.batch_size, "batch consumer started");
        let mut stats = ConsumerStats::default();
        let mut batch: Vec<LogEvent> = Vec::with_capacity(self.batch_size);
        let mut last_flush = Instant::now();

        while !self.stop.is_cancelled() || !self.queue.is_empty() {
            let Some(line) = self.queue.pop(self.poll_timeout).await else {
                if !batch.is_empty() && last_flush.elapsed() >= self.max_flush_delay {
                    self.flush(&mut batch, &mut stats).await?;
                    last_flush = Instant::now();
                }
                continue;
            };

            batch.push(self.to_event(&line, &mut stats));

            if self.stop.is_cancelled()
                || batch.len() >= self.batch_size
                || last_flush.elapsed() >= self.max_flush_delay
            {
                self.flush(&mut batch, &mut stats).await?;
                last_flush = Instant::now();
            }
        }

        self.flush(&mut batch, &mut stats).await?;
        info!(
            consumer = self.id,
            lines = stats.lines,
            unmatched = stats.unmatched,
            batches = stats.batches,
            "batch consumer stopped"
        );
        Ok(stats)
    }

    fn to_event(&self, line: &str, stats: &mut ConsumerStats) -> LogEvent {
        let fields = self.extractor.extract(line);
        stats.lines += 1;
        if fields.is_empty() {
            stats.unmatched += 1;
            metrics::counter!(tailgrok_core::metrics::UNMATCHED_LINES_TOTAL).increment(1);
            debug!(consumer = self.id, line, "line did not match record mapping");
        }
        let (body, _, _) = self.encoding.encode(line);
        LogEvent::new(Bytes::from(body.into_owned()), fields, &*self.source)
    }

    async fn flush(
        &self,
        batch: &mut Vec<LogEvent>,
        stats: &mut ConsumerStats,
    ) -> Result<(), LogPipelineError> {
        if batch.is_empty() {
            return Ok(());
        }
        let count = batch.len();
        let started = Instant::now();
        let events = std::mem::replace(batch, Vec::with_capacity(self.batch_size));

        if let Err(e) = self.sink.deliver(events).await {
            metrics::counter!(tailgrok_core::metrics::DELIVERY_ERRORS_TOTAL).increment(1);
            error!(consumer = self.id, count, error = %e, "batch delivery failed");
            return Err(e);
        }

        stats.batches += 1;
        metrics::counter!(tailgrok_core::metrics::BATCHES_FLUSHED_TOTAL).increment(1);
        metrics::counter!(tailgrok_core::metrics::EVENTS_DELIVERED_TOTAL).increment(count as u64);
        metrics::histogram!(tailgrok_core::metrics::FLUSH_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        debug!(consumer = self.id, count, "flushed batch");
        Ok(())
    }
}
