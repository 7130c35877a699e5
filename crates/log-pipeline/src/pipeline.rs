//! Pipeline orchestration -- wires the tail reader, the queue and the consumers.
//!
//! [`LogPipeline`] implements the core [`Pipeline`](tailgrok_core::pipeline::Pipeline)
//! trait so the daemon drives it with the usual start/stop/health_check
//! lifecycle.
//!
//! # Architecture
//! ```text
//! TailReader --push--> BoundedLineQueue --pop--> BatchConsumer x N --deliver--> EventSink
//! ```
//!
//! # Shutdown
//! 1. the reader drains until it has been idle for its quiescence window
//! 2. every consumer is told to stop; each drains the queue and flushes
//! 3. the worker set is joined, polling every 500 ms until all have exited
//!
//! When every consumer has ended on its own (delivery errors), the reader is
//! told that nothing drains the queue any more, so it cannot block a later
//! stop on a full queue.
//!
//! Downstream resources wrapped in [`ActivityGated`](crate::activity::ActivityGated)
//! defer their own stop independently of this sequence.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tailgrok_core::error::{PipelineError, TailgrokError};
use tailgrok_core::pipeline::{HealthStatus, Pipeline};
use tokio::task::{Id, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::collector::{ReaderStats, TailReader, TailerConfig};
use crate::config::PipelineConfig;
use crate::consumer::{BatchConsumer, ConsumerStats};
use crate::error::LogPipelineError;
use crate::grok::{FieldExtractor, PatternLibrary};
use crate::queue::BoundedLineQueue;
use crate::sink::EventSink;

/// Poll interval while joining the workers on stop.
pub const WORKER_JOIN_POLL: Duration = Duration::from_millis(500);

/// Queue utilisation above which the pipeline reports itself degraded.
const QUEUE_DEGRADED_THRESHOLD: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineState {
    Initialized,
    Running,
    Stopped,
}

/// Result of one worker task.
#[derive(Debug)]
enum WorkerReport {
    Reader(ReaderStats),
    Consumer(ConsumerStats),
}

type WorkerResult = Result<WorkerReport, LogPipelineError>;

/// Tail-and-extract pipeline delivering batches to `S`.
///
/// # Example
/// ```ignore
/// use std::sync::Arc;
/// use tailgrok_log_pipeline::{LogPipelineBuilder, PatternLibrary};
///
/// let mut pipeline = LogPipelineBuilder::new()
///     .config(config)
///     .library(PatternLibrary::load("./conf/logstash_patterns").await?)
///     .sink(Arc::new(sink))
///     .build()?;
/// pipeline.start().await?;
/// ```
pub struct LogPipeline<S> {
    config: PipelineConfig,
    state: PipelineState,
    queue: BoundedLineQueue,
    extractor: FieldExtractor,
    sink: Arc<S>,
    reader: Option<Arc<TailReader>>,
    consumer_stops: Vec<CancellationToken>,
    workers: JoinSet<WorkerResult>,
    worker_names: HashMap<Id, String>,
    failures: Arc<Mutex<Vec<String>>>,
}

impl<S: EventSink> LogPipeline<S> {
    pub fn state_name(&self) -> &str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn extractor(&self) -> &FieldExtractor {
        &self.extractor
    }

    /// Lines waiting for a consumer.
    pub fn queued_lines(&self) -> usize {
        self.queue.len()
    }

    pub fn queue_utilization(&self) -> f64 {
        self.queue.utilization()
    }

    /// Workers that have ended with an error so far.
    pub fn failed_workers(&self) -> Vec<String> {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn spawn_worker<F>(&mut self, name: String, work: F)
    where
        F: Future<Output = WorkerResult> + Send + 'static,
    {
        let failures = Arc::clone(&self.failures);
        let worker = name.clone();
        let handle = self.workers.spawn(async move {
            let result = work.await;
            if let Err(e) = &result {
                error!(worker = worker.as_str(), error = %e, "worker terminated with error");
                failures
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(format!("{worker}: {e}"));
            }
            result
        });
        self.worker_names.insert(handle.id(), name);
    }

    async fn join_workers(&mut self) -> Option<TailgrokError> {
        let mut first_error: Option<TailgrokError> = None;
        loop {
            let joined = match tokio::time::timeout(WORKER_JOIN_POLL, self.workers.join_next_with_id())
                .await
            {
                Ok(Some(joined)) => joined,
                Ok(None) => break,
                Err(_) => {
                    debug!(
                        remaining = self.workers.len(),
                        "waiting for pipeline workers to terminate"
                    );
                    continue;
                }
            };

            match joined {
                Ok((id, Ok(report))) => {
                    let worker = self.worker_names.remove(&id).unwrap_or_default();
                    debug!(worker = worker.as_str(), ?report, "worker finished");
                }
                Ok((id, Err(e))) => {
                    self.worker_names.remove(&id);
                    first_error.get_or_insert(e.into());
                }
                Err(join_err) => {
                    let worker = self
                        .worker_names
                        .remove(&join_err.id())
                        .unwrap_or_else(|| "unknown".to_owned());
                    error!(worker = worker.as_str(), error = %join_err, "worker task failed");
                    first_error.get_or_insert(
                        PipelineError::WorkerFailed {
                            worker,
                            reason: join_err.to_string(),
                        }
                        .into(),
                    );
                }
            }
        }
        first_error
    }
}

impl<S: EventSink> Pipeline for LogPipeline<S> {
    async fn start(&mut self) -> Result<(), TailgrokError> {
        if self.state == PipelineState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }
        self.config.validate_paths()?;

        info!(
            file = self.config.file.as_str(),
            consumers = self.config.number_of_consumers,
            queue_capacity = self.queue.capacity(),
            "starting log pipeline"
        );

        let mut reader = TailReader::new(self.queue.clone());
        reader.configure(
            TailerConfig::from_pipeline(&self.config)?,
            self.config.reader_quiescence(),
        )?;
        reader.start()?;
        let reader = Arc::new(reader);
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();

        {
            let reader = Arc::clone(&reader);
            self.spawn_worker("tail-reader".to_owned(), async move {
                reader.run().await.map(WorkerReport::Reader)
            });
        }
        let consumers_gone = reader.consumers_gone();
        self.reader = Some(reader);

        let live_consumers = Arc::new(AtomicUsize::new(self.config.number_of_consumers));
        for id in 0..self.config.number_of_consumers {
            let consumer = BatchConsumer::new(
                id,
                self.queue.clone(),
                self.extractor.clone(),
                Arc::clone(&self.sink),
                &self.config,
            )?;
            self.consumer_stops.push(consumer.stop_handle());
            let slot = ConsumerSlot {
                live: Arc::clone(&live_consumers),
                consumers_gone: consumers_gone.clone(),
            };
            self.spawn_worker(format!("consumer-{id}"), async move {
                let _slot = slot;
                consumer.run().await.map(WorkerReport::Consumer)
            });
        }

        self.state = PipelineState::Running;
        info!("log pipeline started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), TailgrokError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::NotRunning.into());
        }
        info!("stopping log pipeline");

        if let Some(reader) = self.reader.take() {
            reader.request_stop().await;
        }

        info!(
            queued = self.queue.len(),
            "stopping consumers, draining queue"
        );
        for stop in self.consumer_stops.drain(..) {
            stop.cancel();
        }

        let first_error = self.join_workers().await;
        self.state = PipelineState::Stopped;

        match first_error {
            Some(e) => {
                warn!(error = %e, "log pipeline stopped with worker errors");
                Err(e)
            }
            None => {
                info!("log pipeline stopped");
                Ok(())
            }
        }
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PipelineState::Running => {
                let failed = self.failed_workers();
                if !failed.is_empty() {
                    return HealthStatus::Degraded(format!(
                        "worker failures: {}",
                        failed.join("; ")
                    ));
                }
                let utilization = self.queue.utilization();
                if utilization > QUEUE_DEGRADED_THRESHOLD {
                    HealthStatus::Degraded(format!(
                        "queue utilization high: {:.1}%",
                        utilization * 100.0
                    ))
                } else {
                    HealthStatus::Healthy
                }
            }
            PipelineState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            PipelineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// Counts a consumer as live until dropped, including by panic.
///
/// The last one out cancels the reader's `consumers_gone` token.
struct ConsumerSlot {
    live: Arc<AtomicUsize>,
    consumers_gone: CancellationToken,
}

impl Drop for ConsumerSlot {
    fn drop(&mut self) {
        if self.live.fetch_sub(1, Ordering::AcqRel) == 1 {
            debug!("last consumer exited");
            self.consumers_gone.cancel();
        }
    }
}

/// Log pipeline builder
///
/// Validates the configuration and compiles the record mapping, so a pipeline
/// that builds can start.
pub struct LogPipelineBuilder<S> {
    config: PipelineConfig,
    library: Option<PatternLibrary>,
    sink: Option<Arc<S>>,
}

impl<S: EventSink> LogPipelineBuilder<S> {
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            library: None,
            sink: None,
        }
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Pattern library used to compile the record mapping.
    ///
    /// Defaults to [`PatternLibrary::builtin`].
    pub fn library(mut self, library: PatternLibrary) -> Self {
        self.library = Some(library);
        self
    }

    /// Destination of flushed batches.
    pub fn sink(mut self, sink: Arc<S>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> Result<LogPipeline<S>, LogPipelineError> {
        self.config.validate()?;
        let sink = self
            .sink
            .ok_or_else(|| LogPipelineError::config("sink", "a downstream sink is required"))?;
        let library = self.library.unwrap_or_else(|| {
            debug!("no pattern library given, using built-in patterns");
            PatternLibrary::builtin()
        });

        let extractor = FieldExtractor::from_definition(&self.config.file_record_mapping, &library)?;
        info!(
            patterns = library.len(),
            fields = ?extractor.pattern().field_names(),
            "compiled record mapping"
        );

        Ok(LogPipeline {
            queue: BoundedLineQueue::new(self.config.shared_queue_capacity),
            config: self.config,
            state: PipelineState::Initialized,
            extractor,
            sink,
            reader: None,
            consumer_stops: Vec::new(),
            workers: JoinSet::new(),
            worker_names: HashMap::new(),
            failures: Arc::new(Mutex::new(Vec::new())),
        })
    }
}

impl<S: EventSink> Default for LogPipelineBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}
