//! Tail reader -- follows one file and feeds its lines into the shared queue.
//!
//! # States
//! ```text
//! NotConfigured --configure--> Configured --start--> Running --request_stop--> Draining --idle--> Stopped
//! ```
//!
//! While running or draining, every line read is pushed to the
//! [`BoundedLineQueue`]; a full queue makes the reader wait, lines are never
//! dropped while a consumer is left. Once the owner cancels the
//! [`consumers_gone`](TailReader::consumers_gone) token the reader discards
//! what it can no longer hand over and exits. `request_stop` returns only
//! after the reader has seen no activity for its quiescence window and the
//! read loop has exited.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::tailer::{Refresh, Tailer, TailerConfig};
use crate::activity::{ActivityClock, QUIESCENCE_POLL_INTERVAL};
use crate::error::LogPipelineError;
use crate::queue::BoundedLineQueue;

/// Reader lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    NotConfigured,
    Configured,
    Running,
    /// Stop requested; still reading until idle
    Draining,
    Stopped,
}

impl std::fmt::Display for ReaderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotConfigured => "not_configured",
            Self::Configured => "configured",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Counters returned by [`TailReader::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    pub lines_read: u64,
    pub rotations: u64,
    /// Lines discarded after the last consumer exited
    pub lines_dropped: u64,
}

/// Follows a file and pushes its lines into a [`BoundedLineQueue`].
///
/// Configure and start it, then drive [`run`](Self::run) from its own task
/// (share the reader through an `Arc`).
pub struct TailReader {
    queue: BoundedLineQueue,
    state: Mutex<ReaderState>,
    tailer: Mutex<Option<Tailer>>,
    delay: Duration,
    quiescence: Duration,
    clock: ActivityClock,
    cancel: CancellationToken,
    consumers_gone: CancellationToken,
    finished: CancellationToken,
}

impl TailReader {
    pub fn new(queue: BoundedLineQueue) -> Self {
        Self {
            queue,
            state: Mutex::new(ReaderState::NotConfigured),
            tailer: Mutex::new(None),
            delay: Duration::ZERO,
            quiescence: Duration::ZERO,
            clock: ActivityClock::new(),
            cancel: CancellationToken::new(),
            consumers_gone: CancellationToken::new(),
            finished: CancellationToken::new(),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, ReaderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_tailer(&self) -> MutexGuard<'_, Option<Tailer>> {
        self.tailer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets the file to follow and the idle window applied by
    /// [`request_stop`](Self::request_stop).
    pub fn configure(
        &mut self,
        config: TailerConfig,
        quiescence: Duration,
    ) -> Result<(), LogPipelineError> {
        let state = *self.lock_state();
        if !matches!(state, ReaderState::NotConfigured | ReaderState::Configured) {
            return Err(LogPipelineError::State(format!(
                "cannot configure tail reader in state {state}"
            )));
        }
        info!(
            path = %config.path.display(),
            buffer_size = config.buffer_size,
            delay_ms = config.delay.as_millis() as u64,
            start_from_end = config.start_from_end,
            reopen = config.reopen,
            encoding = config.encoding.name(),
            quiescence_ms = quiescence.as_millis() as u64,
            "configuring tail reader"
        );
        self.delay = config.delay;
        self.quiescence = quiescence;
        *self.lock_tailer() = Some(Tailer::new(config));
        *self.lock_state() = ReaderState::Configured;
        Ok(())
    }

    /// Marks the reader running. The loop itself is [`run`](Self::run).
    pub fn start(&self) -> Result<(), LogPipelineError> {
        let mut state = self.lock_state();
        if *state != ReaderState::Configured {
            return Err(LogPipelineError::State(format!(
                "cannot start tail reader in state {state}"
            )));
        }
        *state = ReaderState::Running;
        self.clock.touch();
        info!("tail reader started");
        Ok(())
    }

    /// Read loop. Returns once a stop request has gone through, or once the
    /// [`consumers_gone`](Self::consumers_gone) token is cancelled.
    ///
    /// Missing or rotated files are logged and retried; they never end the
    /// loop.
    pub async fn run(&self) -> Result<ReaderStats, LogPipelineError> {
        if self.cancel.is_cancelled() {
            return Ok(ReaderStats::default());
        }
        let state = *self.lock_state();
        if !matches!(state, ReaderState::Running | ReaderState::Draining) {
            return Err(LogPipelineError::State(format!(
                "tail reader cannot run in state {state}"
            )));
        }
        let Some(mut tailer) = self.lock_tailer().take() else {
            return Err(LogPipelineError::State(
                "tail reader loop is already running".to_owned(),
            ));
        };
        let _guard = FinishGuard { reader: self };

        let path = tailer.config().path.display().to_string();
        let mut stats = ReaderStats::default();
        let mut source_missing = false;

        while !self.cancel.is_cancelled() && !self.consumers_gone.is_cancelled() {
            match tailer.refresh().await {
                Ok(refresh) => {
                    if source_missing {
                        info!(path = %path, "tailed file available again");
                        source_missing = false;
                    }
                    if refresh == Refresh::Rotated {
                        stats.rotations += 1;
                        metrics::counter!(tailgrok_core::metrics::FILE_ROTATIONS_TOTAL).increment(1);
                    }
                    if refresh != Refresh::Unchanged {
                        self.read_available(&mut tailer, &mut stats).await;
                    }
                }
                Err(e) if !source_missing => {
                    warn!(error = %e, "tailed file unavailable, waiting for it");
                    source_missing = true;
                }
                Err(e) => debug!(error = %e, "tailed file still unavailable"),
            }
            tailer.release();

            tokio::select! {
                _ = self.cancel.cancelled() => {}
                _ = self.consumers_gone.cancelled() => {}
                _ = tokio::time::sleep(self.delay) => {}
            }
        }

        if self.consumers_gone.is_cancelled() && !self.cancel.is_cancelled() {
            warn!(
                path = %path,
                lines_dropped = stats.lines_dropped,
                "no consumer left, tail reader giving up"
            );
        }

        info!(
            path = %path,
            lines_read = stats.lines_read,
            rotations = stats.rotations,
            "tail reader loop exited"
        );
        Ok(stats)
    }

    async fn read_available(&self, tailer: &mut Tailer, stats: &mut ReaderStats) {
        loop {
            if self.cancel.is_cancelled() || self.consumers_gone.is_cancelled() {
                return;
            }
            let lines = match tailer.read_chunk().await {
                Ok(Some(lines)) => lines,
                Ok(None) => return,
                Err(e) => {
                    warn!(error = %e, "read from tailed file failed");
                    return;
                }
            };
            let mut lines = lines.into_iter();
            while let Some(line) = lines.next() {
                self.clock.touch();
                stats.lines_read += 1;
                metrics::counter!(tailgrok_core::metrics::LINES_READ_TOTAL).increment(1);
                if self.queue.push_unless(line, &self.consumers_gone).await.is_err() {
                    let dropped = 1 + lines.len() as u64;
                    stats.lines_dropped += dropped;
                    warn!(dropped, "no consumer left, discarding lines");
                    return;
                }
                self.clock.touch();
            }
            metrics::gauge!(tailgrok_core::metrics::QUEUE_DEPTH).set(self.queue.len() as f64);
        }
    }

    /// Stops the reader once it has been idle for the quiescence window.
    ///
    /// A running reader enters `Draining` and keeps reading while it waits.
    /// Returns after the read loop has exited.
    pub async fn request_stop(&self) {
        {
            let mut state = self.lock_state();
            match *state {
                ReaderState::Running => *state = ReaderState::Draining,
                ReaderState::Draining => {}
                ReaderState::Stopped => return,
                ReaderState::NotConfigured | ReaderState::Configured => {
                    *state = ReaderState::Stopped;
                    self.cancel.cancel();
                    return;
                }
            }
        }

        info!(
            window_ms = self.quiescence.as_millis() as u64,
            "tail reader draining, waiting for quiescence"
        );
        self.clock
            .wait_for_quiescence(self.quiescence, QUIESCENCE_POLL_INTERVAL, "tail-reader")
            .await;
        self.cancel.cancel();

        // The loop was never spawned: nothing to wait for.
        if self.lock_tailer().is_some() {
            *self.lock_state() = ReaderState::Stopped;
        } else {
            self.finished.cancelled().await;
        }
        info!("tail reader stopped");
    }

    /// Token to cancel once no consumer drains the queue any more.
    ///
    /// A reader blocked on a full queue then gives up instead of waiting
    /// forever, and its loop exits.
    pub fn consumers_gone(&self) -> CancellationToken {
        self.consumers_gone.clone()
    }

    pub fn state(&self) -> ReaderState {
        *self.lock_state()
    }

    pub fn activity(&self) -> &ActivityClock {
        &self.clock
    }
}

/// Marks the reader stopped when the loop exits, including by panic.
struct FinishGuard<'a> {
    reader: &'a TailReader,
}

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        *self.reader.lock_state() = ReaderState::Stopped;
        self.reader.finished.cancel();
    }
}
