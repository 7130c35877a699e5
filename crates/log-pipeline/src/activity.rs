//! Activity tracking and idle-gated shutdown.
//!
//! [`ActivityClock`] records when a resource was last used. [`ActivityGated`]
//! wraps a downstream channel or sink and postpones its `stop()` until the
//! clock has been idle for a quiescence window, so events still in flight
//! when a stop is requested reach the resource before it closes.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tailgrok_core::event::LogEvent;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::LogPipelineError;
use crate::sink::{EventChannel, EventSink, Lifecycle};

/// Poll interval of [`ActivityClock::wait_for_quiescence`].
pub const QUIESCENCE_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Shared "last touched" timestamp.
///
/// Clones observe the same clock.
#[derive(Debug, Clone)]
pub struct ActivityClock {
    last: Arc<Mutex<Instant>>,
}

impl Default for ActivityClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityClock {
    /// Creates a clock touched now.
    pub fn new() -> Self {
        Self {
            last: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Records activity now.
    pub fn touch(&self) {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    /// Time since the last touch.
    pub fn elapsed(&self) -> Duration {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }

    /// `true` once nothing has touched the clock for `window`.
    pub fn is_idle_for(&self, window: Duration) -> bool {
        self.elapsed() >= window
    }

    /// Waits until the clock has been idle for `window`.
    ///
    /// Checks every `poll` (or sooner, when less remains). A touch during the
    /// wait restarts it. A zero window returns at once.
    pub async fn wait_for_quiescence(&self, window: Duration, poll: Duration, resource: &str) {
        loop {
            let elapsed = self.elapsed();
            if elapsed >= window {
                return;
            }
            debug!(
                resource,
                idle_ms = elapsed.as_millis() as u64,
                window_ms = window.as_millis() as u64,
                "waiting for quiescence before stop"
            );
            tokio::time::sleep(poll.min(window - elapsed)).await;
        }
    }
}

/// Decorator deferring `stop()` until the wrapped resource has been idle.
///
/// `put`, `deliver` and successful `take` calls count as activity. A zero
/// window disables the gate.
#[derive(Debug)]
pub struct ActivityGated<R> {
    inner: R,
    name: String,
    clock: ActivityClock,
    window: Duration,
    poll_interval: Duration,
    touch_on_stop: bool,
}

impl<R> ActivityGated<R> {
    pub fn new(inner: R, name: impl Into<String>, window: Duration) -> Self {
        Self {
            inner,
            name: name.into(),
            clock: ActivityClock::new(),
            window,
            poll_interval: QUIESCENCE_POLL_INTERVAL,
            touch_on_stop: false,
        }
    }

    /// Restart the idle window when `stop()` is called, so the resource
    /// stays open for at least a full window after the stop request.
    pub fn touch_on_stop(mut self, enabled: bool) -> Self {
        self.touch_on_stop = enabled;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn clock(&self) -> &ActivityClock {
        &self.clock
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

impl<R: Lifecycle> Lifecycle for ActivityGated<R> {
    async fn start(&self) -> Result<(), LogPipelineError> {
        self.clock.touch();
        self.inner.start().await
    }

    async fn stop(&self) -> Result<(), LogPipelineError> {
        if self.touch_on_stop {
            self.clock.touch();
        }
        info!(
            resource = self.name.as_str(),
            window_ms = self.window.as_millis() as u64,
            "stop requested, waiting for quiescence"
        );
        self.clock
            .wait_for_quiescence(self.window, self.poll_interval, &self.name)
            .await;
        info!(resource = self.name.as_str(), "quiescent, stopping");
        self.inner.stop().await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<R: EventChannel> EventChannel for ActivityGated<R> {
    async fn put(&self, event: LogEvent) -> Result<(), LogPipelineError> {
        self.clock.touch();
        self.inner.put(event).await
    }

    async fn take(&self) -> Option<LogEvent> {
        let event = self.inner.take().await;
        if event.is_some() {
            self.clock.touch();
        }
        event
    }
}

impl<R: EventSink> EventSink for ActivityGated<R> {
    async fn deliver(&self, batch: Vec<LogEvent>) -> Result<(), LogPipelineError> {
        self.clock.touch();
        self.inner.deliver(batch).await
    }
}
