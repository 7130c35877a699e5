//! Bounded in-memory event channel.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tailgrok_core::event::LogEvent;
use tracing::{info, warn};

use super::{EventChannel, EventSink, Lifecycle};
use crate::error::LogPipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelState {
    Created,
    Running,
    Stopped,
}

#[derive(Debug)]
struct Inner {
    events: VecDeque<LogEvent>,
    state: ChannelState,
}

/// Bounded FIFO of events.
///
/// Puts are refused once the channel is stopped; takes keep draining what is
/// left.
#[derive(Debug)]
pub struct MemoryChannel {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl MemoryChannel {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                events: VecDeque::with_capacity(capacity.min(10_000)),
                state: ChannelState::Created,
            }),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_running(&self) -> bool {
        self.lock().state == ChannelState::Running
    }

    fn record_size(len: usize) {
        metrics::gauge!(tailgrok_core::metrics::CHANNEL_SIZE).set(len as f64);
    }
}

impl EventChannel for MemoryChannel {
    async fn put(&self, event: LogEvent) -> Result<(), LogPipelineError> {
        let mut inner = self.lock();
        if inner.state == ChannelState::Stopped {
            return Err(LogPipelineError::Channel("channel is stopped".to_owned()));
        }
        if inner.events.len() >= self.capacity {
            return Err(LogPipelineError::Channel(format!(
                "channel full (capacity {})",
                self.capacity
            )));
        }
        inner.events.push_back(event);
        Self::record_size(inner.events.len());
        Ok(())
    }

    async fn take(&self) -> Option<LogEvent> {
        let mut inner = self.lock();
        let event = inner.events.pop_front();
        if event.is_some() {
            Self::record_size(inner.events.len());
        }
        event
    }
}

impl EventSink for MemoryChannel {
    /// Puts the whole batch, or none of it.
    async fn deliver(&self, batch: Vec<LogEvent>) -> Result<(), LogPipelineError> {
        let mut inner = self.lock();
        if inner.state == ChannelState::Stopped {
            return Err(LogPipelineError::Delivery("channel is stopped".to_owned()));
        }
        let free = self.capacity - inner.events.len();
        if batch.len() > free {
            warn!(
                batch = batch.len(),
                free,
                capacity = self.capacity,
                "channel cannot take batch"
            );
            return Err(LogPipelineError::Delivery(format!(
                "batch of {} events does not fit ({free} free of {})",
                batch.len(),
                self.capacity
            )));
        }
        inner.events.extend(batch);
        Self::record_size(inner.events.len());
        Ok(())
    }
}

impl Lifecycle for MemoryChannel {
    async fn start(&self) -> Result<(), LogPipelineError> {
        self.lock().state = ChannelState::Running;
        info!(capacity = self.capacity, "memory channel started");
        Ok(())
    }

    async fn stop(&self) -> Result<(), LogPipelineError> {
        let remaining = {
            let mut inner = self.lock();
            inner.state = ChannelState::Stopped;
            inner.events.len()
        };
        info!(remaining, "memory channel stopped");
        Ok(())
    }

    fn name(&self) -> &str {
        "memory-channel"
    }
}
