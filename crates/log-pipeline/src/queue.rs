//! Bounded line queue between the tail reader and the consumers.
//!
//! One producer, many competing consumers: every line is received by exactly
//! one consumer, in file order across the consumer pool. A full queue makes
//! the producer wait; lines are dropped only once the producer is told that
//! nothing consumes the queue any more.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Wait applied to each attempt of [`BoundedLineQueue::push`].
pub const OFFER_TIMEOUT: Duration = Duration::from_millis(1000);

/// Fixed-capacity FIFO of raw lines.
///
/// Clones share the same queue.
#[derive(Debug, Clone)]
pub struct BoundedLineQueue {
    tx: mpsc::Sender<String>,
    rx: Arc<Mutex<mpsc::Receiver<String>>>,
}

impl BoundedLineQueue {
    /// Creates a queue holding at most `capacity` lines (at least one).
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    /// Enqueues `line`, waiting up to `wait` for space.
    ///
    /// Hands the line back when the queue stayed full.
    pub async fn offer(&self, line: String, wait: Duration) -> Result<(), String> {
        self.tx.send_timeout(line, wait).await.map_err(|e| match e {
            mpsc::error::SendTimeoutError::Timeout(line)
            | mpsc::error::SendTimeoutError::Closed(line) => line,
        })
    }

    /// Enqueues `line`, retrying until there is space.
    pub async fn push(&self, mut line: String) {
        loop {
            match self.offer(line, OFFER_TIMEOUT).await {
                Ok(()) => return,
                Err(rejected) => {
                    debug!(
                        capacity = self.capacity(),
                        "queue full, retrying push"
                    );
                    line = rejected;
                }
            }
        }
    }

    /// Enqueues `line`, waiting for space until `abandon` is cancelled.
    ///
    /// Hands the line back when abandoned or when the queue is closed.
    pub async fn push_unless(
        &self,
        line: String,
        abandon: &CancellationToken,
    ) -> Result<(), String> {
        if abandon.is_cancelled() {
            return Err(line);
        }
        tokio::select! {
            permit = self.tx.reserve() => match permit {
                Ok(permit) => {
                    permit.send(line);
                    Ok(())
                }
                Err(_) => Err(line),
            },
            _ = abandon.cancelled() => Err(line),
        }
    }

    /// Dequeues the next line, waiting up to `wait`.
    ///
    /// `None` means nothing arrived in time; callers re-check their stop
    /// condition and poll again.
    pub async fn pop(&self, wait: Duration) -> Option<String> {
        tokio::time::timeout(wait, async { self.rx.lock().await.recv().await })
            .await
            .ok()
            .flatten()
    }

    /// Lines currently queued.
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Fill ratio in `0.0..=1.0`.
    pub fn utilization(&self) -> f64 {
        self.len() as f64 / self.capacity() as f64
    }
}
