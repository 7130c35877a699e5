//! Log collection -- tails the source file into the shared line queue.
//!
//! - [`Tailer`]: byte-level reading with rotation and truncation detection
//! - [`TailReader`]: the reader worker with its lifecycle and idle-gated stop
//!
//! # Architecture
//! The reader runs in its own tokio task and is the only producer of the
//! [`BoundedLineQueue`](crate::queue::BoundedLineQueue).

pub mod file;
pub mod tailer;

pub use file::{ReaderState, ReaderStats, TailReader};
pub use tailer::{Refresh, Tailer, TailerConfig};
