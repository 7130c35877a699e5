//! Byte-level tailing of a single file.
//!
//! [`Tailer`] keeps the read offset of one path, detects rotation and
//! truncation, and turns appended bytes into decoded lines. It performs no
//! waiting itself; the caller decides when to poll.
//!
//! # Rotation
//! - inode change (unix): the path now names a different file
//! - size below the read offset: the file was truncated in place
//!
//! Both restart reading at offset 0 of the current file.
//!
//! # Long lines
//! A line still unterminated after `max_line_length` bytes is emitted as it
//! stands; the rest of it follows as a new line.

use std::path::PathBuf;
use std::time::Duration;

use bytes::BytesMut;
use encoding_rs::Encoding;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::LogPipelineError;

/// Longest held line, in read chunks.
pub const MAX_LINE_CHUNKS: usize = 1024;

/// Settings of the tail primitive.
#[derive(Debug, Clone)]
pub struct TailerConfig {
    /// File to follow
    pub path: PathBuf,
    /// Bytes read per chunk
    pub buffer_size: usize,
    /// Delay between polls
    pub delay: Duration,
    /// Start at EOF instead of offset 0
    pub start_from_end: bool,
    /// Close the file after every poll
    pub reopen: bool,
    /// Charset of the file (ASCII-compatible)
    pub encoding: &'static Encoding,
    /// Bytes an unterminated line may reach before it is emitted anyway
    pub max_line_length: usize,
}

impl TailerConfig {
    pub fn from_pipeline(config: &PipelineConfig) -> Result<Self, LogPipelineError> {
        let buffer_size = config.input_buffer_size.max(1);
        Ok(Self {
            path: PathBuf::from(&config.file),
            buffer_size,
            delay: config.tailer_delay(),
            start_from_end: config.tailer_start_from_end,
            reopen: config.tailer_reopen,
            encoding: config.encoding()?,
            max_line_length: buffer_size.saturating_mul(MAX_LINE_CHUNKS),
        })
    }
}

/// Outcome of [`Tailer::refresh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    /// Nothing new since the last read
    Unchanged,
    /// Unread bytes are available
    Grown,
    /// The file was rotated or truncated; reading restarts at offset 0
    Rotated,
}

/// Read position and partial-line state for one file.
#[derive(Debug)]
pub struct Tailer {
    config: TailerConfig,
    offset: u64,
    file_id: Option<u64>,
    positioned: bool,
    file: Option<File>,
    partial: BytesMut,
    chunk: Vec<u8>,
}

impl Tailer {
    pub fn new(config: TailerConfig) -> Self {
        let chunk = vec![0; config.buffer_size];
        Self {
            config,
            offset: 0,
            file_id: None,
            positioned: false,
            file: None,
            partial: BytesMut::new(),
            chunk,
        }
    }

    pub fn config(&self) -> &TailerConfig {
        &self.config
    }

    /// Byte offset of the next read.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Checks the file for growth, rotation and truncation.
    ///
    /// # Errors
    /// [`LogPipelineError::Source`] when the file cannot be inspected, e.g. it
    /// is momentarily missing during rotation. Callers retry on the next poll.
    pub async fn refresh(&mut self) -> Result<Refresh, LogPipelineError> {
        let metadata = match tokio::fs::metadata(&self.config.path).await {
            Ok(m) => m,
            Err(e) => {
                self.file = None;
                return Err(self.source_error(format!("cannot stat file: {e}")));
            }
        };
        let len = metadata.len();
        let id = file_id(&metadata);

        if !self.positioned {
            self.offset = if self.config.start_from_end { len } else { 0 };
            self.file_id = id;
            self.positioned = true;
            debug!(
                path = %self.config.path.display(),
                offset = self.offset,
                "tail position initialised"
            );
            return Ok(if len > self.offset {
                Refresh::Grown
            } else {
                Refresh::Unchanged
            });
        }

        let replaced = id.is_some() && self.file_id.is_some() && id != self.file_id;
        if replaced || len < self.offset {
            info!(
                path = %self.config.path.display(),
                previous_offset = self.offset,
                size = len,
                replaced,
                "file rotated or truncated, reading from start"
            );
            if !self.partial.is_empty() {
                debug!(
                    bytes = self.partial.len(),
                    "discarding incomplete line of previous file"
                );
            }
            self.offset = 0;
            self.file_id = id;
            self.file = None;
            self.partial.clear();
            return Ok(Refresh::Rotated);
        }

        Ok(if len > self.offset {
            Refresh::Grown
        } else {
            Refresh::Unchanged
        })
    }

    /// Reads one chunk and returns the lines it completed.
    ///
    /// `None` at end of file. An incomplete trailing line is held until its
    /// newline arrives. `\n` and `\r\n` terminators are removed.
    pub async fn read_chunk(&mut self) -> Result<Option<Vec<String>>, LogPipelineError> {
        if self.file.is_none() {
            let mut file = File::open(&self.config.path)
                .await
                .map_err(|e| self.source_error(format!("cannot open file: {e}")))?;
            file.seek(SeekFrom::Start(self.offset))
                .await
                .map_err(|e| self.source_error(format!("cannot seek to {}: {e}", self.offset)))?;
            self.file = Some(file);
        }

        let read = match self.file.as_mut() {
            Some(file) => file.read(&mut self.chunk).await,
            None => return Ok(None),
        };
        let n = match read {
            Ok(n) => n,
            Err(e) => {
                self.file = None;
                return Err(self.source_error(format!("read failed: {e}")));
            }
        };
        if n == 0 {
            return Ok(None);
        }

        self.offset += n as u64;
        self.partial.extend_from_slice(&self.chunk[..n]);
        Ok(Some(self.split_lines()))
    }

    /// Closes the file when configured to reopen between polls.
    pub fn release(&mut self) {
        if self.config.reopen {
            self.file = None;
        }
    }

    fn split_lines(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(pos) = self.partial.iter().position(|&b| b == b'\n') {
            let raw = self.partial.split_to(pos + 1);
            let mut end = raw.len() - 1;
            if end > 0 && raw[end - 1] == b'\r' {
                end -= 1;
            }
            let (text, _) = self.config.encoding.decode_without_bom_handling(&raw[..end]);
            lines.push(text.into_owned());
        }

        if self.partial.len() >= self.config.max_line_length {
            let raw = self.partial.split();
            warn!(
                path = %self.config.path.display(),
                bytes = raw.len(),
                limit = self.config.max_line_length,
                "line exceeds maximum length, emitting it in parts"
            );
            let (text, _) = self.config.encoding.decode_without_bom_handling(&raw);
            lines.push(text.into_owned());
        }
        lines
    }

    fn source_error(&self, reason: String) -> LogPipelineError {
        LogPipelineError::Source {
            path: self.config.path.display().to_string(),
            reason,
        }
    }
}

#[cfg(unix)]
fn file_id(metadata: &std::fs::Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(metadata.ino())
}

#[cfg(not(unix))]
fn file_id(_metadata: &std::fs::Metadata) -> Option<u64> {
    None
}
