//! JSON lines sink -- one JSON object per event to stdout or a file.

use std::borrow::Cow;
use std::path::Path;

use chrono::{DateTime, Utc};
use encoding_rs::Encoding;
use serde::Serialize;
use tailgrok_core::event::{FieldMapping, LogEvent};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::info;

use super::{EventSink, Lifecycle};
use crate::error::LogPipelineError;

/// Output value selecting standard output.
pub const STDOUT: &str = "stdout";

type Writer = Box<dyn AsyncWrite + Send + Unpin>;

#[derive(Serialize)]
struct EventRecord<'a> {
    id: &'a str,
    timestamp: DateTime<Utc>,
    trace_id: &'a str,
    source: &'a str,
    message: Cow<'a, str>,
    fields: &'a FieldMapping,
}

/// Writes events as JSON lines.
///
/// Event bodies are decoded with the charset they were encoded with.
pub struct JsonLinesSink {
    writer: Mutex<Writer>,
    encoding: &'static Encoding,
    target: String,
}

impl JsonLinesSink {
    /// Opens `output`: `"stdout"` or a file path (created, appended to).
    pub async fn open(output: &str, encoding: &'static Encoding) -> Result<Self, LogPipelineError> {
        let writer: Writer = if output == STDOUT {
            Box::new(tokio::io::stdout())
        } else {
            let path = Path::new(output);
            let file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await
                .map_err(|e| LogPipelineError::Config {
                    field: "sink.output".to_owned(),
                    reason: format!("cannot open '{output}': {e}"),
                })?;
            Box::new(file)
        };
        Ok(Self::from_writer(writer, output, encoding))
    }

    pub fn from_writer(
        writer: Writer,
        target: impl Into<String>,
        encoding: &'static Encoding,
    ) -> Self {
        Self {
            writer: Mutex::new(writer),
            encoding,
            target: target.into(),
        }
    }

    fn render(&self, event: &LogEvent, out: &mut Vec<u8>) -> Result<(), LogPipelineError> {
        let (message, _) = self.encoding.decode_without_bom_handling(&event.body);
        let record = EventRecord {
            id: &event.id,
            timestamp: DateTime::<Utc>::from(event.metadata.timestamp),
            trace_id: &event.metadata.trace_id,
            source: &event.source,
            message,
            fields: &event.fields,
        };
        serde_json::to_writer(&mut *out, &record)
            .map_err(|e| LogPipelineError::Delivery(format!("failed to encode event: {e}")))?;
        out.push(b'\n');
        Ok(())
    }
}

impl EventSink for JsonLinesSink {
    async fn deliver(&self, batch: Vec<LogEvent>) -> Result<(), LogPipelineError> {
        let mut buf = Vec::with_capacity(batch.len() * 256);
        for event in &batch {
            self.render(event, &mut buf)?;
        }

        let mut writer = self.writer.lock().await;
        writer
            .write_all(&buf)
            .await
            .map_err(|e| LogPipelineError::Delivery(format!("write to {} failed: {e}", self.target)))?;
        writer
            .flush()
            .await
            .map_err(|e| LogPipelineError::Delivery(format!("flush of {} failed: {e}", self.target)))?;

        metrics::counter!(tailgrok_core::metrics::SINK_EVENTS_WRITTEN_TOTAL)
            .increment(batch.len() as u64);
        Ok(())
    }
}

impl Lifecycle for JsonLinesSink {
    async fn start(&self) -> Result<(), LogPipelineError> {
        info!(target_output = self.target.as_str(), "json lines sink started");
        Ok(())
    }

    async fn stop(&self) -> Result<(), LogPipelineError> {
        self.writer.lock().await.flush().await?;
        info!(target_output = self.target.as_str(), "json lines sink stopped");
        Ok(())
    }

    fn name(&self) -> &str {
        "json-lines-sink"
    }
}
