//! Events -- the unit handed from the log pipeline to downstream collaborators.
//!
//! Every [`LogEvent`] carries [`EventMetadata`] linking it to a trace.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Module name stamped on events produced by the log pipeline
pub const MODULE_LOG_PIPELINE: &str = "log-pipeline";

/// Field name to extracted value. Empty when the line did not match.
pub type FieldMapping = BTreeMap<String, String>;

/// Tracing information common to every event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Creation time
    pub timestamp: SystemTime,
    /// Producing module (e.g. "log-pipeline")
    pub source_module: String,
    /// Links events of one flow together
    pub trace_id: String,
}

impl EventMetadata {
    /// Metadata starting a new trace with a UUID v4 id.
    pub fn with_new_trace(source_module: impl Into<String>) -> Self {
        Self {
            timestamp: SystemTime::now(),
            source_module: source_module.into(),
            trace_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// One tailed line with the fields extracted from it.
///
/// `body` holds the raw line re-encoded with the configured charset, so
/// downstream consumers receive the bytes in the file's own encoding.
#[derive(Debug, Clone)]
pub struct LogEvent {
    /// Unique id
    pub id: String,
    /// Metadata
    pub metadata: EventMetadata,
    /// Raw line, without its line terminator
    pub body: Bytes,
    /// Extracted fields
    pub fields: FieldMapping,
    /// Path of the tailed file
    pub source: String,
}

impl LogEvent {
    /// Creates an event starting a new trace.
    pub fn new(body: Bytes, fields: FieldMapping, source: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            metadata: EventMetadata::with_new_trace(MODULE_LOG_PIPELINE),
            body,
            fields,
            source: source.into(),
        }
    }

    /// Body interpreted as UTF-8, replacing invalid sequences.
    pub fn body_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LogEvent[{}] source={} fields={} bytes={}",
            &self.id[..8.min(self.id.len())],
            self.source,
            self.fields.len(),
            self.body.len(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_fields() -> FieldMapping {
        let mut fields = FieldMapping::new();
        fields.insert("logLevel".to_owned(), "INFO".to_owned());
        fields
    }

    #[test]
    fn log_event_new_starts_trace() {
        let event = LogEvent::new(
            Bytes::from_static(b"INFO hello"),
            sample_fields(),
            "/var/log/app.log",
        );
        assert_eq!(event.metadata.source_module, MODULE_LOG_PIPELINE);
        assert!(!event.metadata.trace_id.is_empty());
        assert_ne!(event.id, event.metadata.trace_id);
    }

    #[test]
    fn log_event_ids_are_unique() {
        let a = LogEvent::new(Bytes::new(), FieldMapping::new(), "a");
        let b = LogEvent::new(Bytes::new(), FieldMapping::new(), "a");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn body_lossy_replaces_invalid_utf8() {
        let event = LogEvent::new(
            Bytes::from_static(&[b'o', b'k', 0xff]),
            FieldMapping::new(),
            "a",
        );
        assert!(event.body_lossy().starts_with("ok"));
    }

    #[test]
    fn display_is_short() {
        let event = LogEvent::new(
            Bytes::from_static(b"INFO hello"),
            sample_fields(),
            "/var/log/app.log",
        );
        let shown = event.to_string();
        assert!(shown.starts_with("LogEvent["));
        assert!(shown.contains("fields=1"));
        assert!(shown.contains("bytes=10"));
    }

    #[test]
    fn new_traces_are_distinct() {
        let a = EventMetadata::with_new_trace(MODULE_LOG_PIPELINE);
        let b = EventMetadata::with_new_trace(MODULE_LOG_PIPELINE);
        assert_ne!(a.trace_id, b.trace_id);
    }

    #[test]
    fn event_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync + 'static>() {}
        assert_send_sync::<LogEvent>();
    }
}
