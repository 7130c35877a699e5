//! Metric names and descriptions.
//!
//! Every Prometheus metric is named here; crates call `metrics::counter!()`,
//! `metrics::gauge!()` and `metrics::histogram!()` with these constants.
//!
//! # Naming
//!
//! - prefix: `tailgrok_`
//! - suffix: `_total` (counter), `_seconds` (histogram/latency), none (gauge)
//!
//! ```ignore
//! metrics::counter!(tailgrok_core::metrics::LINES_READ_TOTAL).increment(1);
//! ```

/// Result label key (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── Tail reader ─────────────────────────────────────────────────────

/// Lines read from the tailed file (counter)
pub const LINES_READ_TOTAL: &str = "tailgrok_lines_read_total";

/// File rotations or truncations observed (counter)
pub const FILE_ROTATIONS_TOTAL: &str = "tailgrok_file_rotations_total";

/// Lines currently waiting in the shared queue (gauge)
pub const QUEUE_DEPTH: &str = "tailgrok_queue_depth";

// ─── Consumers ───────────────────────────────────────────────────────

/// Lines for which the record mapping produced no fields (counter)
pub const UNMATCHED_LINES_TOTAL: &str = "tailgrok_unmatched_lines_total";

/// Batches handed to the downstream sink (counter, label: result)
pub const BATCHES_FLUSHED_TOTAL: &str = "tailgrok_batches_flushed_total";

/// Events delivered downstream (counter)
pub const EVENTS_DELIVERED_TOTAL: &str = "tailgrok_events_delivered_total";

/// Batches rejected by the downstream sink (counter)
pub const DELIVERY_ERRORS_TOTAL: &str = "tailgrok_delivery_errors_total";

/// Time to deliver one batch (histogram, seconds)
pub const FLUSH_DURATION_SECONDS: &str = "tailgrok_flush_duration_seconds";

// ─── Downstream ──────────────────────────────────────────────────────

/// Events buffered in the in-memory channel (gauge)
pub const CHANNEL_SIZE: &str = "tailgrok_channel_size";

/// Events written by the JSON lines sink (counter)
pub const SINK_EVENTS_WRITTEN_TOTAL: &str = "tailgrok_sink_events_written_total";

// ─── Daemon ──────────────────────────────────────────────────────────

/// Daemon uptime (gauge, seconds)
pub const DAEMON_UPTIME_SECONDS: &str = "tailgrok_daemon_uptime_seconds";

/// Build information (gauge, always 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "tailgrok_daemon_build_info";

/// Histogram buckets for [`FLUSH_DURATION_SECONDS`], 100us to 5s.
pub const FLUSH_DURATION_BUCKETS: [f64; 10] =
    [0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0];

/// Registers the HELP text of every metric.
///
/// Call once, after the global recorder is installed.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(LINES_READ_TOTAL, "Total number of lines read from the tailed file");
    describe_counter!(
        FILE_ROTATIONS_TOTAL,
        "Total number of rotations or truncations of the tailed file"
    );
    describe_gauge!(QUEUE_DEPTH, "Number of lines waiting in the shared queue");

    describe_counter!(
        UNMATCHED_LINES_TOTAL,
        "Total number of lines that yielded no extracted fields"
    );
    describe_counter!(
        BATCHES_FLUSHED_TOTAL,
        "Total number of batches handed to the downstream sink"
    );
    describe_counter!(
        EVENTS_DELIVERED_TOTAL,
        "Total number of events delivered downstream"
    );
    describe_counter!(
        DELIVERY_ERRORS_TOTAL,
        "Total number of batches rejected by the downstream sink"
    );
    describe_histogram!(
        FLUSH_DURATION_SECONDS,
        "Time to deliver a single batch in seconds"
    );

    describe_gauge!(CHANNEL_SIZE, "Number of events buffered in the channel");
    describe_counter!(
        SINK_EVENTS_WRITTEN_TOTAL,
        "Total number of events written by the JSON lines sink"
    );

    describe_gauge!(DAEMON_UPTIME_SECONDS, "tailgrok daemon uptime in seconds");
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_METRIC_NAMES: &[&str] = &[
        LINES_READ_TOTAL,
        FILE_ROTATIONS_TOTAL,
        QUEUE_DEPTH,
        UNMATCHED_LINES_TOTAL,
        BATCHES_FLUSHED_TOTAL,
        EVENTS_DELIVERED_TOTAL,
        DELIVERY_ERRORS_TOTAL,
        FLUSH_DURATION_SECONDS,
        CHANNEL_SIZE,
        SINK_EVENTS_WRITTEN_TOTAL,
        DAEMON_UPTIME_SECONDS,
        DAEMON_BUILD_INFO,
    ];

    #[test]
    fn all_metrics_start_with_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("tailgrok_"),
                "Metric '{}' does not start with 'tailgrok_' prefix",
                name
            );
        }
    }

    #[test]
    fn metric_names_are_unique() {
        let mut names = ALL_METRIC_NAMES.to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ALL_METRIC_NAMES.len());
    }

    #[test]
    fn counters_end_with_total() {
        for name in [
            LINES_READ_TOTAL,
            FILE_ROTATIONS_TOTAL,
            UNMATCHED_LINES_TOTAL,
            BATCHES_FLUSHED_TOTAL,
            EVENTS_DELIVERED_TOTAL,
            DELIVERY_ERRORS_TOTAL,
            SINK_EVENTS_WRITTEN_TOTAL,
        ] {
            assert!(name.ends_with("_total"), "{name}");
        }
    }

    #[test]
    fn describe_all_does_not_panic() {
        describe_all();
    }

    #[test]
    fn flush_duration_buckets_are_sorted() {
        let buckets = FLUSH_DURATION_BUCKETS;
        for i in 1..buckets.len() {
            assert!(buckets[i] > buckets[i - 1]);
        }
    }
}
