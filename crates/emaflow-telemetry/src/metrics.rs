//! Prometheus metrics for the emaflow pipeline.
//!
//! Covers:
//! - Dispatch (batches enqueued, sequence gate waits)
//! - Shard processing (events, window closes, late events, trackers)
//! - Aggregation and submission (round latency, failures, last seq id)
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. If registration fails,
//! it indicates a fatal configuration error (e.g., duplicate metric names)
//! that should cause an immediate crash at startup rather than silent failure.
//! These panics only occur during static initialization, never at runtime.

use crate::error::{TelemetryError, TelemetryResult};
use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    register_int_gauge_vec, Encoder, Histogram, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    TextEncoder,
};

/// Total batches enqueued to the shard queues.
pub static BATCHES_DISPATCHED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "emaflow_batches_dispatched_total",
        "Total batches partitioned and enqueued to shard queues"
    )
    .unwrap()
});

/// Total batches whose combined result reached the sink.
pub static BATCHES_SUBMITTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "emaflow_batches_submitted_total",
        "Total batches submitted to the result sink"
    )
    .unwrap()
});

/// Last submitted batch sequence id.
pub static LAST_SUBMITTED_SEQ: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "emaflow_last_submitted_seq",
        "Sequence id of the last submitted batch"
    )
    .unwrap()
});

/// Events fed to trackers.
/// Labels: shard
pub static EVENTS_PROCESSED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "emaflow_events_processed_total",
        "Total events evaluated by shard workers",
        &["shard"]
    )
    .unwrap()
});

/// Live trackers per shard.
pub static TRACKERS_ACTIVE: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "emaflow_trackers_active",
        "Number of symbol trackers owned by a shard",
        &["shard"]
    )
    .unwrap()
});

/// Items waiting in a shard queue when a producer enqueues.
pub static SHARD_QUEUE_DEPTH: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "emaflow_shard_queue_depth",
        "Work items queued for a shard",
        &["shard"]
    )
    .unwrap()
});

/// Window closes across all trackers.
pub static WINDOWS_CLOSED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "emaflow_windows_closed_total",
        "Total tumbling windows closed"
    )
    .unwrap()
});

/// Events older than their tracker's open window.
pub static LATE_EVENTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "emaflow_late_events_total",
        "Total events ignored because they predate the open window"
    )
    .unwrap()
});

/// Crossovers emitted.
/// Labels: signal (buy/sell)
pub static CROSSOVERS_EMITTED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "emaflow_crossovers_emitted_total",
        "Total EMA crossovers detected",
        &["signal"]
    )
    .unwrap()
});

/// Time a producer waited for its turn at the sequence gate.
pub static SEQUENCE_GATE_WAIT_MS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "emaflow_sequence_gate_wait_ms",
        "Producer wait for its batch turn in milliseconds",
        vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0, 500.0]
    )
    .unwrap()
});

/// Time from the first partial result of a round to submission.
pub static AGGREGATION_ROUND_MS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "emaflow_aggregation_round_ms",
        "Aggregation round latency in milliseconds",
        vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0, 500.0]
    )
    .unwrap()
});

/// Sink submission failures.
/// Labels: kind (indicators/crossovers)
pub static SUBMIT_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "emaflow_submit_failures_total",
        "Total failed sink submissions",
        &["kind"]
    )
    .unwrap()
});

/// Metrics facade.
pub struct Metrics;

impl Metrics {
    /// Record a batch enqueued to all shards.
    pub fn batch_dispatched() {
        BATCHES_DISPATCHED_TOTAL.inc();
    }

    /// Record a batch submitted to the sink.
    pub fn batch_submitted(seq_id: u64) {
        BATCHES_SUBMITTED_TOTAL.inc();
        LAST_SUBMITTED_SEQ.set(seq_id as i64);
    }

    /// Record events evaluated by a shard.
    pub fn events_processed(shard: usize, count: u64) {
        EVENTS_PROCESSED_TOTAL
            .with_label_values(&[&shard.to_string()])
            .inc_by(count);
    }

    /// Update the tracker count of a shard.
    pub fn trackers_active(shard: usize, count: usize) {
        TRACKERS_ACTIVE
            .with_label_values(&[&shard.to_string()])
            .set(count as i64);
    }

    /// Update the queue depth of a shard.
    pub fn shard_queue_depth(shard: usize, depth: usize) {
        SHARD_QUEUE_DEPTH
            .with_label_values(&[&shard.to_string()])
            .set(depth as i64);
    }

    /// Record window closes.
    pub fn windows_closed(count: u64) {
        WINDOWS_CLOSED_TOTAL.inc_by(count);
    }

    /// Record late events.
    pub fn late_events(count: u64) {
        LATE_EVENTS_TOTAL.inc_by(count);
    }

    /// Record emitted crossovers.
    pub fn crossovers_emitted(signal: &str, count: u64) {
        if count > 0 {
            CROSSOVERS_EMITTED_TOTAL
                .with_label_values(&[signal])
                .inc_by(count);
        }
    }

    /// Record a sequence gate wait.
    pub fn gate_wait(wait_ms: f64) {
        SEQUENCE_GATE_WAIT_MS.observe(wait_ms);
    }

    /// Record an aggregation round.
    pub fn aggregation_round(latency_ms: f64) {
        AGGREGATION_ROUND_MS.observe(latency_ms);
    }

    /// Record a failed submission.
    pub fn submit_failed(kind: &str) {
        SUBMIT_FAILURES_TOTAL.with_label_values(&[kind]).inc();
    }

    /// Render the default registry in the Prometheus text format.
    pub fn gather_text() -> TelemetryResult<String> {
        let encoder = TextEncoder::new();
        let families = prometheus::gather();
        let mut buf = Vec::new();
        encoder
            .encode(&families, &mut buf)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buf).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}
