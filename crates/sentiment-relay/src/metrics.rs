//! Prometheus metrics for the relay

use once_cell::sync::Lazy;
use prometheus::{
    register_gauge, register_histogram, register_int_counter, register_int_counter_vec,
    register_int_gauge, Encoder, Gauge, Histogram, IntCounter, IntCounterVec, IntGauge,
    TextEncoder,
};

const LABEL_OUTCOME: &str = "outcome";
const LABEL_KIND: &str = "kind";

static MESSAGES_RECEIVED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "sentiment_relay_messages_received_total",
        "Inbound messages accumulated into the window"
    )
    .expect("Failed to register messages_received_total metric")
});

static MESSAGES_REJECTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "sentiment_relay_messages_rejected_total",
        "Inbound messages dropped because the payload could not be decoded"
    )
    .expect("Failed to register messages_rejected_total metric")
});

static WINDOW_LEN: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("sentiment_relay_window_len", "Items currently in the window")
        .expect("Failed to register window_len metric")
});

static TICKS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "sentiment_relay_ticks_total",
        "Sampling ticks by outcome",
        &[LABEL_OUTCOME]
    )
    .expect("Failed to register ticks_total metric")
});

static AGGREGATION_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "sentiment_relay_aggregation_failures_total",
        "Batches that could not be scored",
        &[LABEL_KIND]
    )
    .expect("Failed to register aggregation_failures_total metric")
});

static SCORING_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "sentiment_relay_scoring_duration_seconds",
        "Latency of the external sentiment call",
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("Failed to register scoring_duration_seconds metric")
});

static PUBLISHED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "sentiment_relay_published_total",
        "Aggregates handed to the outbound topic"
    )
    .expect("Failed to register published_total metric")
});

static PUBLISH_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "sentiment_relay_publish_failures_total",
        "Aggregates dropped because publishing failed"
    )
    .expect("Failed to register publish_failures_total metric")
});

static LAST_AVG_SENTIMENT: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "sentiment_relay_last_avg_sentiment",
        "Most recently published average compound score"
    )
    .expect("Failed to register last_avg_sentiment metric")
});

pub fn inc_received() {
    MESSAGES_RECEIVED_TOTAL.inc();
}

pub fn inc_rejected() {
    MESSAGES_REJECTED_TOTAL.inc();
}

pub fn set_window_len(len: usize) {
    WINDOW_LEN.set(len as i64);
}

pub fn inc_tick(outcome: &str) {
    TICKS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn inc_aggregation_failure(kind: &str) {
    AGGREGATION_FAILURES_TOTAL.with_label_values(&[kind]).inc();
}

pub fn observe_scoring_duration(secs: f64) {
    SCORING_DURATION_SECONDS.observe(secs);
}

pub fn record_published(avg_sentiment: f64) {
    PUBLISHED_TOTAL.inc();
    LAST_AVG_SENTIMENT.set(avg_sentiment);
}

pub fn inc_publish_failure() {
    PUBLISH_FAILURES_TOTAL.inc();
}

/// Process-wide counters for the periodic stats line
pub fn received_total() -> u64 {
    MESSAGES_RECEIVED_TOTAL.get()
}

pub fn rejected_total() -> u64 {
    MESSAGES_REJECTED_TOTAL.get()
}

pub fn published_total() -> u64 {
    PUBLISHED_TOTAL.get()
}

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| {
        prometheus::Error::Msg(format!("Failed to encode metrics as UTF-8: {}", e))
    })
}
