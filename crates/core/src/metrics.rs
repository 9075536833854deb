//! Prometheus metrics for indexing runs.
//!
//! This module provides metrics for:
//! - Event outcomes (indexed, skipped, failed)
//! - Map resolution (resolved, unresolved)
//! - Rows inserted per catalog table

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Registry holding every indexing metric.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    for metric in all_metrics() {
        registry.register(metric).unwrap();
    }
    registry
});

/// Events processed total by outcome.
pub static EVENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("demoset_events_total", "Event directories processed"),
        &["outcome"], // "indexed", "skipped", "failed"
    )
    .unwrap()
});

/// Declared maps by resolution result.
pub static MAPS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("demoset_maps_total", "Declared maps by resolution result"),
        &["result"], // "resolved", "unresolved"
    )
    .unwrap()
});

/// Rows inserted by table.
pub static ROWS_INSERTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "demoset_rows_inserted_total",
            "Catalog rows inserted (existing keys are not counted)",
        ),
        &["table"],
    )
    .unwrap()
});

/// Time spent indexing one event.
pub static EVENT_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "demoset_event_index_duration_seconds",
            "Duration of indexing a single event",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
        &["outcome"],
    )
    .unwrap()
});

/// Get all metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(EVENTS_TOTAL.clone()),
        Box::new(MAPS_TOTAL.clone()),
        Box::new(ROWS_INSERTED.clone()),
        Box::new(EVENT_DURATION.clone()),
    ]
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
