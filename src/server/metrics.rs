use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, GaugeVec, Histogram, HistogramOpts, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;
use tracing::error;

/// Metric name prefix for all relevance pipeline metrics
const PREFIX: &str = "relevance";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Search Metrics
    pub static ref SEARCH_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_search_requests_total"), "Total number of search requests"),
        &["personalized", "profile_applied"]
    ).expect("Failed to create search_requests_total metric");

    pub static ref SEARCH_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            format!("{PREFIX}_search_duration_seconds"),
            "Search request duration in seconds"
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0])
    ).expect("Failed to create search_duration_seconds metric");

    // Refresh Pipeline Metrics
    pub static ref REFRESH_TASKS_SCHEDULED_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_refresh_tasks_scheduled_total"),
        "Total refresh schedule calls (including replacements)"
    ).expect("Failed to create refresh_tasks_scheduled_total metric");

    pub static ref REFRESH_TASKS_DISPATCHED_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_refresh_tasks_dispatched_total"),
        "Total refresh tasks drained and dispatched"
    ).expect("Failed to create refresh_tasks_dispatched_total metric");

    pub static ref REFRESH_QUEUE_DEPTH: Gauge = Gauge::new(
        format!("{PREFIX}_refresh_queue_depth"),
        "Number of pending deduplicated refresh tasks"
    ).expect("Failed to create refresh_queue_depth metric");

    // Telemetry Metrics
    pub static ref ANALYTICS_EVENTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_analytics_events_total"), "Analytics events by name"),
        &["event"]
    ).expect("Failed to create analytics_events_total metric");

    pub static ref TELEMETRY_FAILURES_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_telemetry_failures_total"),
        "Telemetry emissions that failed in the worker"
    ).expect("Failed to create telemetry_failures_total metric");

    // Catalog Metrics
    pub static ref CATALOG_ITEMS_TOTAL: GaugeVec = GaugeVec::new(
        Opts::new(format!("{PREFIX}_catalog_items_total"), "Total items in catalog"),
        &["type"]
    ).expect("Failed to create catalog_items_total metric");
}

/// Register all metrics with the global registry. Call once at startup.
pub fn init_metrics() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(SEARCH_REQUESTS_TOTAL.clone()),
        Box::new(SEARCH_DURATION_SECONDS.clone()),
        Box::new(REFRESH_TASKS_SCHEDULED_TOTAL.clone()),
        Box::new(REFRESH_TASKS_DISPATCHED_TOTAL.clone()),
        Box::new(REFRESH_QUEUE_DEPTH.clone()),
        Box::new(ANALYTICS_EVENTS_TOTAL.clone()),
        Box::new(TELEMETRY_FAILURES_TOTAL.clone()),
        Box::new(CATALOG_ITEMS_TOTAL.clone()),
    ];

    for collector in collectors {
        if let Err(e) = REGISTRY.register(collector) {
            // Re-registration is harmless in tests.
            tracing::debug!("Metric registration skipped: {}", e);
        }
    }
}

/// Seed catalog size gauges from the store counts.
pub fn init_catalog_metrics(releases: usize, tracks: usize) {
    CATALOG_ITEMS_TOTAL
        .with_label_values(&["release"])
        .set(releases as f64);
    CATALOG_ITEMS_TOTAL
        .with_label_values(&["track"])
        .set(tracks as f64);
}

pub fn record_search(personalized: bool, profile_applied: bool, duration: Duration) {
    SEARCH_REQUESTS_TOTAL
        .with_label_values(&[bool_label(personalized), bool_label(profile_applied)])
        .inc();
    SEARCH_DURATION_SECONDS.observe(duration.as_secs_f64());
}

pub fn record_refresh_scheduled(queue_depth: usize) {
    REFRESH_TASKS_SCHEDULED_TOTAL.inc();
    REFRESH_QUEUE_DEPTH.set(queue_depth as f64);
}

pub fn set_refresh_queue_depth(depth: usize) {
    REFRESH_QUEUE_DEPTH.set(depth as f64);
}

pub fn record_refresh_dispatched(count: usize) {
    REFRESH_TASKS_DISPATCHED_TOTAL.inc_by(count as f64);
}

pub fn record_analytics_event(event: &str) {
    ANALYTICS_EVENTS_TOTAL.with_label_values(&[event]).inc();
}

pub fn record_telemetry_failure() {
    TELEMETRY_FAILURES_TOTAL.inc();
}

fn bool_label(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

/// Prometheus text exposition endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (StatusCode::OK, buffer).into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "encoding error").into_response()
        }
    }
}
