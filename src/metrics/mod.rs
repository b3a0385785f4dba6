//! Prometheus metrics for search and indexing.
//!
//! Metrics are created lazily and registered into [`PROMETHEUS_REGISTRY`] by
//! [`init_metrics`]; [`gather_metrics`] renders the text exposition format
//! served on `/metrics`.
//!
//! # Example
//! ```no_run
//! use archive_search::metrics::{self, SEARCHES_TOTAL};
//!
//! metrics::init_metrics().ok();
//! SEARCHES_TOTAL.with_label_values(&["ok"]).inc();
//! println!("{}", metrics::gather_metrics());
//! ```

use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Gauge, Histogram, HistogramOpts, HistogramVec, Opts, Registry,
};

const NAMESPACE: &str = "archive_search";

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    // ============================================================================
    // Search Metrics
    // ============================================================================

    /// Searches served
    ///
    /// Labels: outcome (ok, fallback, error)
    pub static ref SEARCHES_TOTAL: CounterVec = CounterVec::new(
        Opts::new("searches_total", "Total number of searches").namespace(NAMESPACE),
        &["outcome"]
    ).expect("Failed to create SEARCHES_TOTAL metric");

    /// Search latency in seconds
    ///
    /// Labels: source (index, datastore)
    pub static ref SEARCH_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new("search_duration_seconds", "Search latency in seconds")
            .namespace(NAMESPACE)
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["source"]
    ).expect("Failed to create SEARCH_DURATION_SECONDS metric");

    // ============================================================================
    // Indexing Metrics
    // ============================================================================

    /// Documents written or deleted
    ///
    /// Labels: operation (create, update, delete), outcome (success, failure)
    pub static ref DOCUMENTS_INDEXED_TOTAL: CounterVec = CounterVec::new(
        Opts::new("documents_indexed_total", "Total number of indexing operations")
            .namespace(NAMESPACE),
        &["operation", "outcome"]
    ).expect("Failed to create DOCUMENTS_INDEXED_TOTAL metric");

    /// Bulk batches submitted
    ///
    /// Labels: outcome (ok, transport_error, cancelled)
    pub static ref BULK_BATCHES_TOTAL: CounterVec = CounterVec::new(
        Opts::new("bulk_batches_total", "Total number of bulk batches").namespace(NAMESPACE),
        &["outcome"]
    ).expect("Failed to create BULK_BATCHES_TOTAL metric");

    /// Bulk batch latency in seconds
    pub static ref BULK_BATCH_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new("bulk_batch_duration_seconds", "Bulk batch latency in seconds")
            .namespace(NAMESPACE)
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0])
    ).expect("Failed to create BULK_BATCH_DURATION_SECONDS metric");

    /// Jobs waiting in the indexing queue
    pub static ref INDEXING_QUEUE_DEPTH: Gauge = Gauge::with_opts(
        Opts::new("indexing_queue_depth", "Jobs waiting in the indexing queue")
            .namespace(NAMESPACE)
    ).expect("Failed to create INDEXING_QUEUE_DEPTH metric");

    /// Tagging quality of enhanced documents
    pub static ref TAGGING_QUALITY_SCORE: Histogram = Histogram::with_opts(
        HistogramOpts::new("tagging_quality_score", "Tagging quality of enhanced documents")
            .namespace(NAMESPACE)
            .buckets(vec![25.0, 50.0, 75.0, 90.0, 100.0])
    ).expect("Failed to create TAGGING_QUALITY_SCORE metric");
}

/// Register every metric with [`PROMETHEUS_REGISTRY`].
///
/// Call once at startup; a second call fails with `AlreadyReg`.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    PROMETHEUS_REGISTRY.register(Box::new(SEARCHES_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(SEARCH_DURATION_SECONDS.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(DOCUMENTS_INDEXED_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(BULK_BATCHES_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(BULK_BATCH_DURATION_SECONDS.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(INDEXING_QUEUE_DEPTH.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(TAGGING_QUALITY_SCORE.clone()))?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Record one search by outcome and where it was served from
pub fn record_search(outcome: &str, source: &str, duration_secs: f64) {
    SEARCHES_TOTAL.with_label_values(&[outcome]).inc();
    SEARCH_DURATION_SECONDS
        .with_label_values(&[source])
        .observe(duration_secs);
}

/// Record a terminal indexing outcome
pub fn record_indexed(operation: &str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    DOCUMENTS_INDEXED_TOTAL
        .with_label_values(&[operation, outcome])
        .inc();
}

pub fn record_batch(outcome: &str, duration_secs: f64) {
    BULK_BATCHES_TOTAL.with_label_values(&[outcome]).inc();
    BULK_BATCH_DURATION_SECONDS.observe(duration_secs);
}

/// Generate Prometheus text format metrics
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}
