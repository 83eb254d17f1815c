//! Prometheus metrics registry and instruments.
//!
//! Instruments can be used before `init_metrics` runs; registration only makes
//! them visible through `REGISTRY`.

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, IntCounterVec, IntGaugeVec, Opts, Registry};
use std::time::Duration;

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Local store metrics
    pub static ref DB_QUERIES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("twittcache_db_queries_total", "Total number of local store statements"),
        &["operation", "table", "status"]
    ).expect("metric can be created");
    pub static ref DB_QUERY_DURATION_SECONDS: prometheus::HistogramVec = prometheus::HistogramVec::new(
        HistogramOpts::new(
            "twittcache_db_query_duration_seconds",
            "Local store statement duration in seconds"
        ).buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        &["operation", "table"]
    ).expect("metric can be created");
    pub static ref DB_TRANSACTIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("twittcache_db_transactions_total", "Write transactions by outcome"),
        &["table", "outcome"]
    ).expect("metric can be created");

    // Cache metrics
    pub static ref CACHE_HITS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("twittcache_cache_hits_total", "Total number of cache hits"),
        &["cache_name"]
    ).expect("metric can be created");
    pub static ref CACHE_MISSES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("twittcache_cache_misses_total", "Total number of cache misses"),
        &["cache_name"]
    ).expect("metric can be created");
    pub static ref CACHE_SIZE_BYTES: IntGaugeVec = IntGaugeVec::new(
        Opts::new("twittcache_cache_size_bytes", "Current weighted size of a cache tier"),
        &["cache_name"]
    ).expect("metric can be created");

    // Remote collaborator metrics
    pub static ref REMOTE_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("twittcache_remote_requests_total", "Remote client calls by outcome"),
        &["operation", "outcome"]
    ).expect("metric can be created");
    pub static ref BLOB_FETCHES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("twittcache_blob_fetches_total", "Image network fetches by outcome"),
        &["outcome"]
    ).expect("metric can be created");

    // Error metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("twittcache_errors_total", "Total number of errors"),
        &["error_type", "source"]
    ).expect("metric can be created");
}

/// Record one local store statement.
pub fn observe_db_query(operation: &str, table: &str, ok: bool, elapsed: Duration) {
    let status = if ok { "ok" } else { "error" };
    DB_QUERIES_TOTAL
        .with_label_values(&[operation, table, status])
        .inc();
    DB_QUERY_DURATION_SECONDS
        .with_label_values(&[operation, table])
        .observe(elapsed.as_secs_f64());
}

/// Record a cache lookup on the named tier.
pub fn observe_cache_lookup(cache_name: &str, hit: bool) {
    if hit {
        CACHE_HITS_TOTAL.with_label_values(&[cache_name]).inc();
    } else {
        CACHE_MISSES_TOTAL.with_label_values(&[cache_name]).inc();
    }
}

/// Initialize metrics registry.
pub fn init_metrics() {
    REGISTRY
        .register(Box::new(DB_QUERIES_TOTAL.clone()))
        .expect("DB_QUERIES_TOTAL can be registered");
    REGISTRY
        .register(Box::new(DB_QUERY_DURATION_SECONDS.clone()))
        .expect("DB_QUERY_DURATION_SECONDS can be registered");
    REGISTRY
        .register(Box::new(DB_TRANSACTIONS_TOTAL.clone()))
        .expect("DB_TRANSACTIONS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(CACHE_HITS_TOTAL.clone()))
        .expect("CACHE_HITS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(CACHE_MISSES_TOTAL.clone()))
        .expect("CACHE_MISSES_TOTAL can be registered");
    REGISTRY
        .register(Box::new(CACHE_SIZE_BYTES.clone()))
        .expect("CACHE_SIZE_BYTES can be registered");
    REGISTRY
        .register(Box::new(REMOTE_REQUESTS_TOTAL.clone()))
        .expect("REMOTE_REQUESTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(BLOB_FETCHES_TOTAL.clone()))
        .expect("BLOB_FETCHES_TOTAL can be registered");
    REGISTRY
        .register(Box::new(ERRORS_TOTAL.clone()))
        .expect("ERRORS_TOTAL can be registered");

    tracing::info!("Metrics registry initialized");
}
