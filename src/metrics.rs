//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, IntCounterVec, Opts, Registry};
use std::time::Duration;

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Authentication Metrics
    pub static ref AUTH_EVENTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("brewnotes_auth_events_total", "Total number of authentication events"),
        &["event", "outcome"]
    ).expect("metric can be created");

    // Identity provider Metrics
    pub static ref GITHUB_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("brewnotes_github_requests_total", "Total number of requests sent to GitHub"),
        &["endpoint", "status"]
    ).expect("metric can be created");
    pub static ref GITHUB_REQUEST_DURATION_SECONDS: prometheus::HistogramVec = prometheus::HistogramVec::new(
        HistogramOpts::new(
            "brewnotes_github_request_duration_seconds",
            "GitHub request duration in seconds"
        ).buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["endpoint"]
    ).expect("metric can be created");

    // Session Metrics
    pub static ref SESSIONS_PURGED_TOTAL: prometheus::IntCounter = prometheus::IntCounter::new(
        "brewnotes_sessions_purged_total",
        "Total number of expired sessions removed"
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("brewnotes_errors_total", "Total number of errors"),
        &["error_type", "endpoint"]
    ).expect("metric can be created");
}

/// Initialize metrics registry.
pub fn init_metrics() {
    REGISTRY
        .register(Box::new(AUTH_EVENTS_TOTAL.clone()))
        .expect("AUTH_EVENTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(GITHUB_REQUESTS_TOTAL.clone()))
        .expect("GITHUB_REQUESTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(GITHUB_REQUEST_DURATION_SECONDS.clone()))
        .expect("GITHUB_REQUEST_DURATION_SECONDS can be registered");
    REGISTRY
        .register(Box::new(SESSIONS_PURGED_TOTAL.clone()))
        .expect("SESSIONS_PURGED_TOTAL can be registered");
    REGISTRY
        .register(Box::new(ERRORS_TOTAL.clone()))
        .expect("ERRORS_TOTAL can be registered");

    tracing::info!("Metrics registry initialized");
}

/// Record an authentication event such as `login/success` or `oauth/username_conflict`.
pub fn record_auth_event(event: &str, outcome: &str) {
    AUTH_EVENTS_TOTAL.with_label_values(&[event, outcome]).inc();
}

/// Record one outbound GitHub request.
pub fn observe_github_request(endpoint: &str, status: &str, elapsed: Duration) {
    GITHUB_REQUESTS_TOTAL
        .with_label_values(&[endpoint, status])
        .inc();
    GITHUB_REQUEST_DURATION_SECONDS
        .with_label_values(&[endpoint])
        .observe(elapsed.as_secs_f64());
}
