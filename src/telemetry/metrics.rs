//! Prometheus recorder and metric descriptions

use anyhow::{Context, Result};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Latency buckets in seconds, shared by HTTP, gRPC and cache histograms.
const LATENCY_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
];

pub fn install_prometheus_recorder() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .set_buckets(LATENCY_BUCKETS)
        .context("failed to set histogram buckets")?
        .install_recorder()
        .context("failed to install Prometheus recorder")
}

/// Register HELP/TYPE lines and seed counters that only move on rare paths,
/// so every series is visible from startup.
pub fn describe_metrics() {
    describe_counter!("identity_http_requests_total", "Total number of HTTP requests");
    describe_histogram!(
        "identity_http_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    describe_gauge!(
        "identity_http_requests_in_flight",
        "Number of HTTP requests currently being processed"
    );

    describe_counter!(
        "identity_grpc_requests_total",
        "Total number of gRPC requests by service, method and status code"
    );
    describe_histogram!(
        "identity_grpc_request_duration_seconds",
        "gRPC request duration in seconds"
    );

    describe_counter!(
        "identity_cache_operations_total",
        "Cache operations by outcome (hit/miss/ok/error)"
    );
    describe_histogram!(
        "identity_cache_operation_duration_seconds",
        "Cache operation duration in seconds"
    );

    describe_counter!("identity_auth_login_total", "Login attempts by outcome");

    counter!("identity_auth_login_total", "result" => "success").absolute(0);
    counter!("identity_auth_login_total", "result" => "failure").absolute(0);
    counter!("identity_cache_operations_total", "operation" => "get", "result" => "hit").absolute(0);
    counter!("identity_cache_operations_total", "operation" => "get", "result" => "miss").absolute(0);
    gauge!("identity_http_requests_in_flight").set(0.0);
}
