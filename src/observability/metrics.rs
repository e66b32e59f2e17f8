//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define unzip and proxy metrics
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `unzip_requests_total` (counter): pipeline runs by outcome
//! - `unzip_inflated_bytes` (histogram): size of inflated bodies
//! - `proxy_requests_total` (counter): proxied requests by status
//! - `proxy_request_duration_seconds` (histogram): latency distribution
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade and is a no-op until an
//!   exporter is installed
//! - Labels are small fixed sets (outcome, status)

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Count one pipeline run.
pub fn record_unzip(outcome: &'static str) {
    metrics::counter!("unzip_requests_total", "outcome" => outcome).increment(1);
}

/// Record the size of an inflated body.
pub fn record_inflated_bytes(len: usize) {
    metrics::histogram!("unzip_inflated_bytes").record(len as f64);
}

/// Count a proxied request and its latency.
pub fn record_request(status: u16, start: Instant) {
    metrics::counter!("proxy_requests_total", "status" => status.to_string()).increment(1);
    metrics::histogram!("proxy_request_duration_seconds").record(start.elapsed().as_secs_f64());
}
