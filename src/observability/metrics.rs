//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by outcome kind and status
//! - `proxy_request_duration_seconds` (histogram): latency by outcome kind
//!
//! Outcome kinds are `markup`, `binary`, or an error kind such as
//! `upstream_timeout`.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one finished proxy request.
pub fn record_request(kind: &'static str, status: u16, start_time: Instant) {
    metrics::counter!(
        "proxy_requests_total",
        "kind" => kind,
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("proxy_request_duration_seconds", "kind" => kind)
        .record(start_time.elapsed().as_secs_f64());
}
