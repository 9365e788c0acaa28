//! Prometheus metrics
//!
//! Recording goes through the `metrics` macros at the call sites; without
//! an installed exporter they are no-ops.

use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

pub const API_REQUESTS: &str = "longshot_api_requests_total";
pub const API_RETRIES: &str = "longshot_api_retries_total";
pub const API_REQUEST_LATENCY: &str = "longshot_api_request_latency_ms";
pub const RECORDS_WRITTEN: &str = "longshot_records_written_total";
pub const COLLECTOR_FAILURES: &str = "longshot_collector_failures_total";

/// Start a Prometheus scrape endpoint on `0.0.0.0:port`
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics exporter: {}", e))?;

    describe_metrics();
    tracing::info!(addr = %addr, "Prometheus metrics exporter started");

    Ok(())
}

fn describe_metrics() {
    describe_counter!(API_REQUESTS, "API responses received, by HTTP status");
    describe_counter!(API_RETRIES, "API attempts retried after a transient failure");
    describe_histogram!(
        API_REQUEST_LATENCY,
        Unit::Milliseconds,
        "Time from sending a request to receiving its status"
    );
    describe_counter!(RECORDS_WRITTEN, "Records written to storage, by kind");
    describe_counter!(COLLECTOR_FAILURES, "Identifiers whose fetch failed");
}
