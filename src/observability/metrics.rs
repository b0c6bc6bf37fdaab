//! Metrics collection and exposition.
//!
//! # Metrics
//! - `router_requests_total` (counter): requests by method, status, route
//! - `router_request_duration_seconds` (histogram): latency distribution
//! - `router_resolutions_total` (counter): handle resolutions by policy, outcome
//! - `router_live_sessions` (gauge): live name bindings in the registry
//! - `router_instance_active_requests` (gauge): in-flight forwards per instance

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter, serving scrapes on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record a completed request.
pub fn record_request(method: &str, status: u16, route: &str, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("route", route.to_string()),
    ];
    ::metrics::counter!("router_requests_total", &labels).increment(1);
    ::metrics::histogram!("router_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}

/// Record the number of live name bindings.
pub fn record_live_sessions(live: usize) {
    ::metrics::gauge!("router_live_sessions").set(live as f64);
}

/// Record the number of in-flight forwards to `instance`.
pub fn record_instance_load(instance: &str, active: usize) {
    ::metrics::gauge!("router_instance_active_requests", "instance" => instance.to_string())
        .set(active as f64);
}

/// Record the outcome of an instance handle resolution.
pub fn record_resolution(policy: &'static str, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    ::metrics::counter!("router_resolutions_total", "policy" => policy, "outcome" => outcome)
        .increment(1);
}
