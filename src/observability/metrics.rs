//! Lifecycle metrics.
//!
//! Without a recorder installed all calls are no-ops; the daemon installs the
//! Prometheus exporter through [`init_metrics`].
//!
//! # Metrics
//! - `muxlisten_bind_total` (counter): bind attempts by `transport`, `result`
//! - `muxlisten_serve_errors_total` (counter): serve loop failures by `protocol`
//! - `muxlisten_shutdown_timeouts_total` (counter): drains that hit the deadline
//! - `muxlisten_connections_total` (counter): accepted connections by `protocol`

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::config::Protocol;

/// Labels: `transport` ("inet" | "unix"), `result` ("ok" | "error").
pub const BIND_TOTAL: &str = "muxlisten_bind_total";

/// Labels: `protocol`.
pub const SERVE_ERRORS_TOTAL: &str = "muxlisten_serve_errors_total";

/// Labels: `protocol`.
pub const SHUTDOWN_TIMEOUTS_TOTAL: &str = "muxlisten_shutdown_timeouts_total";

/// Labels: `protocol`.
pub const CONNECTIONS_TOTAL: &str = "muxlisten_connections_total";

pub fn record_bind(transport: &'static str, ok: bool) {
    let result = if ok { "ok" } else { "error" };
    metrics::counter!(BIND_TOTAL, "transport" => transport, "result" => result).increment(1);
}

pub fn record_serve_error(protocol: Protocol) {
    metrics::counter!(SERVE_ERRORS_TOTAL, "protocol" => protocol.as_str()).increment(1);
}

pub fn record_shutdown_timeout(protocol: Protocol) {
    metrics::counter!(SHUTDOWN_TIMEOUTS_TOTAL, "protocol" => protocol.as_str()).increment(1);
}

pub fn record_connection(protocol: Protocol) {
    metrics::counter!(CONNECTIONS_TOTAL, "protocol" => protocol.as_str()).increment(1);
}

/// Installs the global Prometheus recorder with a scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}
