use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total HTTP requests served. Labels: method, path, status.
pub const REQUESTS_TOTAL: &str = "frontdesk_requests_total";

/// Histogram: request latency in seconds. Labels: method, path.
pub const REQUEST_DURATION_SECONDS: &str = "frontdesk_request_duration_seconds";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: operator sessions currently held in the store.
pub const SESSIONS_ACTIVE: &str = "frontdesk_sessions_active";

/// Counter: login and token failures.
pub const AUTH_FAILURES_TOTAL: &str = "frontdesk_auth_failures_total";

/// Counter: reservation writes refused because the room was taken.
pub const RESERVATION_CONFLICTS_TOTAL: &str = "frontdesk_reservation_conflicts_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "frontdesk_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (mutations per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "frontdesk_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
