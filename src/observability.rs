use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: HTTP requests served. Labels: route, status.
pub const HTTP_REQUESTS_TOTAL: &str = "innkeep_http_requests_total";

/// Histogram: HTTP request latency in seconds. Labels: route.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "innkeep_http_request_duration_seconds";

/// Counter: requests rejected by the rate limiter. Labels: action.
pub const RATE_LIMITED_TOTAL: &str = "innkeep_rate_limited_total";

/// Counter: requests rejected because too many were already in flight.
pub const REQUESTS_REJECTED_TOTAL: &str = "innkeep_requests_rejected_total";

// ── Reservation lifecycle ───────────────────────────────────────

/// Counter: reservations created. Labels: status (PENDING or CONFIRMED).
pub const RESERVATIONS_CREATED_TOTAL: &str = "innkeep_reservations_created_total";

/// Counter: PENDING reservations confirmed by staff.
pub const RESERVATIONS_CONFIRMED_TOTAL: &str = "innkeep_reservations_confirmed_total";

/// Counter: reservations cancelled.
pub const RESERVATIONS_CANCELLED_TOTAL: &str = "innkeep_reservations_cancelled_total";

/// Counter: requests or confirmations refused because the dates were held.
pub const BOOKING_CONFLICTS_TOTAL: &str = "innkeep_booking_conflicts_total";

/// Counter: notification attempts. Labels: status.
pub const NOTIFICATIONS_TOTAL: &str = "innkeep_notifications_total";

/// Counter: transitions the notification dispatcher fell behind on.
pub const NOTIFICATIONS_LAGGED_TOTAL: &str = "innkeep_notifications_lagged_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: number of loaded tenant engines.
pub const TENANTS_ACTIVE: &str = "innkeep_tenants_active";

/// Counter: admin requests refused for missing or insufficient role.
pub const AUTH_FAILURES_TOTAL: &str = "innkeep_auth_failures_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "innkeep_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "innkeep_wal_flush_batch_size";

/// Counter: WAL compactions completed.
pub const WAL_COMPACTIONS_TOTAL: &str = "innkeep_wal_compactions_total";

/// Install the Prometheus exporter on `port`. No-op if `port` is None.
pub fn init(port: Option<u16>) -> Result<(), BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
