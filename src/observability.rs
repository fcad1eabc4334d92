use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total HTTP requests. Labels: method, route, status.
pub const HTTP_REQUESTS_TOTAL: &str = "roomboard_http_requests_total";

/// Histogram: HTTP request latency in seconds. Labels: method, route.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "roomboard_http_request_duration_seconds";

/// Counter: admin requests refused for a missing or wrong token.
pub const AUTH_FAILURES_TOTAL: &str = "roomboard_auth_failures_total";

/// Counter: import rows processed. Labels: outcome (accepted, rejected).
pub const IMPORT_ROWS_TOTAL: &str = "roomboard_import_rows_total";

/// Counter: temporary bookings removed by the reaper.
pub const BOOKINGS_PURGED_TOTAL: &str = "roomboard_bookings_purged_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: registered rooms.
pub const ROOMS_TOTAL: &str = "roomboard_rooms_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "roomboard_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "roomboard_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    match metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
    {
        Ok(()) => tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics"),
        Err(e) => tracing::error!("failed to install Prometheus metrics exporter: {e}"),
    }
}

/// Route template for metrics labels (`/v1/admin/rooms/{room}` rather than
/// the concrete path) so label cardinality stays bounded.
pub fn route_label(request: &Request) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| "unmatched".to_string(), |p| p.as_str().to_string())
}

/// Middleware recording request count and latency.
pub async fn track_requests(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let route = route_label(&request);
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    metrics::counter!(HTTP_REQUESTS_TOTAL, "method" => method.clone(), "route" => route.clone(), "status" => status)
        .increment(1);
    metrics::histogram!(HTTP_REQUEST_DURATION_SECONDS, "method" => method, "route" => route)
        .record(started.elapsed().as_secs_f64());
    response
}
