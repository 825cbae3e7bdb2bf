use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: HTTP requests served. Labels: route, status.
pub const HTTP_REQUESTS_TOTAL: &str = "staybook_http_requests_total";

/// Histogram: HTTP handler latency in seconds. Labels: route.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "staybook_http_request_duration_seconds";

/// Counter: booking mutations. Labels: op, outcome.
pub const BOOKING_OPS_TOTAL: &str = "staybook_booking_ops_total";

/// Counter: requests rejected for overlapping an existing booking.
pub const BOOKING_CONFLICTS_TOTAL: &str = "staybook_booking_conflicts_total";

/// Counter: quotes served from the flat fallback rate.
pub const PRICING_FALLBACKS_TOTAL: &str = "staybook_pricing_fallbacks_total";

/// Counter: event notifications that failed to publish.
pub const PUBLISH_FAILURES_TOTAL: &str = "staybook_publish_failures_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: rooms loaded.
pub const ROOMS_ACTIVE: &str = "staybook_rooms_active";

/// Counter: availability cache lookups. Labels: result (hit|miss).
pub const CACHE_LOOKUPS_TOTAL: &str = "staybook_cache_lookups_total";

/// Counter: digital keys expired by the reaper.
pub const KEYS_EXPIRED_TOTAL: &str = "staybook_keys_expired_total";

/// Histogram: journal group-commit flush duration in seconds.
pub const JOURNAL_FLUSH_DURATION_SECONDS: &str = "staybook_journal_flush_duration_seconds";

/// Histogram: journal group-commit batch size (events per flush).
pub const JOURNAL_FLUSH_BATCH_SIZE: &str = "staybook_journal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
