//! Prometheus metrics exposition
//!
//! Registers and exposes the process-wide series:
//!
//! - `http_requests_total` (counter): labels `method`, `route`, `status`
//! - `http_response_time_ms` (histogram): labels `method`, `route`, `status`
//! - `http_errors_total` (counter): labels `method`, `route`, `status`
//! - `github_upstream_requests_total` (counter): label `outcome`
//! - `github_token_rotations_total` (counter)
//! - `github_rate_limit_remaining` (gauge)

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Histogram buckets in milliseconds, 5ms to 10s. The upper end matches the
/// default upstream timeout, so timed-out requests land in the last bucket.
const RESPONSE_TIME_BUCKETS_MS: &[f64] = &[
    5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0,
];

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// Configures `http_response_time_ms` with explicit buckets so it renders as
/// a Prometheus histogram (with `_bucket` lines for `histogram_quantile()`
/// queries) rather than the default summary.
///
/// The handle's `render()` method produces the Prometheus text exposition
/// format suitable for serving on a `/metrics` endpoint.
pub fn install_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Full("http_response_time_ms".to_string()),
            RESPONSE_TIME_BUCKETS_MS,
        )
        .expect("failed to set histogram buckets")
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Record a completed request with method, route, and status labels.
pub fn record_http_request(method: &str, route: &str, status: u16, duration_ms: f64) {
    let status_str = status.to_string();
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status_str.clone()
    )
    .increment(1);
    metrics::histogram!(
        "http_response_time_ms",
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status_str.clone()
    )
    .record(duration_ms);
    if status >= 400 {
        metrics::counter!(
            "http_errors_total",
            "method" => method.to_string(),
            "route" => route.to_string(),
            "status" => status_str
        )
        .increment(1);
    }
}

/// Record the outcome of one GitHub fetch (after any rotation retry).
pub fn record_upstream_outcome(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    metrics::counter!("github_upstream_requests_total", "outcome" => outcome).increment(1);
}

/// Record one token rotation triggered by an upstream 403.
pub fn record_rotation() {
    metrics::counter!("github_token_rotations_total").increment(1);
}

/// Update the rate-limit gauge from the latest upstream response.
pub fn set_rate_limit_remaining(remaining: u64) {
    metrics::gauge!("github_rate_limit_remaining").set(remaining as f64);
}
