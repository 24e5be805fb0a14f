//! Metrics definitions for the Meeting Coordinator.
//!
//! All metrics follow Prometheus naming conventions:
//! - `coord_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `event`: closed set of signaling event names (~30 values)
//! - `kind`: error kinds from `CoordinatorError::kind` (8 values)
//! - `actor_type`: 2 values (meeting, connection)

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus recorder and return the handle used to render
/// `/metrics`.
///
/// Must be called before any metrics are recorded. Event latency buckets
/// target p99 < 10ms for in-memory signaling work.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("coord_event".to_string()),
            &[
                0.0001, 0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250,
            ],
        )
        .map_err(|e| format!("Failed to set event latency buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("coord_http".to_string()),
            &[0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000],
        )
        .map_err(|e| format!("Failed to set HTTP latency buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

// ============================================================================
// Gauges
// ============================================================================

/// Metric: `coord_meetings_active`
pub fn set_meetings_active(count: u64) {
    // u64 to f64 conversion is safe for realistic counts (< 2^53)
    #[allow(clippy::cast_precision_loss)]
    gauge!("coord_meetings_active").set(count as f64);
}

/// Metric: `coord_connections_active`
pub fn set_connections_active(count: u64) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("coord_connections_active").set(count as f64);
}

/// Metric: `coord_participants_active`
pub fn set_participants_active(count: u64) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("coord_participants_active").set(count as f64);
}

/// Set the mailbox depth for an actor type.
///
/// Metric: `coord_actor_mailbox_depth`
/// Labels: `actor_type`
pub fn set_actor_mailbox_depth(actor_type: &str, depth: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("coord_actor_mailbox_depth", "actor_type" => actor_type.to_string())
        .set(depth as f64);
}

// ============================================================================
// Counters and histograms
// ============================================================================

/// Record one handled signaling event and its processing time.
///
/// Metric: `coord_events_total`, `coord_event_latency_seconds`
/// Labels: `event`
pub fn record_event(event: &'static str, duration: Duration) {
    counter!("coord_events_total", "event" => event).increment(1);
    histogram!("coord_event_latency_seconds", "event" => event).record(duration.as_secs_f64());
}

/// Record an action rejected with an error notification.
///
/// Metric: `coord_action_errors_total`
/// Labels: `kind`
pub fn record_action_error(kind: &'static str) {
    counter!("coord_action_errors_total", "kind" => kind).increment(1);
}

/// Record an outbound message dropped because a connection queue was full
/// or closed.
///
/// Metric: `coord_messages_dropped_total`
/// Labels: `actor_type`
pub fn record_message_dropped(actor_type: &'static str) {
    counter!("coord_messages_dropped_total", "actor_type" => actor_type).increment(1);
}

/// Metric: `coord_actor_panics_total`
///
/// Any non-zero value indicates a bug.
pub fn record_actor_panic(actor_type: &'static str) {
    counter!("coord_actor_panics_total", "actor_type" => actor_type).increment(1);
}

/// Record a connection closed for missing heartbeats.
///
/// Metric: `coord_heartbeat_timeouts_total`
pub fn record_heartbeat_timeout() {
    counter!("coord_heartbeat_timeouts_total").increment(1);
}

/// Record HTTP request completion.
///
/// Metric: `coord_http_requests_total`, `coord_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("coord_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("coord_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Collapse dynamic path segments so meeting ids never become labels.
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/api/create-meeting" => "/api/create-meeting",
        "/api/ice-servers" => "/api/ice-servers",
        "/ws" => "/ws",
        p if p.starts_with("/api/meeting/") => "/api/meeting/{id}",
        _ => "/other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The metrics facade records to a no-op recorder when none is installed,
    // so these only exercise the recording paths.

    #[test]
    fn test_gauges() {
        set_meetings_active(0);
        set_meetings_active(12);
        set_connections_active(40);
        set_participants_active(38);
        set_actor_mailbox_depth("meeting", 5);
        set_actor_mailbox_depth("connection", 64);
    }

    #[test]
    fn test_counters_and_histograms() {
        record_event("join-meeting", Duration::from_micros(120));
        record_event("offer", Duration::from_micros(15));
        record_action_error("FORBIDDEN");
        record_message_dropped("connection");
        record_actor_panic("meeting");
        record_heartbeat_timeout();
        record_http_request("POST", "/api/create-meeting", 200, Duration::from_millis(3));
    }

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(normalize_endpoint("/api/create-meeting"), "/api/create-meeting");
        assert_eq!(normalize_endpoint("/api/meeting/ABCD1234"), "/api/meeting/{id}");
        assert_eq!(normalize_endpoint("/api/ice-servers"), "/api/ice-servers");
        assert_eq!(normalize_endpoint("/favicon.ico"), "/other");
    }

    #[test]
    fn test_categorize_status_code() {
        assert_eq!(categorize_status_code(200), "success");
        assert_eq!(categorize_status_code(404), "error");
        assert_eq!(categorize_status_code(504), "timeout");
    }
}
