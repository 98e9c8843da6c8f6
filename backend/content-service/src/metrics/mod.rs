//! Prometheus metrics for content-service.
//!
//! Exposes HTTP, feed, reaction and fan-out collectors and an HTTP handler for the
//! `/metrics` endpoint.

use actix_web::HttpResponse;
use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder,
    HistogramVec, IntCounter, IntCounterVec, TextEncoder,
};

lazy_static! {
    /// HTTP request latency segmented by method, route pattern and status.
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "content_http_request_duration_seconds",
        "HTTP request duration segmented by method, route and status",
        &["method", "route", "status"]
    )
    .expect("failed to register content_http_request_duration_seconds");

    /// Feed composition latency segmented by listing mode.
    pub static ref FEED_COMPOSE_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "content_feed_compose_duration_seconds",
        "Feed composition duration segmented by listing mode",
        &["mode"]
    )
    .expect("failed to register content_feed_compose_duration_seconds");

    /// Reaction toggles segmented by result (created/removed/error).
    pub static ref REACTION_TOGGLE_TOTAL: IntCounterVec = register_int_counter_vec!(
        "content_reaction_toggle_total",
        "Reaction toggles segmented by result",
        &["result"]
    )
    .expect("failed to register content_reaction_toggle_total");

    /// Viewers served as anonymous because the social graph was unavailable.
    pub static ref SOCIAL_CONTEXT_DEGRADED_TOTAL: IntCounter = register_int_counter!(
        "content_social_context_degraded_total",
        "Requests whose social context fell back to anonymous"
    )
    .expect("failed to register content_social_context_degraded_total");

    /// Notification deliveries segmented by event and outcome.
    pub static ref NOTIFICATION_DELIVERY_TOTAL: IntCounterVec = register_int_counter_vec!(
        "content_notification_delivery_total",
        "Notification deliveries segmented by event and outcome",
        &["event", "outcome"]
    )
    .expect("failed to register content_notification_delivery_total");

    /// Realm lookups answered from the local cache after an upstream failure.
    pub static ref REALM_CACHE_FALLBACK_TOTAL: IntCounter = register_int_counter!(
        "content_realm_cache_fallback_total",
        "Realm lookups served from the local mirror after an upstream failure"
    )
    .expect("failed to register content_realm_cache_fallback_total");
}

/// Actix handler that renders Prometheus metrics in text format.
pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
