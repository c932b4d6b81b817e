use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec, TextEncoder,
};

lazy_static! {
    /// Relayed requests by route, service and outcome
    pub static ref REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "relay_requests_total",
        "Total number of relayed requests",
        &["route", "service", "outcome"]
    )
    .unwrap();

    /// Time spent waiting on the provider, in seconds
    pub static ref REQUEST_DURATION: HistogramVec = register_histogram_vec!(
        "relay_request_duration_seconds",
        "Provider call duration in seconds",
        &["route", "service"],
        vec![0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0]
    )
    .unwrap();

    /// Provider failures by error code
    pub static ref PROVIDER_ERRORS: IntCounterVec = register_int_counter_vec!(
        "relay_provider_errors_total",
        "Total number of provider failures",
        &["service", "code"]
    )
    .unwrap();
}

pub fn observe(route: &str, service: &str, outcome: &str, elapsed_secs: f64) {
    REQUESTS_TOTAL
        .with_label_values(&[route, service, outcome])
        .inc();
    REQUEST_DURATION
        .with_label_values(&[route, service])
        .observe(elapsed_secs);
}

pub fn provider_error(service: &str, code: &str) {
    PROVIDER_ERRORS.with_label_values(&[service, code]).inc();
}

pub fn export_metrics() -> prometheus::Result<String> {
    TextEncoder::new().encode_to_string(&prometheus::gather())
}

pub async fn metrics_handler() -> Response {
    match export_metrics() {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
