pub mod error;
pub mod images;
pub mod services;
pub mod text_chat;
pub mod upload;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::metrics;
use crate::routing::AppState;

pub fn router(state: AppState, server: &ServerConfig) -> Router {
    Router::new()
        .route("/", get(services::root))
        .route("/api/services", get(services::list))
        .route("/api/chat", post(images::chat))
        .route("/api/generate", post(images::generate))
        .route("/api/text_chat", post(text_chat::text_chat))
        .route("/api/upload", post(upload::upload))
        .route("/healthz", get(|| async { "ok" }))
        .route("/metrics", get(metrics::metrics_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(server.max_body_bytes))
        .layer(cors_layer(server.allowed_origins.as_deref()))
        .layer(TraceLayer::new_for_http())
}

/// Credentials are allowed, so "any origin" mirrors the caller's origin
/// instead of answering `*`.
fn cors_layer(origins: Option<&[String]>) -> CorsLayer {
    let Some(origins) = origins else {
        return CorsLayer::very_permissive();
    };
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}
