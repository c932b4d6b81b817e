use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::connectors::ConnectorError;
use crate::core::reference::ReferenceImageError;
use crate::registry::UnknownService;

/// Errors surfaced as HTTP errors with a `{detail}` body.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Internal(String),
}

impl From<UnknownService> for ApiError {
    fn from(e: UnknownService) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<ReferenceImageError> for ApiError {
    fn from(e: ReferenceImageError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<ConnectorError> for ApiError {
    fn from(e: ConnectorError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = serde_json::json!({ "detail": self.to_string() });
        (code, Json(body)).into_response()
    }
}
