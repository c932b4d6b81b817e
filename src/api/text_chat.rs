use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::error::ApiError;
use crate::routing::AppState;

#[derive(Debug, Deserialize)]
pub struct TextChatRequest {
    pub messages: Vec<Value>,
    #[serde(default)]
    pub model: Option<String>,
}

pub async fn text_chat(
    State(app): State<AppState>,
    Json(req): Json<TextChatRequest>,
) -> Result<Response, ApiError> {
    tracing::debug!(messages = req.messages.len(), "text chat request");
    match app.chat(req.messages, req.model.as_deref()).await {
        Ok(completion) => Ok(Json(completion).into_response()),
        Err(e) if e.is_expected() => Ok(Json(json!({
            "success": false,
            "message": e.to_string(),
            "error": e.code(),
        }))
        .into_response()),
        Err(e) => Err(e.into()),
    }
}
