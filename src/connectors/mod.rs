use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{Map, Value};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

pub mod chat;
pub mod dalle;
pub mod doubao;
pub mod gemini;
pub mod stability;

use crate::core::entities::GeneratedImage;
use crate::registry::ServiceId;

const ERROR_BODY_LIMIT: usize = 512;

/// One image provider behind a uniform call. `Options` is the provider's own
/// option set, so callers cannot hand one provider another's parameters.
#[async_trait::async_trait]
pub trait ImageConnector: Send + Sync {
    type Options: Send + 'static;

    fn id(&self) -> ServiceId;
    fn display_name(&self) -> &'static str;
    fn model(&self) -> &str;
    fn is_configured(&self) -> bool;

    async fn generate(
        &self,
        prompt: &str,
        options: Self::Options,
    ) -> Result<GeneratedImage, ConnectorError>;
}

#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("{0} API key not configured")]
    NotConfigured(&'static str),
    #[error("auth error: {0}")]
    Auth(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("upstream error (status {status}): {message}")]
    Upstream { status: u16, message: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("upstream timeout")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl ConnectorError {
    /// Stable machine-readable code for response bodies and metrics.
    pub fn code(&self) -> &'static str {
        match self {
            ConnectorError::NotConfigured(_) => "not_configured",
            ConnectorError::Auth(_) => "auth_error",
            ConnectorError::RateLimited(_) => "rate_limited",
            ConnectorError::Rejected(_) => "invalid_request",
            ConnectorError::Upstream { .. } => "upstream_error",
            ConnectorError::InvalidResponse(_) => "invalid_response",
            ConnectorError::Timeout => "timeout",
            ConnectorError::Transport(_) => "transport_error",
            ConnectorError::Internal(_) => "internal_error",
        }
    }

    /// Failures the provider reported about this request. Everything else
    /// (network trouble, our own bugs) is unexpected.
    pub fn is_expected(&self) -> bool {
        !matches!(
            self,
            ConnectorError::Timeout | ConnectorError::Transport(_) | ConnectorError::Internal(_)
        )
    }

    pub fn from_status(provider: &str, status: StatusCode, body: &str) -> Self {
        let detail = format!("{provider}: {}", provider_error_message(body));
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ConnectorError::Auth(detail),
            StatusCode::TOO_MANY_REQUESTS => ConnectorError::RateLimited(detail),
            StatusCode::BAD_REQUEST
            | StatusCode::NOT_FOUND
            | StatusCode::PAYLOAD_TOO_LARGE
            | StatusCode::UNPROCESSABLE_ENTITY => ConnectorError::Rejected(detail),
            _ => ConnectorError::Upstream {
                status: status.as_u16(),
                message: detail,
            },
        }
    }
}

impl From<reqwest::Error> for ConnectorError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ConnectorError::Timeout
        } else {
            // The URL can carry a query-string API key.
            ConnectorError::Transport(e.without_url().to_string())
        }
    }
}

pub fn build_http_client(timeout: Duration) -> Result<Client, ConnectorError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ConnectorError::Internal(e.to_string()))
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Sends the request and parses a JSON body, turning non-2xx statuses into
/// classified errors.
pub(crate) async fn send_json(provider: &str, rb: RequestBuilder) -> Result<Value, ConnectorError> {
    let resp = rb.send().await?;
    let status = resp.status();
    let text = resp.text().await?;
    if !status.is_success() {
        tracing::warn!(provider, status = status.as_u16(), "provider returned an error status");
        return Err(ConnectorError::from_status(provider, status, &text));
    }
    serde_json::from_str(&text).map_err(|e| {
        ConnectorError::InvalidResponse(format!("{provider} returned invalid JSON: {e}"))
    })
}

/// Pulls the human-readable message out of the error shapes providers use.
pub(crate) fn provider_error_message(body: &str) -> String {
    if let Ok(v) = serde_json::from_str::<Value>(body) {
        let candidates = [
            v.pointer("/error/message"),
            v.get("message"),
            v.get("error").filter(|e| e.is_string()),
            v.pointer("/errors/0"),
            v.get("name"),
        ];
        if let Some(msg) = candidates
            .into_iter()
            .flatten()
            .find_map(|x| x.as_str())
            .filter(|s| !s.trim().is_empty())
        {
            return msg.to_string();
        }
    }
    truncate(body.trim(), ERROR_BODY_LIMIT)
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut out: String = text.chars().take(limit).collect();
    out.push_str("...");
    out
}

pub(crate) fn base_metadata(model: &str) -> Map<String, Value> {
    let mut meta = Map::new();
    meta.insert("model".into(), Value::String(model.to_string()));
    meta.insert("request_id".into(), Value::String(Uuid::new_v4().to_string()));
    meta.insert(
        "created".into(),
        Value::from(OffsetDateTime::now_utc().unix_timestamp()),
    );
    meta
}

pub(crate) fn usable_key(key: &Option<String>) -> Option<&str> {
    key.as_deref().filter(|k| !k.trim().is_empty())
}

pub(crate) fn non_empty_str<'a>(v: &'a Value, pointer: &str) -> Option<&'a str> {
    v.pointer(pointer)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        let e = ConnectorError::from_status("dalle", StatusCode::UNAUTHORIZED, "{}");
        assert_eq!(e.code(), "auth_error");
        let e = ConnectorError::from_status("dalle", StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert_eq!(e.code(), "rate_limited");
        assert!(e.to_string().contains("slow down"));
        let e = ConnectorError::from_status("dalle", StatusCode::BAD_REQUEST, "");
        assert_eq!(e.code(), "invalid_request");
        let e = ConnectorError::from_status("dalle", StatusCode::BAD_GATEWAY, "");
        assert!(matches!(e, ConnectorError::Upstream { status: 502, .. }));
        assert!(e.is_expected());
        assert!(!ConnectorError::Timeout.is_expected());
    }

    #[test]
    fn error_message_shapes() {
        assert_eq!(
            provider_error_message(r#"{"error":{"message":"bad key","type":"x"}}"#),
            "bad key"
        );
        assert_eq!(provider_error_message(r#"{"message":"nope"}"#), "nope");
        assert_eq!(provider_error_message(r#"{"error":"flat"}"#), "flat");
        assert_eq!(provider_error_message(r#"{"errors":["first"]}"#), "first");
        assert_eq!(provider_error_message("plain text"), "plain text");
        let long = "x".repeat(600);
        assert_eq!(provider_error_message(&long).len(), ERROR_BODY_LIMIT + 3);
    }

    #[test]
    fn url_joining() {
        assert_eq!(join_url("https://a/v1/", "/images"), "https://a/v1/images");
        assert_eq!(join_url("https://a/v1", "images"), "https://a/v1/images");
    }

    #[test]
    fn metadata_has_model_and_id() {
        let meta = base_metadata("m1");
        assert_eq!(meta["model"], "m1");
        assert!(meta["request_id"].as_str().is_some());
        assert!(meta["created"].as_i64().is_some());
    }
}
