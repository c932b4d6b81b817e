use reqwest::{header, Client};
use serde_json::{json, Value};

use crate::config::ProviderSettings;
use crate::connectors::{join_url, send_json, usable_key, ConnectorError};
use crate::core::entities::ChatCompletion;

/// OpenAI-compatible chat completions. Messages are forwarded untouched, so
/// multimodal content parts reach the provider as the client sent them.
pub struct ChatConnector {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl ChatConnector {
    pub fn new(client: Client, settings: &ProviderSettings) -> Self {
        if !settings.has_credentials() {
            tracing::warn!("no chat API key configured (CHAT_API_KEY, GEMINI_API_KEY or OPENAI_API_KEY)");
        }
        Self {
            client,
            api_key: settings.api_key.clone(),
            base_url: settings.base_url.clone(),
            model: settings.model.clone(),
        }
    }

    pub fn display_name(&self) -> &'static str {
        "AI Chat"
    }

    pub fn is_configured(&self) -> bool {
        usable_key(&self.api_key).is_some()
    }

    pub async fn chat_completion(
        &self,
        messages: Vec<Value>,
        model: Option<&str>,
    ) -> Result<ChatCompletion, ConnectorError> {
        let Some(key) = usable_key(&self.api_key) else {
            return Err(ConnectorError::NotConfigured("Chat"));
        };
        let model = model
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(&self.model);

        tracing::debug!(model, messages = messages.len(), "forwarding chat completion");
        let body = json!({ "model": model, "messages": messages });
        let rb = self
            .client
            .post(join_url(&self.base_url, "chat/completions"))
            .header(header::CONTENT_TYPE, "application/json")
            .bearer_auth(key)
            .json(&body);

        let v = send_json("Chat", rb).await?;
        Self::parse(v, model)
    }

    fn parse(v: Value, requested_model: &str) -> Result<ChatCompletion, ConnectorError> {
        let content = v
            .pointer("/choices/0/message/content")
            .ok_or_else(|| ConnectorError::InvalidResponse("chat response has no choices".into()))?;

        // Some gateways return content as an array of text parts.
        let message = match content {
            Value::String(s) => s.clone(),
            Value::Array(parts) => parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join(""),
            Value::Null => String::new(),
            other => other.to_string(),
        };

        Ok(ChatCompletion {
            success: true,
            message,
            model: v
                .get("model")
                .and_then(Value::as_str)
                .unwrap_or(requested_model)
                .to_string(),
            usage: v.get("usage").filter(|u| !u.is_null()).cloned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_string_content() {
        let v = json!({
            "model": "gpt-5-2025-08-07",
            "choices": [{"message": {"role": "assistant", "content": "Hello!"}}],
            "usage": {"total_tokens": 12}
        });
        let out = ChatConnector::parse(v, "ignored").unwrap();
        assert!(out.success);
        assert_eq!(out.message, "Hello!");
        assert_eq!(out.model, "gpt-5-2025-08-07");
        assert_eq!(out.usage.unwrap()["total_tokens"], 12);
    }

    #[test]
    fn joins_text_parts_and_defaults_model() {
        let v = json!({
            "choices": [{"message": {"content": [{"type": "text", "text": "a"}, {"type": "text", "text": "b"}]}}]
        });
        let out = ChatConnector::parse(v, "fallback").unwrap();
        assert_eq!(out.message, "ab");
        assert_eq!(out.model, "fallback");
        assert!(out.usage.is_none());
    }

    #[test]
    fn missing_choices_is_invalid() {
        let err = ChatConnector::parse(json!({"id": "x"}), "m").unwrap_err();
        assert_eq!(err.code(), "invalid_response");
    }
}
