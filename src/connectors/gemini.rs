use reqwest::{header, Client, RequestBuilder};
use serde_json::{json, Value};

use crate::config::{GeminiAuthMode, ProviderSettings};
use crate::connectors::{
    base_metadata, join_url, send_json, usable_key, ConnectorError, ImageConnector,
};
use crate::core::entities::{AspectOptions, GeneratedImage, ImagePayload, SizeTier};
use crate::registry::{ProviderOverrides, ServiceId};

/// Gemini `generateContent` with image output, usually reached through the
/// shared gateway.
pub struct GeminiConnector {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    auth_mode: GeminiAuthMode,
}

impl GeminiConnector {
    pub fn from_settings(
        client: Client,
        settings: &ProviderSettings,
        auth_mode: GeminiAuthMode,
        overrides: &ProviderOverrides,
    ) -> Self {
        let settings = overrides.apply(settings);
        Self {
            client,
            api_key: settings.api_key,
            base_url: settings.base_url,
            model: settings.model,
            auth_mode,
        }
    }

    fn endpoint(&self) -> String {
        let model = self.model.trim();
        let model = model.strip_prefix("models/").unwrap_or(model);
        join_url(
            &self.base_url,
            &format!("v1beta/models/{model}:generateContent"),
        )
    }

    fn authorize(&self, rb: RequestBuilder, key: &str) -> RequestBuilder {
        match self.auth_mode {
            GeminiAuthMode::Bearer => rb.bearer_auth(key),
            GeminiAuthMode::Header => rb.header("x-goog-api-key", key),
            GeminiAuthMode::Query => rb.query(&[("key", key)]),
        }
    }

    fn request_body(prompt: &str, options: &AspectOptions, tier: SizeTier) -> Value {
        let mut parts = vec![json!({ "text": prompt })];
        if let Some(reference) = &options.reference_image {
            parts.push(json!({
                "inline_data": {
                    "mime_type": reference.mime_type,
                    "data": reference.data,
                }
            }));
        }
        json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": {
                "responseModalities": ["TEXT", "IMAGE"],
                "imageConfig": {
                    "aspectRatio": options.aspect_ratio,
                    "imageSize": tier.as_str(),
                }
            }
        })
    }

    fn parse(
        &self,
        v: Value,
        options: &AspectOptions,
        tier: SizeTier,
    ) -> Result<GeneratedImage, ConnectorError> {
        let mut image = None;
        let mut texts = Vec::new();

        let candidates = v
            .get("candidates")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for candidate in candidates {
            let parts = candidate
                .pointer("/content/parts")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            for part in parts {
                if let Some(text) = part.get("text").and_then(Value::as_str) {
                    if !text.trim().is_empty() {
                        texts.push(text.trim().to_string());
                    }
                }
                if image.is_some() {
                    continue;
                }
                let Some(inline) = part.get("inlineData").or_else(|| part.get("inline_data")) else {
                    continue;
                };
                let data = inline.get("data").and_then(Value::as_str).unwrap_or_default();
                if data.is_empty() {
                    continue;
                }
                let mime_type = inline
                    .get("mimeType")
                    .or_else(|| inline.get("mime_type"))
                    .and_then(Value::as_str)
                    .unwrap_or("image/png");
                image = Some(ImagePayload::Base64 {
                    data: data.to_string(),
                    mime_type: mime_type.to_string(),
                });
            }
        }

        let text = (!texts.is_empty()).then(|| texts.join("\n"));

        let Some(image) = image else {
            return Err(Self::missing_image_error(&v, text));
        };

        let mut metadata = base_metadata(&self.model);
        metadata.insert("aspect_ratio".into(), json!(options.aspect_ratio));
        metadata.insert("image_size".into(), json!(tier.as_str()));
        if let ImagePayload::Base64 { mime_type, .. } = &image {
            metadata.insert("mime_type".into(), json!(mime_type));
        }
        if options.reference_image.is_some() {
            metadata.insert("reference_image".into(), json!(true));
        }

        Ok(GeneratedImage {
            image,
            message: text,
            metadata,
        })
    }

    fn missing_image_error(v: &Value, text: Option<String>) -> ConnectorError {
        if let Some(reason) = v.pointer("/promptFeedback/blockReason").and_then(Value::as_str) {
            return ConnectorError::Rejected(format!("Gemini blocked the prompt: {reason}"));
        }
        if let Some(reason) = v
            .pointer("/candidates/0/finishReason")
            .and_then(Value::as_str)
            .filter(|r| *r != "STOP")
        {
            return ConnectorError::Rejected(format!("Gemini stopped without an image: {reason}"));
        }
        match text {
            Some(text) => ConnectorError::Rejected(format!("Gemini returned no image: {text}")),
            None => ConnectorError::InvalidResponse("Gemini response contained no image".into()),
        }
    }
}

#[async_trait::async_trait]
impl ImageConnector for GeminiConnector {
    type Options = AspectOptions;

    fn id(&self) -> ServiceId {
        ServiceId::GeminiImage
    }

    fn display_name(&self) -> &'static str {
        "Gemini Image"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn is_configured(&self) -> bool {
        usable_key(&self.api_key).is_some()
    }

    async fn generate(
        &self,
        prompt: &str,
        options: AspectOptions,
    ) -> Result<GeneratedImage, ConnectorError> {
        let Some(key) = usable_key(&self.api_key) else {
            return Err(ConnectorError::NotConfigured("Gemini"));
        };

        let tier = options.size_tier().unwrap_or(SizeTier::OneK);
        let body = Self::request_body(prompt, &options, tier);
        let rb = self
            .client
            .post(self.endpoint())
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body);
        let rb = self.authorize(rb, key);

        let v = send_json("Gemini", rb).await?;
        self.parse(v, &options, tier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reference::ReferenceImage;

    fn connector(model: &str) -> GeminiConnector {
        GeminiConnector::from_settings(
            Client::new(),
            &ProviderSettings {
                api_key: Some("gm-key".into()),
                base_url: "https://gw.example/".into(),
                model: model.into(),
            },
            GeminiAuthMode::Bearer,
            &ProviderOverrides::default(),
        )
    }

    #[test]
    fn endpoint_strips_models_prefix() {
        assert_eq!(
            connector("models/gemini-2.5-flash-image").endpoint(),
            "https://gw.example/v1beta/models/gemini-2.5-flash-image:generateContent"
        );
    }

    #[test]
    fn body_carries_image_config_and_reference() {
        let opts = AspectOptions {
            aspect_ratio: "16:9".into(),
            image_size: "2k".into(),
            reference_image: Some(ReferenceImage::parse("data:image/jpeg;base64,aGk=").unwrap()),
        };
        let body = GeminiConnector::request_body("a fox", &opts, opts.size_tier().unwrap());
        assert_eq!(body["generationConfig"]["imageConfig"]["aspectRatio"], "16:9");
        assert_eq!(body["generationConfig"]["imageConfig"]["imageSize"], "2K");
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts[0]["text"], "a fox");
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/jpeg");
        assert_eq!(parts[1]["inline_data"]["data"], "aGk=");
    }

    #[test]
    fn parses_inline_image_and_text() {
        let v = json!({
            "candidates": [{
                "content": {"parts": [
                    {"text": "Here you go"},
                    {"inlineData": {"mimeType": "image/webp", "data": "UklGRg=="}}
                ]},
                "finishReason": "STOP"
            }]
        });
        let out = connector("g")
            .parse(v, &AspectOptions::default(), SizeTier::OneK)
            .unwrap();
        assert_eq!(
            out.image,
            ImagePayload::Base64 {
                data: "UklGRg==".into(),
                mime_type: "image/webp".into()
            }
        );
        assert_eq!(out.message.as_deref(), Some("Here you go"));
        assert_eq!(out.metadata["mime_type"], "image/webp");
        assert_eq!(out.metadata["image_size"], "1K");
    }

    #[test]
    fn blocked_prompt_is_rejected() {
        let v = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        let err = connector("g")
            .parse(v, &AspectOptions::default(), SizeTier::OneK)
            .unwrap_err();
        assert_eq!(err.code(), "invalid_request");
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn empty_response_is_invalid() {
        let err = connector("g")
            .parse(json!({}), &AspectOptions::default(), SizeTier::OneK)
            .unwrap_err();
        assert_eq!(err.code(), "invalid_response");
    }
}
