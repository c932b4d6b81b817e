use reqwest::{header, Client};
use serde_json::{json, Value};

use crate::config::ProviderSettings;
use crate::connectors::{
    base_metadata, join_url, non_empty_str, send_json, usable_key, ConnectorError,
    ImageConnector,
};
use crate::core::entities::{DalleOptions, GeneratedImage, ImagePayload};
use crate::registry::ServiceId;

/// OpenAI `images/generations`.
pub struct DalleConnector {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl DalleConnector {
    pub fn new(client: Client, settings: &ProviderSettings) -> Self {
        if !settings.has_credentials() {
            tracing::warn!("OPENAI_API_KEY not configured; dalle will be unavailable");
        }
        Self {
            client,
            api_key: settings.api_key.clone(),
            base_url: settings.base_url.clone(),
            model: settings.model.clone(),
        }
    }

    fn parse(&self, v: Value, options: &DalleOptions) -> Result<GeneratedImage, ConnectorError> {
        let image = if let Some(url) = non_empty_str(&v, "/data/0/url") {
            ImagePayload::Url(url.to_string())
        } else if let Some(b64) = non_empty_str(&v, "/data/0/b64_json") {
            ImagePayload::Base64 {
                data: b64.to_string(),
                mime_type: "image/png".into(),
            }
        } else {
            return Err(ConnectorError::InvalidResponse(
                "DALL-E response contained no image".into(),
            ));
        };

        let mut metadata = base_metadata(&self.model);
        metadata.insert("size".into(), json!(options.size));
        metadata.insert("quality".into(), json!(options.quality));
        if let Some(revised) = non_empty_str(&v, "/data/0/revised_prompt") {
            metadata.insert("revised_prompt".into(), json!(revised));
        }

        Ok(GeneratedImage {
            image,
            message: None,
            metadata,
        })
    }
}

#[async_trait::async_trait]
impl ImageConnector for DalleConnector {
    type Options = DalleOptions;

    fn id(&self) -> ServiceId {
        ServiceId::Dalle
    }

    fn display_name(&self) -> &'static str {
        "DALL-E 3"
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
        options: DalleOptions,
    ) -> Result<GeneratedImage, ConnectorError> {
        let Some(key) = usable_key(&self.api_key) else {
            return Err(ConnectorError::NotConfigured("OpenAI"));
        };

        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "n": 1,
            "size": options.size,
            "quality": options.quality,
        });

        let rb = self
            .client
            .post(join_url(&self.base_url, "images/generations"))
            .header(header::CONTENT_TYPE, "application/json")
            .bearer_auth(key)
            .json(&body);

        let v = send_json("DALL-E", rb).await?;
        self.parse(v, &options)
    }
}
