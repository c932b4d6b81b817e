use reqwest::{header, Client};
use serde_json::{json, Value};

use crate::config::ProviderSettings;
use crate::connectors::{
    base_metadata, join_url, non_empty_str, send_json, usable_key, ConnectorError,
    ImageConnector,
};
use crate::core::entities::{GeneratedImage, ImagePayload, StabilityOptions};
use crate::registry::ServiceId;

const CFG_SCALE: u32 = 7;
const STEPS: u32 = 30;

/// Stability AI v1 text-to-image. The engine id plays the role of the model.
pub struct StabilityConnector {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    engine: String,
}

impl StabilityConnector {
    pub fn new(client: Client, settings: &ProviderSettings) -> Self {
        if !settings.has_credentials() {
            tracing::warn!("STABILITY_API_KEY not configured; stable-diffusion will be unavailable");
        }
        Self {
            client,
            api_key: settings.api_key.clone(),
            base_url: settings.base_url.clone(),
            engine: settings.model.clone(),
        }
    }

    fn parse(&self, v: Value, options: &StabilityOptions) -> Result<GeneratedImage, ConnectorError> {
        let artifact = v
            .pointer("/artifacts/0")
            .ok_or_else(|| ConnectorError::InvalidResponse("Stability returned no artifacts".into()))?;

        if artifact.get("finishReason").and_then(Value::as_str) == Some("CONTENT_FILTERED") {
            return Err(ConnectorError::Rejected(
                "Stability: image was blocked by the content filter".into(),
            ));
        }

        let data = non_empty_str(artifact, "/base64").ok_or_else(|| {
            ConnectorError::InvalidResponse("Stability artifact has no image data".into())
        })?;

        let mut metadata = base_metadata(&self.engine);
        metadata.insert("width".into(), json!(options.width));
        metadata.insert("height".into(), json!(options.height));
        if let Some(seed) = artifact.get("seed").filter(|s| !s.is_null()) {
            metadata.insert("seed".into(), seed.clone());
        }

        Ok(GeneratedImage {
            image: ImagePayload::Base64 {
                data: data.to_string(),
                mime_type: "image/png".into(),
            },
            message: None,
            metadata,
        })
    }
}

#[async_trait::async_trait]
impl ImageConnector for StabilityConnector {
    type Options = StabilityOptions;

    fn id(&self) -> ServiceId {
        ServiceId::StableDiffusion
    }

    fn display_name(&self) -> &'static str {
        "Stable Diffusion XL"
    }

    fn model(&self) -> &str {
        &self.engine
    }

    fn is_configured(&self) -> bool {
        usable_key(&self.api_key).is_some()
    }

    async fn generate(
        &self,
        prompt: &str,
        options: StabilityOptions,
    ) -> Result<GeneratedImage, ConnectorError> {
        let Some(key) = usable_key(&self.api_key) else {
            return Err(ConnectorError::NotConfigured("Stability"));
        };

        let body = json!({
            "text_prompts": [{ "text": prompt, "weight": 1 }],
            "cfg_scale": CFG_SCALE,
            "width": options.width,
            "height": options.height,
            "samples": 1,
            "steps": STEPS,
        });

        let url = join_url(
            &self.base_url,
            &format!("v1/generation/{}/text-to-image", self.engine),
        );
        let rb = self
            .client
            .post(url)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json")
            .bearer_auth(key)
            .json(&body);

        let v = send_json("Stability", rb).await?;
        self.parse(v, &options)
    }
}
