use reqwest::{header, Client};
use serde_json::{json, Value};

use crate::config::ProviderSettings;
use crate::connectors::{
    base_metadata, join_url, non_empty_str, send_json, usable_key, ConnectorError,
    ImageConnector,
};
use crate::core::entities::{AspectOptions, GeneratedImage, ImagePayload, SizeTier};
use crate::registry::{ProviderOverrides, ServiceId};

/// Seedream pixel sizes at the 2K tier.
const RATIO_SIZES_2K: [(&str, u32, u32); 8] = [
    ("1:1", 2048, 2048),
    ("4:3", 2304, 1728),
    ("3:4", 1728, 2304),
    ("16:9", 2560, 1440),
    ("9:16", 1440, 2560),
    ("3:2", 2496, 1664),
    ("2:3", 1664, 2496),
    ("21:9", 3024, 1296),
];

/// Doubao Seedream through an OpenAI-style `images/generations` endpoint.
pub struct DoubaoConnector {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl DoubaoConnector {
    pub fn from_settings(
        client: Client,
        settings: &ProviderSettings,
        overrides: &ProviderOverrides,
    ) -> Self {
        let settings = overrides.apply(settings);
        Self {
            client,
            api_key: settings.api_key,
            base_url: settings.base_url,
            model: settings.model,
        }
    }

    /// `"{w}x{h}"` for an aspect ratio and tier. Unknown ratios fall back to
    /// square.
    pub fn pixel_size(aspect_ratio: &str, tier: SizeTier) -> String {
        let (_, w, h) = RATIO_SIZES_2K
            .iter()
            .find(|(ratio, _, _)| *ratio == aspect_ratio.trim())
            .copied()
            .unwrap_or(RATIO_SIZES_2K[0]);
        let (w, h) = match tier {
            SizeTier::OneK => (w / 2, h / 2),
            SizeTier::TwoK => (w, h),
            SizeTier::FourK => (w * 2, h * 2),
        };
        format!("{w}x{h}")
    }

    fn request_body(&self, prompt: &str, options: &AspectOptions, size: &str) -> Value {
        let mut body = json!({
            "model": self.model,
            "prompt": prompt,
            "size": size,
            "response_format": "url",
            "watermark": false,
        });
        if let Some(reference) = &options.reference_image {
            body["image"] = json!(reference.to_data_url());
        }
        body
    }

    fn parse(
        &self,
        v: Value,
        options: &AspectOptions,
        size: &str,
        tier: SizeTier,
    ) -> Result<GeneratedImage, ConnectorError> {
        let image = if let Some(url) = non_empty_str(&v, "/data/0/url") {
            ImagePayload::Url(url.to_string())
        } else if let Some(b64) = non_empty_str(&v, "/data/0/b64_json") {
            ImagePayload::Base64 {
                data: b64.to_string(),
                mime_type: "image/jpeg".into(),
            }
        } else if let Some(msg) = non_empty_str(&v, "/error/message") {
            return Err(ConnectorError::Rejected(format!("Doubao: {msg}")));
        } else {
            return Err(ConnectorError::InvalidResponse(
                "Doubao response contained no image".into(),
            ));
        };

        let mut metadata = base_metadata(&self.model);
        metadata.insert("size".into(), json!(size));
        metadata.insert("aspect_ratio".into(), json!(options.aspect_ratio));
        metadata.insert("image_size".into(), json!(tier.as_str()));
        if options.reference_image.is_some() {
            metadata.insert("reference_image".into(), json!(true));
        }

        Ok(GeneratedImage {
            image,
            message: None,
            metadata,
        })
    }
}

#[async_trait::async_trait]
impl ImageConnector for DoubaoConnector {
    type Options = AspectOptions;

    fn id(&self) -> ServiceId {
        ServiceId::DoubaoImage
    }

    fn display_name(&self) -> &'static str {
        "Doubao Seedream"
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
            return Err(ConnectorError::NotConfigured("Doubao"));
        };

        let tier = options.size_tier().unwrap_or(SizeTier::TwoK);
        let size = Self::pixel_size(&options.aspect_ratio, tier);
        let body = self.request_body(prompt, &options, &size);

        let rb = self
            .client
            .post(join_url(&self.base_url, "v1/images/generations"))
            .header(header::CONTENT_TYPE, "application/json")
            .bearer_auth(key)
            .json(&body);

        let v = send_json("Doubao", rb).await?;
        self.parse(v, &options, &size, tier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reference::ReferenceImage;

    fn connector() -> DoubaoConnector {
        DoubaoConnector::from_settings(
            Client::new(),
            &ProviderSettings {
                api_key: Some("db".into()),
                base_url: "http://unused".into(),
                model: "doubao-seedream-4-0-250828".into(),
            },
            &ProviderOverrides::default(),
        )
    }

    #[test]
    fn pixel_sizes_scale_with_tier() {
        assert_eq!(DoubaoConnector::pixel_size("1:1", SizeTier::OneK), "1024x1024");
        assert_eq!(DoubaoConnector::pixel_size("16:9", SizeTier::TwoK), "2560x1440");
        assert_eq!(DoubaoConnector::pixel_size("9:16", SizeTier::FourK), "2880x5120");
        assert_eq!(DoubaoConnector::pixel_size("7:5", SizeTier::TwoK), "2048x2048");
    }

    #[test]
    fn reference_image_is_sent_as_data_url() {
        let opts = AspectOptions {
            reference_image: Some(ReferenceImage::parse("aGk=").unwrap()),
            ..AspectOptions::default()
        };
        let body = connector().request_body("a boat", &opts, "1024x1024");
        assert_eq!(body["image"], "data:image/png;base64,aGk=");
        assert_eq!(body["watermark"], false);
        assert_eq!(body["size"], "1024x1024");
    }

    #[test]
    fn parses_url_response() {
        let v = json!({"data": [{"url": "https://cdn/seedream.jpeg", "size": "1024x1024"}]});
        let out = connector()
            .parse(v, &AspectOptions::default(), "1024x1024", SizeTier::OneK)
            .unwrap();
        assert_eq!(out.image.url(), Some("https://cdn/seedream.jpeg"));
        assert_eq!(out.metadata["size"], "1024x1024");
        assert_eq!(out.metadata["model"], "doubao-seedream-4-0-250828");
    }

    #[test]
    fn embedded_error_is_rejected() {
        let v = json!({"error": {"message": "sensitive content"}});
        let err = connector()
            .parse(v, &AspectOptions::default(), "1024x1024", SizeTier::OneK)
            .unwrap_err();
        assert_eq!(err.code(), "invalid_request");
    }
}
