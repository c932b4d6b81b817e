use serde::Serialize;
use serde_json::{Map, Value};

use crate::core::reference::ReferenceImage;

/// The image a provider handed back. Either variant counts as a success, so a
/// `GeneratedImage` can never be empty.
#[derive(Clone, Debug, PartialEq)]
pub enum ImagePayload {
    Url(String),
    Base64 { data: String, mime_type: String },
}

impl ImagePayload {
    pub fn url(&self) -> Option<&str> {
        match self {
            ImagePayload::Url(url) => Some(url),
            ImagePayload::Base64 { .. } => None,
        }
    }

    pub fn data(&self) -> Option<&str> {
        match self {
            ImagePayload::Url(_) => None,
            ImagePayload::Base64 { data, .. } => Some(data),
        }
    }
}

#[derive(Clone, Debug)]
pub struct GeneratedImage {
    pub image: ImagePayload,
    /// Free text the provider returned alongside the image, if any.
    pub message: Option<String>,
    pub metadata: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DalleOptions {
    /// `"{width}x{height}"`.
    pub size: String,
    pub quality: String,
}

impl Default for DalleOptions {
    fn default() -> Self {
        Self {
            size: "1024x1024".into(),
            quality: "standard".into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StabilityOptions {
    pub width: u32,
    pub height: u32,
}

impl Default for StabilityOptions {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 1024,
        }
    }
}

/// Options shared by the aspect-ratio based providers (Gemini and Doubao).
#[derive(Clone, Debug, PartialEq)]
pub struct AspectOptions {
    pub aspect_ratio: String,
    pub image_size: String,
    pub reference_image: Option<ReferenceImage>,
}

impl Default for AspectOptions {
    fn default() -> Self {
        Self {
            aspect_ratio: "1:1".into(),
            image_size: "1K".into(),
            reference_image: None,
        }
    }
}

impl AspectOptions {
    pub fn size_tier(&self) -> Option<SizeTier> {
        SizeTier::parse(&self.image_size)
    }
}

/// Resolution tier used by Gemini `imageSize` and Doubao size derivation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SizeTier {
    OneK,
    TwoK,
    FourK,
}

impl SizeTier {
    /// Accepts `1K`/`2K`/`4K` in any case, or `WxH` dimensions bucketed by
    /// their longest side.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "1k" => return Some(SizeTier::OneK),
            "2k" => return Some(SizeTier::TwoK),
            "4k" => return Some(SizeTier::FourK),
            _ => {}
        }
        let (w, h) = normalized.split_once('x')?;
        let longest = w.trim().parse::<u32>().ok()?.max(h.trim().parse::<u32>().ok()?);
        Some(if longest >= 3600 {
            SizeTier::FourK
        } else if longest >= 1800 {
            SizeTier::TwoK
        } else {
            SizeTier::OneK
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SizeTier::OneK => "1K",
            SizeTier::TwoK => "2K",
            SizeTier::FourK => "4K",
        }
    }
}

/// One generation call, tagged by provider. Each variant carries exactly the
/// options its connector understands.
#[derive(Clone, Debug, PartialEq)]
pub enum ImageJob {
    Dalle(DalleOptions),
    StableDiffusion(StabilityOptions),
    Gemini(AspectOptions),
    Doubao(AspectOptions),
}

/// Entry of `GET /api/services`.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ServiceDescriptor {
    pub id: String,
    pub name: String,
    pub available: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct ChatCompletion {
    pub success: bool,
    pub message: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_tier_parsing() {
        assert_eq!(SizeTier::parse("2k"), Some(SizeTier::TwoK));
        assert_eq!(SizeTier::parse(" 4K "), Some(SizeTier::FourK));
        assert_eq!(SizeTier::parse("1024x1024"), Some(SizeTier::OneK));
        assert_eq!(SizeTier::parse("2048x1152"), Some(SizeTier::TwoK));
        assert_eq!(SizeTier::parse("3840x2160"), Some(SizeTier::FourK));
        assert_eq!(SizeTier::parse("huge"), None);
        assert_eq!(SizeTier::FourK.as_str(), "4K");
    }

    #[test]
    fn payload_accessors() {
        let url = ImagePayload::Url("https://x/y.png".into());
        assert_eq!(url.url(), Some("https://x/y.png"));
        assert_eq!(url.data(), None);
        let b64 = ImagePayload::Base64 {
            data: "aGk=".into(),
            mime_type: "image/png".into(),
        };
        assert_eq!(b64.url(), None);
        assert_eq!(b64.data(), Some("aGk="));
    }
}
