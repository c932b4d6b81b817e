use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

const DEFAULT_MIME: &str = "image/png";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ReferenceImageError {
    #[error("reference image is empty")]
    Empty,
    #[error("reference image data URL is not base64 encoded")]
    NotBase64DataUrl,
    #[error("reference image is not valid base64: {0}")]
    Decode(String),
}

/// Image supplied to steer image-to-image generation.
#[derive(Clone, Debug, PartialEq)]
pub struct ReferenceImage {
    pub mime_type: String,
    /// Base64 payload without the data URL prefix.
    pub data: String,
}

impl ReferenceImage {
    /// Accepts either a `data:<mime>;base64,<payload>` URL or bare base64.
    pub fn parse(raw: &str) -> Result<Self, ReferenceImageError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ReferenceImageError::Empty);
        }

        let (mime_type, payload) = match raw.strip_prefix("data:") {
            Some(rest) => {
                let (header, payload) = rest
                    .split_once(',')
                    .ok_or(ReferenceImageError::NotBase64DataUrl)?;
                let mime = header
                    .strip_suffix(";base64")
                    .ok_or(ReferenceImageError::NotBase64DataUrl)?;
                let mime = if mime.is_empty() { DEFAULT_MIME } else { mime };
                (mime.to_string(), payload)
            }
            None => (DEFAULT_MIME.to_string(), raw),
        };

        let data: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        if data.is_empty() {
            return Err(ReferenceImageError::Empty);
        }
        BASE64
            .decode(data.as_bytes())
            .map_err(|e| ReferenceImageError::Decode(e.to_string()))?;

        Ok(Self { mime_type, data })
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}
