use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::api::error::ApiError;
use crate::connectors::ConnectorError;
use crate::core::entities::{
    AspectOptions, DalleOptions, GeneratedImage, ImageJob, StabilityOptions,
};
use crate::core::reference::ReferenceImage;
use crate::registry::{ProviderOverrides, ServiceId, UnknownService};
use crate::routing::AppState;

const DEFAULT_SERVICE: &str = "dalle";
const DEFAULT_ASPECT_RATIO: &str = "1:1";
const DEFAULT_IMAGE_SIZE: &str = "1K";
const DEFAULT_DIMENSION: u32 = 1024;
const DEFAULT_QUALITY: &str = "standard";
const CHAT_SUCCESS_MESSAGE: &str = "Image generated successfully";

/// Body of `POST /api/chat`.
#[derive(Debug, Deserialize)]
pub struct ChatImageRequest {
    pub message: String,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub aspect_ratio: Option<String>,
    #[serde(default)]
    pub image_size: Option<String>,
    #[serde(default)]
    pub reference_image: Option<String>,
}

/// Body of `POST /api/generate`.
#[derive(Debug, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default)]
    pub aspect_ratio: Option<String>,
    #[serde(default)]
    pub image_size: Option<String>,
    #[serde(default)]
    pub reference_image: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ImageResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

impl ImageResponse {
    fn generated(image: GeneratedImage, message: Option<String>, service: Option<String>) -> Self {
        Self {
            success: true,
            message,
            image_url: image.image.url().map(str::to_string),
            image_data: image.image.data().map(str::to_string),
            metadata: Some(image.metadata),
            error: None,
            service,
        }
    }

    fn failed(err: &ConnectorError, service: Option<String>) -> Self {
        Self {
            success: false,
            message: Some(err.to_string()),
            image_url: None,
            image_data: None,
            metadata: None,
            error: Some(err.code()),
            service,
        }
    }
}

fn resolve_service(app: &AppState, raw: Option<&str>) -> Result<ServiceId, ApiError> {
    let key = raw.unwrap_or(DEFAULT_SERVICE);
    app.registry()
        .lookup(key)
        .ok_or_else(|| UnknownService(key.to_string()).into())
}

fn aspect_options(
    aspect_ratio: Option<&str>,
    image_size: Option<&str>,
    reference_image: Option<&str>,
) -> Result<AspectOptions, ApiError> {
    let reference_image = reference_image
        .filter(|r| !r.trim().is_empty())
        .map(ReferenceImage::parse)
        .transpose()?;
    Ok(AspectOptions {
        aspect_ratio: aspect_ratio.unwrap_or(DEFAULT_ASPECT_RATIO).to_string(),
        image_size: image_size.unwrap_or(DEFAULT_IMAGE_SIZE).to_string(),
        reference_image,
    })
}

/// Chat-style requests only carry aspect options; DALL-E and Stable Diffusion
/// run with their defaults.
pub fn chat_job(service: ServiceId, req: &ChatImageRequest) -> Result<ImageJob, ApiError> {
    Ok(match service {
        ServiceId::Dalle => ImageJob::Dalle(DalleOptions::default()),
        ServiceId::StableDiffusion => ImageJob::StableDiffusion(StabilityOptions::default()),
        ServiceId::GeminiImage => ImageJob::Gemini(aspect_options(
            req.aspect_ratio.as_deref(),
            req.image_size.as_deref(),
            req.reference_image.as_deref(),
        )?),
        ServiceId::DoubaoImage => ImageJob::Doubao(aspect_options(
            req.aspect_ratio.as_deref(),
            req.image_size.as_deref(),
            req.reference_image.as_deref(),
        )?),
    })
}

pub fn generation_job(service: ServiceId, req: &GenerationRequest) -> Result<ImageJob, ApiError> {
    let width = req.width.unwrap_or(DEFAULT_DIMENSION);
    let height = req.height.unwrap_or(DEFAULT_DIMENSION);
    Ok(match service {
        ServiceId::Dalle => ImageJob::Dalle(DalleOptions {
            size: format!("{width}x{height}"),
            quality: req
                .quality
                .clone()
                .unwrap_or_else(|| DEFAULT_QUALITY.to_string()),
        }),
        ServiceId::StableDiffusion => ImageJob::StableDiffusion(StabilityOptions { width, height }),
        ServiceId::GeminiImage => ImageJob::Gemini(aspect_options(
            req.aspect_ratio.as_deref(),
            req.image_size.as_deref(),
            req.reference_image.as_deref(),
        )?),
        ServiceId::DoubaoImage => ImageJob::Doubao(aspect_options(
            req.aspect_ratio.as_deref(),
            req.image_size.as_deref(),
            req.reference_image.as_deref(),
        )?),
    })
}

pub async fn chat(
    State(app): State<AppState>,
    Json(req): Json<ChatImageRequest>,
) -> Result<Json<ImageResponse>, ApiError> {
    let service = resolve_service(&app, req.service.as_deref())?;
    tracing::debug!(
        %service,
        model = ?req.model,
        aspect_ratio = ?req.aspect_ratio,
        image_size = ?req.image_size,
        "chat image request"
    );
    let job = chat_job(service, &req)?;
    let overrides = ProviderOverrides::model(req.model.as_deref());

    match app.generate("chat", &req.message, job, &overrides).await {
        Ok(image) => {
            let message = image
                .message
                .clone()
                .unwrap_or_else(|| CHAT_SUCCESS_MESSAGE.to_string());
            Ok(Json(ImageResponse::generated(image, Some(message), None)))
        }
        Err(e) if e.is_expected() => Ok(Json(ImageResponse::failed(&e, None))),
        Err(e) => Err(e.into()),
    }
}

pub async fn generate(
    State(app): State<AppState>,
    Json(req): Json<GenerationRequest>,
) -> Result<Json<ImageResponse>, ApiError> {
    let service = resolve_service(&app, req.service.as_deref())?;
    let job = generation_job(service, &req)?;
    let overrides = ProviderOverrides::model(req.model.as_deref());
    let echo = Some(service.to_string());

    match app.generate("generate", &req.prompt, job, &overrides).await {
        Ok(image) => Ok(Json(ImageResponse::generated(image, None, echo))),
        Err(e) if e.is_expected() => Ok(Json(ImageResponse::failed(&e, echo))),
        Err(e) => Err(e.into()),
    }
}
