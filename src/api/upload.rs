use std::io::Cursor;

use axum::extract::Multipart;
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{ImageFormat, ImageReader};
use serde::Serialize;

use crate::api::error::ApiError;

const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: &'static str,
    pub filename: Option<String>,
    pub size: usize,
    pub format: String,
    pub dimensions: [u32; 2],
    pub image_data: String,
}

pub async fn upload(mut multipart: Multipart) -> Result<Json<UploadResponse>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid upload: {e}")))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let filename = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Invalid upload: {e}")))?;
        return describe_image(filename, &bytes).map(Json);
    }
    Err(ApiError::BadRequest("No file uploaded".into()))
}

/// Decodes the upload, then re-encodes it in its own format (PNG when that
/// format has no encoder) as base64.
pub fn describe_image(filename: Option<String>, bytes: &[u8]) -> Result<UploadResponse, ApiError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(invalid)?;
    let format = reader
        .format()
        .ok_or_else(|| invalid("unrecognized image format"))?;
    let image = reader.decode().map_err(invalid)?;

    let mut encoded = Cursor::new(Vec::new());
    if let Err(e) = image.write_to(&mut encoded, format) {
        tracing::debug!(?format, error = %e, "re-encoding as PNG");
        encoded = Cursor::new(Vec::new());
        image
            .write_to(&mut encoded, ImageFormat::Png)
            .map_err(|e| ApiError::Internal(format!("failed to encode image: {e}")))?;
    }

    tracing::info!(?format, width = image.width(), height = image.height(), size = bytes.len(), "image uploaded");

    Ok(UploadResponse {
        success: true,
        message: "Image uploaded successfully",
        filename,
        size: bytes.len(),
        format: format_name(format),
        dimensions: [image.width(), image.height()],
        image_data: BASE64.encode(encoded.into_inner()),
    })
}

fn invalid(e: impl std::fmt::Display) -> ApiError {
    ApiError::BadRequest(format!("Invalid image file: {e}"))
}

fn format_name(format: ImageFormat) -> String {
    match format {
        ImageFormat::Png => "PNG".into(),
        ImageFormat::Jpeg => "JPEG".into(),
        ImageFormat::Gif => "GIF".into(),
        ImageFormat::WebP => "WEBP".into(),
        ImageFormat::Bmp => "BMP".into(),
        ImageFormat::Tiff => "TIFF".into(),
        ImageFormat::Ico => "ICO".into(),
        other => format!("{other:?}").to_ascii_uppercase(),
    }
}
