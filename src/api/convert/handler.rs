// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image conversion handler

use axum::body::Body;
use axum::extract::Multipart;
use axum::http::{header, StatusCode};
use axum::response::Response;
use tracing::{debug, warn};

use crate::api::errors::ApiError;
use crate::vision::{decode_image_bytes, encode_jpeg};

/// POST /convert-tiff - Re-encode an uploaded image as JPEG
///
/// Accepts a multipart form with a `file` field. Anything the decoder can
/// read (TIFF being the interesting case for microscopy captures) is
/// re-encoded and streamed back as `image/jpeg`. The only validation is the
/// decode itself.
pub async fn convert_tiff_handler(mut multipart: Multipart) -> Result<Response, ApiError> {
    let mut upload: Option<Vec<u8>> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::ValidationError(format!("Invalid multipart form: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::ValidationError(format!("Failed to read upload: {}", e)))?;
        upload = Some(bytes.to_vec());
        break;
    }
    let bytes = upload.ok_or_else(|| ApiError::ValidationError("No file provided".to_string()))?;

    let (image, info) = decode_image_bytes(&bytes).map_err(|e| {
        warn!("Conversion decode failed: {}", e);
        ApiError::ValidationError(format!("Invalid image: {}", e))
    })?;
    debug!(
        "Converting {:?} image {}x{} to JPEG",
        info.format, info.width, info.height
    );

    let jpeg = encode_jpeg(&image)
        .map_err(|e| ApiError::InternalError(format!("Failed to encode JPEG: {}", e)))?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "image/jpeg")
        .body(Body::from(jpeg))
        .map_err(|e| ApiError::InternalError(format!("Failed to build response: {}", e)))
}
