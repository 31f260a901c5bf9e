// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Inference endpoint handler

use axum::extract::{Multipart, State};
use axum::Json;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::response::{PredictResponse, TimingInfo};
use crate::api::errors::ApiError;
use crate::api::http_server::AppState;
use crate::detection::{count_by_label, density_percentage};
use crate::history::PredictionRecord;
use crate::vision::{decode_image_bytes, encode_base64, encode_jpeg, render_annotations};

/// Filename of the annotated artifact inside the per-request directory
const ANNOTATED_FILENAME: &str = "image0.jpg";

/// POST /predict - Run detection on an uploaded image
///
/// Accepts a multipart form with a `file` field holding the image bytes.
/// Runs the detection model, writes the annotated rendering to a per-request
/// directory, aggregates per-class counts (plus occupied-area density when
/// the model produces masks), appends the result to the history store, and
/// returns it with the annotated image base64-encoded.
///
/// # Errors
/// - 400: no `file` field, empty filename, or undecodable image
/// - 500: inference failure or missing annotated artifact
pub async fn predict_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<PredictResponse>, ApiError> {
    let start = Instant::now();

    // 1. Pull the uploaded file out of the multipart form
    let mut upload: Option<Vec<u8>> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::ValidationError(format!("Invalid multipart form: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        if field.file_name().map(str::is_empty).unwrap_or(true) {
            return Err(ApiError::ValidationError("No file selected".to_string()));
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::ValidationError(format!("Failed to read upload: {}", e)))?;
        upload = Some(bytes.to_vec());
        break;
    }
    let bytes = upload.ok_or_else(|| ApiError::ValidationError("No file provided".to_string()))?;

    // 2. Decode into a pixel buffer, rejecting anything unreadable
    let (image, image_info) = decode_image_bytes(&bytes)
        .map_err(|e| ApiError::ValidationError(format!("Invalid image: {}", e)))?;
    debug!(
        "Decoded upload: {}x{}, {} bytes, {:?}",
        image_info.width, image_info.height, image_info.size_bytes, image_info.format
    );

    // 3. Short random id; the space is large relative to the buffer, so
    // collisions are a tolerated rarity rather than something guarded against
    let id = Uuid::new_v4().simple().to_string()[..8].to_string();

    // 4. Run the detection model
    let detections = state.detector.detect(&image).map_err(|e| {
        warn!("Detection failed: {}", e);
        ApiError::InternalError(format!("Detection failed: {}", e))
    })?;

    // 5. Persist the annotated rendering to the per-request directory
    let annotated = render_annotations(&image, &detections);
    let run_dir = state.output_dir.join(format!("prediction_{}", id));
    std::fs::create_dir_all(&run_dir)
        .map_err(|e| ApiError::InternalError(format!("Failed to create run directory: {}", e)))?;
    let artifact_path = run_dir.join(ANNOTATED_FILENAME);
    let jpeg_bytes = encode_jpeg(&annotated)
        .map_err(|e| ApiError::InternalError(format!("Failed to encode annotated image: {}", e)))?;
    std::fs::write(&artifact_path, &jpeg_bytes)
        .map_err(|e| ApiError::InternalError(format!("Failed to write annotated image: {}", e)))?;

    // The artifact is the contract with downstream tooling; its absence after
    // the write is an invariant violation
    if !artifact_path.exists() {
        warn!("Annotated artifact missing: {}", artifact_path.display());
        return Err(ApiError::InternalError(
            "Annotated image not found".to_string(),
        ));
    }
    let annotated_image_base64 = encode_base64(&jpeg_bytes);

    // 6. Aggregate statistics
    let counts = count_by_label(&detections);
    let total_objects = detections.len();
    let density = density_percentage(&detections, image_info.width, image_info.height);

    // 7. Append to history
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    state.history.insert(PredictionRecord {
        id: id.clone(),
        timestamp,
        detections: counts.clone(),
        total_objects,
        density_percentage: density,
        annotated_image_base64: annotated_image_base64.clone(),
    });

    let elapsed_ms = (start.elapsed().as_secs_f64() * 1000.0 * 100.0).round() / 100.0;
    info!(
        "Prediction {} complete: {} objects, {:.2}ms",
        id, total_objects, elapsed_ms
    );

    // 8. Build the response
    Ok(Json(PredictResponse {
        id,
        detections: counts,
        total_objects,
        density_percentage: density,
        timing: TimingInfo {
            total_processing_time_ms: elapsed_ms,
        },
        annotated_image_base64,
    }))
}
