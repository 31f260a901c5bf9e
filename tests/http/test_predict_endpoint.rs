// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Tests for POST /predict
//!
//! The detection backend is stubbed so these exercise the full request path:
//! multipart validation, decoding, aggregation, artifact persistence, history
//! insertion, and the response shape.

use std::sync::Arc;

use axum::http::StatusCode;
use tower::ServiceExt;

use super::common::*;

#[tokio::test]
async fn test_predict_success_counts_and_totals() {
    let detector = Arc::new(StubDetector::new(vec![
        detection("rod", None),
        detection("rod", None),
        detection("coccus", None),
    ]));
    let (router, history, _dir) = test_app(detector);

    let body = multipart_file("file", "sample.png", &png_fixture(32, 32));
    let response = router.oneshot(multipart_request("/predict", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["total_objects"], 3);
    assert_eq!(json["detections"]["rod"], 2);
    assert_eq!(json["detections"]["coccus"], 1);
    assert_eq!(json["id"].as_str().unwrap().len(), 8);
    assert!(json["timing"]["total_processing_time_ms"].as_f64().unwrap() >= 0.0);
    assert!(!json["annotated_image_base64"].as_str().unwrap().is_empty());
    // No masks from the stub, so no density field
    assert!(json.get("density_percentage").is_none());

    // Record landed in history under the returned id
    let id = json["id"].as_str().unwrap();
    let record = history.get(id).expect("record should be in history");
    assert_eq!(record.total_objects, 3);
}

#[tokio::test]
async fn test_predict_reports_density_with_masks() {
    let detector = Arc::new(StubDetector::new(vec![detection(
        "rod",
        Some(full_frame_mask(8, 8)),
    )]));
    let (router, _history, _dir) = test_app(detector);

    let body = multipart_file("file", "sample.png", &png_fixture(16, 16));
    let response = router.oneshot(multipart_request("/predict", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["density_percentage"], 100.0);
}

#[tokio::test]
async fn test_predict_density_sums_overlapping_masks() {
    // Two full-frame masks: summed, not unioned -> 200.00
    let detector = Arc::new(StubDetector::new(vec![
        detection("rod", Some(full_frame_mask(8, 8))),
        detection("rod", Some(full_frame_mask(8, 8))),
    ]));
    let (router, _history, _dir) = test_app(detector);

    let body = multipart_file("file", "sample.png", &png_fixture(16, 16));
    let response = router.oneshot(multipart_request("/predict", body)).await.unwrap();

    let json = body_json(response).await;
    assert_eq!(json["density_percentage"], 200.0);
}

#[tokio::test]
async fn test_predict_missing_file_field_is_400_and_leaves_history_alone() {
    let (router, history, _dir) = test_app(Arc::new(StubDetector::empty()));

    let body = multipart_file("not_file", "sample.png", &png_fixture(8, 8));
    let response = router.oneshot(multipart_request("/predict", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "No file provided");
    assert!(history.is_empty());
}

#[tokio::test]
async fn test_predict_empty_filename_is_400() {
    let (router, _history, _dir) = test_app(Arc::new(StubDetector::empty()));

    let body = multipart_file("file", "", &png_fixture(8, 8));
    let response = router.oneshot(multipart_request("/predict", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "No file selected");
}

#[tokio::test]
async fn test_predict_undecodable_image_is_400() {
    let (router, history, _dir) = test_app(Arc::new(StubDetector::empty()));

    let body = multipart_file("file", "junk.bin", &[0xDE, 0xAD, 0xBE, 0xEF, 0x00]);
    let response = router.oneshot(multipart_request("/predict", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("Invalid image"));
    assert!(history.is_empty());
}

#[tokio::test]
async fn test_predict_detector_failure_is_500() {
    let (router, history, _dir) = test_app(Arc::new(FailingDetector));

    let body = multipart_file("file", "sample.png", &png_fixture(8, 8));
    let response = router.oneshot(multipart_request("/predict", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("model runtime exploded"));
    assert!(history.is_empty());
}

#[tokio::test]
async fn test_predict_writes_annotated_artifact() {
    let (router, _history, dir) = test_app(Arc::new(StubDetector::new(vec![detection(
        "rod", None,
    )])));

    let body = multipart_file("file", "sample.png", &png_fixture(24, 24));
    let response = router.oneshot(multipart_request("/predict", body)).await.unwrap();
    let json = body_json(response).await;
    let id = json["id"].as_str().unwrap();

    let artifact = dir.path().join(format!("prediction_{}", id)).join("image0.jpg");
    assert!(artifact.is_file(), "annotated artifact should exist on disk");
}

#[tokio::test]
async fn test_predict_annotated_image_is_decodable_jpeg() {
    let (router, _history, _dir) = test_app(Arc::new(StubDetector::new(vec![detection(
        "rod", None,
    )])));

    let body = multipart_file("file", "sample.png", &png_fixture(24, 24));
    let response = router.oneshot(multipart_request("/predict", body)).await.unwrap();
    let json = body_json(response).await;

    use base64::Engine as _;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(json["annotated_image_base64"].as_str().unwrap())
        .expect("valid base64");
    let decoded = image::load_from_memory(&bytes).expect("decodable JPEG");
    assert_eq!((decoded.width(), decoded.height()), (24, 24));
}
