// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Tests for POST /convert-tiff

use std::io::Cursor;
use std::sync::Arc;

use axum::http::StatusCode;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use tower::ServiceExt;

use super::common::*;

fn tiff_fixture(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 50, 50])));
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Tiff).unwrap();
    buffer.into_inner()
}

#[tokio::test]
async fn test_convert_tiff_returns_jpeg() {
    let (router, _history, _dir) = test_app(Arc::new(StubDetector::empty()));

    let body = multipart_file("file", "scan.tiff", &tiff_fixture(20, 10));
    let response = router.oneshot(multipart_request("/convert-tiff", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "image/jpeg"
    );

    let bytes = body_bytes(response).await;
    let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg)
        .expect("response should re-decode as JPEG");
    assert_eq!((decoded.width(), decoded.height()), (20, 10));
}

#[tokio::test]
async fn test_convert_accepts_png_too() {
    // No validation beyond the decode itself - any readable image converts
    let (router, _history, _dir) = test_app(Arc::new(StubDetector::empty()));

    let body = multipart_file("file", "sample.png", &png_fixture(6, 6));
    let response = router.oneshot(multipart_request("/convert-tiff", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = body_bytes(response).await;
    assert!(image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg).is_ok());
}

#[tokio::test]
async fn test_convert_rejects_undecodable_input() {
    let (router, _history, _dir) = test_app(Arc::new(StubDetector::empty()));

    let body = multipart_file("file", "junk.tiff", &[0x13, 0x37, 0x00, 0x01]);
    let response = router.oneshot(multipart_request("/convert-tiff", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("Invalid image"));
}

#[tokio::test]
async fn test_convert_missing_file_field_is_400() {
    let (router, _history, _dir) = test_app(Arc::new(StubDetector::empty()));

    let body = multipart_file("attachment", "scan.tiff", &tiff_fixture(4, 4));
    let response = router.oneshot(multipart_request("/convert-tiff", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "No file provided");
}
