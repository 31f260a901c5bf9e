// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Tests for GET /history, GET /history/{id}, POST /history/clear

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::http::StatusCode;
use microvision_node::history::PredictionRecord;
use tower::ServiceExt;

use super::common::*;

fn record(id: &str, timestamp: f64) -> PredictionRecord {
    PredictionRecord {
        id: id.to_string(),
        timestamp,
        detections: BTreeMap::from([("rod".to_string(), 1u64)]),
        total_objects: 1,
        density_percentage: None,
        annotated_image_base64: "aGk=".to_string(),
    }
}

#[tokio::test]
async fn test_history_empty_initially() {
    let (router, _history, _dir) = test_app(Arc::new(StubDetector::empty()));

    let response = router.oneshot(get_request("/history")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_history_lists_newest_first() {
    let (router, history, _dir) = test_app(Arc::new(StubDetector::empty()));
    for i in 0..8 {
        history.insert(record(&format!("id{}", i), 1000.0 + i as f64));
    }

    let response = router.oneshot(get_request("/history")).await.unwrap();
    let json = body_json(response).await;
    let items = json.as_array().unwrap();
    assert_eq!(items.len(), 8);

    let timestamps: Vec<f64> = items
        .iter()
        .map(|r| r["timestamp"].as_f64().unwrap())
        .collect();
    for pair in timestamps.windows(2) {
        assert!(pair[0] >= pair[1], "history must be newest first");
    }
    assert_eq!(items[0]["id"], "id7");
}

#[tokio::test]
async fn test_history_caps_at_twenty_records() {
    let (router, history, _dir) = test_app(Arc::new(StubDetector::empty()));
    for i in 0..25 {
        history.insert(record(&format!("id{}", i), 1000.0 + i as f64));
    }

    let response = router.oneshot(get_request("/history")).await.unwrap();
    let json = body_json(response).await;
    let items = json.as_array().unwrap();
    assert_eq!(items.len(), 20);

    // The 20 retained are the most recent ones; the first 5 were evicted
    let ids: Vec<&str> = items.iter().map(|r| r["id"].as_str().unwrap()).collect();
    for early in 0..5 {
        assert!(!ids.contains(&format!("id{}", early).as_str()));
    }
    assert!(ids.contains(&"id24"));
    assert!(ids.contains(&"id5"));
}

#[tokio::test]
async fn test_history_get_by_id() {
    let (router, history, _dir) = test_app(Arc::new(StubDetector::empty()));
    history.insert(record("abc12345", 1000.0));

    let response = router
        .clone()
        .oneshot(get_request("/history/abc12345"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["id"], "abc12345");
    assert_eq!(json["total_objects"], 1);
}

#[tokio::test]
async fn test_history_get_unknown_id_is_404() {
    let (router, _history, _dir) = test_app(Arc::new(StubDetector::empty()));

    let response = router.oneshot(get_request("/history/deadbeef")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["error"], "History item not found");
}

#[tokio::test]
async fn test_history_clear_empties_store() {
    let (router, history, _dir) = test_app(Arc::new(StubDetector::empty()));
    for i in 0..3 {
        history.insert(record(&format!("id{}", i), 1000.0 + i as f64));
    }

    let response = router
        .clone()
        .oneshot(post_request("/history/clear"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["message"], "History cleared");

    let response = router.oneshot(get_request("/history")).await.unwrap();
    let json = body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_history_clear_is_idempotent() {
    let (router, _history, _dir) = test_app(Arc::new(StubDetector::empty()));

    for _ in 0..2 {
        let response = router
            .clone()
            .oneshot(post_request("/history/clear"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
