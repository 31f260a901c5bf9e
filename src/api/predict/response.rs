// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Prediction response types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Wall-clock timing for the request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingInfo {
    /// Milliseconds from request start to response construction
    pub total_processing_time_ms: f64,
}

/// Response from a successful prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    /// Short hex identifier, also the history lookup key
    pub id: String,
    /// Class label -> occurrence count
    pub detections: BTreeMap<String, u64>,
    /// Raw number of detected regions
    pub total_objects: usize,
    /// Occupied-area percentage, only for mask-producing models
    #[serde(skip_serializing_if = "Option::is_none")]
    pub density_percentage: Option<f64>,
    pub timing: TimingInfo,
    /// Annotated input image, base64-encoded JPEG
    pub annotated_image_base64: String,
}
