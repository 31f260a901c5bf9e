// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! History endpoint handlers

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::api::errors::ApiError;
use crate::api::http_server::AppState;
use crate::history::PredictionRecord;

/// Confirmation body for POST /history/clear
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// GET /history - All retained predictions, most recent first
pub async fn list_history_handler(State(state): State<AppState>) -> Json<Vec<PredictionRecord>> {
    let records = state.history.list();
    debug!("History listed: {} records", records.len());
    Json(records)
}

/// GET /history/{id} - A single prediction, or 404 when absent
pub async fn get_history_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PredictionRecord>, ApiError> {
    state
        .history
        .get(&id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("History item not found".to_string()))
}

/// POST /history/clear - Empty the store
pub async fn clear_history_handler(State(state): State<AppState>) -> Json<MessageResponse> {
    state.history.clear();
    info!("History cleared");
    Json(MessageResponse {
        message: "History cleared".to_string(),
    })
}
