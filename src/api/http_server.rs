// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTTP server wiring: shared state, router, listener

use axum::{
    extract::{DefaultBodyLimit, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::detection::Detector;
use crate::history::HistoryStore;

use super::convert::convert_tiff_handler;
use super::history::{clear_history_handler, get_history_handler, list_history_handler};
use super::predict::predict_handler;

/// Request body ceiling; uploads are capped at 10MB by the decode path, this
/// just leaves headroom for multipart framing
const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

/// Process-scoped state injected into every handler
///
/// Constructed once at startup and never rebuilt mid-process. The detector
/// and history store are behind Arcs so clones are cheap.
#[derive(Clone)]
pub struct AppState {
    pub detector: Arc<dyn Detector>,
    pub history: Arc<HistoryStore>,
    pub output_dir: PathBuf,
}

impl AppState {
    pub fn new(detector: Arc<dyn Detector>, history: Arc<HistoryStore>, output_dir: PathBuf) -> Self {
        Self {
            detector,
            history,
            output_dir,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model: String,
    pub history_size: usize,
    pub version: String,
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    axum::Json(HealthResponse {
        status: "healthy".to_string(),
        model: state.detector.name().to_string(),
        history_size: state.history.len(),
        version: crate::version::VERSION_NUMBER.to_string(),
    })
}

/// Build the application router over the given state
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_handler))
        // Inference endpoint
        .route("/predict", post(predict_handler))
        // History endpoints
        .route("/history", get(list_history_handler))
        .route("/history/:id", get(get_history_handler))
        .route("/history/clear", post(clear_history_handler))
        // Format conversion endpoint
        .route("/convert-tiff", post(convert_tiff_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the process is stopped
pub async fn start_server(state: AppState, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("API server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
