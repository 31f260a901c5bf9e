// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use microvision_node::{
    api::{start_server, AppState},
    config::NodeConfig,
    detection::{DetectorConfig, OnnxDetector},
    history::HistoryStore,
};
use std::{env, sync::Arc};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    tracing::info!("Starting {}", microvision_node::version::get_version_string());

    let config = NodeConfig::from_env()?;
    config.ensure_output_dir()?;
    tracing::info!(
        "Artifacts: {} | model: {}",
        config.output_dir.display(),
        config.model_path.display()
    );

    let detector = OnnxDetector::new(DetectorConfig {
        model_path: config.model_path.clone(),
        class_names: config.class_names.clone(),
        confidence_threshold: config.confidence_threshold,
        iou_threshold: config.iou_threshold,
        input_size: config.input_size,
    })?;

    let state = AppState::new(
        Arc::new(detector),
        Arc::new(HistoryStore::with_default_capacity()),
        config.output_dir.clone(),
    );

    start_server(state, config.api_port)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))
}
