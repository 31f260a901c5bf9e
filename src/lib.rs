// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod config;
pub mod detection;
pub mod history;
pub mod version;
pub mod vision;

// Re-export main types
pub use api::{build_router, start_server, ApiError, AppState};
pub use config::NodeConfig;
pub use detection::{Detection, Detector, DetectorConfig, InstanceMask, OnnxDetector};
pub use history::{HistoryStore, PredictionRecord, DEFAULT_HISTORY_CAPACITY};
