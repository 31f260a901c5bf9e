// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod convert;
pub mod errors;
pub mod history;
pub mod http_server;
pub mod predict;

pub use convert::convert_tiff_handler;
pub use errors::{ApiError, ErrorResponse};
pub use history::{
    clear_history_handler, get_history_handler, list_history_handler, MessageResponse,
};
pub use http_server::{build_router, start_server, AppState, HealthResponse};
pub use predict::{predict_handler, PredictResponse, TimingInfo};
