// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Inference endpoint module
//!
//! Provides POST /predict for running detection on an uploaded image.

pub mod handler;
pub mod response;

pub use handler::predict_handler;
pub use response::{PredictResponse, TimingInfo};
