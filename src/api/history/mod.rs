// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! History endpoint module
//!
//! GET /history, GET /history/{id}, POST /history/clear.

pub mod handler;

pub use handler::{clear_history_handler, get_history_handler, list_history_handler, MessageResponse};
