// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image conversion endpoint module
//!
//! POST /convert-tiff re-encodes any readable image (TIFF included) to JPEG.

pub mod handler;

pub use handler::convert_tiff_handler;
