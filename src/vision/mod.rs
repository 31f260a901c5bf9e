// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image utilities: decoding, encoding, and annotation rendering

pub mod annotate;
pub mod image_utils;

pub use annotate::render_annotations;
pub use image_utils::{
    decode_image_bytes, detect_format, encode_base64, encode_jpeg, ImageError, ImageInfo,
};
