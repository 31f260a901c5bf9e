// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Object detection abstraction
//!
//! The detection backend is a black box behind the [`Detector`] trait:
//! image in, labeled regions (optionally with per-instance masks) out. The
//! ONNX-backed implementation lives in [`onnx`]; tests swap in stubs without
//! touching endpoint logic.

pub mod onnx;

pub use onnx::{DetectorConfig, OnnxDetector};

use anyhow::Result;
use image::DynamicImage;
use std::collections::BTreeMap;

/// Axis-aligned box in original-image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection-over-union with another box
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        let intersection = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }
}

/// Per-instance probability mask, row-major, covering the full image frame
/// at its own (usually reduced) resolution
#[derive(Debug, Clone)]
pub struct InstanceMask {
    pub width: u32,
    pub height: u32,
    /// Probabilities in [0, 1], length = width * height
    pub data: Vec<f32>,
}

impl InstanceMask {
    /// Probability at mask-space pixel (x, y); out of bounds reads as 0
    pub fn probability_at(&self, x: u32, y: u32) -> f32 {
        if x >= self.width || y >= self.height {
            return 0.0;
        }
        self.data[(y * self.width + x) as usize]
    }

    /// Number of covered pixels after nearest-neighbor resampling to
    /// `target_w` x `target_h` and thresholding at `threshold`
    pub fn covered_pixels(&self, target_w: u32, target_h: u32, threshold: f32) -> u64 {
        if self.width == 0 || self.height == 0 || target_w == 0 || target_h == 0 {
            return 0;
        }
        let mut covered = 0u64;
        for ty in 0..target_h {
            let sy = (ty as u64 * self.height as u64 / target_h as u64) as u32;
            for tx in 0..target_w {
                let sx = (tx as u64 * self.width as u64 / target_w as u64) as u32;
                if self.probability_at(sx, sy) >= threshold {
                    covered += 1;
                }
            }
        }
        covered
    }
}

/// One detected region
#[derive(Debug, Clone)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
    pub mask: Option<InstanceMask>,
}

/// Black-box detection backend: image in, labeled regions out
pub trait Detector: Send + Sync {
    /// Detect objects in a single image
    fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>>;

    /// Backend name, for logging and the health endpoint
    fn name(&self) -> &str;
}

/// Binary-mask probability cutoff used for density accounting
pub const MASK_THRESHOLD: f32 = 0.5;

/// Group detections by class label
pub fn count_by_label(detections: &[Detection]) -> BTreeMap<String, u64> {
    let mut counts = BTreeMap::new();
    for det in detections {
        *counts.entry(det.label.clone()).or_insert(0u64) += 1;
    }
    counts
}

/// Occupied-area percentage over the original image, or `None` when no
/// detection carries a mask.
///
/// Each instance mask is resampled to the image dimensions, thresholded at
/// 0.5, and its pixel count added to the total. Overlapping instances are
/// summed without deduplication, so the figure can exceed 100 - that matches
/// the deployed computation and is kept as-is.
pub fn density_percentage(detections: &[Detection], width: u32, height: u32) -> Option<f64> {
    let total_pixels = width as u64 * height as u64;
    if total_pixels == 0 {
        return None;
    }
    let masks: Vec<&InstanceMask> = detections.iter().filter_map(|d| d.mask.as_ref()).collect();
    if masks.is_empty() {
        return None;
    }
    let occupied: u64 = masks
        .iter()
        .map(|m| m.covered_pixels(width, height, MASK_THRESHOLD))
        .sum();
    let percentage = occupied as f64 / total_pixels as f64 * 100.0;
    Some((percentage * 100.0).round() / 100.0)
}
