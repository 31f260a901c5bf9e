// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection overlay rendering
//!
//! Draws bounding-box outlines and translucent instance-mask fills directly
//! on the pixel buffer. Colors are assigned per class label from a fixed
//! palette so the same class always renders the same way.

use image::{DynamicImage, Rgb, RgbImage};

use crate::detection::{Detection, MASK_THRESHOLD};

/// Outline thickness in pixels
const BOX_THICKNESS: u32 = 2;

/// Mask fill opacity (0..1)
const MASK_ALPHA: f32 = 0.4;

/// Fixed palette, chosen for contrast on photographic backgrounds
const PALETTE: &[Rgb<u8>] = &[
    Rgb([230, 57, 70]),
    Rgb([29, 161, 242]),
    Rgb([46, 204, 113]),
    Rgb([241, 196, 15]),
    Rgb([155, 89, 182]),
    Rgb([230, 126, 34]),
    Rgb([26, 188, 156]),
    Rgb([236, 64, 122]),
];

/// Stable palette color for a class label
fn color_for_label(label: &str) -> Rgb<u8> {
    let hash: usize = label.bytes().map(|b| b as usize).sum();
    PALETTE[hash % PALETTE.len()]
}

fn blend(base: &mut Rgb<u8>, overlay: Rgb<u8>, alpha: f32) {
    for c in 0..3 {
        base[c] = (base[c] as f32 * (1.0 - alpha) + overlay[c] as f32 * alpha).round() as u8;
    }
}

fn draw_box_outline(canvas: &mut RgbImage, x1: u32, y1: u32, x2: u32, y2: u32, color: Rgb<u8>) {
    let (width, height) = canvas.dimensions();
    for t in 0..BOX_THICKNESS {
        for x in x1..=x2.min(width - 1) {
            if y1 + t < height {
                canvas.put_pixel(x, y1 + t, color);
            }
            if y2 >= t && y2 - t < height {
                canvas.put_pixel(x, y2 - t, color);
            }
        }
        for y in y1..=y2.min(height - 1) {
            if x1 + t < width {
                canvas.put_pixel(x1 + t, y, color);
            }
            if x2 >= t && x2 - t < width {
                canvas.put_pixel(x2 - t, y, color);
            }
        }
    }
}

/// Render detection overlays onto a copy of the input image
pub fn render_annotations(image: &DynamicImage, detections: &[Detection]) -> DynamicImage {
    let mut canvas = image.to_rgb8();
    let (width, height) = canvas.dimensions();
    if width == 0 || height == 0 {
        return DynamicImage::ImageRgb8(canvas);
    }

    // Mask fills first so box outlines stay crisp on top
    for det in detections {
        let Some(mask) = &det.mask else { continue };
        let color = color_for_label(&det.label);
        for y in 0..height {
            let my = (y as u64 * mask.height as u64 / height as u64) as u32;
            for x in 0..width {
                let mx = (x as u64 * mask.width as u64 / width as u64) as u32;
                if mask.probability_at(mx, my) >= MASK_THRESHOLD {
                    blend(canvas.get_pixel_mut(x, y), color, MASK_ALPHA);
                }
            }
        }
    }

    for det in detections {
        let color = color_for_label(&det.label);
        let x1 = (det.bbox.x1.round().max(0.0) as u32).min(width - 1);
        let y1 = (det.bbox.y1.round().max(0.0) as u32).min(height - 1);
        let x2 = (det.bbox.x2.round().max(0.0) as u32).min(width - 1);
        let y2 = (det.bbox.y2.round().max(0.0) as u32).min(height - 1);
        if x2 <= x1 || y2 <= y1 {
            continue;
        }
        draw_box_outline(&mut canvas, x1, y1, x2, y2, color);
    }

    DynamicImage::ImageRgb8(canvas)
}
