// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ONNX detection model wrapper
//!
//! Runs a YOLO-style detection or instance-segmentation model exported to
//! ONNX. The session is built with CUDA first and falls back to CPU when no
//! GPU is available.
//!
//! Expected model I/O:
//! - input `images`: [1, 3, S, S] f32, RGB, 0..1
//! - output 0: [1, 4 + num_classes (+ num_mask_coeffs), num_anchors]
//! - output 1 (segmentation models only): mask prototypes [1, nm, H/4, W/4]

use anyhow::{Context, Result};
use image::{imageops::FilterType, DynamicImage, GenericImageView};
use ndarray::{Array4, ArrayViewD};
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use super::{BoundingBox, Detection, Detector, InstanceMask};

/// Configuration for the ONNX detection backend
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Path to the ONNX weights file
    pub model_path: PathBuf,
    /// Class names by index; missing indices get generated names
    pub class_names: Vec<String>,
    /// Minimum confidence for a candidate to survive
    pub confidence_threshold: f32,
    /// IoU threshold for non-max suppression
    pub iou_threshold: f32,
    /// Square input size the model expects (letterboxed)
    pub input_size: u32,
}

impl DetectorConfig {
    pub fn new<P: AsRef<Path>>(model_path: P) -> Self {
        Self {
            model_path: model_path.as_ref().to_path_buf(),
            class_names: Vec::new(),
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
            input_size: 640,
        }
    }
}

/// Letterbox geometry mapping the original image into the model input
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
}

pub(crate) fn letterbox_dims(orig_w: u32, orig_h: u32, target: u32) -> Letterbox {
    let scale = (target as f32 / orig_w as f32).min(target as f32 / orig_h as f32);
    let new_w = (orig_w as f32 * scale).round();
    let new_h = (orig_h as f32 * scale).round();
    Letterbox {
        scale,
        pad_x: (target as f32 - new_w) / 2.0,
        pad_y: (target as f32 - new_h) / 2.0,
    }
}

pub(crate) fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// A raw detection candidate before NMS
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub class_idx: usize,
    pub confidence: f32,
    pub bbox: BoundingBox,
    pub mask_coeffs: Vec<f32>,
}

/// Greedy per-class non-max suppression, highest confidence first
pub(crate) fn non_max_suppression(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let mut kept: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        let suppressed = kept.iter().any(|k| {
            k.class_idx == candidate.class_idx && k.bbox.iou(&candidate.bbox) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

/// ONNX-backed detection model
pub struct OnnxDetector {
    session: Arc<Mutex<Session>>,
    config: DetectorConfig,
    model_name: String,
    has_mask_output: bool,
}

impl std::fmt::Debug for OnnxDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxDetector")
            .field("model_name", &self.model_name)
            .field("input_size", &self.config.input_size)
            .field("has_mask_output", &self.has_mask_output)
            .finish_non_exhaustive()
    }
}

impl OnnxDetector {
    /// Load the detection model from disk
    ///
    /// Tries the CUDA execution provider first and falls back to CPU, the
    /// same way the embedding models are loaded elsewhere in the stack.
    pub fn new(config: DetectorConfig) -> Result<Self> {
        if !config.model_path.exists() {
            anyhow::bail!(
                "Detection model file not found: {}",
                config.model_path.display()
            );
        }

        info!("Loading ONNX detection model: {}", config.model_path.display());

        let cuda_result = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CUDAExecutionProvider::default().build()])
            .context("Failed to set CUDA execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(4)
            .context("Failed to set intra threads")?
            .commit_from_file(&config.model_path);

        let session = match cuda_result {
            Ok(s) => {
                info!("CUDA execution provider initialized");
                s
            }
            Err(e) => {
                warn!("CUDA execution provider unavailable ({}), using CPU", e);
                Session::builder()
                    .context("Failed to create session builder")?
                    .with_execution_providers([CPUExecutionProvider::default().build()])
                    .context("Failed to set CPU execution provider")?
                    .with_optimization_level(GraphOptimizationLevel::Level3)
                    .context("Failed to set optimization level")?
                    .with_intra_threads(4)
                    .context("Failed to set intra threads")?
                    .commit_from_file(&config.model_path)
                    .context(format!(
                        "Failed to load ONNX model from {}",
                        config.model_path.display()
                    ))?
            }
        };

        let has_mask_output = session.outputs.len() > 1;
        let model_name = config
            .model_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "detector".to_string());

        info!(
            "Detection model loaded: {} ({} output{}, masks: {})",
            model_name,
            session.outputs.len(),
            if session.outputs.len() == 1 { "" } else { "s" },
            has_mask_output
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            config,
            model_name,
            has_mask_output,
        })
    }

    fn label_for(&self, class_idx: usize) -> String {
        self.config
            .class_names
            .get(class_idx)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", class_idx))
    }

    /// Letterbox the image into an NCHW tensor, gray padding
    fn preprocess(&self, image: &DynamicImage) -> (Array4<f32>, Letterbox) {
        let size = self.config.input_size;
        let (orig_w, orig_h) = image.dimensions();
        let letterbox = letterbox_dims(orig_w, orig_h, size);

        let new_w = ((orig_w as f32 * letterbox.scale).round() as u32).max(1);
        let new_h = ((orig_h as f32 * letterbox.scale).round() as u32).max(1);
        let resized = image.resize_exact(new_w, new_h, FilterType::Triangle).to_rgb8();

        let mut input = Array4::<f32>::from_elem(
            (1, 3, size as usize, size as usize),
            114.0 / 255.0,
        );
        let x0 = letterbox.pad_x.round() as usize;
        let y0 = letterbox.pad_y.round() as usize;
        for (px, py, pixel) in resized.enumerate_pixels() {
            let x = x0 + px as usize;
            let y = y0 + py as usize;
            if x < size as usize && y < size as usize {
                input[[0, 0, y, x]] = pixel[0] as f32 / 255.0;
                input[[0, 1, y, x]] = pixel[1] as f32 / 255.0;
                input[[0, 2, y, x]] = pixel[2] as f32 / 255.0;
            }
        }
        (input, letterbox)
    }

    /// Decode the prediction head into candidates in original-image space
    fn collect_candidates(
        &self,
        output: &ArrayViewD<'_, f32>,
        letterbox: &Letterbox,
        orig_w: u32,
        orig_h: u32,
        num_mask_coeffs: usize,
    ) -> Vec<Candidate> {
        let shape = output.shape();
        if shape.len() != 3 {
            return Vec::new();
        }
        let channels = shape[1];
        let anchors = shape[2];
        if channels < 5 + num_mask_coeffs {
            return Vec::new();
        }
        let num_classes = channels - 4 - num_mask_coeffs;

        let mut candidates = Vec::new();
        for n in 0..anchors {
            let mut best_class = 0usize;
            let mut best_score = 0f32;
            for c in 0..num_classes {
                let score = output[[0, 4 + c, n]];
                if score > best_score {
                    best_score = score;
                    best_class = c;
                }
            }
            if best_score < self.config.confidence_threshold {
                continue;
            }

            let cx = output[[0, 0, n]];
            let cy = output[[0, 1, n]];
            let w = output[[0, 2, n]];
            let h = output[[0, 3, n]];

            // Undo the letterbox and clamp to the original frame
            let x1 = ((cx - w / 2.0 - letterbox.pad_x) / letterbox.scale).clamp(0.0, orig_w as f32);
            let y1 = ((cy - h / 2.0 - letterbox.pad_y) / letterbox.scale).clamp(0.0, orig_h as f32);
            let x2 = ((cx + w / 2.0 - letterbox.pad_x) / letterbox.scale).clamp(0.0, orig_w as f32);
            let y2 = ((cy + h / 2.0 - letterbox.pad_y) / letterbox.scale).clamp(0.0, orig_h as f32);
            if x2 <= x1 || y2 <= y1 {
                continue;
            }

            let mask_coeffs = (0..num_mask_coeffs)
                .map(|k| output[[0, 4 + num_classes + k, n]])
                .collect();

            candidates.push(Candidate {
                class_idx: best_class,
                confidence: best_score,
                bbox: BoundingBox { x1, y1, x2, y2 },
                mask_coeffs,
            });
        }
        candidates
    }

    /// Combine mask prototypes with a candidate's coefficients into a
    /// full-frame instance mask, cropped to the letterbox content region and
    /// zeroed outside the candidate's box
    fn assemble_mask(
        &self,
        protos: &ArrayViewD<'_, f32>,
        candidate: &Candidate,
        letterbox: &Letterbox,
        orig_w: u32,
        orig_h: u32,
    ) -> Option<InstanceMask> {
        let shape = protos.shape();
        if shape.len() != 4 || shape[1] != candidate.mask_coeffs.len() {
            return None;
        }
        let nm = shape[1];
        let proto_h = shape[2];
        let proto_w = shape[3];
        let input = self.config.input_size as f32;

        let ratio_x = proto_w as f32 / input;
        let ratio_y = proto_h as f32 / input;
        let crop_x0 = (letterbox.pad_x * ratio_x).round() as usize;
        let crop_y0 = (letterbox.pad_y * ratio_y).round() as usize;
        let crop_w = (((orig_w as f32 * letterbox.scale) * ratio_x).round() as usize)
            .clamp(1, proto_w - crop_x0.min(proto_w - 1));
        let crop_h = (((orig_h as f32 * letterbox.scale) * ratio_y).round() as usize)
            .clamp(1, proto_h - crop_y0.min(proto_h - 1));

        let mut data = vec![0.0f32; crop_w * crop_h];
        for y in 0..crop_h {
            // Center of this mask pixel in original-image coordinates
            let oy = (y as f32 + 0.5) / crop_h as f32 * orig_h as f32;
            for x in 0..crop_w {
                let ox = (x as f32 + 0.5) / crop_w as f32 * orig_w as f32;
                if ox < candidate.bbox.x1
                    || ox > candidate.bbox.x2
                    || oy < candidate.bbox.y1
                    || oy > candidate.bbox.y2
                {
                    continue;
                }
                let mut logit = 0.0f32;
                for k in 0..nm {
                    logit += candidate.mask_coeffs[k] * protos[[0, k, crop_y0 + y, crop_x0 + x]];
                }
                data[y * crop_w + x] = sigmoid(logit);
            }
        }

        Some(InstanceMask {
            width: crop_w as u32,
            height: crop_h as u32,
            data,
        })
    }
}

impl Detector for OnnxDetector {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>> {
        let (orig_w, orig_h) = image.dimensions();
        let (input, letterbox) = self.preprocess(image);

        // Lock the session for the duration of the call; the runtime is not
        // assumed reentrant.
        let mut session = self.session.lock().unwrap_or_else(|e| e.into_inner());
        let outputs = session
            .run(ort::inputs!["images" => Value::from_array(input)?])
            .context("Detection inference failed")?;

        let prediction = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract prediction tensor")?;

        let protos = if self.has_mask_output {
            Some(
                outputs[1]
                    .try_extract_array::<f32>()
                    .context("Failed to extract mask prototype tensor")?,
            )
        } else {
            None
        };
        let num_mask_coeffs = protos.as_ref().map(|p| p.shape()[1]).unwrap_or(0);

        let candidates =
            self.collect_candidates(&prediction, &letterbox, orig_w, orig_h, num_mask_coeffs);
        debug!(
            "Detection raw candidates: {} (threshold {})",
            candidates.len(),
            self.config.confidence_threshold
        );

        let kept = non_max_suppression(candidates, self.config.iou_threshold);

        let detections = kept
            .into_iter()
            .map(|candidate| {
                let mask = protos.as_ref().and_then(|p| {
                    self.assemble_mask(p, &candidate, &letterbox, orig_w, orig_h)
                });
                Detection {
                    label: self.label_for(candidate.class_idx),
                    confidence: candidate.confidence,
                    bbox: candidate.bbox,
                    mask,
                }
            })
            .collect::<Vec<_>>();

        debug!("Detection complete: {} objects", detections.len());
        Ok(detections)
    }

    fn name(&self) -> &str {
        &self.model_name
    }
}
