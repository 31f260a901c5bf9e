// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Environment-based node configuration
//!
//! Everything has a default so the node starts with no environment at all,
//! matching how the rest of the stack reads its settings.

use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::PathBuf;

/// Runtime configuration, resolved once at startup
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Port for the HTTP API
    pub api_port: u16,
    /// Directory for per-request output artifacts
    pub output_dir: PathBuf,
    /// Path to the ONNX detection weights
    pub model_path: PathBuf,
    /// Class names by index; empty means generated `class_<i>` names
    pub class_names: Vec<String>,
    /// Minimum detection confidence
    pub confidence_threshold: f32,
    /// NMS IoU threshold
    pub iou_threshold: f32,
    /// Model input size (square, letterboxed)
    pub input_size: u32,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            api_port: 8080,
            output_dir: PathBuf::from("./runs"),
            model_path: PathBuf::from("./models/detector.onnx"),
            class_names: Vec::new(),
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
            input_size: 640,
        }
    }
}

impl NodeConfig {
    /// Build configuration from environment variables
    ///
    /// Recognized variables (all optional):
    /// - `API_PORT` - HTTP port (default 8080)
    /// - `OUTPUT_DIR` - artifact directory (default ./runs)
    /// - `MODEL_PATH` - ONNX weights (default ./models/detector.onnx)
    /// - `MODEL_LABELS` - comma-separated class names
    /// - `MODEL_LABELS_FILE` - newline-separated class names, wins over MODEL_LABELS
    /// - `CONFIDENCE_THRESHOLD`, `IOU_THRESHOLD`, `INPUT_SIZE`
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let api_port = env::var("API_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(defaults.api_port);

        let output_dir = env::var("OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.output_dir);

        let model_path = env::var("MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.model_path);

        let class_names = if let Ok(path) = env::var("MODEL_LABELS_FILE") {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read labels file: {}", path))?;
            parse_labels(&contents, '\n')
        } else if let Ok(labels) = env::var("MODEL_LABELS") {
            parse_labels(&labels, ',')
        } else {
            Vec::new()
        };

        let confidence_threshold = env::var("CONFIDENCE_THRESHOLD")
            .ok()
            .and_then(|v| v.parse::<f32>().ok())
            .unwrap_or(defaults.confidence_threshold);

        let iou_threshold = env::var("IOU_THRESHOLD")
            .ok()
            .and_then(|v| v.parse::<f32>().ok())
            .unwrap_or(defaults.iou_threshold);

        let input_size = env::var("INPUT_SIZE")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(defaults.input_size);

        Ok(Self {
            api_port,
            output_dir,
            model_path,
            class_names,
            confidence_threshold,
            iou_threshold,
            input_size,
        })
    }

    /// Create the artifact directory if it does not exist
    pub fn ensure_output_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.output_dir).with_context(|| {
            format!(
                "Failed to create output directory: {}",
                self.output_dir.display()
            )
        })
    }
}

fn parse_labels(raw: &str, separator: char) -> Vec<String> {
    raw.split(separator)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
