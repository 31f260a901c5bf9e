// Version information for the Microvision Node

/// Full version string with feature description
pub const VERSION: &str = "v0.1.0-detection-history-2025-08";

/// Semantic version number
pub const VERSION_NUMBER: &str = env!("CARGO_PKG_VERSION");

/// Build date
pub const BUILD_DATE: &str = "2025-08-23";

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "onnx-detection",
    "instance-masks",
    "density-statistics",
    "annotated-output",
    "prediction-history",
    "tiff-conversion",
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("Microvision Node {} ({})", VERSION_NUMBER, BUILD_DATE)
}
