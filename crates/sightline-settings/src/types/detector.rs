//! Detection capability backend selection.

use serde::{Deserialize, Serialize};
use sightline_core::Detection;

/// Which detector implementation to construct at startup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorBackend {
    /// Fixed detection list for every frame.
    #[default]
    Static,
    /// YOLO-style ONNX model (requires the `onnx` feature).
    Onnx,
}

impl std::str::FromStr for DetectorBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "static" => Ok(Self::Static),
            "onnx" => Ok(Self::Onnx),
            other => Err(format!("unknown detector backend: {other}")),
        }
    }
}

/// Detector construction parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorSettings {
    /// Backend implementation.
    pub backend: DetectorBackend,
    /// ONNX model file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_path: Option<String>,
    /// Class names indexed by class id. Missing entries become `class_<n>`.
    pub labels: Vec<String>,
    /// Square model input edge in pixels.
    pub input_size: u32,
    /// Overlap above which lower-scored boxes of the same class are dropped.
    pub iou_threshold: f32,
    /// Candidates below this score are discarded inside the backend.
    pub min_confidence: f32,
    /// Inference threads for the ONNX session.
    pub intra_threads: usize,
    /// Detections returned by the static backend.
    pub static_detections: Vec<Detection>,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            backend: DetectorBackend::default(),
            model_path: None,
            labels: Vec::new(),
            input_size: 640,
            iou_threshold: 0.45,
            min_confidence: 0.25,
            intra_threads: 1,
            static_detections: Vec::new(),
        }
    }
}
