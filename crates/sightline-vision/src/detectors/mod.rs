//! Detector backends and startup construction.

#[cfg(feature = "onnx")]
mod onnx;
mod stub;
pub mod yolo;

use std::sync::Arc;

use sightline_core::{DetectorError, SharedDetector};
use sightline_settings::{DetectorBackend, DetectorSettings};
use tracing::info;

#[cfg(feature = "onnx")]
pub use onnx::YoloOnnxDetector;
pub use stub::StaticDetector;

/// Construct and warm up the configured backend.
///
/// Any error is capability-fatal: the process has no purpose without a
/// working detector.
pub fn build_detector(settings: &DetectorSettings) -> Result<SharedDetector, DetectorError> {
    let detector: SharedDetector = match settings.backend {
        DetectorBackend::Static => Arc::new(StaticDetector::new(settings.static_detections.clone())),
        DetectorBackend::Onnx => build_onnx(settings)?,
    };
    detector.warm_up()?;
    info!(backend = detector.name(), "detector ready");
    Ok(detector)
}

#[cfg(feature = "onnx")]
fn build_onnx(settings: &DetectorSettings) -> Result<SharedDetector, DetectorError> {
    Ok(Arc::new(YoloOnnxDetector::load(settings)?))
}

#[cfg(not(feature = "onnx"))]
fn build_onnx(_settings: &DetectorSettings) -> Result<SharedDetector, DetectorError> {
    Err(DetectorError::Unavailable(
        "the onnx backend requires the `onnx` feature".into(),
    ))
}
