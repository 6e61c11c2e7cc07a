//! Settings type definitions.
//!
//! All field names are snake_case. Every section implements [`Default`] with
//! production values and is `#[serde(default)]`, so partial JSON is accepted.

mod detector;
mod pipeline;
mod server;

pub use detector::*;
pub use pipeline::*;
pub use server::*;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings for the Sightline server.
///
/// ```json
/// {
///   "server": { "port": 9000 },
///   "pipeline": { "response_mode": "detections_only" }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SightlineSettings {
    /// Listener and connection limits.
    pub server: ServerSettings,
    /// Per-frame processing.
    pub pipeline: PipelineSettings,
    /// Pull-mode capture source.
    pub capture: CaptureSettings,
    /// Detection capability backend.
    pub detector: DetectorSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl SightlineSettings {
    /// Reject values that deserialize but cannot run.
    pub fn validate(&self) -> Result<()> {
        fn invalid(msg: impl Into<String>) -> Result<()> {
            Err(SettingsError::InvalidValue(msg.into()))
        }

        if self.server.host.trim().is_empty() {
            return invalid("server.host must not be empty");
        }
        if self.server.max_connections == 0 {
            return invalid("server.max_connections must be at least 1");
        }
        if self.server.max_message_size == 0 {
            return invalid("server.max_message_size must be at least 1");
        }
        if !(1..=100).contains(&self.pipeline.jpeg_quality) {
            return invalid(format!(
                "pipeline.jpeg_quality must be 1-100, got {}",
                self.pipeline.jpeg_quality
            ));
        }
        if self.pipeline.detect_timeout_ms == 0 {
            return invalid("pipeline.detect_timeout_ms must be at least 1");
        }
        if self.capture.enabled && self.capture.source.trim().is_empty() {
            return invalid("capture.source is required when capture is enabled");
        }
        if self.detector.backend == DetectorBackend::Onnx && self.detector.model_path.is_none() {
            return invalid("detector.model_path is required for the onnx backend");
        }
        if self.detector.input_size == 0 || self.detector.input_size % 32 != 0 {
            return invalid(format!(
                "detector.input_size must be a positive multiple of 32, got {}",
                self.detector.input_size
            ));
        }
        if !(0.0..=1.0).contains(&self.detector.iou_threshold) {
            return invalid("detector.iou_threshold must be within [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.detector.min_confidence) {
            return invalid("detector.min_confidence must be within [0, 1]");
        }
        if self.detector.intra_threads == 0 {
            return invalid("detector.intra_threads must be at least 1");
        }
        Ok(())
    }
}
