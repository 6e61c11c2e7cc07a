//! Per-frame processing and pull-mode capture settings.

use serde::{Deserialize, Serialize};
use sightline_core::{DetectionThreshold, OutputFormat, Pacing, ResponseMode};

/// How each frame is processed and what is sent back.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Reporting cutoff for the outbound detection list.
    pub confidence_threshold: DetectionThreshold,
    /// Response variant for every session.
    pub response_mode: ResponseMode,
    /// Draw boxes and captions on outbound images.
    pub draw_overlays: bool,
    /// Compressed format of outbound images.
    pub output_format: OutputFormat,
    /// JPEG quality, 1 to 100.
    pub jpeg_quality: u8,
    /// Upper bound on one detection call, in milliseconds.
    pub detect_timeout_ms: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: DetectionThreshold::default(),
            response_mode: ResponseMode::default(),
            draw_overlays: true,
            output_format: OutputFormat::default(),
            jpeg_quality: 90,
            detect_timeout_ms: 5_000,
        }
    }
}

/// Server-owned capture source for pull-mode sessions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Whether the pull endpoint is served.
    pub enabled: bool,
    /// Image file, directory of images, or `synthetic:WxH`.
    pub source: String,
    /// Inter-frame interval in milliseconds.
    pub frame_interval_ms: u64,
    /// Interval semantics.
    pub pacing: Pacing,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            source: "synthetic:640x480".to_string(),
            frame_interval_ms: 30,
            pacing: Pacing::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_defaults() {
        let p = PipelineSettings::default();
        assert_eq!(p.confidence_threshold.value(), 0.75);
        assert_eq!(p.response_mode, ResponseMode::ImageWithDetections);
        assert!(p.draw_overlays);
        assert_eq!(p.output_format, OutputFormat::Jpeg);
        assert_eq!(p.jpeg_quality, 90);
        assert_eq!(p.detect_timeout_ms, 5_000);
    }

    #[test]
    fn pipeline_rejects_threshold_out_of_range() {
        let err = serde_json::from_str::<PipelineSettings>(r#"{"confidence_threshold": 1.5}"#);
        assert!(err.is_err());
    }

    #[test]
    fn pipeline_parses_modes() {
        let p: PipelineSettings = serde_json::from_str(
            r#"{"response_mode": "detections_only", "output_format": "png"}"#,
        )
        .unwrap();
        assert_eq!(p.response_mode, ResponseMode::DetectionsOnly);
        assert_eq!(p.output_format, OutputFormat::Png);
    }

    #[test]
    fn capture_defaults() {
        let c = CaptureSettings::default();
        assert!(!c.enabled);
        assert_eq!(c.frame_interval_ms, 30);
        assert_eq!(c.pacing, Pacing::FixedDelay);
    }
}
