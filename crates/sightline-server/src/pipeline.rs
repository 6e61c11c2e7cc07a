//! Per-frame processing: decode, detect, filter, annotate, encode.
//!
//! CPU-bound stages run on the blocking pool so one slow frame never stalls
//! other sessions, and detection is bounded by `detect_timeout`. A detection
//! call that times out keeps running on its blocking thread; its result is
//! discarded.

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::histogram;
use sightline_core::{
    DecodeError, Detection, DetectionThreshold, DetectorError, EncodeError, Frame, FrameError,
    ResponseMode, SharedDetector,
};
use sightline_settings::PipelineSettings;
use sightline_vision::{EncodeOptions, OverlayStyle, annotate, codec};
use tracing::debug;

use crate::metrics::FRAME_STAGE_DURATION_SECONDS;
use crate::response::FrameResponse;
use crate::transport::Payload;

/// Pipeline behavior, fixed for the process lifetime.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    /// Reporting cutoff for the structured result.
    pub threshold: DetectionThreshold,
    /// What each response carries.
    pub response_mode: ResponseMode,
    /// Draw overlays on the outbound image.
    pub draw_overlays: bool,
    /// Output image format and quality.
    pub encode: EncodeOptions,
    /// Upper bound on one detection call.
    pub detect_timeout: Duration,
    /// Overlay colors and stroke.
    pub overlay: OverlayStyle,
}

impl PipelineConfig {
    /// Build from the `pipeline` settings section.
    pub fn from_settings(settings: &PipelineSettings) -> Self {
        Self {
            threshold: settings.confidence_threshold,
            response_mode: settings.response_mode,
            draw_overlays: settings.draw_overlays,
            encode: EncodeOptions {
                format: settings.output_format,
                jpeg_quality: settings.jpeg_quality,
            },
            detect_timeout: Duration::from_millis(settings.detect_timeout_ms),
            overlay: OverlayStyle::default(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_settings(&PipelineSettings::default())
    }
}

/// Shared, stateless frame processor. One instance serves every session.
pub struct FramePipeline {
    detector: SharedDetector,
    config: PipelineConfig,
}

impl FramePipeline {
    /// Create a pipeline around a constructed detector.
    pub fn new(detector: SharedDetector, config: PipelineConfig) -> Self {
        Self { detector, config }
    }

    /// Active configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Name of the detector backend.
    pub fn detector_name(&self) -> &str {
        self.detector.name()
    }

    /// Full push-mode path for one client payload.
    pub async fn process_payload(&self, payload: Payload) -> Result<FrameResponse, FrameError> {
        let frame = self.decode(payload).await?;
        self.process_frame(frame).await
    }

    /// Detect, filter and build the response for an already decoded frame.
    pub async fn process_frame(&self, frame: Frame) -> Result<FrameResponse, FrameError> {
        let frame = Arc::new(frame);
        let raw = self.detect(Arc::clone(&frame)).await?;
        let reported = self.config.threshold.filter(&raw);
        debug!(raw = raw.len(), reported = reported.len(), "frame detections");

        if !self.config.response_mode.includes_image() {
            return Ok(FrameResponse::detections_only(&reported));
        }
        let image = self.render(frame, raw).await?;
        Ok(FrameResponse::with_image(image, &reported))
    }

    /// Decode and detect only; used by the one-shot endpoint.
    pub async fn detect_payload(&self, payload: Payload) -> Result<Vec<Detection>, FrameError> {
        let frame = self.decode(payload).await?;
        let raw = self.detect(Arc::new(frame)).await?;
        Ok(self.config.threshold.filter(&raw))
    }

    /// Decode a client payload into a frame.
    pub async fn decode(&self, payload: Payload) -> Result<Frame, DecodeError> {
        let started = Instant::now();
        let frame = tokio::task::spawn_blocking(move || match payload {
            Payload::Text(text) => codec::decode_base64(&text),
            Payload::Binary(bytes) => codec::decode(&bytes),
        })
        .await
        .map_err(|e| DecodeError::Undecodable(format!("decode task failed: {e}")))??;
        record_stage("decode", started);
        Ok(frame)
    }

    /// Run the detector under the configured timeout.
    pub async fn detect(&self, frame: Arc<Frame>) -> Result<Vec<Detection>, DetectorError> {
        let started = Instant::now();
        let detector = Arc::clone(&self.detector);
        let limit = self.config.detect_timeout;
        let task = tokio::task::spawn_blocking(move || detector.infer(&frame));
        let detections = match tokio::time::timeout(limit, task).await {
            Err(_) => return Err(DetectorError::Timeout(limit)),
            Ok(Err(join)) => return Err(DetectorError::Join(join.to_string())),
            Ok(Ok(result)) => result?,
        };
        record_stage("detect", started);
        Ok(detections)
    }

    /// Annotate with every raw detection (when enabled) and encode to base64.
    async fn render(&self, frame: Arc<Frame>, raw: Vec<Detection>) -> Result<String, EncodeError> {
        let started = Instant::now();
        let draw = self.config.draw_overlays;
        let style = self.config.overlay;
        let options = self.config.encode;
        let image = tokio::task::spawn_blocking(move || {
            if draw {
                codec::encode_base64(&annotate(&frame, &raw, &style), options)
            } else {
                codec::encode_base64(&frame, options)
            }
        })
        .await
        .map_err(|e| EncodeError::Image(format!("encode task failed: {e}")))??;
        record_stage("encode", started);
        Ok(image)
    }
}

fn record_stage(stage: &'static str, started: Instant) {
    histogram!(FRAME_STAGE_DURATION_SECONDS, "stage" => stage)
        .record(started.elapsed().as_secs_f64());
}
