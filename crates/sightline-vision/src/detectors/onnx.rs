//! ONNX Runtime YOLO detector (feature-gated behind `onnx`).

use image::imageops::{self, FilterType};
use ndarray::Array4;
use parking_lot::Mutex;
use sightline_core::{Detection, Detector, DetectorError, Frame};
use sightline_settings::DetectorSettings;
use tracing::{debug, info};

use super::yolo::{self, Letterbox, PAD_VALUE, Postprocess};
use crate::codec;

/// YOLOv8-style detector backed by an `ort` session.
///
/// The session requires exclusive access per run, so concurrent calls from
/// different sessions are serialized on an internal lock.
pub struct YoloOnnxDetector {
    session: Mutex<ort::session::Session>,
    labels: Vec<String>,
    input_size: u32,
    iou_threshold: f32,
    min_confidence: f32,
}

impl YoloOnnxDetector {
    /// Load the model named in `settings`. Failure is capability-fatal.
    pub fn load(settings: &DetectorSettings) -> Result<Self, DetectorError> {
        let model_path = settings
            .model_path
            .as_deref()
            .ok_or_else(|| DetectorError::Unavailable("no model path configured".into()))?;
        info!(model = model_path, "loading ONNX detection model");

        let session = ort::session::Session::builder()
            .map_err(|e| DetectorError::Unavailable(format!("session builder: {e}")))?
            .with_intra_threads(settings.intra_threads)
            .map_err(|e| DetectorError::Unavailable(format!("thread config: {e}")))?
            .with_log_level(ort::logging::LogLevel::Warning)
            .map_err(|e| DetectorError::Unavailable(format!("log level: {e}")))?
            .commit_from_file(model_path)
            .map_err(|e| DetectorError::Unavailable(format!("model load ({model_path}): {e}")))?;

        Ok(Self {
            session: Mutex::new(session),
            labels: settings.labels.clone(),
            input_size: settings.input_size,
            iou_threshold: settings.iou_threshold,
            min_confidence: settings.min_confidence,
        })
    }

    fn preprocess(&self, frame: &Frame) -> Result<(Vec<f32>, Letterbox), DetectorError> {
        let size = self.input_size;
        let letterbox = Letterbox::fit(frame.width(), frame.height(), size);
        let rgb = codec::to_dynamic(frame)
            .map_err(|e| DetectorError::Inference(e.to_string()))?
            .to_rgb8();
        let resized = imageops::resize(
            &rgb,
            letterbox.resized_width,
            letterbox.resized_height,
            FilterType::Triangle,
        );

        let side = size as usize;
        let pad = f32::from(PAD_VALUE) / 255.0;
        let mut input = Array4::<f32>::from_elem((1, 3, side, side), pad);
        let (ox, oy) = (letterbox.pad_x as usize, letterbox.pad_y as usize);
        for (x, y, pixel) in resized.enumerate_pixels() {
            let (ix, iy) = (ox + x as usize, oy + y as usize);
            for c in 0..3 {
                input[[0, c, iy, ix]] = f32::from(pixel[c]) / 255.0;
            }
        }
        let (data, _) = input.into_raw_vec_and_offset();
        Ok((data, letterbox))
    }
}

impl Detector for YoloOnnxDetector {
    fn name(&self) -> &str {
        "onnx"
    }

    fn infer(&self, frame: &Frame) -> Result<Vec<Detection>, DetectorError> {
        let (data, letterbox) = self.preprocess(frame)?;
        let side = i64::from(self.input_size);
        let tensor = ort::value::Tensor::from_array((vec![1, 3, side, side], data))
            .map_err(|e| DetectorError::Inference(format!("input tensor: {e}")))?;

        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| DetectorError::Inference(format!("inference: {e}")))?;

        let (shape, values) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::Inference(format!("extract tensor: {e}")))?;
        let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
        let [1, rows, anchors] = dims[..] else {
            return Err(DetectorError::Inference(format!(
                "unexpected output shape: {shape:?}"
            )));
        };

        let params = Postprocess {
            labels: &self.labels,
            min_confidence: self.min_confidence,
            iou_threshold: self.iou_threshold,
            letterbox,
            frame_width: frame.width(),
            frame_height: frame.height(),
        };
        let detections =
            yolo::decode_output(values, rows, anchors, &params).map_err(DetectorError::Inference)?;
        debug!(count = detections.len(), "onnx inference complete");
        Ok(detections)
    }

    fn warm_up(&self) -> Result<(), DetectorError> {
        let blank = Frame::filled(self.input_size, self.input_size, [PAD_VALUE; 3])
            .map_err(|e| DetectorError::Unavailable(e.to_string()))?;
        self.infer(&blank)
            .map(|_| ())
            .map_err(|e| DetectorError::Unavailable(format!("warm-up failed: {e}")))
    }
}
