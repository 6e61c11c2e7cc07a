//! YOLOv8-style pre/post-processing, independent of the inference runtime.
//!
//! Input: the frame is letterboxed into a square of `input_size` with gray
//! padding. Output: a `[1, 4 + num_classes, num_anchors]` tensor where rows
//! 0..4 are `cx, cy, w, h` in letterbox pixels and the remaining rows are
//! per-class scores.

use sightline_core::{BoundingBox, Detection};

/// Padding value used by the reference exporter.
pub const PAD_VALUE: u8 = 114;

/// Mapping between frame coordinates and the square model input.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Letterbox {
    /// Frame-to-input scale factor.
    pub scale: f32,
    /// Horizontal padding in input pixels.
    pub pad_x: f32,
    /// Vertical padding in input pixels.
    pub pad_y: f32,
    /// Width of the resized frame inside the input.
    pub resized_width: u32,
    /// Height of the resized frame inside the input.
    pub resized_height: u32,
}

impl Letterbox {
    /// Fit a `width` x `height` frame into a square of `input_size`.
    pub fn fit(width: u32, height: u32, input_size: u32) -> Self {
        let scale = (input_size as f32 / width as f32).min(input_size as f32 / height as f32);
        let resized_width = ((width as f32 * scale).round() as u32).clamp(1, input_size);
        let resized_height = ((height as f32 * scale).round() as u32).clamp(1, input_size);
        Self {
            scale,
            pad_x: (input_size - resized_width) as f32 / 2.0,
            pad_y: (input_size - resized_height) as f32 / 2.0,
            resized_width,
            resized_height,
        }
    }

    /// Map a point from input space back to frame space.
    pub fn unmap(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// Parameters for turning raw output into detections.
#[derive(Clone, Debug)]
pub struct Postprocess<'a> {
    /// Class names by index.
    pub labels: &'a [String],
    /// Candidates below this score are discarded.
    pub min_confidence: f32,
    /// Same-class overlap above which the lower-scored box is suppressed.
    pub iou_threshold: f32,
    /// Letterbox used to build the input.
    pub letterbox: Letterbox,
    /// Source frame width, for clamping.
    pub frame_width: u32,
    /// Source frame height, for clamping.
    pub frame_height: u32,
}

/// Name for a class index, falling back to `class_<n>`.
pub fn label_for(labels: &[String], index: usize) -> String {
    labels
        .get(index)
        .cloned()
        .unwrap_or_else(|| format!("class_{index}"))
}

/// Decode a `[1, 4 + nc, n]` output into frame-space detections.
///
/// `rows` is `4 + nc` and `anchors` is `n`; `data` is row-major.
pub fn decode_output(
    data: &[f32],
    rows: usize,
    anchors: usize,
    params: &Postprocess<'_>,
) -> Result<Vec<Detection>, String> {
    if rows <= 4 {
        return Err(format!("expected at least 5 output rows, got {rows}"));
    }
    if data.len() < rows * anchors {
        return Err(format!(
            "output has {} values, expected {}",
            data.len(),
            rows * anchors
        ));
    }
    let at = |row: usize, col: usize| data[row * anchors + col];
    let max_x = params.frame_width as f32;
    let max_y = params.frame_height as f32;

    let mut candidates = Vec::new();
    for col in 0..anchors {
        let (class_index, score) = (4..rows)
            .map(|row| (row - 4, at(row, col)))
            .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });
        if !score.is_finite() || score < params.min_confidence {
            continue;
        }

        let (cx, cy, w, h) = (at(0, col), at(1, col), at(2, col), at(3, col));
        let (x1, y1) = params.letterbox.unmap(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = params.letterbox.unmap(cx + w / 2.0, cy + h / 2.0);
        let Some(bbox) = BoundingBox::from_xyxy(
            x1.clamp(0.0, max_x),
            y1.clamp(0.0, max_y),
            x2.clamp(0.0, max_x),
            y2.clamp(0.0, max_y),
        ) else {
            continue;
        };
        candidates.push(Detection::new(
            label_for(params.labels, class_index),
            class_index,
            f64::from(score),
            bbox,
        ));
    }

    Ok(non_max_suppression(candidates, f64::from(params.iou_threshold)))
}

/// Greedy per-class non-maximum suppression, highest score first.
pub fn non_max_suppression(mut candidates: Vec<Detection>, iou_threshold: f64) -> Vec<Detection> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<Detection> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let suppressed = kept.iter().any(|k| {
            k.class_index == candidate.class_index && k.bbox.iou(&candidate.bbox) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}
