//! Detections produced by the capability and the threshold that filters them.

use serde::{Deserialize, Serialize};

/// Default reporting cutoff for detection confidence.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.75;

/// Axis-aligned box in absolute pixel coordinates, `x1 < x2` and `y1 < y2`.
///
/// Serialized as `[x1, y1, x2, y2]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "[i32; 4]", try_from = "[i32; 4]")]
pub struct BoundingBox {
    /// Left edge.
    pub x1: i32,
    /// Top edge.
    pub y1: i32,
    /// Right edge.
    pub x2: i32,
    /// Bottom edge.
    pub y2: i32,
}

impl BoundingBox {
    /// Build a box, returning `None` for degenerate or inverted corners.
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Option<Self> {
        (x1 < x2 && y1 < y2).then_some(Self { x1, y1, x2, y2 })
    }

    /// Build a box from floating-point corners, truncating toward zero.
    pub fn from_xyxy(x1: f32, y1: f32, x2: f32, y2: f32) -> Option<Self> {
        if !(x1.is_finite() && y1.is_finite() && x2.is_finite() && y2.is_finite()) {
            return None;
        }
        Self::new(x1 as i32, y1 as i32, x2 as i32, y2 as i32)
    }

    /// Box width in pixels.
    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    /// Box height in pixels.
    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }

    /// Box area in square pixels.
    pub fn area(&self) -> i64 {
        i64::from(self.width()) * i64::from(self.height())
    }

    /// Intersection-over-union with another box, in `[0, 1]`.
    pub fn iou(&self, other: &Self) -> f64 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        if ix1 >= ix2 || iy1 >= iy2 {
            return 0.0;
        }
        let intersection = i64::from(ix2 - ix1) * i64::from(iy2 - iy1);
        let union = self.area() + other.area() - intersection;
        intersection as f64 / union as f64
    }

    /// As `[x1, y1, x2, y2]`.
    pub fn to_array(self) -> [i32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

impl From<BoundingBox> for [i32; 4] {
    fn from(b: BoundingBox) -> Self {
        b.to_array()
    }
}

impl TryFrom<[i32; 4]> for BoundingBox {
    type Error = String;

    fn try_from([x1, y1, x2, y2]: [i32; 4]) -> Result<Self, Self::Error> {
        Self::new(x1, y1, x2, y2)
            .ok_or_else(|| format!("degenerate box [{x1}, {y1}, {x2}, {y2}]"))
    }
}

/// One labeled, scored bounding box returned by the detection capability.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Class name.
    pub label: String,
    /// Index of the class in the model's label table.
    #[serde(default)]
    pub class_index: usize,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Location in the input frame.
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
}

impl Detection {
    /// Create a detection, clamping confidence into `[0, 1]`.
    pub fn new(
        label: impl Into<String>,
        class_index: usize,
        confidence: f64,
        bbox: BoundingBox,
    ) -> Self {
        Self {
            label: label.into(),
            class_index,
            confidence: confidence.clamp(0.0, 1.0),
            bbox,
        }
    }

    /// Overlay caption, e.g. `"box 0.90"`.
    pub fn caption(&self) -> String {
        format!("{} {:.2}", self.label, self.confidence)
    }
}

/// Confidence cutoff applied to the outbound summary.
///
/// Detections with `confidence >= threshold` are reported. The cutoff never
/// affects which detections are drawn on the frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct DetectionThreshold(f64);

impl DetectionThreshold {
    /// Build a threshold, returning `None` outside `[0, 1]` or for NaN.
    pub fn new(value: f64) -> Option<Self> {
        (0.0..=1.0).contains(&value).then_some(Self(value))
    }

    /// The cutoff value.
    pub fn value(self) -> f64 {
        self.0
    }

    /// Whether a detection is reported.
    pub fn passes(self, detection: &Detection) -> bool {
        detection.confidence >= self.0
    }

    /// Detections that pass the cutoff, in their original order.
    pub fn filter(self, detections: &[Detection]) -> Vec<Detection> {
        detections
            .iter()
            .filter(|d| self.passes(d))
            .cloned()
            .collect()
    }
}

impl Default for DetectionThreshold {
    fn default() -> Self {
        Self(DEFAULT_CONFIDENCE_THRESHOLD)
    }
}

impl TryFrom<f64> for DetectionThreshold {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("threshold {value} outside [0, 1]"))
    }
}

impl From<DetectionThreshold> for f64 {
    fn from(t: DetectionThreshold) -> Self {
        t.0
    }
}
