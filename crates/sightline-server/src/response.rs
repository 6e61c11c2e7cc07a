//! Outbound message shapes.
//!
//! Every endpoint uses the same record with the box under `"box"`:
//!
//! ```text
//! { "image": "<base64>", "detections": [ {"label": .., "confidence": .., "box": [x1,y1,x2,y2]} ] }
//! { "detections": [ .. ] }
//! ```

use serde::{Deserialize, Serialize};
use sightline_core::{Detection, EncodeError};

/// One reported detection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    /// Class name.
    pub label: String,
    /// Score in `[0, 1]`.
    pub confidence: f64,
    /// `[x1, y1, x2, y2]` in source-frame pixels.
    #[serde(rename = "box")]
    pub bbox: [i32; 4],
}

impl From<&Detection> for DetectionRecord {
    fn from(detection: &Detection) -> Self {
        Self {
            label: detection.label.clone(),
            confidence: detection.confidence,
            bbox: detection.bbox.to_array(),
        }
    }
}

/// The response for one frame; the variant is fixed per session by its
/// [`ResponseMode`](sightline_core::ResponseMode).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FrameResponse {
    /// Encoded (and usually annotated) frame plus filtered detections.
    ImageWithDetections {
        /// Base64-encoded image in the configured output format.
        image: String,
        /// Detections at or above the threshold.
        detections: Vec<DetectionRecord>,
    },
    /// Filtered detections only.
    DetectionsOnly {
        /// Detections at or above the threshold.
        detections: Vec<DetectionRecord>,
    },
}

impl FrameResponse {
    /// Build an image response.
    pub fn with_image(image: String, detections: &[Detection]) -> Self {
        Self::ImageWithDetections {
            image,
            detections: records(detections),
        }
    }

    /// Build a detections-only response.
    pub fn detections_only(detections: &[Detection]) -> Self {
        Self::DetectionsOnly {
            detections: records(detections),
        }
    }

    /// Reported detections.
    pub fn detections(&self) -> &[DetectionRecord] {
        match self {
            Self::ImageWithDetections { detections, .. } | Self::DetectionsOnly { detections } => {
                detections
            }
        }
    }

    /// The encoded image, if this variant carries one.
    pub fn image(&self) -> Option<&str> {
        match self {
            Self::ImageWithDetections { image, .. } => Some(image),
            Self::DetectionsOnly { .. } => None,
        }
    }

    /// Serialize for the wire.
    pub fn to_json(&self) -> Result<String, EncodeError> {
        serde_json::to_string(self).map_err(|e| EncodeError::Serialize(e.to_string()))
    }
}

fn records(detections: &[Detection]) -> Vec<DetectionRecord> {
    detections.iter().map(DetectionRecord::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sightline_core::BoundingBox;

    fn sample() -> Detection {
        Detection::new("box", 0, 0.9, BoundingBox::new(10, 10, 50, 50).unwrap())
    }

    #[test]
    fn detections_only_wire_shape() {
        let resp = FrameResponse::detections_only(&[sample()]);
        let value: serde_json::Value = serde_json::from_str(&resp.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"detections": [{"label": "box", "confidence": 0.9, "box": [10, 10, 50, 50]}]})
        );
    }

    #[test]
    fn image_variant_carries_both_fields() {
        let resp = FrameResponse::with_image("aGk=".into(), &[sample()]);
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["image"], "aGk=");
        assert_eq!(value["detections"][0]["box"], json!([10, 10, 50, 50]));
        assert!(value["detections"][0].get("bbox").is_none());
        assert_eq!(resp.image(), Some("aGk="));
    }

    #[test]
    fn empty_list_is_still_present() {
        let value = serde_json::to_value(FrameResponse::detections_only(&[])).unwrap();
        assert_eq!(value, json!({"detections": []}));
    }

    #[test]
    fn parses_back_into_the_right_variant() {
        let with: FrameResponse =
            serde_json::from_str(r#"{"image":"x","detections":[]}"#).unwrap();
        assert_eq!(with.image(), Some("x"));
        let without: FrameResponse = serde_json::from_str(r#"{"detections":[]}"#).unwrap();
        assert_eq!(without.image(), None);
        assert!(without.detections().is_empty());
    }
}
