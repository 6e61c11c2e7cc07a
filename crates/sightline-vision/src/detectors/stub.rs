//! Fixed-output detector used in development and tests.

use sightline_core::{Detection, Detector, DetectorError, Frame};

/// Returns the same detection list for every frame.
///
/// Boxes that fall entirely outside a frame are dropped; the rest are
/// reported as configured.
#[derive(Clone, Debug, Default)]
pub struct StaticDetector {
    detections: Vec<Detection>,
}

impl StaticDetector {
    /// Create a detector that reports `detections` for every frame.
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }
}

impl Detector for StaticDetector {
    fn name(&self) -> &str {
        "static"
    }

    fn infer(&self, frame: &Frame) -> Result<Vec<Detection>, DetectorError> {
        let (w, h) = (frame.width() as i64, frame.height() as i64);
        Ok(self
            .detections
            .iter()
            .filter(|d| {
                let b = d.bbox;
                i64::from(b.x1) < w && i64::from(b.y1) < h && b.x2 > 0 && b.y2 > 0
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sightline_core::BoundingBox;

    fn det(b: [i32; 4]) -> Detection {
        Detection::new("box", 0, 0.9, BoundingBox::new(b[0], b[1], b[2], b[3]).unwrap())
    }

    #[test]
    fn returns_configured_detections() {
        let detector = StaticDetector::new(vec![det([10, 10, 50, 50])]);
        let frame = Frame::filled(640, 480, [0, 0, 0]).unwrap();
        let out = detector.infer(&frame).unwrap();
        assert_eq!(out, vec![det([10, 10, 50, 50])]);
        assert_eq!(detector.name(), "static");
    }

    #[test]
    fn drops_boxes_outside_the_frame() {
        let detector = StaticDetector::new(vec![det([10, 10, 50, 50]), det([700, 10, 720, 50])]);
        let frame = Frame::filled(640, 480, [0, 0, 0]).unwrap();
        assert_eq!(detector.infer(&frame).unwrap().len(), 1);
    }

    #[test]
    fn empty_detector_reports_nothing() {
        let frame = Frame::filled(8, 8, [0, 0, 0]).unwrap();
        assert!(StaticDetector::default().infer(&frame).unwrap().is_empty());
        assert!(StaticDetector::default().warm_up().is_ok());
    }
}
