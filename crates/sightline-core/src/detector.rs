//! The object-detection capability seam.
//!
//! The capability is shared read-only across every session for the life of
//! the process. Implementations must tolerate concurrent calls; backends that
//! need exclusive access to an inference session serialize internally.

use std::sync::Arc;

use crate::detection::Detection;
use crate::errors::DetectorError;
use crate::frame::Frame;

/// Maps a frame to zero or more labeled, scored boxes.
///
/// Calls may block for a model-dependent time and are dispatched off the
/// async runtime by callers.
pub trait Detector: Send + Sync {
    /// Backend name for logs and health output.
    fn name(&self) -> &str;

    /// Run detection on one frame.
    ///
    /// Returns every candidate the backend produced, unfiltered by the
    /// reporting threshold.
    fn infer(&self, frame: &Frame) -> Result<Vec<Detection>, DetectorError>;

    /// Exercise the backend once so the first real frame does not pay
    /// initialization cost. Errors here are capability-fatal.
    fn warm_up(&self) -> Result<(), DetectorError> {
        Ok(())
    }
}

/// Process-wide handle to the detection capability.
pub type SharedDetector = Arc<dyn Detector>;
