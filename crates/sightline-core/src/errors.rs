//! Typed error hierarchy for the frame pipeline.
//!
//! Every error classifies into one of three classes:
//! - **frame-recoverable**: the current frame is dropped and the session continues
//! - **transport-fatal**: the session closes and releases its resources
//! - **capability-fatal**: the detector cannot be used at all; fatal at boot

use std::time::Duration;

/// How an error affects the session that observed it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// Drop the current frame, keep the session.
    FrameRecoverable,
    /// Close the session.
    TransportFatal,
    /// Abort the process at startup.
    CapabilityFatal,
}

/// An inbound payload could not be turned into a [`Frame`](crate::Frame).
#[derive(Clone, Debug, thiserror::Error)]
pub enum DecodeError {
    /// The text payload was not valid base64.
    #[error("invalid base64 payload: {0}")]
    InvalidBase64(String),
    /// The payload was empty.
    #[error("empty payload")]
    Empty,
    /// The bytes are not a supported, intact image.
    #[error("undecodable image: {0}")]
    Undecodable(String),
    /// The image decoded to zero width or height.
    #[error("image has zero dimensions")]
    ZeroDimensions,
    /// The dimensions overflow addressable memory.
    #[error("image dimensions {width}x{height} overflow")]
    DimensionsOverflow {
        /// Declared width.
        width: u32,
        /// Declared height.
        height: u32,
    },
    /// The pixel buffer does not match the declared dimensions.
    #[error("pixel buffer length {actual} does not match expected {expected}")]
    BufferLength {
        /// Expected byte count.
        expected: usize,
        /// Received byte count.
        actual: usize,
    },
}

/// A frame could not be encoded for transport.
#[derive(Clone, Debug, thiserror::Error)]
pub enum EncodeError {
    /// The image encoder rejected the frame.
    #[error("image encode failed: {0}")]
    Image(String),
    /// The response could not be serialized.
    #[error("response serialization failed: {0}")]
    Serialize(String),
}

/// The detection capability failed.
#[derive(Clone, Debug, thiserror::Error)]
pub enum DetectorError {
    /// The model could not be loaded or is corrupt.
    #[error("detector unavailable: {0}")]
    Unavailable(String),
    /// Inference on one frame failed.
    #[error("inference failed: {0}")]
    Inference(String),
    /// Inference exceeded the configured bound.
    #[error("inference timed out after {0:?}")]
    Timeout(Duration),
    /// The blocking inference task panicked or was cancelled.
    #[error("inference task failed: {0}")]
    Join(String),
}

impl DetectorError {
    /// Error class of this failure.
    pub fn classify(&self) -> ErrorClass {
        match self {
            Self::Unavailable(_) => ErrorClass::CapabilityFatal,
            Self::Inference(_) | Self::Timeout(_) | Self::Join(_) => ErrorClass::FrameRecoverable,
        }
    }
}

/// The bidirectional message channel failed.
#[derive(Clone, Debug, thiserror::Error)]
pub enum TransportError {
    /// The accept handshake failed.
    #[error("handshake failed: {0}")]
    Handshake(String),
    /// The peer is gone.
    #[error("connection closed")]
    Closed,
    /// Reading from the channel failed.
    #[error("receive failed: {0}")]
    Receive(String),
    /// Writing to the channel failed.
    #[error("send failed: {0}")]
    Send(String),
}

impl TransportError {
    /// Error class of this failure. Transport errors always end the session.
    pub fn classify(&self) -> ErrorClass {
        ErrorClass::TransportFatal
    }
}

/// A pull-mode capture source failed.
#[derive(Clone, Debug, thiserror::Error)]
pub enum CaptureError {
    /// The source could not be opened.
    #[error("capture source unavailable: {0}")]
    Unavailable(String),
    /// Reading the next frame failed.
    #[error("capture read failed: {0}")]
    Read(String),
    /// The source has no more frames.
    #[error("capture source exhausted")]
    Exhausted,
}

impl CaptureError {
    /// Error class of this failure.
    ///
    /// A failed read drops one frame; an unavailable or exhausted source ends
    /// the session because nothing further can be emitted.
    pub fn classify(&self) -> ErrorClass {
        match self {
            Self::Read(_) => ErrorClass::FrameRecoverable,
            Self::Unavailable(_) | Self::Exhausted => ErrorClass::TransportFatal,
        }
    }
}

/// Any error that drops a single frame.
#[derive(Clone, Debug, thiserror::Error)]
pub enum FrameError {
    /// Decoding the inbound payload failed.
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// The detection capability failed.
    #[error(transparent)]
    Detect(#[from] DetectorError),
    /// Encoding the outbound frame failed.
    #[error(transparent)]
    Encode(#[from] EncodeError),
    /// Capturing the next frame failed.
    #[error(transparent)]
    Capture(#[from] CaptureError),
}

impl FrameError {
    /// Short classification string for logging/metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode",
            Self::Detect(DetectorError::Timeout(_)) => "detect_timeout",
            Self::Detect(_) => "detect",
            Self::Encode(_) => "encode",
            Self::Capture(_) => "capture",
        }
    }

    /// Error class of this failure.
    pub fn classify(&self) -> ErrorClass {
        match self {
            Self::Decode(_) | Self::Encode(_) => ErrorClass::FrameRecoverable,
            Self::Detect(e) => e.classify(),
            Self::Capture(e) => e.classify(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_errors_are_frame_recoverable() {
        let err = FrameError::from(DecodeError::Undecodable("bad".into()));
        assert_eq!(err.classify(), ErrorClass::FrameRecoverable);
        assert_eq!(err.kind(), "decode");
    }

    #[test]
    fn unavailable_detector_is_capability_fatal() {
        let err = DetectorError::Unavailable("missing model".into());
        assert_eq!(err.classify(), ErrorClass::CapabilityFatal);
    }

    #[test]
    fn transient_detector_errors_are_frame_recoverable() {
        for err in [
            DetectorError::Inference("nan".into()),
            DetectorError::Timeout(Duration::from_secs(5)),
            DetectorError::Join("panicked".into()),
        ] {
            assert_eq!(err.classify(), ErrorClass::FrameRecoverable, "{err}");
        }
    }

    #[test]
    fn timeout_has_its_own_kind() {
        let err = FrameError::from(DetectorError::Timeout(Duration::from_millis(10)));
        assert_eq!(err.kind(), "detect_timeout");
        let err = FrameError::from(DetectorError::Inference("x".into()));
        assert_eq!(err.kind(), "detect");
    }

    #[test]
    fn transport_errors_are_fatal() {
        assert_eq!(TransportError::Closed.classify(), ErrorClass::TransportFatal);
        assert_eq!(
            TransportError::Send("broken pipe".into()).classify(),
            ErrorClass::TransportFatal
        );
    }

    #[test]
    fn capture_read_drops_one_frame() {
        assert_eq!(
            CaptureError::Read("io".into()).classify(),
            ErrorClass::FrameRecoverable
        );
        assert_eq!(CaptureError::Exhausted.classify(), ErrorClass::TransportFatal);
    }

    #[test]
    fn display_messages() {
        assert_eq!(
            DecodeError::ZeroDimensions.to_string(),
            "image has zero dimensions"
        );
        assert_eq!(
            DetectorError::Timeout(Duration::from_secs(2)).to_string(),
            "inference timed out after 2s"
        );
        assert_eq!(TransportError::Closed.to_string(), "connection closed");
    }
}
