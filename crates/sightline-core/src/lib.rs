//! # sightline-core
//!
//! Foundation types for the Sightline frame-streaming pipeline.
//!
//! - [`frame::Frame`]: decoded pixel buffer, owned by a single processing call
//! - [`detection::Detection`] and [`detection::DetectionThreshold`]
//! - [`detector::Detector`]: the object-detection capability seam
//! - [`errors`]: typed error taxonomy (frame-recoverable, transport-fatal, capability-fatal)
//! - [`ids`]: branded session identifiers
//! - [`mode`]: response and pacing modes chosen at session construction
//! - [`logging`]: `tracing` subscriber bootstrap

#![deny(unsafe_code)]

pub mod detection;
pub mod detector;
pub mod errors;
pub mod frame;
pub mod ids;
pub mod logging;
pub mod mode;

pub use detection::{BoundingBox, Detection, DetectionThreshold};
pub use detector::{Detector, SharedDetector};
pub use errors::{
    CaptureError, DecodeError, DetectorError, EncodeError, ErrorClass, FrameError,
    TransportError,
};
pub use frame::{ChannelLayout, Frame};
pub use ids::SessionId;
pub use logging::LogFormat;
pub use mode::{OutputFormat, Pacing, ResponseMode};
