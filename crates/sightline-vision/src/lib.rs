//! # sightline-vision
//!
//! Image-side building blocks of the Sightline pipeline:
//!
//! - [`codec`]: decode JPEG/PNG (raw or base64, with optional data-URL prefix)
//!   into frames, encode frames back to JPEG/PNG
//! - [`annotate`]: draw boxes and captions on a copy of a frame
//! - [`capture`]: server-owned frame sources for pull-mode sessions
//! - [`detectors`]: detection backends (static stub; ONNX YOLO behind `onnx`)
//!
//! Everything here is synchronous; callers dispatch blocking work off the
//! async runtime.

#![deny(unsafe_code)]

pub mod annotate;
pub mod capture;
pub mod codec;
pub mod detectors;

pub use annotate::{OverlayStyle, annotate};
pub use capture::{FrameSource, ImageSequenceSource, SyntheticSource, open_source};
pub use codec::{EncodeOptions, decode, decode_base64, encode, encode_base64};
pub use detectors::{StaticDetector, build_detector};
