//! Per-session behavior switches, fixed at construction.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What each outbound message carries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    /// Annotated image plus filtered detections.
    #[default]
    ImageWithDetections,
    /// Filtered detections only; no annotation or encode.
    DetectionsOnly,
}

impl ResponseMode {
    /// Whether this mode renders and encodes an image.
    pub fn includes_image(self) -> bool {
        matches!(self, Self::ImageWithDetections)
    }

    /// Config-string form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ImageWithDetections => "image_with_detections",
            Self::DetectionsOnly => "detections_only",
        }
    }
}

impl fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResponseMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image_with_detections" => Ok(Self::ImageWithDetections),
            "detections_only" => Ok(Self::DetectionsOnly),
            other => Err(format!("unknown response mode: {other}")),
        }
    }
}

/// How a pull-mode session spaces its captures.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pacing {
    /// Sleep the full interval after each frame is sent.
    #[default]
    FixedDelay,
    /// Start a frame every interval, skipping ticks that were missed.
    FixedRate,
}

impl Pacing {
    /// Config-string form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FixedDelay => "fixed_delay",
            Self::FixedRate => "fixed_rate",
        }
    }
}

impl std::str::FromStr for Pacing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed_delay" => Ok(Self::FixedDelay),
            "fixed_rate" => Ok(Self::FixedRate),
            other => Err(format!("unknown pacing: {other}")),
        }
    }
}

/// Compressed image format for outbound frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Lossy; the default.
    #[default]
    Jpeg,
    /// Lossless.
    Png,
}

impl OutputFormat {
    /// MIME type for data URLs and HTTP bodies.
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
