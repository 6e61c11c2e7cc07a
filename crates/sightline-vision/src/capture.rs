//! Server-owned frame sources for pull-mode sessions.
//!
//! A source is opened per session and released exactly once when the session
//! reaches `CLOSING`. Sources never touch the network.
//!
//! Supported source specs:
//! - `synthetic:WxH`: a generated scene with a moving square
//! - a path to one image file (repeated forever)
//! - a path to a directory of `.png`/`.jpg`/`.jpeg` files (sorted, looped)

use std::path::{Path, PathBuf};

use sightline_core::{CaptureError, Frame};
use tracing::{debug, info};

use crate::codec;

/// A blocking source of frames.
///
/// `next_frame` may block on I/O and is called off the async runtime.
pub trait FrameSource: Send {
    /// Short description for logs.
    fn describe(&self) -> String;

    /// Capture the next frame.
    fn next_frame(&mut self) -> Result<Frame, CaptureError>;

    /// Release the underlying handle. Idempotent; later reads fail with
    /// [`CaptureError::Unavailable`].
    fn release(&mut self);

    /// Frames captured so far.
    fn frames_captured(&self) -> u64;
}

/// Open a source from its spec string.
pub fn open_source(spec: &str) -> Result<Box<dyn FrameSource>, CaptureError> {
    let spec = spec.trim();
    if spec.contains("://") {
        return Err(CaptureError::Unavailable(format!(
            "only local sources are supported: {spec}"
        )));
    }
    if let Some(dims) = spec.strip_prefix("synthetic:") {
        let (width, height) = parse_dimensions(dims)?;
        return Ok(Box::new(SyntheticSource::new(width, height)));
    }
    Ok(Box::new(ImageSequenceSource::open(Path::new(spec))?))
}

fn parse_dimensions(dims: &str) -> Result<(u32, u32), CaptureError> {
    let parsed = dims
        .split_once(['x', 'X'])
        .and_then(|(w, h)| Some((w.trim().parse::<u32>().ok()?, h.trim().parse::<u32>().ok()?)));
    match parsed {
        Some((w, h)) if w > 0 && h > 0 && w <= 8192 && h <= 8192 => Ok((w, h)),
        _ => Err(CaptureError::Unavailable(format!(
            "invalid synthetic dimensions: {dims}"
        ))),
    }
}

// ----------------------------------------------------------------------------
// Image file / directory source
// ----------------------------------------------------------------------------

/// Loops over one image file or every image in a directory.
pub struct ImageSequenceSource {
    origin: PathBuf,
    files: Vec<PathBuf>,
    cursor: usize,
    frames_captured: u64,
    released: bool,
}

impl ImageSequenceSource {
    /// Open a file or directory.
    pub fn open(path: &Path) -> Result<Self, CaptureError> {
        let files = if path.is_dir() {
            let mut files: Vec<PathBuf> = std::fs::read_dir(path)
                .map_err(|e| CaptureError::Unavailable(format!("{}: {e}", path.display())))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && has_image_extension(p))
                .collect();
            files.sort();
            files
        } else if path.is_file() {
            vec![path.to_path_buf()]
        } else {
            return Err(CaptureError::Unavailable(format!(
                "{}: no such file or directory",
                path.display()
            )));
        };

        if files.is_empty() {
            return Err(CaptureError::Unavailable(format!(
                "{}: no images found",
                path.display()
            )));
        }
        info!(source = %path.display(), images = files.len(), "opened image sequence");
        Ok(Self {
            origin: path.to_path_buf(),
            files,
            cursor: 0,
            frames_captured: 0,
            released: false,
        })
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"))
}

impl FrameSource for ImageSequenceSource {
    fn describe(&self) -> String {
        self.origin.display().to_string()
    }

    fn next_frame(&mut self) -> Result<Frame, CaptureError> {
        if self.released {
            return Err(CaptureError::Unavailable("source released".into()));
        }
        let path = &self.files[self.cursor % self.files.len()];
        self.cursor = (self.cursor + 1) % self.files.len();

        let bytes = std::fs::read(path)
            .map_err(|e| CaptureError::Read(format!("{}: {e}", path.display())))?;
        let frame = codec::decode(&bytes)
            .map_err(|e| CaptureError::Read(format!("{}: {e}", path.display())))?;
        self.frames_captured += 1;
        Ok(frame)
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            debug!(source = %self.origin.display(), frames = self.frames_captured, "released image sequence");
        }
    }

    fn frames_captured(&self) -> u64 {
        self.frames_captured
    }
}

// ----------------------------------------------------------------------------
// Synthetic source
// ----------------------------------------------------------------------------

/// Generated scene: gray background with a green square that moves
/// diagonally and wraps at the edges.
pub struct SyntheticSource {
    width: u32,
    height: u32,
    frames_captured: u64,
    released: bool,
}

impl SyntheticSource {
    /// Edge length of the moving square.
    pub const SQUARE: u32 = 40;

    /// Create a synthetic source.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frames_captured: 0,
            released: false,
        }
    }

    /// Top-left corner of the square in frame `n`.
    pub fn square_origin(&self, n: u64) -> (u32, u32) {
        let span_x = u64::from(self.width.saturating_sub(Self::SQUARE).max(1));
        let span_y = u64::from(self.height.saturating_sub(Self::SQUARE).max(1));
        let step = n * 4;
        ((step % span_x) as u32, (step % span_y) as u32)
    }
}

impl FrameSource for SyntheticSource {
    fn describe(&self) -> String {
        format!("synthetic:{}x{}", self.width, self.height)
    }

    fn next_frame(&mut self) -> Result<Frame, CaptureError> {
        if self.released {
            return Err(CaptureError::Unavailable("source released".into()));
        }
        let mut frame = Frame::filled(self.width, self.height, [96, 96, 96])
            .map_err(|e| CaptureError::Read(e.to_string()))?;
        let (ox, oy) = self.square_origin(self.frames_captured);
        for y in oy..(oy + Self::SQUARE).min(self.height) {
            for x in ox..(ox + Self::SQUARE).min(self.width) {
                frame.put_rgb(x, y, [40, 200, 40]);
            }
        }
        self.frames_captured += 1;
        Ok(frame)
    }

    fn release(&mut self) {
        self.released = true;
    }

    fn frames_captured(&self) -> u64 {
        self.frames_captured
    }
}
