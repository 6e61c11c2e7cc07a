//! Frame codec: transport payloads to pixel buffers and back.
//!
//! Decoding always yields an [`ChannelLayout::Rgb8`] frame so that a
//! lossless encode followed by a decode reproduces the same pixels.

use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage, RgbaImage};
use sightline_core::{ChannelLayout, DecodeError, EncodeError, Frame, OutputFormat};

/// Compression parameters for outbound frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Container format.
    pub format: OutputFormat,
    /// JPEG quality, clamped to 1..=100. Ignored for PNG.
    pub jpeg_quality: u8,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Jpeg,
            jpeg_quality: 90,
        }
    }
}

/// Decode compressed image bytes (JPEG or PNG) into an RGB frame.
pub fn decode(bytes: &[u8]) -> Result<Frame, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }
    let image =
        image::load_from_memory(bytes).map_err(|e| DecodeError::Undecodable(e.to_string()))?;
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();
    Frame::new(width, height, ChannelLayout::Rgb8, rgb.into_raw())
}

/// Decode a base64 text payload, with or without a `data:` URL prefix.
pub fn decode_base64(text: &str) -> Result<Frame, DecodeError> {
    let bytes = decode_base64_bytes(text)?;
    decode(&bytes)
}

/// Strip an optional data-URL prefix and base64-decode the remainder.
pub fn decode_base64_bytes(text: &str) -> Result<Vec<u8>, DecodeError> {
    let body = strip_data_url(text.trim());
    if body.is_empty() {
        return Err(DecodeError::Empty);
    }
    STANDARD
        .decode(body)
        .map_err(|e| DecodeError::InvalidBase64(e.to_string()))
}

fn strip_data_url(text: &str) -> &str {
    if !text.starts_with("data:") {
        return text;
    }
    match text.find(',') {
        Some(idx) => &text[idx + 1..],
        None => "",
    }
}

/// Encode a frame into compressed bytes.
pub fn encode(frame: &Frame, options: EncodeOptions) -> Result<Vec<u8>, EncodeError> {
    let image = to_dynamic(frame)?;
    let mut buffer = Vec::new();
    match options.format {
        OutputFormat::Jpeg => {
            let quality = options.jpeg_quality.clamp(1, 100);
            let rgb = match image {
                DynamicImage::ImageRgb8(rgb) => rgb,
                other => other.to_rgb8(),
            };
            JpegEncoder::new_with_quality(&mut buffer, quality)
                .encode_image(&rgb)
                .map_err(|e| EncodeError::Image(format!("JPEG encode failed: {e}")))?;
        }
        OutputFormat::Png => {
            image
                .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
                .map_err(|e| EncodeError::Image(format!("PNG encode failed: {e}")))?;
        }
    }
    Ok(buffer)
}

/// Encode a frame and return it as standard base64 text.
pub fn encode_base64(frame: &Frame, options: EncodeOptions) -> Result<String, EncodeError> {
    encode(frame, options).map(|bytes| STANDARD.encode(bytes))
}

/// View a frame as an `image` buffer (copies the pixels).
pub fn to_dynamic(frame: &Frame) -> Result<DynamicImage, EncodeError> {
    let (w, h) = (frame.width(), frame.height());
    let pixels = frame.pixels().to_vec();
    let image = match frame.layout() {
        ChannelLayout::Luma8 => GrayImage::from_raw(w, h, pixels).map(DynamicImage::ImageLuma8),
        ChannelLayout::Rgb8 => RgbImage::from_raw(w, h, pixels).map(DynamicImage::ImageRgb8),
        ChannelLayout::Rgba8 => RgbaImage::from_raw(w, h, pixels).map(DynamicImage::ImageRgba8),
    };
    image.ok_or_else(|| EncodeError::Image(format!("pixel buffer does not fit {w}x{h}")))
}
