//! Decoded pixel buffers.

use crate::errors::DecodeError;

/// Channel layout of a [`Frame`]'s pixel buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelLayout {
    /// Single 8-bit luminance channel.
    Luma8,
    /// Interleaved 8-bit red, green, blue.
    Rgb8,
    /// Interleaved 8-bit red, green, blue, alpha.
    Rgba8,
}

impl ChannelLayout {
    /// Bytes used by one pixel.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Luma8 => 1,
            Self::Rgb8 => 3,
            Self::Rgba8 => 4,
        }
    }
}

/// One decoded image at one point in time.
///
/// A frame is created per receive (or per capture in pull mode) and is
/// exclusively owned by the processing call that created it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    layout: ChannelLayout,
    pixels: Vec<u8>,
}

impl Frame {
    /// Wrap a pixel buffer, validating dimensions against its length.
    pub fn new(
        width: u32,
        height: u32,
        layout: ChannelLayout,
        pixels: Vec<u8>,
    ) -> Result<Self, DecodeError> {
        if width == 0 || height == 0 {
            return Err(DecodeError::ZeroDimensions);
        }
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(layout.bytes_per_pixel()))
            .ok_or(DecodeError::DimensionsOverflow { width, height })?;
        if pixels.len() != expected {
            return Err(DecodeError::BufferLength {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            layout,
            pixels,
        })
    }

    /// A frame filled with one RGB color.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Result<Self, DecodeError> {
        let count = (width as usize).saturating_mul(height as usize);
        let pixels = rgb.iter().copied().cycle().take(count * 3).collect();
        Self::new(width, height, ChannelLayout::Rgb8, pixels)
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Channel layout of the buffer.
    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    /// Raw interleaved pixel bytes, row-major.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Mutable access for in-place drawing on an owned copy.
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// Consume the frame and return its buffer.
    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// Bytes of the pixel at `(x, y)`, or `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        let offset = self.offset(x, y)?;
        Some(&self.pixels[offset..offset + self.layout.bytes_per_pixel()])
    }

    /// Overwrite the pixel at `(x, y)` with an RGB color. Out-of-bounds writes are ignored.
    pub fn put_rgb(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        let Some(offset) = self.offset(x, y) else {
            return;
        };
        match self.layout {
            ChannelLayout::Luma8 => {
                let luma = (u32::from(rgb[0]) * 299 + u32::from(rgb[1]) * 587
                    + u32::from(rgb[2]) * 114)
                    / 1000;
                self.pixels[offset] = luma as u8;
            }
            ChannelLayout::Rgb8 => self.pixels[offset..offset + 3].copy_from_slice(&rgb),
            ChannelLayout::Rgba8 => {
                self.pixels[offset..offset + 3].copy_from_slice(&rgb);
                self.pixels[offset + 3] = u8::MAX;
            }
        }
    }

    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some((y as usize * self.width as usize + x as usize) * self.layout.bytes_per_pixel())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn new_validates_length() {
        let err = Frame::new(2, 2, ChannelLayout::Rgb8, vec![0; 11]).unwrap_err();
        assert_matches!(
            err,
            DecodeError::BufferLength {
                expected: 12,
                actual: 11
            }
        );
    }

    #[test]
    fn new_rejects_zero_dimensions() {
        assert_matches!(
            Frame::new(0, 10, ChannelLayout::Rgb8, Vec::new()),
            Err(DecodeError::ZeroDimensions)
        );
        assert_matches!(
            Frame::new(10, 0, ChannelLayout::Luma8, Vec::new()),
            Err(DecodeError::ZeroDimensions)
        );
    }

    #[test]
    fn filled_frame_has_uniform_pixels() {
        let frame = Frame::filled(4, 3, [1, 2, 3]).unwrap();
        assert_eq!(frame.pixels().len(), 36);
        assert_eq!(frame.pixel(3, 2), Some(&[1u8, 2, 3][..]));
    }

    #[test]
    fn pixel_out_of_bounds_is_none() {
        let frame = Frame::filled(2, 2, [0, 0, 0]).unwrap();
        assert!(frame.pixel(2, 0).is_none());
        assert!(frame.pixel(0, 2).is_none());
    }

    #[test]
    fn put_rgb_writes_each_layout() {
        let mut rgb = Frame::filled(2, 2, [0, 0, 0]).unwrap();
        rgb.put_rgb(1, 1, [0, 255, 0]);
        assert_eq!(rgb.pixel(1, 1), Some(&[0u8, 255, 0][..]));

        let mut rgba = Frame::new(1, 1, ChannelLayout::Rgba8, vec![0; 4]).unwrap();
        rgba.put_rgb(0, 0, [10, 20, 30]);
        assert_eq!(rgba.pixels(), &[10, 20, 30, 255]);

        let mut luma = Frame::new(1, 1, ChannelLayout::Luma8, vec![0]).unwrap();
        luma.put_rgb(0, 0, [255, 255, 255]);
        assert_eq!(luma.pixels(), &[255]);
    }

    #[test]
    fn put_rgb_out_of_bounds_is_ignored() {
        let mut frame = Frame::filled(2, 2, [9, 9, 9]).unwrap();
        let before = frame.clone();
        frame.put_rgb(5, 5, [0, 0, 0]);
        assert_eq!(frame, before);
    }
}
