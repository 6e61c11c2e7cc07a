//! Overlay drawing: bounding boxes and `"{label} {confidence:.2}"` captions.
//!
//! [`annotate`] draws on a private copy; the input frame is never touched.
//! Every detection passed in is drawn. Reporting thresholds are applied by
//! the caller to the structured result only.

use sightline_core::{Detection, Frame};

/// Glyph cell width including one column of spacing.
const GLYPH_ADVANCE: i64 = 6;
/// Gap between the caption's top edge and the box's top edge.
const LABEL_OFFSET: i64 = 10;

/// Colors and stroke used for overlays.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OverlayStyle {
    /// Box outline color.
    pub box_color: [u8; 3],
    /// Caption color.
    pub text_color: [u8; 3],
    /// Outline stroke width in pixels.
    pub thickness: u32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            box_color: [0, 255, 0],
            text_color: [0, 255, 0],
            thickness: 2,
        }
    }
}

/// Return a copy of `frame` with every detection drawn on it.
pub fn annotate(frame: &Frame, detections: &[Detection], style: &OverlayStyle) -> Frame {
    let mut canvas = frame.clone();
    for detection in detections {
        draw_detection(&mut canvas, detection, style);
    }
    canvas
}

fn draw_detection(canvas: &mut Frame, detection: &Detection, style: &OverlayStyle) {
    let b = detection.bbox;
    let (x1, y1, x2, y2) = (
        i64::from(b.x1),
        i64::from(b.y1),
        i64::from(b.x2),
        i64::from(b.y2),
    );

    // stroke straddles the nominal edge, biased outward
    let thickness = i64::from(style.thickness.max(1));
    for k in 0..thickness {
        let o = k - thickness / 2;
        draw_rectangle(canvas, x1 + o, y1 + o, x2 - o, y2 - o, style.box_color);
    }

    let label_y = if y1 - LABEL_OFFSET >= 0 {
        y1 - LABEL_OFFSET
    } else {
        // no room above the box: place the caption just inside it
        y1 + thickness + 1
    };
    draw_label(canvas, x1, label_y, &detection.caption(), style.text_color);
}

fn put(canvas: &mut Frame, x: i64, y: i64, color: [u8; 3]) {
    if let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) {
        canvas.put_rgb(x, y, color);
    }
}

fn draw_rectangle(canvas: &mut Frame, left: i64, top: i64, right: i64, bottom: i64, color: [u8; 3]) {
    if left > right || top > bottom {
        return;
    }
    let max_x = i64::from(canvas.width()) - 1;
    let max_y = i64::from(canvas.height()) - 1;

    for x in left.max(0)..=right.min(max_x) {
        put(canvas, x, top, color);
        put(canvas, x, bottom, color);
    }
    for y in top.max(0)..=bottom.min(max_y) {
        put(canvas, left, y, color);
        put(canvas, right, y, color);
    }
}

fn draw_label(canvas: &mut Frame, mut x: i64, y: i64, text: &str, color: [u8; 3]) {
    let max_x = i64::from(canvas.width());
    for ch in text.chars().flat_map(char::to_uppercase) {
        if x >= max_x {
            break;
        }
        if let Some(glyph) = glyph_bits(ch) {
            for (row, pattern) in glyph.iter().enumerate() {
                let py = y + row as i64;
                for col in 0..5 {
                    if (pattern >> (4 - col)) & 1 == 1 {
                        put(canvas, x + col, py, color);
                    }
                }
            }
        }
        x += GLYPH_ADVANCE;
    }
}

/// Pixel width of a caption rendered with the built-in font.
#[cfg(test)]
fn label_width(text: &str) -> i64 {
    text.chars().flat_map(char::to_uppercase).count() as i64 * GLYPH_ADVANCE
}

#[rustfmt::skip]
fn glyph_bits(ch: char) -> Option<[u8; 7]> {
    let rows = match ch {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110],
        'E' => [0b11111, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b11001, 0b10101, 0b10101, 0b10011, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b01110, 0b00001, 0b00001, 0b10001, 0b01110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11110, 0b00001, 0b00001, 0b01110, 0b00001, 0b00001, 0b11110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        '.' => [0, 0, 0, 0, 0, 0b00110, 0b00110],
        ':' => [0, 0b01100, 0b01100, 0, 0b01100, 0b01100, 0],
        '-' => [0, 0, 0, 0b11111, 0, 0, 0],
        '_' => [0, 0, 0, 0, 0, 0, 0b11111],
        '/' => [0b00001, 0b00010, 0b00010, 0b00100, 0b01000, 0b01000, 0b10000],
        '%' => [0b10001, 0b10010, 0b00100, 0b01000, 0b10010, 0b10001, 0],
        ' ' => [0; 7],
        _ => return None,
    };
    Some(rows)
}
