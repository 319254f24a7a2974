//! JPEG compression of outgoing frames with detection overlay

use crate::frame::{BoundingBox, Frame};
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::ColorType;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Intensity used for overlay rectangles
const OVERLAY_INTENSITY: u8 = 255;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("JPEG quality must be between 1 and 100, got {0}")]
    InvalidQuality(u8),

    #[error("JPEG encoding failed: {0}")]
    Image(#[from] image::ImageError),
}

/// Which rectangles are drawn onto the transmitted image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverlayMode {
    /// Only the tracked target
    #[default]
    Target,

    /// Every detection
    All,

    None,
}

/// Grayscale JPEG encoder at a fixed quality
#[derive(Debug, Clone, Copy)]
pub struct FrameEncoder {
    quality: u8,
}

impl FrameEncoder {
    pub fn new(quality: u8) -> Result<Self, EncodeError> {
        if quality == 0 || quality > 100 {
            return Err(EncodeError::InvalidQuality(quality));
        }
        Ok(Self { quality })
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Compresses `frame` with `overlay` outlined on a scratch copy; the frame
    /// itself is left untouched.
    pub fn encode(&self, frame: &Frame, overlay: &[BoundingBox]) -> Result<Bytes, EncodeError> {
        let (width, height) = (frame.width(), frame.height());

        let mut canvas = frame.pixels().to_vec();
        for rect in overlay {
            draw_rectangle(&mut canvas, width, height, rect);
        }

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.quality).encode(
            &canvas,
            width,
            height,
            ColorType::L8,
        )?;

        Ok(Bytes::from(jpeg))
    }
}

/// One-pixel outline, clipped to the canvas
fn draw_rectangle(canvas: &mut [u8], width: u32, height: u32, rect: &BoundingBox) {
    if rect.width <= 0 || rect.height <= 0 || width == 0 || height == 0 {
        return;
    }

    let (w, h) = (width as i64, height as i64);
    let left = rect.x as i64;
    let top = rect.y as i64;
    let right = left + rect.width as i64 - 1;
    let bottom = top + rect.height as i64 - 1;

    let mut plot = |x: i64, y: i64| {
        if (0..w).contains(&x) && (0..h).contains(&y) {
            canvas[(y * w + x) as usize] = OVERLAY_INTENSITY;
        }
    };

    for x in left.max(0)..=right.min(w - 1) {
        plot(x, top);
        plot(x, bottom);
    }
    for y in top.max(0)..=bottom.min(h - 1) {
        plot(left, y);
        plot(right, y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_out_of_range_quality() {
        assert!(FrameEncoder::new(0).is_err());
        assert!(FrameEncoder::new(101).is_err());
        assert_eq!(FrameEncoder::new(50).unwrap().quality(), 50);
    }

    #[test]
    fn test_output_is_standalone_jpeg() {
        let frame = Frame::filled(240, 240, 40);
        let jpeg = FrameEncoder::new(50)
            .unwrap()
            .encode(&frame, &[BoundingBox::new(100, 100, 40, 40)])
            .unwrap();

        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9]);

        let decoded = image::load_from_memory(&jpeg).unwrap().to_luma8();
        assert_eq!(decoded.dimensions(), (240, 240));
    }

    #[test]
    fn test_overlay_leaves_frame_untouched() {
        let frame = Frame::filled(32, 32, 0);
        let before = frame.clone();

        FrameEncoder::new(90)
            .unwrap()
            .encode(&frame, &[BoundingBox::new(4, 4, 10, 10)])
            .unwrap();

        assert_eq!(frame, before);
    }

    #[test]
    fn test_rectangle_outline() {
        let mut canvas = vec![0u8; 8 * 8];
        draw_rectangle(&mut canvas, 8, 8, &BoundingBox::new(2, 2, 4, 3));

        let lit: Vec<(usize, usize)> = canvas
            .iter()
            .enumerate()
            .filter(|(_, v)| **v == OVERLAY_INTENSITY)
            .map(|(i, _)| (i % 8, i / 8))
            .collect();

        // 4 wide, 3 tall: top and bottom rows plus the middle row's two ends
        assert_eq!(lit.len(), 4 + 4 + 2);
        assert!(lit.contains(&(2, 2)));
        assert!(lit.contains(&(5, 4)));
        assert!(!lit.contains(&(3, 3)));
    }

    #[test]
    fn test_rectangle_is_clipped() {
        let mut canvas = vec![0u8; 8 * 8];
        draw_rectangle(&mut canvas, 8, 8, &BoundingBox::new(-5, -5, 100, 100));
        draw_rectangle(&mut canvas, 8, 8, &BoundingBox::new(20, 20, 5, 5));
        draw_rectangle(&mut canvas, 8, 8, &BoundingBox::new(1, 1, 0, 3));

        assert!(canvas.iter().all(|v| *v == 0));
    }
}
