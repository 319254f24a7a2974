//! Per-cycle image and geometry types

use serde::{Deserialize, Serialize};

/// Single grayscale frame, one byte per pixel, row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Frame {
    /// Wraps a pixel buffer. Returns `None` when the buffer does not hold
    /// exactly `width * height` samples.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        if pixels.len() != width as usize * height as usize {
            return None;
        }
        Some(Self {
            width,
            height,
            pixels,
        })
    }

    /// Uniform frame filled with `value`
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self {
            width,
            height,
            pixels: vec![value; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Integer frame center, `(width / 2, height / 2)`
    pub fn center(&self) -> Point {
        Point {
            x: (self.width / 2) as i32,
            y: (self.height / 2) as i32,
        }
    }
}

/// Integer pixel coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// Axis-aligned detection rectangle in frame coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    #[inline]
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Projected area, used as the "closest to camera" proxy.
    /// Negative extents count as empty.
    #[inline]
    pub fn area(&self) -> i64 {
        self.width.max(0) as i64 * self.height.max(0) as i64
    }

    /// Integer center using floor division of the extents, saturated to the
    /// `i32` range for out-of-frame boxes
    #[inline]
    pub fn center(&self) -> Point {
        Point {
            x: saturate(self.x as i64 + self.width as i64 / 2),
            y: saturate(self.y as i64 + self.height as i64 / 2),
        }
    }
}

/// Signed offset from the target center to the frame center.
///
/// Positive `dx` means the target sits left of center, positive `dy` that it
/// sits above center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrackingError {
    pub dx: i32,
    pub dy: i32,
}

impl TrackingError {
    /// `(frame.width/2 - center.x, frame.height/2 - center.y)`
    pub fn between(frame: &Frame, target: &BoundingBox) -> Self {
        let frame_center = frame.center();
        let target_center = target.center();
        Self {
            dx: saturate(frame_center.x as i64 - target_center.x as i64),
            dy: saturate(frame_center.y as i64 - target_center.y as i64),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.dx == 0 && self.dy == 0
    }
}

fn saturate(value: i64) -> i32 {
    value.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_rejects_wrong_buffer_size() {
        assert!(Frame::new(4, 4, vec![0; 15]).is_none());
        assert!(Frame::new(4, 4, vec![0; 16]).is_some());
    }

    #[test]
    fn test_centered_box_has_zero_error() {
        let frame = Frame::filled(240, 240, 0);
        let target = BoundingBox::new(100, 100, 40, 40);

        assert_eq!(target.center(), Point { x: 120, y: 120 });
        assert_eq!(frame.center(), Point { x: 120, y: 120 });
        assert!(TrackingError::between(&frame, &target).is_zero());
    }

    #[test]
    fn test_error_sign_follows_target_offset() {
        let frame = Frame::filled(240, 240, 0);
        // centered at (60, 180): left of and below the frame center
        let target = BoundingBox::new(40, 160, 40, 40);

        let error = TrackingError::between(&frame, &target);
        assert_eq!(error, TrackingError { dx: 60, dy: -60 });
    }

    #[test]
    fn test_odd_extents_use_floor_center() {
        let target = BoundingBox::new(10, 10, 5, 7);
        assert_eq!(target.center(), Point { x: 12, y: 13 });
        assert_eq!(target.area(), 35);
    }

    #[test]
    fn test_extreme_boxes_saturate_instead_of_overflowing() {
        let frame = Frame::filled(240, 240, 0);

        let far = BoundingBox::new(i32::MAX, i32::MAX, i32::MAX, 40);
        assert_eq!(far.center(), Point { x: i32::MAX, y: i32::MAX });
        let error = TrackingError::between(&frame, &far);
        assert_eq!(error.dx, 120 - i32::MAX);

        let behind = BoundingBox::new(i32::MIN, i32::MIN, 0, 0);
        let error = TrackingError::between(&frame, &behind);
        assert_eq!(error, TrackingError { dx: i32::MAX, dy: i32::MAX });
    }
}
