//! Synthetic sensor for development hosts: a bright square sweeping across a
//! dark gradient.

use super::{CaptureDevice, CaptureError, PixelFormat, Resolution, Window};
use crate::frame::Frame;
use std::thread;
use std::time::Duration;
use tracing::debug;

pub struct TestPatternCamera {
    frame_interval: Option<Duration>,
    window: Option<Window>,
    auto_gain: Option<bool>,
    tick: u64,
}

impl TestPatternCamera {
    /// `fps = 0` produces frames as fast as they are requested
    pub fn new(fps: u32) -> Self {
        let frame_interval = (fps > 0).then(|| Duration::from_micros(1_000_000 / fps as u64));
        Self {
            frame_interval,
            window: None,
            auto_gain: None,
            tick: 0,
        }
    }

    pub fn frames_generated(&self) -> u64 {
        self.tick
    }

    pub fn auto_gain(&self) -> Option<bool> {
        self.auto_gain
    }

    fn render(&self, window: Window) -> Frame {
        let (width, height) = (window.width as usize, window.height as usize);
        let size = (width.min(height) / 5).max(1);
        let travel = width.saturating_sub(size).max(1);
        let left = (self.tick as usize * 3) % travel;
        let top = height.saturating_sub(size) / 2;

        let mut pixels = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                let inside = x >= left && x < left + size && y >= top && y < top + size;
                let value = if inside {
                    230
                } else {
                    ((x + y) * 64 / (width + height).max(1)) as u8
                };
                pixels.push(value);
            }
        }

        // dimensions match by construction
        Frame::new(window.width, window.height, pixels)
            .unwrap_or_else(|| Frame::filled(window.width, window.height, 0))
    }
}

impl CaptureDevice for TestPatternCamera {
    fn reset(&mut self) -> Result<(), CaptureError> {
        self.window = None;
        self.auto_gain = None;
        self.tick = 0;
        Ok(())
    }

    fn configure(
        &mut self,
        pixel_format: PixelFormat,
        resolution: Resolution,
        window: Window,
    ) -> Result<(), CaptureError> {
        if window.width > resolution.width || window.height > resolution.height {
            return Err(CaptureError::Unsupported(format!(
                "window {}x{} exceeds resolution {}x{}",
                window.width, window.height, resolution.width, resolution.height
            )));
        }

        debug!(?pixel_format, ?resolution, ?window, "Test pattern configured");
        self.window = Some(window);
        Ok(())
    }

    fn set_auto_gain(&mut self, enabled: bool) -> Result<(), CaptureError> {
        self.auto_gain = Some(enabled);
        Ok(())
    }

    fn snapshot(&mut self) -> Result<Frame, CaptureError> {
        let window = self.window.ok_or(CaptureError::NotConfigured)?;

        if let Some(interval) = self.frame_interval {
            thread::sleep(interval);
        }

        let frame = self.render(window);
        self.tick += 1;
        Ok(frame)
    }
}
