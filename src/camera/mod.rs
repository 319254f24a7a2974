//! Capture devices producing grayscale frames

#[cfg(feature = "camera")]
mod gst;
mod test_pattern;

#[cfg(feature = "camera")]
pub use gst::GstCamera;
pub use test_pattern::TestPatternCamera;

use crate::config::CameraConfig;
use crate::frame::Frame;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("capture device unavailable: {0}")]
    Unavailable(String),

    #[error("pipeline error: {0}")]
    Pipeline(String),

    #[error("capture device not configured")]
    NotConfigured,

    #[error("unsupported configuration: {0}")]
    Unsupported(String),

    #[error("frame buffer has {got} bytes, expected {expected}")]
    BadFrame { expected: usize, got: usize },
}

/// Sensor output pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Grayscale,
}

/// Full sensor readout size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// Centered crop taken from the sensor readout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub width: u32,
    pub height: u32,
}

impl Window {
    /// Crop margins `(left, right, top, bottom)` centering this window in `resolution`
    pub fn margins(&self, resolution: Resolution) -> (u32, u32, u32, u32) {
        let horizontal = resolution.width.saturating_sub(self.width);
        let vertical = resolution.height.saturating_sub(self.height);
        let left = horizontal / 2;
        let top = vertical / 2;
        (left, horizontal - left, top, vertical - top)
    }
}

/// Fixed startup configuration of the image sensor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorSettings {
    pub pixel_format: PixelFormat,
    pub resolution: Resolution,
    pub window: Window,
    pub warmup: Duration,
    pub auto_gain: bool,
}

impl From<&CameraConfig> for SensorSettings {
    fn from(config: &CameraConfig) -> Self {
        Self {
            pixel_format: PixelFormat::Grayscale,
            resolution: Resolution {
                width: config.sensor_width,
                height: config.sensor_height,
            },
            window: Window {
                width: config.window_width,
                height: config.window_height,
            },
            warmup: Duration::from_millis(config.warmup_ms),
            auto_gain: config.auto_gain,
        }
    }
}

/// Image sensor driven synchronously by the control loop
pub trait CaptureDevice {
    fn reset(&mut self) -> Result<(), CaptureError>;

    fn configure(
        &mut self,
        pixel_format: PixelFormat,
        resolution: Resolution,
        window: Window,
    ) -> Result<(), CaptureError>;

    fn set_auto_gain(&mut self, enabled: bool) -> Result<(), CaptureError>;

    /// Blocks until the next frame is available
    fn snapshot(&mut self) -> Result<Frame, CaptureError>;
}

impl<C: CaptureDevice + ?Sized> CaptureDevice for Box<C> {
    fn reset(&mut self) -> Result<(), CaptureError> {
        (**self).reset()
    }

    fn configure(
        &mut self,
        pixel_format: PixelFormat,
        resolution: Resolution,
        window: Window,
    ) -> Result<(), CaptureError> {
        (**self).configure(pixel_format, resolution, window)
    }

    fn set_auto_gain(&mut self, enabled: bool) -> Result<(), CaptureError> {
        (**self).set_auto_gain(enabled)
    }

    fn snapshot(&mut self) -> Result<Frame, CaptureError> {
        (**self).snapshot()
    }
}

/// Brings a sensor into its tracking configuration.
///
/// Frames captured during the warm-up period are discarded so exposure can
/// settle; gain control is switched only after that.
pub fn init_sensor<C: CaptureDevice + ?Sized>(
    device: &mut C,
    settings: &SensorSettings,
) -> Result<(), CaptureError> {
    info!(
        resolution = %format!("{}x{}", settings.resolution.width, settings.resolution.height),
        window = %format!("{}x{}", settings.window.width, settings.window.height),
        warmup_ms = settings.warmup.as_millis() as u64,
        "Initializing sensor"
    );

    device.reset()?;
    device.configure(settings.pixel_format, settings.resolution, settings.window)?;

    let started = Instant::now();
    let mut skipped = 0u32;
    while started.elapsed() < settings.warmup {
        device.snapshot()?;
        skipped += 1;
    }
    debug!(skipped, "Warm-up frames discarded");

    device.set_auto_gain(settings.auto_gain)?;

    Ok(())
}
