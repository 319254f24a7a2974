//! GStreamer capture: grayscale frames pulled synchronously from an `appsink`

use super::{CaptureDevice, CaptureError, PixelFormat, Resolution, Window};
use crate::frame::Frame;
use gst::prelude::*;
use gstreamer as gst;
use gstreamer_app as gst_app;
use tracing::{debug, info, warn};

struct Pipeline {
    pipeline: gst::Pipeline,
    source: gst::Element,
    appsink: gst_app::AppSink,
    window: Window,
}

/// Camera read through `v4l2src` (paths under `/dev/`) or `libcamerasrc`
pub struct GstCamera {
    device: String,
    fps: u32,
    active: Option<Pipeline>,
}

impl GstCamera {
    pub fn new(device: &str, fps: u32) -> Result<Self, CaptureError> {
        gst::init().map_err(|e| CaptureError::Unavailable(e.to_string()))?;
        Ok(Self {
            device: device.to_string(),
            fps,
            active: None,
        })
    }

    fn source_description(&self) -> String {
        if self.device.starts_with("/dev/") {
            format!("v4l2src name=src device={}", self.device)
        } else if self.device.starts_with("/base/") {
            format!("libcamerasrc name=src camera-name=\"{}\"", self.device)
        } else {
            "libcamerasrc name=src".to_string()
        }
    }

    fn build_pipeline_string(&self, resolution: Resolution, window: Window) -> String {
        let (left, right, top, bottom) = window.margins(resolution);
        format!(
            "{source} ! video/x-raw,width={w},height={h},framerate={fps}/1 ! videoconvert ! video/x-raw,format=GRAY8 ! videocrop left={left} right={right} top={top} bottom={bottom} ! appsink name=sink max-buffers=2 drop=true sync=false",
            source = self.source_description(),
            w = resolution.width,
            h = resolution.height,
            fps = self.fps.max(1),
        )
    }

    fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            let _ = active.pipeline.set_state(gst::State::Null);
        }
    }
}

impl CaptureDevice for GstCamera {
    fn reset(&mut self) -> Result<(), CaptureError> {
        self.stop();
        Ok(())
    }

    fn configure(
        &mut self,
        pixel_format: PixelFormat,
        resolution: Resolution,
        window: Window,
    ) -> Result<(), CaptureError> {
        match pixel_format {
            PixelFormat::Grayscale => {}
        }
        if window.width > resolution.width || window.height > resolution.height {
            return Err(CaptureError::Unsupported(format!(
                "window {}x{} exceeds resolution {}x{}",
                window.width, window.height, resolution.width, resolution.height
            )));
        }

        self.stop();

        let description = self.build_pipeline_string(resolution, window);
        debug!(pipeline = %description, "Creating GStreamer pipeline");

        let pipeline = gst::parse::launch(&description)
            .map_err(|e| CaptureError::Pipeline(format!("{}: {}", description, e)))?
            .downcast::<gst::Pipeline>()
            .map_err(|_| CaptureError::Pipeline("Parsed element is not a pipeline".to_string()))?;

        let source = pipeline
            .by_name("src")
            .ok_or_else(|| CaptureError::Pipeline("Element 'src' not found".to_string()))?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| CaptureError::Pipeline("Element 'sink' not found".to_string()))?
            .downcast::<gst_app::AppSink>()
            .map_err(|_| CaptureError::Pipeline("Element 'sink' is not an appsink".to_string()))?;

        pipeline
            .set_state(gst::State::Playing)
            .map_err(|e| CaptureError::Unavailable(format!("{:?}", e)))?;

        info!(device = %self.device, "GStreamer capture started");

        self.active = Some(Pipeline {
            pipeline,
            source,
            appsink,
            window,
        });
        Ok(())
    }

    fn set_auto_gain(&mut self, enabled: bool) -> Result<(), CaptureError> {
        let active = self.active.as_ref().ok_or(CaptureError::NotConfigured)?;

        if active.source.find_property("extra-controls").is_some() {
            let controls = format!("c,autogain={}", u8::from(enabled));
            active
                .source
                .set_property_from_str("extra-controls", &controls);
            debug!(%controls, "Sensor gain control updated");
        } else {
            warn!(enabled, "Source element has no gain control, leaving sensor default");
        }
        Ok(())
    }

    fn snapshot(&mut self) -> Result<Frame, CaptureError> {
        let active = self.active.as_ref().ok_or(CaptureError::NotConfigured)?;

        let sample = active
            .appsink
            .pull_sample()
            .map_err(|_| CaptureError::Unavailable("Failed to pull sample from appsink".to_string()))?;
        let buffer = sample
            .buffer()
            .ok_or_else(|| CaptureError::Pipeline("Sample had no buffer".to_string()))?;
        let map = buffer
            .map_readable()
            .map_err(|_| CaptureError::Pipeline("Unable to map buffer".to_string()))?;

        let (width, height) = (active.window.width as usize, active.window.height as usize);
        let data = map.as_slice();
        let expected = width * height;

        // GRAY8 rows are padded to 4-byte strides
        let stride = (width + 3) & !3;
        let pixels = if data.len() == expected {
            data.to_vec()
        } else if data.len() >= stride * height {
            data.chunks(stride)
                .take(height)
                .flat_map(|row| &row[..width])
                .copied()
                .collect()
        } else {
            return Err(CaptureError::BadFrame {
                expected,
                got: data.len(),
            });
        };

        Frame::new(active.window.width, active.window.height, pixels).ok_or(
            CaptureError::BadFrame {
                expected,
                got: data.len(),
            },
        )
    }
}

impl Drop for GstCamera {
    fn drop(&mut self) {
        self.stop();
    }
}
