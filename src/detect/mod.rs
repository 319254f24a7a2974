//! Face detection behind an opaque capability trait.
//!
//! The control loop only needs candidate rectangles; how they are found is up
//! to the backend.

#[cfg(feature = "rustface")]
mod rustface_backend;

#[cfg(feature = "rustface")]
pub use rustface_backend::RustfaceDetector;

use crate::frame::{BoundingBox, Frame};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("failed to load detection model {path}: {message}")]
    Model { path: String, message: String },

    #[error("detection failed: {0}")]
    Backend(String),
}

/// Tuning passed to the detector on every call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectParams {
    /// Minimum detection score. Backends interpret it on their own scale
    /// (rustface passes it through as the SeetaFace classifier threshold).
    pub threshold: f64,

    /// Step between image pyramid levels (> 1.0)
    pub scale_factor: f64,

    /// Smallest face edge in pixels
    pub min_face_size: u32,
}

impl Default for DetectParams {
    fn default() -> Self {
        Self {
            threshold: 0.75,
            scale_factor: 1.25,
            min_face_size: 20,
        }
    }
}

/// Source of candidate target rectangles for a frame
pub trait FeatureDetector {
    fn detect(
        &mut self,
        frame: &Frame,
        params: &DetectParams,
    ) -> Result<Vec<BoundingBox>, DetectError>;
}

impl<D: FeatureDetector + ?Sized> FeatureDetector for Box<D> {
    fn detect(
        &mut self,
        frame: &Frame,
        params: &DetectParams,
    ) -> Result<Vec<BoundingBox>, DetectError> {
        (**self).detect(frame, params)
    }
}

/// Detector that never finds anything; the loop then only streams
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledDetector;

impl FeatureDetector for DisabledDetector {
    fn detect(&mut self, _frame: &Frame, _params: &DetectParams) -> Result<Vec<BoundingBox>, DetectError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_detector_finds_nothing() {
        let frame = Frame::filled(240, 240, 128);
        let boxes = DisabledDetector
            .detect(&frame, &DetectParams::default())
            .unwrap();
        assert!(boxes.is_empty());
    }

    #[test]
    fn test_default_params() {
        let params = DetectParams::default();
        assert_eq!(params.threshold, 0.75);
        assert_eq!(params.scale_factor, 1.25);
    }
}
