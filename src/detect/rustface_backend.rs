//! SeetaFace frontal face detector through `rustface`

use super::{DetectError, DetectParams, FeatureDetector};
use crate::frame::{BoundingBox, Frame};
use rustface::{Detector, ImageData};
use tracing::info;

pub struct RustfaceDetector {
    detector: Box<dyn Detector>,
}

impl RustfaceDetector {
    /// Loads a SeetaFace model file (e.g. `seeta_fd_frontal_v1.0.bin`)
    pub fn new(model_path: &str) -> Result<Self, DetectError> {
        let mut detector = rustface::create_detector(model_path).map_err(|e| DetectError::Model {
            path: model_path.to_string(),
            message: e.to_string(),
        })?;
        detector.set_slide_window_step(4, 4);

        info!(model = %model_path, "Face detector loaded");

        Ok(Self { detector })
    }
}

impl FeatureDetector for RustfaceDetector {
    fn detect(
        &mut self,
        frame: &Frame,
        params: &DetectParams,
    ) -> Result<Vec<BoundingBox>, DetectError> {
        self.detector.set_score_thresh(params.threshold);
        // rustface shrinks by this factor between pyramid levels
        self.detector
            .set_pyramid_scale_factor((1.0 / params.scale_factor) as f32);
        self.detector.set_min_face_size(params.min_face_size);

        let mut image = ImageData::new(frame.pixels(), frame.width(), frame.height());
        let faces = self.detector.detect(&mut image);

        Ok(faces
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                BoundingBox::new(bbox.x(), bbox.y(), bbox.width() as i32, bbox.height() as i32)
            })
            .collect())
    }
}
