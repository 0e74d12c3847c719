use image::GrayImage;
use thiserror::Error;

use crate::config::DetectionParams;
use crate::error::{PipelineError, PipelineResult};

/// Raw detector output in the detector's own coordinates. May overhang the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl FaceRect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }
}

#[derive(Error, Debug)]
#[error("face detection failed: {0}")]
pub struct DetectionError(pub String);

/// Anything that can find face-like rectangles in a luminance image.
///
/// Candidates are returned in detector order; callers rely on that order for
/// tie-breaking.
pub trait FaceDetector {
    fn detect(&mut self, luma: &GrayImage) -> Result<Vec<FaceRect>, DetectionError>;
}

/// Build the configured detector.
#[cfg(feature = "opencv")]
pub fn build_detector(params: &DetectionParams) -> PipelineResult<Box<dyn FaceDetector>> {
    Ok(Box::new(super::cascade::CascadeDetector::load(params)?))
}

#[cfg(not(feature = "opencv"))]
pub fn build_detector(params: &DetectionParams) -> PipelineResult<Box<dyn FaceDetector>> {
    Err(PipelineError::Detector(format!(
        "cascade {} cannot be loaded: built without the `opencv` feature",
        params
            .cascade_path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<unset>".to_string())
    )))
}
