use image::GrayImage;
use opencv::{core, objdetect, prelude::*};
use tracing::info;

use super::detector::{DetectionError, FaceDetector, FaceRect};
use crate::config::DetectionParams;
use crate::error::{PipelineError, PipelineResult};

/// Haar/LBP cascade classifier loaded from an OpenCV XML model.
pub struct CascadeDetector {
    classifier: objdetect::CascadeClassifier,
    scale_step: f64,
    min_neighbors: i32,
    min_size: core::Size,
}

impl CascadeDetector {
    pub fn load(params: &DetectionParams) -> PipelineResult<Self> {
        let path = params
            .cascade_path
            .as_ref()
            .ok_or_else(|| PipelineError::Detector("no cascade path configured".to_string()))?;
        let path_str = path.to_string_lossy();

        let classifier = objdetect::CascadeClassifier::new(&path_str)
            .map_err(|e| PipelineError::Detector(format!("{}: {}", path_str, e)))?;
        if classifier
            .empty()
            .map_err(|e| PipelineError::Detector(e.to_string()))?
        {
            return Err(PipelineError::Detector(format!(
                "cascade {} loaded empty",
                path_str
            )));
        }
        info!("Loaded face cascade {}", path_str);

        let min = params.min_face_size as i32;
        Ok(Self {
            classifier,
            scale_step: params.scale_step,
            min_neighbors: params.min_neighbors as i32,
            min_size: core::Size::new(min, min),
        })
    }
}

impl FaceDetector for CascadeDetector {
    fn detect(&mut self, luma: &GrayImage) -> Result<Vec<FaceRect>, DetectionError> {
        let to_err = |e: opencv::Error| DetectionError(e.to_string());
        let (width, height) = luma.dimensions();
        let mat = Mat::new_rows_cols_with_data(height as i32, width as i32, luma.as_raw().as_slice())
            .map_err(to_err)?;

        let mut faces = core::Vector::<core::Rect>::new();
        self.classifier
            .detect_multi_scale(
                &*mat,
                &mut faces,
                self.scale_step,
                self.min_neighbors,
                objdetect::CASCADE_SCALE_IMAGE,
                self.min_size,
                core::Size::default(),
            )
            .map_err(to_err)?;

        Ok(faces
            .iter()
            .map(|r| FaceRect::new(r.x, r.y, r.width, r.height))
            .collect())
    }
}
