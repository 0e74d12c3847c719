use image::RgbImage;
use tracing::debug;

use super::detector::{DetectionError, FaceDetector};
use crate::decoder::{BoundingBox, Frame};

/// The dominant face of a frame, expanded and cropped.
#[derive(Debug, Clone)]
pub struct DetectedFace {
    pub bbox: BoundingBox,
    pub pixels: RgbImage,
}

/// Finds the largest face in a frame and crops around it.
pub struct FaceIsolator {
    detector: Box<dyn FaceDetector>,
    scale_factor: f64,
}

impl FaceIsolator {
    pub fn new(detector: Box<dyn FaceDetector>, scale_factor: f64) -> Self {
        Self {
            detector,
            scale_factor,
        }
    }

    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    /// `Ok(None)` means no face in this frame, which callers treat as a skip.
    pub fn isolate(&mut self, frame: &Frame) -> Result<Option<DetectedFace>, DetectionError> {
        let luma = frame.luma();
        let candidates = self.detector.detect(&luma)?;

        // ranked by the detector's own extent, cropped by the clamped box
        let mut best: Option<(i64, BoundingBox)> = None;
        for rect in &candidates {
            let Some(bbox) = BoundingBox::clamped(
                rect.x as i64,
                rect.y as i64,
                rect.width as i64,
                rect.height as i64,
                frame.width(),
                frame.height(),
            ) else {
                continue;
            };
            let area = rect.width as i64 * rect.height as i64;
            // strict comparison keeps the first of equal-area candidates
            if best.map_or(true, |(best_area, _)| area > best_area) {
                best = Some((area, bbox));
            }
        }

        let Some((_, face)) = best else {
            debug!("No face in frame {} ({} candidates)", frame.index(), candidates.len());
            return Ok(None);
        };

        let bbox = face.expanded(self.scale_factor, frame.width(), frame.height());
        debug!(
            "Frame {}: face {:?} expanded to {:?}",
            frame.index(),
            face,
            bbox
        );
        Ok(Some(DetectedFace {
            bbox,
            pixels: frame.crop(&bbox),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face::detector::FaceRect;
    use crate::test_support::{gradient_frame, ScriptedDetector};

    fn isolator(faces: Vec<FaceRect>) -> FaceIsolator {
        FaceIsolator::new(Box::new(ScriptedDetector::always(faces)), 1.4)
    }

    #[test]
    fn test_no_candidates_is_absent() {
        let frame = gradient_frame(0, 100, 80);
        assert!(isolator(vec![]).isolate(&frame).unwrap().is_none());
    }

    #[test]
    fn test_picks_largest_face() {
        let frame = gradient_frame(0, 200, 200);
        let faces = vec![
            FaceRect::new(10, 10, 30, 30),
            FaceRect::new(100, 100, 50, 40),
            FaceRect::new(60, 10, 40, 40),
        ];
        let face = isolator(faces).isolate(&frame).unwrap().unwrap();
        // 50x40 at (100,100) grown by 1.4
        assert_eq!(face.bbox, BoundingBox::new(90, 92, 70, 56));
        assert_eq!(face.pixels.dimensions(), (70, 56));
    }

    #[test]
    fn test_equal_area_keeps_first() {
        let frame = gradient_frame(0, 200, 200);
        let faces = vec![FaceRect::new(100, 100, 40, 40), FaceRect::new(10, 10, 40, 40)];
        let face = isolator(faces).isolate(&frame).unwrap().unwrap();
        assert_eq!(face.bbox.x, 92);
    }

    #[test]
    fn test_crop_matches_source_pixels() {
        let frame = gradient_frame(0, 120, 90);
        let face = isolator(vec![FaceRect::new(40, 30, 30, 30)])
            .isolate(&frame)
            .unwrap()
            .unwrap();
        let (bx, by) = (face.bbox.x, face.bbox.y);
        assert_eq!(face.pixels.get_pixel(0, 0), frame.pixels().get_pixel(bx, by));
        assert_eq!(
            face.pixels.get_pixel(5, 7),
            frame.pixels().get_pixel(bx + 5, by + 7)
        );
    }

    #[test]
    fn test_overhanging_candidate_is_clamped() {
        let frame = gradient_frame(0, 100, 100);
        let face = isolator(vec![FaceRect::new(-20, 80, 60, 60)])
            .isolate(&frame)
            .unwrap()
            .unwrap();
        assert!(face.bbox.fits_within(100, 100));
        assert_eq!(face.bbox.x, 0);
    }

    #[test]
    fn test_overhanging_candidate_ranked_by_raw_area() {
        let frame = gradient_frame(0, 100, 100);
        // 60x60 hangs off the right edge; its visible 20x60 part is smaller than 40x40
        let faces = vec![FaceRect::new(10, 10, 40, 40), FaceRect::new(80, 0, 60, 60)];
        let face = isolator(faces).isolate(&frame).unwrap().unwrap();
        // clamped (80,0,20,60) grown by 1.4
        assert_eq!(face.bbox, BoundingBox::new(76, 0, 24, 84));
        assert!(face.bbox.fits_within(100, 100));
    }

    #[test]
    fn test_detector_error_propagates() {
        let frame = gradient_frame(0, 50, 50);
        let mut isolator = FaceIsolator::new(Box::new(ScriptedDetector::broken()), 1.4);
        assert!(isolator.isolate(&frame).is_err());
    }
}
