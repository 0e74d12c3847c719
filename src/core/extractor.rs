use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::ExtractorError;

/// Identifies one of the three extractor slots. The derived order is the
/// order results appear in a `FrameResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractorKind {
    /// Temporal/sequence model.
    Sequence,
    /// Convolutional backbone with pretrained weights.
    Backbone,
    /// Capsule network.
    Capsule,
}

impl ExtractorKind {
    pub const ALL: [ExtractorKind; 3] = [
        ExtractorKind::Sequence,
        ExtractorKind::Backbone,
        ExtractorKind::Capsule,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractorKind::Sequence => "sequence",
            ExtractorKind::Backbone => "backbone",
            ExtractorKind::Capsule => "capsule",
        }
    }
}

impl fmt::Display for ExtractorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dense row-major f32 tensor. Opaque to the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTensor {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl FeatureTensor {
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Result<Self, ExtractorError> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(ExtractorError::Output(format!(
                "shape {:?} needs {} values, got {}",
                shape,
                expected,
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// What an extractor is handed for one frame: the pixels, plus the PNG they
/// were persisted to for extractors that read from disk.
#[derive(Debug, Clone, Copy)]
pub struct FrameInput<'a> {
    pub pixels: &'a RgbImage,
    pub persisted: &'a Path,
}

/// A feature-extraction model. Implementations do their own resizing and
/// normalization.
pub trait FeatureExtractor {
    fn extract(&self, input: &FrameInput<'_>) -> Result<FeatureTensor, ExtractorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_order_is_stable() {
        let mut kinds = vec![
            ExtractorKind::Capsule,
            ExtractorKind::Sequence,
            ExtractorKind::Backbone,
        ];
        kinds.sort();
        assert_eq!(kinds, ExtractorKind::ALL.to_vec());
    }

    #[test]
    fn test_tensor_shape_must_match_data() {
        assert!(FeatureTensor::new(vec![1, 1, 4], vec![0.0; 4]).is_ok());
        assert!(FeatureTensor::new(vec![1, 2], vec![0.0; 3]).is_err());
    }
}
