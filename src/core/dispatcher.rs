use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, warn};

use super::extractor::{ExtractorKind, FeatureExtractor, FeatureTensor, FrameInput};
use super::scratch::ScratchFile;
use crate::decoder::BoundingBox;
use crate::error::ExtractorError;

/// Outcome of one extractor on one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ModelOutcome {
    Features(FeatureTensor),
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelResult {
    pub extractor: ExtractorKind,
    pub outcome: ModelOutcome,
}

impl ModelResult {
    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, ModelOutcome::Features(_))
    }

    pub fn features(&self) -> Option<&FeatureTensor> {
        match &self.outcome {
            ModelOutcome::Features(tensor) => Some(tensor),
            ModelOutcome::Failed { .. } => None,
        }
    }
}

/// All extractor outcomes for one processed frame, ordered by `ExtractorKind`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameResult {
    pub ordinal: u64,
    pub decode_index: u64,
    pub scratch_file: ScratchFile,
    /// Set when the frame was cropped to a face.
    pub face: Option<BoundingBox>,
    pub results: Vec<ModelResult>,
}

impl FrameResult {
    pub fn result(&self, kind: ExtractorKind) -> Option<&ModelResult> {
        self.results.iter().find(|r| r.extractor == kind)
    }

    pub fn failures(&self) -> usize {
        self.results.iter().filter(|r| !r.is_ok()).count()
    }
}

/// Sends each frame to every extractor in turn and collects what comes back.
///
/// One extractor failing (or panicking) never stops the others.
pub struct ModelDispatcher {
    extractors: Vec<(ExtractorKind, Box<dyn FeatureExtractor>)>,
}

impl ModelDispatcher {
    pub fn new(
        sequence: Box<dyn FeatureExtractor>,
        backbone: Box<dyn FeatureExtractor>,
        capsule: Box<dyn FeatureExtractor>,
    ) -> Self {
        let mut extractors = vec![
            (ExtractorKind::Sequence, sequence),
            (ExtractorKind::Backbone, backbone),
            (ExtractorKind::Capsule, capsule),
        ];
        extractors.sort_by_key(|(kind, _)| *kind);
        Self { extractors }
    }

    pub fn dispatch(&self, input: &FrameInput<'_>) -> Vec<ModelResult> {
        self.extractors
            .iter()
            .map(|(kind, extractor)| {
                let outcome = match run_isolated(extractor.as_ref(), input) {
                    Ok(tensor) => {
                        debug!("{} result: shape {:?}", kind, tensor.shape);
                        ModelOutcome::Features(tensor)
                    }
                    Err(e) => {
                        warn!("{} failed on {}: {}", kind, input.persisted.display(), e);
                        ModelOutcome::Failed {
                            message: e.to_string(),
                        }
                    }
                };
                ModelResult {
                    extractor: *kind,
                    outcome,
                }
            })
            .collect()
    }
}

fn run_isolated(
    extractor: &dyn FeatureExtractor,
    input: &FrameInput<'_>,
) -> Result<FeatureTensor, ExtractorError> {
    panic::catch_unwind(AssertUnwindSafe(|| extractor.extract(input))).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(ExtractorError::Panicked(message))
    })
}
