pub mod command_extractor;
pub mod dispatcher;
pub mod extractor;
pub mod pipeline;
pub mod scratch;

pub use command_extractor::CommandExtractor;
pub use dispatcher::{FrameResult, ModelDispatcher, ModelOutcome, ModelResult};
pub use extractor::{ExtractorKind, FeatureExtractor, FeatureTensor, FrameInput};
pub use pipeline::{
    run_configured, PipelineOrchestrator, PipelineState, RunOutcome, RunStats, SkipReason,
    SkippedSample,
};
pub use scratch::{ScratchFile, ScratchGuard, ScratchStore};
