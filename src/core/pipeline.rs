use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::command_extractor::CommandExtractor;
use super::dispatcher::{FrameResult, ModelDispatcher};
use super::extractor::FrameInput;
use super::scratch::{ScratchGuard, ScratchStore};
use crate::config::RunConfig;
use crate::decoder::{open_source, FrameSampler, VideoSource};
use crate::error::{FailureKind, PipelineError, PipelineResult};
use crate::face::{build_detector, FaceIsolator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    SourceOpened,
    Sampling,
    Isolating,
    Persisting,
    Dispatching,
    Draining,
    Cleanup,
    Done,
    Failed,
}

/// Why a sampled frame produced no `FrameResult`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    FaceNotFound,
    DetectorError { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedSample {
    pub decode_index: u64,
    #[serde(flatten)]
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunStats {
    pub decoded_frames: u64,
    pub sampled_frames: u64,
    pub extracted_frame_count: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Terminal result of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    Success {
        scratch_dir: PathBuf,
        /// False when the directory was removed during cleanup.
        scratch_retained: bool,
        results: Vec<FrameResult>,
        skipped: Vec<SkippedSample>,
        stats: RunStats,
    },
    Failure {
        kind: FailureKind,
        message: String,
        stats: RunStats,
    },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success { .. })
    }

    pub fn stats(&self) -> &RunStats {
        match self {
            RunOutcome::Success { stats, .. } | RunOutcome::Failure { stats, .. } => stats,
        }
    }

    /// A run that was refused before any source was opened.
    pub fn rejected(error: &PipelineError) -> Self {
        RunOutcome::Failure {
            kind: error.kind(),
            message: error.to_string(),
            stats: RunStats::empty(),
        }
    }
}

impl RunStats {
    fn empty() -> Self {
        let now = Utc::now();
        Self {
            decoded_frames: 0,
            sampled_frames: 0,
            extracted_frame_count: 0,
            started_at: now,
            finished_at: now,
        }
    }
}

/// Build the pipeline from `config` and run it once. Construction errors
/// come back as a `Failure` outcome like any other.
pub fn run_configured(config: RunConfig, interrupt: Option<Arc<AtomicBool>>) -> RunOutcome {
    match PipelineOrchestrator::from_config(config) {
        Ok(mut pipeline) => {
            pipeline.interrupt = interrupt;
            pipeline.run()
        }
        Err(e) => {
            warn!("Pipeline setup failed: {}", e);
            RunOutcome::rejected(&e)
        }
    }
}

struct Collected {
    results: Vec<FrameResult>,
    skipped: Vec<SkippedSample>,
}

/// Drives one run: sample, optionally crop to a face, persist, dispatch.
pub struct PipelineOrchestrator {
    config: RunConfig,
    isolator: Option<FaceIsolator>,
    dispatcher: ModelDispatcher,
    interrupt: Option<Arc<AtomicBool>>,
    states: Vec<PipelineState>,
    stats: RunStats,
}

impl PipelineOrchestrator {
    pub fn new(config: RunConfig, dispatcher: ModelDispatcher) -> Self {
        Self {
            config,
            isolator: None,
            dispatcher,
            interrupt: None,
            states: vec![PipelineState::Idle],
            stats: RunStats::empty(),
        }
    }

    /// Wire up the command extractors and, if enabled, the cascade detector.
    pub fn from_config(config: RunConfig) -> PipelineResult<Self> {
        config.validate()?;
        config.validate_detection()?;
        let extractors = &config.extractors;
        let dispatcher = ModelDispatcher::new(
            Box::new(CommandExtractor::new(extractors.sequence.clone())),
            Box::new(CommandExtractor::new(extractors.backbone.clone())),
            Box::new(CommandExtractor::new(extractors.capsule.clone())),
        );

        let isolator = if config.enable_face_isolation {
            let detector = build_detector(&config.detection)?;
            Some(FaceIsolator::new(detector, config.face_expand_scale_factor))
        } else {
            None
        };

        let mut orchestrator = Self::new(config, dispatcher);
        orchestrator.isolator = isolator;
        Ok(orchestrator)
    }

    /// Crop every sample to its dominant face before dispatch.
    pub fn with_isolator(mut self, isolator: FaceIsolator) -> Self {
        self.config.enable_face_isolation = true;
        self.isolator = Some(isolator);
        self
    }

    /// Stop before the next sample once `flag` is set.
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// States visited by the latest run, in order.
    pub fn states(&self) -> &[PipelineState] {
        &self.states
    }

    /// Open `config.video_path` and process it.
    pub fn run(&mut self) -> RunOutcome {
        self.reset();
        info!("Processing video {}", self.config.video_path.display());

        let source = match self.config.validate().and_then(|_| open_source(&self.config.video_path)) {
            Ok(source) => source,
            Err(e) => return self.fail(e),
        };
        self.process(source)
    }

    /// Process an already opened source. The source is dropped before this returns.
    pub fn run_source(&mut self, source: Box<dyn VideoSource>) -> RunOutcome {
        self.reset();
        self.process(source)
    }

    // each run starts from Idle with zeroed counters
    fn reset(&mut self) {
        self.states.clear();
        self.states.push(PipelineState::Idle);
        self.stats = RunStats::empty();
    }

    fn process(&mut self, source: Box<dyn VideoSource>) -> RunOutcome {
        self.enter(PipelineState::SourceOpened);

        if self.config.enable_face_isolation && self.isolator.is_none() {
            return self.fail(PipelineError::InvalidConfig(
                "face isolation enabled without a detector".to_string(),
            ));
        }

        let scratch = ScratchGuard::new(ScratchStore::unique_in(&self.config.resolved_scratch_root()));
        match self.collect(source, &scratch) {
            Ok(collected) => self.finish(scratch, collected),
            Err(e) => {
                self.enter(PipelineState::Cleanup);
                // guard removes the directory on drop
                drop(scratch);
                self.fail(e)
            }
        }
    }

    fn collect(&mut self, source: Box<dyn VideoSource>, scratch: &ScratchGuard) -> PipelineResult<Collected> {
        let store = scratch.store();
        store.acquire()?;
        self.enter(PipelineState::Sampling);

        let mut sampler = FrameSampler::new(source, self.config.frame_skip);
        let mut results: Vec<FrameResult> = Vec::new();
        let mut skipped = Vec::new();

        while let Some(frame) = sampler.next() {
            if self.interrupted() {
                self.stats.decoded_frames = sampler.decoded_frames();
                return Err(PipelineError::Interrupted);
            }
            self.stats.sampled_frames += 1;
            let decode_index = frame.index();

            if self.isolator.is_some() {
                self.enter(PipelineState::Isolating);
            }
            let (pixels, face) = match self.isolator.as_mut() {
                Some(isolator) => match isolator.isolate(&frame) {
                    Ok(Some(face)) => (face.pixels, Some(face.bbox)),
                    Ok(None) => {
                        info!("No face found in frame {}, skipping", decode_index);
                        skipped.push(SkippedSample {
                            decode_index,
                            reason: SkipReason::FaceNotFound,
                        });
                        continue;
                    }
                    Err(e) => {
                        warn!("Skipping frame {}: {}", decode_index, e);
                        skipped.push(SkippedSample {
                            decode_index,
                            reason: SkipReason::DetectorError {
                                message: e.to_string(),
                            },
                        });
                        continue;
                    }
                },
                None => (frame.into_pixels(), None),
            };

            self.enter(PipelineState::Persisting);
            let ordinal = results.len() as u64;
            let scratch_file = store.write(ordinal, &pixels)?;
            info!("Captured frame: {}", scratch_file.path.display());

            self.enter(PipelineState::Dispatching);
            let model_results = self.dispatcher.dispatch(&FrameInput {
                pixels: &pixels,
                persisted: &scratch_file.path,
            });

            let frame_result = FrameResult {
                ordinal,
                decode_index,
                scratch_file,
                face,
                results: model_results,
            };
            info!(
                "Frame {} (decode index {}): {} of {} extractors succeeded",
                ordinal,
                decode_index,
                frame_result.results.len() - frame_result.failures(),
                frame_result.results.len()
            );
            results.push(frame_result);
            self.stats.extracted_frame_count = results.len() as u64;
        }

        self.stats.decoded_frames = sampler.decoded_frames();
        // releases the video handle
        drop(sampler);
        self.enter(PipelineState::Draining);

        if results.is_empty() {
            info!("No frames were captured.");
            return Err(PipelineError::NoFramesExtracted {
                decoded_frames: self.stats.decoded_frames,
            });
        }
        info!("Total frames captured and processed: {}", results.len());
        Ok(Collected { results, skipped })
    }

    fn finish(&mut self, scratch: ScratchGuard, collected: Collected) -> RunOutcome {
        self.enter(PipelineState::Cleanup);
        let scratch_dir = scratch.store().dir().to_path_buf();

        let scratch_retained = if self.config.cleanup_scratch_on_success {
            info!("Removing frames storage directory");
            match scratch.release() {
                Ok(_) => false,
                Err(e) => {
                    warn!("Cleanup failed, leaving {}: {}", scratch_dir.display(), e);
                    scratch_dir.exists()
                }
            }
        } else {
            info!("Keeping frames directory {}", scratch_dir.display());
            scratch.keep();
            true
        };

        self.enter(PipelineState::Done);
        self.stats.finished_at = Utc::now();
        info!("Video processing completed successfully.");

        RunOutcome::Success {
            scratch_dir,
            scratch_retained,
            results: collected.results,
            skipped: collected.skipped,
            stats: self.stats.clone(),
        }
    }

    fn fail(&mut self, error: PipelineError) -> RunOutcome {
        self.enter(PipelineState::Failed);
        self.stats.finished_at = Utc::now();
        warn!("Run failed: {}", error);
        RunOutcome::Failure {
            kind: error.kind(),
            message: error.to_string(),
            stats: self.stats.clone(),
        }
    }

    fn enter(&mut self, state: PipelineState) {
        debug!("Pipeline state -> {:?}", state);
        self.states.push(state);
    }

    fn interrupted(&self) -> bool {
        self.interrupt
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::SeqCst))
    }
}
