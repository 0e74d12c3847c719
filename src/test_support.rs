//! In-memory fakes shared by unit tests.

use image::{GrayImage, Rgb, RgbImage};
use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use crate::core::dispatcher::ModelDispatcher;
use crate::core::extractor::{FeatureExtractor, FeatureTensor, FrameInput};
use crate::decoder::{Frame, VideoInfo, VideoSource};
use crate::error::{ExtractorError, PipelineError, PipelineResult};
use crate::face::{DetectionError, FaceDetector, FaceRect};

/// A frame whose pixels differ by position and by `index`.
pub fn gradient_frame(index: u64, width: u32, height: u32) -> Frame {
    let pixels = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, (index % 256) as u8])
    });
    Frame::new(index, pixels)
}

/// Synthetic video with `total` frames.
pub struct MemorySource {
    total: u64,
    width: u32,
    height: u32,
    fail_from: Option<u64>,
}

impl MemorySource {
    pub fn new(total: u64, width: u32, height: u32) -> Self {
        Self {
            total,
            width,
            height,
            fail_from: None,
        }
    }

    /// Decoding errors from `index` onwards.
    pub fn failing_from(mut self, index: u64) -> Self {
        self.fail_from = Some(index);
        self
    }
}

impl VideoSource for MemorySource {
    fn info(&self) -> VideoInfo {
        VideoInfo {
            frame_count: Some(self.total),
            fps: Some(30.0),
            width: Some(self.width),
            height: Some(self.height),
        }
    }

    fn read_frame(&mut self, index: u64) -> PipelineResult<Option<Frame>> {
        if self.fail_from.is_some_and(|from| index >= from) {
            return Err(PipelineError::SourceUnreadable(format!("corrupt frame {index}")));
        }
        if index >= self.total {
            return Ok(None);
        }
        Ok(Some(gradient_frame(index, self.width, self.height)))
    }

    fn describe(&self) -> String {
        format!("memory ({} frames)", self.total)
    }
}

/// Detector returning canned answers.
pub struct ScriptedDetector {
    script: VecDeque<Vec<FaceRect>>,
    fallback: Option<Vec<FaceRect>>,
}

impl ScriptedDetector {
    /// Same faces on every call.
    pub fn always(faces: Vec<FaceRect>) -> Self {
        Self {
            script: VecDeque::new(),
            fallback: Some(faces),
        }
    }

    /// Answer `n` for the n-th call, then no faces.
    pub fn per_call(script: Vec<Vec<FaceRect>>) -> Self {
        Self {
            script: script.into(),
            fallback: Some(Vec::new()),
        }
    }

    /// Fails on every call.
    pub fn broken() -> Self {
        Self {
            script: VecDeque::new(),
            fallback: None,
        }
    }
}

impl FaceDetector for ScriptedDetector {
    fn detect(&mut self, _luma: &GrayImage) -> Result<Vec<FaceRect>, DetectionError> {
        if let Some(faces) = self.script.pop_front() {
            return Ok(faces);
        }
        self.fallback
            .clone()
            .ok_or_else(|| DetectionError("classifier not loaded".to_string()))
    }
}

/// Returns a zero tensor of a fixed shape and counts calls.
pub struct FixedExtractor {
    shape: Vec<usize>,
    calls: Rc<Cell<usize>>,
}

impl FixedExtractor {
    pub fn new(shape: Vec<usize>) -> Self {
        Self {
            shape,
            calls: Rc::new(Cell::new(0)),
        }
    }

    pub fn calls(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.calls)
    }
}

impl FeatureExtractor for FixedExtractor {
    fn extract(&self, _input: &FrameInput<'_>) -> Result<FeatureTensor, ExtractorError> {
        self.calls.set(self.calls.get() + 1);
        let len = self.shape.iter().product();
        FeatureTensor::new(self.shape.clone(), vec![0.0; len])
    }
}

pub struct FailingExtractor;

impl FeatureExtractor for FailingExtractor {
    fn extract(&self, _input: &FrameInput<'_>) -> Result<FeatureTensor, ExtractorError> {
        Err(ExtractorError::Model("weights missing".to_string()))
    }
}

pub struct PanickingExtractor;

impl FeatureExtractor for PanickingExtractor {
    fn extract(&self, _input: &FrameInput<'_>) -> Result<FeatureTensor, ExtractorError> {
        panic!("extractor blew up");
    }
}

pub struct SlowExtractor(pub Duration);

impl FeatureExtractor for SlowExtractor {
    fn extract(&self, _input: &FrameInput<'_>) -> Result<FeatureTensor, ExtractorError> {
        thread::sleep(self.0);
        FeatureTensor::new(vec![1], vec![0.0])
    }
}

/// Three working extractors with the default shapes.
pub fn fixed_dispatcher() -> ModelDispatcher {
    ModelDispatcher::new(
        Box::new(FixedExtractor::new(vec![1, 4])),
        Box::new(FixedExtractor::new(vec![1, 1, 2048])),
        Box::new(FixedExtractor::new(vec![1, 2])),
    )
}
