use opencv::{core, imgproc, prelude::*, videoio};
use std::path::Path;
use tracing::{debug, warn};

use super::frame_data::Frame;
use super::video::{VideoInfo, VideoSource};
use crate::error::{PipelineError, PipelineResult};

/// Video file decoded through OpenCV's `VideoCapture`.
pub struct OpenCvSource {
    capture: videoio::VideoCapture,
    label: String,
    info: VideoInfo,
}

impl OpenCvSource {
    pub fn open(path: &Path) -> PipelineResult<Self> {
        let label = path.display().to_string();
        let unreadable = |e: opencv::Error| PipelineError::SourceUnreadable(format!("{}: {}", label, e));

        // CAP_ANY allows OpenCV to choose the best backend
        let capture = videoio::VideoCapture::from_file(&label, videoio::CAP_ANY).map_err(unreadable)?;
        if !capture.is_opened().map_err(unreadable)? {
            return Err(PipelineError::SourceUnreadable(format!(
                "failed to open video file: {}",
                label
            )));
        }

        let fps = capture.get(videoio::CAP_PROP_FPS).unwrap_or(0.0);
        let frame_count = capture.get(videoio::CAP_PROP_FRAME_COUNT).unwrap_or(0.0);
        let width = capture.get(videoio::CAP_PROP_FRAME_WIDTH).unwrap_or(0.0) as u32;
        let height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT).unwrap_or(0.0) as u32;

        // Container metadata is advisory; zero means unknown.
        let info = VideoInfo {
            frame_count: (frame_count > 0.0).then_some(frame_count as u64),
            fps: (fps > 0.0).then_some(fps),
            width: (width > 0).then_some(width),
            height: (height > 0).then_some(height),
        };

        Ok(Self { capture, label, info })
    }

    fn decode_next(&mut self, index: u64) -> opencv::Result<Option<Frame>> {
        let mut bgr = Mat::default();
        if !self.capture.read(&mut bgr)? || bgr.empty() {
            return Ok(None);
        }

        let mut rgb = Mat::default();
        imgproc::cvt_color(
            &bgr,
            &mut rgb,
            imgproc::COLOR_BGR2RGB,
            0,
            core::AlgorithmHint::ALGO_HINT_DEFAULT,
        )?;

        if !rgb.is_continuous() {
            rgb = rgb.try_clone()?;
        }
        let width = rgb.cols() as u32;
        let height = rgb.rows() as u32;
        let buffer = rgb.data_bytes()?.to_vec();

        Ok(Frame::from_rgb24(index, width, height, buffer))
    }
}

impl VideoSource for OpenCvSource {
    fn info(&self) -> VideoInfo {
        self.info.clone()
    }

    fn read_frame(&mut self, index: u64) -> PipelineResult<Option<Frame>> {
        match self.decode_next(index) {
            Ok(frame) => Ok(frame),
            Err(e) => {
                warn!("Decoder stopped at frame {} of {}: {}", index, self.label, e);
                Ok(None)
            }
        }
    }

    fn describe(&self) -> String {
        format!("video {}", self.label)
    }
}

impl Drop for OpenCvSource {
    fn drop(&mut self) {
        if let Err(e) = self.capture.release() {
            warn!("Failed to release {}: {}", self.label, e);
        } else {
            debug!("Released {}", self.label);
        }
    }
}
