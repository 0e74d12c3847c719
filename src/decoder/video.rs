use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

use super::frame_data::Frame;
use super::image_sequence::ImageSequenceSource;
use crate::error::{PipelineError, PipelineResult};

/// Stream properties known at open time. Any field may be unknown.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VideoInfo {
    pub frame_count: Option<u64>,
    pub fps: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// A sequentially decodable video stream.
///
/// The handle is released when the source is dropped.
pub trait VideoSource {
    fn info(&self) -> VideoInfo;

    /// Decode the next frame. `Ok(None)` is the normal end of stream.
    /// `index` is the zero-based decode position of the frame being read.
    fn read_frame(&mut self, index: u64) -> PipelineResult<Option<Frame>>;

    /// Short label for the trace.
    fn describe(&self) -> String;
}

/// Open `path` as a video source.
///
/// Directories are read as an image sequence; anything else needs the OpenCV
/// decoder (`opencv` feature).
pub fn open_source(path: &Path) -> PipelineResult<Box<dyn VideoSource>> {
    if !path.exists() {
        return Err(PipelineError::SourceUnreadable(format!(
            "{} does not exist",
            path.display()
        )));
    }

    let source: Box<dyn VideoSource> = if path.is_dir() {
        Box::new(ImageSequenceSource::open(path)?)
    } else {
        open_video_file(path)?
    };

    let info = source.info();
    info!("Opened {}", source.describe());
    debug!(
        "Stream info: frames={:?} fps={:?} size={:?}x{:?}",
        info.frame_count, info.fps, info.width, info.height
    );
    Ok(source)
}

#[cfg(feature = "opencv")]
fn open_video_file(path: &Path) -> PipelineResult<Box<dyn VideoSource>> {
    Ok(Box::new(super::opencv_source::OpenCvSource::open(path)?))
}

#[cfg(not(feature = "opencv"))]
fn open_video_file(path: &Path) -> PipelineResult<Box<dyn VideoSource>> {
    Err(PipelineError::SourceUnreadable(format!(
        "{}: video files need the `opencv` feature; pass a directory of images instead",
        path.display()
    )))
}

/// Read stream properties without sampling.
pub fn probe(path: &Path) -> PipelineResult<VideoInfo> {
    Ok(open_source(path)?.info())
}

/// Interval that yields roughly `per_second` samples per second of footage.
pub fn interval_for_rate(fps: f64, per_second: f64) -> Option<u32> {
    if !fps.is_finite() || fps <= 0.0 || !per_second.is_finite() || per_second <= 0.0 {
        return None;
    }
    Some(((fps / per_second).round() as u32).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_path_is_unreadable() {
        let err = open_source(Path::new("/definitely/not/here.mp4")).err();
        assert!(matches!(err, Some(PipelineError::SourceUnreadable(_))));
    }

    #[cfg(not(feature = "opencv"))]
    #[test]
    fn test_video_file_without_decoder_is_unreadable() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = open_source(file.path()).err();
        assert!(matches!(err, Some(PipelineError::SourceUnreadable(_))));
    }

    #[test]
    fn test_interval_for_rate() {
        assert_eq!(interval_for_rate(30.0, 1.0), Some(30));
        assert_eq!(interval_for_rate(29.97, 1.0), Some(30));
        assert_eq!(interval_for_rate(24.0, 2.0), Some(12));
        assert_eq!(interval_for_rate(10.0, 50.0), Some(1));
        assert_eq!(interval_for_rate(0.0, 1.0), None);
        assert_eq!(interval_for_rate(30.0, 0.0), None);
    }
}
