use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use super::frame_data::Frame;
use super::video::{VideoInfo, VideoSource};
use crate::error::{PipelineError, PipelineResult};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// A directory of still images played back in file-name order.
pub struct ImageSequenceSource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    cursor: usize,
}

impl ImageSequenceSource {
    pub fn open(dir: &Path) -> PipelineResult<Self> {
        let entries = fs::read_dir(dir).map_err(|e| {
            PipelineError::SourceUnreadable(format!("{}: {}", dir.display(), e))
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                let ext = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("")
                    .to_lowercase();
                path.is_file() && IMAGE_EXTENSIONS.contains(&ext.as_str())
            })
            .collect();
        files.sort();

        Ok(Self {
            dir: dir.to_path_buf(),
            files,
            cursor: 0,
        })
    }
}

impl VideoSource for ImageSequenceSource {
    fn info(&self) -> VideoInfo {
        let (width, height) = self
            .files
            .first()
            .and_then(|first| image::image_dimensions(first).ok())
            .map(|(w, h)| (Some(w), Some(h)))
            .unwrap_or((None, None));

        VideoInfo {
            frame_count: Some(self.files.len() as u64),
            fps: None,
            width,
            height,
        }
    }

    fn read_frame(&mut self, index: u64) -> PipelineResult<Option<Frame>> {
        let Some(path) = self.files.get(self.cursor) else {
            return Ok(None);
        };
        self.cursor += 1;

        match image::open(path) {
            Ok(img) => Ok(Some(Frame::new(index, img.to_rgb8()))),
            Err(e) => {
                // treated like a decoder that stops returning data
                warn!("Stopping at unreadable image {}: {}", path.display(), e);
                self.cursor = self.files.len();
                Ok(None)
            }
        }
    }

    fn describe(&self) -> String {
        format!("image sequence {} ({} images)", self.dir.display(), self.files.len())
    }
}
