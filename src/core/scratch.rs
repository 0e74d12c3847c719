use image::{ImageFormat, RgbImage};
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{PipelineError, PipelineResult};

/// A frame persisted to the scratch directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScratchFile {
    pub path: PathBuf,
    pub ordinal: u64,
}

/// Owner of one run's working directory.
#[derive(Debug)]
pub struct ScratchStore {
    dir: PathBuf,
}

impl ScratchStore {
    /// Use exactly `dir` as the scratch directory.
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// A fresh, uniquely named directory under `root`. Nothing is created yet.
    pub fn unique_in(root: &Path) -> Self {
        Self::at(root.join(format!("frames_{}", uuid::Uuid::new_v4().simple())))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_name(ordinal: u64) -> String {
        format!("frame_{}.png", ordinal)
    }

    /// Create the directory if needed. Reusing an existing one is not an error.
    pub fn acquire(&self) -> PipelineResult<&Path> {
        if !self.dir.is_dir() {
            fs::create_dir_all(&self.dir).map_err(|source| PipelineError::Scratch {
                path: self.dir.clone(),
                source,
            })?;
            info!("Frames directory created at: {}", self.dir.display());
        }
        Ok(&self.dir)
    }

    /// Write `pixels` losslessly as `frame_<ordinal>.png`.
    pub fn write(&self, ordinal: u64, pixels: &RgbImage) -> PipelineResult<ScratchFile> {
        let path = self.dir.join(Self::file_name(ordinal));
        pixels
            .save_with_format(&path, ImageFormat::Png)
            .map_err(|source| match source {
                image::ImageError::IoError(io) => PipelineError::Scratch {
                    path: path.clone(),
                    source: io,
                },
                other => PipelineError::Encode {
                    ordinal,
                    source: other,
                },
            })?;
        debug!("Captured frame: {}", path.display());
        Ok(ScratchFile { path, ordinal })
    }

    /// Remove the directory and everything in it. Missing directories are fine.
    pub fn release(&self) -> PipelineResult<()> {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => {
                info!("Frames directory removed: {}", self.dir.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(PipelineError::Scratch {
                path: self.dir.clone(),
                source,
            }),
        }
    }
}

/// Releases the wrapped store when dropped unless [`ScratchGuard::keep`] was called.
pub struct ScratchGuard {
    store: ScratchStore,
    armed: bool,
}

impl ScratchGuard {
    pub fn new(store: ScratchStore) -> Self {
        Self { store, armed: true }
    }

    pub fn store(&self) -> &ScratchStore {
        &self.store
    }

    /// Disarm the guard and hand back the directory path.
    pub fn keep(mut self) -> PathBuf {
        self.armed = false;
        self.store.dir.clone()
    }

    /// Release now, reporting any error instead of logging it from `drop`.
    pub fn release(mut self) -> PipelineResult<PathBuf> {
        self.armed = false;
        self.store.release()?;
        Ok(self.store.dir.clone())
    }
}

impl Drop for ScratchGuard {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = self.store.release() {
                warn!("Failed to clean up scratch directory: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let store = ScratchStore::unique_in(root.path());
        let first = store.acquire().unwrap().to_path_buf();
        let second = store.acquire().unwrap().to_path_buf();
        assert_eq!(first, second);
        assert!(first.is_dir());
    }

    #[test]
    fn test_write_names_file_by_ordinal() {
        let root = tempfile::tempdir().unwrap();
        let store = ScratchStore::at(root.path().join("scratch"));
        store.acquire().unwrap();

        let file = store.write(3, &RgbImage::new(5, 4)).unwrap();
        assert_eq!(file.ordinal, 3);
        assert_eq!(file.path, store.dir().join("frame_3.png"));
        let reloaded = image::open(&file.path).unwrap();
        assert_eq!((reloaded.width(), reloaded.height()), (5, 4));
    }

    #[test]
    fn test_write_is_lossless() {
        let root = tempfile::tempdir().unwrap();
        let store = ScratchStore::at(root.path().join("scratch"));
        store.acquire().unwrap();

        let pixels = RgbImage::from_fn(7, 3, |x, y| image::Rgb([x as u8 * 31, y as u8 * 77, 5]));
        let file = store.write(0, &pixels).unwrap();
        assert_eq!(image::open(&file.path).unwrap().to_rgb8(), pixels);
    }

    #[test]
    fn test_release_removes_contents() {
        let root = tempfile::tempdir().unwrap();
        let store = ScratchStore::unique_in(root.path());
        store.acquire().unwrap();
        store.write(0, &RgbImage::new(2, 2)).unwrap();

        store.release().unwrap();
        assert!(!store.dir().exists());
    }

    #[test]
    fn test_release_of_missing_directory_is_noop() {
        let root = tempfile::tempdir().unwrap();
        let store = ScratchStore::at(root.path().join("never-created"));
        store.release().unwrap();
        store.release().unwrap();
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let dir = {
            let guard = ScratchGuard::new(ScratchStore::unique_in(root.path()));
            guard.store().acquire().unwrap();
            guard.store().dir().to_path_buf()
        };
        assert!(!dir.exists());
    }

    #[test]
    fn test_guard_keep_leaves_directory() {
        let root = tempfile::tempdir().unwrap();
        let guard = ScratchGuard::new(ScratchStore::unique_in(root.path()));
        guard.store().acquire().unwrap();
        let dir = guard.keep();
        assert!(dir.is_dir());
    }

    #[test]
    fn test_unique_directories_differ() {
        let root = tempfile::tempdir().unwrap();
        let a = ScratchStore::unique_in(root.path());
        let b = ScratchStore::unique_in(root.path());
        assert_ne!(a.dir(), b.dir());
    }
}
