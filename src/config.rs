use serde::{Deserialize, Serialize};
use std::fs;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{PipelineError, PipelineResult};

/// Sampling interval used when neither the file nor the CLI sets one.
/// One sample per second of 30 fps footage.
pub const DEFAULT_FRAME_SKIP: u32 = 30;
pub const DEFAULT_SCALE_FACTOR: f64 = 1.4;
pub const DEFAULT_FEATURE_DIM: usize = 2048;

/// Cascade detector tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectionParams {
    /// OpenCV cascade XML, e.g. `haarcascade_frontalface_default.xml`.
    pub cascade_path: Option<PathBuf>,
    /// Image pyramid step of the scale-invariant search.
    pub scale_step: f64,
    /// Neighbouring detections required to keep a candidate.
    pub min_neighbors: u32,
    /// Smallest face edge in pixels.
    pub min_face_size: u32,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            cascade_path: None,
            scale_step: 1.1,
            min_neighbors: 5,
            min_face_size: 30,
        }
    }
}

/// How to launch one external feature extractor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Pretrained weights passed as `--weights <path>`.
    #[serde(default)]
    pub weights: Option<PathBuf>,
    /// Required output shape; unchecked when absent.
    #[serde(default)]
    pub expected_shape: Option<Vec<usize>>,
}

impl CommandSpec {
    fn script(name: &str) -> Self {
        Self {
            program: "python".to_string(),
            args: vec![name.to_string()],
            weights: None,
            expected_shape: None,
        }
    }
}

/// The three extractors every frame is sent to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractorsConfig {
    pub sequence: CommandSpec,
    pub backbone: CommandSpec,
    pub capsule: CommandSpec,
}

impl Default for ExtractorsConfig {
    fn default() -> Self {
        let mut backbone = CommandSpec::script("models/backbone_features.py");
        backbone.weights = Some(PathBuf::from("models/resnext101_32x8d.pth"));
        backbone.expected_shape = Some(vec![1, 1, DEFAULT_FEATURE_DIM]);
        Self {
            sequence: CommandSpec::script("models/sequence_features.py"),
            backbone,
            capsule: CommandSpec::script("models/capsule_features.py"),
        }
    }
}

fn default_frame_skip() -> NonZeroU32 {
    NonZeroU32::new(DEFAULT_FRAME_SKIP).unwrap_or(NonZeroU32::MIN)
}

fn default_scale_factor() -> f64 {
    DEFAULT_SCALE_FACTOR
}

fn default_true() -> bool {
    true
}

/// Everything one pipeline run needs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    #[serde(default)]
    pub video_path: PathBuf,
    #[serde(default = "default_frame_skip")]
    pub frame_skip: NonZeroU32,
    #[serde(default)]
    pub enable_face_isolation: bool,
    #[serde(default = "default_scale_factor")]
    pub face_expand_scale_factor: f64,
    #[serde(default = "default_true")]
    pub cleanup_scratch_on_success: bool,
    /// Parent of the per-run scratch directory.
    #[serde(default)]
    pub scratch_root: Option<PathBuf>,
    #[serde(default)]
    pub detection: DetectionParams,
    #[serde(default)]
    pub extractors: ExtractorsConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            video_path: PathBuf::new(),
            frame_skip: default_frame_skip(),
            enable_face_isolation: false,
            face_expand_scale_factor: DEFAULT_SCALE_FACTOR,
            cleanup_scratch_on_success: true,
            scratch_root: None,
            detection: DetectionParams::default(),
            extractors: ExtractorsConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn for_video(video_path: impl Into<PathBuf>) -> Self {
        Self {
            video_path: video_path.into(),
            ..Self::default()
        }
    }

    pub fn load(path: &Path) -> PipelineResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: RunConfig = serde_json::from_str(&content)?;
        info!("Loaded run configuration from {}", path.display());
        Ok(config)
    }

    /// Write the default configuration as a starting point.
    pub fn write_template(path: &Path) -> PipelineResult<()> {
        let content = serde_json::to_string_pretty(&RunConfig::default())?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if self.video_path.as_os_str().is_empty() {
            return Err(PipelineError::InvalidConfig("video_path is required".to_string()));
        }
        let scale = self.face_expand_scale_factor;
        if !scale.is_finite() || scale < 1.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "face_expand_scale_factor must be a finite number >= 1.0, got {}",
                scale
            )));
        }
        Ok(())
    }

    /// Checks needed only when the cascade detector is built from this config.
    /// An injected detector does not go through here.
    pub fn validate_detection(&self) -> PipelineResult<()> {
        if !self.enable_face_isolation {
            return Ok(());
        }
        if self.detection.cascade_path.is_none() {
            return Err(PipelineError::InvalidConfig(
                "face isolation needs detection.cascade_path".to_string(),
            ));
        }
        if !(self.detection.scale_step > 1.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "detection.scale_step must be > 1.0, got {}",
                self.detection.scale_step
            )));
        }
        Ok(())
    }

    /// Scratch parent directory: configured root, else the user cache dir, else the OS temp dir.
    pub fn resolved_scratch_root(&self) -> PathBuf {
        self.scratch_root.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .map(|dir| dir.join("deepscan"))
                .unwrap_or_else(std::env::temp_dir)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.frame_skip.get(), 30);
        assert_eq!(config.face_expand_scale_factor, 1.4);
        assert!(config.cleanup_scratch_on_success);
        assert!(!config.enable_face_isolation);
        assert_eq!(config.detection.min_face_size, 30);
        assert_eq!(
            config.extractors.backbone.expected_shape,
            Some(vec![1, 1, DEFAULT_FEATURE_DIM])
        );
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{ "video_path": "clip.mp4", "frame_skip": 10, "cleanup_scratch_on_success": false }"#;
        let config: RunConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.video_path, PathBuf::from("clip.mp4"));
        assert_eq!(config.frame_skip.get(), 10);
        assert!(!config.cleanup_scratch_on_success);
        assert_eq!(config.face_expand_scale_factor, DEFAULT_SCALE_FACTOR);
    }

    #[test]
    fn test_zero_frame_skip_rejected() {
        let json = r#"{ "video_path": "clip.mp4", "frame_skip": 0 }"#;
        assert!(serde_json::from_str::<RunConfig>(json).is_err());
    }

    #[test]
    fn test_validate() {
        let mut config = RunConfig::for_video("clip.mp4");
        assert!(config.validate().is_ok());

        config.face_expand_scale_factor = 0.8;
        assert!(matches!(config.validate(), Err(PipelineError::InvalidConfig(_))));
        config.face_expand_scale_factor = f64::NAN;
        assert!(config.validate().is_err());
        config.face_expand_scale_factor = 1.4;

        assert!(RunConfig::default().validate().is_err());
    }

    #[test]
    fn test_validate_detection() {
        let mut config = RunConfig::for_video("clip.mp4");
        assert!(config.validate_detection().is_ok());

        config.enable_face_isolation = true;
        // an injected detector needs no cascade, so only this check rejects it
        assert!(config.validate().is_ok());
        assert!(matches!(
            config.validate_detection(),
            Err(PipelineError::InvalidConfig(_))
        ));

        config.detection.cascade_path = Some(PathBuf::from("face.xml"));
        assert!(config.validate_detection().is_ok());
        config.detection.scale_step = 1.0;
        assert!(config.validate_detection().is_err());
    }

    #[test]
    fn test_template_round_trips_through_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deepscan.json");
        RunConfig::write_template(&path).unwrap();
        assert_eq!(RunConfig::load(&path).unwrap(), RunConfig::default());
    }
}
