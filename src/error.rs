use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors. Anything that can be absorbed per sample or per extractor
/// never reaches this type.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("video source unreadable: {0}")]
    SourceUnreadable(String),

    #[error("no frames extracted after decoding {decoded_frames} frames")]
    NoFramesExtracted { decoded_frames: u64 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("scratch directory {path}: {source}")]
    Scratch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode frame {ordinal}: {source}")]
    Encode {
        ordinal: u64,
        #[source]
        source: image::ImageError,
    },

    #[error("run interrupted")]
    Interrupted,

    #[error("face detector unavailable: {0}")]
    Detector(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serializable tag for a fatal error, carried by a failed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    SourceUnreadable,
    NoFramesExtracted,
    InvalidConfig,
    ScratchIo,
    Interrupted,
    DetectorUnavailable,
}

impl PipelineError {
    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::SourceUnreadable(_) => FailureKind::SourceUnreadable,
            PipelineError::NoFramesExtracted { .. } => FailureKind::NoFramesExtracted,
            PipelineError::InvalidConfig(_) | PipelineError::Json(_) => FailureKind::InvalidConfig,
            PipelineError::Scratch { .. } | PipelineError::Encode { .. } | PipelineError::Io(_) => {
                FailureKind::ScratchIo
            }
            PipelineError::Interrupted => FailureKind::Interrupted,
            PipelineError::Detector(_) => FailureKind::DetectorUnavailable,
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// A single extractor call that did not produce features.
#[derive(Error, Debug)]
pub enum ExtractorError {
    #[error("failed to launch `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("exited with {status}: {stderr}")]
    Exit { status: String, stderr: String },

    #[error("malformed output: {0}")]
    Output(String),

    #[error("unexpected tensor shape {actual:?}, expected {expected:?}")]
    Shape {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("{0}")]
    Model(String),

    #[error("panicked: {0}")]
    Panicked(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            PipelineError::SourceUnreadable("x".into()).kind(),
            FailureKind::SourceUnreadable
        );
        assert_eq!(
            PipelineError::NoFramesExtracted { decoded_frames: 0 }.kind(),
            FailureKind::NoFramesExtracted
        );
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        assert_eq!(
            PipelineError::Scratch { path: "/tmp/x".into(), source: io }.kind(),
            FailureKind::ScratchIo
        );
        assert_eq!(PipelineError::Interrupted.kind(), FailureKind::Interrupted);
    }

    #[test]
    fn test_failure_kind_serializes_snake_case() {
        let json = serde_json::to_string(&FailureKind::NoFramesExtracted).unwrap();
        assert_eq!(json, "\"no_frames_extracted\"");
    }
}
