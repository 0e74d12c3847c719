#[cfg(feature = "opencv")]
pub mod cascade;
pub mod detector;
pub mod isolator;

pub use detector::{build_detector, DetectionError, FaceDetector, FaceRect};
pub use isolator::{DetectedFace, FaceIsolator};
