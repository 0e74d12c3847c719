pub mod frame_data;
pub mod image_sequence;
#[cfg(feature = "opencv")]
pub mod opencv_source;
pub mod sampler;
pub mod video;

pub use frame_data::{BoundingBox, Frame};
pub use sampler::FrameSampler;
pub use video::{interval_for_rate, open_source, probe, VideoInfo, VideoSource};
