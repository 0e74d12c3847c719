use std::num::NonZeroU32;
use tracing::{trace, warn};

use super::frame_data::Frame;
use super::video::VideoSource;

/// Lazily yields every `interval`-th decoded frame (decode indices 0, N, 2N, ...).
///
/// Single pass: once the source reports end of stream the sampler is spent and
/// the source is dropped with it.
pub struct FrameSampler {
    source: Box<dyn VideoSource>,
    interval: u64,
    decoded: u64,
    exhausted: bool,
}

impl FrameSampler {
    pub fn new(source: Box<dyn VideoSource>, interval: NonZeroU32) -> Self {
        Self {
            source,
            interval: interval.get() as u64,
            decoded: 0,
            exhausted: false,
        }
    }

    /// Number of frames decoded so far, sampled or not.
    pub fn decoded_frames(&self) -> u64 {
        self.decoded
    }
}

impl Iterator for FrameSampler {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        while !self.exhausted {
            let index = self.decoded;
            let frame = match self.source.read_frame(index) {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    self.exhausted = true;
                    break;
                }
                Err(e) => {
                    warn!("Ending sample sequence at decode index {}: {}", index, e);
                    self.exhausted = true;
                    break;
                }
            };
            self.decoded += 1;

            if index % self.interval == 0 {
                trace!("Sampled decode index {}", index);
                return Some(frame);
            }
        }
        None
    }
}

impl std::iter::FusedIterator for FrameSampler {}
