use std::num::NonZeroUsize;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_error::VideoError;
use crate::video::domain::video_reader::VideoReader;

/// A frame picked by the sampler. `order` runs 0..N-1 in temporal order.
#[derive(Clone, Debug)]
pub struct FrameSample {
    pub order: usize,
    pub frame: Frame,
}

/// Picks up to `count` evenly spaced frames from a video.
///
/// The plan depends only on the frame count and `count`, so the same
/// video sampled twice yields the same frames.
#[derive(Clone, Copy, Debug)]
pub struct FrameSampler {
    count: NonZeroUsize,
}

impl FrameSampler {
    pub fn new(count: NonZeroUsize) -> Self {
        Self { count }
    }

    /// Frame indices this sampler would read from a video of `total_frames`.
    pub fn plan(&self, total_frames: usize) -> Vec<usize> {
        sample_indices(total_frames, self.count.get())
    }

    /// Lazily decodes the planned frames from an already opened reader.
    ///
    /// Decoding stops as soon as the last planned frame has been produced.
    pub fn sample<'a>(
        &self,
        reader: &'a mut dyn VideoReader,
        metadata: &VideoMetadata,
    ) -> SampledFrames<'a> {
        SampledFrames {
            frames: reader.frames(),
            plan: self.plan(metadata.total_frames),
            cursor: 0,
            done: false,
        }
    }
}

/// Evenly spaced indices over `[0, total_frames - 1]`.
///
/// Positions are truncated toward zero and duplicates dropped, so a video
/// shorter than `count` yields every frame exactly once.
pub fn sample_indices(total_frames: usize, count: usize) -> Vec<usize> {
    if total_frames == 0 || count == 0 {
        return Vec::new();
    }
    if count == 1 {
        return vec![0];
    }
    if total_frames <= count {
        return (0..total_frames).collect();
    }

    // Exact integer form of the truncated linspace, so the last index is
    // always `total_frames - 1`.
    let last = total_frames - 1;
    let mut indices: Vec<usize> = (0..count).map(|i| i * last / (count - 1)).collect();
    indices.dedup();
    indices
}

/// Iterator over the sampled frames of one video.
pub struct SampledFrames<'a> {
    frames: Box<dyn Iterator<Item = Result<Frame, VideoError>> + 'a>,
    plan: Vec<usize>,
    cursor: usize,
    done: bool,
}

impl Iterator for SampledFrames<'_> {
    type Item = Result<FrameSample, VideoError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.cursor >= self.plan.len() {
            return None;
        }

        loop {
            let frame = match self.frames.next() {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                // Fewer decodable frames than the container reported.
                None => {
                    self.done = true;
                    return None;
                }
            };

            while self.cursor < self.plan.len() && self.plan[self.cursor] < frame.index() {
                self.cursor += 1;
            }
            if self.cursor >= self.plan.len() {
                self.done = true;
                return None;
            }
            if self.plan[self.cursor] == frame.index() {
                let sample = FrameSample {
                    order: self.cursor,
                    frame,
                };
                self.cursor += 1;
                return Some(Ok(sample));
            }
        }
    }
}
