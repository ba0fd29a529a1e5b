use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_error::VideoError;

/// Reads frames from a video source.
///
/// Implementations handle I/O details (codec, container format, etc.)
/// while the pipeline works with the abstract `Frame` and `VideoMetadata`
/// types.
pub trait VideoReader: Send {
    /// Opens a video file and returns its metadata.
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, VideoError>;

    /// Returns an iterator over frames in decode order, indexed from 0.
    fn frames(&mut self) -> Box<dyn Iterator<Item = Result<Frame, VideoError>> + '_>;

    /// Releases any resources held by the reader.
    fn close(&mut self);
}
