use std::path::PathBuf;

/// Container-level facts about an opened video.
///
/// `total_frames` is the decodable frame count when the container reports
/// one, otherwise the count established by a demux pass.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub total_frames: usize,
    pub codec: String,
    pub source_path: Option<PathBuf>,
}

impl VideoMetadata {
    /// Approximate playback length in seconds, `None` when fps is unknown.
    pub fn duration_secs(&self) -> Option<f64> {
        (self.fps > 0.0).then(|| self.total_frames as f64 / self.fps)
    }
}
