use thiserror::Error;

use crate::classification::domain::face_classifier::ClassificationError;
use crate::detection::domain::face_locator::DetectionError;
use crate::video::domain::video_error::VideoError;

/// Failure kinds a prediction run can end in.
///
/// Every stage returns one of these unmodified; callers translate them into
/// their own surface (HTTP status, exit code) in a single place.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The video could not be opened or yielded no decodable frames.
    #[error("failed to decode video: {0}")]
    Decode(#[from] VideoError),

    /// No usable face material: no face in any sampled frame, or nothing to score.
    #[error("{0}")]
    Extraction(String),

    /// The detector or classifier failed.
    #[error("model inference failed: {0}")]
    Model(String),
}

impl PipelineError {
    pub fn no_faces() -> Self {
        PipelineError::Extraction("no face found in any sampled frame".to_string())
    }

    pub fn empty_scores() -> Self {
        PipelineError::Extraction("cannot aggregate an empty score vector".to_string())
    }

    /// Short stable label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Decode(_) => "decode",
            PipelineError::Extraction(_) => "extraction",
            PipelineError::Model(_) => "model",
        }
    }
}

impl From<DetectionError> for PipelineError {
    fn from(e: DetectionError) -> Self {
        PipelineError::Model(format!("face detection: {e}"))
    }
}

impl From<ClassificationError> for PipelineError {
    fn from(e: ClassificationError) -> Self {
        PipelineError::Model(format!("classification: {e}"))
    }
}
