use thiserror::Error;

use crate::shared::face_detection::FaceDetection;
use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("onnx runtime: {0}")]
    Runtime(String),
    #[error("unexpected detector output: {0}")]
    InvalidOutput(String),
    #[error("detector lock poisoned")]
    LockPoisoned,
}

impl DetectionError {
    pub fn runtime(e: impl std::fmt::Display) -> Self {
        DetectionError::Runtime(e.to_string())
    }
}

/// Domain interface for face localization.
///
/// Returns candidates in the detector's own order, which is not promised
/// to be sorted by confidence. Implementations are shared by every
/// in-flight request, so they take `&self` and serialize internally if
/// their runtime needs exclusive access.
pub trait FaceLocator: Send + Sync {
    fn locate(&self, frame: &Frame) -> Result<Vec<FaceDetection>, DetectionError>;
}
