use ndarray::Array4;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassificationError {
    #[error("onnx runtime: {0}")]
    Runtime(String),
    #[error("unexpected classifier output: {0}")]
    InvalidOutput(String),
    #[error("classifier lock poisoned")]
    LockPoisoned,
}

impl ClassificationError {
    pub fn runtime(e: impl std::fmt::Display) -> Self {
        ClassificationError::Runtime(e.to_string())
    }
}

/// Scores a batch of prepared faces for manipulation.
///
/// `batch` is `[N, 3, S, S]`; the result holds one raw logit per face in
/// batch order. Implementations run in inference mode only, so identical
/// batches always score identically.
pub trait FaceClassifier: Send + Sync {
    fn classify(&self, batch: Array4<f32>) -> Result<Vec<f32>, ClassificationError>;
}
