use std::path::Path;
use std::sync::Mutex;

use ndarray::Array4;

use crate::classification::domain::face_classifier::{ClassificationError, FaceClassifier};
use crate::shared::execution_provider::preferred_execution_providers;

/// EfficientNet-B4 manipulation classifier exported to ONNX.
///
/// Expects `[N, 3, S, S]` ImageNet-normalized faces and returns one logit
/// per face, either as `[N, 1]` or `[N]`.
pub struct OnnxFaceClassifier {
    session: Mutex<ort::session::Session>,
}

impl OnnxFaceClassifier {
    pub fn new(model_path: &Path) -> Result<Self, ClassificationError> {
        let session = ort::session::Session::builder()
            .map_err(ClassificationError::runtime)?
            .with_execution_providers(preferred_execution_providers())
            .map_err(ClassificationError::runtime)?
            .commit_from_file(model_path)
            .map_err(ClassificationError::runtime)?;
        log::info!("Loaded face classifier from {}", model_path.display());
        Ok(Self {
            session: Mutex::new(session),
        })
    }
}

impl FaceClassifier for OnnxFaceClassifier {
    fn classify(&self, batch: Array4<f32>) -> Result<Vec<f32>, ClassificationError> {
        let n = batch.shape()[0];
        if n == 0 {
            return Ok(Vec::new());
        }

        let input_value =
            ort::value::Tensor::from_array(batch).map_err(ClassificationError::runtime)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| ClassificationError::LockPoisoned)?;
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(ClassificationError::runtime)?;
        if outputs.len() == 0 {
            return Err(ClassificationError::InvalidOutput("no outputs".into()));
        }

        let logits = outputs[0]
            .try_extract_array::<f32>()
            .map_err(ClassificationError::runtime)?;
        let scores = flatten_logits(logits.shape(), logits.iter().copied(), n)?;
        Ok(scores)
    }
}

/// Accepts `[N]` or `[N, 1]` logits and returns them as a flat vector.
fn flatten_logits(
    shape: &[usize],
    values: impl Iterator<Item = f32>,
    batch: usize,
) -> Result<Vec<f32>, ClassificationError> {
    let per_face: usize = shape.iter().skip(1).product();
    if shape.first() != Some(&batch) || per_face != 1 {
        return Err(ClassificationError::InvalidOutput(format!(
            "expected {batch} logits, got shape {shape:?}"
        )));
    }
    Ok(values.collect())
}
