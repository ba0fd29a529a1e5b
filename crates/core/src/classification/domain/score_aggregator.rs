use serde::Serialize;

use crate::shared::error::PipelineError;

/// Per-face probabilities and their mean, in sampled-frame order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AggregateResult {
    pub pred_scores: Vec<f64>,
    pub mean_score: f64,
}

/// Logistic function `1 / (1 + e^-x)`, stable for large `|x|`.
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Maps raw logits to probabilities and averages them.
///
/// The mean is taken over the transformed scores, so it always lies in
/// `[0, 1]`. A NaN or infinite logit is a model error.
pub fn aggregate(raw_scores: &[f32]) -> Result<AggregateResult, PipelineError> {
    if raw_scores.is_empty() {
        return Err(PipelineError::empty_scores());
    }
    if let Some(bad) = raw_scores.iter().find(|s| !s.is_finite()) {
        return Err(PipelineError::Model(format!(
            "classifier returned non-finite score {bad}"
        )));
    }

    let pred_scores: Vec<f64> = raw_scores.iter().map(|&s| sigmoid(s as f64)).collect();
    let mean_score = pred_scores.iter().sum::<f64>() / pred_scores.len() as f64;
    Ok(AggregateResult {
        pred_scores,
        mean_score,
    })
}
