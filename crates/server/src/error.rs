use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use deepscan_core::shared::error::PipelineError;

pub const MISSING_VIDEO: &str = "No video uploaded";

/// Everything a prediction request can fail with.
///
/// This is the only place errors become HTTP responses: upload problems
/// are 400 (413 for an oversized body), everything else is 500. The body is
/// always `{"error": <message>}`.
#[derive(Error, Debug)]
pub enum PredictError {
    #[error("{0}")]
    Validation(String),

    #[error("upload too large: {0}")]
    PayloadTooLarge(String),

    /// Reported as a server error, matching the service's established contract.
    #[error("invalid frames_per_video: {0}")]
    FrameCount(String),

    #[error("failed to store upload: {0}")]
    Storage(#[source] std::io::Error),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("{0}")]
    Internal(String),
}

impl PredictError {
    pub fn missing_video() -> Self {
        PredictError::Validation(MISSING_VIDEO.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            PredictError::Validation(_) => StatusCode::BAD_REQUEST,
            PredictError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            PredictError::FrameCount(_)
            | PredictError::Storage(_)
            | PredictError::Pipeline(_)
            | PredictError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for PredictError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        if status.is_server_error() {
            log::error!("prediction failed: {message}");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}
