use std::sync::Arc;

use axum::extract::multipart::{Multipart, MultipartError, MultipartRejection};
use axum::extract::{DefaultBodyLimit, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use uuid::Uuid;

use deepscan_core::classification::domain::score_aggregator::AggregateResult;

use crate::context::AppContext;
use crate::coordinator::{RequestCoordinator, VideoSubmission};
use crate::error::PredictError;

/// The service router: `POST /predict` and `GET /health`, with CORS open to
/// any origin and every response labelled `application/json`.
pub fn build_router(context: Arc<AppContext>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(SetResponseHeaderLayer::overriding(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        ))
        .layer(CorsLayer::permissive())
        .with_state(context)
}

async fn predict(
    State(context): State<Arc<AppContext>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AggregateResult>, PredictError> {
    let request_id = Uuid::new_v4();
    let submission = match multipart {
        Ok(multipart) => read_submission(multipart).await?,
        // Not a multipart form at all, so there is no video field either.
        Err(rejection) => {
            log::debug!("[{request_id}] rejected body: {rejection}");
            return Err(PredictError::missing_video());
        }
    };

    let coordinator = RequestCoordinator::new(context);
    let verdict = tokio::task::spawn_blocking(move || coordinator.handle(request_id, submission))
        .await
        .map_err(|e| PredictError::Internal(format!("prediction worker failed: {e}")))??;
    Ok(Json(verdict))
}

async fn read_submission(mut multipart: Multipart) -> Result<VideoSubmission, PredictError> {
    let mut submission = VideoSubmission::default();
    while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "video" => {
                submission.video = Some(field.bytes().await.map_err(upload_error)?);
            }
            "frames_per_video" => {
                submission.frames_per_video = Some(field.text().await.map_err(upload_error)?);
            }
            _ => {}
        }
    }
    Ok(submission)
}

fn upload_error(e: MultipartError) -> PredictError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        PredictError::PayloadTooLarge(e.body_text())
    } else {
        PredictError::Validation(format!("malformed upload: {}", e.body_text()))
    }
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
