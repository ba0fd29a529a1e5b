use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use uuid::Uuid;

use deepscan_core::classification::domain::score_aggregator::AggregateResult;

use crate::context::AppContext;
use crate::error::PredictError;
use crate::temp_resource::TempVideo;

/// The form fields of one `/predict` call, as received.
#[derive(Debug, Default)]
pub struct VideoSubmission {
    pub video: Option<Bytes>,
    pub frames_per_video: Option<String>,
}

/// Owns one request from upload to verdict.
///
/// Validates the submission, stages the upload as a [`TempVideo`], runs the
/// pipeline and hands back either the scores or a single [`PredictError`].
/// Blocking: call it from a worker thread.
pub struct RequestCoordinator {
    context: Arc<AppContext>,
}

impl RequestCoordinator {
    pub fn new(context: Arc<AppContext>) -> Self {
        Self { context }
    }

    pub fn handle(
        &self,
        request_id: Uuid,
        submission: VideoSubmission,
    ) -> Result<AggregateResult, PredictError> {
        let video = submission.video.ok_or_else(PredictError::missing_video)?;
        let frames = parse_frame_count(
            submission.frames_per_video.as_deref(),
            self.context.default_frames,
        )?;
        log::info!(
            "[{request_id}] accepted {} byte upload, sampling {frames} frames",
            video.len()
        );

        let started = Instant::now();
        let staged = TempVideo::create(&self.context.temp_dir, request_id, &video)
            .map_err(PredictError::Storage)?;
        drop(video);

        let result = self
            .context
            .use_case(request_id)
            .execute(staged.path(), frames);
        drop(staged);

        match &result {
            Ok(verdict) => log::info!(
                "[{request_id}] scored {} faces, mean {:.4} in {:.0}ms",
                verdict.pred_scores.len(),
                verdict.mean_score,
                started.elapsed().as_secs_f64() * 1000.0
            ),
            Err(e) => log::warn!("[{request_id}] {} failure: {e}", e.kind()),
        }
        result.map_err(PredictError::from)
    }
}

/// Reads the optional `frames_per_video` override.
///
/// Absent means `default`. Anything but a positive decimal integer is an
/// error.
pub fn parse_frame_count(
    raw: Option<&str>,
    default: NonZeroUsize,
) -> Result<NonZeroUsize, PredictError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    raw.trim()
        .parse::<NonZeroUsize>()
        .map_err(|_| PredictError::FrameCount(raw.to_string()))
}
