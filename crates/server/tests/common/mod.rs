//! Shared fixtures for the HTTP integration tests.
//!
//! The stub engines read the uploaded file as a toy "video": every byte is
//! one frame, and a non-zero byte means that frame shows one face. An upload
//! starting with `CORRUPT` cannot be opened. This keeps the tests free of
//! ffmpeg and model weights while exercising the real router, coordinator
//! and pipeline.
#![allow(dead_code)]

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{header, Method, Request, Response};
use axum::Router;
use ndarray::{Array4, Axis};
use serde_json::Value;
use tower::ServiceExt;

use deepscan_core::classification::domain::face_classifier::{ClassificationError, FaceClassifier};
use deepscan_core::classification::domain::face_preprocessor::FacePreprocessor;
use deepscan_core::detection::domain::face_locator::{DetectionError, FaceLocator};
use deepscan_core::detection::domain::face_selection::SelectionPolicy;
use deepscan_core::shared::face_detection::FaceDetection;
use deepscan_core::shared::frame::Frame;
use deepscan_core::shared::video_metadata::VideoMetadata;
use deepscan_core::video::domain::video_error::VideoError;
use deepscan_core::video::domain::video_reader::VideoReader;
use deepscan_server::build_router;
use deepscan_server::context::AppContext;

pub const BOUNDARY: &str = "deepscan-test-boundary";
const FRAME_SIZE: u32 = 16;

/// Files the stub reader opened, with the bytes it found, in order.
pub type OpenedFiles = Arc<Mutex<Vec<(PathBuf, Vec<u8>)>>>;

pub struct TestApp {
    pub router: Router,
    pub opened: OpenedFiles,
    pub temp_dir: tempfile::TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_limit(16 * 1024 * 1024)
    }

    pub fn with_limit(max_upload_bytes: usize) -> Self {
        let temp_dir = tempfile::tempdir().unwrap();
        let opened: OpenedFiles = Arc::new(Mutex::new(Vec::new()));

        let factory_opened = opened.clone();
        let context = AppContext {
            locator: Arc::new(ByteFaceLocator),
            classifier: Arc::new(BrightnessClassifier),
            reader_factory: Arc::new(move || {
                Box::new(ByteVideoReader::new(factory_opened.clone())) as Box<dyn VideoReader>
            }),
            preprocessor: FacePreprocessor::new(8),
            selection: SelectionPolicy::First,
            default_frames: NonZeroUsize::new(100).unwrap(),
            temp_dir: temp_dir.path().to_path_buf(),
        };

        Self {
            router: build_router(Arc::new(context), max_upload_bytes),
            opened,
            temp_dir,
        }
    }

    pub fn opened_paths(&self) -> Vec<PathBuf> {
        self.opened
            .lock()
            .unwrap()
            .iter()
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// Contents of each staged upload at the moment it was opened.
    pub fn opened_contents(&self) -> Vec<Vec<u8>> {
        self.opened
            .lock()
            .unwrap()
            .iter()
            .map(|(_, bytes)| bytes.clone())
            .collect()
    }

    /// Files left behind in the upload staging directory.
    pub fn staged_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.temp_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Stub engines
// ---------------------------------------------------------------------------

struct ByteVideoReader {
    bytes: Option<Vec<u8>>,
    opened: OpenedFiles,
}

impl ByteVideoReader {
    fn new(opened: OpenedFiles) -> Self {
        Self {
            bytes: None,
            opened,
        }
    }
}

impl VideoReader for ByteVideoReader {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, VideoError> {
        let bytes = std::fs::read(path).map_err(|e| VideoError::Open {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        self.opened
            .lock()
            .unwrap()
            .push((path.to_path_buf(), bytes.clone()));
        if bytes.starts_with(b"CORRUPT") {
            return Err(VideoError::Open {
                path: path.to_path_buf(),
                reason: "Invalid data found when processing input".into(),
            });
        }
        let metadata = VideoMetadata {
            width: FRAME_SIZE,
            height: FRAME_SIZE,
            fps: 30.0,
            total_frames: bytes.len(),
            codec: "bytes".into(),
            source_path: Some(path.to_path_buf()),
        };
        self.bytes = Some(bytes);
        Ok(metadata)
    }

    fn frames(&mut self) -> Box<dyn Iterator<Item = Result<Frame, VideoError>> + '_> {
        let Some(bytes) = self.bytes.as_ref() else {
            return Box::new(std::iter::once(Err(VideoError::NotOpened)));
        };
        Box::new(bytes.iter().enumerate().map(|(i, &value)| {
            let data = vec![value; (FRAME_SIZE * FRAME_SIZE * 3) as usize];
            Ok(Frame::new(data, FRAME_SIZE, FRAME_SIZE, 3, i))
        }))
    }

    fn close(&mut self) {
        self.bytes = None;
    }
}

/// One centred face on every frame whose pixels are non-zero.
struct ByteFaceLocator;

impl FaceLocator for ByteFaceLocator {
    fn locate(&self, frame: &Frame) -> Result<Vec<FaceDetection>, DetectionError> {
        if frame.data().first().copied().unwrap_or(0) == 0 {
            return Ok(Vec::new());
        }
        Ok(vec![FaceDetection {
            x: 4.0,
            y: 4.0,
            width: 8.0,
            height: 8.0,
            confidence: 0.9,
        }])
    }
}

/// Scores each face by the mean of its normalized pixels.
struct BrightnessClassifier;

impl FaceClassifier for BrightnessClassifier {
    fn classify(&self, batch: Array4<f32>) -> Result<Vec<f32>, ClassificationError> {
        Ok(batch
            .axis_iter(Axis(0))
            .map(|face| face.mean().unwrap_or(0.0))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub enum Part<'a> {
    File(&'a str, &'a [u8]),
    Text(&'a str, &'a str),
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::File(name, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"clip.mp4\"\r\n\
                         Content-Type: video/mp4\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}")
                        .as_bytes(),
                );
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn predict_request(parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/predict")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

pub async fn send(router: Router, request: Request<Body>) -> Response<Body> {
    router.oneshot(request).await.unwrap()
}

pub async fn predict(app: &TestApp, parts: &[Part<'_>]) -> Response<Body> {
    send(app.router.clone(), predict_request(parts)).await
}

pub async fn get(app: &TestApp, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app.router.clone(), request).await
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn scores(json: &Value) -> Vec<f64> {
    json["pred_scores"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_f64().unwrap())
        .collect()
}
