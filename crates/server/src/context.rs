use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use deepscan_core::classification::domain::face_classifier::{ClassificationError, FaceClassifier};
use deepscan_core::classification::domain::face_preprocessor::FacePreprocessor;
use deepscan_core::classification::infrastructure::onnx_face_classifier::OnnxFaceClassifier;
use deepscan_core::detection::domain::face_locator::{DetectionError, FaceLocator};
use deepscan_core::detection::domain::face_selection::SelectionPolicy;
use deepscan_core::detection::infrastructure::onnx_blazeface_locator::OnnxBlazefaceLocator;
use deepscan_core::pipeline::pipeline_logger::LogPipelineLogger;
use deepscan_core::pipeline::predict_video_use_case::PredictVideoUseCase;
use deepscan_core::shared::model_resolver::{self, ModelResolveError};
use deepscan_core::video::domain::video_reader::VideoReader;
use deepscan_core::video::infrastructure::ffmpeg_reader::FfmpegReader;

use crate::config::{ConfigError, ServerConfig};

/// Builds a fresh reader for each request.
pub type ReaderFactory = Arc<dyn Fn() -> Box<dyn VideoReader> + Send + Sync>;

#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("cannot resolve model: {0}")]
    Model(#[from] ModelResolveError),
    #[error("cannot load face detector: {0}")]
    Detector(#[from] DetectionError),
    #[error("cannot load face classifier: {0}")]
    Classifier(#[from] ClassificationError),
    #[error("cannot prepare temp directory {path}: {source}")]
    TempDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Process-wide state shared by every request.
///
/// Built once at startup. The models inside are only ever called through
/// `&self`, so handlers share this behind an `Arc` without further locking.
pub struct AppContext {
    pub locator: Arc<dyn FaceLocator>,
    pub classifier: Arc<dyn FaceClassifier>,
    pub reader_factory: ReaderFactory,
    pub preprocessor: FacePreprocessor,
    pub selection: SelectionPolicy,
    pub default_frames: NonZeroUsize,
    pub temp_dir: PathBuf,
}

impl AppContext {
    /// Resolves and loads both models and prepares the upload directory.
    ///
    /// Blocking: may download weights on first start.
    pub fn load(config: &ServerConfig) -> Result<Self, StartupError> {
        let models_dir = config.models_dir.as_deref();

        let detector_source = config.detector_source();
        log::info!("Resolving model: {}", detector_source.name);
        let detector_path = model_resolver::resolve(&detector_source, models_dir)?;
        let locator = OnnxBlazefaceLocator::new(&detector_path, config.confidence)?;

        let classifier_source = config.classifier_source();
        log::info!("Resolving model: {}", classifier_source.name);
        let classifier_path = model_resolver::resolve(&classifier_source, models_dir)?;
        let classifier = OnnxFaceClassifier::new(&classifier_path)?;

        let temp_dir = config.temp_dir();
        std::fs::create_dir_all(&temp_dir).map_err(|source| StartupError::TempDir {
            path: temp_dir.clone(),
            source,
        })?;

        Ok(Self {
            locator: Arc::new(locator),
            classifier: Arc::new(classifier),
            reader_factory: Arc::new(|| Box::new(FfmpegReader::new()) as Box<dyn VideoReader>),
            preprocessor: FacePreprocessor::new(config.face_size),
            selection: config.selection,
            default_frames: config.default_frames()?,
            temp_dir,
        })
    }

    /// A pipeline for one request, sharing this context's models.
    pub fn use_case(&self, request_id: Uuid) -> PredictVideoUseCase {
        PredictVideoUseCase::new(
            (self.reader_factory)(),
            Arc::clone(&self.locator),
            Arc::clone(&self.classifier),
            self.preprocessor.clone(),
            self.selection,
            Box::new(LogPipelineLogger::new(request_id.to_string())),
        )
    }
}
