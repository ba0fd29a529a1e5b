use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;

use deepscan_core::detection::domain::face_selection::SelectionPolicy;
use deepscan_core::detection::infrastructure::onnx_blazeface_locator::DEFAULT_CONFIDENCE;
use deepscan_core::shared::constants::{
    CLASSIFIER_MODEL_NAME, CLASSIFIER_MODEL_URL, DEFAULT_FACE_SIZE, DEFAULT_FRAMES_PER_VIDEO,
    DETECTOR_MODEL_NAME, DETECTOR_MODEL_URL,
};
use deepscan_core::shared::model_resolver::ModelSource;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("frames per video must be a positive integer, got {0}")]
    FramesPerVideo(usize),
    #[error("face size must be positive, got {0}")]
    FaceSize(u32),
    #[error("confidence must be between 0.0 and 1.0, got {0}")]
    Confidence(f64),
    #[error("maximum upload size must be positive")]
    MaxUpload,
}

/// Deepfake detection service for uploaded videos.
#[derive(Parser, Debug, Clone)]
#[command(name = "deepscan-server", version)]
pub struct ServerConfig {
    /// Address to bind.
    #[arg(long, env = "DEEPSCAN_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "DEEPSCAN_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Directory holding model weights. Falls back to the user cache, then downloads.
    #[arg(long, env = "DEEPSCAN_MODELS_DIR")]
    pub models_dir: Option<PathBuf>,

    /// Face detector weights file name.
    #[arg(long, env = "DEEPSCAN_DETECTOR_MODEL", default_value = DETECTOR_MODEL_NAME)]
    pub detector_model: String,

    #[arg(long, env = "DEEPSCAN_DETECTOR_URL", default_value = DETECTOR_MODEL_URL)]
    pub detector_url: String,

    /// Classifier weights file name.
    #[arg(long, env = "DEEPSCAN_CLASSIFIER_MODEL", default_value = CLASSIFIER_MODEL_NAME)]
    pub classifier_model: String,

    #[arg(long, env = "DEEPSCAN_CLASSIFIER_URL", default_value = CLASSIFIER_MODEL_URL)]
    pub classifier_url: String,

    /// Frames sampled per video unless the request overrides it.
    #[arg(long, env = "DEEPSCAN_FRAMES_PER_VIDEO", default_value_t = DEFAULT_FRAMES_PER_VIDEO)]
    pub frames_per_video: usize,

    /// Side of the square face crop fed to the classifier.
    #[arg(long, default_value_t = DEFAULT_FACE_SIZE)]
    pub face_size: u32,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long, default_value_t = DEFAULT_CONFIDENCE)]
    pub confidence: f64,

    /// Face kept per frame: first or highest-confidence.
    #[arg(long, default_value_t = SelectionPolicy::First)]
    pub selection: SelectionPolicy,

    /// Where uploads are staged while they are scored.
    #[arg(long, env = "DEEPSCAN_TEMP_DIR")]
    pub temp_dir: Option<PathBuf>,

    /// Largest accepted request body, in MiB.
    #[arg(long, default_value_t = 512)]
    pub max_upload_mb: usize,
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frames_per_video == 0 {
            return Err(ConfigError::FramesPerVideo(self.frames_per_video));
        }
        if self.face_size == 0 {
            return Err(ConfigError::FaceSize(self.face_size));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(ConfigError::Confidence(self.confidence));
        }
        if self.max_upload_mb == 0 {
            return Err(ConfigError::MaxUpload);
        }
        Ok(())
    }

    pub fn default_frames(&self) -> Result<NonZeroUsize, ConfigError> {
        NonZeroUsize::new(self.frames_per_video)
            .ok_or(ConfigError::FramesPerVideo(self.frames_per_video))
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }

    pub fn detector_source(&self) -> ModelSource {
        ModelSource::new(&self.detector_model, &self.detector_url)
    }

    pub fn classifier_source(&self) -> ModelSource {
        ModelSource::new(&self.classifier_model, &self.classifier_url)
    }
}
