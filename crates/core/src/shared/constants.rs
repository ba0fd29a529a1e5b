pub const DETECTOR_MODEL_NAME: &str = "blazeface.onnx";
pub const DETECTOR_MODEL_URL: &str =
    "https://github.com/deepscan-dev/deepscan/releases/download/v0.1.0/blazeface.onnx";

pub const CLASSIFIER_MODEL_NAME: &str = "efficientnet_autoatt_b4_dfdc.onnx";
pub const CLASSIFIER_MODEL_URL: &str =
    "https://github.com/deepscan-dev/deepscan/releases/download/v0.1.0/efficientnet_autoatt_b4_dfdc.onnx";

/// Frames sampled per video when the caller does not override it.
pub const DEFAULT_FRAMES_PER_VIDEO: usize = 100;

/// Side length of the square face crop fed to the classifier.
pub const DEFAULT_FACE_SIZE: u32 = 224;

/// Fraction of the face height added around each detection before cropping.
pub const FACE_MARGIN: f32 = 0.2;

/// Per-channel RGB normalization expected by the EfficientNet classifier.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];
