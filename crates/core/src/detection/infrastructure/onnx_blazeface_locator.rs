/// BlazeFace face locator using ONNX Runtime via `ort`.
///
/// Front-camera (128×128) BlazeFace: bounding boxes plus confidence, no
/// landmarks or tracking.
use std::path::Path;
use std::sync::Mutex;

use crate::detection::domain::face_locator::{DetectionError, FaceLocator};
use crate::shared::execution_provider::preferred_execution_providers;
use crate::shared::face_detection::FaceDetection;
use crate::shared::frame::Frame;

/// BlazeFace model input resolution.
const INPUT_SIZE: u32 = 128;

/// Default minimum confidence for a candidate to be kept.
pub const DEFAULT_CONFIDENCE: f64 = 0.75;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.3;

/// Number of BlazeFace anchors (front model).
const NUM_ANCHORS: usize = 896;

/// Raw logits are clipped to this magnitude before the sigmoid.
const SCORE_CLIP: f32 = 100.0;

/// BlazeFace locator backed by a single ONNX Runtime session.
///
/// The session is shared by all requests; each call holds the lock for one
/// forward pass.
pub struct OnnxBlazefaceLocator {
    session: Mutex<ort::session::Session>,
    confidence: f64,
    anchors: Vec<[f32; 2]>,
}

impl OnnxBlazefaceLocator {
    /// Load a BlazeFace ONNX model.
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, DetectionError> {
        let session = ort::session::Session::builder()
            .map_err(DetectionError::runtime)?
            .with_execution_providers(preferred_execution_providers())
            .map_err(DetectionError::runtime)?
            .commit_from_file(model_path)
            .map_err(DetectionError::runtime)?;
        log::info!("Loaded face detector from {}", model_path.display());
        Ok(Self {
            session: Mutex::new(session),
            confidence,
            anchors: generate_anchors(),
        })
    }
}

impl FaceLocator for OnnxBlazefaceLocator {
    fn locate(&self, frame: &Frame) -> Result<Vec<FaceDetection>, DetectionError> {
        let fw = frame.width();
        let fh = frame.height();
        if fw == 0 || fh == 0 {
            return Ok(Vec::new());
        }

        let input_tensor = preprocess(frame, INPUT_SIZE);
        let input_value =
            ort::value::Tensor::from_array(input_tensor).map_err(DetectionError::runtime)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| DetectionError::LockPoisoned)?;
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(DetectionError::runtime)?;

        // regressors: [1, 896, 16] (box deltas + keypoints)
        // classificators: [1, 896, 1] (confidence logits)
        if outputs.len() < 2 {
            return Err(DetectionError::InvalidOutput(format!(
                "expected 2 outputs, got {}",
                outputs.len()
            )));
        }

        let regressors = outputs[0]
            .try_extract_array::<f32>()
            .map_err(DetectionError::runtime)?;
        let scores = outputs[1]
            .try_extract_array::<f32>()
            .map_err(DetectionError::runtime)?;
        let reg_data = regressors
            .as_slice()
            .ok_or_else(|| DetectionError::InvalidOutput("non-contiguous regressors".into()))?;
        let score_data = scores
            .as_slice()
            .ok_or_else(|| DetectionError::InvalidOutput("non-contiguous scores".into()))?;

        let mut raw_dets = decode_boxes(
            reg_data,
            score_data,
            &self.anchors,
            self.confidence as f32,
            fw,
            fh,
        );
        drop(outputs);
        drop(session);

        let kept = nms(&mut raw_dets, NMS_IOU_THRESH);
        Ok(kept
            .into_iter()
            .map(|d| FaceDetection {
                x: d.x1,
                y: d.y1,
                width: d.x2 - d.x1,
                height: d.y2 - d.y1,
                confidence: d.score,
            })
            .filter(|d| d.width > 0.0 && d.height > 0.0)
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Resize frame to `size × size` and normalize to [-1,1] NCHW float32.
fn preprocess(frame: &Frame, size: u32) -> ndarray::Array4<f32> {
    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let s = size as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, s, s));

    for y in 0..s {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / s as f64) as usize).min(src_h - 1);
        for x in 0..s {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / s as f64) as usize).min(src_w - 1);
            for c in 0..3 {
                tensor[[0, c, y, x]] = src[[src_y, src_x, c]] as f32 / 127.5 - 1.0;
            }
        }
    }

    tensor
}

// ---------------------------------------------------------------------------
// Anchor generation and box decoding
// ---------------------------------------------------------------------------

/// The front model uses two feature maps, 16×16 and 8×8, with 2 and 6
/// anchors per cell respectively.
fn generate_anchors() -> Vec<[f32; 2]> {
    let strides = [(8, 2), (16, 6)]; // (stride, anchors_per_cell)
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);

    for &(stride, num) in &strides {
        let grid_size = INPUT_SIZE as usize / stride;
        for y in 0..grid_size {
            for x in 0..grid_size {
                let cx = (x as f32 + 0.5) / grid_size as f32;
                let cy = (y as f32 + 0.5) / grid_size as f32;
                for _ in 0..num {
                    anchors.push([cx, cy]);
                }
            }
        }
    }

    anchors
}

#[derive(Clone, Debug)]
struct RawDet {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    score: f32,
}

/// Turns anchor-relative regressions into frame-space boxes above `min_score`.
fn decode_boxes(
    reg_data: &[f32],
    score_data: &[f32],
    anchors: &[[f32; 2]],
    min_score: f32,
    fw: u32,
    fh: u32,
) -> Vec<RawDet> {
    let mut dets = Vec::new();
    let num_anchors = anchors.len().min(NUM_ANCHORS);
    let scale = INPUT_SIZE as f32;

    for (i, &raw_score) in score_data.iter().enumerate().take(num_anchors) {
        let score = sigmoid(raw_score.clamp(-SCORE_CLIP, SCORE_CLIP));
        if score < min_score {
            continue;
        }

        let reg_offset = i * 16;
        if reg_offset + 4 > reg_data.len() {
            break;
        }

        let anchor = &anchors[i];
        let cx = anchor[0] + reg_data[reg_offset] / scale;
        let cy = anchor[1] + reg_data[reg_offset + 1] / scale;
        let w = reg_data[reg_offset + 2] / scale;
        let h = reg_data[reg_offset + 3] / scale;

        dets.push(RawDet {
            x1: ((cx - w / 2.0) * fw as f32).max(0.0),
            y1: ((cy - h / 2.0) * fh as f32).max(0.0),
            x2: ((cx + w / 2.0) * fw as f32).min(fw as f32),
            y2: ((cy + h / 2.0) * fh as f32).min(fh as f32),
            score,
        });
    }

    dets
}

// ---------------------------------------------------------------------------
// NMS
// ---------------------------------------------------------------------------

fn nms(dets: &mut [RawDet], iou_thresh: f64) -> Vec<RawDet> {
    dets.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; dets.len()];

    for i in 0..dets.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(dets[i].clone());
        for j in (i + 1)..dets.len() {
            if !suppressed[j] && bbox_iou(&dets[i], &dets[j]) > iou_thresh {
                suppressed[j] = true;
            }
        }
    }
    keep
}

fn bbox_iou(a: &RawDet, b: &RawDet) -> f64 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let inter = ((x2 - x1).max(0.0) * (y2 - y1).max(0.0)) as f64;
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = ((a.x2 - a.x1) * (a.y2 - a.y1)) as f64;
    let area_b = ((b.x2 - b.x1) * (b.y2 - b.y1)) as f64;
    inter / (area_a + area_b - inter)
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
