use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array3;

use crate::shared::constants::{FACE_MARGIN, IMAGENET_MEAN, IMAGENET_STD};
use crate::shared::face_detection::FaceDetection;
use crate::shared::frame::Frame;

/// Turns a detected face into the `[3, S, S]` tensor the classifier expects.
///
/// Steps: margin crop around the detection, resize so the longest side is
/// `S` (bilinear, aspect preserved), centre on a black `S × S` canvas, then
/// per-channel `(x / 255 - mean) / std`. Pure: the output depends only on
/// the inputs and this configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct FacePreprocessor {
    face_size: u32,
    margin: f32,
    mean: [f32; 3],
    std: [f32; 3],
}

impl FacePreprocessor {
    pub fn new(face_size: u32) -> Self {
        Self {
            face_size,
            margin: FACE_MARGIN,
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
        }
    }

    pub fn with_margin(mut self, margin: f32) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_normalization(mut self, mean: [f32; 3], std: [f32; 3]) -> Self {
        self.mean = mean;
        self.std = std;
        self
    }

    /// Crops the detection plus margin out of the frame.
    pub fn crop(&self, frame: &Frame, face: &FaceDetection) -> Frame {
        let window = face.margin_window(self.margin, frame.width(), frame.height());
        frame.crop(window.x, window.y, window.width, window.height)
    }

    pub fn prepare_face(&self, frame: &Frame, face: &FaceDetection) -> Array3<f32> {
        self.prepare(&self.crop(frame, face))
    }

    /// Resizes, pads and normalizes an RGB face crop.
    pub fn prepare(&self, face: &Frame) -> Array3<f32> {
        let s = self.face_size as usize;
        let mut tensor = Array3::<f32>::zeros((3, s, s));
        for c in 0..3 {
            // Padding is black in pixel space, i.e. -mean/std once normalized.
            tensor
                .index_axis_mut(ndarray::Axis(0), c)
                .fill(self.normalize(0, c));
        }

        let Some(resized) = self.resize_longest_side(face) else {
            return tensor;
        };

        let (rw, rh) = resized.dimensions();
        let off_x = (self.face_size - rw) as usize / 2;
        let off_y = (self.face_size - rh) as usize / 2;
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                tensor[[c, off_y + y as usize, off_x + x as usize]] = self.normalize(pixel[c], c);
            }
        }
        tensor
    }

    fn resize_longest_side(&self, face: &Frame) -> Option<RgbImage> {
        let (w, h) = (face.width(), face.height());
        if w == 0 || h == 0 || face.channels() != 3 {
            return None;
        }
        let image = RgbImage::from_raw(w, h, face.data().to_vec())?;

        let scale = self.face_size as f64 / w.max(h) as f64;
        let new_w = ((w as f64 * scale).round() as u32).clamp(1, self.face_size);
        let new_h = ((h as f64 * scale).round() as u32).clamp(1, self.face_size);
        if (new_w, new_h) == (w, h) {
            return Some(image);
        }
        Some(imageops::resize(&image, new_w, new_h, FilterType::Triangle))
    }

    fn normalize(&self, value: u8, channel: usize) -> f32 {
        (value as f32 / 255.0 - self.mean[channel]) / self.std[channel]
    }
}
