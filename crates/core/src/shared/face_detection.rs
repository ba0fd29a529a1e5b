/// A candidate face: an axis-aligned box in frame pixel coordinates plus
/// the detector's confidence in `[0, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceDetection {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

/// Integer crop window, already clamped to the frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropWindow {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FaceDetection {
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn iou(&self, other: &FaceDetection) -> f32 {
        let ix1 = self.x.max(other.x);
        let iy1 = self.y.max(other.y);
        let ix2 = (self.x + self.width).min(other.x + other.width);
        let iy2 = (self.y + self.height).min(other.y + other.height);

        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        if inter == 0.0 {
            return 0.0;
        }
        inter / (self.area() + other.area() - inter)
    }

    /// Expands the box by `margin × height` and clamps it to the frame.
    ///
    /// The top edge grows by twice the offset so the crop keeps the forehead
    /// and hairline; the other three edges grow by one offset.
    pub fn margin_window(&self, margin: f32, frame_width: u32, frame_height: u32) -> CropWindow {
        let offset = (margin * self.height).round();
        let fw = frame_width as f32;
        let fh = frame_height as f32;

        let y1 = (self.y - 2.0 * offset).clamp(0.0, fh);
        let x1 = (self.x - offset).clamp(0.0, fw);
        let y2 = (self.y + self.height + offset).clamp(0.0, fh);
        let x2 = (self.x + self.width + offset).clamp(0.0, fw);

        let x = x1 as u32;
        let y = y1 as u32;
        CropWindow {
            x,
            y,
            width: (x2 as u32).saturating_sub(x),
            height: (y2 as u32).saturating_sub(y),
        }
    }
}
