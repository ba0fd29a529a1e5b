use ndarray::ArrayView3;

/// A decoded video frame: contiguous RGB bytes in row-major order.
///
/// `index` is the frame's position in the source video's decode order,
/// not its position in a sample.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Copies the pixels inside `[x, x+width) × [y, y+height)`, clamped to
    /// the frame, into a new frame carrying the same source index.
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> Frame {
        let x1 = x.min(self.width) as usize;
        let y1 = y.min(self.height) as usize;
        let x2 = x.saturating_add(width).min(self.width) as usize;
        let y2 = y.saturating_add(height).min(self.height) as usize;
        let channels = self.channels as usize;
        let row_bytes = self.width as usize * channels;

        let mut data = Vec::with_capacity((x2 - x1) * (y2 - y1) * channels);
        for row in y1..y2 {
            let start = row * row_bytes + x1 * channels;
            let end = row * row_bytes + x2 * channels;
            data.extend_from_slice(&self.data[start..end]);
        }

        Frame::new(
            data,
            (x2 - x1) as u32,
            (y2 - y1) as u32,
            self.channels,
            self.index,
        )
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}
