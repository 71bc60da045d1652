//! Grayscale frame buffer shared by every pipeline stage.

/// A single grayscale frame, one byte per pixel, rows packed top to bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        debug_assert_eq!(data.len(), (width * height) as usize);
        Self {
            data,
            width,
            height,
        }
    }

    /// Mean pixel value, 0.0 for an empty frame.
    pub fn mean_brightness(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        let sum: u64 = self.data.iter().map(|&p| u64::from(p)).sum();
        sum as f32 / self.data.len() as f32
    }

    /// Copy of the rectangle at `(x, y)` sized `w` by `h`, grown by `margin`
    /// pixels on every side and clamped to the frame bounds.
    pub fn crop_with_margin(&self, x: u32, y: u32, w: u32, h: u32, margin: u32) -> Frame {
        let x0 = x.saturating_sub(margin).min(self.width);
        let y0 = y.saturating_sub(margin).min(self.height);
        let x1 = x.saturating_add(w).saturating_add(margin).min(self.width);
        let y1 = y.saturating_add(h).saturating_add(margin).min(self.height);
        let out_w = x1.saturating_sub(x0);
        let out_h = y1.saturating_sub(y0);

        let mut data = Vec::with_capacity((out_w * out_h) as usize);
        for row in y0..y1 {
            let start = (row * self.width + x0) as usize;
            data.extend_from_slice(&self.data[start..start + out_w as usize]);
        }
        Frame::new(data, out_w, out_h)
    }
}
