use image::{imageops, GrayImage, RgbImage};
use serde::{Deserialize, Serialize};

/// A decoded video frame and its position in decode order.
///
/// Pixels are always 8-bit RGB regardless of the source's native layout.
#[derive(Clone, Debug)]
pub struct Frame {
    index: u64,
    pixels: RgbImage,
}

impl Frame {
    pub fn new(index: u64, pixels: RgbImage) -> Self {
        Self { index, pixels }
    }

    /// Build a frame from a packed RGB24 buffer (`width * height * 3` bytes).
    pub fn from_rgb24(index: u64, width: u32, height: u32, buffer: Vec<u8>) -> Option<Self> {
        RgbImage::from_raw(width, height, buffer).map(|pixels| Self { index, pixels })
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    pub fn into_pixels(self) -> RgbImage {
        self.pixels
    }

    /// Single-channel luminance copy used for detection.
    pub fn luma(&self) -> GrayImage {
        imageops::grayscale(&self.pixels)
    }

    /// Copy out the region under `bbox`. The box must already be clamped to this frame.
    pub fn crop(&self, bbox: &BoundingBox) -> RgbImage {
        imageops::crop_imm(&self.pixels, bbox.x, bbox.y, bbox.width, bbox.height).to_image()
    }
}

/// Axis-aligned rectangle in pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Clamp raw detector output (which may be signed or overhang the frame)
    /// into a `frame_width x frame_height` frame. Returns `None` if nothing remains.
    pub fn clamped(
        x: i64,
        y: i64,
        width: i64,
        height: i64,
        frame_width: u32,
        frame_height: u32,
    ) -> Option<Self> {
        let fw = frame_width as i64;
        let fh = frame_height as i64;
        let x0 = x.clamp(0, fw);
        let y0 = y.clamp(0, fh);
        let x1 = x.saturating_add(width).clamp(0, fw);
        let y1 = y.saturating_add(height).clamp(0, fh);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Self {
            x: x0 as u32,
            y: y0 as u32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        })
    }

    /// Grow the box symmetrically by `scale_factor` (area grows by its square),
    /// saturating at the frame edges.
    ///
    /// `x' = max(0, x - w(s-1)/2)`, `w' = min(frame_w - x', w*s)`; same for y/h.
    /// Fractional results are floored.
    pub fn expanded(&self, scale_factor: f64, frame_width: u32, frame_height: u32) -> Self {
        let grow = (scale_factor - 1.0) / 2.0;
        let w = self.width as f64;
        let h = self.height as f64;

        let x = floor_px((self.x as f64 - w * grow).max(0.0));
        let y = floor_px((self.y as f64 - h * grow).max(0.0));
        let x = (x as u32).min(frame_width.saturating_sub(1));
        let y = (y as u32).min(frame_height.saturating_sub(1));

        let width = (floor_px(w * scale_factor) as u64).min((frame_width - x) as u64) as u32;
        let height = (floor_px(h * scale_factor) as u64).min((frame_height - y) as u64) as u32;

        Self {
            x,
            y,
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn fits_within(&self, frame_width: u32, frame_height: u32) -> bool {
        self.x as u64 + self.width as u64 <= frame_width as u64
            && self.y as u64 + self.height as u64 <= frame_height as u64
    }
}

// absorbs float noise like 89.999999999 so whole-pixel results stay whole
fn floor_px(v: f64) -> f64 {
    (v + 1e-9).floor()
}
