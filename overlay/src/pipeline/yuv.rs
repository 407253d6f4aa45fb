//! Planar YUV → packed RGB conversion.
//!
//! Converts camera frames (YUV 4:2:0 with arbitrary row/pixel strides) to
//! packed RGB8 at two resolutions: a fixed downsample factor for gesture
//! inference and full resolution for recognition captures.  Every plane
//! access is clamped against the actual plane length, so a malformed frame
//! degrades to repeated boundary pixels instead of panicking.  Output
//! buffers are reused across frames of the same size.

use tracing::debug;

// ── Frame types ────────────────────────────────────────────

/// One image plane as delivered by the camera.
#[derive(Debug, Clone)]
pub struct Plane {
    /// Raw plane bytes, possibly padded at the end of each row.
    pub data: Vec<u8>,
    /// Bytes between the starts of consecutive rows.
    pub row_stride: usize,
    /// Bytes between consecutive samples in a row (2 for interleaved chroma).
    pub pixel_stride: usize,
}

impl Plane {
    /// Plane with tightly packed rows.
    pub fn packed(data: Vec<u8>, row_stride: usize) -> Self {
        Self {
            data,
            row_stride,
            pixel_stride: 1,
        }
    }

    /// Read the sample at (`col`, `row`), clamping the index into the plane.
    ///
    /// Returns `fallback` only when the plane is empty.
    #[inline]
    fn sample(&self, col: usize, row: usize, fallback: u8) -> u8 {
        if self.data.is_empty() {
            return fallback;
        }
        let idx = row
            .saturating_mul(self.row_stride)
            .saturating_add(col.saturating_mul(self.pixel_stride));
        self.data[idx.min(self.data.len() - 1)]
    }
}

/// A camera frame in YUV 4:2:0 layout.  Chroma planes are subsampled 2×2.
///
/// Never mutated after capture.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub y: Plane,
    pub u: Plane,
    pub v: Plane,
    /// Capture time in milliseconds on the overlay clock.
    pub timestamp_ms: u64,
}

/// Packed RGB8 image (3 bytes per pixel, no row padding).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RgbImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl RgbImage {
    /// RGB triple at (`x`, `y`).  Panics if out of range.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

// ── Colorspace ─────────────────────────────────────────────

/// Convert one BT.601 YUV sample to RGB, clamped to [0, 255].
#[inline]
pub fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;

    let r = (y + 1.370705 * v) as i32;
    let g = (y - 0.337633 * u - 0.698001 * v) as i32;
    let b = (y + 1.732446 * u) as i32;

    [
        r.clamp(0, 255) as u8,
        g.clamp(0, 255) as u8,
        b.clamp(0, 255) as u8,
    ]
}

// ── Converter ──────────────────────────────────────────────

/// Converter configuration.
#[derive(Debug, Clone)]
pub struct ConverterConfig {
    /// Integer downsample factor for the inference image (1 = full size).
    pub inference_downsample: u32,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            inference_downsample: 4,
        }
    }
}

/// Reusable YUV → RGB converter.
///
/// Holds one output buffer per resolution.  A buffer only grows when a
/// larger frame arrives; same-size frames never allocate.
#[derive(Debug, Default)]
pub struct YuvConverter {
    inference: RgbImage,
    full: RgbImage,
    allocations: u64,
}

impl YuvConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert `frame` at 1/`factor` resolution (nearest sample).
    pub fn convert(&mut self, frame: &RawFrame, factor: u32) -> &RgbImage {
        convert_into(frame, factor.max(1), &mut self.inference, &mut self.allocations);
        &self.inference
    }

    /// Convert `frame` at full resolution.
    pub fn convert_full(&mut self, frame: &RawFrame) -> &RgbImage {
        convert_into(frame, 1, &mut self.full, &mut self.allocations);
        &self.full
    }

    /// Number of buffer (re)allocations performed so far.
    pub fn allocation_count(&self) -> u64 {
        self.allocations
    }
}

fn convert_into(frame: &RawFrame, factor: u32, out: &mut RgbImage, allocations: &mut u64) {
    let out_w = frame.width / factor;
    let out_h = frame.height / factor;
    let len = out_w as usize * out_h as usize * 3;

    if out.data.capacity() < len {
        *allocations += 1;
        debug!(
            "Converter buffer grown to {}x{} ({} bytes)",
            out_w, out_h, len
        );
    }
    out.data.resize(len, 0);
    out.width = out_w;
    out.height = out_h;

    let step = factor as usize;
    let mut idx = 0;
    for oy in 0..out_h as usize {
        let row = oy * step;
        for ox in 0..out_w as usize {
            let col = ox * step;
            let y = frame.y.sample(col, row, 0);
            let u = frame.u.sample(col / 2, row / 2, 128);
            let v = frame.v.sample(col / 2, row / 2, 128);
            let [r, g, b] = yuv_to_rgb(y, u, v);
            out.data[idx] = r;
            out.data[idx + 1] = g;
            out.data[idx + 2] = b;
            idx += 3;
        }
    }
}

// ── Test helpers ───────────────────────────────────────────

/// Build a uniform frame with the given Y/U/V values and row padding.
#[cfg(test)]
pub fn uniform_frame(width: u32, height: u32, y: u8, u: u8, v: u8, padding: usize) -> RawFrame {
    let y_stride = width as usize + padding;
    let c_w = (width as usize).div_ceil(2);
    let c_h = (height as usize).div_ceil(2);
    let c_stride = c_w + padding;
    RawFrame {
        width,
        height,
        y: Plane::packed(vec![y; y_stride * height as usize], y_stride),
        u: Plane::packed(vec![u; c_stride * c_h], c_stride),
        v: Plane::packed(vec![v; c_stride * c_h], c_stride),
        timestamp_ms: 0,
    }
}

// ── Tests ──────────────────────────────────────────────────
