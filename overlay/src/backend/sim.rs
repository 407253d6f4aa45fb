//! Simulation collaborators for the headless backend.
//!
//! A synthetic camera renders a bright fingertip blob on a dark field along
//! a scripted 16 s path that visits every zone: both buttons, the object
//! area, a dismissal hold, and a hardware tap.  The classifier finds the
//! blob again by thresholding, so the whole pipeline runs on real frames.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::bail;
use tracing::debug;

use crate::config::OverlayConfig;
use crate::input::InputEvent;
use crate::pipeline::inference::GestureClassifier;
use crate::pipeline::interpreter::{ClassifierOutput, GestureLabel, Landmark, LANDMARK_COUNT};
use crate::pipeline::upload::RecognitionUploader;
use crate::pipeline::yuv::{Plane, RawFrame, RgbImage};
use crate::render::{DrawOp, RenderSurface};

/// Length of one pass through the script.
pub const CYCLE_MS: u64 = 16_000;

const ROW_PADDING: usize = 32;
const BACKGROUND_Y: u8 = 16;
const BLOB_Y: u8 = 235;

// ── Script ─────────────────────────────────────────────────

/// Where the simulated hand is and what it is doing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandPose {
    /// Raw camera-normalized fingertip position.
    pub x: f32,
    pub y: f32,
    pub open_palm: bool,
}

/// Scripted hand path, expressed in display space and unmapped to camera
/// space so each leg lands on its zone.
#[derive(Debug, Clone)]
pub struct SimScript {
    legs: Vec<(u64, u64, Option<([f32; 2], bool)>)>,
    config: OverlayConfig,
}

impl SimScript {
    pub fn new(config: &OverlayConfig) -> Self {
        let mic = config.dwell.buttons.microphone_center;
        let sub = config.dwell.buttons.subtitle_center;
        let object = [0.5, 0.6];
        let rest = [0.45, 0.75];
        let legs = vec![
            (0, 1500, None),
            (1500, 3000, Some((mic, false))),
            (3000, 3600, Some((rest, false))),
            (3600, 5000, Some((mic, false))),
            (5000, 6600, Some((sub, false))),
            (6600, 7000, Some((rest, false))),
            (7000, 8500, Some((object, false))),
            (8500, 10000, Some((rest, false))),
            (10000, 11200, Some((rest, true))),
            (11200, 14000, None),
            (14000, 15200, Some((rest, true))),
            (15200, CYCLE_MS, None),
        ];
        Self {
            legs,
            config: config.clone(),
        }
    }

    /// Pose at `t_ms` on the overlay clock, `None` while no hand is shown.
    pub fn pose_at(&self, t_ms: u64) -> Option<HandPose> {
        let t = t_ms % CYCLE_MS;
        let (_, _, leg) = self.legs.iter().find(|(start, end, _)| t >= *start && t < *end)?;
        let ([dx, dy], open_palm) = (*leg)?;
        let (x, y) = self.config.smoother.mapping.unmap(dx, dy);
        Some(HandPose { x, y, open_palm })
    }

    /// Input events whose scripted time falls in `(from_ms, to_ms]`.
    pub fn input_between(&self, from_ms: u64, to_ms: u64) -> Vec<InputEvent> {
        const TAP_DOWN: u64 = 13_600;
        const TAP_UP: u64 = 13_680;
        let mut events = Vec::new();
        let first_cycle = from_ms / CYCLE_MS;
        let last_cycle = to_ms / CYCLE_MS;
        for cycle in first_cycle..=last_cycle {
            let base = cycle * CYCLE_MS;
            for (at, down) in [(base + TAP_DOWN, true), (base + TAP_UP, false)] {
                if at > from_ms && at <= to_ms {
                    let (x, y) = (320.0, 240.0);
                    events.push(if down {
                        InputEvent::TouchDown { x, y, time_ms: at }
                    } else {
                        InputEvent::TouchUp { x, y, time_ms: at }
                    });
                }
            }
        }
        events
    }
}

// ── Camera ─────────────────────────────────────────────────

/// Renders the script as YUV 4:2:0 frames with padded rows and
/// interleaved chroma.
pub struct SimCamera {
    script: SimScript,
    width: u32,
    height: u32,
}

impl SimCamera {
    pub fn new(script: SimScript, width: u32, height: u32) -> Self {
        Self {
            script,
            width: width.max(2),
            height: height.max(2),
        }
    }

    pub fn frame_at(&self, t_ms: u64) -> RawFrame {
        let (w, h) = (self.width as usize, self.height as usize);
        let y_stride = w + ROW_PADDING;
        let mut luma = vec![BACKGROUND_Y; y_stride * h];

        if let Some(pose) = self.script.pose_at(t_ms) {
            let radius = if pose.open_palm { 0.12 } else { 0.03 } * h as f32;
            let (cx, cy) = (pose.x * w as f32, pose.y * h as f32);
            let x0 = (cx - radius).floor().max(0.0) as usize;
            let x1 = ((cx + radius).ceil().max(0.0) as usize).min(w);
            let y0 = (cy - radius).floor().max(0.0) as usize;
            let y1 = ((cy + radius).ceil().max(0.0) as usize).min(h);
            for row in y0..y1 {
                for col in x0..x1 {
                    let (dx, dy) = (col as f32 + 0.5 - cx, row as f32 + 0.5 - cy);
                    if dx * dx + dy * dy <= radius * radius {
                        luma[row * y_stride + col] = BLOB_Y;
                    }
                }
            }
        }

        // Neutral chroma, UV interleaved like NV12.
        let c_stride = (w / 2) * 2 + ROW_PADDING;
        let chroma = vec![128u8; c_stride * h.div_ceil(2)];
        let v_data = chroma[1..].to_vec();
        RawFrame {
            width: self.width,
            height: self.height,
            y: Plane::packed(luma, y_stride),
            u: Plane {
                data: chroma,
                row_stride: c_stride,
                pixel_stride: 2,
            },
            v: Plane {
                data: v_data,
                row_stride: c_stride,
                pixel_stride: 2,
            },
            timestamp_ms: t_ms,
        }
    }
}

// ── Classifier ─────────────────────────────────────────────

/// Thresholds the image and reports the centroid of the bright pixels as
/// the fingertip.  A blob covering more than `palm_fraction` of the image
/// is an open palm.
#[derive(Debug, Clone)]
pub struct BlobClassifier {
    pub threshold: u8,
    pub palm_fraction: f32,
}

impl Default for BlobClassifier {
    fn default() -> Self {
        Self {
            threshold: 128,
            palm_fraction: 0.01,
        }
    }
}

impl GestureClassifier for BlobClassifier {
    fn classify(
        &mut self,
        image: &RgbImage,
        _timestamp_ms: u64,
    ) -> anyhow::Result<Option<ClassifierOutput>> {
        if image.is_empty() {
            bail!("empty image");
        }
        let (mut sum_x, mut sum_y, mut count) = (0u64, 0u64, 0u64);
        for y in 0..image.height {
            for x in 0..image.width {
                if image.pixel(x, y)[0] > self.threshold {
                    sum_x += x as u64;
                    sum_y += y as u64;
                    count += 1;
                }
            }
        }
        if count == 0 {
            return Ok(None);
        }

        let tip = Landmark {
            x: (sum_x as f32 / count as f32 + 0.5) / image.width as f32,
            y: (sum_y as f32 / count as f32 + 0.5) / image.height as f32,
            z: 0.0,
        };
        let area = count as f32 / (image.width as f32 * image.height as f32);
        let name = if area > self.palm_fraction {
            "Open_Palm"
        } else {
            "Pointing_Up"
        };
        Ok(Some(ClassifierOutput {
            landmarks: vec![tip; LANDMARK_COUNT],
            gestures: vec![GestureLabel {
                name: name.to_string(),
                score: 0.9,
            }],
        }))
    }
}

// ── Uploader ───────────────────────────────────────────────

/// Answers after a fixed delay.  Every `fail_every`-th call fails.
#[derive(Debug)]
pub struct MockUploader {
    pub delay: Duration,
    pub fail_every: Option<u64>,
    calls: AtomicU64,
}

impl MockUploader {
    pub fn new(delay: Duration, fail_every: Option<u64>) -> Self {
        Self {
            delay,
            fail_every,
            calls: AtomicU64::new(0),
        }
    }
}

impl RecognitionUploader for MockUploader {
    fn recognize(&self, image: &RgbImage) -> anyhow::Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        std::thread::sleep(self.delay);
        if self.fail_every.is_some_and(|n| n > 0 && call % n == 0) {
            bail!("recognition service unavailable");
        }
        let sum: u64 = image.data.iter().map(|&b| b as u64).sum();
        let mean = sum / (image.data.len() as u64).max(1);
        Ok(format!(
            "scene {}x{}, mean level {}",
            image.width, image.height, mean
        ))
    }
}

// ── Surface ────────────────────────────────────────────────

/// Counts draw calls instead of rasterizing them.
#[derive(Debug)]
pub struct CountingSurface {
    size: (u32, u32),
    pub ops: u64,
    pub text_ops: u64,
    pub frame_requests: u64,
}

impl CountingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            ops: 0,
            text_ops: 0,
            frame_requests: 0,
        }
    }
}

impl RenderSurface for CountingSurface {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn draw(&mut self, op: DrawOp) {
        self.ops += 1;
        if matches!(op, DrawOp::Text { .. }) {
            self.text_ops += 1;
        }
    }

    fn request_next_frame(&mut self) {
        self.frame_requests += 1;
        if self.frame_requests % 600 == 0 {
            debug!(
                "Surface: {} frames, {} ops ({} text)",
                self.frame_requests, self.ops, self.text_ops
            );
        }
    }
}
