//! Pointer mapping and adaptive smoothing.
//!
//! Gesture samples arrive at roughly 15 Hz; the cursor is drawn at 60 Hz.
//! Each render tick moves the displayed position toward the latest target
//! with a blend factor chosen from the remaining distance: tiny moves are
//! damped hard, large moves are followed fully, and anything beyond the
//! snap threshold jumps in one step.

// ── Mapping ────────────────────────────────────────────────

/// Raw camera-normalized coordinate → display space.
#[derive(Debug, Clone, PartialEq)]
pub struct PointerMapping {
    /// Input sub-rectangle expanded to [0, 1] on both axes.
    pub remap_min: f32,
    pub remap_max: f32,
    /// Per-axis scale about the view center.
    pub scale: [f32; 2],
    /// Pixel offset applied after scaling.
    pub offset_px: [f32; 2],
}

impl Default for PointerMapping {
    fn default() -> Self {
        Self {
            remap_min: 0.15,
            remap_max: 0.85,
            scale: [1.6, 1.2],
            offset_px: [-20.0, -30.0],
        }
    }
}

impl PointerMapping {
    fn span(&self) -> f32 {
        (self.remap_max - self.remap_min).max(f32::EPSILON)
    }

    fn axis(&self, v: f32, scale: f32) -> f32 {
        let remapped = ((v - self.remap_min) / self.span()).clamp(0.0, 1.0);
        0.5 + (remapped - 0.5) * scale
    }

    /// Display-normalized position before clamping.
    pub fn map_unclamped(&self, x: f32, y: f32) -> (f32, f32) {
        (self.axis(x, self.scale[0]), self.axis(y, self.scale[1]))
    }

    /// Display-normalized position in [0, 1]².  Used for zone hit tests.
    pub fn map(&self, x: f32, y: f32) -> (f32, f32) {
        let (dx, dy) = self.map_unclamped(x, y);
        (dx.clamp(0.0, 1.0), dy.clamp(0.0, 1.0))
    }

    /// Inverse of `map` for positions inside the view.
    pub fn unmap(&self, dx: f32, dy: f32) -> (f32, f32) {
        let inv = |d: f32, scale: f32| {
            let remapped = 0.5 + (d - 0.5) / scale.max(f32::EPSILON);
            self.remap_min + remapped * self.span()
        };
        (inv(dx, self.scale[0]), inv(dy, self.scale[1]))
    }

    /// Display-normalized → pixel target in a `width`×`height` viewport.
    pub fn to_pixels(&self, display: (f32, f32), width: f32, height: f32) -> (f32, f32) {
        (
            display.0 * width + self.offset_px[0],
            display.1 * height + self.offset_px[1],
        )
    }
}

// ── SmootherConfig ─────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SmootherConfig {
    pub mapping: PointerMapping,
    /// Distance beyond which the cursor jumps straight to the target.
    pub fast_snap_px: f32,
    /// Below this distance the minimum blend applies.
    pub jitter_px: f32,
    /// Above this distance the maximum blend applies.
    pub move_px: f32,
    pub min_blend: f32,
    pub max_blend: f32,
    /// Horizontal stereo offset for the left and right eye.
    pub eye_offset_px: [f32; 2],
    /// Cursor keeps at least this far from the viewport edges.
    pub margin_px: f32,
}

impl Default for SmootherConfig {
    fn default() -> Self {
        Self {
            mapping: PointerMapping::default(),
            fast_snap_px: 180.0,
            jitter_px: 2.0,
            move_px: 40.0,
            min_blend: 0.2,
            max_blend: 1.0,
            eye_offset_px: [6.0, -6.0],
            margin_px: 30.0,
        }
    }
}

impl SmootherConfig {
    /// Blend factor for a given distance to target.
    pub fn blend_factor(&self, distance: f32) -> f32 {
        if distance < self.jitter_px {
            self.min_blend
        } else if distance > self.move_px {
            self.max_blend
        } else {
            let t = (distance - self.jitter_px) / (self.move_px - self.jitter_px).max(f32::EPSILON);
            self.min_blend + (self.max_blend - self.min_blend) * t
        }
    }

    /// Pixel target for one eye: mapped position plus that eye's stereo
    /// offset, kept inside the margin.  The drawn cursor converges here.
    pub fn eye_target(
        &self,
        display: (f32, f32),
        eye: usize,
        width: f32,
        height: f32,
    ) -> (f32, f32) {
        let base = self.mapping.to_pixels(display, width, height);
        let offset = self.eye_offset_px.get(eye).copied().unwrap_or(0.0);
        let m = self.margin_px;
        (
            clamp_axis(base.0 + offset, m, width - m),
            clamp_axis(base.1, m, height - m),
        )
    }
}

/// Clamp to [lo, hi], falling back to the midpoint when the range is empty.
fn clamp_axis(v: f32, lo: f32, hi: f32) -> f32 {
    if hi < lo {
        (lo + hi) * 0.5
    } else {
        v.clamp(lo, hi)
    }
}

// ── Smoothers ──────────────────────────────────────────────

/// One eye's displayed cursor position.
#[derive(Debug, Clone, Default)]
pub struct PointerSmoother {
    position: Option<(f32, f32)>,
}

impl PointerSmoother {
    /// Advance one render tick toward `target` (pixels) and return the new position.
    pub fn tick(
        &mut self,
        config: &SmootherConfig,
        target: (f32, f32),
        width: f32,
        height: f32,
    ) -> (f32, f32) {
        let next = match self.position {
            None => target,
            Some((x, y)) => {
                let (dx, dy) = (target.0 - x, target.1 - y);
                let distance = (dx * dx + dy * dy).sqrt();
                if distance > config.fast_snap_px {
                    target
                } else {
                    let k = config.blend_factor(distance);
                    (x + dx * k, y + dy * k)
                }
            }
        };
        let m = config.margin_px;
        let clamped = (
            clamp_axis(next.0, m, width - m),
            clamp_axis(next.1, m, height - m),
        );
        self.position = Some(clamped);
        clamped
    }

    pub fn position(&self) -> Option<(f32, f32)> {
        self.position
    }

    /// Forget the position; the next tick snaps.
    pub fn reset(&mut self) {
        self.position = None;
    }
}

/// Left and right eye smoothers fed from the same target.
#[derive(Debug, Clone, Default)]
pub struct StereoSmoother {
    pub config: SmootherConfig,
    eyes: [PointerSmoother; 2],
}

impl StereoSmoother {
    pub fn new(config: SmootherConfig) -> Self {
        Self {
            config,
            eyes: Default::default(),
        }
    }

    /// Advance both eyes toward a display-normalized target in a
    /// `width`×`height` eye viewport.  Returns eye-local pixel positions.
    pub fn tick(&mut self, display: (f32, f32), width: f32, height: f32) -> [(f32, f32); 2] {
        let config = &self.config;
        let mut out = [(0.0, 0.0); 2];
        for (i, eye) in self.eyes.iter_mut().enumerate() {
            let target = config.eye_target(display, i, width, height);
            out[i] = eye.tick(config, target, width, height);
        }
        out
    }

    pub fn position(&self, eye: usize) -> Option<(f32, f32)> {
        self.eyes.get(eye).and_then(|e| e.position())
    }

    pub fn reset(&mut self) {
        for eye in &mut self.eyes {
            eye.reset();
        }
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const W: f32 = 1000.0;
    const H: f32 = 800.0;

    fn primed(at: (f32, f32)) -> (PointerSmoother, SmootherConfig) {
        let cfg = SmootherConfig::default();
        let mut s = PointerSmoother::default();
        s.tick(&cfg, at, W, H);
        (s, cfg)
    }

    #[test]
    fn test_first_tick_snaps() {
        let (s, _) = primed((400.0, 300.0));
        assert_eq!(s.position(), Some((400.0, 300.0)));
    }

    #[test]
    fn test_far_target_snaps() {
        let (mut s, cfg) = primed((200.0, 300.0));
        let p = s.tick(&cfg, (500.0, 300.0), W, H);
        assert_eq!(p, (500.0, 300.0));
    }

    #[test]
    fn test_jitter_heavily_damped() {
        let (mut s, cfg) = primed((500.0, 400.0));
        for _ in 0..10 {
            let (x, _) = s.position().unwrap();
            let target = (x + 1.0, 400.0);
            let (nx, _) = s.tick(&cfg, target, W, H);
            let covered = (nx - x) / 1.0;
            assert!(covered <= 0.2 + 1e-4, "covered {}", covered);
            assert!(covered > 0.0);
        }
    }

    #[test]
    fn test_large_move_followed_fully() {
        let (mut s, cfg) = primed((400.0, 400.0));
        let target = (500.0, 400.0);
        let mut p = (0.0, 0.0);
        for _ in 0..3 {
            p = s.tick(&cfg, target, W, H);
        }
        assert!((p.0 - target.0).abs() <= 5.0);
    }

    #[test]
    fn test_blend_interpolates() {
        let cfg = SmootherConfig::default();
        assert_eq!(cfg.blend_factor(1.0), 0.2);
        assert_eq!(cfg.blend_factor(100.0), 1.0);
        assert!((cfg.blend_factor(21.0) - 0.6).abs() < 1e-6);
        assert!(cfg.blend_factor(10.0) < cfg.blend_factor(30.0));
    }

    #[test]
    fn test_clamped_to_margin() {
        let (mut s, cfg) = primed((500.0, 400.0));
        let p = s.tick(&cfg, (-400.0, 2000.0), W, H);
        assert_eq!(p, (30.0, H - 30.0));
    }

    #[test]
    fn test_tiny_viewport_does_not_panic() {
        let cfg = SmootherConfig::default();
        let mut s = PointerSmoother::default();
        let p = s.tick(&cfg, (10.0, 10.0), 20.0, 0.0);
        assert_eq!(p, (10.0, 0.0));
    }

    #[test]
    fn test_mapping_expands_center() {
        let m = PointerMapping::default();
        let (cx, cy) = m.map(0.5, 0.5);
        assert!((cx - 0.5).abs() < 1e-5 && (cy - 0.5).abs() < 1e-5);
        assert_eq!(m.map(0.1, 0.95), (0.0, 1.0));
        // x at the remap edge lands beyond the view once scaled.
        let (ux, _) = m.map_unclamped(0.85, 0.5);
        assert!((ux - 1.3).abs() < 1e-5);
    }

    #[test]
    fn test_unmap_inverts_map() {
        let m = PointerMapping::default();
        for &(dx, dy) in &[(0.12, 0.25), (0.88, 0.25), (0.5, 0.6)] {
            let (rx, ry) = m.unmap(dx, dy);
            let (mx, my) = m.map(rx, ry);
            assert!((mx - dx).abs() < 1e-5 && (my - dy).abs() < 1e-5);
        }
    }

    #[test]
    fn test_stereo_offsets() {
        let mut s = StereoSmoother::default();
        let [l, r] = s.tick((0.5, 0.5), W, H);
        assert_eq!(l, (500.0 - 20.0 + 6.0, 400.0 - 30.0));
        assert_eq!(r, (500.0 - 20.0 - 6.0, 400.0 - 30.0));
        s.reset();
        assert!(s.position(0).is_none());
    }

    #[test]
    fn test_eye_target_is_where_cursor_settles() {
        let mut s = StereoSmoother::default();
        for &display in &[(0.5, 0.5), (0.02, 0.01), (0.88, 0.25)] {
            s.reset();
            let [l, r] = s.tick(display, W, H);
            assert_eq!(l, s.config.eye_target(display, 0, W, H));
            assert_eq!(r, s.config.eye_target(display, 1, W, H));
        }
        assert_eq!(s.config.eye_target((0.0, 0.0), 0, W, H), (30.0, 30.0));
    }
}
