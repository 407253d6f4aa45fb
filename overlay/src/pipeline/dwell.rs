//! Dwell zones: hover-and-hold in place of a click.
//!
//! Three zones are tracked in left-eye viewport pixels: the
//! object-recognition area (the whole view except the buttons) and the
//! microphone and subtitle buttons.  A zone accumulates hover progress
//! while the pointer stays inside it and holds still; reaching full
//! progress emits a trigger when the zone's cooldown has passed and the
//! session currently arms it.
//!
//! Timers are plain start timestamps.  Resetting a zone clears the
//! timestamp; there is nothing to cancel.

use tracing::{debug, info};

use super::interpreter::PointerSample;

// ── Zones ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZoneKind {
    ObjectRecognition,
    Microphone,
    Subtitle,
}

impl ZoneKind {
    pub const ALL: [ZoneKind; 3] = [Self::ObjectRecognition, Self::Microphone, Self::Subtitle];

    fn index(&self) -> usize {
        *self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ObjectRecognition => "object",
            Self::Microphone => "microphone",
            Self::Subtitle => "subtitle",
        }
    }

    pub fn is_button(&self) -> bool {
        !matches!(self, Self::ObjectRecognition)
    }
}

/// Geometric bounds in eye-viewport pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZoneBounds {
    Rect { x0: f32, y0: f32, x1: f32, y1: f32 },
    Circle { cx: f32, cy: f32, r: f32 },
}

impl ZoneBounds {
    pub fn contains(&self, x: f32, y: f32) -> bool {
        match *self {
            Self::Rect { x0, y0, x1, y1 } => x >= x0 && x <= x1 && y >= y0 && y <= y1,
            Self::Circle { cx, cy, r } => {
                let (dx, dy) = (x - cx, y - cy);
                dx * dx + dy * dy <= r * r
            }
        }
    }
}

/// How the session currently treats a zone's trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZoneGate {
    /// Progress accumulates and triggers fire.
    #[default]
    Armed,
    /// Progress accumulates for display but never triggers.
    Blocked,
    /// Progress is held at zero.
    Suspended,
}

/// Per-zone gates, produced by the session machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ZoneGates {
    pub object: ZoneGate,
    pub microphone: ZoneGate,
    pub subtitle: ZoneGate,
}

impl ZoneGates {
    pub fn all(gate: ZoneGate) -> Self {
        Self {
            object: gate,
            microphone: gate,
            subtitle: gate,
        }
    }

    pub fn get(&self, kind: ZoneKind) -> ZoneGate {
        match kind {
            ZoneKind::ObjectRecognition => self.object,
            ZoneKind::Microphone => self.microphone,
            ZoneKind::Subtitle => self.subtitle,
        }
    }
}

// ── Buttons ────────────────────────────────────────────────

/// Button placement, shared by the hit test and the compositor.
///
/// Centers are fractions of the eye viewport; radii are eye pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct ButtonLayout {
    pub microphone_center: [f32; 2],
    pub subtitle_center: [f32; 2],
    /// Drawn radius.
    pub radius_px: f32,
    /// Extra hit distance beyond the drawn radius (cursor ring plus tolerance).
    pub hit_slop_px: f32,
}

impl Default for ButtonLayout {
    fn default() -> Self {
        Self {
            microphone_center: [0.12, 0.25],
            subtitle_center: [0.88, 0.25],
            radius_px: 40.0,
            hit_slop_px: 45.0,
        }
    }
}

impl ButtonLayout {
    /// Center of a button in a `view` = (width, height) eye viewport.
    /// `None` for the object zone.
    pub fn center_px(&self, kind: ZoneKind, view: (f32, f32)) -> Option<(f32, f32)> {
        let c = match kind {
            ZoneKind::ObjectRecognition => return None,
            ZoneKind::Microphone => self.microphone_center,
            ZoneKind::Subtitle => self.subtitle_center,
        };
        Some((c[0] * view.0, c[1] * view.1))
    }

    pub fn hit_radius_px(&self) -> f32 {
        self.radius_px + self.hit_slop_px
    }
}

// ── DwellConfig ────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DwellConfig {
    /// Hover time required for a trigger.
    pub dwell_ms: u64,
    /// Sample-to-sample displacement (raw normalized units) that restarts the timer.
    pub jitter_threshold: f32,
    /// Minimum time between two triggers of the same zone.
    pub zone_cooldown_ms: u64,
    pub buttons: ButtonLayout,
}

impl Default for DwellConfig {
    fn default() -> Self {
        Self {
            dwell_ms: 1000,
            jitter_threshold: 0.05,
            zone_cooldown_ms: 2000,
            buttons: ButtonLayout::default(),
        }
    }
}

impl DwellConfig {
    /// Zone geometry in eye pixels.
    pub fn bounds(&self, kind: ZoneKind, view: (f32, f32)) -> ZoneBounds {
        match self.buttons.center_px(kind, view) {
            None => ZoneBounds::Rect {
                x0: 0.0,
                y0: 0.0,
                x1: view.0,
                y1: view.1,
            },
            Some((cx, cy)) => ZoneBounds::Circle {
                cx,
                cy,
                r: self.buttons.hit_radius_px(),
            },
        }
    }

    /// Zone membership of an eye-pixel cursor.  The object area yields to
    /// the buttons.
    pub fn contains(&self, kind: ZoneKind, cursor: (f32, f32), view: (f32, f32)) -> bool {
        let (x, y) = cursor;
        match kind {
            ZoneKind::ObjectRecognition => {
                self.bounds(kind, view).contains(x, y)
                    && !self.bounds(ZoneKind::Microphone, view).contains(x, y)
                    && !self.bounds(ZoneKind::Subtitle, view).contains(x, y)
            }
            _ => self.bounds(kind, view).contains(x, y),
        }
    }
}

// ── Hover state ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ZoneHoverState {
    pub hover_start_ms: Option<u64>,
    /// Fraction of the dwell elapsed, in [0, 1].
    pub progress: f32,
    pub cooldown_until_ms: u64,
    /// Pointer was inside the zone on the latest sample.
    pub inside: bool,
}

impl ZoneHoverState {
    fn reset(&mut self) {
        self.hover_start_ms = None;
        self.progress = 0.0;
        self.inside = false;
    }
}

/// Emitted when a zone completes its dwell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneTrigger {
    pub zone: ZoneKind,
    pub timestamp_ms: u64,
}

// ── Tracker ────────────────────────────────────────────────

#[derive(Debug)]
pub struct DwellTracker {
    pub config: DwellConfig,
    zones: [ZoneHoverState; 3],
    /// Previous raw sample position, for displacement.
    previous: Option<(f32, f32)>,
    triggers: u64,
}

impl Default for DwellTracker {
    fn default() -> Self {
        Self::new(DwellConfig::default())
    }
}

impl DwellTracker {
    pub fn new(config: DwellConfig) -> Self {
        Self {
            config,
            zones: [ZoneHoverState::default(); 3],
            previous: None,
            triggers: 0,
        }
    }

    /// Feed one pointer sample.
    ///
    /// `cursor` is the sample's cursor target in eye pixels within a
    /// `view` = (width, height) viewport and decides zone membership;
    /// displacement is measured on the raw sample.  Returns the zones that
    /// fired on this sample.
    pub fn update(
        &mut self,
        sample: &PointerSample,
        cursor: (f32, f32),
        view: (f32, f32),
        gates: ZoneGates,
        now_ms: u64,
    ) -> Vec<ZoneTrigger> {
        if !sample.hand_present {
            self.reset_all();
            return Vec::new();
        }

        let displacement = self
            .previous
            .map(|(px, py)| ((sample.x - px).powi(2) + (sample.y - py).powi(2)).sqrt())
            .unwrap_or(0.0);
        self.previous = Some((sample.x, sample.y));

        let mut fired = Vec::new();
        for kind in ZoneKind::ALL {
            let gate = gates.get(kind);
            let inside = self.config.contains(kind, cursor, view);
            let zone = &mut self.zones[kind.index()];

            if gate == ZoneGate::Suspended || !inside || sample.is_dismissal() {
                zone.reset();
                continue;
            }
            zone.inside = true;

            match zone.hover_start_ms {
                None => {
                    zone.hover_start_ms = Some(now_ms);
                    zone.progress = 0.0;
                }
                Some(start) if displacement < self.config.jitter_threshold => {
                    let elapsed = now_ms.saturating_sub(start) as f32;
                    zone.progress = (elapsed / self.config.dwell_ms.max(1) as f32).min(1.0);
                }
                Some(_) => {
                    debug!(
                        "Dwell restarted on {} (moved {:.3})",
                        kind.as_str(),
                        displacement
                    );
                    zone.hover_start_ms = Some(now_ms);
                    zone.progress = 0.0;
                }
            }

            if zone.progress >= 1.0 && now_ms >= zone.cooldown_until_ms && gate == ZoneGate::Armed {
                zone.cooldown_until_ms = now_ms + self.config.zone_cooldown_ms;
                zone.hover_start_ms = None;
                zone.progress = 0.0;
                self.triggers += 1;
                info!("Dwell trigger: {} at ts={}", kind.as_str(), now_ms);
                fired.push(ZoneTrigger {
                    zone: kind,
                    timestamp_ms: now_ms,
                });
            }
        }
        fired
    }

    /// Clear every hover timer.  Cooldowns survive.
    pub fn reset_all(&mut self) {
        for zone in &mut self.zones {
            zone.reset();
        }
        self.previous = None;
    }

    pub fn progress(&self, kind: ZoneKind) -> f32 {
        self.zones[kind.index()].progress
    }

    pub fn zone(&self, kind: ZoneKind) -> &ZoneHoverState {
        &self.zones[kind.index()]
    }

    /// The button under the pointer, if any.
    pub fn hovered_button(&self) -> Option<ZoneKind> {
        ZoneKind::ALL
            .into_iter()
            .find(|k| k.is_button() && self.zones[k.index()].inside)
    }

    #[cfg(test)]
    pub fn is_idle(&self) -> bool {
        self.zones.iter().all(|z| z.hover_start_ms.is_none() && z.progress == 0.0)
    }

    pub fn status_sexp(&self) -> String {
        let zones: Vec<String> = ZoneKind::ALL
            .iter()
            .map(|k| {
                let z = self.zone(*k);
                format!(
                    "(:zone :{} :progress {:.2} :inside {} :cooldown-until {})",
                    k.as_str(),
                    z.progress,
                    if z.inside { "t" } else { "nil" },
                    z.cooldown_until_ms,
                )
            })
            .collect();
        format!("(:triggers {} :zones ({}))", self.triggers, zones.join(" "))
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::interpreter::GestureKind;

    const VIEW: (f32, f32) = (640.0, 480.0);

    /// Eye-pixel cursor for a normalized position.
    fn at(x: f32, y: f32) -> (f32, f32) {
        (x * VIEW.0, y * VIEW.1)
    }

    fn sample(x: f32, y: f32, ts: u64) -> PointerSample {
        PointerSample {
            x,
            y,
            gesture: GestureKind::PointingUp,
            hand_present: true,
            timestamp_ms: ts,
        }
    }

    fn palm(x: f32, y: f32, ts: u64) -> PointerSample {
        PointerSample {
            gesture: GestureKind::OpenPalm,
            ..sample(x, y, ts)
        }
    }

    /// Feed a held pointer at normalized (x, y) every 50 ms.
    fn feed(
        t: &mut DwellTracker,
        x: f32,
        y: f32,
        from: u64,
        count: u64,
        gates: ZoneGates,
    ) -> Vec<(u64, ZoneTrigger)> {
        let mut out = Vec::new();
        for i in 0..count {
            let ts = from + i * 50;
            for trig in t.update(&sample(x, y, ts), at(x, y), VIEW, gates, ts) {
                out.push((i, trig));
            }
        }
        out
    }

    #[test]
    fn test_dwell_triggers_after_twenty_intervals() {
        let mut t = DwellTracker::default();
        let fired = feed(&mut t, 0.5, 0.5, 0, 25, ZoneGates::default());
        assert_eq!(fired.len(), 1);
        let (idx, trig) = fired[0];
        assert_eq!(trig.zone, ZoneKind::ObjectRecognition);
        // Sample 0 starts the timer at t=0, sample 20 lands on t=1000.
        assert_eq!(idx, 20);
        assert_eq!(trig.timestamp_ms, 1000);
        // Samples 21..24 start the next dwell from 1050 ms.
        assert!((t.progress(ZoneKind::ObjectRecognition) - 0.15).abs() < 1e-6);
    }

    #[test]
    fn test_progress_accumulates() {
        let mut t = DwellTracker::default();
        feed(&mut t, 0.5, 0.5, 0, 11, ZoneGates::default());
        assert!((t.progress(ZoneKind::ObjectRecognition) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_jump_restarts_timer() {
        let mut t = DwellTracker::default();
        let gates = ZoneGates::default();
        for i in 0..10u64 {
            let s = sample(0.5, 0.5, i * 50);
            assert!(t.update(&s, at(0.5, 0.5), VIEW, gates, i * 50).is_empty());
        }
        // One jump at t=500 restarts the dwell from there.
        assert!(t.update(&sample(0.6, 0.5, 500), at(0.6, 0.5), VIEW, gates, 500).is_empty());
        assert_eq!(t.progress(ZoneKind::ObjectRecognition), 0.0);

        let mut fired_at = None;
        for i in 11..40u64 {
            let ts = i * 50;
            if !t.update(&sample(0.6, 0.5, ts), at(0.6, 0.5), VIEW, gates, ts).is_empty() {
                fired_at = Some(ts);
                break;
            }
        }
        assert_eq!(fired_at, Some(1500));
    }

    #[test]
    fn test_leaving_zone_resets() {
        let mut t = DwellTracker::default();
        let gates = ZoneGates::default();
        feed(&mut t, 0.12, 0.25, 0, 10, gates);
        assert!(t.progress(ZoneKind::Microphone) > 0.4);
        assert_eq!(t.progress(ZoneKind::ObjectRecognition), 0.0);
        assert_eq!(t.hovered_button(), Some(ZoneKind::Microphone));

        // Small raw step, but the display position leaves the button.
        t.update(&sample(0.12, 0.26, 500), at(0.5, 0.5), VIEW, gates, 500);
        assert_eq!(t.progress(ZoneKind::Microphone), 0.0);
        assert_eq!(t.zone(ZoneKind::Microphone).hover_start_ms, None);
        assert_eq!(t.hovered_button(), None);
    }

    #[test]
    fn test_dismissal_pose_resets() {
        let mut t = DwellTracker::default();
        let gates = ZoneGates::default();
        feed(&mut t, 0.5, 0.5, 0, 15, gates);
        assert!(t.progress(ZoneKind::ObjectRecognition) > 0.6);
        t.update(&palm(0.5, 0.5, 750), at(0.5, 0.5), VIEW, gates, 750);
        assert!(t.is_idle());
    }

    #[test]
    fn test_absent_hand_resets() {
        let mut t = DwellTracker::default();
        feed(&mut t, 0.5, 0.5, 0, 15, ZoneGates::default());
        t.update(&PointerSample::absent(800), (0.0, 0.0), VIEW, ZoneGates::default(), 800);
        assert!(t.is_idle());
    }

    #[test]
    fn test_blocked_zone_never_triggers() {
        let mut t = DwellTracker::default();
        let gates = ZoneGates {
            object: ZoneGate::Blocked,
            ..ZoneGates::default()
        };
        let fired = feed(&mut t, 0.5, 0.5, 0, 100, gates);
        assert!(fired.is_empty());
        assert_eq!(t.progress(ZoneKind::ObjectRecognition), 1.0);
    }

    #[test]
    fn test_suspended_zones_hold_zero() {
        let mut t = DwellTracker::default();
        let gates = ZoneGates::all(ZoneGate::Suspended);
        feed(&mut t, 0.12, 0.25, 0, 40, gates);
        feed(&mut t, 0.88, 0.25, 2000, 40, gates);
        assert_eq!(t.progress(ZoneKind::Microphone), 0.0);
        assert_eq!(t.progress(ZoneKind::Subtitle), 0.0);
        assert!(t.is_idle());
    }

    #[test]
    fn test_zone_cooldown_delays_retrigger() {
        let mut t = DwellTracker::default();
        let gates = ZoneGates::default();
        let fired = feed(&mut t, 0.88, 0.25, 0, 70, gates);
        // First at 1000 ms; the second dwell completes at 2050 ms but the
        // cooldown holds it until 3000 ms.
        let times: Vec<u64> = fired.iter().map(|(_, f)| f.timestamp_ms).collect();
        assert_eq!(times, vec![1000, 3000]);
        assert!(fired.iter().all(|(_, f)| f.zone == ZoneKind::Subtitle));
    }

    #[test]
    fn test_object_zone_yields_to_buttons() {
        let cfg = DwellConfig::default();
        assert!(!cfg.contains(ZoneKind::ObjectRecognition, at(0.12, 0.25), VIEW));
        assert!(cfg.contains(ZoneKind::Microphone, at(0.12, 0.25), VIEW));
        assert!(cfg.contains(ZoneKind::ObjectRecognition, at(0.5, 0.9), VIEW));
        assert!(!cfg.contains(ZoneKind::Subtitle, at(0.5, 0.9), VIEW));
    }

    #[test]
    fn test_button_hit_is_round_in_pixels() {
        let cfg = DwellConfig::default();
        let (cx, cy) = cfg.buttons.center_px(ZoneKind::Microphone, VIEW).unwrap();
        assert!((cx - 76.8).abs() < 1e-3 && (cy - 120.0).abs() < 1e-3);
        // Drawn radius 40 plus 45 px of slop, the same in both axes.
        for (dx, dy) in [(84.0, 0.0), (0.0, 84.0), (-60.0, 59.0)] {
            assert!(cfg.contains(ZoneKind::Microphone, (cx + dx, cy + dy), VIEW));
        }
        assert!(!cfg.contains(ZoneKind::Microphone, (cx + 86.0, cy), VIEW));
        assert!(!cfg.contains(ZoneKind::Microphone, (cx, cy + 86.0), VIEW));
        assert!(cfg.contains(ZoneKind::ObjectRecognition, (cx, cy + 86.0), VIEW));
    }

    #[test]
    fn test_buttons_follow_viewport() {
        let cfg = DwellConfig::default();
        let wide = (1280.0, 480.0);
        let (cx, _) = cfg.buttons.center_px(ZoneKind::Subtitle, wide).unwrap();
        assert!(cfg.contains(ZoneKind::Subtitle, (cx, 120.0), wide));
        assert!(!cfg.contains(ZoneKind::Subtitle, at(0.88, 0.25), wide));
        assert!(cfg.buttons.center_px(ZoneKind::ObjectRecognition, wide).is_none());
    }

    #[test]
    fn test_status_sexp() {
        let mut t = DwellTracker::default();
        feed(&mut t, 0.5, 0.5, 0, 21, ZoneGates::default());
        let s = t.status_sexp();
        assert!(s.starts_with("(:triggers 1"));
        assert!(s.contains(":zone :object"));
    }
}
