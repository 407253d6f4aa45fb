//! Overlay rendering -- cursor, progress arcs, buttons and the result card.
//!
//! The compositor runs on the render clock, not the inference clock.
//! Each frame it advances the per-eye pointer smoothers, draws one eye
//! viewport at a time through a single parameterized routine, and then
//! asks the surface for the next frame unconditionally, which keeps the
//! redraw loop alive whether or not new gesture samples arrived.
//!
//! The surface receives only primitive [`DrawOp`]s in surface pixels.

use tracing::trace;

use crate::pipeline::dwell::{ButtonLayout, ZoneKind};
use crate::pipeline::session::{CardTone, ResultCard, SessionState};
use crate::pipeline::smoother::{SmootherConfig, StereoSmoother};

/// RGBA color, components in [0, 1].
pub type Rgba = [f32; 4];

// Catppuccin Mocha accents.
pub const GREEN: Rgba = [0.651, 0.890, 0.631, 1.0];
pub const RED: Rgba = [0.953, 0.545, 0.659, 1.0];
pub const YELLOW: Rgba = [0.976, 0.886, 0.686, 1.0];
pub const GREY: Rgba = [0.424, 0.439, 0.525, 1.0];
pub const WHITE: Rgba = [0.804, 0.839, 0.957, 1.0];
pub const GLOW: Rgba = [0.804, 0.839, 0.957, 0.25];
pub const CARD_BG: Rgba = [0.118, 0.118, 0.180, 0.85];

// ---------------------------------------------------------------------------
// Surface interface
// ---------------------------------------------------------------------------

/// One primitive draw call.  Coordinates are surface pixels; angles are
/// degrees clockwise from 12 o'clock.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    FillCircle { cx: f32, cy: f32, r: f32, color: Rgba },
    StrokeCircle { cx: f32, cy: f32, r: f32, width: f32, color: Rgba },
    StrokeArc { cx: f32, cy: f32, r: f32, width: f32, sweep_deg: f32, color: Rgba },
    FillRoundRect { x: f32, y: f32, w: f32, h: f32, radius: f32, color: Rgba },
    StrokeRoundRect { x: f32, y: f32, w: f32, h: f32, radius: f32, width: f32, color: Rgba },
    Text { x: f32, y: f32, size: f32, text: String, color: Rgba },
}

/// Side-by-side stereo drawable.  Each eye gets half the width.
pub trait RenderSurface {
    /// Full surface size in pixels, queried every frame.
    fn size(&self) -> (u32, u32);
    fn draw(&mut self, op: DrawOp);
    fn request_next_frame(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eye {
    Left,
    Right,
}

impl Eye {
    pub const BOTH: [Eye; 2] = [Eye::Left, Eye::Right];

    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// One eye's region of the surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub eye: Eye,
    pub x_offset: f32,
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn for_eye(eye: Eye, surface: (u32, u32)) -> Self {
        let width = (surface.0 / 2) as f32;
        Self {
            eye,
            x_offset: width * eye.index() as f32,
            width,
            height: surface.1 as f32,
        }
    }
}

/// Everything the compositor reads from the owning context for one frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct SceneSnapshot<'a> {
    /// Display-normalized pointer target, `None` while no hand is seen.
    pub pointer: Option<(f32, f32)>,
    pub object_progress: f32,
    pub mic_progress: f32,
    pub subtitle_progress: f32,
    pub hovered_button: Option<ZoneKind>,
    pub close_progress: f32,
    pub state: SessionState,
    pub mic_active: bool,
    pub subtitles_active: bool,
    pub card: Option<&'a ResultCard>,
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CompositorConfig {
    pub glow_radius: f32,
    pub ring_radius: f32,
    pub close_arc_radius: f32,
    pub arc_width: f32,
    pub card_size: [f32; 2],
    /// Card anchor relative to the smoothed cursor.
    pub card_offset: [f32; 2],
    /// Card anchor while no hand is seen, display-normalized.
    pub card_default_anchor: [f32; 2],
    /// Fraction of the way toward the target the card moves per frame.
    pub card_blend: f32,
    /// Render tick in milliseconds.
    pub tick_ms: u64,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            glow_radius: 40.0,
            ring_radius: 30.0,
            close_arc_radius: 34.0,
            arc_width: 6.0,
            card_size: [260.0, 120.0],
            card_offset: [40.0, -80.0],
            card_default_anchor: [0.58, 0.52],
            card_blend: 0.4,
            tick_ms: 16,
        }
    }
}

// ---------------------------------------------------------------------------
// Card follow
// ---------------------------------------------------------------------------

/// Second, slower smoothing pass for the result card.
#[derive(Debug, Clone, Default)]
pub struct CardFollower {
    position: Option<(f32, f32)>,
}

impl CardFollower {
    /// Move toward `target` (top-left, eye-local pixels) and keep the card
    /// inside the viewport.
    pub fn update(
        &mut self,
        target: (f32, f32),
        blend: f32,
        card: [f32; 2],
        view: &Viewport,
    ) -> (f32, f32) {
        let (x, y) = match self.position {
            None => target,
            Some((px, py)) => (px + (target.0 - px) * blend, py + (target.1 - py) * blend),
        };
        let clamped = (
            x.clamp(0.0, (view.width - card[0]).max(0.0)),
            y.clamp(0.0, (view.height - card[1]).max(0.0)),
        );
        self.position = Some(clamped);
        clamped
    }

    pub fn position(&self) -> Option<(f32, f32)> {
        self.position
    }

    pub fn reset(&mut self) {
        self.position = None;
    }
}

// ---------------------------------------------------------------------------
// Compositor
// ---------------------------------------------------------------------------

pub struct Compositor {
    pub config: CompositorConfig,
    pub smoother: StereoSmoother,
    /// Same layout the dwell tracker hit-tests against.
    pub buttons: ButtonLayout,
    cards: [CardFollower; 2],
    frames: u64,
}

impl Compositor {
    pub fn new(config: CompositorConfig, smoother: SmootherConfig, buttons: ButtonLayout) -> Self {
        Self {
            config,
            smoother: StereoSmoother::new(smoother),
            buttons,
            cards: Default::default(),
            frames: 0,
        }
    }

    /// Draw both eyes and schedule the next frame.
    pub fn draw_frame(&mut self, surface: &mut dyn RenderSurface, scene: &SceneSnapshot<'_>) {
        let size = surface.size();
        let left = Viewport::for_eye(Eye::Left, size);

        let cursors = match scene.pointer {
            Some(p) => Some(self.smoother.tick(p, left.width, left.height)),
            None => {
                self.smoother.reset();
                None
            }
        };

        for eye in Eye::BOTH {
            let view = Viewport::for_eye(eye, size);
            let cursor = cursors.map(|c| c[eye.index()]);
            self.draw_eye(surface, &view, cursor, scene);
        }

        surface.request_next_frame();
        self.frames += 1;
        trace!("frame {} drawn ({}x{})", self.frames, size.0, size.1);
    }

    /// Draw one eye.  `cursor` is the smoothed eye-local position.
    fn draw_eye(
        &mut self,
        surface: &mut dyn RenderSurface,
        view: &Viewport,
        cursor: Option<(f32, f32)>,
        scene: &SceneSnapshot<'_>,
    ) {
        let ox = view.x_offset;

        self.draw_buttons(surface, view, scene);

        if let Some((x, y)) = cursor {
            let (cx, cy) = (x + ox, y);
            let c = &self.config;
            surface.draw(DrawOp::FillCircle { cx, cy, r: c.glow_radius, color: GLOW });
            let ring = if scene.state.in_session() { GREY } else { WHITE };
            surface.draw(DrawOp::StrokeCircle {
                cx,
                cy,
                r: c.ring_radius,
                width: 3.0,
                color: ring,
            });

            if scene.state == SessionState::Idle
                && scene.hovered_button.is_none()
                && scene.object_progress > 0.0
            {
                surface.draw(DrawOp::StrokeArc {
                    cx,
                    cy,
                    r: c.ring_radius,
                    width: c.arc_width,
                    sweep_deg: 360.0 * scene.object_progress,
                    color: GREEN,
                });
            }
            if scene.close_progress > 0.0 {
                surface.draw(DrawOp::StrokeArc {
                    cx,
                    cy,
                    r: c.close_arc_radius,
                    width: c.arc_width,
                    sweep_deg: 360.0 * scene.close_progress,
                    color: RED,
                });
            }
        }

        let follower = &mut self.cards[view.eye.index()];
        match scene.card {
            Some(card) if scene.state.in_session() => {
                let c = &self.config;
                let target = match cursor {
                    Some((x, y)) => (x + c.card_offset[0], y + c.card_offset[1]),
                    None => (
                        c.card_default_anchor[0] * view.width,
                        c.card_default_anchor[1] * view.height,
                    ),
                };
                let (x, y) = follower.update(target, c.card_blend, c.card_size, view);
                draw_card(surface, card, x + ox, y, c.card_size);
            }
            _ => follower.reset(),
        }
    }

    fn draw_buttons(
        &self,
        surface: &mut dyn RenderSurface,
        view: &Viewport,
        scene: &SceneSnapshot<'_>,
    ) {
        let c = &self.config;
        let r = self.buttons.radius_px;
        let buttons = [
            (ZoneKind::Microphone, scene.mic_active, scene.mic_progress),
            (ZoneKind::Subtitle, scene.subtitles_active, scene.subtitle_progress),
        ];

        for (kind, toggled, progress) in buttons {
            let Some((bx, cy)) = self.buttons.center_px(kind, (view.width, view.height)) else {
                continue;
            };
            let cx = bx + view.x_offset;

            match (kind, toggled) {
                (ZoneKind::Microphone, true) => {
                    surface.draw(DrawOp::StrokeCircle {
                        cx,
                        cy,
                        r: r * 1.3,
                        width: 3.0,
                        color: RED,
                    });
                    let side = r * 0.7;
                    surface.draw(DrawOp::FillRoundRect {
                        x: cx - side / 2.0,
                        y: cy - side / 2.0,
                        w: side,
                        h: side,
                        radius: 4.0,
                        color: RED,
                    });
                }
                (_, true) => {
                    surface.draw(DrawOp::FillCircle { cx, cy, r: r * 1.3, color: GREEN });
                }
                _ => {
                    surface.draw(DrawOp::StrokeCircle { cx, cy, r, width: 3.0, color: WHITE });
                    surface.draw(DrawOp::FillCircle { cx, cy, r: r * 0.45, color: WHITE });
                }
            }
            if kind == ZoneKind::Subtitle {
                surface.draw(DrawOp::Text {
                    x: cx - r * 0.35,
                    y: cy + r * 0.2,
                    size: r * 0.6,
                    text: "CC".into(),
                    color: CARD_BG,
                });
            }

            if progress > 0.0 {
                let arc_r = if toggled { r * 1.3 + 12.0 } else { r + 12.0 };
                surface.draw(DrawOp::StrokeArc {
                    cx,
                    cy,
                    r: arc_r,
                    width: c.arc_width,
                    sweep_deg: 360.0 * progress,
                    color: YELLOW,
                });
            }
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn card_position(&self, eye: Eye) -> Option<(f32, f32)> {
        self.cards[eye.index()].position()
    }

    pub fn status_sexp(&self) -> String {
        let card = match self.card_position(Eye::Left) {
            Some((x, y)) => format!("({:.0} {:.0})", x, y),
            None => "nil".to_string(),
        };
        format!("(:frames {} :card {})", self.frames, card)
    }
}

fn draw_card(surface: &mut dyn RenderSurface, card: &ResultCard, x: f32, y: f32, size: [f32; 2]) {
    let accent = match card.tone {
        CardTone::Pending => YELLOW,
        CardTone::Success => GREEN,
        CardTone::Failure => RED,
    };
    let [w, h] = size;
    surface.draw(DrawOp::FillRoundRect { x, y, w, h, radius: 12.0, color: CARD_BG });
    surface.draw(DrawOp::StrokeRoundRect { x, y, w, h, radius: 12.0, width: 2.0, color: accent });
    surface.draw(DrawOp::Text {
        x: x + 16.0,
        y: y + 32.0,
        size: 20.0,
        text: card.title.clone(),
        color: accent,
    });
    if !card.body.is_empty() {
        surface.draw(DrawOp::Text {
            x: x + 16.0,
            y: y + 64.0,
            size: 16.0,
            text: card.body.clone(),
            color: WHITE,
        });
    }
}

// ---------------------------------------------------------------------------
// Test surface
// ---------------------------------------------------------------------------

/// Records draw calls per frame.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub size: (u32, u32),
    pub ops: Vec<DrawOp>,
    pub frame_requests: u64,
}

#[cfg(test)]
impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            ..Self::default()
        }
    }

    pub fn arcs(&self, color: Rgba) -> Vec<&DrawOp> {
        self.ops
            .iter()
            .filter(|op| matches!(op, DrawOp::StrokeArc { color: c, .. } if *c == color))
            .collect()
    }

    pub fn texts(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
impl RenderSurface for RecordingSurface {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn draw(&mut self, op: DrawOp) {
        self.ops.push(op);
    }

    fn request_next_frame(&mut self) {
        self.frame_requests += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compositor() -> Compositor {
        Compositor::new(
            CompositorConfig::default(),
            SmootherConfig::default(),
            ButtonLayout::default(),
        )
    }

    #[test]
    fn test_idle_frame_without_hand() {
        let mut comp = compositor();
        let mut surface = RecordingSurface::new(2000, 800);
        comp.draw_frame(&mut surface, &SceneSnapshot::default());
        assert_eq!(surface.frame_requests, 1);
        // Two buttons per eye, ring + disc each, plus the CC label.
        assert_eq!(surface.ops.len(), 2 * (2 + 3));
        assert_eq!(surface.texts(), vec!["CC", "CC"]);
        assert_eq!(comp.frames(), 1);
    }

    #[test]
    fn test_cursor_drawn_per_eye() {
        let mut comp = compositor();
        let mut surface = RecordingSurface::new(2000, 800);
        let scene = SceneSnapshot {
            pointer: Some((0.5, 0.5)),
            ..SceneSnapshot::default()
        };
        comp.draw_frame(&mut surface, &scene);
        let rings: Vec<(f32, f32)> = surface
            .ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::StrokeCircle { cx, cy, r, .. } if *r == 30.0 => Some((*cx, *cy)),
                _ => None,
            })
            .collect();
        // Eye-local (480 ± 6, 370), right eye shifted by 1000.
        assert_eq!(rings, vec![(486.0, 370.0), (1474.0, 370.0)]);
    }

    #[test]
    fn test_object_arc_hidden_over_button() {
        let mut comp = compositor();
        let mut surface = RecordingSurface::new(2000, 800);
        let mut scene = SceneSnapshot {
            pointer: Some((0.5, 0.5)),
            object_progress: 0.5,
            ..SceneSnapshot::default()
        };
        comp.draw_frame(&mut surface, &scene);
        let arcs = surface.arcs(GREEN);
        assert_eq!(arcs.len(), 2);
        assert!(matches!(arcs[0], DrawOp::StrokeArc { sweep_deg, .. } if *sweep_deg == 180.0));

        scene.hovered_button = Some(ZoneKind::Microphone);
        scene.mic_progress = 0.25;
        let mut surface = RecordingSurface::new(2000, 800);
        comp.draw_frame(&mut surface, &scene);
        assert!(surface.arcs(GREEN).is_empty());
        let hover = surface.arcs(YELLOW);
        assert_eq!(hover.len(), 2);
        assert!(matches!(hover[0], DrawOp::StrokeArc { r, .. } if *r == 52.0));
    }

    #[test]
    fn test_toggled_button_arc_radius() {
        let mut comp = compositor();
        let mut surface = RecordingSurface::new(2000, 800);
        let scene = SceneSnapshot {
            subtitles_active: true,
            subtitle_progress: 0.5,
            ..SceneSnapshot::default()
        };
        comp.draw_frame(&mut surface, &scene);
        let hover = surface.arcs(YELLOW);
        assert!(matches!(hover[0], DrawOp::StrokeArc { r, .. } if (*r - 64.0).abs() < 1e-4));
    }

    #[test]
    fn test_card_only_in_session() {
        let card = ResultCard::pending();
        let mut comp = compositor();

        let mut surface = RecordingSurface::new(2000, 800);
        let idle = SceneSnapshot {
            card: Some(&card),
            ..SceneSnapshot::default()
        };
        comp.draw_frame(&mut surface, &idle);
        assert!(!surface.texts().contains(&"Analyzing..."));

        let mut surface = RecordingSurface::new(2000, 800);
        let analyzing = SceneSnapshot {
            state: SessionState::Analyzing,
            ..idle
        };
        comp.draw_frame(&mut surface, &analyzing);
        assert_eq!(surface.texts().iter().filter(|t| **t == "Analyzing...").count(), 2);
        // Default anchor without a hand.
        let (x, y) = comp.card_position(Eye::Left).unwrap();
        assert!((x - 580.0).abs() < 1e-3 && (y - 416.0).abs() < 1e-3);
    }

    #[test]
    fn test_card_follows_slowly_and_stays_inside() {
        let card = ResultCard::pending();
        let mut comp = compositor();
        let mut scene = SceneSnapshot {
            state: SessionState::Locked,
            card: Some(&card),
            ..SceneSnapshot::default()
        };
        let mut surface = RecordingSurface::new(2000, 800);
        comp.draw_frame(&mut surface, &scene);
        let start = comp.card_position(Eye::Left).unwrap();

        // Pointer far to the right edge: card eases over and clamps.
        scene.pointer = Some((1.0, 0.0));
        comp.draw_frame(&mut surface, &scene);
        let step = comp.card_position(Eye::Left).unwrap();
        assert!(step.0 > start.0);
        for _ in 0..60 {
            comp.draw_frame(&mut surface, &scene);
        }
        let (x, y) = comp.card_position(Eye::Left).unwrap();
        assert!(x <= 1000.0 - 260.0 + 1e-3);
        assert!(y >= 0.0);
    }

    #[test]
    fn test_close_arc_drawn() {
        let mut comp = compositor();
        let mut surface = RecordingSurface::new(2000, 800);
        let scene = SceneSnapshot {
            pointer: Some((0.5, 0.5)),
            state: SessionState::Analyzing,
            close_progress: 0.75,
            ..SceneSnapshot::default()
        };
        comp.draw_frame(&mut surface, &scene);
        let arcs = surface.arcs(RED);
        assert_eq!(arcs.len(), 2);
        assert!(matches!(
            arcs[0],
            DrawOp::StrokeArc { r, sweep_deg, .. } if *r == 34.0 && *sweep_deg == 270.0
        ));
    }

    #[test]
    fn test_viewport_split() {
        let v = Viewport::for_eye(Eye::Right, (1920, 1080));
        assert_eq!(v.x_offset, 960.0);
        assert_eq!(v.width, 960.0);
    }

    #[test]
    fn test_buttons_drawn_from_shared_layout() {
        let buttons = ButtonLayout {
            radius_px: 50.0,
            ..ButtonLayout::default()
        };
        let mut comp = Compositor::new(
            CompositorConfig::default(),
            SmootherConfig::default(),
            buttons.clone(),
        );
        let mut surface = RecordingSurface::new(1280, 480);
        comp.draw_frame(&mut surface, &SceneSnapshot::default());
        let (mx, my) = buttons.center_px(ZoneKind::Microphone, (640.0, 480.0)).unwrap();
        let ring = surface.ops.iter().find_map(|op| match op {
            DrawOp::StrokeCircle { cx, cy, r, .. } => Some((*cx, *cy, *r)),
            _ => None,
        });
        assert_eq!(ring, Some((mx, my, 50.0)));
    }
}
