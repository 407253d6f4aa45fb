//! Overlay state -- the single context object owning the pipeline.
//!
//! One `OverlayState` holds the frame cache handle, session machine,
//! dwell tracker, smoothers and collaborators, and is passed as
//! `&mut self` to every event-loop callback.  Worker threads never touch
//! it; their results are marshaled onto the loop thread first.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::config::OverlayConfig;
use crate::input::TapDetector;
use crate::pipeline::admission::FrameAdmissionGate;
use crate::pipeline::dwell::{DwellTracker, ZoneKind, ZoneTrigger};
use crate::pipeline::feedback::Feedback;
use crate::pipeline::frame_timing::InferenceTiming;
use crate::pipeline::inference::InferenceResult;
use crate::pipeline::interpreter::{GestureInterpreter, PointerSample};
use crate::pipeline::session::{SessionMachine, TriggerRejection, TriggerSource, UploadOutcome};
use crate::pipeline::upload::CaptureSink;
use crate::render::{Compositor, Eye, RenderSurface, SceneSnapshot, Viewport};

/// Central overlay state.
pub struct OverlayState {
    pub config: OverlayConfig,

    // Camera side (shared with the camera thread)
    pub gate: Arc<FrameAdmissionGate>,

    // Gesture pipeline
    pub interpreter: GestureInterpreter,
    pub tracker: DwellTracker,
    pub session: SessionMachine,
    pub timing: InferenceTiming,
    pub taps: TapDetector,

    // Output
    pub compositor: Compositor,
    /// Latest display-normalized pointer target, `None` while no hand is seen.
    pub pointer_target: Option<(f32, f32)>,
    pub latest_sample: Option<PointerSample>,

    // Collaborators
    pub captures: Box<dyn CaptureSink>,
    pub feedback: Box<dyn Feedback>,
    pub surface: Box<dyn RenderSurface>,

    // Shutdown flag
    pub running: bool,
}

impl OverlayState {
    pub fn new(
        config: OverlayConfig,
        gate: Arc<FrameAdmissionGate>,
        captures: Box<dyn CaptureSink>,
        feedback: Box<dyn Feedback>,
        surface: Box<dyn RenderSurface>,
    ) -> Self {
        let compositor = Compositor::new(
            config.compositor.clone(),
            config.smoother.clone(),
            config.dwell.buttons.clone(),
        );
        Self {
            interpreter: GestureInterpreter::new(),
            tracker: DwellTracker::new(config.dwell.clone()),
            session: SessionMachine::new(config.session.clone()),
            timing: InferenceTiming::new(config.pipeline.timing_window),
            taps: TapDetector::new(config.tap.clone()),
            compositor,
            pointer_target: None,
            latest_sample: None,
            gate,
            captures,
            feedback,
            surface,
            running: true,
            config,
        }
    }

    // ── Inference path ─────────────────────────────────────

    /// One classifier result, already on the loop thread.
    pub fn on_classifier_output(&mut self, result: InferenceResult) {
        self.timing.record(
            result.convert_ms,
            result.classify_ms,
            result.output.is_some(),
            result.timestamp_ms,
        );
        self.timing.record_drops(self.gate.dropped_count());

        let sample = self
            .interpreter
            .interpret(result.output.as_ref(), result.timestamp_ms);
        self.apply_sample(sample);
    }

    /// Drive the hold timer, dwell zones and triggers from one sample.
    pub fn apply_sample(&mut self, sample: PointerSample) {
        let now = sample.timestamp_ms;
        self.latest_sample = Some(sample);

        if !sample.hand_present {
            self.tracker.reset_all();
            self.session.reset_hold();
            self.pointer_target = None;
            return;
        }

        let mapped = self.compositor.smoother.config.mapping.map(sample.x, sample.y);
        self.pointer_target = Some(mapped);
        trace!(
            "Sample ({:.3}, {:.3}) -> ({:.3}, {:.3}) {}",
            sample.x,
            sample.y,
            mapped.0,
            mapped.1,
            sample.gesture.as_str()
        );

        if let Some(closed) = self.session.on_sample(&sample, now, self.feedback.as_mut()) {
            debug!(
                "Session path: {}",
                closed
                    .path
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(" -> ")
            );
            self.tracker.reset_all();
        }

        // Buttons are hit-tested where the left-eye cursor settles.
        let view = Viewport::for_eye(Eye::Left, self.surface.size());
        let cursor = self.compositor.smoother.config.eye_target(
            mapped,
            Eye::Left.index(),
            view.width,
            view.height,
        );
        let gates = self.session.zone_gates();
        for trigger in self.tracker.update(&sample, cursor, (view.width, view.height), gates, now) {
            self.on_zone_trigger(trigger);
        }
    }

    fn on_zone_trigger(&mut self, trigger: ZoneTrigger) {
        match trigger.zone {
            ZoneKind::ObjectRecognition => {
                let _ = self.begin_capture(TriggerSource::Dwell, trigger.timestamp_ms);
            }
            ZoneKind::Microphone => {
                self.session.toggle_microphone(self.feedback.as_mut());
            }
            ZoneKind::Subtitle => {
                self.session.toggle_subtitles(self.feedback.as_mut());
            }
        }
    }

    /// Try to start a capture; on success hand it to the upload pool.
    pub fn begin_capture(
        &mut self,
        source: TriggerSource,
        now_ms: u64,
    ) -> Result<u64, TriggerRejection> {
        match self
            .session
            .try_begin_capture(source, now_ms, self.gate.cache(), self.feedback.as_mut())
        {
            Ok(ticket) => {
                let generation = ticket.generation;
                self.tracker.reset_all();
                self.captures.dispatch(ticket);
                Ok(generation)
            }
            Err(rejection) => {
                debug!(
                    "Capture via {} rejected: {}",
                    source.as_str(),
                    rejection.as_str()
                );
                if source == TriggerSource::HardwareTap
                    || rejection == TriggerRejection::NoCachedFrame
                {
                    self.feedback.status(rejection.status_message());
                }
                Err(rejection)
            }
        }
    }

    /// Discrete hardware trigger.
    pub fn on_hardware_tap(&mut self, now_ms: u64) -> Result<u64, TriggerRejection> {
        self.begin_capture(TriggerSource::HardwareTap, now_ms)
    }

    /// Upload result, already on the loop thread.
    pub fn on_upload_outcome(&mut self, outcome: UploadOutcome) {
        self.session.apply_upload(outcome, self.feedback.as_mut());
    }

    // ── Render path ────────────────────────────────────────

    /// Draw one frame on the render clock.
    pub fn render_tick(&mut self) {
        let hovered = self.tracker.hovered_button();
        let scene = SceneSnapshot {
            pointer: self.pointer_target,
            object_progress: self.tracker.progress(ZoneKind::ObjectRecognition),
            mic_progress: self.tracker.progress(ZoneKind::Microphone),
            subtitle_progress: self.tracker.progress(ZoneKind::Subtitle),
            hovered_button: hovered,
            close_progress: self.session.close_progress(),
            state: self.session.state(),
            mic_active: self.session.mic_active(),
            subtitles_active: self.session.subtitles_active(),
            card: self.session.card(),
        };
        self.compositor.draw_frame(self.surface.as_mut(), &scene);
    }

    // ── Status ─────────────────────────────────────────────

    pub fn status_sexp(&self) -> String {
        format!(
            "(:session {} :zones {} :gate {} :interpreter {} :inference {} :render {})",
            self.session.status_sexp(),
            self.tracker.status_sexp(),
            self.gate.status_sexp(),
            self.interpreter.status_sexp(),
            self.timing.stats_sexp(),
            self.compositor.status_sexp(),
        )
    }
}
