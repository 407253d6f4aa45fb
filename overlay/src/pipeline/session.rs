//! Capture-session lifecycle.
//!
//! ```text
//!   Idle ──trigger──▶ Analyzing ──upload result──▶ Locked
//!    ▲                    │                          │
//!    └──── Closing ◀──────┴──── dismissal hold ──────┘
//! ```
//!
//! A trigger (object-zone dwell or hardware tap) is accepted only from
//! Idle, outside the trigger cooldown, with the microphone off and a
//! cached frame available.  Rejections are ordinary outcomes and leave
//! the machine untouched.  The session ends only through the dismissal
//! pose held for the full hold duration, whatever the upload returned.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::admission::HighResFrameCache;
use super::dwell::{ZoneGate, ZoneGates};
use super::feedback::{Feedback, HapticKind};
use super::interpreter::PointerSample;
use super::yuv::RawFrame;

// ── States ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    /// Capture dispatched, no upload result yet.
    Analyzing,
    /// Upload result shown on the card.
    Locked,
    /// Transient while the session tears down.
    Closing,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Analyzing => "analyzing",
            Self::Locked => "locked",
            Self::Closing => "closing",
        }
    }

    /// Analyzing or Locked: a card is up and the pointer drives it.
    pub fn in_session(&self) -> bool {
        matches!(self, Self::Analyzing | Self::Locked)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    Dwell,
    HardwareTap,
}

impl TriggerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dwell => "dwell",
            Self::HardwareTap => "hardware-tap",
        }
    }
}

/// Why a trigger was refused.  Expected, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerRejection {
    Cooldown,
    AlreadyAnalyzing,
    MicrophoneActive,
    NoCachedFrame,
}

impl TriggerRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cooldown => "cooldown",
            Self::AlreadyAnalyzing => "already-analyzing",
            Self::MicrophoneActive => "microphone-active",
            Self::NoCachedFrame => "no-cached-frame",
        }
    }

    /// Status-line text shown to the user.
    pub fn status_message(&self) -> &'static str {
        match self {
            Self::Cooldown => "too frequent",
            Self::AlreadyAnalyzing => "analysis in progress",
            Self::MicrophoneActive => "microphone busy",
            Self::NoCachedFrame => "no frame yet, retry",
        }
    }
}

// ── Cards and captures ─────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardTone {
    Pending,
    Success,
    Failure,
}

impl CardTone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultCard {
    pub title: String,
    pub body: String,
    pub tone: CardTone,
}

impl ResultCard {
    pub fn pending() -> Self {
        Self {
            title: "Analyzing...".into(),
            body: String::new(),
            tone: CardTone::Pending,
        }
    }
}

/// A capture accepted by the machine, ready for the upload pool.
#[derive(Debug, Clone)]
pub struct CaptureTicket {
    pub generation: u64,
    pub frame: Arc<RawFrame>,
    pub source: TriggerSource,
}

/// Upload completion, tagged with the session it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub generation: u64,
    pub result: Result<String, String>,
}

/// The state path taken by a dismissal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosedSession {
    pub path: [SessionState; 3],
}

// ── SessionConfig ──────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Minimum time between two accepted captures.
    pub trigger_cooldown_ms: u64,
    /// Dismissal pose hold required to close a session.
    pub close_hold_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            trigger_cooldown_ms: 1000,
            close_hold_ms: 800,
        }
    }
}

// ── Machine ────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct SessionMachine {
    pub config: SessionConfig,
    state: SessionState,
    open_palm_hold_start_ms: Option<u64>,
    last_trigger_ms: Option<u64>,
    generation: u64,
    card: Option<ResultCard>,
    mic_active: bool,
    subtitles_active: bool,
    close_progress: f32,
}

impl SessionMachine {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Check every precondition, then enter Analyzing.
    ///
    /// Nothing is mutated unless the capture is accepted.
    pub fn try_begin_capture(
        &mut self,
        source: TriggerSource,
        now_ms: u64,
        cache: &HighResFrameCache,
        feedback: &mut dyn Feedback,
    ) -> Result<CaptureTicket, TriggerRejection> {
        if self.state != SessionState::Idle {
            return Err(TriggerRejection::AlreadyAnalyzing);
        }
        if self.mic_active {
            return Err(TriggerRejection::MicrophoneActive);
        }
        if let Some(last) = self.last_trigger_ms {
            if now_ms.saturating_sub(last) <= self.config.trigger_cooldown_ms {
                return Err(TriggerRejection::Cooldown);
            }
        }
        let frame = cache.snapshot().ok_or(TriggerRejection::NoCachedFrame)?;

        self.state = SessionState::Analyzing;
        self.generation += 1;
        self.last_trigger_ms = Some(now_ms);
        self.open_palm_hold_start_ms = None;
        self.close_progress = 0.0;
        self.card = Some(ResultCard::pending());
        feedback.haptic(HapticKind::Trigger);
        info!(
            "Capture #{} started by {} (frame ts={})",
            self.generation,
            source.as_str(),
            frame.timestamp_ms
        );

        Ok(CaptureTicket {
            generation: self.generation,
            frame,
            source,
        })
    }

    /// Track the dismissal hold.  Returns the close path when the hold completes.
    pub fn on_sample(
        &mut self,
        sample: &PointerSample,
        now_ms: u64,
        feedback: &mut dyn Feedback,
    ) -> Option<ClosedSession> {
        if !self.state.in_session() || !sample.is_dismissal() {
            self.reset_hold();
            return None;
        }

        let start = *self.open_palm_hold_start_ms.get_or_insert(now_ms);
        let held = now_ms.saturating_sub(start);
        self.close_progress = (held as f32 / self.config.close_hold_ms.max(1) as f32).min(1.0);
        if held < self.config.close_hold_ms {
            return None;
        }

        let from = self.state;
        self.state = SessionState::Closing;
        self.card = None;
        self.reset_hold();
        self.state = SessionState::Idle;
        feedback.haptic(HapticKind::Dismiss);
        feedback.status("closed");
        info!("Session #{} closed after {} ms hold", self.generation, held);

        Some(ClosedSession {
            path: [from, SessionState::Closing, SessionState::Idle],
        })
    }

    /// Drop the dismissal hold timer.
    pub fn reset_hold(&mut self) {
        self.open_palm_hold_start_ms = None;
        self.close_progress = 0.0;
    }

    /// Show an upload result on the card.  Stale generations are ignored.
    pub fn apply_upload(&mut self, outcome: UploadOutcome, feedback: &mut dyn Feedback) -> bool {
        if !self.state.in_session() || outcome.generation != self.generation {
            debug!(
                "Ignoring stale upload #{} (active #{}, {})",
                outcome.generation,
                self.generation,
                self.state.as_str()
            );
            return false;
        }

        let card = match outcome.result {
            Ok(text) => {
                feedback.status("recognized");
                ResultCard {
                    title: "Result".into(),
                    body: text,
                    tone: CardTone::Success,
                }
            }
            Err(err) => {
                warn!("Recognition #{} failed: {}", outcome.generation, err);
                feedback.status("recognition failed");
                ResultCard {
                    title: "Recognition failed".into(),
                    body: err,
                    tone: CardTone::Failure,
                }
            }
        };
        self.card = Some(card);
        self.state = SessionState::Locked;
        true
    }

    /// Flip microphone mode.  Inert outside Idle.
    pub fn toggle_microphone(&mut self, feedback: &mut dyn Feedback) -> bool {
        if self.state != SessionState::Idle {
            return false;
        }
        self.mic_active = !self.mic_active;
        feedback.haptic(HapticKind::Toggle);
        feedback.status(if self.mic_active { "microphone on" } else { "microphone off" });
        info!("Microphone {}", if self.mic_active { "on" } else { "off" });
        true
    }

    /// Flip subtitle mode.  Inert outside Idle.
    pub fn toggle_subtitles(&mut self, feedback: &mut dyn Feedback) -> bool {
        if self.state != SessionState::Idle {
            return false;
        }
        self.subtitles_active = !self.subtitles_active;
        feedback.haptic(HapticKind::Toggle);
        feedback.status(if self.subtitles_active { "subtitles on" } else { "subtitles off" });
        info!("Subtitles {}", if self.subtitles_active { "on" } else { "off" });
        true
    }

    /// Which dwell zones may accumulate and fire right now.
    pub fn zone_gates(&self) -> ZoneGates {
        if self.state != SessionState::Idle {
            return ZoneGates::all(ZoneGate::Suspended);
        }
        ZoneGates {
            object: if self.mic_active {
                ZoneGate::Blocked
            } else {
                ZoneGate::Armed
            },
            microphone: ZoneGate::Armed,
            subtitle: ZoneGate::Armed,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn card(&self) -> Option<&ResultCard> {
        self.card.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn mic_active(&self) -> bool {
        self.mic_active
    }

    pub fn subtitles_active(&self) -> bool {
        self.subtitles_active
    }

    /// Dismissal hold progress in [0, 1].
    pub fn close_progress(&self) -> f32 {
        self.close_progress
    }

    pub fn status_sexp(&self) -> String {
        let card = self
            .card
            .as_ref()
            .map(|c| format!(":{}", c.tone.as_str()))
            .unwrap_or_else(|| "nil".to_string());
        format!(
            "(:state :{} :generation {} :card {} :mic {} :subtitles {} :close-progress {:.2})",
            self.state.as_str(),
            self.generation,
            card,
            if self.mic_active { "t" } else { "nil" },
            if self.subtitles_active { "t" } else { "nil" },
            self.close_progress,
        )
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::feedback::RecordingFeedback;
    use crate::pipeline::interpreter::GestureKind;
    use crate::pipeline::yuv::uniform_frame;

    fn cache_with_frame() -> HighResFrameCache {
        let cache = HighResFrameCache::new();
        cache.store(Arc::new(uniform_frame(8, 8, 100, 128, 128, 0)));
        cache
    }

    fn pose(gesture: GestureKind, ts: u64) -> PointerSample {
        PointerSample {
            x: 0.5,
            y: 0.5,
            gesture,
            hand_present: true,
            timestamp_ms: ts,
        }
    }

    fn started() -> (SessionMachine, RecordingFeedback) {
        let mut m = SessionMachine::default();
        let mut fb = RecordingFeedback::default();
        m.try_begin_capture(TriggerSource::Dwell, 5000, &cache_with_frame(), &mut fb)
            .unwrap();
        (m, fb)
    }

    #[test]
    fn test_valid_trigger_enters_analyzing() {
        let (m, fb) = started();
        assert_eq!(m.state(), SessionState::Analyzing);
        assert_eq!(m.generation(), 1);
        assert_eq!(m.card().map(|c| c.tone), Some(CardTone::Pending));
        assert_eq!(fb.haptics, vec![HapticKind::Trigger]);
    }

    #[test]
    fn test_second_trigger_rejected_without_change() {
        let (mut m, mut fb) = started();
        let before = m.status_sexp();
        let r = m.try_begin_capture(TriggerSource::HardwareTap, 9000, &cache_with_frame(), &mut fb);
        assert_eq!(r.unwrap_err(), TriggerRejection::AlreadyAnalyzing);
        assert_eq!(m.status_sexp(), before);
        assert_eq!(fb.haptics.len(), 1);
    }

    #[test]
    fn test_no_cached_frame() {
        let mut m = SessionMachine::default();
        let mut fb = RecordingFeedback::default();
        let r = m.try_begin_capture(TriggerSource::Dwell, 5000, &HighResFrameCache::new(), &mut fb);
        assert_eq!(r.unwrap_err(), TriggerRejection::NoCachedFrame);
        assert_eq!(m.state(), SessionState::Idle);
        assert_eq!(m.generation(), 0);
        assert!(fb.haptics.is_empty());
        assert_eq!(TriggerRejection::NoCachedFrame.status_message(), "no frame yet, retry");
    }

    #[test]
    fn test_microphone_blocks_capture() {
        let mut m = SessionMachine::default();
        let mut fb = RecordingFeedback::default();
        assert!(m.toggle_microphone(&mut fb));
        let r = m.try_begin_capture(TriggerSource::HardwareTap, 5000, &cache_with_frame(), &mut fb);
        assert_eq!(r.unwrap_err(), TriggerRejection::MicrophoneActive);
        assert_eq!(m.zone_gates().object, ZoneGate::Blocked);
        assert_eq!(m.zone_gates().microphone, ZoneGate::Armed);
    }

    #[test]
    fn test_cooldown_after_close() {
        let (mut m, mut fb) = started();
        for ts in (5000..=5800).step_by(100) {
            m.on_sample(&pose(GestureKind::OpenPalm, ts), ts, &mut fb);
        }
        assert_eq!(m.state(), SessionState::Idle);
        // Last trigger at 5000, window is 1000 ms inclusive.
        let cache = cache_with_frame();
        assert_eq!(
            m.try_begin_capture(TriggerSource::Dwell, 6000, &cache, &mut fb).unwrap_err(),
            TriggerRejection::Cooldown
        );
        assert!(m.try_begin_capture(TriggerSource::Dwell, 6001, &cache, &mut fb).is_ok());
        assert_eq!(m.generation(), 2);
    }

    #[test]
    fn test_dismissal_hold_closes() {
        let (mut m, mut fb) = started();
        assert!(m.on_sample(&pose(GestureKind::OpenPalm, 6000), 6000, &mut fb).is_none());
        assert!(m.on_sample(&pose(GestureKind::OpenPalm, 6400), 6400, &mut fb).is_none());
        assert!((m.close_progress() - 0.5).abs() < 1e-6);
        let closed = m.on_sample(&pose(GestureKind::OpenPalm, 6800), 6800, &mut fb);
        assert_eq!(
            closed.map(|c| c.path),
            Some([SessionState::Analyzing, SessionState::Closing, SessionState::Idle])
        );
        assert_eq!(m.state(), SessionState::Idle);
        assert!(m.card().is_none());
        assert_eq!(m.close_progress(), 0.0);
        assert_eq!(fb.haptics, vec![HapticKind::Trigger, HapticKind::Dismiss]);
    }

    #[test]
    fn test_release_restarts_hold() {
        let (mut m, mut fb) = started();
        m.on_sample(&pose(GestureKind::OpenPalm, 6000), 6000, &mut fb);
        assert!(m.on_sample(&pose(GestureKind::OpenPalm, 6799), 6799, &mut fb).is_none());
        // Released for one sample: the hold starts over.
        m.on_sample(&pose(GestureKind::PointingUp, 6850), 6850, &mut fb);
        assert_eq!(m.close_progress(), 0.0);
        m.on_sample(&pose(GestureKind::OpenPalm, 6900), 6900, &mut fb);
        assert!(m.on_sample(&pose(GestureKind::OpenPalm, 7699), 7699, &mut fb).is_none());
        assert!(m.state().in_session());
        assert!(m.on_sample(&pose(GestureKind::OpenPalm, 7700), 7700, &mut fb).is_some());
    }

    #[test]
    fn test_absent_hand_resets_hold() {
        let (mut m, mut fb) = started();
        m.on_sample(&pose(GestureKind::OpenPalm, 6000), 6000, &mut fb);
        m.on_sample(&PointerSample::absent(6500), 6500, &mut fb);
        assert!(m.on_sample(&pose(GestureKind::OpenPalm, 6800), 6800, &mut fb).is_none());
    }

    #[test]
    fn test_palm_in_idle_does_nothing() {
        let mut m = SessionMachine::default();
        let mut fb = RecordingFeedback::default();
        for ts in (0..=2000).step_by(100) {
            assert!(m.on_sample(&pose(GestureKind::OpenPalm, ts), ts, &mut fb).is_none());
        }
        assert_eq!(m.close_progress(), 0.0);
        assert!(fb.haptics.is_empty());
    }

    #[test]
    fn test_upload_success_locks() {
        let (mut m, mut fb) = started();
        let applied = m.apply_upload(
            UploadOutcome {
                generation: 1,
                result: Ok("a red mug".into()),
            },
            &mut fb,
        );
        assert!(applied);
        assert_eq!(m.state(), SessionState::Locked);
        let card = m.card().unwrap();
        assert_eq!(card.tone, CardTone::Success);
        assert_eq!(card.body, "a red mug");
    }

    #[test]
    fn test_upload_failure_requires_dismissal() {
        let (mut m, mut fb) = started();
        m.apply_upload(
            UploadOutcome {
                generation: 1,
                result: Err("timeout".into()),
            },
            &mut fb,
        );
        assert_eq!(m.card().map(|c| c.tone), Some(CardTone::Failure));
        assert!(m.state().in_session());
        assert_eq!(m.zone_gates(), ZoneGates::all(ZoneGate::Suspended));
    }

    #[test]
    fn test_stale_upload_ignored() {
        let (mut m, mut fb) = started();
        for ts in (6000..=6800).step_by(100) {
            m.on_sample(&pose(GestureKind::OpenPalm, ts), ts, &mut fb);
        }
        m.try_begin_capture(TriggerSource::Dwell, 8000, &cache_with_frame(), &mut fb)
            .unwrap();
        let applied = m.apply_upload(
            UploadOutcome {
                generation: 1,
                result: Ok("old".into()),
            },
            &mut fb,
        );
        assert!(!applied);
        assert_eq!(m.state(), SessionState::Analyzing);
        assert_eq!(m.card().map(|c| c.tone), Some(CardTone::Pending));
    }

    #[test]
    fn test_toggles_inert_in_session() {
        let (mut m, mut fb) = started();
        assert!(!m.toggle_microphone(&mut fb));
        assert!(!m.toggle_subtitles(&mut fb));
        assert!(!m.mic_active());
        assert!(!m.subtitles_active());
    }

    #[test]
    fn test_toggle_feedback() {
        let mut m = SessionMachine::default();
        let mut fb = RecordingFeedback::default();
        m.toggle_subtitles(&mut fb);
        m.toggle_subtitles(&mut fb);
        assert_eq!(fb.statuses, vec!["subtitles on", "subtitles off"]);
        assert_eq!(fb.haptics, vec![HapticKind::Toggle, HapticKind::Toggle]);
    }

    #[test]
    fn test_status_sexp() {
        let (m, _) = started();
        let s = m.status_sexp();
        assert!(s.contains(":state :analyzing"));
        assert!(s.contains(":card :pending"));
    }
}
