//! Classifier output → pointer sample.
//!
//! The classifier reports at most one hand: a landmark list in
//! image-normalized coordinates and a ranked list of gesture labels.
//! The index fingertip drives the pointer; the top label is the pose.

use tracing::debug;

/// Landmark index of the index fingertip.
pub const FINGERTIP_INDEX: usize = 8;

/// Number of landmarks a complete hand reports.
pub const LANDMARK_COUNT: usize = 21;

// ── Classifier output ──────────────────────────────────────

/// One hand landmark, image-normalized.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GestureLabel {
    pub name: String,
    pub score: f32,
}

/// Result of one classifier invocation with a hand in view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifierOutput {
    pub landmarks: Vec<Landmark>,
    /// Ranked best-first.
    pub gestures: Vec<GestureLabel>,
}

// ── Gesture kinds ──────────────────────────────────────────

/// Canned gesture categories reported by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GestureKind {
    #[default]
    None,
    ClosedFist,
    OpenPalm,
    PointingUp,
    ThumbDown,
    ThumbUp,
    Victory,
    ILoveYou,
    Other,
}

impl GestureKind {
    /// Map a classifier label to a kind.  Unknown labels become `Other`.
    pub fn from_label(label: &str) -> Self {
        match label {
            "None" | "" => Self::None,
            "Closed_Fist" => Self::ClosedFist,
            "Open_Palm" => Self::OpenPalm,
            "Pointing_Up" => Self::PointingUp,
            "Thumb_Down" => Self::ThumbDown,
            "Thumb_Up" => Self::ThumbUp,
            "Victory" => Self::Victory,
            "ILoveYou" => Self::ILoveYou,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ClosedFist => "closed-fist",
            Self::OpenPalm => "open-palm",
            Self::PointingUp => "pointing-up",
            Self::ThumbDown => "thumb-down",
            Self::ThumbUp => "thumb-up",
            Self::Victory => "victory",
            Self::ILoveYou => "i-love-you",
            Self::Other => "other",
        }
    }

    /// The pose that cancels dwell and, when held, closes a session.
    pub fn is_dismissal(&self) -> bool {
        matches!(self, Self::OpenPalm)
    }
}

// ── Pointer sample ─────────────────────────────────────────

/// One interpreted inference cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerSample {
    /// Fingertip position in [0, 1]².  Meaningless when `hand_present` is false.
    pub x: f32,
    pub y: f32,
    pub gesture: GestureKind,
    pub hand_present: bool,
    pub timestamp_ms: u64,
}

impl PointerSample {
    pub fn absent(timestamp_ms: u64) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            gesture: GestureKind::None,
            hand_present: false,
            timestamp_ms,
        }
    }

    pub fn is_dismissal(&self) -> bool {
        self.hand_present && self.gesture.is_dismissal()
    }
}

// ── Interpreter ────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct GestureInterpreter {
    hand_visible: bool,
    samples: u64,
    absent_samples: u64,
}

impl GestureInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Turn one classifier result into a pointer sample.
    ///
    /// `None` output, or a hand without a fingertip landmark, yields an
    /// absent sample.
    pub fn interpret(
        &mut self,
        output: Option<&ClassifierOutput>,
        timestamp_ms: u64,
    ) -> PointerSample {
        self.samples += 1;

        let fingertip = output.and_then(|o| o.landmarks.get(FINGERTIP_INDEX).map(|tip| (o, tip)));
        let sample = match fingertip {
            Some((o, tip)) => {
                let gesture = o
                    .gestures
                    .first()
                    .map(|g| GestureKind::from_label(&g.name))
                    .unwrap_or_default();
                PointerSample {
                    x: tip.x.clamp(0.0, 1.0),
                    y: tip.y.clamp(0.0, 1.0),
                    gesture,
                    hand_present: true,
                    timestamp_ms,
                }
            }
            None => PointerSample::absent(timestamp_ms),
        };

        if sample.hand_present != self.hand_visible {
            debug!(
                "Hand {} at ts={}",
                if sample.hand_present { "acquired" } else { "lost" },
                timestamp_ms
            );
            self.hand_visible = sample.hand_present;
        }
        if !sample.hand_present {
            self.absent_samples += 1;
        }
        sample
    }

    #[cfg(test)]
    pub fn hand_visible(&self) -> bool {
        self.hand_visible
    }

    pub fn status_sexp(&self) -> String {
        format!(
            "(:hand-visible {} :samples {} :absent {})",
            if self.hand_visible { "t" } else { "nil" },
            self.samples,
            self.absent_samples,
        )
    }
}

// ── Test helpers ───────────────────────────────────────────

/// A full hand whose every landmark sits at (`x`, `y`), with one label.
#[cfg(test)]
pub fn hand_at(x: f32, y: f32, label: &str) -> ClassifierOutput {
    ClassifierOutput {
        landmarks: vec![Landmark { x, y, z: 0.0 }; LANDMARK_COUNT],
        gestures: vec![GestureLabel {
            name: label.to_string(),
            score: 0.9,
        }],
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_hand_is_absent() {
        let mut interp = GestureInterpreter::new();
        let s = interp.interpret(None, 42);
        assert!(!s.hand_present);
        assert_eq!(s.timestamp_ms, 42);
        assert!(!s.is_dismissal());
    }

    #[test]
    fn test_fingertip_drives_pointer() {
        let mut interp = GestureInterpreter::new();
        let mut out = hand_at(0.1, 0.1, "Pointing_Up");
        out.landmarks[FINGERTIP_INDEX] = Landmark { x: 0.7, y: 0.3, z: 0.0 };
        let s = interp.interpret(Some(&out), 1);
        assert!(s.hand_present);
        assert!((s.x - 0.7).abs() < 1e-6);
        assert!((s.y - 0.3).abs() < 1e-6);
        assert_eq!(s.gesture, GestureKind::PointingUp);
        assert!(interp.hand_visible());
    }

    #[test]
    fn test_top_label_wins() {
        let mut interp = GestureInterpreter::new();
        let mut out = hand_at(0.5, 0.5, "Open_Palm");
        out.gestures.push(GestureLabel {
            name: "Victory".into(),
            score: 0.1,
        });
        let s = interp.interpret(Some(&out), 1);
        assert!(s.is_dismissal());
    }

    #[test]
    fn test_truncated_landmarks_are_absent() {
        let mut interp = GestureInterpreter::new();
        let mut out = hand_at(0.5, 0.5, "Pointing_Up");
        out.landmarks.truncate(FINGERTIP_INDEX);
        assert!(!interp.interpret(Some(&out), 1).hand_present);
    }

    #[test]
    fn test_missing_label_is_none() {
        let mut interp = GestureInterpreter::new();
        let mut out = hand_at(0.5, 0.5, "");
        out.gestures.clear();
        let s = interp.interpret(Some(&out), 1);
        assert!(s.hand_present);
        assert_eq!(s.gesture, GestureKind::None);
    }

    #[test]
    fn test_out_of_frame_clamped() {
        let mut interp = GestureInterpreter::new();
        let s = interp.interpret(Some(&hand_at(1.3, -0.2, "None")), 1);
        assert_eq!((s.x, s.y), (1.0, 0.0));
    }

    #[test]
    fn test_label_mapping() {
        assert_eq!(GestureKind::from_label("Closed_Fist"), GestureKind::ClosedFist);
        assert_eq!(GestureKind::from_label("ILoveYou").as_str(), "i-love-you");
        assert_eq!(GestureKind::from_label("Wave"), GestureKind::Other);
        assert!(!GestureKind::Victory.is_dismissal());
    }

    #[test]
    fn test_status_counts_absent() {
        let mut interp = GestureInterpreter::new();
        interp.interpret(None, 1);
        interp.interpret(Some(&hand_at(0.5, 0.5, "None")), 2);
        let s = interp.status_sexp();
        assert!(s.contains(":samples 2"));
        assert!(s.contains(":absent 1"));
        assert!(s.contains(":hand-visible t"));
    }
}
