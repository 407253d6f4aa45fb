//! Haptic and status-line feedback.

use tracing::info;

/// Haptic pulse patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HapticKind {
    /// A capture started.
    Trigger,
    /// The session closed.
    Dismiss,
    /// A mode was switched on or off.
    Toggle,
}

impl HapticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trigger => "trigger",
            Self::Dismiss => "dismiss",
            Self::Toggle => "toggle",
        }
    }
}

/// Fire-and-forget notification sink.
pub trait Feedback {
    fn haptic(&mut self, kind: HapticKind);
    fn status(&mut self, message: &str);
}

/// Feedback that only logs.
#[derive(Debug, Default)]
pub struct TracingFeedback;

impl Feedback for TracingFeedback {
    fn haptic(&mut self, kind: HapticKind) {
        info!("Haptic: {}", kind.as_str());
    }

    fn status(&mut self, message: &str) {
        info!("Status: {}", message);
    }
}

/// Records everything for assertions.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingFeedback {
    pub haptics: Vec<HapticKind>,
    pub statuses: Vec<String>,
}

#[cfg(test)]
impl Feedback for RecordingFeedback {
    fn haptic(&mut self, kind: HapticKind) {
        self.haptics.push(kind);
    }

    fn status(&mut self, message: &str) {
        self.statuses.push(message.to_string());
    }
}
