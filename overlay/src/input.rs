//! Discrete input handling -- touch events to hardware-tap triggers.
//!
//! The glasses' touchpad reports raw down/up pairs.  A short press that
//! barely moves is a tap, which acts as the alternate capture trigger.
//! Backends that already debounce taps deliver `HardwareTap` directly.

use tracing::{debug, trace};

use crate::state::OverlayState;

/// Input event from any backend, timestamped on the overlay clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    TouchDown { x: f32, y: f32, time_ms: u64 },
    TouchUp { x: f32, y: f32, time_ms: u64 },
    HardwareTap { time_ms: u64 },
}

#[derive(Debug, Clone)]
pub struct TapConfig {
    /// Longest press that still counts as a tap.
    pub max_duration_ms: u64,
    /// Largest finger travel that still counts as a tap.
    pub max_travel_px: f32,
}

impl Default for TapConfig {
    fn default() -> Self {
        Self {
            max_duration_ms: 500,
            max_travel_px: 50.0,
        }
    }
}

/// Pairs touch-down and touch-up into taps.
#[derive(Debug, Default)]
pub struct TapDetector {
    pub config: TapConfig,
    down: Option<(f32, f32, u64)>,
}

impl TapDetector {
    pub fn new(config: TapConfig) -> Self {
        Self { config, down: None }
    }

    /// Feed one event.  Returns the tap time when the event completes a tap.
    pub fn handle(&mut self, event: &InputEvent) -> Option<u64> {
        match *event {
            InputEvent::TouchDown { x, y, time_ms } => {
                self.down = Some((x, y, time_ms));
                None
            }
            InputEvent::TouchUp { x, y, time_ms } => {
                let (dx, dy, down_ms) = self.down.take()?;
                let held = time_ms.saturating_sub(down_ms);
                let travel = ((x - dx).powi(2) + (y - dy).powi(2)).sqrt();
                if held < self.config.max_duration_ms && travel < self.config.max_travel_px {
                    Some(time_ms)
                } else {
                    trace!("Touch ignored: held {} ms, moved {:.0} px", held, travel);
                    None
                }
            }
            InputEvent::HardwareTap { time_ms } => Some(time_ms),
        }
    }
}

/// Route an input event into the overlay.
pub fn handle_input(state: &mut OverlayState, event: InputEvent) {
    if let Some(time_ms) = state.taps.handle(&event) {
        debug!("Hardware tap at {} ms", time_ms);
        // Rejections are reported on the status line by the state.
        let _ = state.on_hardware_tap(time_ms);
    }
}
