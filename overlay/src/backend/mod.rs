//! Backend abstraction -- the headless simulation backend.

pub mod headless;
pub mod sim;

use crate::config::OverlayConfig;

/// Run the overlay until a signal or the exit timer stops it.
pub fn run(config: OverlayConfig, exit_after: Option<u64>) -> anyhow::Result<()> {
    headless::run(config, exit_after)
}
