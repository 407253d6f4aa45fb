//! Gesture overlay - hands-free dwell-gesture UI for dual-eye AR displays
//!
//! A fingertip held over a zone triggers object recognition or toggles a
//! mode; an open palm held still dismisses the result card.

mod backend;
mod config;
mod input;
mod pipeline;
mod render;
mod state;

use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use crate::config::OverlayConfig;

#[derive(Parser, Debug)]
#[command(name = "gesture-overlay", about = "Dwell-gesture AR overlay")]
struct Cli {
    /// Configuration file (s-expression plist)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Exit after N seconds (headless testing)
    #[arg(long)]
    exit_after: Option<u64>,

    /// Archive every capture as a PNG in this directory
    #[arg(long)]
    capture_dir: Option<PathBuf>,

    /// Camera frame width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Camera frame height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// Camera frame rate
    #[arg(long)]
    camera_fps: Option<u32>,

    /// Number of recognition upload workers
    #[arg(long)]
    upload_workers: Option<usize>,

    /// Show version and exit
    #[arg(long)]
    version: bool,
}

impl Cli {
    /// Command-line values win over the configuration file.
    fn apply(&self, config: &mut OverlayConfig) {
        let pipeline = &mut config.pipeline;
        if let Some(dir) = &self.capture_dir {
            pipeline.capture_dir = Some(dir.clone());
        }
        if let Some(w) = self.width {
            pipeline.camera_width = w;
        }
        if let Some(h) = self.height {
            pipeline.camera_height = h;
        }
        if let Some(fps) = self.camera_fps {
            pipeline.camera_fps = fps;
        }
        if let Some(n) = self.upload_workers {
            pipeline.upload_workers = n;
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("gesture-overlay {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gesture_overlay=info".into()),
        )
        .init();

    info!("gesture-overlay v{} starting", env!("CARGO_PKG_VERSION"));

    let mut config = match &cli.config {
        Some(path) => OverlayConfig::load(path)?,
        None => OverlayConfig::default(),
    };
    cli.apply(&mut config);

    backend::run(config, cli.exit_after)
}
