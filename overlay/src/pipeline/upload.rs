//! Capture upload pool.
//!
//! Accepted captures leave the owning thread as `CaptureTicket`s.  A small
//! pool of worker threads converts each one to full resolution, optionally
//! archives it as a PNG, calls the recognition collaborator and posts the
//! outcome back through a calloop channel.  Nothing here touches session
//! state directly.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use crossbeam_channel::{unbounded, Sender};
use tracing::{debug, info, warn};

use super::session::{CaptureTicket, UploadOutcome};
use super::yuv::{RgbImage, YuvConverter};

/// Recognition backend.  Called from pool threads, possibly concurrently.
pub trait RecognitionUploader: Send + Sync {
    /// Describe a full-resolution capture.
    fn recognize(&self, image: &RgbImage) -> anyhow::Result<String>;
}

/// Where accepted captures go.
pub trait CaptureSink {
    fn dispatch(&mut self, ticket: CaptureTicket);
}

// ── Capture archive ────────────────────────────────────────

/// File name for a capture taken at `unix_ms`.
pub fn capture_file_name(unix_ms: u128) -> String {
    format!("AR_{}.png", unix_ms)
}

/// Write `image` as a PNG into `dir`.  Returns the written path.
pub fn save_capture(dir: &Path, image: &RgbImage) -> anyhow::Result<PathBuf> {
    let unix_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let path = dir.join(capture_file_name(unix_ms));

    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create capture dir {}", dir.display()))?;
    let buffer = image::ImageBuffer::<image::Rgb<u8>, _>::from_raw(
        image.width,
        image.height,
        image.data.clone(),
    )
    .context("capture buffer does not match its dimensions")?;
    buffer
        .save(&path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

// ── Pool ───────────────────────────────────────────────────

pub struct UploadPool {
    jobs: Option<Sender<CaptureTicket>>,
    workers: Vec<JoinHandle<()>>,
}

impl UploadPool {
    pub fn spawn(
        workers: usize,
        uploader: Arc<dyn RecognitionUploader>,
        capture_dir: Option<PathBuf>,
        outcomes: calloop::channel::Sender<UploadOutcome>,
    ) -> anyhow::Result<Self> {
        let (tx, rx) = unbounded::<CaptureTicket>();
        let count = workers.max(1);
        let mut handles = Vec::with_capacity(count);

        for id in 0..count {
            let rx = rx.clone();
            let uploader = Arc::clone(&uploader);
            let capture_dir = capture_dir.clone();
            let outcomes = outcomes.clone();
            let handle = std::thread::Builder::new()
                .name(format!("upload-{}", id))
                .spawn(move || {
                    let mut converter = YuvConverter::new();
                    for ticket in rx.iter() {
                        let outcome = process(
                            &mut converter,
                            uploader.as_ref(),
                            capture_dir.as_deref(),
                            ticket,
                        );
                        if outcomes.send(outcome).is_err() {
                            debug!("Outcome channel closed, upload worker {} exiting", id);
                            break;
                        }
                    }
                })
                .with_context(|| format!("failed to spawn upload worker {}", id))?;
            handles.push(handle);
        }

        info!("Upload pool started with {} worker(s)", count);
        Ok(Self {
            jobs: Some(tx),
            workers: handles,
        })
    }

    /// Stop accepting captures and wait for in-flight uploads.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.jobs.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("Upload worker panicked");
            }
        }
    }
}

impl CaptureSink for UploadPool {
    fn dispatch(&mut self, ticket: CaptureTicket) {
        let generation = ticket.generation;
        let queued = match &self.jobs {
            Some(jobs) => jobs.send(ticket).is_ok(),
            None => false,
        };
        if queued {
            debug!("Capture #{} queued for upload", generation);
        } else {
            warn!("Upload pool closed, capture #{} discarded", generation);
        }
    }
}

impl Drop for UploadPool {
    fn drop(&mut self) {
        self.stop();
    }
}

fn process(
    converter: &mut YuvConverter,
    uploader: &dyn RecognitionUploader,
    capture_dir: Option<&Path>,
    ticket: CaptureTicket,
) -> UploadOutcome {
    let start = Instant::now();
    let image = converter.convert_full(&ticket.frame);

    if let Some(dir) = capture_dir {
        match save_capture(dir, image) {
            Ok(path) => info!("Capture #{} saved to {}", ticket.generation, path.display()),
            Err(e) => warn!("Capture #{} not saved: {:#}", ticket.generation, e),
        }
    }

    let result = uploader.recognize(image).map_err(|e| format!("{:#}", e));
    debug!(
        "Capture #{} ({}) processed in {:.0} ms",
        ticket.generation,
        ticket.source.as_str(),
        start.elapsed().as_secs_f64() * 1000.0
    );
    UploadOutcome {
        generation: ticket.generation,
        result,
    }
}
