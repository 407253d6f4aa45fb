//! Headless backend -- simulated camera, classifier and uploader driving
//! the real pipeline.
//!
//! Worker threads (camera, inference, upload pool, input) never touch the
//! overlay state.  Their results arrive over calloop channels and are
//! handled on the loop thread, alongside a 60 Hz render timer.  Supports
//! graceful signal handling, an exit timer for CI, and periodic status
//! logging.

use crate::config::OverlayConfig;
use crate::input::{handle_input, InputEvent};
use crate::pipeline::admission::FrameAdmissionGate;
use crate::pipeline::feedback::TracingFeedback;
use crate::pipeline::inference::{InferenceResult, InferenceWorker};
use crate::pipeline::session::UploadOutcome;
use crate::pipeline::upload::UploadPool;
use crate::state::OverlayState;
use super::sim::{BlobClassifier, CountingSurface, MockUploader, SimCamera, SimScript};
use calloop::{
    channel::{channel, Event, Sender},
    timer::{TimeoutAction, Timer},
    EventLoop,
};
use anyhow::Context;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Global flag set by SIGTERM/SIGINT handlers.
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Simulated recognition latency.
const UPLOAD_DELAY: Duration = Duration::from_millis(600);
/// Every third simulated upload fails.
const UPLOAD_FAIL_EVERY: u64 = 3;
const INPUT_POLL: Duration = Duration::from_millis(20);

/// Install signal handlers for graceful shutdown (SIGTERM, SIGINT).
fn install_signal_handlers() {
    unsafe {
        libc::signal(libc::SIGTERM, signal_handler as libc::sighandler_t);
        libc::signal(libc::SIGINT, signal_handler as libc::sighandler_t);
    }
}

extern "C" fn signal_handler(_sig: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

/// Camera thread: render a frame per period and offer it to the gate.
///
/// Owns the inference worker so that the job channel closes when the
/// camera stops.
fn spawn_camera(
    camera: SimCamera,
    worker: InferenceWorker,
    gate: Arc<FrameAdmissionGate>,
    fps: u32,
    epoch: Instant,
    stop: Arc<AtomicBool>,
) -> anyhow::Result<JoinHandle<()>> {
    let period = Duration::from_secs_f64(1.0 / fps.max(1) as f64);
    std::thread::Builder::new()
        .name("camera".into())
        .spawn(move || {
            let mut frames = 0u64;
            while !stop.load(Ordering::SeqCst) {
                let started = Instant::now();
                let t = epoch.elapsed().as_millis() as u64;
                worker.offer(&gate, camera.frame_at(t));
                frames += 1;
                if let Some(rest) = period.checked_sub(started.elapsed()) {
                    std::thread::sleep(rest);
                }
            }
            worker.shutdown();
            info!("Camera stopped after {} frames", frames);
        })
        .context("failed to spawn camera thread")
}

/// Input thread: replay scripted touch events on the overlay clock.
fn spawn_input(
    script: SimScript,
    events: Sender<InputEvent>,
    epoch: Instant,
    stop: Arc<AtomicBool>,
) -> anyhow::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("input".into())
        .spawn(move || {
            let mut last = 0u64;
            while !stop.load(Ordering::SeqCst) {
                std::thread::sleep(INPUT_POLL);
                let now = epoch.elapsed().as_millis() as u64;
                for event in script.input_between(last, now) {
                    if events.send(event).is_err() {
                        return;
                    }
                }
                last = now;
            }
        })
        .context("failed to spawn input thread")
}

/// Run the overlay in headless mode.
///
/// Parameters:
/// - `config`: Effective configuration (file plus CLI overrides).
/// - `exit_after`: Exit after N seconds (for CI).
pub fn run(config: OverlayConfig, exit_after: Option<u64>) -> anyhow::Result<()> {
    let mut event_loop = EventLoop::<OverlayState>::try_new()?;
    let handle = event_loop.handle();
    let epoch = Instant::now();
    let gate = Arc::new(FrameAdmissionGate::new());
    let stop = Arc::new(AtomicBool::new(false));
    let pipeline = &config.pipeline;

    // Classifier results
    let (result_tx, result_rx) = channel::<InferenceResult>();
    handle
        .insert_source(result_rx, |event, _, state: &mut OverlayState| {
            if let Event::Msg(result) = event {
                state.on_classifier_output(result);
            }
        })
        .map_err(|e| anyhow::anyhow!("failed to register inference channel: {}", e.error))?;

    // Upload outcomes
    let (outcome_tx, outcome_rx) = channel::<UploadOutcome>();
    handle
        .insert_source(outcome_rx, |event, _, state: &mut OverlayState| {
            if let Event::Msg(outcome) = event {
                state.on_upload_outcome(outcome);
            }
        })
        .map_err(|e| anyhow::anyhow!("failed to register upload channel: {}", e.error))?;

    // Discrete input
    let (input_tx, input_rx) = channel::<InputEvent>();
    handle
        .insert_source(input_rx, |event, _, state: &mut OverlayState| {
            if let Event::Msg(input) = event {
                handle_input(state, input);
            }
        })
        .map_err(|e| anyhow::anyhow!("failed to register input channel: {}", e.error))?;

    // Render clock
    let tick = Duration::from_millis(config.compositor.tick_ms.max(1));
    handle
        .insert_source(Timer::from_duration(tick), move |_, _, state: &mut OverlayState| {
            state.render_tick();
            TimeoutAction::ToDuration(tick)
        })
        .map_err(|e| anyhow::anyhow!("failed to register render timer: {}", e.error))?;

    let worker = InferenceWorker::spawn(
        Box::new(BlobClassifier::default()),
        config.converter.inference_downsample,
        result_tx,
    )?;
    let pool = UploadPool::spawn(
        pipeline.upload_workers,
        Arc::new(MockUploader::new(UPLOAD_DELAY, Some(UPLOAD_FAIL_EVERY))),
        pipeline.capture_dir.clone(),
        outcome_tx,
    )?;
    if let Some(dir) = &pipeline.capture_dir {
        info!("Archiving captures to {}", dir.display());
    }

    let script = SimScript::new(&config);
    let camera = SimCamera::new(script.clone(), pipeline.camera_width, pipeline.camera_height);
    let camera_thread = spawn_camera(
        camera,
        worker,
        Arc::clone(&gate),
        pipeline.camera_fps,
        epoch,
        Arc::clone(&stop),
    )?;
    let input_thread = spawn_input(script, input_tx, epoch, Arc::clone(&stop))?;
    info!(
        "Camera {}x{} @ {} fps, display {}x{}",
        pipeline.camera_width,
        pipeline.camera_height,
        pipeline.camera_fps,
        pipeline.display_width,
        pipeline.display_height
    );

    let surface = CountingSurface::new(pipeline.display_width, pipeline.display_height);
    let status_interval = Duration::from_secs(pipeline.status_interval_s.max(1));
    debug!("Effective config: {}", config.config_sexp());
    let mut state = OverlayState::new(
        config,
        gate,
        Box::new(pool),
        Box::new(TracingFeedback),
        Box::new(surface),
    );

    // Signal handling via libc
    install_signal_handlers();

    let start_time = Instant::now();
    let exit_duration = exit_after.map(Duration::from_secs);
    let mut last_status_log = Instant::now();

    info!(
        "Headless backend initialized (render tick: {}ms), entering event loop",
        tick.as_millis()
    );

    while state.running {
        // Check global shutdown flag (set by signal handler)
        if SHUTDOWN_REQUESTED.load(Ordering::SeqCst) {
            info!("Shutdown signal received, exiting");
            state.running = false;
            break;
        }

        // Exit timer for CI
        if let Some(dur) = exit_duration {
            if start_time.elapsed() >= dur {
                info!("Headless exit timer fired after {}s", dur.as_secs());
                state.running = false;
                break;
            }
        }

        // Periodic status logging
        if last_status_log.elapsed() >= status_interval {
            info!("Headless status: {}", state.status_sexp());
            last_status_log = Instant::now();
        }

        event_loop.dispatch(Some(tick), &mut state)?;
    }

    stop.store(true, Ordering::SeqCst);
    for (name, thread) in [("camera", camera_thread), ("input", input_thread)] {
        if thread.join().is_err() {
            warn!("{} thread panicked", name);
        }
    }

    info!(
        "Headless backend shutting down ({} frame(s) drawn, {} capture(s), {})",
        state.compositor.frames(),
        state.session.generation(),
        state.timing.stats_sexp()
    );
    // Dropping the state joins the upload pool.
    drop(state);
    Ok(())
}
