//! Inference worker thread.
//!
//! Owns the classifier and a private converter.  Admitted frames arrive
//! over a one-slot channel; the permit travels with the frame and is
//! released once the result has been handed to the owning thread.

use std::thread::JoinHandle;
use std::time::Instant;

use anyhow::Context;
use crossbeam_channel::{bounded, Sender, TrySendError};
use tracing::{debug, info, warn};

use super::admission::{AdmittedFrame, FrameAdmissionGate};
use super::interpreter::ClassifierOutput;
use super::yuv::{RawFrame, RgbImage, YuvConverter};

/// Opaque gesture classifier.  Invoked from one thread at a time.
pub trait GestureClassifier: Send {
    /// Classify a downsampled frame.  `Ok(None)` means no hand in view.
    fn classify(
        &mut self,
        image: &RgbImage,
        timestamp_ms: u64,
    ) -> anyhow::Result<Option<ClassifierOutput>>;
}

/// One finished inference, delivered to the owning thread.
#[derive(Debug, Clone)]
pub struct InferenceResult {
    pub output: Option<ClassifierOutput>,
    pub timestamp_ms: u64,
    pub convert_ms: f64,
    pub classify_ms: f64,
}

/// Handle to the inference thread.
pub struct InferenceWorker {
    jobs: Option<Sender<AdmittedFrame>>,
    handle: Option<JoinHandle<()>>,
}

impl InferenceWorker {
    /// Start the worker.  Results are posted to `results`.
    pub fn spawn(
        mut classifier: Box<dyn GestureClassifier>,
        downsample: u32,
        results: calloop::channel::Sender<InferenceResult>,
    ) -> anyhow::Result<Self> {
        let (tx, rx) = bounded::<AdmittedFrame>(1);

        let handle = std::thread::Builder::new()
            .name("inference".into())
            .spawn(move || {
                let mut converter = YuvConverter::new();
                for admitted in rx.iter() {
                    let result = run_inference(
                        &mut converter,
                        classifier.as_mut(),
                        &admitted.frame,
                        downsample,
                    );
                    let sent = results.send(result);
                    // Permit goes back only after the result is queued.
                    drop(admitted);
                    if sent.is_err() {
                        debug!("Result channel closed, inference worker exiting");
                        break;
                    }
                }
                info!(
                    "Inference worker stopped ({} converter allocations)",
                    converter.allocation_count()
                );
            })
            .context("failed to spawn inference thread")?;

        Ok(Self {
            jobs: Some(tx),
            handle: Some(handle),
        })
    }

    /// Hand an admitted frame to the worker.
    ///
    /// The permit guarantees the slot is free; if the worker is gone the
    /// frame is dropped and its permit released.
    pub fn submit(&self, admitted: AdmittedFrame) -> bool {
        let Some(jobs) = &self.jobs else {
            return false;
        };
        match jobs.try_send(admitted) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("Inference slot occupied despite permit, frame dropped");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Camera-side entry point: admit through `gate`, submit if admitted.
    pub fn offer(&self, gate: &FrameAdmissionGate, frame: RawFrame) -> bool {
        match gate.admit(frame) {
            Some(admitted) => self.submit(admitted),
            None => false,
        }
    }

    /// Close the job channel and join the thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Inference thread panicked");
            }
        }
    }
}

impl Drop for InferenceWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_inference(
    converter: &mut YuvConverter,
    classifier: &mut dyn GestureClassifier,
    frame: &RawFrame,
    downsample: u32,
) -> InferenceResult {
    let start = Instant::now();
    let image = converter.convert(frame, downsample);
    let convert_ms = start.elapsed().as_secs_f64() * 1000.0;

    let start = Instant::now();
    let output = match classifier.classify(image, frame.timestamp_ms) {
        Ok(output) => output,
        Err(e) => {
            debug!("Classifier failed at ts={}: {:#}", frame.timestamp_ms, e);
            None
        }
    };
    let classify_ms = start.elapsed().as_secs_f64() * 1000.0;

    InferenceResult {
        output,
        timestamp_ms: frame.timestamp_ms,
        convert_ms,
        classify_ms,
    }
}
