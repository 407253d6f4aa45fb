//! Frame admission under backpressure.
//!
//! The classifier is guarded by a single permit.  A camera frame that
//! arrives while an inference is still running is dropped on the spot;
//! nothing is queued.  Every frame, admitted or not, replaces the content
//! of the single-slot high-resolution cache read at capture time.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::trace;

use super::yuv::RawFrame;

// ── Permit ─────────────────────────────────────────────────

/// Single-slot try-acquire primitive.  Contention never blocks.
#[derive(Debug, Default)]
pub struct InferencePermit {
    busy: AtomicBool,
}

impl InferencePermit {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Take the permit if it is free.  The permit returns on guard drop.
    pub fn try_acquire(self: &Arc<Self>) -> Option<PermitGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| PermitGuard {
                permit: Arc::clone(self),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Proof of holding the inference permit.
#[derive(Debug)]
pub struct PermitGuard {
    permit: Arc<InferencePermit>,
}

impl Drop for PermitGuard {
    fn drop(&mut self) {
        self.permit.busy.store(false, Ordering::Release);
    }
}

// ── High-resolution cache ──────────────────────────────────

/// Latest camera frame, swapped whole under a short lock.
///
/// Readers get an `Arc` to a complete frame; a later store never touches
/// a frame someone already holds.
#[derive(Debug, Default)]
pub struct HighResFrameCache {
    slot: Mutex<Option<Arc<RawFrame>>>,
}

impl HighResFrameCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached frame.  The previous one is released outside the lock.
    pub fn store(&self, frame: Arc<RawFrame>) {
        let previous = {
            let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
            slot.replace(frame)
        };
        drop(previous);
    }

    /// Current frame, if any has arrived yet.
    pub fn snapshot(&self) -> Option<Arc<RawFrame>> {
        self.slot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

// ── Gate ───────────────────────────────────────────────────

/// A frame cleared for inference, carrying the permit with it.
#[derive(Debug)]
pub struct AdmittedFrame {
    pub frame: Arc<RawFrame>,
    pub permit: PermitGuard,
}

/// Admission gate shared between the camera thread and the owning context.
#[derive(Debug)]
pub struct FrameAdmissionGate {
    permit: Arc<InferencePermit>,
    cache: HighResFrameCache,
    admitted: AtomicU64,
    dropped: AtomicU64,
}

impl Default for FrameAdmissionGate {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAdmissionGate {
    pub fn new() -> Self {
        Self {
            permit: InferencePermit::new(),
            cache: HighResFrameCache::new(),
            admitted: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Offer a camera frame.
    ///
    /// Always refreshes the cache.  Returns the frame with the permit when
    /// no inference is in flight, `None` otherwise.
    pub fn admit(&self, frame: RawFrame) -> Option<AdmittedFrame> {
        let frame = Arc::new(frame);
        self.cache.store(Arc::clone(&frame));

        match self.permit.try_acquire() {
            Some(permit) => {
                self.admitted.fetch_add(1, Ordering::Relaxed);
                Some(AdmittedFrame { frame, permit })
            }
            None => {
                let n = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                trace!(
                    "Dropped frame ts={} (inference busy, {} dropped total)",
                    frame.timestamp_ms,
                    n
                );
                None
            }
        }
    }

    pub fn cache(&self) -> &HighResFrameCache {
        &self.cache
    }

    pub fn in_flight(&self) -> bool {
        self.permit.is_busy()
    }

    pub fn admitted_count(&self) -> u64 {
        self.admitted.load(Ordering::Relaxed)
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn status_sexp(&self) -> String {
        format!(
            "(:admitted {} :dropped {} :in-flight {} :cached {})",
            self.admitted_count(),
            self.dropped_count(),
            if self.in_flight() { "t" } else { "nil" },
            if self.cache.snapshot().is_some() { "t" } else { "nil" },
        )
    }
}

// ── Tests ──────────────────────────────────────────────────
