//! Gesture interaction pipeline.
//!
//! Provides:
//! - `yuv`: planar YUV → RGB conversion with reusable buffers
//! - `admission`: single-permit frame admission and the high-res frame cache
//! - `inference`: classifier worker thread
//! - `frame_timing`: rolling inference statistics
//! - `interpreter`: classifier output → pointer sample
//! - `dwell`: per-zone hover accumulation and triggers
//! - `session`: Idle/Analyzing/Locked/Closing lifecycle
//! - `smoother`: pointer mapping and per-eye adaptive smoothing
//! - `upload`: capture conversion, archiving and upload pool
//! - `feedback`: haptic and status notifications

pub mod admission;
pub mod dwell;
pub mod feedback;
pub mod frame_timing;
pub mod inference;
pub mod interpreter;
pub mod session;
pub mod smoother;
pub mod upload;
pub mod yuv;
