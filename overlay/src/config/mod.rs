//! Overlay configuration.
//!
//! Every tunable lives in a plain `Default` struct owned by the component
//! that uses it; `OverlayConfig` aggregates them.  An optional file in
//! s-expression plist form overrides individual keys:
//!
//! ```text
//! (:dwell-ms 1000 :trigger-cooldown-ms 1000 :close-hold-ms 800
//!  :remap-min 0.15 :remap-max 0.85 :capture-dir "/tmp/ar")
//! ```

pub mod plist;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use tracing::{info, warn};

use crate::input::TapConfig;
use crate::pipeline::dwell::DwellConfig;
use crate::pipeline::session::SessionConfig;
use crate::pipeline::smoother::SmootherConfig;
use crate::pipeline::yuv::ConverterConfig;
use crate::render::CompositorConfig;

use self::plist::{get_float, get_string, get_u32, get_uint};

/// Runtime harness settings.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub camera_width: u32,
    pub camera_height: u32,
    pub camera_fps: u32,
    /// Full side-by-side display surface.
    pub display_width: u32,
    pub display_height: u32,
    pub upload_workers: usize,
    /// Where captures are archived, if anywhere.
    pub capture_dir: Option<PathBuf>,
    pub status_interval_s: u64,
    /// Samples kept for inference timing percentiles.
    pub timing_window: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            camera_width: 640,
            camera_height: 480,
            camera_fps: 30,
            display_width: 1280,
            display_height: 480,
            upload_workers: 2,
            capture_dir: None,
            status_interval_s: 5,
            timing_window: 300,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OverlayConfig {
    pub converter: ConverterConfig,
    pub dwell: DwellConfig,
    pub session: SessionConfig,
    pub smoother: SmootherConfig,
    pub compositor: CompositorConfig,
    pub tap: TapConfig,
    pub pipeline: PipelineConfig,
}

/// Every key the file format understands.
const KNOWN_KEYS: &[&str] = &[
    "downsample",
    "dwell-ms",
    "jitter-threshold",
    "zone-cooldown-ms",
    "button-radius",
    "button-hit-slop-px",
    "microphone-x",
    "microphone-y",
    "subtitle-x",
    "subtitle-y",
    "trigger-cooldown-ms",
    "close-hold-ms",
    "remap-min",
    "remap-max",
    "scale-x",
    "scale-y",
    "offset-x",
    "offset-y",
    "fast-snap-px",
    "jitter-px",
    "move-px",
    "min-blend",
    "max-blend",
    "eye-offset-px",
    "margin-px",
    "card-blend",
    "tick-ms",
    "tap-max-ms",
    "tap-max-travel-px",
    "camera-width",
    "camera-height",
    "camera-fps",
    "display-width",
    "display-height",
    "upload-workers",
    "capture-dir",
    "status-interval-s",
];

impl OverlayConfig {
    /// Read and parse a configuration file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = Self::from_sexp(&text)
            .with_context(|| format!("invalid config {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse a plist, starting from defaults.  Unknown keys are ignored
    /// with a warning; malformed values are errors.
    pub fn from_sexp(text: &str) -> anyhow::Result<Self> {
        let value = lexpr::from_str(text).context("malformed s-expression")?;
        if !matches!(value, lexpr::Value::Cons(_) | lexpr::Value::Null) {
            bail!("configuration must be a plist");
        }

        for key in plist::plist_keys(&value) {
            if !KNOWN_KEYS.contains(&key.as_str()) {
                warn!("Ignoring unknown config key :{}", key);
            }
        }

        let mut c = Self::default();
        let v = &value;
        let f = |key: &str| get_float(v, key).map(|o| o.map(|x| x as f32));

        if let Some(n) = get_u32(v, "downsample")? {
            if n == 0 {
                bail!(":downsample must be at least 1");
            }
            c.converter.inference_downsample = n;
        }

        // Dwell zones
        if let Some(n) = get_uint(v, "dwell-ms")? {
            c.dwell.dwell_ms = n;
        }
        if let Some(x) = f("jitter-threshold")? {
            c.dwell.jitter_threshold = x;
        }
        if let Some(n) = get_uint(v, "zone-cooldown-ms")? {
            c.dwell.zone_cooldown_ms = n;
        }
        let b = &mut c.dwell.buttons;
        if let Some(x) = f("button-radius")? {
            b.radius_px = x;
        }
        if let Some(x) = f("button-hit-slop-px")? {
            b.hit_slop_px = x;
        }
        if let Some(x) = f("microphone-x")? {
            b.microphone_center[0] = x;
        }
        if let Some(x) = f("microphone-y")? {
            b.microphone_center[1] = x;
        }
        if let Some(x) = f("subtitle-x")? {
            b.subtitle_center[0] = x;
        }
        if let Some(x) = f("subtitle-y")? {
            b.subtitle_center[1] = x;
        }

        // Session
        if let Some(n) = get_uint(v, "trigger-cooldown-ms")? {
            c.session.trigger_cooldown_ms = n;
        }
        if let Some(n) = get_uint(v, "close-hold-ms")? {
            c.session.close_hold_ms = n;
        }

        // Pointer mapping and smoothing
        let s = &mut c.smoother;
        if let Some(x) = f("remap-min")? {
            s.mapping.remap_min = x;
        }
        if let Some(x) = f("remap-max")? {
            s.mapping.remap_max = x;
        }
        if s.mapping.remap_max <= s.mapping.remap_min {
            bail!(":remap-max must exceed :remap-min");
        }
        if let Some(x) = f("scale-x")? {
            s.mapping.scale[0] = x;
        }
        if let Some(x) = f("scale-y")? {
            s.mapping.scale[1] = x;
        }
        if let Some(x) = f("offset-x")? {
            s.mapping.offset_px[0] = x;
        }
        if let Some(x) = f("offset-y")? {
            s.mapping.offset_px[1] = x;
        }
        if let Some(x) = f("fast-snap-px")? {
            s.fast_snap_px = x;
        }
        if let Some(x) = f("jitter-px")? {
            s.jitter_px = x;
        }
        if let Some(x) = f("move-px")? {
            s.move_px = x;
        }
        if let Some(x) = f("min-blend")? {
            s.min_blend = x;
        }
        if let Some(x) = f("max-blend")? {
            s.max_blend = x;
        }
        if let Some(x) = f("eye-offset-px")? {
            s.eye_offset_px = [x, -x];
        }
        if let Some(x) = f("margin-px")? {
            s.margin_px = x;
        }

        // Compositor
        if let Some(x) = f("card-blend")? {
            c.compositor.card_blend = x.clamp(0.0, 1.0);
        }
        if let Some(n) = get_uint(v, "tick-ms")? {
            c.compositor.tick_ms = n.max(1);
        }

        // Tap detection
        if let Some(n) = get_uint(v, "tap-max-ms")? {
            c.tap.max_duration_ms = n;
        }
        if let Some(x) = f("tap-max-travel-px")? {
            c.tap.max_travel_px = x;
        }

        // Harness
        let p = &mut c.pipeline;
        if let Some(n) = get_u32(v, "camera-width")? {
            p.camera_width = n;
        }
        if let Some(n) = get_u32(v, "camera-height")? {
            p.camera_height = n;
        }
        if let Some(n) = get_u32(v, "camera-fps")? {
            p.camera_fps = n.max(1);
        }
        if let Some(n) = get_u32(v, "display-width")? {
            p.display_width = n;
        }
        if let Some(n) = get_u32(v, "display-height")? {
            p.display_height = n;
        }
        if let Some(n) = get_uint(v, "upload-workers")? {
            p.upload_workers = n.max(1) as usize;
        }
        if let Some(dir) = get_string(v, "capture-dir") {
            p.capture_dir = (dir != "nil").then(|| PathBuf::from(dir));
        }
        if let Some(n) = get_uint(v, "status-interval-s")? {
            p.status_interval_s = n.max(1);
        }

        Ok(c)
    }

    /// Effective configuration as a plist that `from_sexp` accepts.
    pub fn config_sexp(&self) -> String {
        let m = &self.smoother.mapping;
        let s = &self.smoother;
        let p = &self.pipeline;
        let b = &self.dwell.buttons;
        let capture_dir = p
            .capture_dir
            .as_ref()
            .map(|d| format!("\"{}\"", plist::escape_string(&d.display().to_string())))
            .unwrap_or_else(|| "nil".to_string());
        format!(
            "(:downsample {} :dwell-ms {} :jitter-threshold {} :zone-cooldown-ms {} \
             :button-radius {} :button-hit-slop-px {} :microphone-x {} :microphone-y {} :subtitle-x {} :subtitle-y {} \
             :trigger-cooldown-ms {} :close-hold-ms {} \
             :remap-min {} :remap-max {} :scale-x {} :scale-y {} :offset-x {} :offset-y {} \
             :fast-snap-px {} :jitter-px {} :move-px {} :min-blend {} :max-blend {} :eye-offset-px {} :margin-px {} \
             :card-blend {} :tick-ms {} :tap-max-ms {} :tap-max-travel-px {} \
             :camera-width {} :camera-height {} :camera-fps {} :display-width {} :display-height {} \
             :upload-workers {} :capture-dir {} :status-interval-s {})",
            self.converter.inference_downsample,
            self.dwell.dwell_ms,
            self.dwell.jitter_threshold,
            self.dwell.zone_cooldown_ms,
            b.radius_px,
            b.hit_slop_px,
            b.microphone_center[0],
            b.microphone_center[1],
            b.subtitle_center[0],
            b.subtitle_center[1],
            self.session.trigger_cooldown_ms,
            self.session.close_hold_ms,
            m.remap_min,
            m.remap_max,
            m.scale[0],
            m.scale[1],
            m.offset_px[0],
            m.offset_px[1],
            s.fast_snap_px,
            s.jitter_px,
            s.move_px,
            s.min_blend,
            s.max_blend,
            s.eye_offset_px[0],
            s.margin_px,
            self.compositor.card_blend,
            self.compositor.tick_ms,
            self.tap.max_duration_ms,
            self.tap.max_travel_px,
            p.camera_width,
            p.camera_height,
            p.camera_fps,
            p.display_width,
            p.display_height,
            p.upload_workers,
            capture_dir,
            p.status_interval_s,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_plist_is_default() {
        let c = OverlayConfig::from_sexp("()").unwrap();
        assert_eq!(c.dwell.dwell_ms, 1000);
        assert_eq!(c.dwell.zone_cooldown_ms, 2000);
        assert_eq!(c.session.trigger_cooldown_ms, 1000);
        assert_eq!(c.session.close_hold_ms, 800);
        assert_eq!(c.converter.inference_downsample, 4);
        assert_eq!(c.smoother.mapping.scale, [1.6, 1.2]);
        assert_eq!(c.compositor.tick_ms, 16);
        assert!(c.pipeline.capture_dir.is_none());
    }

    #[test]
    fn test_overrides() {
        let c = OverlayConfig::from_sexp(
            "(:dwell-ms 1500 :close-hold-ms 600 :remap-min 0.1 :remap-max 0.9 \
              :eye-offset-px 8 :capture-dir \"/tmp/ar\" :microphone-x 0.2)",
        )
        .unwrap();
        assert_eq!(c.dwell.dwell_ms, 1500);
        assert_eq!(c.session.close_hold_ms, 600);
        assert!((c.smoother.mapping.remap_min - 0.1).abs() < 1e-6);
        assert_eq!(c.smoother.eye_offset_px, [8.0, -8.0]);
        assert_eq!(c.pipeline.capture_dir, Some(PathBuf::from("/tmp/ar")));
        assert!((c.dwell.buttons.microphone_center[0] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_button_geometry_keys() {
        let c = OverlayConfig::from_sexp("(:button-radius 55 :button-hit-slop-px 10)").unwrap();
        assert_eq!(c.dwell.buttons.radius_px, 55.0);
        assert_eq!(c.dwell.buttons.hit_slop_px, 10.0);
        assert_eq!(c.dwell.buttons.hit_radius_px(), 65.0);

        let back = OverlayConfig::from_sexp(&c.config_sexp()).unwrap();
        assert_eq!(back.dwell.buttons, c.dwell.buttons);
    }

    #[test]
    fn test_unknown_key_ignored() {
        let c = OverlayConfig::from_sexp("(:dwell-ms 900 :theme :dark)").unwrap();
        assert_eq!(c.dwell.dwell_ms, 900);
    }

    #[test]
    fn test_malformed_values_rejected() {
        assert!(OverlayConfig::from_sexp("(:dwell-ms soon)").is_err());
        assert!(OverlayConfig::from_sexp("(:close-hold-ms -5)").is_err());
        assert!(OverlayConfig::from_sexp("(:downsample 0)").is_err());
        assert!(OverlayConfig::from_sexp("(:remap-min 0.9 :remap-max 0.1)").is_err());
        assert!(OverlayConfig::from_sexp("42").is_err());
        assert!(OverlayConfig::from_sexp("(:dwell-ms").is_err());
    }

    #[test]
    fn test_oversized_dimensions_rejected() {
        let err = OverlayConfig::from_sexp("(:camera-width 4294967296)").unwrap_err();
        assert!(err.to_string().contains("camera-width"));
        assert!(OverlayConfig::from_sexp("(:display-height 5000000000)").is_err());
        assert!(OverlayConfig::from_sexp("(:downsample 4294967300)").is_err());
        let c = OverlayConfig::from_sexp("(:camera-width 4294967295)").unwrap();
        assert_eq!(c.pipeline.camera_width, u32::MAX);
    }

    #[test]
    fn test_config_sexp_reloads() {
        let mut c = OverlayConfig::default();
        c.dwell.dwell_ms = 1234;
        c.pipeline.capture_dir = Some(PathBuf::from("/tmp/captures"));
        let text = c.config_sexp();
        assert!(text.contains(":dwell-ms 1234"));
        let back = OverlayConfig::from_sexp(&text).unwrap();
        assert_eq!(back.dwell.dwell_ms, 1234);
        assert_eq!(back.pipeline.capture_dir, c.pipeline.capture_dir);
        assert!((back.smoother.mapping.scale[0] - 1.6).abs() < 1e-6);
    }

    #[test]
    fn test_load_missing_file() {
        let err = OverlayConfig::load(Path::new("/nonexistent/overlay.el")).unwrap_err();
        assert!(format!("{:#}", err).contains("failed to read config"));
    }
}
