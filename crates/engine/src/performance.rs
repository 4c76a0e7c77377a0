//! Frame and generation rate limits.
//!
//! Every write is clamped. Under the accessibility flag in normal mode the
//! limits are pinned to a slow, capped rate regardless of what was asked for.

use tracing::debug;

use crate::coordinator::EngineMode;

pub const MIN_FPS: u32 = 1;
pub const MAX_FPS: u32 = 120;
pub const DEFAULT_MAX_FPS: u32 = 60;
pub const MIN_GPS: u32 = 1;
pub const MAX_GPS: u32 = 60;
pub const DEFAULT_MAX_GPS: u32 = 30;

/// Rates forced while accessibility compliance is active.
pub const ACCESSIBLE_MAX_FPS: u32 = 2;
pub const ACCESSIBLE_MAX_GPS: u32 = 2;

pub const MIN_BATCH_SIZE: u64 = 1;
pub const MAX_BATCH_SIZE: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerformanceSettings {
    pub max_fps: u32,
    pub max_gps: u32,
    pub enable_fps_cap: bool,
    pub enable_gps_cap: bool,
}

impl Default for PerformanceSettings {
    fn default() -> Self {
        Self {
            max_fps: DEFAULT_MAX_FPS,
            max_gps: DEFAULT_MAX_GPS,
            enable_fps_cap: false,
            enable_gps_cap: false,
        }
    }
}

/// A partial write. Unset fields keep their current value.
///
/// Rates are `f64` so out-of-range and non-finite input can be handled by
/// clamping rather than at the call site.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PerformanceUpdate {
    pub max_fps: Option<f64>,
    pub max_gps: Option<f64>,
    pub enable_fps_cap: Option<bool>,
    pub enable_gps_cap: Option<bool>,
}

fn clamp_rate(value: Option<f64>, current: u32, min: u32, max: u32) -> u32 {
    match value {
        Some(v) if v.is_finite() => v.round().clamp(f64::from(min), f64::from(max)) as u32,
        Some(v) => {
            debug!(value = v, "ignoring non-finite rate");
            current
        }
        None => current,
    }
}

impl PerformanceSettings {
    /// The pinned accessibility settings.
    pub fn accessible() -> Self {
        Self {
            max_fps: ACCESSIBLE_MAX_FPS,
            max_gps: ACCESSIBLE_MAX_GPS,
            enable_fps_cap: true,
            enable_gps_cap: true,
        }
    }

    /// Apply a partial update with clamping.
    pub fn merged(&self, update: PerformanceUpdate) -> Self {
        Self {
            max_fps: clamp_rate(update.max_fps, self.max_fps, MIN_FPS, MAX_FPS),
            max_gps: clamp_rate(update.max_gps, self.max_gps, MIN_GPS, MAX_GPS),
            enable_fps_cap: update.enable_fps_cap.unwrap_or(self.enable_fps_cap),
            enable_gps_cap: update.enable_gps_cap.unwrap_or(self.enable_gps_cap),
        }
    }

    /// The settings that take effect for a mode and accessibility flag.
    pub fn enforced(self, mode: EngineMode, accessibility_mode: bool) -> Self {
        if accessibility_mode && mode == EngineMode::Normal {
            Self::accessible()
        } else {
            self
        }
    }

    /// Minimum time between frames, or `None` when uncapped.
    pub fn frame_interval_ms(&self) -> Option<f64> {
        self.enable_fps_cap.then(|| 1000.0 / f64::from(self.max_fps))
    }

    /// Minimum time between generations, or `None` when uncapped.
    pub fn generation_interval_ms(&self) -> Option<f64> {
        self.enable_gps_cap.then(|| 1000.0 / f64::from(self.max_gps))
    }
}

// ============================================================================
// Tests
// ============================================================================
