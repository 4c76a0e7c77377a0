//! Pan/zoom transform between screen pixels and world cells.
//!
//! Offsets are in cell units. The canvas center is aligned with
//! `(offset_x, offset_y)`, so
//!
//! ```text
//! screen = (world - offset) * cell_size + canvas_center
//! world  = offset + (screen - canvas_center) / cell_size
//! ```
//!
//! Anchored zoom keeps the world point under a screen anchor fixed: the point
//! is computed with the old cell size and the offset is solved for again with
//! the new one.

use lifebox_persist::ViewportState;
use lifebox_sim::Cell;
use tracing::debug;

pub const MIN_ZOOM: f64 = 0.1;
pub const MAX_ZOOM: f64 = 10.0;
pub const DEFAULT_MIN_CELL_SIZE: f64 = 1.0;
pub const DEFAULT_MAX_CELL_SIZE: f64 = 200.0;
pub const DEFAULT_CELL_SIZE: f64 = lifebox_persist::DEFAULT_CELL_SIZE;
/// Per-wheel-tick cell size multiplier.
pub const DEFAULT_ZOOM_FACTOR: f64 = 1.12;
pub const DEFAULT_KEYBOARD_PAN_AMOUNT: f64 = 1.0;
pub const DEFAULT_KEYBOARD_PAN_AMOUNT_FAST: f64 = 10.0;

const EPSILON: f64 = 1e-9;

/// Viewport limits and input tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportConfig {
    pub min_cell_size: f64,
    pub max_cell_size: f64,
    pub default_cell_size: f64,
    pub zoom_factor: f64,
    pub keyboard_pan_amount: f64,
    pub keyboard_pan_amount_fast: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            min_cell_size: DEFAULT_MIN_CELL_SIZE,
            max_cell_size: DEFAULT_MAX_CELL_SIZE,
            default_cell_size: DEFAULT_CELL_SIZE,
            zoom_factor: DEFAULT_ZOOM_FACTOR,
            keyboard_pan_amount: DEFAULT_KEYBOARD_PAN_AMOUNT,
            keyboard_pan_amount_fast: DEFAULT_KEYBOARD_PAN_AMOUNT_FAST,
        }
    }
}

impl ViewportConfig {
    /// Replace unusable limits with the defaults and order the cell size
    /// range so clamping against it is always defined.
    pub fn sanitized(self) -> Self {
        let finite_or = |v: f64, fallback: f64| if v.is_finite() && v > 0.0 { v } else { fallback };
        let a = finite_or(self.min_cell_size, DEFAULT_MIN_CELL_SIZE);
        let b = finite_or(self.max_cell_size, DEFAULT_MAX_CELL_SIZE);
        let (min_cell_size, max_cell_size) = if a <= b { (a, b) } else { (b, a) };
        let sanitized = Self {
            min_cell_size,
            max_cell_size,
            default_cell_size: finite_or(self.default_cell_size, DEFAULT_CELL_SIZE),
            zoom_factor: finite_or(self.zoom_factor, DEFAULT_ZOOM_FACTOR),
            keyboard_pan_amount: finite_or(self.keyboard_pan_amount, DEFAULT_KEYBOARD_PAN_AMOUNT),
            keyboard_pan_amount_fast: finite_or(
                self.keyboard_pan_amount_fast,
                DEFAULT_KEYBOARD_PAN_AMOUNT_FAST,
            ),
        };
        if sanitized != self {
            debug!(requested = ?self, using = ?sanitized, "viewport config adjusted");
        }
        sanitized
    }
}

/// Current pan/zoom values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub offset_x: f64,
    pub offset_y: f64,
    pub cell_size: f64,
    pub zoom: f64,
}

impl From<Viewport> for ViewportState {
    fn from(v: Viewport) -> Self {
        Self {
            offset_x: v.offset_x,
            offset_y: v.offset_y,
            cell_size: v.cell_size,
            zoom: v.zoom,
        }
    }
}

impl From<ViewportState> for Viewport {
    fn from(v: ViewportState) -> Self {
        Self {
            offset_x: v.offset_x,
            offset_y: v.offset_y,
            cell_size: v.cell_size,
            zoom: v.zoom,
        }
    }
}

/// A screen position together with the canvas center it is measured against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenAnchor {
    pub x: f64,
    pub y: f64,
    pub center_x: f64,
    pub center_y: f64,
}

impl ScreenAnchor {
    pub fn new(x: f64, y: f64, center_x: f64, center_y: f64) -> Self {
        Self {
            x,
            y,
            center_x,
            center_y,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanDirection {
    Up,
    Down,
    Left,
    Right,
}

impl PanDirection {
    fn unit(self) -> (f64, f64) {
        match self {
            Self::Up => (0.0, -1.0),
            Self::Down => (0.0, 1.0),
            Self::Left => (-1.0, 0.0),
            Self::Right => (1.0, 0.0),
        }
    }
}

// ============================================================================
// Transform
// ============================================================================

#[derive(Debug, Clone)]
pub struct ViewportTransform {
    config: ViewportConfig,
    viewport: Viewport,
}

impl Default for ViewportTransform {
    fn default() -> Self {
        Self::new(ViewportConfig::default())
    }
}

impl ViewportTransform {
    pub fn new(config: ViewportConfig) -> Self {
        let config = config.sanitized();
        let mut transform = Self {
            config,
            viewport: Viewport {
                offset_x: 0.0,
                offset_y: 0.0,
                cell_size: config.default_cell_size,
                zoom: 1.0,
            },
        };
        transform.viewport.cell_size = transform.clamp_cell_size(config.default_cell_size);
        transform
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn config(&self) -> &ViewportConfig {
        &self.config
    }

    /// Clamp to the configured cell size range. Non-finite input yields the
    /// current size.
    pub fn clamp_cell_size(&self, size: f64) -> f64 {
        if !size.is_finite() {
            return self.viewport.cell_size;
        }
        size.clamp(self.config.min_cell_size, self.config.max_cell_size)
    }

    /// Set offset and optionally cell size and zoom.
    ///
    /// Non-finite values leave the previous value in place; cell size and
    /// zoom are clamped. Returns true if anything changed.
    pub fn set(
        &mut self,
        offset_x: f64,
        offset_y: f64,
        cell_size: Option<f64>,
        zoom: Option<f64>,
    ) -> bool {
        let before = self.viewport;
        if offset_x.is_finite() {
            self.viewport.offset_x = offset_x;
        }
        if offset_y.is_finite() {
            self.viewport.offset_y = offset_y;
        }
        if let Some(size) = cell_size {
            self.viewport.cell_size = self.clamp_cell_size(size);
        }
        if let Some(zoom) = zoom {
            self.set_zoom(zoom);
        }
        if before != self.viewport {
            debug!(?before, after = ?self.viewport, "viewport set");
        }
        before != self.viewport
    }

    /// Returns true if the zoom changed.
    pub fn set_zoom(&mut self, zoom: f64) -> bool {
        if !zoom.is_finite() {
            return false;
        }
        let zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        let changed = zoom != self.viewport.zoom;
        self.viewport.zoom = zoom;
        changed
    }

    /// World coordinates (fractional cells) under a screen point.
    pub fn world_at(&self, anchor: ScreenAnchor) -> (f64, f64) {
        let v = &self.viewport;
        (
            v.offset_x + (anchor.x - anchor.center_x) / v.cell_size,
            v.offset_y + (anchor.y - anchor.center_y) / v.cell_size,
        )
    }

    /// Screen position of a world point for a given canvas center.
    pub fn screen_of(&self, world_x: f64, world_y: f64, center_x: f64, center_y: f64) -> (f64, f64) {
        let v = &self.viewport;
        (
            (world_x - v.offset_x) * v.cell_size + center_x,
            (world_y - v.offset_y) * v.cell_size + center_y,
        )
    }

    /// The cell under a screen point.
    pub fn cell_at(&self, anchor: ScreenAnchor) -> Cell {
        let (x, y) = self.world_at(anchor);
        Cell::new(x.floor() as i64, y.floor() as i64)
    }

    /// Cell size after one wheel tick, or `None` if the tick changes nothing.
    ///
    /// Negative `delta_y` zooms in. The size is scaled in device pixels,
    /// clamped to `[1, max_cell_size * dpr]`, rounded up when growing and
    /// down when shrinking, then converted back to logical pixels.
    pub fn wheel_cell_size(&self, delta_y: f64, device_pixel_ratio: f64) -> Option<f64> {
        if delta_y == 0.0 || !delta_y.is_finite() {
            return None;
        }
        let dpr = if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
            device_pixel_ratio
        } else {
            1.0
        };
        let factor = if delta_y < 0.0 {
            self.config.zoom_factor
        } else {
            1.0 / self.config.zoom_factor
        };

        let prev_device = self.viewport.cell_size * dpr;
        let max_device = (self.config.max_cell_size * dpr).max(1.0);
        let scaled = (prev_device * factor).clamp(1.0, max_device);
        let snapped = if scaled > prev_device {
            scaled.ceil()
        } else if scaled < prev_device {
            scaled.floor()
        } else {
            scaled
        };
        let snapped = snapped.clamp(1.0, max_device);
        let next = self.clamp_cell_size(snapped / dpr);

        if (next - self.viewport.cell_size).abs() < EPSILON {
            None
        } else {
            Some(next)
        }
    }

    /// Zoom one wheel tick around `anchor`. Returns true if the viewport changed.
    pub fn wheel_zoom(&mut self, anchor: ScreenAnchor, delta_y: f64, device_pixel_ratio: f64) -> bool {
        match self.wheel_cell_size(delta_y, device_pixel_ratio) {
            Some(size) => self.zoom_at(anchor, size),
            None => false,
        }
    }

    /// Scale the cell size by `ratio` around `anchor` (pinch gesture).
    pub fn pinch_zoom(&mut self, anchor: ScreenAnchor, ratio: f64) -> bool {
        if !ratio.is_finite() || ratio <= 0.0 {
            return false;
        }
        let size = self.clamp_cell_size(self.viewport.cell_size * ratio);
        self.zoom_at(anchor, size)
    }

    /// Switch to `new_size` keeping the world point under `anchor` fixed.
    pub fn zoom_at(&mut self, anchor: ScreenAnchor, new_size: f64) -> bool {
        let new_size = self.clamp_cell_size(new_size);
        if (new_size - self.viewport.cell_size).abs() < EPSILON {
            return false;
        }
        let (world_x, world_y) = self.world_at(anchor);
        self.viewport.cell_size = new_size;
        self.viewport.offset_x = world_x - (anchor.x - anchor.center_x) / new_size;
        self.viewport.offset_y = world_y - (anchor.y - anchor.center_y) / new_size;
        true
    }

    /// Translate by a delta in cell units.
    pub fn pan(&mut self, dx: f64, dy: f64) -> bool {
        if !dx.is_finite() || !dy.is_finite() || (dx == 0.0 && dy == 0.0) {
            return false;
        }
        self.viewport.offset_x += dx;
        self.viewport.offset_y += dy;
        true
    }

    /// One arrow-key press; `fast` when the modifier is held.
    pub fn keyboard_pan(&mut self, direction: PanDirection, fast: bool) -> bool {
        let amount = if fast {
            self.config.keyboard_pan_amount_fast
        } else {
            self.config.keyboard_pan_amount
        };
        let (ux, uy) = direction.unit();
        self.pan(ux * amount, uy * amount)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn anchor(x: f64, y: f64) -> ScreenAnchor {
        ScreenAnchor::new(x, y, 400.0, 300.0)
    }

    #[test]
    fn test_defaults() {
        let t = ViewportTransform::default();
        let v = t.viewport();
        assert_eq!(v.cell_size, 20.0);
        assert_eq!(v.zoom, 1.0);
        assert_eq!((v.offset_x, v.offset_y), (0.0, 0.0));
    }

    #[test]
    fn test_set_clamps_and_ignores_non_finite() {
        let mut t = ViewportTransform::default();
        assert!(t.set(5.0, f64::NAN, Some(1000.0), Some(50.0)));
        let v = t.viewport();
        assert_eq!(v.offset_x, 5.0);
        assert_eq!(v.offset_y, 0.0);
        assert_eq!(v.cell_size, DEFAULT_MAX_CELL_SIZE);
        assert_eq!(v.zoom, MAX_ZOOM);

        assert!(t.set(5.0, 0.0, Some(-3.0), Some(0.0)));
        assert_eq!(t.viewport().cell_size, DEFAULT_MIN_CELL_SIZE);
        assert_eq!(t.viewport().zoom, MIN_ZOOM);

        assert!(!t.set(5.0, 0.0, Some(f64::INFINITY), None));
    }

    #[test]
    fn test_screen_world_mapping() {
        let mut t = ViewportTransform::default();
        t.set(10.0, -4.0, Some(20.0), None);

        // canvas center maps to the offset
        assert_eq!(t.world_at(anchor(400.0, 300.0)), (10.0, -4.0));
        assert_eq!(t.cell_at(anchor(430.0, 290.0)), Cell::new(11, -5));
        assert_eq!(t.screen_of(11.5, -4.5, 400.0, 300.0), (430.0, 290.0));
    }

    #[test]
    fn test_wheel_snaps_up_and_down() {
        let t = ViewportTransform::default();
        // 20 * 1.12 = 22.4 -> ceil
        assert_eq!(t.wheel_cell_size(-1.0, 1.0), Some(23.0));
        // 20 / 1.12 = 17.86 -> floor
        assert_eq!(t.wheel_cell_size(1.0, 1.0), Some(17.0));
        assert_eq!(t.wheel_cell_size(0.0, 1.0), None);
    }

    #[test]
    fn test_wheel_uses_device_pixels() {
        let t = ViewportTransform::default();
        // 40 device px * 1.12 = 44.8 -> 45 -> 22.5 logical
        assert_eq!(t.wheel_cell_size(-1.0, 2.0), Some(22.5));
    }

    #[test]
    fn test_wheel_at_limits_is_noop() {
        let mut t = ViewportTransform::default();
        t.set(0.0, 0.0, Some(DEFAULT_MIN_CELL_SIZE), None);
        assert_eq!(t.wheel_cell_size(1.0, 1.0), None);
        // small sizes still grow thanks to the upward snap
        assert_eq!(t.wheel_cell_size(-1.0, 1.0), Some(2.0));

        t.set(0.0, 0.0, Some(DEFAULT_MAX_CELL_SIZE), None);
        assert_eq!(t.wheel_cell_size(-1.0, 1.0), None);
        assert!(!t.wheel_zoom(anchor(0.0, 0.0), -1.0, 1.0));
    }

    #[test]
    fn test_wheel_zoom_keeps_anchor_cell() {
        let mut t = ViewportTransform::default();
        t.set(3.25, -7.5, None, None);
        let a = anchor(612.0, 97.0);
        let before = t.world_at(a);

        assert!(t.wheel_zoom(a, -120.0, 1.0));
        let after = t.world_at(a);

        assert!((before.0 - after.0).abs() < 1e-9);
        assert!((before.1 - after.1).abs() < 1e-9);
    }

    #[test]
    fn test_pinch_rejects_bad_ratio() {
        let mut t = ViewportTransform::default();
        assert!(!t.pinch_zoom(anchor(0.0, 0.0), 0.0));
        assert!(!t.pinch_zoom(anchor(0.0, 0.0), f64::NAN));
        assert!(!t.pinch_zoom(anchor(0.0, 0.0), 1.0));
        assert!(t.pinch_zoom(anchor(0.0, 0.0), 2.0));
        assert_eq!(t.viewport().cell_size, 40.0);
    }

    #[test]
    fn test_keyboard_pan() {
        let mut t = ViewportTransform::default();
        t.keyboard_pan(PanDirection::Right, false);
        t.keyboard_pan(PanDirection::Up, true);
        let v = t.viewport();
        assert_eq!((v.offset_x, v.offset_y), (1.0, -10.0));
        assert!(!t.pan(0.0, 0.0));
    }

    #[test]
    fn test_inverted_config_is_reordered() {
        let t = ViewportTransform::new(ViewportConfig {
            min_cell_size: 50.0,
            max_cell_size: 10.0,
            ..Default::default()
        });
        assert_eq!(t.config().min_cell_size, 10.0);
        assert_eq!(t.config().max_cell_size, 50.0);
        assert_eq!(t.viewport().cell_size, DEFAULT_CELL_SIZE);
        assert_eq!(t.clamp_cell_size(500.0), 50.0);
    }

    #[test]
    fn test_unusable_config_falls_back_to_defaults() {
        let t = ViewportTransform::new(ViewportConfig {
            min_cell_size: f64::NAN,
            max_cell_size: f64::INFINITY,
            default_cell_size: f64::NAN,
            zoom_factor: -2.0,
            keyboard_pan_amount: 0.0,
            keyboard_pan_amount_fast: f64::NAN,
        });
        assert_eq!(*t.config(), ViewportConfig::default());
        assert_eq!(t.viewport().cell_size, DEFAULT_CELL_SIZE);
    }

    #[test]
    fn test_wheel_at_max_with_fractional_dpr() {
        let mut t = ViewportTransform::new(ViewportConfig {
            max_cell_size: 201.0,
            ..Default::default()
        });
        t.set(0.0, 0.0, Some(200.5), None);
        assert_eq!(t.wheel_cell_size(-1.0, 1.5), Some(201.0));

        t.set(0.0, 0.0, Some(201.0), None);
        assert_eq!(t.wheel_cell_size(-1.0, 1.5), None);
    }

    #[test]
    fn test_viewport_state_conversion() {
        let v = Viewport {
            offset_x: 1.0,
            offset_y: 2.0,
            cell_size: 3.0,
            zoom: 4.0,
        };
        assert_eq!(Viewport::from(ViewportState::from(v)), v);
    }

    proptest! {
        #[test]
        fn prop_pinch_pair_keeps_anchor(
            offset_x in -1.0e4f64..1.0e4,
            offset_y in -1.0e4f64..1.0e4,
            size in 2.0f64..100.0,
            ax in 0.0f64..1920.0,
            ay in 0.0f64..1080.0,
            ratio in 1.01f64..1.9,
        ) {
            let mut t = ViewportTransform::default();
            t.set(offset_x, offset_y, Some(size), None);
            let a = ScreenAnchor::new(ax, ay, 960.0, 540.0);
            let before = t.world_at(a);

            t.pinch_zoom(a, ratio);
            t.pinch_zoom(a, 1.0 / ratio);
            let after = t.world_at(a);

            prop_assert!((t.viewport().cell_size - size).abs() < 1e-6);
            prop_assert!((before.0 - after.0).abs() < 1e-6);
            prop_assert!((before.1 - after.1).abs() < 1e-6);
        }

        #[test]
        fn prop_wheel_zoom_keeps_anchor(
            offset_x in -1.0e4f64..1.0e4,
            offset_y in -1.0e4f64..1.0e4,
            size in 1.0f64..200.0,
            ax in 0.0f64..1920.0,
            ay in 0.0f64..1080.0,
            delta in prop_oneof![Just(-1.0f64), Just(1.0f64)],
        ) {
            let mut t = ViewportTransform::default();
            t.set(offset_x, offset_y, Some(size), None);
            let a = ScreenAnchor::new(ax, ay, 960.0, 540.0);
            let before = t.world_at(a);

            t.wheel_zoom(a, delta, 1.0);
            let after = t.world_at(a);

            prop_assert!((before.0 - after.0).abs() < 1e-6);
            prop_assert!((before.1 - after.1).abs() < 1e-6);
        }
    }
}
