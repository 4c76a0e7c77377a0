//! Interaction state that is never exported: tool, overlay, cursor.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use lifebox_sim::Cell;

/// Default minimum time between cursor notifications (about one frame).
pub const DEFAULT_CURSOR_THROTTLE: Duration = Duration::from_millis(16);

// ============================================================================
// Tools
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Tool {
    #[default]
    Draw,
    Erase,
    Line,
    Rect,
    Circle,
    Oval,
    RandomRect,
    Capture,
    Shapes,
    Select,
}

impl Tool {
    pub const ALL: [Tool; 10] = [
        Tool::Draw,
        Tool::Erase,
        Tool::Line,
        Tool::Rect,
        Tool::Circle,
        Tool::Oval,
        Tool::RandomRect,
        Tool::Capture,
        Tool::Shapes,
        Tool::Select,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draw => "draw",
            Self::Erase => "erase",
            Self::Line => "line",
            Self::Rect => "rect",
            Self::Circle => "circle",
            Self::Oval => "oval",
            Self::RandomRect => "randomRect",
            Self::Capture => "capture",
            Self::Shapes => "shapes",
            Self::Select => "select",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tool `{0}`")]
pub struct UnknownTool(pub String);

impl FromStr for Tool {
    type Err = UnknownTool;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tool::ALL
            .into_iter()
            .find(|tool| tool.as_str() == s)
            .ok_or_else(|| UnknownTool(s.to_string()))
    }
}

// ============================================================================
// Overlays
// ============================================================================

/// Pure-data description of something drawn over the grid. Styling is
/// left to the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Overlay {
    /// A shape's relative cells anchored at `origin`.
    ShapePreview { cells: Vec<Cell>, origin: Option<Cell> },
    /// Absolute cells.
    CellsHighlight { cells: Vec<Cell> },
}

impl Overlay {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ShapePreview { .. } => "shapePreview",
            Self::CellsHighlight { .. } => "cellsHighlight",
        }
    }

    /// Absolute cells covered by the overlay.
    pub fn absolute_cells(&self) -> Vec<Cell> {
        match self {
            Self::ShapePreview { cells, origin } => {
                let origin = origin.unwrap_or_default();
                cells.iter().map(|c| c.offset(origin.x, origin.y)).collect()
            }
            Self::CellsHighlight { cells } => cells.clone(),
        }
    }
}

// ============================================================================
// Cursor
// ============================================================================

/// Drops cursor updates that arrive within `interval` of the last one
/// delivered.
#[derive(Debug, Clone)]
pub struct CursorThrottle {
    interval: Duration,
    position: Option<Cell>,
    last_emit: Option<Instant>,
}

impl Default for CursorThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_CURSOR_THROTTLE)
    }
}

impl CursorThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            position: None,
            last_emit: None,
        }
    }

    pub fn position(&self) -> Option<Cell> {
        self.position
    }

    /// Accept a new position. Returns true if it was stored and should be
    /// announced; unchanged and throttled positions return false.
    pub fn update(&mut self, position: Option<Cell>, now: Instant) -> bool {
        if position == self.position {
            return false;
        }
        if let Some(last) = self.last_emit {
            if now.saturating_duration_since(last) < self.interval {
                return false;
            }
        }
        self.position = position;
        self.last_emit = Some(now);
        true
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_names_roundtrip() {
        for tool in Tool::ALL {
            assert_eq!(tool.as_str().parse::<Tool>(), Ok(tool));
        }
        assert_eq!("lasso".parse::<Tool>(), Err(UnknownTool("lasso".to_string())));
        assert_eq!(Tool::default(), Tool::Draw);
    }

    #[test]
    fn test_overlay_names() {
        let highlight = Overlay::CellsHighlight { cells: vec![] };
        assert_eq!(highlight.as_str(), "cellsHighlight");
        let preview = Overlay::ShapePreview { cells: vec![], origin: None };
        assert_eq!(preview.as_str(), "shapePreview");
    }

    #[test]
    fn test_overlay_absolute_cells() {
        let preview = Overlay::ShapePreview {
            cells: vec![Cell::new(0, 0), Cell::new(1, 2)],
            origin: Some(Cell::new(10, -5)),
        };
        assert_eq!(
            preview.absolute_cells(),
            vec![Cell::new(10, -5), Cell::new(11, -3)]
        );
    }

    #[test]
    fn test_unknown_tool_message() {
        let err = "lasso".parse::<Tool>().unwrap_err();
        assert_eq!(err.to_string(), "unknown tool `lasso`");
    }

    #[test]
    fn test_cursor_throttle() {
        let start = Instant::now();
        let mut throttle = CursorThrottle::default();

        assert!(throttle.update(Some(Cell::new(1, 1)), start));
        // unchanged
        assert!(!throttle.update(Some(Cell::new(1, 1)), start + Duration::from_millis(50)));
        // too soon
        assert!(!throttle.update(Some(Cell::new(2, 1)), start + Duration::from_millis(5)));
        assert_eq!(throttle.position(), Some(Cell::new(1, 1)));

        assert!(throttle.update(Some(Cell::new(2, 1)), start + Duration::from_millis(16)));
        assert!(throttle.update(None, start + Duration::from_millis(40)));
        assert_eq!(throttle.position(), None);
    }
}
