//! Cell geometry for the drawing tools and shape rotation.
//!
//! Every function returns a sorted, duplicate-free list of absolute cells.
//! Corner arguments may be given in any order.

use std::collections::BTreeSet;
use std::f64::consts::TAU;

use lifebox_sim::{Cell, Coord};
use rand::Rng;

use crate::ui::Tool;

/// Chance that a cell inside a random rectangle is made alive.
pub const DEFAULT_RANDOM_FILL: f64 = 0.5;

/// Parameter step used when tracing an ellipse outline.
const ELLIPSE_STEP: f64 = 0.01;

fn ordered(a: Cell, b: Cell) -> (Cell, Cell) {
    (
        Cell::new(a.x.min(b.x), a.y.min(b.y)),
        Cell::new(a.x.max(b.x), a.y.max(b.y)),
    )
}

/// Round half up, so `-0.5` goes to `0` rather than `-1`.
fn round_half_up(v: f64) -> Coord {
    (v + 0.5).floor() as Coord
}

fn radius(r: f64) -> Coord {
    if r.is_finite() { round_half_up(r).max(0) } else { 0 }
}

// ============================================================================
// Lines and rectangles
// ============================================================================

/// Bresenham line including both endpoints.
pub fn line(from: Cell, to: Cell) -> Vec<Cell> {
    let dx = (to.x - from.x).abs();
    let dy = -(to.y - from.y).abs();
    let sx = if from.x < to.x { 1 } else { -1 };
    let sy = if from.y < to.y { 1 } else { -1 };
    let mut err = dx + dy;
    let (mut x, mut y) = (from.x, from.y);

    let mut cells = BTreeSet::new();
    loop {
        cells.insert(Cell::new(x, y));
        if x == to.x && y == to.y {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
    cells.into_iter().collect()
}

/// Outline of the rectangle spanned by two corners.
pub fn rect_perimeter(a: Cell, b: Cell) -> Vec<Cell> {
    let (min, max) = ordered(a, b);
    let mut cells = BTreeSet::new();
    for x in min.x..=max.x {
        cells.insert(Cell::new(x, min.y));
        cells.insert(Cell::new(x, max.y));
    }
    for y in min.y + 1..max.y {
        cells.insert(Cell::new(min.x, y));
        cells.insert(Cell::new(max.x, y));
    }
    cells.into_iter().collect()
}

/// Every cell of the rectangle spanned by two corners.
pub fn rect_region(a: Cell, b: Cell) -> Vec<Cell> {
    let (min, max) = ordered(a, b);
    (min.x..=max.x)
        .flat_map(|x| (min.y..=max.y).map(move |y| Cell::new(x, y)))
        .collect()
}

/// Each cell of the region independently alive with probability `p`.
pub fn random_rect<R: Rng + ?Sized>(a: Cell, b: Cell, p: f64, rng: &mut R) -> Vec<Cell> {
    rect_region(a, b)
        .into_iter()
        .filter(|_| rng.random::<f64>() < p)
        .collect()
}

// ============================================================================
// Circles and ellipses
// ============================================================================

/// Midpoint circle outline around `center`.
pub fn circle_perimeter(center: Cell, r: f64) -> Vec<Cell> {
    let mut x = radius(r);
    let mut y = 0;
    let mut err = 0;
    let mut cells = BTreeSet::new();
    while x >= y {
        for (dx, dy) in [(x, y), (y, x), (-y, x), (-x, y), (-x, -y), (-y, -x), (y, -x), (x, -y)] {
            cells.insert(center.offset(dx, dy));
        }
        y += 1;
        if err <= 0 {
            err += 2 * y + 1;
        } else {
            x -= 1;
            err -= 2 * x + 1;
        }
    }
    cells.into_iter().collect()
}

/// Circle outline fitted to the box spanned by two corners, using the
/// larger half-extent as the radius.
pub fn circle_from_bounds(a: Cell, b: Cell) -> Vec<Cell> {
    let center = Cell::new(
        round_half_up((a.x + b.x) as f64 / 2.0),
        round_half_up((a.y + b.y) as f64 / 2.0),
    );
    let rx = (b.x - a.x).abs() as f64 / 2.0;
    let ry = (b.y - a.y).abs() as f64 / 2.0;
    circle_perimeter(center, rx.max(ry))
}

/// Filled disc around `center`.
pub fn circle_fill(center: Cell, r: f64) -> Vec<Cell> {
    let rr = radius(r);
    (-rr..=rr)
        .flat_map(|dx| (-rr..=rr).map(move |dy| (dx, dy)))
        .filter(|(dx, dy)| dx * dx + dy * dy <= rr * rr)
        .map(|(dx, dy)| center.offset(dx, dy))
        .collect()
}

/// Axis-aligned ellipse outline inscribed in the box spanned by two corners.
pub fn ellipse_perimeter(a: Cell, b: Cell) -> Vec<Cell> {
    let (min, max) = ordered(a, b);
    let rx = (max.x - min.x) as f64 / 2.0;
    let ry = (max.y - min.y) as f64 / 2.0;
    let cx = (min.x + max.x) as f64 / 2.0;
    let cy = (min.y + max.y) as f64 / 2.0;

    let mut cells = BTreeSet::new();
    let mut t = 0.0_f64;
    while t < TAU {
        cells.insert(Cell::new(
            round_half_up(cx + rx * t.cos()),
            round_half_up(cy + ry * t.sin()),
        ));
        t += ELLIPSE_STEP;
    }
    cells.into_iter().collect()
}

// ============================================================================
// Rotation
// ============================================================================

/// Clockwise quarter turns applied to a shape's relative cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    Identity,
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    /// Parse a clockwise angle in degrees. Anything other than 90, 180 or
    /// 270 (mod 360) is no rotation.
    pub fn from_degrees(degrees: i32) -> Self {
        match degrees.rem_euclid(360) {
            90 => Self::Cw90,
            180 => Self::Cw180,
            270 => Self::Cw270,
            _ => Self::Identity,
        }
    }

    pub fn apply(self, cell: Cell) -> Cell {
        let Cell { x, y } = cell;
        match self {
            Self::Identity => cell,
            Self::Cw90 => Cell::new(y, -x),
            Self::Cw180 => Cell::new(-x, -y),
            Self::Cw270 => Cell::new(-y, x),
        }
    }
}

pub fn rotate(cells: &[Cell], rotation: Rotation) -> Vec<Cell> {
    cells.iter().map(|&c| rotation.apply(c)).collect()
}

// ============================================================================
// Tool strokes
// ============================================================================

/// Cells a drag from `from` to `to` writes, and the state it writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stroke {
    pub cells: Vec<Cell>,
    pub alive: bool,
}

/// The stroke a drawing tool produces, or `None` for tools that do not
/// paint cells.
pub fn tool_stroke<R: Rng + ?Sized>(tool: Tool, from: Cell, to: Cell, rng: &mut R) -> Option<Stroke> {
    let (cells, alive) = match tool {
        Tool::Draw | Tool::Line => (line(from, to), true),
        Tool::Erase => (rect_region(from, to), false),
        Tool::Rect => (rect_perimeter(from, to), true),
        Tool::Circle => (circle_from_bounds(from, to), true),
        Tool::Oval => (ellipse_perimeter(from, to), true),
        Tool::RandomRect => (random_rect(from, to, DEFAULT_RANDOM_FILL, rng), true),
        Tool::Capture | Tool::Shapes | Tool::Select => return None,
    };
    Some(Stroke { cells, alive })
}

// ============================================================================
// Tests
// ============================================================================
