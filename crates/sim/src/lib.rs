//! Lifebox Simulation Core
//!
//! This crate contains the sparse live-cell set and the direct Game of Life
//! step engine. It is the source of truth for which cells are alive.
//!
//! # Architecture Constraints
//!
//! The Simulation Core MUST NOT:
//! - Perform I/O operations (file, network, etc.)
//! - Read wall-clock time
//! - Use ambient/unseeded randomness
//!
//! Generation counting, history and batching belong to the engine crate;
//! this crate only knows how to turn one live-cell set into the next.

#![deny(unsafe_code)]

use std::collections::{HashMap, HashSet};
use std::fmt;

// ============================================================================
// Type Aliases
// ============================================================================

/// Integer grid coordinate. The grid is unbounded in both directions.
pub type Coord = i64;

/// Number of generations. Only ever increases.
pub type Generation = u64;

// ============================================================================
// Life Rule Constants (B3/S23)
// ============================================================================

/// A dead or live cell with exactly this many live neighbors is alive next.
pub const BIRTH_NEIGHBOR_COUNT: u8 = 3;

/// A live cell with exactly this many live neighbors survives.
pub const SURVIVAL_NEIGHBOR_COUNT: u8 = 2;

/// Moore neighborhood offsets, row-major.
const NEIGHBOR_OFFSETS: [(Coord, Coord); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

// ============================================================================
// Core Types
// ============================================================================

/// A grid coordinate. Used directly as a hash key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Cell {
    pub x: Coord,
    pub y: Coord,
}

impl Cell {
    pub const fn new(x: Coord, y: Coord) -> Self {
        Self { x, y }
    }

    /// The 8 Moore neighbors. Coordinates wrap at the `i64` edges.
    pub fn neighbors(self) -> [Cell; 8] {
        NEIGHBOR_OFFSETS.map(|(dx, dy)| Cell {
            x: self.x.wrapping_add(dx),
            y: self.y.wrapping_add(dy),
        })
    }

    /// Translate by an offset (wrapping).
    pub fn offset(self, dx: Coord, dy: Coord) -> Self {
        Self {
            x: self.x.wrapping_add(dx),
            y: self.y.wrapping_add(dy),
        }
    }
}

impl From<(Coord, Coord)> for Cell {
    fn from((x, y): (Coord, Coord)) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// Inclusive bounding box of the live cells.
///
/// An empty grid reports all-zero bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bounds {
    pub min_x: Coord,
    pub max_x: Coord,
    pub min_y: Coord,
    pub max_y: Coord,
}

impl Bounds {
    pub fn width(&self) -> u64 {
        self.max_x.abs_diff(self.min_x) + 1
    }

    pub fn height(&self) -> u64 {
        self.max_y.abs_diff(self.min_y) + 1
    }

    /// Number of cells covered by the box, saturating.
    pub fn area(&self) -> u64 {
        self.width().saturating_mul(self.height())
    }
}

// ============================================================================
// StateHash
// ============================================================================

/// FNV-1a 64-bit offset basis.
const FNV1A_OFFSET_BASIS: u64 = 0xcbf29ce484222325;

/// FNV-1a 64-bit prime.
const FNV1A_PRIME: u64 = 0x100000001b3;

/// FNV-1a 64-bit hasher for state fingerprints.
#[derive(Debug, Clone)]
struct Fnv1a64 {
    state: u64,
}

impl Fnv1a64 {
    fn new() -> Self {
        Self {
            state: FNV1A_OFFSET_BASIS,
        }
    }

    fn update(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.state ^= u64::from(byte);
            self.state = self.state.wrapping_mul(FNV1A_PRIME);
        }
    }

    fn finish(self) -> u64 {
        self.state
    }
}

/// Order-independent fingerprint of a live-cell set.
///
/// Two sets with the same cells always hash equal regardless of insertion
/// order. Used to detect exact-state repetition (still lifes, oscillators).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateHash {
    /// No live cells.
    Empty,
    /// FNV-1a digest over the row-major sorted coordinates (little-endian).
    Digest(u64),
}

impl StateHash {
    /// Hash an already row-major sorted slice of cells.
    pub fn of_sorted(cells: &[Cell]) -> Self {
        if cells.is_empty() {
            return Self::Empty;
        }
        let mut hasher = Fnv1a64::new();
        for cell in cells {
            hasher.update(&cell.x.to_le_bytes());
            hasher.update(&cell.y.to_le_bytes());
        }
        Self::Digest(hasher.finish())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl fmt::Display for StateHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("empty"),
            Self::Digest(digest) => write!(f, "{digest:016x}"),
        }
    }
}

// ============================================================================
// LiveCells (sparse grid)
// ============================================================================

/// Set of live cells. No neighbor information is stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveCells {
    cells: HashSet<Cell>,
}

impl LiveCells {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cells: HashSet::with_capacity(capacity),
        }
    }

    /// Mark a cell alive. Returns true if it was dead before.
    pub fn insert(&mut self, cell: Cell) -> bool {
        self.cells.insert(cell)
    }

    /// Mark a cell dead. Returns true if it was alive before.
    pub fn remove(&mut self, cell: Cell) -> bool {
        self.cells.remove(&cell)
    }

    /// Set aliveness. Returns true if the cell actually changed.
    pub fn set(&mut self, cell: Cell, alive: bool) -> bool {
        if alive {
            self.insert(cell)
        } else {
            self.remove(cell)
        }
    }

    pub fn contains(&self, cell: Cell) -> bool {
        self.cells.contains(&cell)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Iterate live cells in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = Cell> + '_ {
        self.cells.iter().copied()
    }

    /// Live cells in row-major order (y, then x).
    pub fn sorted(&self) -> Vec<Cell> {
        let mut cells: Vec<Cell> = self.cells.iter().copied().collect();
        cells.sort_unstable_by_key(|c| (c.y, c.x));
        cells
    }

    /// Bounding box, or `None` for an empty grid.
    pub fn bounds(&self) -> Option<Bounds> {
        let mut iter = self.cells.iter();
        let first = iter.next()?;
        let init = Bounds {
            min_x: first.x,
            max_x: first.x,
            min_y: first.y,
            max_y: first.y,
        };
        Some(iter.fold(init, |b, c| Bounds {
            min_x: b.min_x.min(c.x),
            max_x: b.max_x.max(c.x),
            min_y: b.min_y.min(c.y),
            max_y: b.max_y.max(c.y),
        }))
    }

    pub fn state_hash(&self) -> StateHash {
        StateHash::of_sorted(&self.sorted())
    }
}

impl FromIterator<Cell> for LiveCells {
    fn from_iter<I: IntoIterator<Item = Cell>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().collect(),
        }
    }
}

impl Extend<Cell> for LiveCells {
    fn extend<I: IntoIterator<Item = Cell>>(&mut self, iter: I) {
        self.cells.extend(iter);
    }
}

// ============================================================================
// Step Engine
// ============================================================================

/// Apply one generation of the B3/S23 rule.
///
/// Every live cell adds one to the tally of each of its 8 neighbors; a cell
/// is alive next iff its tally is 3, or it is alive now and its tally is 2.
/// The input is never mutated.
pub fn step(live: &LiveCells) -> LiveCells {
    let mut neighbor_counts: HashMap<Cell, u8> = HashMap::with_capacity(live.len() * 8);
    for cell in live.iter() {
        for neighbor in cell.neighbors() {
            *neighbor_counts.entry(neighbor).or_insert(0) += 1;
        }
    }

    neighbor_counts
        .into_iter()
        .filter(|&(cell, count)| {
            count == BIRTH_NEIGHBOR_COUNT
                || (count == SURVIVAL_NEIGHBOR_COUNT && live.contains(cell))
        })
        .map(|(cell, _)| cell)
        .collect()
}

/// Apply `generations` steps, stopping early once the grid is empty.
pub fn step_n(live: &LiveCells, generations: Generation) -> LiveCells {
    let mut current = live.clone();
    for _ in 0..generations {
        if current.is_empty() {
            break;
        }
        current = step(&current);
    }
    current
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cells(coords: &[(Coord, Coord)]) -> LiveCells {
        coords.iter().copied().map(Cell::from).collect()
    }

    fn translate(live: &LiveCells, dx: Coord, dy: Coord) -> LiveCells {
        live.iter().map(|c| c.offset(dx, dy)).collect()
    }

    // ========================================================================
    // Rule Tests
    // ========================================================================

    #[test]
    fn test_step_empty_is_empty() {
        let next = step(&LiveCells::new());
        assert!(next.is_empty());
    }

    #[test]
    fn test_horizontal_blinker_scenario() {
        let horizontal = cells(&[(-1, 0), (0, 0), (1, 0)]);
        let vertical = cells(&[(0, -1), (0, 0), (0, 1)]);

        let once = step(&horizontal);
        assert_eq!(once, vertical);

        let twice = step(&once);
        assert_eq!(twice, horizontal);
    }

    #[test]
    fn test_block_is_still_life() {
        let block = cells(&[(0, 0), (1, 0), (0, 1), (1, 1)]);
        assert_eq!(step(&block), block);
    }

    #[test]
    fn test_single_cell_dies() {
        let lone = cells(&[(7, 7)]);
        assert!(step(&lone).is_empty());
    }

    #[test]
    fn test_glider_translates_after_four_generations() {
        let glider = cells(&[(1, 0), (2, 1), (0, 2), (1, 2), (2, 2)]);
        let after = step_n(&glider, 4);
        assert_eq!(after, translate(&glider, 1, 1));
    }

    #[test]
    fn test_step_does_not_mutate_input() {
        let blinker = cells(&[(-1, 0), (0, 0), (1, 0)]);
        let copy = blinker.clone();
        let _ = step(&blinker);
        assert_eq!(blinker, copy);
    }

    #[test]
    fn test_step_n_stops_when_empty() {
        let pair = cells(&[(0, 0), (1, 0)]);
        let result = step_n(&pair, 1_000_000);
        assert!(result.is_empty());
    }

    #[test]
    fn test_step_wraps_at_coordinate_edges() {
        let edge = cells(&[(Coord::MAX, 0), (Coord::MAX, 1), (Coord::MAX, 2)]);
        let next = step(&edge);
        assert_eq!(next.len(), 3);
        assert!(next.contains(Cell::new(Coord::MIN, 1)));
    }

    // ========================================================================
    // LiveCells Tests
    // ========================================================================

    #[test]
    fn test_set_reports_only_real_changes() {
        let mut live = LiveCells::new();
        assert!(live.set(Cell::new(1, 2), true));
        assert!(!live.set(Cell::new(1, 2), true));
        assert_eq!(live.len(), 1);
        assert!(live.set(Cell::new(1, 2), false));
        assert!(!live.set(Cell::new(1, 2), false));
        assert!(live.is_empty());
    }

    #[test]
    fn test_bounds() {
        assert_eq!(LiveCells::new().bounds(), None);

        let live = cells(&[(-3, 4), (5, -2), (0, 0)]);
        let bounds = live.bounds().unwrap();
        assert_eq!(
            bounds,
            Bounds {
                min_x: -3,
                max_x: 5,
                min_y: -2,
                max_y: 4
            }
        );
        assert_eq!(bounds.width(), 9);
        assert_eq!(bounds.height(), 7);
        assert_eq!(bounds.area(), 63);
    }

    #[test]
    fn test_sorted_is_row_major() {
        let live = cells(&[(2, 1), (0, 1), (5, 0)]);
        assert_eq!(
            live.sorted(),
            vec![Cell::new(5, 0), Cell::new(0, 1), Cell::new(2, 1)]
        );
    }

    // ========================================================================
    // StateHash Tests
    // ========================================================================

    #[test]
    fn test_state_hash_empty_sentinel() {
        assert_eq!(LiveCells::new().state_hash(), StateHash::Empty);
        assert_eq!(StateHash::Empty.to_string(), "empty");
    }

    #[test]
    fn test_state_hash_differs_between_phases() {
        let horizontal = cells(&[(-1, 0), (0, 0), (1, 0)]);
        let vertical = step(&horizontal);
        assert_ne!(horizontal.state_hash(), vertical.state_hash());
        assert_eq!(horizontal.state_hash(), step(&vertical).state_hash());
    }

    #[test]
    fn test_state_hash_display_is_hex() {
        let hash = cells(&[(0, 0)]).state_hash();
        let text = hash.to_string();
        assert_eq!(text.len(), 16);
        assert!(text.chars().all(|c| c.is_ascii_hexdigit()));
    }

    // ========================================================================
    // Properties
    // ========================================================================

    proptest! {
        #[test]
        fn prop_blinker_alternates_with_population_three(
            x in -1_000_000i64..1_000_000,
            y in -1_000_000i64..1_000_000,
            generations in 1usize..12,
        ) {
            let horizontal = cells(&[(x - 1, y), (x, y), (x + 1, y)]);
            let vertical = cells(&[(x, y - 1), (x, y), (x, y + 1)]);

            let mut current = horizontal.clone();
            for generation in 1..=generations {
                current = step(&current);
                prop_assert_eq!(current.len(), 3);
                let expected = if generation % 2 == 1 { &vertical } else { &horizontal };
                prop_assert_eq!(&current, expected);
            }
        }

        #[test]
        fn prop_block_is_fixed_point(
            x in -1_000_000i64..1_000_000,
            y in -1_000_000i64..1_000_000,
        ) {
            let block = cells(&[(x, y), (x + 1, y), (x, y + 1), (x + 1, y + 1)]);
            prop_assert_eq!(step(&block), block);
        }

        #[test]
        fn prop_state_hash_ignores_insertion_order(
            coords in proptest::collection::vec((-50i64..50, -50i64..50), 0..64),
        ) {
            let forward: LiveCells = coords.iter().copied().map(Cell::from).collect();
            let backward: LiveCells = coords.iter().rev().copied().map(Cell::from).collect();
            prop_assert_eq!(forward.state_hash(), backward.state_hash());
        }
    }
}
