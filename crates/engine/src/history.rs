//! Diff-based undo/redo.
//!
//! Each user action (a drag stroke, a bulk edit, a shape placement) becomes
//! one [`CellDiff`]. Entries are only recorded for cells whose aliveness
//! actually changed, so a diff is always the minimal description of the
//! action and can be replayed in either direction.

use std::collections::VecDeque;

use lifebox_sim::{Cell, LiveCells};

/// Default undo depth.
pub const DEFAULT_MAX_UNDO_DEPTH: usize = 256;

/// One cell's aliveness transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellChange {
    pub cell: Cell,
    pub prev_alive: bool,
    pub new_alive: bool,
}

/// The changes made by one action, in the order they were made.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellDiff {
    changes: Vec<CellChange>,
}

impl CellDiff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transition. No-op transitions are dropped.
    pub fn push(&mut self, change: CellChange) {
        if change.prev_alive != change.new_alive {
            self.changes.push(change);
        }
    }

    pub fn changes(&self) -> &[CellChange] {
        &self.changes
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Restore every cell to its state before the action. Applied in reverse
    /// so a cell touched twice ends at its first `prev_alive`.
    pub fn apply_prev(&self, cells: &mut LiveCells) {
        for change in self.changes.iter().rev() {
            cells.set(change.cell, change.prev_alive);
        }
    }

    /// Re-apply the action.
    pub fn apply_new(&self, cells: &mut LiveCells) {
        for change in &self.changes {
            cells.set(change.cell, change.new_alive);
        }
    }
}

/// Undo and redo stacks plus the diff buffer of the action in progress.
#[derive(Debug)]
pub struct HistoryManager {
    undo: VecDeque<CellDiff>,
    redo: Vec<CellDiff>,
    pending: Option<CellDiff>,
    depth: usize,
    max_depth: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UNDO_DEPTH)
    }
}

impl HistoryManager {
    /// `max_depth` is raised to at least 1.
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            pending: None,
            depth: 0,
            max_depth: max_depth.max(1),
        }
    }

    /// Open an action. Nested calls merge into the outermost action.
    pub fn begin_action(&mut self) {
        if self.depth == 0 {
            self.pending = Some(CellDiff::new());
        }
        self.depth += 1;
    }

    /// Close an action. Returns true if a non-empty diff was committed.
    pub fn end_action(&mut self) -> bool {
        match self.depth {
            0 => false,
            1 => {
                self.depth = 0;
                match self.pending.take() {
                    Some(diff) => self.commit(diff),
                    None => false,
                }
            }
            _ => {
                self.depth -= 1;
                false
            }
        }
    }

    pub fn in_action(&self) -> bool {
        self.depth > 0
    }

    /// Record a transition. Outside an action it becomes its own action.
    pub fn record(&mut self, change: CellChange) {
        match self.pending.as_mut() {
            Some(diff) => diff.push(change),
            None => {
                let mut diff = CellDiff::new();
                diff.push(change);
                self.commit(diff);
            }
        }
    }

    fn commit(&mut self, diff: CellDiff) -> bool {
        if diff.is_empty() {
            return false;
        }
        self.redo.clear();
        if self.undo.len() == self.max_depth {
            self.undo.pop_front();
        }
        self.undo.push_back(diff);
        true
    }

    /// Undo the most recent action. Any open action is closed first.
    pub fn undo(&mut self, cells: &mut LiveCells) -> Option<&CellDiff> {
        self.flush();
        let diff = self.undo.pop_back()?;
        diff.apply_prev(cells);
        self.redo.push(diff);
        self.redo.last()
    }

    /// Redo the most recently undone action. Any open action is closed first.
    pub fn redo(&mut self, cells: &mut LiveCells) -> Option<&CellDiff> {
        self.flush();
        let diff = self.redo.pop()?;
        diff.apply_new(cells);
        self.undo.push_back(diff);
        self.undo.back()
    }

    fn flush(&mut self) {
        if self.depth > 0 {
            self.depth = 1;
            self.end_action();
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }

    /// Drop both stacks and any open action.
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
        self.pending = None;
        self.depth = 0;
    }
}

// ============================================================================
// Tests
// ============================================================================
