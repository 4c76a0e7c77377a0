//! Lifebox Engine
//!
//! The simulation and interaction-state engine. A single owning [`Life`]
//! struct holds the live grid and every collaborator; callers only see its
//! setter/query surface.
//!
//! # Architecture
//!
//! - `coordinator`: direct vs. accelerated stepping, batch semantics, fallback
//! - `stability`: population/state-hash history and the stability heuristics
//! - `steady`: until-steady detection (still lifes, oscillators, spaceships, guns)
//! - `history`: per-action cell diffs, undo/redo
//! - `viewport`: pan offset, cell size, anchored zoom
//! - `observer`: state-change events to render loops and UI panels
//! - `performance`: frame/generation caps and accessibility enforcement
//! - `shapes`: tool stroke geometry and shape rotation
//! - `ui`: tool, overlay, cursor and other non-exported state
//!
//! Every mutation runs on `&mut self`, so steps are serialized: a step cannot
//! begin while another is still waiting on the accelerated engine.

#![deny(unsafe_code)]

pub mod coordinator;
pub mod error;
pub mod history;
pub mod observer;
pub mod performance;
pub mod shapes;
pub mod stability;
pub mod steady;
pub mod ui;
pub mod viewport;

use std::collections::HashSet;
use std::time::{Duration, Instant};

use lifebox_persist::{GameState, PersistError};
use lifebox_sim::{Bounds, Cell, Coord, Generation, LiveCells, StateHash};
use tracing::{debug, info};

use coordinator::{AcceleratedEngine, EngineCoordinator, EngineMode, StepOptions, StepOutcome};
use history::{CellChange, HistoryManager};
use observer::{Event, ObserverBus, Subscriber, SubscriberId};
use performance::{PerformanceSettings, PerformanceUpdate};
use rand::Rng;
use shapes::{Rotation, Stroke};
use stability::{Classification, StabilityDetector, StabilityParams, StabilityReport};
use steady::{SteadyConfig, SteadyDetector, SteadyVerdict};
use ui::{CursorThrottle, Overlay, Tool};
use viewport::{PanDirection, ScreenAnchor, Viewport, ViewportConfig, ViewportTransform};

pub use error::EngineError;
pub use lifebox_persist;
pub use lifebox_sim;

// ============================================================================
// Configuration
// ============================================================================

/// Default step limit for `run_until_steady`.
pub const DEFAULT_RUN_UNTIL_MAX_STEPS: u64 = 200;

#[derive(Debug, Clone)]
pub struct LifeConfig {
    /// Population/state-hash samples kept.
    pub history_capacity: usize,
    pub max_undo_depth: usize,
    pub cursor_throttle: Duration,
    pub accessibility_mode: bool,
    pub engine_mode: EngineMode,
    pub generation_batch_size: u64,
    pub viewport: ViewportConfig,
    pub steady: SteadyConfig,
}

impl Default for LifeConfig {
    fn default() -> Self {
        Self {
            history_capacity: stability::DEFAULT_HISTORY_CAPACITY,
            max_undo_depth: history::DEFAULT_MAX_UNDO_DEPTH,
            cursor_throttle: ui::DEFAULT_CURSOR_THROTTLE,
            accessibility_mode: false,
            engine_mode: EngineMode::Normal,
            generation_batch_size: performance::MIN_BATCH_SIZE,
            viewport: ViewportConfig::default(),
            steady: SteadyConfig::default(),
        }
    }
}

// ============================================================================
// Inputs and Results
// ============================================================================

/// One entry of a bulk cell update. Tuples without an aliveness flag mean
/// "make alive".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellUpdate {
    pub cell: Cell,
    pub alive: bool,
}

impl From<(Coord, Coord)> for CellUpdate {
    fn from((x, y): (Coord, Coord)) -> Self {
        Self {
            cell: Cell::new(x, y),
            alive: true,
        }
    }
}

impl From<(Coord, Coord, bool)> for CellUpdate {
    fn from((x, y, alive): (Coord, Coord, bool)) -> Self {
        Self {
            cell: Cell::new(x, y),
            alive,
        }
    }
}

impl From<Cell> for CellUpdate {
    fn from(cell: Cell) -> Self {
        Self { cell, alive: true }
    }
}

/// Result of `run_until_steady`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunUntil {
    /// A previously seen state recurred.
    pub steady: bool,
    /// Step calls made.
    pub steps: u64,
}

// ============================================================================
// Life
// ============================================================================

/// The simulation instance.
#[derive(Debug)]
pub struct Life {
    config: LifeConfig,
    cells: LiveCells,
    generation: Generation,
    samples: StabilityDetector,
    coordinator: EngineCoordinator,
    history: HistoryManager,
    viewport: ViewportTransform,
    bus: ObserverBus,
    performance: PerformanceSettings,
    accessibility_mode: bool,
    running: bool,
    tool: Tool,
    selected_shape: Option<String>,
    overlay: Option<Overlay>,
    color_scheme: Option<String>,
    cursor: CursorThrottle,
}

impl Default for Life {
    fn default() -> Self {
        Self::new(LifeConfig::default())
    }
}

impl Life {
    pub fn new(config: LifeConfig) -> Self {
        let performance =
            PerformanceSettings::default().enforced(config.engine_mode, config.accessibility_mode);
        Self {
            cells: LiveCells::new(),
            generation: 0,
            samples: StabilityDetector::new(config.history_capacity),
            coordinator: EngineCoordinator::new(config.engine_mode, config.generation_batch_size),
            history: HistoryManager::new(config.max_undo_depth),
            viewport: ViewportTransform::new(config.viewport),
            bus: ObserverBus::new(),
            performance,
            accessibility_mode: config.accessibility_mode,
            running: false,
            tool: Tool::default(),
            selected_shape: None,
            overlay: None,
            color_scheme: None,
            cursor: CursorThrottle::new(config.cursor_throttle),
            config,
        }
    }

    pub fn config(&self) -> &LifeConfig {
        &self.config
    }

    // ------------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------------

    pub fn subscribe(&mut self, subscriber: Subscriber) -> SubscriberId {
        self.bus.subscribe(subscriber)
    }

    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        self.bus.unsubscribe(id)
    }

    // ------------------------------------------------------------------------
    // Cell mutation (recorded for undo)
    // ------------------------------------------------------------------------

    /// Change one cell. Returns true if its aliveness changed.
    pub fn set_cell_alive(&mut self, x: Coord, y: Coord, alive: bool) -> bool {
        let cell = Cell::new(x, y);
        if !self.apply(cell, alive) {
            return false;
        }
        self.bus.notify(&Event::CellChanged { cell, alive });
        true
    }

    /// Apply several updates as one undoable action. Returns the number of
    /// cells that changed.
    pub fn set_cells_alive_bulk<I>(&mut self, updates: I) -> usize
    where
        I: IntoIterator,
        I::Item: Into<CellUpdate>,
    {
        self.history.begin_action();
        let mut changes = Vec::new();
        for update in updates {
            let CellUpdate { cell, alive } = update.into();
            if self.apply(cell, alive) {
                changes.push(CellChange {
                    cell,
                    prev_alive: !alive,
                    new_alive: alive,
                });
            }
        }
        self.history.end_action();

        if !changes.is_empty() {
            self.bus.notify(&Event::CellsChangedBulk { changes: &changes });
        }
        changes.len()
    }

    /// Make a pattern's relative cells alive at `(x, y)`, rotated first, as
    /// one undoable action. Returns the number of newly live cells.
    pub fn place_shape(&mut self, x: Coord, y: Coord, pattern: &[Cell], rotation: Rotation) -> usize {
        if pattern.is_empty() {
            return 0;
        }
        let origin = Cell::new(x, y);
        let placed = self.set_cells_alive_bulk(pattern.iter().map(|&c| {
            let c = rotation.apply(c);
            origin.offset(c.x, c.y)
        }));
        self.bus.notify(&Event::ShapePlaced {
            origin,
            cells_placed: placed,
        });
        placed
    }

    /// Paint a drag from `from` to `to` with `tool` as one undoable action.
    /// Returns the number of cells that changed.
    pub fn apply_tool(&mut self, tool: Tool, from: Cell, to: Cell) -> usize {
        self.apply_tool_with(tool, from, to, &mut rand::rng())
    }

    /// As [`Life::apply_tool`], drawing randomness from `rng`.
    pub fn apply_tool_with<R: Rng + ?Sized>(&mut self, tool: Tool, from: Cell, to: Cell, rng: &mut R) -> usize {
        match shapes::tool_stroke(tool, from, to, rng) {
            Some(Stroke { cells, alive }) => {
                self.set_cells_alive_bulk(cells.into_iter().map(|cell| CellUpdate { cell, alive }))
            }
            None => 0,
        }
    }

    fn apply(&mut self, cell: Cell, alive: bool) -> bool {
        if !self.cells.set(cell, alive) {
            return false;
        }
        self.history.record(CellChange {
            cell,
            prev_alive: !alive,
            new_alive: alive,
        });
        true
    }

    /// Open an action (e.g. on pointer down). Nested calls merge.
    pub fn begin_action(&mut self) {
        self.history.begin_action();
    }

    /// Close an action (e.g. on pointer up).
    pub fn end_action(&mut self) -> bool {
        self.history.end_action()
    }

    pub fn undo(&mut self) -> bool {
        match self.history.undo(&mut self.cells) {
            Some(diff) => {
                self.bus.notify(&Event::CellsChangedBulk {
                    changes: diff.changes(),
                });
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.history.redo(&mut self.cells) {
            Some(diff) => {
                self.bus.notify(&Event::CellsChangedBulk {
                    changes: diff.changes(),
                });
                true
            }
            None => false,
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo_depth(&self) -> usize {
        self.history.undo_depth()
    }

    pub fn redo_depth(&self) -> usize {
        self.history.redo_depth()
    }

    // ------------------------------------------------------------------------
    // Stepping
    // ------------------------------------------------------------------------

    /// Advance the simulation.
    ///
    /// `None` (or 1) in accelerated mode runs one batch; see
    /// [`EngineCoordinator::plan`]. One population/hash sample is recorded
    /// and one `gameStep` event emitted per call.
    pub fn step(&mut self, generations: Option<Generation>, options: StepOptions) -> StepOutcome {
        let (next, outcome) = self.coordinator.advance(&self.cells, generations, options);
        self.cells = next;
        self.generation = self.generation.saturating_add(outcome.generations);
        self.samples
            .record(outcome.population as u64, self.cells.state_hash());

        self.bus.notify(&Event::GameStep {
            generation: self.generation,
            population: outcome.population,
            live_cells: &self.cells,
        });
        outcome
    }

    /// Kill every cell (as one undoable action) and reset the generation and
    /// sample history. The viewport is kept.
    pub fn clear(&mut self) {
        let had_cells = !self.cells.is_empty();
        self.history.begin_action();
        for cell in self.cells.sorted() {
            self.apply(cell, false);
        }
        self.history.end_action();

        self.generation = 0;
        self.samples.clear();
        self.coordinator.clear_cache();

        if had_cells {
            self.bus.notify(&Event::GameCleared);
        }
    }

    /// Step one exact generation at a time until the state hash repeats or
    /// `max_steps` (default 200, at least 1) calls have been made.
    pub fn run_until_steady(&mut self, max_steps: Option<u64>) -> RunUntil {
        let max_steps = max_steps.unwrap_or(DEFAULT_RUN_UNTIL_MAX_STEPS).max(1);
        let mut seen: HashSet<StateHash> = HashSet::new();
        let mut steps = 0;

        while steps < max_steps {
            if !seen.insert(self.cells.state_hash()) {
                return RunUntil { steady: true, steps };
            }

            self.step(Some(1), StepOptions::exact());
            steps += 1;

            if seen.contains(&self.cells.state_hash()) {
                return RunUntil { steady: true, steps };
            }
        }
        RunUntil {
            steady: false,
            steps,
        }
    }

    /// Step one exact generation at a time until the steady detector
    /// confirms a pattern class, or `max_steps` is reached.
    pub fn run_until_verdict(&mut self, max_steps: u64) -> Option<SteadyVerdict> {
        let mut detector = SteadyDetector::new(self.config.steady);
        if let Some(verdict) = detector.observe(self.generation, &self.cells) {
            return Some(verdict);
        }
        for _ in 0..max_steps {
            self.step(Some(1), StepOptions::exact());
            if let Some(verdict) = detector.observe(self.generation, &self.cells) {
                debug!(
                    mode = verdict.mode.as_str(),
                    period = verdict.period,
                    generation = verdict.generation,
                    "steady state confirmed"
                );
                return Some(verdict);
            }
        }
        None
    }

    // ------------------------------------------------------------------------
    // Engine and performance
    // ------------------------------------------------------------------------

    pub fn engine_mode(&self) -> EngineMode {
        self.coordinator.mode()
    }

    /// Switch stepping mode. Returning to normal mode re-applies the
    /// accessibility limits when the flag is set.
    pub fn set_engine_mode(&mut self, mode: EngineMode) {
        let previous = self.coordinator.mode();
        if previous == mode {
            return;
        }
        self.coordinator.set_mode(mode);
        info!(from = previous.as_str(), to = mode.as_str(), "engine mode changed");
        self.bus.notify(&Event::EngineModeChanged { mode });

        if mode == EngineMode::Normal {
            self.store_performance(self.performance.enforced(mode, self.accessibility_mode));
        }
    }

    pub fn generation_batch_size(&self) -> u64 {
        self.coordinator.batch_size()
    }

    /// Clamped to `1..=10000`. Returns the size in effect.
    pub fn set_generation_batch_size(&mut self, batch_size: u64) -> u64 {
        self.coordinator.set_batch_size(batch_size);
        self.coordinator.batch_size()
    }

    /// Attach the accelerated engine, returning any previous one.
    pub fn attach_engine(
        &mut self,
        engine: Box<dyn AcceleratedEngine>,
    ) -> Option<Box<dyn AcceleratedEngine>> {
        self.coordinator.attach(engine)
    }

    pub fn detach_engine(&mut self) -> Option<Box<dyn AcceleratedEngine>> {
        self.coordinator.detach()
    }

    pub fn performance_settings(&self) -> PerformanceSettings {
        self.performance
    }

    /// Merge, clamp and enforce a settings write. Returns the settings in
    /// effect.
    pub fn set_performance_settings(&mut self, update: PerformanceUpdate) -> PerformanceSettings {
        let next = self
            .performance
            .merged(update)
            .enforced(self.coordinator.mode(), self.accessibility_mode);
        self.store_performance(next);
        self.performance
    }

    pub fn accessibility_mode(&self) -> bool {
        self.accessibility_mode
    }

    pub fn set_accessibility_mode(&mut self, enabled: bool) {
        self.accessibility_mode = enabled;
        self.store_performance(self.performance.enforced(self.coordinator.mode(), enabled));
    }

    fn store_performance(&mut self, settings: PerformanceSettings) {
        if settings != self.performance {
            self.performance = settings;
            self.bus
                .notify(&Event::PerformanceSettingsChanged { settings });
        }
    }

    // ------------------------------------------------------------------------
    // Viewport
    // ------------------------------------------------------------------------

    pub fn viewport(&self) -> Viewport {
        self.viewport.viewport()
    }

    pub fn viewport_config(&self) -> &ViewportConfig {
        self.viewport.config()
    }

    /// Set offset and optionally cell size and zoom (clamped; non-finite
    /// values ignored). Returns true if anything changed.
    pub fn set_viewport(
        &mut self,
        offset_x: f64,
        offset_y: f64,
        cell_size: Option<f64>,
        zoom: Option<f64>,
    ) -> bool {
        let changed = self.viewport.set(offset_x, offset_y, cell_size, zoom);
        self.viewport_changed(changed)
    }

    pub fn set_cell_size(&mut self, cell_size: f64) -> bool {
        let v = self.viewport.viewport();
        self.set_viewport(v.offset_x, v.offset_y, Some(cell_size), None)
    }

    pub fn set_zoom(&mut self, zoom: f64) -> bool {
        let changed = self.viewport.set_zoom(zoom);
        self.viewport_changed(changed)
    }

    pub fn wheel_zoom(&mut self, anchor: ScreenAnchor, delta_y: f64, device_pixel_ratio: f64) -> bool {
        let changed = self.viewport.wheel_zoom(anchor, delta_y, device_pixel_ratio);
        self.viewport_changed(changed)
    }

    pub fn pinch_zoom(&mut self, anchor: ScreenAnchor, ratio: f64) -> bool {
        let changed = self.viewport.pinch_zoom(anchor, ratio);
        self.viewport_changed(changed)
    }

    pub fn pan(&mut self, dx: f64, dy: f64) -> bool {
        let changed = self.viewport.pan(dx, dy);
        self.viewport_changed(changed)
    }

    pub fn keyboard_pan(&mut self, direction: PanDirection, fast: bool) -> bool {
        let changed = self.viewport.keyboard_pan(direction, fast);
        self.viewport_changed(changed)
    }

    /// The cell under a screen point.
    pub fn cell_at(&self, anchor: ScreenAnchor) -> Cell {
        self.viewport.cell_at(anchor)
    }

    fn viewport_changed(&mut self, changed: bool) -> bool {
        if changed {
            self.bus.notify(&Event::ViewportChanged {
                viewport: self.viewport.viewport(),
            });
        }
        changed
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn is_cell_alive(&self, x: Coord, y: Coord) -> bool {
        self.cells.contains(Cell::new(x, y))
    }

    pub fn live_cells(&self) -> &LiveCells {
        &self.cells
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Bounding box; all zero on an empty grid.
    pub fn bounds(&self) -> Bounds {
        self.cells.bounds().unwrap_or_default()
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Copy of the population history, most recent last.
    pub fn population_history(&self) -> Vec<u64> {
        self.samples.populations()
    }

    pub fn state_hash(&self) -> StateHash {
        self.cells.state_hash()
    }

    pub fn is_stable(&self, window_size: usize, tolerance: f64) -> bool {
        self.stability_report(window_size, tolerance).stable
    }

    pub fn stability_report(&self, window_size: usize, tolerance: f64) -> StabilityReport {
        self.samples.report(
            StabilityParams::new(window_size, tolerance),
            self.coordinator.mode(),
            self.coordinator.batch_size(),
        )
    }

    /// Smallest repeating period of the state-hash history, 0 if none.
    pub fn detect_period(&self, max_period: usize) -> usize {
        self.samples.detect_period(max_period)
    }

    pub fn classify(&self, window_size: usize, tolerance: f64) -> Classification {
        self.samples.classify(
            StabilityParams::new(window_size, tolerance),
            self.coordinator.mode(),
            self.coordinator.batch_size(),
        )
    }

    // ------------------------------------------------------------------------
    // Export / Import
    // ------------------------------------------------------------------------

    /// Cells (row-major), generation, viewport and population history.
    pub fn export_state(&self) -> GameState {
        GameState {
            live_cells: self.cells.sorted(),
            generation: self.generation,
            viewport: self.viewport.viewport().into(),
            population_history: self.samples.populations(),
        }
    }

    /// Replace cells, generation, viewport and population history.
    ///
    /// Undo/redo and the state-hash history are dropped. Viewport values are
    /// clamped like any other write.
    pub fn import_state(&mut self, state: GameState) {
        self.cells = state.live_cells.iter().copied().collect();
        self.generation = state.generation;
        self.samples.replace_populations(&state.population_history);
        self.history.clear();
        self.coordinator.clear_cache();

        let v = state.viewport;
        let viewport_changed = self
            .viewport
            .set(v.offset_x, v.offset_y, Some(v.cell_size), Some(v.zoom));
        self.viewport_changed(viewport_changed);

        debug!(
            cells = self.cells.len(),
            generation = self.generation,
            "imported state"
        );
        self.bus.notify(&Event::StateImported {
            generation: self.generation,
            population: self.cells.len(),
        });
    }

    pub fn export_bytes(&self) -> Vec<u8> {
        lifebox_persist::encode(&self.export_state())
    }

    /// Decode and import a saved game. The engine is untouched on error.
    pub fn import_bytes(&mut self, bytes: &[u8]) -> Result<(), PersistError> {
        let state = lifebox_persist::decode(bytes)?;
        self.import_state(state);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Interaction state (never exported)
    // ------------------------------------------------------------------------

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn set_running(&mut self, running: bool) {
        if self.running != running {
            self.running = running;
            self.bus.notify(&Event::RunningStateChanged { running });
        }
    }

    pub fn selected_tool(&self) -> Tool {
        self.tool
    }

    pub fn set_selected_tool(&mut self, tool: Tool) {
        if self.tool != tool {
            self.tool = tool;
            self.bus.notify(&Event::SelectedToolChanged { tool });
        }
    }

    pub fn selected_shape(&self) -> Option<&str> {
        self.selected_shape.as_deref()
    }

    pub fn set_selected_shape(&mut self, shape: Option<String>) {
        if self.selected_shape != shape {
            self.selected_shape = shape;
            self.bus.notify(&Event::SelectedShapeChanged {
                shape: self.selected_shape.as_deref(),
            });
        }
    }

    pub fn overlay(&self) -> Option<&Overlay> {
        self.overlay.as_ref()
    }

    pub fn set_overlay(&mut self, overlay: Option<Overlay>) {
        if self.overlay != overlay {
            self.overlay = overlay;
            self.bus.notify(&Event::OverlayChanged {
                overlay: self.overlay.as_ref(),
            });
        }
    }

    pub fn color_scheme(&self) -> Option<&str> {
        self.color_scheme.as_deref()
    }

    pub fn set_color_scheme(&mut self, scheme: Option<String>) {
        if self.color_scheme != scheme {
            self.color_scheme = scheme;
            self.bus.notify(&Event::ColorSchemeChanged {
                scheme: self.color_scheme.as_deref(),
            });
        }
    }

    pub fn cursor_position(&self) -> Option<Cell> {
        self.cursor.position()
    }

    /// Update the hovered cell. Changes arriving within the throttle window
    /// of the last notification are dropped.
    pub fn set_cursor_position(&mut self, position: Option<Cell>, now: Instant) -> bool {
        if !self.cursor.update(position, now) {
            return false;
        }
        self.bus.notify(&Event::CursorPositionChanged { position });
        true
    }
}

// ============================================================================
// Tests
// ============================================================================
