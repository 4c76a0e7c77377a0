//! Chooses between direct stepping and an attached accelerated engine.
//!
//! # Decision Rule
//!
//! In accelerated mode, a step request without an explicit count (or with a
//! count of 1) that is not forced to be exact runs one batch of
//! `batch_size` generations on the accelerated engine. Every other request
//! runs `max(1, n)` generations directly. An empty grid never reaches the
//! engine.
//!
//! A failing or malformed accelerated run is logged and the same number of
//! generations is computed directly. It is never surfaced to the caller as
//! an error.
//!
//! Calls are serialized by `&mut self`: a step cannot start while another is
//! still waiting on the engine. A hung engine therefore blocks the next step.

use std::fmt;
use std::str::FromStr;

use lifebox_sim::{Cell, Generation, LiveCells, step_n};
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::performance::{MAX_BATCH_SIZE, MIN_BATCH_SIZE};

// ============================================================================
// Engine Mode
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EngineMode {
    #[default]
    Normal,
    Accelerated,
}

impl EngineMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Accelerated => "hashlife",
        }
    }
}

impl fmt::Display for EngineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" | "default" => Ok(Self::Normal),
            "hashlife" | "accelerated" => Ok(Self::Accelerated),
            other => Err(EngineError::UnknownMode(other.to_string())),
        }
    }
}

// ============================================================================
// Accelerated Engine Boundary
// ============================================================================

/// Result of one accelerated run. `cells: None` is malformed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AcceleratedRun {
    pub cells: Option<Vec<Cell>>,
    pub generations: Generation,
}

/// An external engine able to advance many generations at once.
pub trait AcceleratedEngine {
    fn run(&mut self, cells: &[Cell], generations: Generation) -> Result<AcceleratedRun, EngineError>;

    /// Drop any memoized state. Called when the grid is cleared or replaced.
    fn clear_cache(&mut self) {}
}

// ============================================================================
// Step Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepOptions {
    /// Run exactly the requested count even in accelerated mode.
    pub force_exact_generations: bool,
}

impl StepOptions {
    pub fn exact() -> Self {
        Self {
            force_exact_generations: true,
        }
    }
}

/// What a step request resolves to before any work is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepPlan {
    pub generations: Generation,
    pub batched: bool,
}

/// How a step was computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPath {
    Direct,
    Accelerated,
    /// Accelerated run failed; computed directly instead.
    Fallback,
    /// Grid was already empty; nothing to compute.
    Empty,
}

impl StepPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Accelerated => "accelerated",
            Self::Fallback => "fallback",
            Self::Empty => "empty",
        }
    }
}

/// Summary of one applied step call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOutcome {
    /// Generations the counter advanced by.
    pub generations: Generation,
    pub path: StepPath,
    /// Live cells after the step.
    pub population: usize,
}

// ============================================================================
// Coordinator
// ============================================================================

pub struct EngineCoordinator {
    mode: EngineMode,
    batch_size: Generation,
    engine: Option<Box<dyn AcceleratedEngine>>,
}

impl Default for EngineCoordinator {
    fn default() -> Self {
        Self::new(EngineMode::Normal, MIN_BATCH_SIZE)
    }
}

impl fmt::Debug for EngineCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineCoordinator")
            .field("mode", &self.mode)
            .field("batch_size", &self.batch_size)
            .field("engine_attached", &self.engine.is_some())
            .finish()
    }
}

impl EngineCoordinator {
    pub fn new(mode: EngineMode, batch_size: Generation) -> Self {
        Self {
            mode,
            batch_size: batch_size.clamp(MIN_BATCH_SIZE, MAX_BATCH_SIZE),
            engine: None,
        }
    }

    pub fn mode(&self) -> EngineMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: EngineMode) {
        self.mode = mode;
    }

    pub fn batch_size(&self) -> Generation {
        self.batch_size
    }

    pub fn set_batch_size(&mut self, batch_size: Generation) {
        self.batch_size = batch_size.clamp(MIN_BATCH_SIZE, MAX_BATCH_SIZE);
    }

    /// Attach an engine, returning the previous one.
    pub fn attach(&mut self, engine: Box<dyn AcceleratedEngine>) -> Option<Box<dyn AcceleratedEngine>> {
        self.engine.replace(engine)
    }

    pub fn detach(&mut self) -> Option<Box<dyn AcceleratedEngine>> {
        self.engine.take()
    }

    pub fn has_engine(&self) -> bool {
        self.engine.is_some()
    }

    pub fn clear_cache(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.clear_cache();
        }
    }

    /// Resolve a request into a generation count and path choice.
    pub fn plan(&self, requested: Option<Generation>, options: StepOptions) -> StepPlan {
        let implicit = matches!(requested, None | Some(1));
        if self.mode == EngineMode::Accelerated && !options.force_exact_generations && implicit {
            StepPlan {
                generations: self.batch_size.max(1),
                batched: true,
            }
        } else {
            StepPlan {
                generations: requested.unwrap_or(1).max(1),
                batched: false,
            }
        }
    }

    /// Compute the next grid for a step request.
    pub fn advance(
        &mut self,
        cells: &LiveCells,
        requested: Option<Generation>,
        options: StepOptions,
    ) -> (LiveCells, StepOutcome) {
        let plan = self.plan(requested, options);

        if cells.is_empty() {
            let outcome = StepOutcome {
                generations: plan.generations,
                path: StepPath::Empty,
                population: 0,
            };
            return (LiveCells::new(), outcome);
        }

        if plan.batched {
            match self.run_accelerated(cells, plan.generations) {
                Ok(next) => {
                    let population = next.len();
                    let outcome = StepOutcome {
                        generations: plan.generations,
                        path: StepPath::Accelerated,
                        population,
                    };
                    return (next, outcome);
                }
                Err(error) => {
                    warn!(
                        %error,
                        generations = plan.generations,
                        "accelerated step failed, stepping directly"
                    );
                    let next = step_n(cells, plan.generations);
                    let population = next.len();
                    let outcome = StepOutcome {
                        generations: plan.generations,
                        path: StepPath::Fallback,
                        population,
                    };
                    return (next, outcome);
                }
            }
        }

        let next = step_n(cells, plan.generations);
        let population = next.len();
        (
            next,
            StepOutcome {
                generations: plan.generations,
                path: StepPath::Direct,
                population,
            },
        )
    }

    fn run_accelerated(&mut self, cells: &LiveCells, generations: Generation) -> Result<LiveCells, EngineError> {
        let engine = self.engine.as_mut().ok_or(EngineError::Unavailable)?;
        let input = cells.sorted();
        let run = engine.run(&input, generations)?;
        let result = run.cells.ok_or(EngineError::MalformedResult("missing cells"))?;
        if run.generations != generations {
            debug!(
                requested = generations,
                reported = run.generations,
                "accelerated engine reported a different generation count"
            );
        }
        Ok(result.into_iter().collect())
    }
}

// ============================================================================
// Tests
// ============================================================================
