//! Heuristic detection of a settled pattern while stepping one generation at
//! a time.
//!
//! Each observed generation is summarized by its absolute state hash, the
//! hash of the same shape moved to the origin, and its bounding box. A
//! repeat of the normalized shape is either an exact repeat (still life or
//! oscillator) or a translated one (spaceship). Guns and puffers never
//! repeat; they are recognized by population deltas that repeat for three
//! back-to-back periods while the population or bounding area keeps growing.
//!
//! A candidate must be confirmed several times, each confirmation exactly
//! one expected gap after the previous one, before a verdict is returned.

use std::collections::{HashMap, VecDeque};

use lifebox_sim::{Cell, Coord, Generation, LiveCells, StateHash};

pub const DEFAULT_CONFIRMATIONS: u32 = 3;
pub const DEFAULT_MAX_SHIP_PERIOD: u64 = 512;
pub const DEFAULT_MAX_HISTORY_PER_SHAPE: usize = 4096;
pub const DEFAULT_EMISSION_MIN_HISTORY: usize = 48;
pub const DEFAULT_EMISSION_MAX_PERIOD: usize = 64;
pub const DEFAULT_MIN_GROWTH_PER_PERIOD: i64 = 2;
pub const DEFAULT_MIN_AREA_GROWTH_PER_PERIOD: i64 = 2;

/// Scalar histories never shrink below this many samples.
const MIN_SCALAR_HISTORY: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SteadyConfig {
    pub confirmations: u32,
    pub max_ship_period: u64,
    pub max_history_per_shape: usize,
    pub emission_min_history: usize,
    pub emission_max_period: usize,
    pub min_growth_per_period: i64,
    pub min_area_growth_per_period: i64,
}

impl Default for SteadyConfig {
    fn default() -> Self {
        Self {
            confirmations: DEFAULT_CONFIRMATIONS,
            max_ship_period: DEFAULT_MAX_SHIP_PERIOD,
            max_history_per_shape: DEFAULT_MAX_HISTORY_PER_SHAPE,
            emission_min_history: DEFAULT_EMISSION_MIN_HISTORY,
            emission_max_period: DEFAULT_EMISSION_MAX_PERIOD,
            min_growth_per_period: DEFAULT_MIN_GROWTH_PER_PERIOD,
            min_area_growth_per_period: DEFAULT_MIN_AREA_GROWTH_PER_PERIOD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SteadyMode {
    StillLife,
    Oscillator,
    Spaceship,
    PeriodicEmission,
}

impl SteadyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StillLife => "still-life",
            Self::Oscillator => "oscillator",
            Self::Spaceship => "spaceship",
            Self::PeriodicEmission => "periodic-with-emission",
        }
    }
}

/// A confirmed steady state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SteadyVerdict {
    pub mode: SteadyMode,
    /// Generation at which the verdict was reached.
    pub generation: Generation,
    pub period: u64,
    /// Translation per period (spaceships only).
    pub dx: Coord,
    pub dy: Coord,
    pub confidence: u32,
}

#[derive(Debug, Clone, Copy)]
struct Snapshot {
    generation: Generation,
    population: i64,
    area: i64,
    anchor: Cell,
    absolute: StateHash,
    normalized: StateHash,
}

impl Snapshot {
    fn of(generation: Generation, cells: &LiveCells) -> Self {
        let Some(bounds) = cells.bounds() else {
            return Self {
                generation,
                population: 0,
                area: 0,
                anchor: Cell::default(),
                absolute: StateHash::Empty,
                normalized: StateHash::Empty,
            };
        };
        let sorted = cells.sorted();
        let normalized: Vec<Cell> = sorted
            .iter()
            .map(|c| c.offset(bounds.min_x.wrapping_neg(), bounds.min_y.wrapping_neg()))
            .collect();
        Self {
            generation,
            population: sorted.len() as i64,
            area: i64::try_from(bounds.area()).unwrap_or(i64::MAX),
            anchor: Cell::new(bounds.min_x, bounds.min_y),
            absolute: StateHash::of_sorted(&sorted),
            normalized: StateHash::of_sorted(&normalized),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum CandidateKey {
    Exact { shape: StateHash, period: u64 },
    Ship { shape: StateHash, period: u64, dx: Coord, dy: Coord },
    Emission { period: usize },
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    key: CandidateKey,
    mode: SteadyMode,
    period: u64,
    dx: Coord,
    dy: Coord,
}

impl Candidate {
    /// Shorter period wins; on a tie a non-translating repeat wins.
    fn prefer(current: Option<Self>, next: Self) -> Self {
        match current {
            None => next,
            Some(current) if next.period < current.period => next,
            Some(current) if next.period > current.period => current,
            Some(current)
                if current.mode == SteadyMode::Spaceship && next.mode != SteadyMode::Spaceship =>
            {
                next
            }
            Some(current) => current,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Score {
    score: u32,
    last_generation: Generation,
    expected_gap: u64,
}

#[derive(Debug, Clone)]
pub struct SteadyDetector {
    config: SteadyConfig,
    by_shape: HashMap<StateHash, VecDeque<Snapshot>>,
    scores: HashMap<CandidateKey, Score>,
    populations: VecDeque<i64>,
    areas: VecDeque<i64>,
}

impl Default for SteadyDetector {
    fn default() -> Self {
        Self::new(SteadyConfig::default())
    }
}

impl SteadyDetector {
    pub fn new(config: SteadyConfig) -> Self {
        Self {
            config,
            by_shape: HashMap::new(),
            scores: HashMap::new(),
            populations: VecDeque::new(),
            areas: VecDeque::new(),
        }
    }

    pub fn config(&self) -> &SteadyConfig {
        &self.config
    }

    pub fn reset(&mut self) {
        self.by_shape.clear();
        self.scores.clear();
        self.populations.clear();
        self.areas.clear();
    }

    /// Feed one generation. Returns a verdict once a candidate is confirmed.
    pub fn observe(&mut self, generation: Generation, cells: &LiveCells) -> Option<SteadyVerdict> {
        let snapshot = Snapshot::of(generation, cells);
        let cycle = self.detect_cycle(&snapshot);
        self.store(snapshot);
        cycle.or_else(|| self.detect_emission(generation))
    }

    fn detect_cycle(&mut self, snapshot: &Snapshot) -> Option<SteadyVerdict> {
        let matches = self.by_shape.get(&snapshot.normalized)?;
        let mut best: Option<Candidate> = None;

        for previous in matches.iter().rev() {
            let Some(period) = snapshot.generation.checked_sub(previous.generation) else {
                continue;
            };
            if period == 0 || period > self.config.max_ship_period {
                continue;
            }

            if snapshot.absolute == previous.absolute {
                let mode = if period == 1 {
                    SteadyMode::StillLife
                } else {
                    SteadyMode::Oscillator
                };
                let candidate = Candidate {
                    key: CandidateKey::Exact {
                        shape: snapshot.normalized,
                        period,
                    },
                    mode,
                    period,
                    dx: 0,
                    dy: 0,
                };
                best = Some(Candidate::prefer(best, candidate));
            } else {
                let dx = snapshot.anchor.x.wrapping_sub(previous.anchor.x);
                let dy = snapshot.anchor.y.wrapping_sub(previous.anchor.y);
                if dx == 0 && dy == 0 {
                    continue;
                }
                let candidate = Candidate {
                    key: CandidateKey::Ship {
                        shape: snapshot.normalized,
                        period,
                        dx,
                        dy,
                    },
                    mode: SteadyMode::Spaceship,
                    period,
                    dx,
                    dy,
                };
                best = Some(Candidate::prefer(best, candidate));
            }

            if period == 1 {
                break;
            }
        }

        let best = best?;
        let confidence = self.bump(best.key, snapshot.generation, best.period);
        if confidence < self.config.confirmations {
            return None;
        }
        Some(SteadyVerdict {
            mode: best.mode,
            generation: snapshot.generation,
            period: best.period,
            dx: best.dx,
            dy: best.dy,
            confidence,
        })
    }

    fn detect_emission(&mut self, generation: Generation) -> Option<SteadyVerdict> {
        let n = self.populations.len();
        if n < self.config.emission_min_history {
            return None;
        }
        let max_period = self.config.emission_max_period.min((n - 1) / 3);

        for period in 1..=max_period {
            if !self.deltas_repeat(period) {
                continue;
            }
            let last = n - 1;
            let growth = self.populations[last] - self.populations[last - period];
            let area_growth = self.areas[last] - self.areas[last - period];
            if growth < self.config.min_growth_per_period
                && area_growth < self.config.min_area_growth_per_period
            {
                continue;
            }

            let confidence = self.bump(CandidateKey::Emission { period }, generation, 1);
            if confidence < self.config.confirmations {
                continue;
            }
            return Some(SteadyVerdict {
                mode: SteadyMode::PeriodicEmission,
                generation,
                period: period as u64,
                dx: 0,
                dy: 0,
                confidence,
            });
        }
        None
    }

    /// Population deltas of the last three periods are identical.
    fn deltas_repeat(&self, period: usize) -> bool {
        let n = self.populations.len();
        if n < period * 3 + 1 {
            return false;
        }
        let delta = |back: usize| self.populations[n - 1 - back] - self.populations[n - 2 - back];
        (0..period).all(|i| {
            let d0 = delta(i);
            d0 == delta(period + i) && d0 == delta(2 * period + i)
        })
    }

    /// Raise a candidate's score if it recurs exactly one gap after its last
    /// hit, otherwise restart it at 1.
    fn bump(&mut self, key: CandidateKey, generation: Generation, expected_gap: u64) -> u32 {
        let score = match self.scores.get(&key) {
            Some(current)
                if current.expected_gap == expected_gap
                    && generation.checked_sub(current.last_generation) == Some(expected_gap) =>
            {
                current.score + 1
            }
            _ => 1,
        };
        self.scores.insert(
            key,
            Score {
                score,
                last_generation: generation,
                expected_gap,
            },
        );
        score
    }

    fn store(&mut self, snapshot: Snapshot) {
        let bucket = self.by_shape.entry(snapshot.normalized).or_default();
        bucket.push_back(snapshot);
        if bucket.len() > self.config.max_history_per_shape {
            bucket.pop_front();
        }

        let limit = MIN_SCALAR_HISTORY.max(self.config.max_history_per_shape);
        self.populations.push_back(snapshot.population);
        self.areas.push_back(snapshot.area);
        while self.populations.len() > limit {
            self.populations.pop_front();
        }
        while self.areas.len() > limit {
            self.areas.pop_front();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
