//! Population and state-hash history, and the heuristics that judge it.
//!
//! One sample is recorded per applied step call (not per generation when
//! batched). The heuristics only read these samples, never the live grid.
//!
//! # Verdict
//!
//! ```text
//! stable = (population ∧ trend ∧ plateau)
//!        ∨ (periodic ∧ population)
//!        ∨ perfect
//! ```
//!
//! In accelerated mode each sample spans a whole batch, so the window is
//! shrunk and less history is required. Only the population check uses the
//! widened tolerance; trend and plateau keep the requested one.

use std::collections::VecDeque;

use lifebox_sim::StateHash;
use tracing::debug;

use crate::coordinator::EngineMode;

pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;
pub const DEFAULT_WINDOW_SIZE: usize = 50;
pub const MIN_WINDOW_SIZE: usize = 1;
pub const MAX_WINDOW_SIZE: usize = 1000;
pub const DEFAULT_TOLERANCE: f64 = 3.0;
pub const MAX_TOLERANCE: f64 = 1000.0;
pub const DEFAULT_MAX_PERIOD: usize = 30;

/// Largest period tried by the windowed periodic check.
const WINDOW_MAX_PERIOD: usize = 8;
/// Samples needed before `detect_period` looks at all.
const MIN_PERIOD_SAMPLES: usize = 6;
const TREND_MIN_SAMPLES: usize = 10;
const PERFECT_MIN_SAMPLES: usize = 20;
const PERFECT_TAIL: usize = 10;
const PERFECT_MAX_STD_DEV: f64 = 0.1;

// ============================================================================
// Parameters
// ============================================================================

/// Requested window and tolerance, clamped on construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StabilityParams {
    pub window_size: usize,
    pub tolerance: f64,
}

impl Default for StabilityParams {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl StabilityParams {
    /// A non-finite tolerance falls back to the default.
    pub fn new(window_size: usize, tolerance: f64) -> Self {
        let tolerance = if tolerance.is_finite() {
            tolerance.clamp(0.0, MAX_TOLERANCE)
        } else {
            debug!(tolerance, "ignoring non-finite stability tolerance");
            DEFAULT_TOLERANCE
        };
        Self {
            window_size: window_size.clamp(MIN_WINDOW_SIZE, MAX_WINDOW_SIZE),
            tolerance,
        }
    }

    /// Adjust for the stepping mode.
    pub fn effective(&self, mode: EngineMode, batch_size: u64) -> EffectiveParams {
        let window = self.window_size;
        match mode {
            EngineMode::Accelerated => {
                let batch = batch_size as f64;
                let divisor = (batch / 10.0).max(1.0);
                let shrunk = ((window as f64 / divisor).floor() as usize).max(10);
                let window = window.min(shrunk);
                let tolerance = self
                    .tolerance
                    .max(self.tolerance * (batch / 10.0).sqrt().min(2.0));
                EffectiveParams {
                    window,
                    tolerance,
                    base_tolerance: self.tolerance,
                    min_history: window.max(15),
                    plateau_window: window.clamp(5, 15),
                }
            }
            EngineMode::Normal => EffectiveParams {
                window,
                tolerance: self.tolerance,
                base_tolerance: self.tolerance,
                min_history: ((window as f64 * 1.5).ceil() as usize).max(40),
                plateau_window: 15,
            },
        }
    }
}

/// Parameters after the mode adjustment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectiveParams {
    pub window: usize,
    /// Widened in accelerated mode; bounds the population deviation.
    pub tolerance: f64,
    /// The requested tolerance; bounds the trend and plateau checks.
    pub base_tolerance: f64,
    /// Samples required before any verdict other than "not stable".
    pub min_history: usize,
    pub plateau_window: usize,
}

// ============================================================================
// Report
// ============================================================================

/// Each heuristic's verdict, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StabilityReport {
    pub params: EffectiveParams,
    /// False when the history was too short to judge.
    pub enough_history: bool,
    pub std_dev: f64,
    pub population_stable: bool,
    pub trend_stable: bool,
    /// Smallest repeating period of the hash window, 0 if none.
    pub period: usize,
    pub plateau_stable: bool,
    pub perfect: bool,
    pub stable: bool,
}

impl StabilityReport {
    fn insufficient(params: EffectiveParams) -> Self {
        Self {
            params,
            enough_history: false,
            std_dev: 0.0,
            population_stable: false,
            trend_stable: false,
            period: 0,
            plateau_stable: false,
            perfect: false,
            stable: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Extinct,
    StillLife,
    Oscillator { period: usize },
    Unstable,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Extinct => "extinct",
            Self::StillLife => "still-life",
            Self::Oscillator { .. } => "oscillator",
            Self::Unstable => "unstable",
        }
    }
}

// ============================================================================
// Detector
// ============================================================================

/// Bounded population and state-hash history (most recent last).
#[derive(Debug, Clone)]
pub struct StabilityDetector {
    populations: VecDeque<u64>,
    hashes: VecDeque<StateHash>,
    capacity: usize,
}

impl Default for StabilityDetector {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl StabilityDetector {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            populations: VecDeque::with_capacity(capacity),
            hashes: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append one sample, evicting the oldest at capacity.
    pub fn record(&mut self, population: u64, hash: StateHash) {
        if self.populations.len() == self.capacity {
            self.populations.pop_front();
        }
        if self.hashes.len() == self.capacity {
            self.hashes.pop_front();
        }
        self.populations.push_back(population);
        self.hashes.push_back(hash);
    }

    pub fn len(&self) -> usize {
        self.populations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.populations.is_empty()
    }

    pub fn populations(&self) -> Vec<u64> {
        self.populations.iter().copied().collect()
    }

    pub fn hashes(&self) -> Vec<StateHash> {
        self.hashes.iter().copied().collect()
    }

    /// Replace the population history (keeping the most recent samples) and
    /// drop the hash history, which cannot be reconstructed.
    pub fn replace_populations(&mut self, populations: &[u64]) {
        let skip = populations.len().saturating_sub(self.capacity);
        self.populations = populations[skip..].iter().copied().collect();
        self.hashes.clear();
    }

    pub fn clear(&mut self) {
        self.populations.clear();
        self.hashes.clear();
    }

    /// Run every heuristic over the most recent window.
    pub fn report(&self, params: StabilityParams, mode: EngineMode, batch_size: u64) -> StabilityReport {
        let eff = params.effective(mode, batch_size);
        if self.populations.len() < eff.min_history {
            return StabilityReport::insufficient(eff);
        }

        let window = tail(&self.populations, eff.window);
        let hash_window = tail(&self.hashes, eff.window);

        let std_dev = std_dev(&window);
        let population_stable = std_dev <= eff.tolerance;
        let trend_stable = trend_stable(&window, eff.base_tolerance);
        let max_period = WINDOW_MAX_PERIOD.min(hash_window.len() / 3);
        let period = find_period(&hash_window, max_period);
        let plateau_stable = self.plateau_stable(eff);

        let perfect = std_dev <= PERFECT_MAX_STD_DEV
            && window.len() >= PERFECT_MIN_SAMPLES
            && tail_all_equal(&window, PERFECT_TAIL)
            && (period > 0 || plateau_stable);

        let stable = (population_stable && trend_stable && plateau_stable)
            || (period > 0 && population_stable)
            || perfect;

        StabilityReport {
            params: eff,
            enough_history: true,
            std_dev,
            population_stable,
            trend_stable,
            period,
            plateau_stable,
            perfect,
            stable,
        }
    }

    pub fn is_stable(&self, params: StabilityParams, mode: EngineMode, batch_size: u64) -> bool {
        self.report(params, mode, batch_size).stable
    }

    /// Smallest period of the whole hash history, 0 if none.
    pub fn detect_period(&self, max_period: usize) -> usize {
        let len = self.hashes.len();
        if len < MIN_PERIOD_SAMPLES {
            return 0;
        }
        let hashes: Vec<StateHash> = self.hashes.iter().copied().collect();
        find_period(&hashes, max_period.min(len / 3))
    }

    pub fn classify(&self, params: StabilityParams, mode: EngineMode, batch_size: u64) -> Classification {
        if self.populations.back() == Some(&0) {
            return Classification::Extinct;
        }
        let report = self.report(params, mode, batch_size);
        match (report.stable, report.period) {
            (false, _) => Classification::Unstable,
            (true, period) if period > 1 => Classification::Oscillator { period },
            (true, _) => Classification::StillLife,
        }
    }

    fn plateau_stable(&self, eff: EffectiveParams) -> bool {
        if self.populations.len() < eff.plateau_window {
            return false;
        }
        let mut distinct = tail(&self.populations, eff.plateau_window);
        distinct.sort_unstable();
        distinct.dedup();
        match distinct.as_slice() {
            [_] => true,
            [a, b] => (b - a) as f64 <= (eff.base_tolerance * 0.5).max(1.0),
            _ => false,
        }
    }
}

// ============================================================================
// Heuristics
// ============================================================================

fn tail<T: Copy>(samples: &VecDeque<T>, n: usize) -> Vec<T> {
    let skip = samples.len().saturating_sub(n);
    samples.iter().skip(skip).copied().collect()
}

fn mean(values: &[u64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[u64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let avg = mean(values);
    let variance = values
        .iter()
        .map(|&v| {
            let d = v as f64 - avg;
            d * d
        })
        .sum::<f64>()
        / values.len() as f64;
    variance.sqrt()
}

/// Compare the means of the two halves. Short windows pass.
fn trend_stable(window: &[u64], tolerance: f64) -> bool {
    if window.len() < TREND_MIN_SAMPLES {
        return true;
    }
    let (first, second) = window.split_at(window.len() / 2);
    (mean(first) - mean(second)).abs() <= tolerance * 1.5
}

fn tail_all_equal(window: &[u64], n: usize) -> bool {
    if window.len() < n {
        return false;
    }
    let tail = &window[window.len() - n..];
    tail.iter().all(|&v| v == tail[0])
}

/// Smallest `p` in `1..=max_period` such that, going back from the most
/// recent sample, every full cycle of length `p` matches the latest one.
/// At least two full cycles are required.
fn find_period<T: PartialEq>(samples: &[T], max_period: usize) -> usize {
    let len = samples.len();
    (1..=max_period)
        .find(|&p| {
            let cycles = len / p;
            cycles >= 2
                && (0..p).all(|offset| {
                    let latest = &samples[len - 1 - offset];
                    (1..cycles).all(|c| samples[len - 1 - offset - c * p] == *latest)
                })
        })
        .unwrap_or(0)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(populations: &[u64], hashes: &[u64]) -> StabilityDetector {
        let mut detector = StabilityDetector::default();
        for (&p, &h) in populations.iter().zip(hashes) {
            detector.record(p, StateHash::Digest(h));
        }
        detector
    }

    fn constant(n: usize) -> StabilityDetector {
        filled(&vec![4; n], &vec![7; n])
    }

    #[test]
    fn test_params_clamped() {
        let params = StabilityParams::new(0, -5.0);
        assert_eq!(params.window_size, 1);
        assert_eq!(params.tolerance, 0.0);

        let params = StabilityParams::new(5000, f64::NAN);
        assert_eq!(params.window_size, MAX_WINDOW_SIZE);
        assert_eq!(params.tolerance, DEFAULT_TOLERANCE);
    }

    #[test]
    fn test_effective_params_normal() {
        let eff = StabilityParams::default().effective(EngineMode::Normal, 1);
        assert_eq!(eff.window, 50);
        assert_eq!(eff.tolerance, 3.0);
        assert_eq!(eff.min_history, 75);
        assert_eq!(eff.plateau_window, 15);

        let small = StabilityParams::new(10, 3.0).effective(EngineMode::Normal, 1);
        assert_eq!(small.min_history, 40);
    }

    #[test]
    fn test_effective_params_accelerated() {
        let eff = StabilityParams::default().effective(EngineMode::Accelerated, 100);
        assert_eq!(eff.window, 10);
        assert_eq!(eff.tolerance, 6.0);
        assert_eq!(eff.base_tolerance, 3.0);
        assert_eq!(eff.min_history, 15);
        assert_eq!(eff.plateau_window, 10);

        // small batches leave the window alone
        let eff = StabilityParams::default().effective(EngineMode::Accelerated, 5);
        assert_eq!(eff.window, 50);
        assert_eq!(eff.tolerance, 3.0);
        assert_eq!(eff.min_history, 50);
    }

    #[test]
    fn test_short_history_never_stable() {
        let params = StabilityParams::default();
        assert!(!constant(74).is_stable(params, EngineMode::Normal, 1));
        assert!(constant(75).is_stable(params, EngineMode::Normal, 1));

        assert!(!constant(14).is_stable(params, EngineMode::Accelerated, 100));
        assert!(constant(15).is_stable(params, EngineMode::Accelerated, 100));
    }

    #[test]
    fn test_growth_is_unstable() {
        let pops: Vec<u64> = (0..100).collect();
        let hashes: Vec<u64> = (0..100).collect();
        let detector = filled(&pops, &hashes);
        let report = detector.report(StabilityParams::default(), EngineMode::Normal, 1);
        assert!(report.enough_history);
        assert!(!report.population_stable);
        assert!(!report.trend_stable);
        assert_eq!(report.period, 0);
        assert!(!report.stable);
    }

    #[test]
    fn test_oscillator_classified_with_period() {
        let pops = vec![3; 80];
        let hashes: Vec<u64> = (0..80).map(|i| i % 2).collect();
        let detector = filled(&pops, &hashes);

        let classification = detector.classify(StabilityParams::default(), EngineMode::Normal, 1);
        assert_eq!(classification, Classification::Oscillator { period: 2 });
    }

    #[test]
    fn test_still_life_and_extinct() {
        let params = StabilityParams::default();
        assert_eq!(
            constant(80).classify(params, EngineMode::Normal, 1),
            Classification::StillLife
        );

        let mut detector = constant(10);
        detector.record(0, StateHash::Empty);
        assert_eq!(
            detector.classify(params, EngineMode::Normal, 1),
            Classification::Extinct
        );
    }

    #[test]
    fn test_periodic_population_swing_is_stable() {
        // a period-3 oscillator whose population swings more than the plateau allows
        let pops: Vec<u64> = (0..90).map(|i| [10, 12, 14][i % 3]).collect();
        let hashes: Vec<u64> = (0..90).map(|i| (i % 3) as u64).collect();
        let detector = filled(&pops, &hashes);

        let report = detector.report(StabilityParams::default(), EngineMode::Normal, 1);
        assert!(!report.plateau_stable);
        assert_eq!(report.period, 3);
        assert!(report.stable);
    }

    #[test]
    fn test_two_value_plateau() {
        let pops: Vec<u64> = (0..80).map(|i| 20 + (i % 2) as u64).collect();
        let hashes: Vec<u64> = (0..80).collect();
        let report = filled(&pops, &hashes).report(StabilityParams::default(), EngineMode::Normal, 1);
        assert!(report.plateau_stable);
        assert_eq!(report.period, 0);
        assert!(report.stable);
    }

    #[test]
    fn test_detect_period_uses_full_history() {
        let hashes: Vec<u64> = (0..9).map(|i| i % 3).collect();
        let detector = filled(&vec![5; 9], &hashes);
        assert_eq!(detector.detect_period(DEFAULT_MAX_PERIOD), 3);
        assert_eq!(detector.detect_period(2), 0);

        let short = filled(&[1; 5], &[1; 5]);
        assert_eq!(short.detect_period(DEFAULT_MAX_PERIOD), 0);
    }

    #[test]
    fn test_history_capacity() {
        let mut detector = StabilityDetector::new(3);
        for i in 0..5 {
            detector.record(i, StateHash::Digest(i));
        }
        assert_eq!(detector.populations(), vec![2, 3, 4]);
        assert_eq!(detector.hashes().len(), 3);
    }

    #[test]
    fn test_replace_populations_drops_hashes() {
        let mut detector = StabilityDetector::new(4);
        detector.record(1, StateHash::Digest(1));
        detector.replace_populations(&[9, 8, 7, 6, 5]);
        assert_eq!(detector.populations(), vec![8, 7, 6, 5]);
        assert!(detector.hashes().is_empty());
        assert_eq!(detector.detect_period(DEFAULT_MAX_PERIOD), 0);
    }

    #[test]
    fn test_find_period_needs_two_cycles() {
        assert_eq!(find_period(&[1, 2, 1, 2], 2), 2);
        assert_eq!(find_period(&[1, 2, 3], 3), 0);
        assert_eq!(find_period(&[5, 5], 1), 1);
        assert_eq!(find_period::<u8>(&[], 4), 0);
    }

    #[test]
    fn test_accelerated_plateau_keeps_requested_tolerance() {
        // 2 is within the widened tolerance of 6 but above max(1, 3.0 * 0.5)
        let pops: Vec<u64> = [vec![10; 15], vec![12; 5]].concat();
        let hashes: Vec<u64> = (0..20).collect();
        let detector = filled(&pops, &hashes);

        let report = detector.report(StabilityParams::new(50, 3.0), EngineMode::Accelerated, 100);
        assert_eq!(report.params.tolerance, 6.0);
        assert!(report.population_stable);
        assert!(report.trend_stable);
        assert!(!report.plateau_stable);
        assert_eq!(report.period, 0);
        assert!(!report.perfect);
        assert!(!report.stable);
    }

    #[test]
    fn test_accelerated_trend_keeps_requested_tolerance() {
        // half means 10 and 15: a gap of 5 passes 6.0 * 1.5 but not 3.0 * 1.5
        let pops: Vec<u64> = [vec![10; 15], vec![15; 5]].concat();
        let hashes: Vec<u64> = (0..20).collect();
        let report = filled(&pops, &hashes).report(StabilityParams::new(50, 3.0), EngineMode::Accelerated, 100);
        assert!(!report.trend_stable);
        assert!(!report.stable);
    }

    #[test]
    fn test_accelerated_oscillator_with_large_batch() {
        let pops: Vec<u64> = (0..30).map(|i| [8, 11][i % 2]).collect();
        let hashes: Vec<u64> = (0..30).map(|i| (i % 2) as u64).collect();
        let report = filled(&pops, &hashes).report(StabilityParams::new(50, 3.0), EngineMode::Accelerated, 100);
        assert!(!report.plateau_stable);
        assert_eq!(report.period, 2);
        assert!(report.population_stable);
        assert!(report.stable);
    }

    #[test]
    fn test_trend_only_rejection() {
        // a step from 20 to 30 mid-window: std dev 5 passes, the half gap of 10 exceeds 7.5
        let pops: Vec<u64> = [vec![20; 50], vec![30; 25]].concat();
        let hashes: Vec<u64> = (0..75).collect();
        let report = filled(&pops, &hashes).report(StabilityParams::new(50, 5.0), EngineMode::Normal, 1);
        assert!(report.population_stable);
        assert!(report.plateau_stable);
        assert!(!report.trend_stable);
        assert_eq!(report.period, 0);
        assert!(!report.stable);
    }

    #[test]
    fn test_perfect_guard() {
        // one blip in a window of 200 stays under 0.1 std dev; zero tolerance fails the rest
        let pops: Vec<u64> = [vec![7; 150], vec![8], vec![7; 149]].concat();
        let hashes: Vec<u64> = (0..300).collect();
        let report = filled(&pops, &hashes).report(StabilityParams::new(200, 0.0), EngineMode::Normal, 1);
        assert!(report.enough_history);
        assert!(!report.population_stable);
        assert!(report.plateau_stable);
        assert_eq!(report.period, 0);
        assert!(report.perfect);
        assert!(report.stable);
    }
}
