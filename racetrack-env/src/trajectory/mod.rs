//! Loop and stagnation detection over recent car positions.
//!
//! Three independent heuristics vote on a bounded position history: the
//! displacement ratio catches wide circles, the spectral peak count catches
//! periodic wiggles, and the autocorrelation peak count catches repeated
//! segments. Any of them firing bumps a decaying `loop_count`, which the
//! environment turns into a penalty and eventually a termination.
//!
//! A window whose displacement ratio is at least `straight_ratio` is never a
//! loop. The periodicity heuristics are not consulted for it: a z-scored
//! straight run is a linear ramp (plus a constant axis when the run is
//! axis-aligned), and a ramp has both a spread spectrum and a wide
//! autocorrelation lobe.

pub mod spectral;

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::constants::{
    LOOP_CORRELATION_GUARD_LAGS, LOOP_CORRELATION_PEAK_LIMIT, LOOP_CORRELATION_THRESHOLD,
    LOOP_DISPLACEMENT_RATIO, LOOP_HISTORY_CAPACITY, LOOP_MIN_SAMPLES, LOOP_SAMPLE_STRIDE,
    LOOP_SCORE_SCALE, LOOP_SPECTRAL_PEAK_LIMIT, LOOP_STAGNATION_LIMIT, LOOP_STRAIGHT_RATIO,
    TRAVEL_EPSILON, ZSCORE_EPSILON,
};
use crate::error::EnvConfigError;
use crate::geometry::Vec2;
use crate::numbers::usize_to_f64;
use spectral::{autocorrelation_full, dft_magnitudes, zscore};

/// Tuning for [`LoopDetector`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopDetectorConfig {
    #[serde(default = "LoopDetectorConfig::default_history_capacity")]
    pub history_capacity: usize,
    /// Record and evaluate once every this many environment steps.
    #[serde(default = "LoopDetectorConfig::default_sample_stride")]
    pub sample_stride: u32,
    #[serde(default = "LoopDetectorConfig::default_min_samples")]
    pub min_samples: usize,
    #[serde(default = "LoopDetectorConfig::default_displacement_ratio")]
    pub displacement_ratio: f64,
    /// Windows at least this straight skip the periodicity heuristics.
    /// Values above 1.0 turn the guard off.
    #[serde(default = "LoopDetectorConfig::default_straight_ratio")]
    pub straight_ratio: f64,
    #[serde(default = "LoopDetectorConfig::default_spectral_enabled")]
    pub spectral_enabled: bool,
    #[serde(default = "LoopDetectorConfig::default_spectral_peak_limit")]
    pub spectral_peak_limit: usize,
    #[serde(default = "LoopDetectorConfig::default_correlation_threshold")]
    pub correlation_threshold: f64,
    #[serde(default = "LoopDetectorConfig::default_correlation_peak_limit")]
    pub correlation_peak_limit: usize,
    #[serde(default = "LoopDetectorConfig::default_correlation_guard_lags")]
    pub correlation_guard_lags: usize,
    /// `loop_count` at which `loop_score` saturates at 1.0.
    #[serde(default = "LoopDetectorConfig::default_score_scale")]
    pub score_scale: f64,
    /// Episodes end once `loop_count` exceeds this.
    #[serde(default = "LoopDetectorConfig::default_stagnation_limit")]
    pub stagnation_limit: u32,
}

impl LoopDetectorConfig {
    const fn default_history_capacity() -> usize {
        LOOP_HISTORY_CAPACITY
    }

    const fn default_sample_stride() -> u32 {
        LOOP_SAMPLE_STRIDE
    }

    const fn default_min_samples() -> usize {
        LOOP_MIN_SAMPLES
    }

    const fn default_displacement_ratio() -> f64 {
        LOOP_DISPLACEMENT_RATIO
    }

    const fn default_straight_ratio() -> f64 {
        LOOP_STRAIGHT_RATIO
    }

    const fn default_spectral_enabled() -> bool {
        true
    }

    const fn default_spectral_peak_limit() -> usize {
        LOOP_SPECTRAL_PEAK_LIMIT
    }

    const fn default_correlation_threshold() -> f64 {
        LOOP_CORRELATION_THRESHOLD
    }

    const fn default_correlation_peak_limit() -> usize {
        LOOP_CORRELATION_PEAK_LIMIT
    }

    const fn default_correlation_guard_lags() -> usize {
        LOOP_CORRELATION_GUARD_LAGS
    }

    const fn default_score_scale() -> f64 {
        LOOP_SCORE_SCALE
    }

    const fn default_stagnation_limit() -> u32 {
        LOOP_STAGNATION_LIMIT
    }

    /// # Errors
    ///
    /// Returns `EnvConfigError` when a bound is unusable.
    pub fn validate(&self) -> Result<(), EnvConfigError> {
        if self.history_capacity < 2 {
            return Err(EnvConfigError::MinViolation {
                field: "loop_detector.history_capacity",
                min: 2.0,
                value: usize_to_f64(self.history_capacity),
            });
        }
        if self.sample_stride == 0 {
            return Err(EnvConfigError::MinViolation {
                field: "loop_detector.sample_stride",
                min: 1.0,
                value: 0.0,
            });
        }
        if !(2..=self.history_capacity).contains(&self.min_samples) {
            return Err(EnvConfigError::RangeViolation {
                field: "loop_detector.min_samples",
                min: 2.0,
                max: usize_to_f64(self.history_capacity),
                value: usize_to_f64(self.min_samples),
            });
        }
        for (field, value) in [
            ("loop_detector.displacement_ratio", self.displacement_ratio),
            ("loop_detector.correlation_threshold", self.correlation_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(EnvConfigError::RangeViolation {
                    field,
                    min: 0.0,
                    max: 1.0,
                    value,
                });
            }
        }
        if !self.straight_ratio.is_finite() || self.straight_ratio <= self.displacement_ratio {
            return Err(EnvConfigError::MinViolation {
                field: "loop_detector.straight_ratio",
                min: self.displacement_ratio,
                value: self.straight_ratio,
            });
        }
        if !self.score_scale.is_finite() || self.score_scale <= 0.0 {
            return Err(EnvConfigError::MinViolation {
                field: "loop_detector.score_scale",
                min: 1.0,
                value: self.score_scale,
            });
        }
        Ok(())
    }

    /// Fewest environment steps after which an uninterrupted loop can end an
    /// episode: `min_samples` samples before the first verdict, then
    /// `stagnation_limit + 1` positive verdicts in a row.
    #[must_use]
    pub fn steps_to_stagnate(&self) -> u64 {
        let samples = u64::try_from(self.min_samples).unwrap_or(u64::MAX);
        samples
            .saturating_add(u64::from(self.stagnation_limit))
            .saturating_mul(u64::from(self.sample_stride.max(1)))
    }
}

impl Default for LoopDetectorConfig {
    fn default() -> Self {
        Self {
            history_capacity: Self::default_history_capacity(),
            sample_stride: Self::default_sample_stride(),
            min_samples: Self::default_min_samples(),
            displacement_ratio: Self::default_displacement_ratio(),
            straight_ratio: Self::default_straight_ratio(),
            spectral_enabled: Self::default_spectral_enabled(),
            spectral_peak_limit: Self::default_spectral_peak_limit(),
            correlation_threshold: Self::default_correlation_threshold(),
            correlation_peak_limit: Self::default_correlation_peak_limit(),
            correlation_guard_lags: Self::default_correlation_guard_lags(),
            score_scale: Self::default_score_scale(),
            stagnation_limit: Self::default_stagnation_limit(),
        }
    }
}

/// Bounded FIFO of recent positions; the oldest sample falls off when full.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryHistory {
    samples: VecDeque<Vec2>,
    capacity: usize,
}

impl TrajectoryHistory {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, point: Vec2) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(point);
    }

    /// Replace the contents with the most recent `capacity` points of `points`.
    pub fn replace_with_tail(&mut self, points: &[Vec2]) {
        self.samples.clear();
        let start = points.len().saturating_sub(self.capacity);
        self.samples.extend(points[start..].iter().copied());
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vec2> {
        self.samples.iter()
    }

    fn axes(&self) -> (Vec<f64>, Vec<f64>) {
        self.samples.iter().map(|p| (p.x, p.y)).unzip()
    }
}

/// Which heuristic flagged a loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopHeuristic {
    DisplacementRatio,
    Spectral,
    Autocorrelation,
}

/// Diagnostics from the most recent evaluation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LoopReport {
    pub samples: usize,
    pub displacement_ratio: Option<f64>,
    pub spectral_peaks: Option<(usize, usize)>,
    pub correlation_peaks: Option<(usize, usize)>,
    pub fired: Option<LoopHeuristic>,
}

impl LoopReport {
    #[must_use]
    pub const fn detected(&self) -> bool {
        self.fired.is_some()
    }
}

/// Multi-heuristic loop detector with a decaying confidence counter.
#[derive(Debug, Clone)]
pub struct LoopDetector {
    config: LoopDetectorConfig,
    history: TrajectoryHistory,
    loop_count: u32,
    last_report: Option<LoopReport>,
}

impl LoopDetector {
    #[must_use]
    pub fn new(config: LoopDetectorConfig) -> Self {
        let history = TrajectoryHistory::new(config.history_capacity);
        Self {
            config,
            history,
            loop_count: 0,
            last_report: None,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &LoopDetectorConfig {
        &self.config
    }

    #[must_use]
    pub const fn history(&self) -> &TrajectoryHistory {
        &self.history
    }

    pub fn record(&mut self, point: Vec2) {
        self.history.push(point);
    }

    /// Record and evaluate on every `sample_stride`-th step.
    ///
    /// Returns `None` on steps that are not sampled.
    pub fn observe(&mut self, step: u32, point: Vec2) -> Option<bool> {
        if step == 0 || step % self.config.sample_stride.max(1) != 0 {
            return None;
        }
        self.record(point);
        Some(self.evaluate())
    }

    /// Replace the history with the tail of `history` and evaluate it.
    pub fn detect(&mut self, history: &[Vec2]) -> bool {
        self.history.replace_with_tail(history);
        self.evaluate()
    }

    /// Run the heuristics over the current history and update `loop_count`.
    pub fn evaluate(&mut self) -> bool {
        let report = self.analyze();
        let detected = report.detected();
        if detected {
            self.loop_count = self.loop_count.saturating_add(1);
            debug!(
                "loop detected by {:?} over {} samples (count {})",
                report.fired, report.samples, self.loop_count
            );
        } else {
            self.loop_count = self.loop_count.saturating_sub(1);
        }
        self.last_report = Some(report);
        detected
    }

    /// Confidence in `[0, 1]`: `loop_count / score_scale`, capped.
    #[must_use]
    pub fn loop_score(&self) -> f64 {
        (f64::from(self.loop_count) / self.config.score_scale).min(1.0)
    }

    #[must_use]
    pub const fn loop_count(&self) -> u32 {
        self.loop_count
    }

    #[must_use]
    pub const fn is_stagnated(&self) -> bool {
        self.loop_count > self.config.stagnation_limit
    }

    #[must_use]
    pub const fn last_report(&self) -> Option<&LoopReport> {
        self.last_report.as_ref()
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.loop_count = 0;
        self.last_report = None;
    }

    fn analyze(&self) -> LoopReport {
        let mut report = LoopReport {
            samples: self.history.len(),
            ..LoopReport::default()
        };
        if self.history.len() < self.config.min_samples {
            return report;
        }

        report.displacement_ratio = self.displacement_ratio();
        if report
            .displacement_ratio
            .is_some_and(|ratio| ratio < self.config.displacement_ratio)
        {
            report.fired = Some(LoopHeuristic::DisplacementRatio);
            return report;
        }
        if report
            .displacement_ratio
            .is_some_and(|ratio| ratio >= self.config.straight_ratio)
        {
            return report;
        }

        let (xs, ys) = self.history.axes();
        let xs = zscore(&xs, ZSCORE_EPSILON);
        let ys = zscore(&ys, ZSCORE_EPSILON);

        if self.config.spectral_enabled {
            let peaks = spectral_peaks(&xs, &ys);
            report.spectral_peaks = Some(peaks);
            if peaks.0 > self.config.spectral_peak_limit || peaks.1 > self.config.spectral_peak_limit
            {
                report.fired = Some(LoopHeuristic::Spectral);
                return report;
            }
        }

        let peaks = (
            self.correlation_peaks(&xs),
            self.correlation_peaks(&ys),
        );
        report.correlation_peaks = Some(peaks);
        let limit = self.config.correlation_peak_limit;
        if peaks.0 > limit || peaks.1 > limit {
            report.fired = Some(LoopHeuristic::Autocorrelation);
        }
        report
    }

    /// Straight-line over travelled distance; `None` when the car barely moved.
    fn displacement_ratio(&self) -> Option<f64> {
        let mut points = self.history.iter();
        let first = *points.next()?;
        let (last, travelled) = points.fold((first, 0.0), |(prev, total), p| (*p, total + prev.distance(*p)));
        if travelled < TRAVEL_EPSILON {
            return None;
        }
        Some(first.distance(last) / travelled)
    }

    /// Secondary peaks over lags `[center - len/4, center - guard)` of the
    /// normalized autocorrelation.
    fn correlation_peaks(&self, series: &[f64]) -> usize {
        let acf = autocorrelation_full(series);
        let peak = acf.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        if peak <= 0.0 || !peak.is_finite() {
            return 0;
        }
        let center = acf.len() / 2;
        let start = center.saturating_sub(acf.len() / 4);
        let end = center.saturating_sub(self.config.correlation_guard_lags);
        if start >= end {
            return 0;
        }
        acf[start..end]
            .iter()
            .filter(|v| (*v / peak).abs() > self.config.correlation_threshold)
            .count()
    }
}

impl Default for LoopDetector {
    fn default() -> Self {
        Self::new(LoopDetectorConfig::default())
    }
}

/// Bins `1..n-1` (exclusive) above half the mean of the two axes' non-DC maxima.
fn spectral_peaks(xs: &[f64], ys: &[f64]) -> (usize, usize) {
    let fx = dft_magnitudes(xs);
    let fy = dft_magnitudes(ys);
    if fx.len() < 3 || fy.len() < 3 {
        return (0, 0);
    }
    let non_dc_max = |mags: &[f64]| mags[1..].iter().copied().fold(0.0_f64, f64::max);
    let threshold = 0.5 * (non_dc_max(&fx) + non_dc_max(&fy)) / 2.0;
    let count = |mags: &[f64]| mags[1..mags.len() - 1].iter().filter(|m| **m > threshold).count();
    (count(&fx), count(&fy))
}
