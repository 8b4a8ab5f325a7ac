//! Robust model estimation on data contaminated by outliers.
//!
//! A caller supplies an [`EstimationProblem`] describing the data: how many
//! samples exist, how many are needed to instantiate a candidate model, how
//! to compute candidate models from a sample subset, and how to measure each
//! sample's residual against a model. The engines in the submodules iterate
//! over random subsets and keep the model with the best consensus score:
//! inlier count ([`ransac::Ransac`]), truncated quadratic loss
//! ([`msac::Msac`]), median of squared residuals ([`lmeds::Lmeds`]), or the
//! quality-ordered variants ([`prosac::Prosac`], [`promeds::Promeds`]).

pub mod lmeds;
pub mod msac;
pub mod promeds;
pub mod prosac;
pub mod ransac;
pub mod subsets;

#[cfg(test)]
mod tests;

use crate::error::{EstimationError, SubsetError};
use self::subsets::SubsetSelector;

pub(crate) const DEFAULT_CONFIDENCE: f64 = 0.99;
pub(crate) const DEFAULT_MAX_ITERATIONS: usize = 5000;
pub(crate) const DEFAULT_PROGRESS_DELTA: f32 = 0.05;

/// Identifies the consensus strategy an estimator implements.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Ransac,
    Msac,
    Lmeds,
    Prosac,
    Promeds,
}

/// Read-only view of a running estimation, handed to listener callbacks.
#[derive(Clone, Copy, Debug)]
pub struct RunSnapshot {
    pub method: Method,
    /// Iterations executed so far.
    pub iteration: usize,
    /// Current estimate of how many iterations the run will take in total.
    pub needed_iterations: usize,
    /// Fraction of the run completed, in `[0, 1]`.
    pub progress: f32,
    /// Whether estimator mutators are currently rejected.
    pub locked: bool,
}

/// The problem listener: everything an engine needs to know about the data
/// being fitted.
///
/// The callback hooks default to no-ops. They fire in the order
/// `start -> (next_iteration, progress_change)* -> end`, always with a
/// snapshot whose `locked` flag is set; the estimator rejects reconfiguration
/// for the whole duration of the run.
pub trait EstimationProblem {
    type Model: Clone;

    fn total_samples(&self) -> usize;

    /// Minimal number of samples required to instantiate a model.
    fn subset_size(&self) -> usize;

    /// Append zero or more candidate models computed from the samples at
    /// `indices`.
    fn estimate_preliminary_solutions(
        &mut self,
        indices: &[usize],
        solutions: &mut Vec<Self::Model>,
    );

    /// Non-negative residual of the sample at `index` against `model`.
    fn residual(&self, model: &Self::Model, index: usize) -> f64;

    /// Pre-flight check; `estimate()` refuses to run while this is false.
    fn is_ready(&self) -> bool {
        true
    }

    fn on_estimate_start(&mut self, _snapshot: &RunSnapshot) {}

    fn on_estimate_end(&mut self, _snapshot: &RunSnapshot) {}

    fn on_estimate_next_iteration(&mut self, _snapshot: &RunSnapshot, _iteration: usize) {}

    fn on_estimate_progress_change(&mut self, _snapshot: &RunSnapshot, _progress: f32) {}
}

/// Problems scored with a fixed residual threshold (RANSAC, MSAC, PROSAC).
pub trait ConsensusProblem: EstimationProblem {
    /// Maximum residual for a sample to count as an inlier. Must be positive.
    fn residual_threshold(&self) -> f64;
}

/// Problems carrying a per-sample prior quality (PROSAC, PROMedS). Higher
/// scores mean the sample is more likely to be an inlier.
pub trait QualityRankedProblem: EstimationProblem {
    /// One score per sample, in sample order.
    fn quality_scores(&self) -> Vec<f64>;
}

/// Common estimator surface shared by all five engines.
pub trait RobustEstimator {
    type Model;

    fn method(&self) -> Method;

    fn is_ready(&self) -> bool;

    fn is_locked(&self) -> bool;

    /// Before a run: the configured iteration cap. After a run: the number
    /// of iterations actually executed, clamped to `[1, max_iterations]`.
    fn n_iters(&self) -> usize;

    fn estimate(&mut self) -> Result<Self::Model, EstimationError>;
}

/// Inlier bookkeeping for the best model an engine has seen.
#[derive(Clone, Debug, Default)]
pub struct InliersData {
    inliers: Option<Vec<bool>>,
    residuals: Option<Vec<f64>>,
    num_inliers: usize,
}

impl InliersData {
    pub(crate) fn new(
        inliers: Option<Vec<bool>>,
        residuals: Option<Vec<f64>>,
        num_inliers: usize,
    ) -> Self {
        Self {
            inliers,
            residuals,
            num_inliers,
        }
    }

    /// Inlier mask over all samples, when the engine was asked to keep it.
    pub fn inliers(&self) -> Option<&[bool]> {
        self.inliers.as_deref()
    }

    /// Per-sample residuals against the best model, when kept.
    pub fn residuals(&self) -> Option<&[f64]> {
        self.residuals.as_deref()
    }

    pub fn num_inliers(&self) -> usize {
        self.num_inliers
    }

    pub fn is_inlier(&self, index: usize) -> bool {
        self.inliers
            .as_ref()
            .is_some_and(|mask| mask.get(index).copied().unwrap_or(false))
    }
}

/// Configuration and run state shared by every engine: the attached problem,
/// the confidence/iteration/progress settings, the reconfiguration lock, and
/// the executed-iteration count backing `n_iters()`.
pub(crate) struct EstimatorCore<P> {
    pub(crate) problem: Option<P>,
    confidence: f64,
    max_iterations: usize,
    progress_delta: f32,
    subset_seed: Option<u64>,
    locked: bool,
    iterations_executed: Option<usize>,
}

impl<P> EstimatorCore<P> {
    pub(crate) fn new(problem: Option<P>) -> Self {
        Self {
            problem,
            confidence: DEFAULT_CONFIDENCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            progress_delta: DEFAULT_PROGRESS_DELTA,
            subset_seed: None,
            locked: false,
            iterations_executed: None,
        }
    }

    pub(crate) fn ensure_unlocked(&self) -> Result<(), EstimationError> {
        if self.locked {
            Err(EstimationError::Locked)
        } else {
            Ok(())
        }
    }

    pub(crate) fn set_problem(&mut self, problem: P) -> Result<(), EstimationError> {
        self.ensure_unlocked()?;
        self.problem = Some(problem);
        Ok(())
    }

    pub(crate) fn confidence(&self) -> f64 {
        self.confidence
    }

    pub(crate) fn set_confidence(&mut self, confidence: f64) -> Result<(), EstimationError> {
        self.ensure_unlocked()?;
        if !(confidence > 0.0 && confidence < 1.0) {
            return Err(EstimationError::OutOfBounds {
                name: "confidence",
                bounds: "(0, 1)",
                value: confidence,
            });
        }
        self.confidence = confidence;
        Ok(())
    }

    pub(crate) fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub(crate) fn set_max_iterations(&mut self, max_iterations: usize) -> Result<(), EstimationError> {
        self.ensure_unlocked()?;
        if max_iterations < 1 {
            return Err(EstimationError::OutOfBounds {
                name: "max_iterations",
                bounds: "[1, inf)",
                value: max_iterations as f64,
            });
        }
        self.max_iterations = max_iterations;
        Ok(())
    }

    pub(crate) fn progress_delta(&self) -> f32 {
        self.progress_delta
    }

    pub(crate) fn set_progress_delta(&mut self, progress_delta: f32) -> Result<(), EstimationError> {
        self.ensure_unlocked()?;
        if !(0.0..=1.0).contains(&progress_delta) {
            return Err(EstimationError::OutOfBounds {
                name: "progress_delta",
                bounds: "[0, 1]",
                value: progress_delta as f64,
            });
        }
        self.progress_delta = progress_delta;
        Ok(())
    }

    pub(crate) fn subset_seed(&self) -> Option<u64> {
        self.subset_seed
    }

    pub(crate) fn set_subset_seed(&mut self, seed: Option<u64>) -> Result<(), EstimationError> {
        self.ensure_unlocked()?;
        self.subset_seed = seed;
        Ok(())
    }

    /// Selector drawing from this estimator's subset stream; seeded when a
    /// subset seed was configured, otherwise fed from the OS.
    pub(crate) fn make_selector(&self, num_samples: usize) -> Result<SubsetSelector, SubsetError> {
        match self.subset_seed {
            Some(seed) => SubsetSelector::with_seed(num_samples, seed),
            None => SubsetSelector::new(num_samples),
        }
    }

    pub(crate) fn is_locked(&self) -> bool {
        self.locked
    }

    pub(crate) fn lock(&mut self) {
        self.locked = true;
    }

    pub(crate) fn unlock(&mut self) {
        self.locked = false;
    }

    pub(crate) fn n_iters(&self) -> usize {
        self.iterations_executed.unwrap_or(self.max_iterations)
    }

    pub(crate) fn record_iterations(&mut self, executed: usize) {
        self.iterations_executed = Some(executed.clamp(1, self.max_iterations));
    }
}

impl<P: EstimationProblem> EstimatorCore<P> {
    /// Everything `estimate()` needs before taking the lock.
    pub(crate) fn check_ready(&self) -> Result<(), EstimationError> {
        let problem = self
            .problem
            .as_ref()
            .ok_or(EstimationError::NotReady("no estimation problem attached"))?;
        if !problem.is_ready() {
            return Err(EstimationError::NotReady(
                "the estimation problem reports it is not ready",
            ));
        }
        let subset_size = problem.subset_size();
        if subset_size < 1 {
            return Err(EstimationError::NotReady("subset size must be at least 1"));
        }
        if problem.total_samples() < subset_size {
            return Err(EstimationError::NotReady(
                "fewer samples than the subset size",
            ));
        }
        Ok(())
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.check_ready().is_ok()
    }
}

/// Progress-change bookkeeping: progress is monotone non-decreasing within
/// `[0, 1]` and a callback is due only once it advanced by at least the
/// configured delta since the previous callback.
pub(crate) struct RunProgress {
    delta: f32,
    current: f32,
    last_reported: f32,
}

impl RunProgress {
    pub(crate) fn new(delta: f32) -> Self {
        Self {
            delta,
            current: 0.0,
            last_reported: 0.0,
        }
    }

    pub(crate) fn advance(&mut self, iteration: usize, needed_iterations: usize) -> Option<f32> {
        let target = needed_iterations.max(1) as f32;
        let raw = (iteration as f32 / target).min(1.0);
        self.current = self.current.max(raw);
        if self.current > self.last_reported && self.current - self.last_reported >= self.delta {
            self.last_reported = self.current;
            return Some(self.current);
        }
        None
    }

    pub(crate) fn current(&self) -> f32 {
        self.current
    }
}

/// Iterations needed to draw at least one outlier-free subset with
/// probability `confidence`, given the observed inlier count.
pub(crate) fn adaptive_iterations(
    num_inliers: usize,
    total_samples: usize,
    subset_size: usize,
    confidence: f64,
    cap: usize,
) -> usize {
    let fraction = num_inliers as f64 / total_samples as f64;
    adaptive_iterations_for_fraction(fraction, subset_size, confidence, cap)
}

/// `ceil(ln(1 - confidence) / ln(1 - w^s))` clamped to `[1, cap]`, with the
/// degenerate fractions resolved as: `w <= 0` never stops early, `w >= 1`
/// stops immediately.
pub(crate) fn adaptive_iterations_for_fraction(
    inlier_fraction: f64,
    subset_size: usize,
    confidence: f64,
    cap: usize,
) -> usize {
    if inlier_fraction <= 0.0 {
        return cap;
    }
    if inlier_fraction >= 1.0 {
        return 1;
    }
    let subset_failure = 1.0 - inlier_fraction.powi(subset_size as i32);
    if subset_failure <= 0.0 {
        return 1;
    }
    let denominator = subset_failure.ln();
    if denominator == 0.0 {
        // w^s underflowed to zero; a good subset is effectively never drawn
        return cap;
    }
    let needed = ((1.0 - confidence).ln() / denominator).ceil();
    if !needed.is_finite() {
        return cap;
    }
    needed.clamp(1.0, cap as f64) as usize
}

/// Median of `values`, sorting the slice in place (stable ascending order).
/// Even-length slices average the two middle elements.
pub(crate) fn median_in_place(values: &mut [f64]) -> f64 {
    debug_assert!(!values.is_empty(), "median of an empty residual set");
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        (values[mid - 1] + values[mid]) / 2.0
    }
}
