use log::debug;

use super::{
    EstimationProblem, EstimatorCore, InliersData, Method, RobustEstimator, RunProgress,
    RunSnapshot, adaptive_iterations, median_in_place,
};
use crate::error::EstimationError;

pub const DEFAULT_STOP_THRESHOLD: f64 = 1e-3;
pub const DEFAULT_INLIER_FACTOR: f64 = 1.0;

/// Scale factor relating the median of squared residuals to a robust
/// standard-deviation estimate (Rousseeuw & Leroy).
pub(crate) const MEDIAN_TO_SIGMA: f64 = 1.4826;

/// Least median of squares.
///
/// No residual threshold is required: each candidate model is scored by the
/// median of its squared residuals over all samples, lower being better.
/// Inliers are classified a posteriori against a robust scale estimate
/// derived from the best median.
pub struct Lmeds<P: EstimationProblem> {
    core: EstimatorCore<P>,
    stop_threshold: f64,
    inlier_factor: f64,
    best_model: Option<P::Model>,
    best_inliers: Option<InliersData>,
    best_median: Option<f64>,
}

impl<P: EstimationProblem> Lmeds<P> {
    pub fn new() -> Self {
        Self::from_core(EstimatorCore::new(None))
    }

    pub fn with_problem(problem: P) -> Self {
        Self::from_core(EstimatorCore::new(Some(problem)))
    }

    fn from_core(core: EstimatorCore<P>) -> Self {
        Self {
            core,
            stop_threshold: DEFAULT_STOP_THRESHOLD,
            inlier_factor: DEFAULT_INLIER_FACTOR,
            best_model: None,
            best_inliers: None,
            best_median: None,
        }
    }

    pub fn set_problem(&mut self, problem: P) -> Result<(), EstimationError> {
        self.core.set_problem(problem)
    }

    pub fn problem(&self) -> Option<&P> {
        self.core.problem.as_ref()
    }

    pub fn confidence(&self) -> f64 {
        self.core.confidence()
    }

    pub fn set_confidence(&mut self, confidence: f64) -> Result<(), EstimationError> {
        self.core.set_confidence(confidence)
    }

    pub fn max_iterations(&self) -> usize {
        self.core.max_iterations()
    }

    pub fn set_max_iterations(&mut self, max_iterations: usize) -> Result<(), EstimationError> {
        self.core.set_max_iterations(max_iterations)
    }

    pub fn progress_delta(&self) -> f32 {
        self.core.progress_delta()
    }

    pub fn set_progress_delta(&mut self, progress_delta: f32) -> Result<(), EstimationError> {
        self.core.set_progress_delta(progress_delta)
    }

    pub fn subset_seed(&self) -> Option<u64> {
        self.core.subset_seed()
    }

    /// Seeds the subset stream so runs become reproducible.
    pub fn set_subset_seed(&mut self, seed: Option<u64>) -> Result<(), EstimationError> {
        self.core.set_subset_seed(seed)
    }

    pub fn stop_threshold(&self) -> f64 {
        self.stop_threshold
    }

    /// The run terminates early once the best median squared residual drops
    /// to this value or below.
    pub fn set_stop_threshold(&mut self, stop_threshold: f64) -> Result<(), EstimationError> {
        self.core.ensure_unlocked()?;
        if !(stop_threshold >= 0.0) {
            return Err(EstimationError::OutOfBounds {
                name: "stop_threshold",
                bounds: "[0, inf)",
                value: stop_threshold,
            });
        }
        self.stop_threshold = stop_threshold;
        Ok(())
    }

    pub fn inlier_factor(&self) -> f64 {
        self.inlier_factor
    }

    /// Multiplier on the robust scale estimate when classifying inliers.
    pub fn set_inlier_factor(&mut self, inlier_factor: f64) -> Result<(), EstimationError> {
        self.core.ensure_unlocked()?;
        if !(inlier_factor >= 1.0) {
            return Err(EstimationError::OutOfBounds {
                name: "inlier_factor",
                bounds: "[1, inf)",
                value: inlier_factor,
            });
        }
        self.inlier_factor = inlier_factor;
        Ok(())
    }

    pub fn best_result(&self) -> Option<&P::Model> {
        self.best_model.as_ref()
    }

    pub fn best_inliers_data(&self) -> Option<&InliersData> {
        self.best_inliers.as_ref()
    }

    /// Median of squared residuals achieved by the best model.
    pub fn best_median_residual(&self) -> Option<f64> {
        self.best_median
    }

    fn snapshot(&self, iteration: usize, needed_iterations: usize, progress: f32) -> RunSnapshot {
        RunSnapshot {
            method: Method::Lmeds,
            iteration,
            needed_iterations,
            progress,
            locked: self.core.is_locked(),
        }
    }

    fn run(&mut self, problem: &mut P) -> Result<P::Model, EstimationError> {
        let total = problem.total_samples();
        let subset_size = problem.subset_size();
        let confidence = self.core.confidence();
        let max_iterations = self.core.max_iterations();

        let mut selector = self.core.make_selector(total)?;
        let mut indices = vec![0usize; subset_size];
        let mut candidates: Vec<P::Model> = Vec::new();
        let mut residuals = vec![0.0; total];
        let mut scratch = vec![0.0; total];
        let mut progress = RunProgress::new(self.core.progress_delta());
        let mut needed = max_iterations;
        let mut iteration = 0usize;

        problem.on_estimate_start(&self.snapshot(0, needed, 0.0));

        'outer: while iteration < needed.min(max_iterations) {
            iteration += 1;
            selector.compute_random_subsets(subset_size, &mut indices)?;
            candidates.clear();
            problem.estimate_preliminary_solutions(&indices, &mut candidates);
            for model in candidates.drain(..) {
                for (index, slot) in residuals.iter_mut().enumerate() {
                    *slot = problem.residual(&model, index);
                }
                for (squared, &residual) in scratch.iter_mut().zip(&residuals) {
                    *squared = residual * residual;
                }
                let median = median_in_place(&mut scratch);
                if self.best_median.is_none_or(|best| median < best) {
                    let (mask, count) =
                        classify_inliers(&residuals, median, total, subset_size, self.inlier_factor);
                    debug!(
                        "lmeds: median {median:.6e} with {count}/{total} inliers at iteration {iteration}"
                    );
                    self.best_median = Some(median);
                    self.best_model = Some(model);
                    self.best_inliers =
                        Some(InliersData::new(Some(mask), Some(residuals.clone()), count));
                    // retroactive inlier fraction drives the adaptive bound
                    needed = adaptive_iterations(count, total, subset_size, confidence, max_iterations);
                }
                if self
                    .best_median
                    .is_some_and(|best| best <= self.stop_threshold)
                {
                    break 'outer;
                }
            }
            problem.on_estimate_next_iteration(
                &self.snapshot(iteration, needed, progress.current()),
                iteration,
            );
            if let Some(fraction) = progress.advance(iteration, needed.min(max_iterations)) {
                problem.on_estimate_progress_change(
                    &self.snapshot(iteration, needed, fraction),
                    fraction,
                );
            }
        }

        self.core.record_iterations(iteration);
        problem.on_estimate_end(&self.snapshot(iteration, needed, progress.current()));

        match self.best_model.clone() {
            Some(model) => Ok(model),
            None => Err(EstimationError::NoConsensus {
                iterations: iteration,
            }),
        }
    }
}

/// A posteriori inlier classification: `sigma = 1.4826 * (1 + 5/(n - s)) *
/// sqrt(median)`, sample `i` is an inlier iff `r_i <= factor * sigma`.
pub(crate) fn classify_inliers(
    residuals: &[f64],
    median: f64,
    total: usize,
    subset_size: usize,
    inlier_factor: f64,
) -> (Vec<bool>, usize) {
    let excess = (total.saturating_sub(subset_size)).max(1) as f64;
    let sigma = MEDIAN_TO_SIGMA * (1.0 + 5.0 / excess) * median.sqrt();
    let bound = inlier_factor * sigma;
    let mut mask = vec![false; residuals.len()];
    let mut count = 0;
    for (slot, &residual) in mask.iter_mut().zip(residuals) {
        if residual <= bound {
            *slot = true;
            count += 1;
        }
    }
    (mask, count)
}

impl<P: EstimationProblem> Default for Lmeds<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: EstimationProblem> RobustEstimator for Lmeds<P> {
    type Model = P::Model;

    fn method(&self) -> Method {
        Method::Lmeds
    }

    fn is_ready(&self) -> bool {
        self.core.is_ready()
    }

    fn is_locked(&self) -> bool {
        self.core.is_locked()
    }

    fn n_iters(&self) -> usize {
        self.core.n_iters()
    }

    fn estimate(&mut self) -> Result<P::Model, EstimationError> {
        self.core.check_ready()?;
        let mut problem = match self.core.problem.take() {
            Some(problem) => problem,
            None => return Err(EstimationError::NotReady("no estimation problem attached")),
        };
        self.best_model = None;
        self.best_inliers = None;
        self.best_median = None;

        self.core.lock();
        let outcome = self.run(&mut problem);
        self.core.unlock();
        self.core.problem = Some(problem);
        outcome
    }
}
