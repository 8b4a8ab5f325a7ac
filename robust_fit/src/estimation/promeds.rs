use log::debug;

use super::lmeds::{DEFAULT_INLIER_FACTOR, DEFAULT_STOP_THRESHOLD, classify_inliers};
use super::prosac::{
    DEFAULT_BETA, DEFAULT_ETA0, DEFAULT_MAX_OUTLIERS_PROPORTION, ProsacSchedule,
};
use super::{
    EstimatorCore, InliersData, Method, QualityRankedProblem, RobustEstimator, RunProgress,
    RunSnapshot, adaptive_iterations_for_fraction, median_in_place,
};
use crate::error::EstimationError;

/// Progressive least median of squares.
///
/// Candidates are drawn with the PROSAC quality-ranked schedule and scored
/// with the LMedS median of squared residuals, so no residual threshold is
/// required. Inlier classification against the robust scale estimate can be
/// switched off entirely, in which case termination rests on the stop
/// threshold and the iteration cap.
pub struct Promeds<P: QualityRankedProblem> {
    core: EstimatorCore<P>,
    eta0: f64,
    beta: f64,
    max_outliers_proportion: f64,
    stop_threshold: f64,
    stop_threshold_enabled: bool,
    use_inlier_thresholds: bool,
    inlier_factor: f64,
    best_model: Option<P::Model>,
    best_inliers: Option<InliersData>,
    best_median: Option<f64>,
}

impl<P: QualityRankedProblem> Promeds<P> {
    pub fn new() -> Self {
        Self::from_core(EstimatorCore::new(None))
    }

    pub fn with_problem(problem: P) -> Self {
        Self::from_core(EstimatorCore::new(Some(problem)))
    }

    fn from_core(core: EstimatorCore<P>) -> Self {
        Self {
            core,
            eta0: DEFAULT_ETA0,
            beta: DEFAULT_BETA,
            max_outliers_proportion: DEFAULT_MAX_OUTLIERS_PROPORTION,
            stop_threshold: DEFAULT_STOP_THRESHOLD,
            stop_threshold_enabled: true,
            use_inlier_thresholds: true,
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

    pub fn eta0(&self) -> f64 {
        self.eta0
    }

    pub fn set_eta0(&mut self, eta0: f64) -> Result<(), EstimationError> {
        self.core.ensure_unlocked()?;
        if !(eta0 > 0.0 && eta0 < 1.0) {
            return Err(EstimationError::OutOfBounds {
                name: "eta0",
                bounds: "(0, 1)",
                value: eta0,
            });
        }
        self.eta0 = eta0;
        Ok(())
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn set_beta(&mut self, beta: f64) -> Result<(), EstimationError> {
        self.core.ensure_unlocked()?;
        if !(beta > 0.0 && beta < 1.0) {
            return Err(EstimationError::OutOfBounds {
                name: "beta",
                bounds: "(0, 1)",
                value: beta,
            });
        }
        self.beta = beta;
        Ok(())
    }

    pub fn max_outliers_proportion(&self) -> f64 {
        self.max_outliers_proportion
    }

    pub fn set_max_outliers_proportion(&mut self, proportion: f64) -> Result<(), EstimationError> {
        self.core.ensure_unlocked()?;
        if !(0.0..=1.0).contains(&proportion) {
            return Err(EstimationError::OutOfBounds {
                name: "max_outliers_proportion",
                bounds: "[0, 1]",
                value: proportion,
            });
        }
        self.max_outliers_proportion = proportion;
        Ok(())
    }

    pub fn stop_threshold(&self) -> f64 {
        self.stop_threshold
    }

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

    pub fn stop_threshold_enabled(&self) -> bool {
        self.stop_threshold_enabled
    }

    /// When disabled the run relies solely on the adaptive bound and the
    /// iteration cap.
    pub fn set_stop_threshold_enabled(&mut self, enabled: bool) -> Result<(), EstimationError> {
        self.core.ensure_unlocked()?;
        self.stop_threshold_enabled = enabled;
        Ok(())
    }

    pub fn use_inlier_thresholds(&self) -> bool {
        self.use_inlier_thresholds
    }

    /// Enables or disables the scale-estimate based inlier classification.
    pub fn set_use_inlier_thresholds(&mut self, enabled: bool) -> Result<(), EstimationError> {
        self.core.ensure_unlocked()?;
        self.use_inlier_thresholds = enabled;
        Ok(())
    }

    pub fn inlier_factor(&self) -> f64 {
        self.inlier_factor
    }

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
            method: Method::Promeds,
            iteration,
            needed_iterations,
            progress,
            locked: self.core.is_locked(),
        }
    }

    fn run(&mut self, problem: &mut P) -> Result<P::Model, EstimationError> {
        let total = problem.total_samples();
        let subset_size = problem.subset_size();
        let qualities = problem.quality_scores();
        if qualities.len() != total {
            return Err(EstimationError::QualityScoresMismatch {
                expected: total,
                actual: qualities.len(),
            });
        }
        let confidence = self.core.confidence();
        let max_iterations = self.core.max_iterations();

        let budget = adaptive_iterations_for_fraction(
            1.0 - self.max_outliers_proportion,
            subset_size,
            confidence,
            max_iterations,
        );
        let mut schedule = ProsacSchedule::new(&qualities, subset_size, budget);
        let mut selector = self.core.make_selector(total)?;
        let mut positions = vec![0usize; subset_size];
        let mut indices = vec![0usize; subset_size];
        let mut candidates: Vec<P::Model> = Vec::new();
        let mut residuals = vec![0.0; total];
        let mut scratch = vec![0.0; total];
        let mut progress = RunProgress::new(self.core.progress_delta());
        let mut needed = budget;
        let mut iteration = 0usize;

        problem.on_estimate_start(&self.snapshot(0, needed, 0.0));

        'outer: while iteration < needed.min(max_iterations) {
            iteration += 1;
            schedule.begin_iteration(iteration);
            schedule.draw(iteration, &mut selector, &mut positions, &mut indices)?;
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
                    debug!("promeds: median {median:.6e} at iteration {iteration}");
                    self.best_median = Some(median);
                    if self.use_inlier_thresholds {
                        let (mask, count) = classify_inliers(
                            &residuals,
                            median,
                            total,
                            subset_size,
                            self.inlier_factor,
                        );
                        needed =
                            schedule.update_termination(&mask, self.eta0, self.beta, max_iterations);
                        self.best_inliers =
                            Some(InliersData::new(Some(mask), Some(residuals.clone()), count));
                    } else {
                        self.best_inliers =
                            Some(InliersData::new(None, Some(residuals.clone()), 0));
                    }
                    self.best_model = Some(model);
                }
                if self.stop_threshold_enabled
                    && self
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

impl<P: QualityRankedProblem> Default for Promeds<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: QualityRankedProblem> RobustEstimator for Promeds<P> {
    type Model = P::Model;

    fn method(&self) -> Method {
        Method::Promeds
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
