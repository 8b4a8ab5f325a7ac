use log::debug;

use super::{
    ConsensusProblem, EstimatorCore, InliersData, Method, RobustEstimator, RunProgress,
    RunSnapshot, adaptive_iterations,
};
use crate::error::EstimationError;

/// Random sample consensus.
///
/// Candidate models are scored by how many samples fall within the problem's
/// residual threshold; the model with the largest inlier set wins. The
/// iteration budget shrinks adaptively as better models are found.
pub struct Ransac<P: ConsensusProblem> {
    core: EstimatorCore<P>,
    compute_and_keep_inliers: bool,
    compute_and_keep_residuals: bool,
    best_model: Option<P::Model>,
    best_inliers: Option<InliersData>,
    best_num_inliers: usize,
}

impl<P: ConsensusProblem> Ransac<P> {
    pub fn new() -> Self {
        Self::from_core(EstimatorCore::new(None))
    }

    pub fn with_problem(problem: P) -> Self {
        Self::from_core(EstimatorCore::new(Some(problem)))
    }

    fn from_core(core: EstimatorCore<P>) -> Self {
        Self {
            core,
            compute_and_keep_inliers: false,
            compute_and_keep_residuals: false,
            best_model: None,
            best_inliers: None,
            best_num_inliers: 0,
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

    pub fn compute_and_keep_inliers(&self) -> bool {
        self.compute_and_keep_inliers
    }

    pub fn set_compute_and_keep_inliers(&mut self, keep: bool) -> Result<(), EstimationError> {
        self.core.ensure_unlocked()?;
        self.compute_and_keep_inliers = keep;
        Ok(())
    }

    pub fn compute_and_keep_residuals(&self) -> bool {
        self.compute_and_keep_residuals
    }

    pub fn set_compute_and_keep_residuals(&mut self, keep: bool) -> Result<(), EstimationError> {
        self.core.ensure_unlocked()?;
        self.compute_and_keep_residuals = keep;
        Ok(())
    }

    /// Best model of the most recent successful run.
    pub fn best_result(&self) -> Option<&P::Model> {
        self.best_model.as_ref()
    }

    pub fn best_inliers_data(&self) -> Option<&InliersData> {
        self.best_inliers.as_ref()
    }

    pub fn best_num_inliers(&self) -> usize {
        self.best_num_inliers
    }

    fn snapshot(&self, iteration: usize, needed_iterations: usize, progress: f32) -> RunSnapshot {
        RunSnapshot {
            method: Method::Ransac,
            iteration,
            needed_iterations,
            progress,
            locked: self.core.is_locked(),
        }
    }

    fn score(
        &self,
        problem: &P,
        model: &P::Model,
        total: usize,
        threshold: f64,
    ) -> (usize, InliersData) {
        let mut mask = self.compute_and_keep_inliers.then(|| vec![false; total]);
        let mut residuals = self
            .compute_and_keep_residuals
            .then(|| Vec::with_capacity(total));
        let mut count = 0;
        for index in 0..total {
            let residual = problem.residual(model, index);
            let inlier = residual <= threshold;
            if inlier {
                count += 1;
            }
            if let Some(mask) = mask.as_mut() {
                mask[index] = inlier;
            }
            if let Some(residuals) = residuals.as_mut() {
                residuals.push(residual);
            }
        }
        (count, InliersData::new(mask, residuals, count))
    }

    fn run(&mut self, problem: &mut P) -> Result<P::Model, EstimationError> {
        let total = problem.total_samples();
        let subset_size = problem.subset_size();
        let threshold = problem.residual_threshold();
        if !(threshold > 0.0) {
            return Err(EstimationError::OutOfBounds {
                name: "residual threshold",
                bounds: "(0, inf)",
                value: threshold,
            });
        }
        let confidence = self.core.confidence();
        let max_iterations = self.core.max_iterations();

        let mut selector = self.core.make_selector(total)?;
        let mut indices = vec![0usize; subset_size];
        let mut candidates: Vec<P::Model> = Vec::new();
        let mut progress = RunProgress::new(self.core.progress_delta());
        let mut needed = max_iterations;
        let mut iteration = 0usize;

        problem.on_estimate_start(&self.snapshot(0, needed, 0.0));

        while iteration < needed.min(max_iterations) {
            iteration += 1;
            selector.compute_random_subsets(subset_size, &mut indices)?;
            candidates.clear();
            problem.estimate_preliminary_solutions(&indices, &mut candidates);
            for model in candidates.drain(..) {
                let (count, inliers) = self.score(problem, &model, total, threshold);
                if count > self.best_num_inliers && count >= subset_size {
                    debug!("ransac: {count}/{total} inliers at iteration {iteration}");
                    self.best_num_inliers = count;
                    self.best_model = Some(model);
                    self.best_inliers = Some(inliers);
                    needed = adaptive_iterations(count, total, subset_size, confidence, max_iterations);
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

impl<P: ConsensusProblem> Default for Ransac<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: ConsensusProblem> RobustEstimator for Ransac<P> {
    type Model = P::Model;

    fn method(&self) -> Method {
        Method::Ransac
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
        self.best_num_inliers = 0;

        self.core.lock();
        let outcome = self.run(&mut problem);
        self.core.unlock();
        self.core.problem = Some(problem);
        outcome
    }
}
