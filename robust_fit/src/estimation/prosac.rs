use log::debug;

use super::subsets::SubsetSelector;
use super::{
    ConsensusProblem, EstimatorCore, InliersData, Method, QualityRankedProblem, RobustEstimator,
    RunProgress, RunSnapshot, adaptive_iterations_for_fraction,
};
use crate::error::{EstimationError, SubsetError};

pub const DEFAULT_ETA0: f64 = 0.05;
pub const DEFAULT_BETA: f64 = 0.01;
pub const DEFAULT_MAX_OUTLIERS_PROPORTION: f64 = 0.8;

/// 95% quantile of the standard normal, used in the non-randomness bound.
const NON_RANDOMNESS_QUANTILE: f64 = 1.645;

/// Progressive sample consensus (Chum & Matas).
///
/// Samples are ranked by a caller-supplied quality score and subsets are
/// drawn from a growing prefix of that ranking, so the early iterations test
/// hypotheses built from the most trustworthy samples. Scoring is the RANSAC
/// inlier count; termination combines the maximality bound over the stopping
/// prefix with a non-randomness check on the inlier count.
pub struct Prosac<P: ConsensusProblem + QualityRankedProblem> {
    core: EstimatorCore<P>,
    eta0: f64,
    beta: f64,
    max_outliers_proportion: f64,
    compute_and_keep_inliers: bool,
    compute_and_keep_residuals: bool,
    best_model: Option<P::Model>,
    best_inliers: Option<InliersData>,
    best_num_inliers: usize,
}

impl<P: ConsensusProblem + QualityRankedProblem> Prosac<P> {
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

    pub fn eta0(&self) -> f64 {
        self.eta0
    }

    /// Probability that a better solution over the stopping prefix exists
    /// but goes unfound; lower values demand more iterations.
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

    /// Prior probability that an incorrect correspondence still passes the
    /// residual threshold.
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

    /// Upper bound on the assumed outlier fraction; budgets the initial
    /// iteration count before any model has been scored.
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
            method: Method::Prosac,
            iteration,
            needed_iterations,
            progress,
            locked: self.core.is_locked(),
        }
    }

    /// Inlier mask over all samples; the mask is always materialized because
    /// the termination update needs it, the keep flags only decide whether it
    /// is retained in the best-model record.
    fn score(
        &self,
        problem: &P,
        model: &P::Model,
        total: usize,
        threshold: f64,
    ) -> (usize, Vec<bool>, Option<Vec<f64>>) {
        let mut mask = vec![false; total];
        let mut residuals = self
            .compute_and_keep_residuals
            .then(|| Vec::with_capacity(total));
        let mut count = 0;
        for (index, slot) in mask.iter_mut().enumerate() {
            let residual = problem.residual(model, index);
            if residual <= threshold {
                *slot = true;
                count += 1;
            }
            if let Some(residuals) = residuals.as_mut() {
                residuals.push(residual);
            }
        }
        (count, mask, residuals)
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
        let mut progress = RunProgress::new(self.core.progress_delta());
        let mut needed = budget;
        let mut iteration = 0usize;

        problem.on_estimate_start(&self.snapshot(0, needed, 0.0));

        while iteration < needed.min(max_iterations) {
            iteration += 1;
            schedule.begin_iteration(iteration);
            schedule.draw(iteration, &mut selector, &mut positions, &mut indices)?;
            candidates.clear();
            problem.estimate_preliminary_solutions(&indices, &mut candidates);
            for model in candidates.drain(..) {
                let (count, mask, residuals) = self.score(problem, &model, total, threshold);
                if count > self.best_num_inliers && count >= subset_size {
                    debug!("prosac: {count}/{total} inliers at iteration {iteration}");
                    needed = schedule.update_termination(&mask, self.eta0, self.beta, max_iterations);
                    self.best_num_inliers = count;
                    self.best_model = Some(model);
                    let kept_mask = self.compute_and_keep_inliers.then_some(mask);
                    self.best_inliers = Some(InliersData::new(kept_mask, residuals, count));
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

impl<P: ConsensusProblem + QualityRankedProblem> Default for Prosac<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: ConsensusProblem + QualityRankedProblem> RobustEstimator for Prosac<P> {
    type Model = P::Model;

    fn method(&self) -> Method {
        Method::Prosac
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

/// The PROSAC sampling schedule: a prefix of the quality-ranked samples that
/// grows from `subset_size` toward the full sample count, together with the
/// stopping-length bookkeeping shared by [`Prosac`] and
/// [`super::promeds::Promeds`].
pub(crate) struct ProsacSchedule {
    total: usize,
    subset_size: usize,
    /// Sample indices ordered by descending quality.
    sorted: Vec<usize>,
    /// Current hypothesis-generation prefix length `n`.
    prefix: usize,
    /// Expected number of fully-contained draws after `T_N` iterations at
    /// the current prefix length (`T_n` in the paper).
    t_n: f64,
    /// Scheduled iteration at which the prefix grows next (`T'_n`).
    t_n_prime: f64,
    /// Termination length `n*` and its inlier count `I_n*`.
    stop_prefix: usize,
    stop_inliers: usize,
}

impl ProsacSchedule {
    pub(crate) fn new(qualities: &[f64], subset_size: usize, initial_budget: usize) -> Self {
        let total = qualities.len();
        let mut sorted: Vec<usize> = (0..total).collect();
        sorted.sort_by(|&a, &b| qualities[b].total_cmp(&qualities[a]));

        let mut t_n = initial_budget as f64;
        for i in 0..subset_size {
            t_n *= (subset_size - i) as f64 / (total - i) as f64;
        }

        Self {
            total,
            subset_size,
            sorted,
            prefix: subset_size,
            t_n,
            t_n_prime: 1.0,
            stop_prefix: total,
            stop_inliers: 0,
        }
    }

    /// Grows the prefix once the scheduled draw count for the current length
    /// is exhausted.
    pub(crate) fn begin_iteration(&mut self, iteration: usize) {
        if iteration as f64 > self.t_n_prime && self.prefix < self.stop_prefix {
            let next = self.t_n * (self.prefix + 1) as f64
                / (self.prefix + 1 - self.subset_size) as f64;
            self.t_n_prime += (next - self.t_n).ceil();
            self.t_n = next;
            self.prefix += 1;
        }
    }

    /// Draws ranked positions for this iteration and maps them back to
    /// sample indices. While the schedule still favours the prefix, the draw
    /// takes `subset_size - 1` positions before the prefix's newest sample
    /// and includes that sample itself; once the prefix covers everything
    /// the draw degrades to plain uniform sampling.
    pub(crate) fn draw(
        &mut self,
        iteration: usize,
        selector: &mut SubsetSelector,
        positions: &mut [usize],
        indices: &mut [usize],
    ) -> Result<(), SubsetError> {
        if self.prefix >= self.total {
            selector.compute_random_subsets(self.subset_size, positions)?;
        } else if (iteration as f64) > self.t_n_prime {
            selector.compute_random_subsets_in_range(
                0,
                self.prefix,
                self.subset_size,
                false,
                positions,
            )?;
        } else {
            selector.compute_random_subsets_in_range(
                0,
                self.prefix,
                self.subset_size,
                true,
                positions,
            )?;
        }
        for (slot, &position) in indices.iter_mut().zip(positions.iter()) {
            *slot = self.sorted[position];
        }
        Ok(())
    }

    /// Re-derives the stopping length after an improved model: among the
    /// prefixes whose inlier count passes the non-randomness bound, pick the
    /// one with the highest inlier density, then return the maximality
    /// iteration bound for it.
    pub(crate) fn update_termination(
        &mut self,
        mask: &[bool],
        eta0: f64,
        beta: f64,
        cap: usize,
    ) -> usize {
        let mut prefix_counts = vec![0usize; self.total + 1];
        let mut running = 0usize;
        for (rank, &sample) in self.sorted.iter().enumerate() {
            if mask[sample] {
                running += 1;
            }
            prefix_counts[rank + 1] = running;
        }

        let mut best_prefix = self.total;
        let mut best_count = running;
        for n in (self.subset_size..self.total).rev() {
            let count = prefix_counts[n];
            if count * best_prefix > best_count * n {
                if count < self.non_randomness_minimum(n, beta) {
                    continue;
                }
                best_prefix = n;
                best_count = count;
            }
        }

        self.stop_prefix = best_prefix;
        self.stop_inliers = best_count;
        let fraction = best_count as f64 / best_prefix as f64;
        adaptive_iterations_for_fraction(fraction, self.subset_size, 1.0 - eta0, cap)
    }

    /// Minimum inlier count for a solution over an `n`-sample prefix to be
    /// considered non-random (normal approximation of the binomial tail).
    fn non_randomness_minimum(&self, n: usize, beta: f64) -> usize {
        let excess = (n - self.subset_size) as f64;
        let mu = beta * excess;
        let sigma = (beta * (1.0 - beta) * excess).sqrt();
        self.subset_size + (mu + NON_RANDOMNESS_QUANTILE * sigma).ceil() as usize
    }

    #[cfg(test)]
    pub(crate) fn prefix(&self) -> usize {
        self.prefix
    }

    #[cfg(test)]
    pub(crate) fn stop_prefix(&self) -> usize {
        self.stop_prefix
    }

    #[cfg(test)]
    pub(crate) fn stop_inliers(&self) -> usize {
        self.stop_inliers
    }
}
