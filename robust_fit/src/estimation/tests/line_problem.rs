//! A synthetic 2D line-fitting problem used to exercise every engine: most
//! samples lie exactly on `y = SLOPE * x + INTERCEPT`, the rest are pushed
//! off the line by a uniform offset.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::estimation::{
    ConsensusProblem, EstimationProblem, QualityRankedProblem, RunSnapshot,
};

pub const SLOPE: f64 = 2.0;
pub const INTERCEPT: f64 = 3.0;

#[derive(Clone, Debug, PartialEq)]
pub struct Line {
    pub slope: f64,
    pub intercept: f64,
}

pub struct LineData {
    pub points: Vec<(f64, f64)>,
    pub outliers: Vec<bool>,
    pub qualities: Vec<f64>,
}

pub fn synthetic_line(total: usize, outlier_ratio: f64, seed: u64) -> LineData {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut points = Vec::with_capacity(total);
    let mut outliers = Vec::with_capacity(total);
    let mut qualities = Vec::with_capacity(total);
    for _ in 0..total {
        let x: f64 = rng.random_range(-10.0..10.0);
        let mut y = SLOPE * x + INTERCEPT;
        let mut offset = 0.0;
        let outlier = rng.random_bool(outlier_ratio);
        if outlier {
            offset = rng.random_range(1e-5..1.0);
            y += offset;
        }
        points.push((x, y));
        outliers.push(outlier);
        qualities.push(1.0 / (1.0 + offset));
    }
    LineData {
        points,
        outliers,
        qualities,
    }
}

/// Problem listener fitting a line through two points, recording every
/// callback it receives.
pub struct LineProblem {
    pub points: Vec<(f64, f64)>,
    pub threshold: f64,
    pub qualities: Vec<f64>,
    pub ready: bool,
    pub produce_models: bool,
    pub starts: usize,
    pub ends: usize,
    pub iterations_seen: Vec<usize>,
    pub progress_values: Vec<f32>,
    pub all_snapshots_locked: bool,
}

impl LineProblem {
    pub fn new(points: Vec<(f64, f64)>, threshold: f64) -> Self {
        let qualities = vec![1.0; points.len()];
        Self {
            points,
            threshold,
            qualities,
            ready: true,
            produce_models: true,
            starts: 0,
            ends: 0,
            iterations_seen: Vec::new(),
            progress_values: Vec::new(),
            all_snapshots_locked: true,
        }
    }

    pub fn with_qualities(mut self, qualities: Vec<f64>) -> Self {
        self.qualities = qualities;
        self
    }

    fn record(&mut self, snapshot: &RunSnapshot) {
        self.all_snapshots_locked &= snapshot.locked;
    }
}

impl EstimationProblem for LineProblem {
    type Model = Line;

    fn total_samples(&self) -> usize {
        self.points.len()
    }

    fn subset_size(&self) -> usize {
        2
    }

    fn estimate_preliminary_solutions(&mut self, indices: &[usize], solutions: &mut Vec<Line>) {
        if !self.produce_models {
            return;
        }
        let (x0, y0) = self.points[indices[0]];
        let (x1, y1) = self.points[indices[1]];
        if (x1 - x0).abs() < 1e-12 {
            return;
        }
        let slope = (y1 - y0) / (x1 - x0);
        solutions.push(Line {
            slope,
            intercept: y0 - slope * x0,
        });
    }

    fn residual(&self, model: &Line, index: usize) -> f64 {
        let (x, y) = self.points[index];
        (y - (model.slope * x + model.intercept)).abs()
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn on_estimate_start(&mut self, snapshot: &RunSnapshot) {
        self.starts += 1;
        self.record(snapshot);
    }

    fn on_estimate_end(&mut self, snapshot: &RunSnapshot) {
        self.ends += 1;
        self.record(snapshot);
    }

    fn on_estimate_next_iteration(&mut self, snapshot: &RunSnapshot, iteration: usize) {
        self.iterations_seen.push(iteration);
        self.record(snapshot);
    }

    fn on_estimate_progress_change(&mut self, snapshot: &RunSnapshot, progress: f32) {
        self.progress_values.push(progress);
        self.record(snapshot);
    }
}

impl ConsensusProblem for LineProblem {
    fn residual_threshold(&self) -> f64 {
        self.threshold
    }
}

impl QualityRankedProblem for LineProblem {
    fn quality_scores(&self) -> Vec<f64> {
        self.qualities.clone()
    }
}
