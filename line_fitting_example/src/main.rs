//! Fits a line to synthetic data contaminated with outliers, once with
//! RANSAC and once with LMedS, and prints how each engine did.

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use robust_fit::prelude::*;

const TRUE_SLOPE: f64 = 2.0;
const TRUE_INTERCEPT: f64 = 3.0;
const TOTAL_SAMPLES: usize = 1000;
const OUTLIER_RATIO: f64 = 0.15;
const NOISE_SIGMA: f64 = 1e-5;
const THRESHOLD: f64 = 1e-3;

#[derive(Clone, Debug)]
struct Line {
    slope: f64,
    intercept: f64,
}

struct LineProblem {
    points: Vec<(f64, f64)>,
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

    fn on_estimate_progress_change(&mut self, snapshot: &RunSnapshot, progress: f32) {
        println!(
            "  {:?}: {:3.0}% after {} iterations",
            snapshot.method,
            progress * 100.0,
            snapshot.iteration
        );
    }
}

impl ConsensusProblem for LineProblem {
    fn residual_threshold(&self) -> f64 {
        THRESHOLD
    }
}

fn generate_points(seed: u64) -> Vec<(f64, f64)> {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, NOISE_SIGMA).expect("valid normal distribution");
    (0..TOTAL_SAMPLES)
        .map(|_| {
            let x: f64 = rng.random_range(-10.0..10.0);
            let mut y = TRUE_SLOPE * x + TRUE_INTERCEPT + noise.sample(&mut rng);
            if rng.random_bool(OUTLIER_RATIO) {
                y += rng.random_range(0.1..1.0);
            }
            (x, y)
        })
        .collect()
}

fn report(name: &str, line: &Line, n_iters: usize) {
    println!(
        "{name}: y = {:.6} x + {:.6} after {} iterations (truth: y = {TRUE_SLOPE} x + {TRUE_INTERCEPT})",
        line.slope, line.intercept, n_iters
    );
}

fn main() -> Result<()> {
    let points = generate_points(42);

    let mut ransac = Ransac::with_problem(LineProblem {
        points: points.clone(),
    });
    ransac.set_confidence(0.99)?;
    ransac.set_compute_and_keep_inliers(true)?;
    let line = ransac.estimate()?;
    report("ransac", &line, ransac.n_iters());
    if let Some(inliers) = ransac.best_inliers_data() {
        println!("  kept {} of {TOTAL_SAMPLES} samples as inliers", inliers.num_inliers());
    }

    let mut lmeds = Lmeds::with_problem(LineProblem { points });
    let line = lmeds.estimate()?;
    report("lmeds", &line, lmeds.n_iters());
    if let Some(median) = lmeds.best_median_residual() {
        println!("  best median squared residual: {median:.3e}");
    }

    Ok(())
}
