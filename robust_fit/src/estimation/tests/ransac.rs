use pretty_assertions::assert_eq;

use super::{INTERCEPT, LineProblem, SLOPE, synthetic_line};
use crate::error::EstimationError;
use crate::estimation::ransac::Ransac;
use crate::estimation::{EstimationProblem, Method, RobustEstimator};

#[test]
fn recovers_the_line_despite_fifteen_percent_outliers() {
    let data = synthetic_line(1000, 0.15, 42);
    let outliers = data.outliers;
    let mut estimator = Ransac::with_problem(LineProblem::new(data.points, 1e-3));
    estimator.set_confidence(0.99).unwrap();
    estimator.set_subset_seed(Some(4242)).unwrap();
    estimator.set_compute_and_keep_inliers(true).unwrap();
    estimator.set_compute_and_keep_residuals(true).unwrap();

    let line = estimator.estimate().unwrap();
    assert!((line.slope - SLOPE).abs() < 1e-6, "slope {}", line.slope);
    assert!(
        (line.intercept - INTERCEPT).abs() < 1e-6,
        "intercept {}",
        line.intercept
    );

    let inliers = estimator.best_inliers_data().unwrap();
    assert!(inliers.num_inliers() >= 2);
    assert_eq!(inliers.inliers().unwrap().len(), 1000);
    assert_eq!(inliers.residuals().unwrap().len(), 1000);

    // at least 80% of the outliers must be excluded from the inlier set
    let total_outliers = outliers.iter().filter(|&&flag| flag).count();
    let outliers_kept = outliers
        .iter()
        .enumerate()
        .filter(|&(index, &flag)| flag && inliers.is_inlier(index))
        .count();
    assert!(
        outliers_kept * 5 <= total_outliers,
        "kept {outliers_kept} of {total_outliers} outliers"
    );

    // every retained inlier is within the threshold of the best model
    let problem = estimator.problem().unwrap();
    let model = estimator.best_result().unwrap();
    for (index, &flag) in inliers.inliers().unwrap().iter().enumerate() {
        if flag {
            assert!(problem.residual(model, index) <= 1e-3);
        }
    }
}

#[test]
fn state_before_any_run() {
    let data = synthetic_line(50, 0.1, 7);
    let estimator = Ransac::with_problem(LineProblem::new(data.points, 1e-3));
    assert!(!estimator.is_locked());
    assert!(estimator.is_ready());
    assert!(estimator.best_result().is_none());
    assert!(estimator.best_inliers_data().is_none());
    assert_eq!(estimator.n_iters(), estimator.max_iterations());
    assert_eq!(estimator.method(), Method::Ransac);
}

#[test]
fn callbacks_fire_in_order_with_monotone_progress() {
    let data = synthetic_line(400, 0.2, 11);
    let mut estimator = Ransac::with_problem(LineProblem::new(data.points, 1e-3));
    estimator.set_progress_delta(0.0).unwrap();
    estimator.set_subset_seed(Some(7)).unwrap();

    estimator.estimate().unwrap();
    let executed = estimator.n_iters();
    let problem = estimator.problem().unwrap();

    assert_eq!(problem.starts, 1);
    assert_eq!(problem.ends, 1);
    assert!(problem.all_snapshots_locked);
    assert_eq!(problem.iterations_seen.len(), executed);
    assert_eq!(
        problem.iterations_seen,
        (1..=executed).collect::<Vec<_>>()
    );

    assert!(!problem.progress_values.is_empty());
    let mut previous = 0.0f32;
    for &progress in &problem.progress_values {
        assert!((0.0..=1.0).contains(&progress));
        assert!(progress >= previous, "progress moved backwards");
        previous = progress;
    }
    assert!(!estimator.is_locked(), "lock must be released after the run");
}

#[test]
fn n_iters_is_clamped_to_the_executed_count_after_a_run() {
    let data = synthetic_line(300, 0.1, 3);
    let mut estimator = Ransac::with_problem(LineProblem::new(data.points, 1e-3));
    estimator.set_subset_seed(Some(99)).unwrap();
    estimator.estimate().unwrap();
    let executed = estimator.n_iters();
    assert!(executed >= 1);
    assert!(executed <= estimator.max_iterations());
    // clean data stops far before the cap
    assert!(executed < estimator.max_iterations());
}

#[test]
fn estimation_without_a_problem_is_not_ready() {
    let mut estimator: Ransac<LineProblem> = Ransac::new();
    assert!(!estimator.is_ready());
    assert!(matches!(
        estimator.estimate(),
        Err(EstimationError::NotReady(_))
    ));
}

#[test]
fn a_problem_reporting_not_ready_blocks_estimation() {
    let data = synthetic_line(50, 0.1, 9);
    let mut problem = LineProblem::new(data.points, 1e-3);
    problem.ready = false;
    let mut estimator = Ransac::with_problem(problem);
    assert!(!estimator.is_ready());
    assert!(matches!(
        estimator.estimate(),
        Err(EstimationError::NotReady(_))
    ));
    assert!(!estimator.is_locked());
}

#[test]
fn fewer_samples_than_the_subset_size_is_not_ready() {
    let mut estimator = Ransac::with_problem(LineProblem::new(vec![(0.0, 3.0)], 1e-3));
    assert!(!estimator.is_ready());
    assert!(matches!(
        estimator.estimate(),
        Err(EstimationError::NotReady(_))
    ));
}

#[test]
fn a_listener_that_never_produces_models_yields_no_consensus() {
    let data = synthetic_line(50, 0.1, 13);
    let mut problem = LineProblem::new(data.points, 1e-3);
    problem.produce_models = false;
    let mut estimator = Ransac::with_problem(problem);
    estimator.set_max_iterations(25).unwrap();
    assert!(matches!(
        estimator.estimate(),
        Err(EstimationError::NoConsensus { iterations: 25 })
    ));
    assert!(!estimator.is_locked());
    assert_eq!(estimator.n_iters(), 25);
}

#[test]
fn a_non_positive_threshold_is_rejected_at_run_time() {
    let data = synthetic_line(50, 0.1, 17);
    let mut estimator = Ransac::with_problem(LineProblem::new(data.points, 0.0));
    assert!(matches!(
        estimator.estimate(),
        Err(EstimationError::OutOfBounds { name, .. }) if name == "residual threshold"
    ));
    assert!(!estimator.is_locked());
}

#[test]
fn keep_flags_default_to_discarding_masks_and_residuals() {
    let data = synthetic_line(200, 0.1, 19);
    let mut estimator = Ransac::with_problem(LineProblem::new(data.points, 1e-3));
    estimator.estimate().unwrap();
    let inliers = estimator.best_inliers_data().unwrap();
    assert!(inliers.inliers().is_none());
    assert!(inliers.residuals().is_none());
    assert!(inliers.num_inliers() >= 2);
    assert!(!inliers.is_inlier(0), "no mask means no inlier membership");
}
