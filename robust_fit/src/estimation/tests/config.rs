use pretty_assertions::assert_eq;
use test_case::test_case;

use super::LineProblem;
use crate::error::EstimationError;
use crate::estimation::{
    EstimatorCore, InliersData, RunProgress, adaptive_iterations, adaptive_iterations_for_fraction,
    median_in_place,
};

#[test]
fn every_mutator_fails_while_the_lock_is_held() {
    let mut core: EstimatorCore<LineProblem> = EstimatorCore::new(None);
    core.lock();
    assert!(core.is_locked());

    assert!(matches!(
        core.set_confidence(0.5),
        Err(EstimationError::Locked)
    ));
    assert!(matches!(
        core.set_max_iterations(10),
        Err(EstimationError::Locked)
    ));
    assert!(matches!(
        core.set_progress_delta(0.1),
        Err(EstimationError::Locked)
    ));
    assert!(matches!(
        core.set_subset_seed(Some(1)),
        Err(EstimationError::Locked)
    ));

    core.unlock();
    assert!(!core.is_locked());
    core.set_confidence(0.5).unwrap();
    core.set_max_iterations(10).unwrap();
    core.set_progress_delta(0.1).unwrap();
    core.set_subset_seed(Some(1)).unwrap();
}

#[test_case(0.0; "zero")]
#[test_case(1.0; "one")]
#[test_case(-0.5; "negative")]
#[test_case(1.5; "above one")]
fn confidence_must_lie_strictly_between_zero_and_one(confidence: f64) {
    let mut core: EstimatorCore<LineProblem> = EstimatorCore::new(None);
    assert!(matches!(
        core.set_confidence(confidence),
        Err(EstimationError::OutOfBounds { name, .. }) if name == "confidence"
    ));
}

#[test]
fn max_iterations_must_be_positive() {
    let mut core: EstimatorCore<LineProblem> = EstimatorCore::new(None);
    assert!(matches!(
        core.set_max_iterations(0),
        Err(EstimationError::OutOfBounds { name, .. }) if name == "max_iterations"
    ));
    core.set_max_iterations(1).unwrap();
}

#[test_case(-0.01; "negative")]
#[test_case(1.01; "above one")]
fn progress_delta_must_lie_within_the_unit_interval(delta: f32) {
    let mut core: EstimatorCore<LineProblem> = EstimatorCore::new(None);
    assert!(matches!(
        core.set_progress_delta(delta),
        Err(EstimationError::OutOfBounds { name, .. }) if name == "progress_delta"
    ));
    core.set_progress_delta(0.0).unwrap();
    core.set_progress_delta(1.0).unwrap();
}

#[test]
fn adaptive_bound_for_a_typical_inlier_fraction() {
    // w = 0.5, s = 2, confidence 0.99: ceil(ln 0.01 / ln 0.75) = 17
    assert_eq!(adaptive_iterations(50, 100, 2, 0.99, 5000), 17);
}

#[test]
fn adaptive_bound_degenerate_fractions() {
    assert_eq!(adaptive_iterations_for_fraction(0.0, 2, 0.99, 5000), 5000);
    assert_eq!(adaptive_iterations_for_fraction(-0.1, 2, 0.99, 5000), 5000);
    assert_eq!(adaptive_iterations_for_fraction(1.0, 2, 0.99, 5000), 1);
    assert_eq!(adaptive_iterations_for_fraction(1.5, 2, 0.99, 5000), 1);
}

#[test]
fn adaptive_bound_is_clamped_to_the_cap() {
    // a tiny inlier fraction wants far more iterations than the cap allows
    assert_eq!(adaptive_iterations(1, 1000, 4, 0.99, 5000), 5000);
}

#[test]
fn adaptive_bound_never_returns_zero() {
    // an excellent fraction still requires at least one iteration
    assert_eq!(adaptive_iterations(999, 1000, 2, 0.5, 5000), 1);
}

#[test]
fn median_of_odd_and_even_length_slices() {
    let mut odd = [3.0, 1.0, 2.0];
    assert_eq!(median_in_place(&mut odd), 2.0);

    let mut even = [4.0, 1.0, 3.0, 2.0];
    assert_eq!(median_in_place(&mut even), 2.5);

    let mut single = [7.0];
    assert_eq!(median_in_place(&mut single), 7.0);
}

#[test]
fn progress_fires_only_after_advancing_by_the_delta() {
    let mut progress = RunProgress::new(0.25);
    // 100 planned iterations: 10% is below the delta, 30% crosses it
    assert_eq!(progress.advance(10, 100), None);
    assert_eq!(progress.advance(30, 100), Some(0.3));
    // the next fire needs another full delta beyond 0.3
    assert_eq!(progress.advance(40, 100), None);
    assert_eq!(progress.advance(60, 100), Some(0.6));
}

#[test]
fn progress_is_monotone_even_when_the_target_grows() {
    let mut progress = RunProgress::new(0.0);
    assert_eq!(progress.advance(5, 10), Some(0.5));
    // a larger remaining-iteration estimate must not move progress backwards
    assert_eq!(progress.advance(6, 20), None);
    assert!(progress.current() >= 0.5);
}

#[test]
fn progress_is_capped_at_one() {
    let mut progress = RunProgress::new(0.0);
    assert_eq!(progress.advance(15, 10), Some(1.0));
    assert_eq!(progress.advance(16, 10), None);
}

#[test]
fn inliers_data_defaults_to_an_empty_record() {
    let data = InliersData::default();
    assert_eq!(data.num_inliers(), 0);
    assert!(data.inliers().is_none());
    assert!(data.residuals().is_none());
    assert!(!data.is_inlier(0));
}
