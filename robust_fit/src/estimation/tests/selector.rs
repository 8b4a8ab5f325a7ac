use pretty_assertions::assert_eq;
use test_case::test_case;

use crate::error::SubsetError;
use crate::estimation::subsets::SubsetSelector;

fn assert_distinct_in_range(subset: &[usize], lo: usize, hi: usize) {
    for (slot, &index) in subset.iter().enumerate() {
        assert!((lo..hi).contains(&index), "index {index} outside [{lo}, {hi})");
        assert!(
            !subset[..slot].contains(&index),
            "index {index} drawn twice"
        );
    }
}

#[test]
fn draws_distinct_indices_within_the_population() {
    let mut selector = SubsetSelector::with_seed(100, 1).unwrap();
    let mut subset = [0usize; 5];
    for _ in 0..200 {
        selector.compute_random_subsets(5, &mut subset).unwrap();
        assert_distinct_in_range(&subset, 0, 100);
    }
}

#[test]
fn a_full_size_subset_is_a_permutation_of_the_population() {
    let mut selector = SubsetSelector::with_seed(8, 2).unwrap();
    let mut subset = [0usize; 8];
    selector.compute_random_subsets(8, &mut subset).unwrap();
    let mut sorted = subset;
    sorted.sort_unstable();
    assert_eq!(sorted, [0, 1, 2, 3, 4, 5, 6, 7]);
}

#[test]
fn range_draws_respect_the_bounds() {
    let mut selector = SubsetSelector::with_seed(100, 3).unwrap();
    let mut subset = [0usize; 4];
    for _ in 0..200 {
        selector
            .compute_random_subsets_in_range(20, 60, 4, false, &mut subset)
            .unwrap();
        assert_distinct_in_range(&subset, 20, 60);
    }
}

#[test]
fn pick_last_includes_the_top_of_the_range_exactly_once() {
    let mut selector = SubsetSelector::with_seed(100, 4).unwrap();
    let mut subset = [0usize; 3];
    for _ in 0..200 {
        selector
            .compute_random_subsets_in_range(10, 40, 3, true, &mut subset)
            .unwrap();
        assert_distinct_in_range(&subset, 10, 40);
        assert_eq!(subset.iter().filter(|&&index| index == 39).count(), 1);
    }
}

#[test]
fn pick_last_works_in_the_dense_shuffle_regime() {
    let mut selector = SubsetSelector::with_seed(10, 5).unwrap();
    let mut subset = [0usize; 6];
    for _ in 0..50 {
        selector
            .compute_random_subsets_in_range(2, 9, 6, true, &mut subset)
            .unwrap();
        assert_distinct_in_range(&subset, 2, 9);
        assert_eq!(subset.iter().filter(|&&index| index == 8).count(), 1);
    }
}

#[test]
fn seeded_selectors_reproduce_the_same_stream() {
    let mut first = SubsetSelector::with_seed(1000, 77).unwrap();
    let mut second = SubsetSelector::with_seed(1000, 77).unwrap();
    let mut a = [0usize; 6];
    let mut b = [0usize; 6];
    for _ in 0..50 {
        first.compute_random_subsets(6, &mut a).unwrap();
        second.compute_random_subsets(6, &mut b).unwrap();
        assert_eq!(a, b);
    }
}

#[test]
fn an_empty_population_is_rejected() {
    assert!(matches!(
        SubsetSelector::with_seed(0, 1),
        Err(SubsetError::NotEnoughSamples { .. })
    ));
}

#[test_case(0; "zero size")]
#[test_case(11; "size above population")]
fn invalid_subset_sizes_are_rejected(subset_size: usize) {
    let mut selector = SubsetSelector::with_seed(10, 6).unwrap();
    let mut subset = [0usize; 16];
    assert!(matches!(
        selector.compute_random_subsets(subset_size, &mut subset),
        Err(SubsetError::InvalidSubsetSize { .. })
    ));
}

#[test]
fn a_short_output_buffer_is_rejected() {
    let mut selector = SubsetSelector::with_seed(10, 7).unwrap();
    let mut subset = [0usize; 2];
    assert!(matches!(
        selector.compute_random_subsets(3, &mut subset),
        Err(SubsetError::NotEnoughSamples {
            needed: 3,
            available: 2
        })
    ));
}

#[test]
fn range_validation_covers_every_failure_mode() {
    let mut selector = SubsetSelector::with_seed(10, 8).unwrap();
    let mut subset = [0usize; 4];

    assert!(matches!(
        selector.compute_random_subsets_in_range(5, 5, 1, false, &mut subset),
        Err(SubsetError::InvalidSubsetRange { lo: 5, hi: 5 })
    ));
    assert!(matches!(
        selector.compute_random_subsets_in_range(6, 2, 1, false, &mut subset),
        Err(SubsetError::InvalidSubsetRange { lo: 6, hi: 2 })
    ));
    assert!(matches!(
        selector.compute_random_subsets_in_range(0, 3, 4, false, &mut subset),
        Err(SubsetError::InvalidSubsetSize { .. })
    ));
    assert!(matches!(
        selector.compute_random_subsets_in_range(0, 11, 4, false, &mut subset),
        Err(SubsetError::NotEnoughSamples { .. })
    ));
    assert!(matches!(
        selector.compute_random_subsets_in_range(0, 8, 5, false, &mut subset[..3]),
        Err(SubsetError::NotEnoughSamples { .. })
    ));
}

#[test]
fn a_single_sample_population_yields_the_only_possible_subset() {
    let mut selector = SubsetSelector::with_seed(1, 9).unwrap();
    let mut subset = [7usize; 1];
    selector.compute_random_subsets(1, &mut subset).unwrap();
    assert_eq!(subset, [0]);
}
