use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::SubsetError;

/// Draw density above which the selector abandons rejection sampling for a
/// partial Fisher-Yates shuffle of the candidate range, keeping the worst
/// case at `O(hi - lo)` instead of unbounded retries.
const SHUFFLE_DENSITY: f64 = 0.5;

/// Draws uniform random index subsets of a fixed size, without repetition.
///
/// Each selector owns its random stream; [`SubsetSelector::with_seed`] makes
/// the stream reproducible.
pub struct SubsetSelector {
    num_samples: usize,
    rng: StdRng,
}

impl SubsetSelector {
    pub fn new(num_samples: usize) -> Result<Self, SubsetError> {
        Self::with_rng(num_samples, StdRng::from_os_rng())
    }

    pub fn with_seed(num_samples: usize, seed: u64) -> Result<Self, SubsetError> {
        Self::with_rng(num_samples, StdRng::seed_from_u64(seed))
    }

    fn with_rng(num_samples: usize, rng: StdRng) -> Result<Self, SubsetError> {
        if num_samples < 1 {
            return Err(SubsetError::NotEnoughSamples {
                needed: 1,
                available: 0,
            });
        }
        Ok(Self { num_samples, rng })
    }

    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    /// Fills `result[..subset_size]` with distinct indices drawn uniformly
    /// from `[0, num_samples)`.
    pub fn compute_random_subsets(
        &mut self,
        subset_size: usize,
        result: &mut [usize],
    ) -> Result<(), SubsetError> {
        if subset_size < 1 || subset_size > self.num_samples {
            return Err(SubsetError::InvalidSubsetSize {
                subset_size,
                available: self.num_samples,
            });
        }
        if result.len() < subset_size {
            return Err(SubsetError::NotEnoughSamples {
                needed: subset_size,
                available: result.len(),
            });
        }
        self.fill_distinct(0, self.num_samples, subset_size, false, result);
        Ok(())
    }

    /// Fills `result[..subset_size]` with distinct indices drawn uniformly
    /// from `[lo, hi)`. When `pick_last` is set, index `hi - 1` is a member
    /// of the subset exactly once.
    pub fn compute_random_subsets_in_range(
        &mut self,
        lo: usize,
        hi: usize,
        subset_size: usize,
        pick_last: bool,
        result: &mut [usize],
    ) -> Result<(), SubsetError> {
        if lo >= hi {
            return Err(SubsetError::InvalidSubsetRange { lo, hi });
        }
        if subset_size < 1 || hi - lo < subset_size {
            return Err(SubsetError::InvalidSubsetSize {
                subset_size,
                available: hi - lo,
            });
        }
        if hi > self.num_samples {
            return Err(SubsetError::NotEnoughSamples {
                needed: hi,
                available: self.num_samples,
            });
        }
        if result.len() < subset_size {
            return Err(SubsetError::NotEnoughSamples {
                needed: subset_size,
                available: result.len(),
            });
        }
        self.fill_distinct(lo, hi, subset_size, pick_last, result);
        Ok(())
    }

    fn fill_distinct(
        &mut self,
        lo: usize,
        hi: usize,
        subset_size: usize,
        pick_last: bool,
        result: &mut [usize],
    ) {
        let density = subset_size as f64 / (hi - lo) as f64;
        if density > SHUFFLE_DENSITY {
            self.fill_by_shuffle(lo, hi, subset_size, pick_last, result);
        } else {
            self.fill_by_rejection(lo, hi, subset_size, pick_last, result);
        }
    }

    /// Sample, test for a prior occurrence, retry. With density bounded by
    /// [`SHUFFLE_DENSITY`] the expected retries per slot stay below two.
    fn fill_by_rejection(
        &mut self,
        lo: usize,
        hi: usize,
        subset_size: usize,
        pick_last: bool,
        result: &mut [usize],
    ) {
        let mut count = 0;
        let mut draw_hi = hi;
        if pick_last {
            result[0] = hi - 1;
            count = 1;
            draw_hi = hi - 1;
        }
        while count < subset_size {
            let candidate = self.rng.random_range(lo..draw_hi);
            if !result[..count].contains(&candidate) {
                result[count] = candidate;
                count += 1;
            }
        }
    }

    /// Partial Fisher-Yates over the candidate range.
    fn fill_by_shuffle(
        &mut self,
        lo: usize,
        hi: usize,
        subset_size: usize,
        pick_last: bool,
        result: &mut [usize],
    ) {
        let mut pool: Vec<usize> = (lo..hi).collect();
        let mut fixed = 0;
        if pick_last {
            result[0] = hi - 1;
            fixed = 1;
            pool.pop();
        }
        let mut remaining = pool.len();
        for slot in fixed..subset_size {
            let pick = self.rng.random_range(0..remaining);
            result[slot] = pool[pick];
            remaining -= 1;
            pool.swap(pick, remaining);
        }
    }
}
