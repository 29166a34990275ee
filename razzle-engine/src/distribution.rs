//! Probability mass of the sum of `n` fair six-sided dice.
use serde::{Deserialize, Serialize};

use crate::constants::FACES;

/// Probability of every achievable sum in `[dice, 6 * dice]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SumDistribution {
    dice: i32,
    probabilities: Vec<f64>,
}

impl SumDistribution {
    #[must_use]
    pub const fn dice(&self) -> i32 {
        self.dice
    }

    #[must_use]
    pub const fn min_sum(&self) -> i32 {
        self.dice
    }

    #[must_use]
    pub const fn max_sum(&self) -> i32 {
        self.dice * FACES
    }

    /// Probability of `sum`, zero outside the achievable range.
    #[must_use]
    pub fn probability(&self, sum: i32) -> f64 {
        usize::try_from(sum - self.min_sum())
            .ok()
            .and_then(|idx| self.probabilities.get(idx))
            .copied()
            .unwrap_or(0.0)
    }

    /// `(sum, probability)` pairs in ascending sum order, zero-mass sums
    /// skipped.
    pub fn iter(&self) -> impl Iterator<Item = (i32, f64)> + '_ {
        (self.min_sum()..)
            .zip(self.probabilities.iter().copied())
            .filter(|&(_, p)| p > 0.0)
    }

    #[must_use]
    pub fn total_mass(&self) -> f64 {
        self.probabilities.iter().sum()
    }
}

/// Convolve `dice` uniform six-sided dice.
///
/// # Panics
///
/// Panics if `dice < 1`; parameter validation rejects such sets first.
#[must_use]
pub fn build_sum_distribution(dice: i32) -> SumDistribution {
    assert!(dice >= 1, "die count must be at least 1 (got {dice})");
    let faces = usize::try_from(FACES).unwrap_or(6);
    let count = usize::try_from(dice).unwrap_or(1);
    let max_sum = count * faces;

    // weights[s] = number of ways to roll s
    let mut weights = vec![0.0_f64; max_sum + 1];
    for face in 1..=faces {
        weights[face] = 1.0;
    }
    for rolled in 2..=count {
        let mut next = vec![0.0_f64; max_sum + 1];
        for partial in (rolled - 1)..=(rolled - 1) * faces {
            let weight = weights[partial];
            if weight <= 0.0 {
                continue;
            }
            for face in 1..=faces {
                next[partial + face] += weight;
            }
        }
        weights = next;
    }

    let total: f64 = weights.iter().sum();
    let probabilities = weights[count..=max_sum]
        .iter()
        .map(|w| w / total)
        .collect();
    SumDistribution {
        dice,
        probabilities,
    }
}

/// Holds the distribution for the most recent die count and rebuilds it only
/// when a different die count is requested.
#[derive(Debug, Clone, Default)]
pub struct DistributionCache {
    current: Option<SumDistribution>,
    builds: u64,
}

impl DistributionCache {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            current: None,
            builds: 0,
        }
    }

    pub fn get(&mut self, dice: i32) -> &SumDistribution {
        let stale = self.current.as_ref().is_none_or(|d| d.dice() != dice);
        if stale {
            self.builds += 1;
            self.current = Some(build_sum_distribution(dice));
        }
        self.current.get_or_insert_with(|| build_sum_distribution(dice))
    }

    /// Number of distributions built so far.
    #[must_use]
    pub const fn builds(&self) -> u64 {
        self.builds
    }

    pub fn invalidate(&mut self) {
        self.current = None;
    }
}
