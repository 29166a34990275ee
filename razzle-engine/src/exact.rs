//! Exact profit distribution by dynamic programming over
//! `(rolls_left, state)`.
//!
//! The table is filled bottom-up from `rolls_left = 0`, so each layer only
//! reads the one below it. Profit is a function of the outcome and the
//! number of rolls already paid for, which is `roll_budget - rolls_left`.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constants::{PROBABILITY_TOLERANCE, STATE_COUNT, TERMINAL_STATE};
use crate::distribution::{SumDistribution, build_sum_distribution};
use crate::numbers::i64_to_f64;
use crate::params::{BustRule, ExhaustionRule, GameParams, ParamsError};
use crate::simulator::StopRule;
use crate::transitions::{RollOutcome, classify_roll};

/// Probability (or frequency) per net player profit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfitDistribution {
    outcomes: BTreeMap<i64, f64>,
}

impl ProfitDistribution {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            outcomes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn point(profit: i64) -> Self {
        let mut dist = Self::new();
        dist.add(profit, 1.0);
        dist
    }

    pub fn add(&mut self, profit: i64, probability: f64) {
        *self.outcomes.entry(profit).or_insert(0.0) += probability;
    }

    /// Fold `other` in with weight `weight`.
    pub fn add_scaled(&mut self, other: &Self, weight: f64) {
        for (&profit, &p) in &other.outcomes {
            self.add(profit, p * weight);
        }
    }

    #[must_use]
    pub fn probability(&self, profit: i64) -> f64 {
        self.outcomes.get(&profit).copied().unwrap_or(0.0)
    }

    #[must_use]
    pub fn total_probability(&self) -> f64 {
        self.outcomes.values().sum()
    }

    #[must_use]
    pub fn expected_value(&self) -> f64 {
        self.outcomes
            .iter()
            .map(|(&profit, &p)| i64_to_f64(profit) * p)
            .sum()
    }

    /// Probability that the player ends with a positive profit.
    #[must_use]
    pub fn win_rate(&self) -> f64 {
        self.outcomes
            .range(1..)
            .map(|(_, &p)| p)
            .sum()
    }

    /// `(profit, probability)` in ascending profit order.
    pub fn iter(&self) -> impl Iterator<Item = (i64, f64)> + '_ {
        self.outcomes.iter().map(|(&profit, &p)| (profit, p))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Exact outcome distribution of playing `params` under `rule`.
///
/// # Errors
///
/// Returns the first invariant `params` violates.
pub fn exact_profit_distribution<S: StopRule + ?Sized>(
    params: &GameParams,
    rule: &S,
) -> Result<ProfitDistribution, ParamsError> {
    params.validate()?;
    let dist = build_sum_distribution(params.dice_count);
    Ok(exact_with_distribution(params, &dist, rule))
}

/// Same as [`exact_profit_distribution`] with a caller-supplied sum
/// distribution. `params` must already be valid.
#[must_use]
pub fn exact_with_distribution<S: StopRule + ?Sized>(
    params: &GameParams,
    dist: &SumDistribution,
    rule: &S,
) -> ProfitDistribution {
    let budget = params.roll_budget.max(0);
    let entry = i64::from(params.entry_cost());
    let round = i64::from(params.round_cost());
    let band = params.fail_band();
    let forfeit = params.rules.exhaustion == ExhaustionRule::Forfeit;

    // Rolls already paid for once `rolls_left` remain.
    let paid = |rolls_left: i32| entry + i64::from(budget - rolls_left) * round;

    let terminal = |rolls_left: i32, state: usize| {
        let payout = if forfeit && rolls_left == 0 && state < TERMINAL_STATE {
            0
        } else {
            i64::from(params.payout(state))
        };
        ProfitDistribution::point(payout - paid(rolls_left))
    };

    let mut below: Vec<ProfitDistribution> = (0..STATE_COUNT).map(|s| terminal(0, s)).collect();
    for rolls_left in 1..=budget {
        let mut layer = Vec::with_capacity(STATE_COUNT);
        for state in 0..STATE_COUNT {
            if !rule.continues(state, rolls_left) {
                layer.push(terminal(rolls_left, state));
                continue;
            }
            let mut mixed = ProfitDistribution::new();
            for (sum, p) in dist.iter() {
                match classify_roll(params, band, sum, state) {
                    RollOutcome::Bust => match params.rules.bust {
                        BustRule::EndsGame => mixed.add(-paid(rolls_left - 1), p),
                        BustRule::ResetsProgress => mixed.add_scaled(&below[0], p),
                    },
                    outcome => mixed.add_scaled(&below[outcome.next_state()], p),
                }
            }
            layer.push(mixed);
        }
        below = layer;
    }
    let result = below.swap_remove(0);
    let mass = result.total_probability();
    if (mass - 1.0).abs() > PROBABILITY_TOLERANCE {
        log::warn!("exact distribution mass {mass} deviates from 1");
    }
    result
}

/// Outcome distribution of a game that ends after exactly one roll.
///
/// # Errors
///
/// Returns the first invariant `params` violates.
pub fn single_roll_profile(params: &GameParams) -> Result<ProfitDistribution, ParamsError> {
    params.validate()?;
    let dist = build_sum_distribution(params.dice_count);
    let band = params.fail_band();
    let cost = i64::from(params.entry_cost()) + i64::from(params.round_cost());
    let mut profile = ProfitDistribution::new();
    for (sum, p) in dist.iter() {
        let state = classify_roll(params, band, sum, 0).next_state();
        profile.add(i64::from(params.payout(state)) - cost, p);
    }
    Ok(profile)
}
