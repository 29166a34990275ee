//! Single-game simulation and the stop rules that drive it.
use std::collections::BTreeMap;

use rand::Rng;

use crate::constants::{FACES, TERMINAL_STATE};
use crate::exact::ProfitDistribution;
use crate::numbers::ratio;
use crate::params::{BustRule, ExhaustionRule, FailBand, GameParams, ParamsError};
use crate::policy::Policy;
use crate::transitions::{RollOutcome, classify_roll};

/// Decides whether to roll again from `state` with `rolls_left` rolls
/// remaining. Consulted before every roll, including the first.
pub trait StopRule {
    fn continues(&self, state: usize, rolls_left: i32) -> bool;
}

impl StopRule for Policy {
    fn continues(&self, state: usize, _rolls_left: i32) -> bool {
        self.continues_at(state)
    }
}

/// Fixed house strategy: stop once `stop_at` is reached, and optionally stop
/// earlier when only the final roll remains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdStrategy {
    pub stop_at: usize,
    pub final_roll_stop_at: Option<usize>,
}

impl ThresholdStrategy {
    #[must_use]
    pub const fn new(stop_at: usize) -> Self {
        Self {
            stop_at,
            final_roll_stop_at: None,
        }
    }

    /// Stop at state 3 or above, or at state 2 with one roll left.
    #[must_use]
    pub const fn house_rule() -> Self {
        Self {
            stop_at: 3,
            final_roll_stop_at: Some(2),
        }
    }
}

impl StopRule for ThresholdStrategy {
    fn continues(&self, state: usize, rolls_left: i32) -> bool {
        if state >= self.stop_at || state >= TERMINAL_STATE {
            return false;
        }
        !self
            .final_roll_stop_at
            .is_some_and(|early| rolls_left == 1 && state >= early)
    }
}

fn roll_sum<R: Rng + ?Sized>(dice: i32, rng: &mut R) -> i32 {
    (0..dice).map(|_| rng.gen_range(1..=FACES)).sum()
}

/// Play one game and return the player's net profit.
///
/// `band` must be `params.fail_band()`; it is passed in so batch callers
/// compute it once.
pub fn play_one_game<S, R>(params: &GameParams, band: FailBand, rule: &S, rng: &mut R) -> i64
where
    S: StopRule + ?Sized,
    R: Rng + ?Sized,
{
    let round = i64::from(params.round_cost());
    let mut paid = i64::from(params.entry_cost());
    let mut rolls_left = params.roll_budget;
    let mut state = 0;

    while rolls_left > 0 && rule.continues(state, rolls_left) {
        rolls_left -= 1;
        paid += round;
        let sum = roll_sum(params.dice_count, rng);
        match classify_roll(params, band, sum, state) {
            RollOutcome::Bust => match params.rules.bust {
                BustRule::EndsGame => return -paid,
                BustRule::ResetsProgress => state = 0,
            },
            outcome => state = outcome.next_state(),
        }
    }

    let exhausted = rolls_left == 0 && state < TERMINAL_STATE;
    let payout = if exhausted && params.rules.exhaustion == ExhaustionRule::Forfeit {
        0
    } else {
        i64::from(params.payout(state))
    };
    payout - paid
}

/// A game player bound to one parameter set and RNG.
#[derive(Debug, Clone)]
pub struct Simulator<R> {
    params: GameParams,
    band: FailBand,
    rng: R,
}

impl<R: Rng> Simulator<R> {
    /// # Errors
    ///
    /// Returns the first invariant `params` violates.
    pub fn new(params: &GameParams, rng: R) -> Result<Self, ParamsError> {
        params.validate()?;
        Ok(Self {
            params: params.clone(),
            band: params.fail_band(),
            rng,
        })
    }

    pub fn play<S: StopRule + ?Sized>(&mut self, rule: &S) -> i64 {
        play_one_game(&self.params, self.band, rule, &mut self.rng)
    }

    #[must_use]
    pub const fn params(&self) -> &GameParams {
        &self.params
    }
}

/// Play `games` games sequentially and return the empirical outcome
/// frequencies.
///
/// # Errors
///
/// Returns the first invariant `params` violates.
pub fn simulate_tally<S, R>(
    params: &GameParams,
    rule: &S,
    games: u64,
    rng: &mut R,
) -> Result<ProfitDistribution, ParamsError>
where
    S: StopRule + ?Sized,
    R: Rng + ?Sized,
{
    params.validate()?;
    let band = params.fail_band();
    let mut counts: BTreeMap<i64, u64> = BTreeMap::new();
    for _ in 0..games {
        *counts
            .entry(play_one_game(params, band, rule, rng))
            .or_insert(0) += 1;
    }
    let mut tally = ProfitDistribution::new();
    for (profit, count) in counts {
        tally.add(profit, ratio(count, games));
    }
    Ok(tally)
}
