//! Optimal stopping policy over the six progress states.
//!
//! The chain is solved by value iteration. State 5 is absorbing for the
//! policy (it always stops) and its value is pinned at its payout.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{
    CONVERGENCE_TOLERANCE, MAX_SWEEPS, MIN_SWEEPS, STATE_COUNT, TERMINAL_STATE,
};
use crate::distribution::{DistributionCache, SumDistribution};
use crate::params::{BustRule, GameParams, ParamsError};
use crate::transitions::{TransitionMatrix, build_transitions};

pub type ValueVector = [f64; STATE_COUNT];

/// `true` at index `s` means "roll again" from state `s`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Policy(pub [bool; STATE_COUNT]);

impl Policy {
    #[must_use]
    pub const fn continues_at(&self, state: usize) -> bool {
        state < STATE_COUNT && self.0[state]
    }

    #[must_use]
    pub const fn as_array(&self) -> &[bool; STATE_COUNT] {
        &self.0
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (state, go) in self.0.iter().enumerate() {
            if state > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{state}:{}", if *go { "roll" } else { "stop" })?;
        }
        Ok(())
    }
}

/// Output of [`solve`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub policy: Policy,
    pub values: ValueVector,
    pub sweeps: usize,
}

fn stop_values(params: &GameParams) -> ValueVector {
    let mut stop = [0.0; STATE_COUNT];
    for (state, value) in stop.iter_mut().enumerate() {
        *value = f64::from(params.payout(state));
    }
    stop
}

fn continuation(
    params: &GameParams,
    transitions: &TransitionMatrix,
    values: &ValueVector,
    state: usize,
) -> f64 {
    // Under EndsGame column 0 only carries bust mass, which is worth nothing.
    let first = match params.rules.bust {
        BustRule::EndsGame => 1,
        BustRule::ResetsProgress => 0,
    };
    let expected: f64 = (first..STATE_COUNT)
        .map(|next| transitions.get(state, next) * values[next])
        .sum();
    expected - f64::from(params.round_cost())
}

/// Value-iterate the stopping problem for `params` over `transitions`.
///
/// Runs at least [`MIN_SWEEPS`] sweeps, then continues until the largest
/// update is within [`CONVERGENCE_TOLERANCE`] or [`MAX_SWEEPS`] is reached.
#[must_use]
pub fn solve(params: &GameParams, transitions: &TransitionMatrix) -> Solution {
    let stop = stop_values(params);
    let mut values = stop;
    let mut sweeps = 0;

    while sweeps < MAX_SWEEPS {
        sweeps += 1;
        let mut next = values;
        let mut delta = 0.0_f64;
        for state in 0..TERMINAL_STATE {
            let updated = stop[state].max(continuation(params, transitions, &values, state));
            delta = delta.max((updated - values[state]).abs());
            next[state] = updated;
        }
        values = next;
        if sweeps >= MIN_SWEEPS && delta <= CONVERGENCE_TOLERANCE {
            break;
        }
    }
    if sweeps == MAX_SWEEPS {
        log::warn!("value iteration hit the {MAX_SWEEPS}-sweep cap");
    }

    let mut policy = [false; STATE_COUNT];
    for (state, go) in policy.iter_mut().enumerate().take(TERMINAL_STATE) {
        *go = continuation(params, transitions, &values, state) > stop[state];
    }
    Solution {
        policy: Policy(policy),
        values,
        sweeps,
    }
}

/// Everything derived from one parameter set: distribution, transitions and
/// the solved policy. Rebuilt wholesale whenever the parameters change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameModel {
    pub params: GameParams,
    pub distribution: SumDistribution,
    pub transitions: TransitionMatrix,
    pub solution: Solution,
}

impl GameModel {
    /// Validate `params` and derive its model, reusing the cached
    /// distribution when the die count is unchanged.
    ///
    /// # Errors
    ///
    /// Returns the first invariant `params` violates.
    pub fn derive(params: &GameParams, cache: &mut DistributionCache) -> Result<Self, ParamsError> {
        params.validate()?;
        let distribution = cache.get(params.dice_count).clone();
        let transitions = build_transitions(params, &distribution);
        let solution = solve(params, &transitions);
        log::debug!(
            "derived model for dice={} band={} policy=[{}]",
            params.dice_count,
            params.fail_band(),
            solution.policy
        );
        Ok(Self {
            params: params.clone(),
            distribution,
            transitions,
            solution,
        })
    }

    #[must_use]
    pub const fn policy(&self) -> Policy {
        self.solution.policy
    }

    /// Expected profit of optimal play from a fresh game.
    #[must_use]
    pub fn theoretical_ev(&self) -> f64 {
        self.solution.values[0] - f64::from(self.params.entry_cost())
    }
}
