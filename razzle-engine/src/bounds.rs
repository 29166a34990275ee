//! Search ranges for the tunable parameters.
//!
//! Every candidate the optimizer produces is checked here before it is
//! evaluated; a rejected candidate is discarded, not reported.
use serde::{Deserialize, Serialize};

use crate::params::{GameParams, ParamKey, ParamsError};

/// Inclusive integer range for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bound {
    pub min: i32,
    pub max: i32,
}

impl Bound {
    #[must_use]
    pub const fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub const fn contains(self, value: i32) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Per-key search bounds. The no-win radius is additionally capped by the
/// half range of the current die count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamBounds {
    #[serde(default = "ParamBounds::default_dice_count")]
    pub dice_count: Bound,
    #[serde(default = "ParamBounds::default_stake")]
    pub stake: Bound,
    #[serde(default = "ParamBounds::default_roll_budget")]
    pub roll_budget: Bound,
    #[serde(default = "ParamBounds::default_no_win_radius")]
    pub no_win_radius: Bound,
    #[serde(default = "ParamBounds::default_thresholds")]
    pub thresholds: [Bound; 4],
    #[serde(default = "ParamBounds::default_payouts")]
    pub payouts: [Bound; 5],
}

impl ParamBounds {
    const fn default_dice_count() -> Bound {
        Bound::new(1, 6)
    }

    const fn default_stake() -> Bound {
        Bound::new(2, 8)
    }

    const fn default_roll_budget() -> Bound {
        Bound::new(1, 20)
    }

    const fn default_no_win_radius() -> Bound {
        Bound::new(0, 15)
    }

    const fn default_thresholds() -> [Bound; 4] {
        [Bound::new(1, 18); 4]
    }

    const fn default_payouts() -> [Bound; 5] {
        [
            Bound::new(1, 20),
            Bound::new(1, 20),
            Bound::new(1, 20),
            Bound::new(2, 20),
            Bound::new(2, 20),
        ]
    }

    #[must_use]
    pub const fn bound(&self, key: ParamKey) -> Bound {
        match key {
            ParamKey::DiceCount => self.dice_count,
            ParamKey::Stake => self.stake,
            ParamKey::RollBudget => self.roll_budget,
            ParamKey::NoWinRadius => self.no_win_radius,
            ParamKey::Threshold1 => self.thresholds[0],
            ParamKey::Threshold2 => self.thresholds[1],
            ParamKey::Threshold3 => self.thresholds[2],
            ParamKey::Threshold4 => self.thresholds[3],
            ParamKey::Payout1 => self.payouts[0],
            ParamKey::Payout2 => self.payouts[1],
            ParamKey::Payout3 => self.payouts[2],
            ParamKey::Payout4 => self.payouts[3],
            ParamKey::Payout5 => self.payouts[4],
        }
    }

    /// Check every per-key range and the cross-field ordering constraints.
    ///
    /// # Errors
    ///
    /// Returns the first violated bound or ordering rule.
    pub fn admits(&self, params: &GameParams) -> Result<(), ParamsError> {
        for key in ParamKey::ALL {
            let bound = self.bound(key);
            let value = params.get(key);
            if !bound.contains(value) {
                return Err(ParamsError::OutOfBounds {
                    key,
                    min: bound.min,
                    max: bound.max,
                    value,
                });
            }
        }
        params.validate()
    }
}

impl Default for ParamBounds {
    fn default() -> Self {
        Self {
            dice_count: Self::default_dice_count(),
            stake: Self::default_stake(),
            roll_budget: Self::default_roll_budget(),
            no_win_radius: Self::default_no_win_radius(),
            thresholds: Self::default_thresholds(),
            payouts: Self::default_payouts(),
        }
    }
}
