//! Tunable game parameters, rule flags and the key=value parameter format.
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{FACES, MAX_DICE, PAYOUT_COUNT, REPORT_ONLY_KEYS, TERMINAL_STATE, THRESHOLD_COUNT};

/// How the stake is charged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StakeMode {
    /// Stake is paid once before the first roll.
    #[default]
    PayIn,
    /// Stake is paid before every roll.
    PerRoll,
}

/// What a roll inside the no-win band does to the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BustRule {
    /// The game ends immediately and nothing is paid out.
    #[default]
    EndsGame,
    /// Progress returns to state 0 and play continues while rolls remain.
    ResetsProgress,
}

/// What happens when the roll budget runs out below the terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustionRule {
    /// The payout is forfeited.
    #[default]
    Forfeit,
    /// The last reached payout is kept.
    KeepPayout,
}

/// Non-tunable rule flags that select between historical game variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GameRules {
    #[serde(default)]
    pub bust: BustRule,
    #[serde(default)]
    pub exhaustion: ExhaustionRule,
}

macro_rules! text_enum {
    ($ty:ty { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }

            #[must_use]
            pub fn parse(text: &str) -> Option<Self> {
                match text.trim() {
                    $($text => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum!(StakeMode { PayIn => "pay_in", PerRoll => "per_roll" });
text_enum!(BustRule { EndsGame => "ends_game", ResetsProgress => "resets_progress" });
text_enum!(ExhaustionRule { Forfeit => "forfeit", KeepPayout => "keep_payout" });

/// One tunable integer knob of [`GameParams`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKey {
    DiceCount,
    Stake,
    RollBudget,
    NoWinRadius,
    Threshold1,
    Threshold2,
    Threshold3,
    Threshold4,
    Payout1,
    Payout2,
    Payout3,
    Payout4,
    Payout5,
}

impl ParamKey {
    /// Every tunable key in search order.
    pub const ALL: [Self; 13] = [
        Self::DiceCount,
        Self::Stake,
        Self::RollBudget,
        Self::NoWinRadius,
        Self::Threshold1,
        Self::Threshold2,
        Self::Threshold3,
        Self::Threshold4,
        Self::Payout1,
        Self::Payout2,
        Self::Payout3,
        Self::Payout4,
        Self::Payout5,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::DiceCount => "dice_count",
            Self::Stake => "stake",
            Self::RollBudget => "roll_budget",
            Self::NoWinRadius => "no_win_radius",
            Self::Threshold1 => "threshold_1",
            Self::Threshold2 => "threshold_2",
            Self::Threshold3 => "threshold_3",
            Self::Threshold4 => "threshold_4",
            Self::Payout1 => "payout_1",
            Self::Payout2 => "payout_2",
            Self::Payout3 => "payout_3",
            Self::Payout4 => "payout_4",
            Self::Payout5 => "payout_5",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.name() == name)
    }

    /// Sign of the effect raising this key has on the player's mean profit:
    /// `1` raises it, `-1` lowers it, `0` when the effect depends on the rest
    /// of the parameter set.
    #[must_use]
    pub const fn profit_direction(self) -> i32 {
        match self {
            Self::RollBudget
            | Self::Payout1
            | Self::Payout2
            | Self::Payout3
            | Self::Payout4
            | Self::Payout5 => 1,
            Self::Stake | Self::NoWinRadius => -1,
            Self::DiceCount
            | Self::Threshold1
            | Self::Threshold2
            | Self::Threshold3
            | Self::Threshold4 => 0,
        }
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors raised while reading or validating a parameter set.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParamsError {
    #[error("required parameter `{0}` is missing")]
    MissingKey(&'static str),
    #[error("unknown parameter `{0}`")]
    UnknownKey(String),
    #[error("parameter `{key}` has invalid value `{value}`")]
    InvalidValue { key: String, value: String },
    #[error("line {line} is not a key=value pair: `{text}`")]
    MalformedLine { line: usize, text: String },
    #[error("{key} must be between {min} and {max} (got {value})")]
    OutOfBounds {
        key: ParamKey,
        min: i32,
        max: i32,
        value: i32,
    },
    #[error("thresholds must be strictly increasing (got {0:?})")]
    ThresholdOrder([i32; THRESHOLD_COUNT]),
    #[error("payouts must be non-decreasing (got {0:?})")]
    PayoutOrder([i32; PAYOUT_COUNT]),
    #[error("no-win radius {radius} exceeds the half range {max} of the dice sums")]
    BandRadius { radius: i32, max: i32 },
}

/// Contiguous range of dice sums that bust the player.
///
/// An empty band (`low > high`) happens when the radius is zero and the
/// midpoint of the sum range falls between two integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailBand {
    pub low: i32,
    pub high: i32,
}

impl FailBand {
    #[must_use]
    pub const fn contains(self, sum: i32) -> bool {
        sum >= self.low && sum <= self.high
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.low > self.high
    }
}

impl fmt::Display for FailBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.low, self.high)
    }
}

/// A complete, immutable parameter set for one evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GameParams {
    pub dice_count: i32,
    pub stake: i32,
    #[serde(default)]
    pub stake_mode: StakeMode,
    pub roll_budget: i32,
    pub no_win_radius: i32,
    pub thresholds: [i32; THRESHOLD_COUNT],
    pub payouts: [i32; PAYOUT_COUNT],
    #[serde(default)]
    pub rules: GameRules,
}

impl Default for GameParams {
    fn default() -> Self {
        Self {
            dice_count: 3,
            stake: 3,
            stake_mode: StakeMode::PayIn,
            roll_budget: 8,
            no_win_radius: 2,
            thresholds: [4, 12, 14, 18],
            payouts: [1, 4, 5, 7, 10],
            rules: GameRules::default(),
        }
    }
}

impl GameParams {
    #[must_use]
    pub const fn min_sum(&self) -> i32 {
        self.dice_count
    }

    #[must_use]
    pub const fn max_sum(&self) -> i32 {
        self.dice_count.saturating_mul(FACES)
    }

    /// Largest no-win radius that keeps the band inside the sum range.
    #[must_use]
    pub const fn max_radius(&self) -> i32 {
        (self.max_sum() - self.min_sum()) / 2
    }

    /// Stake charged once before the first roll.
    #[must_use]
    pub const fn entry_cost(&self) -> i32 {
        match self.stake_mode {
            StakeMode::PayIn => self.stake,
            StakeMode::PerRoll => 0,
        }
    }

    /// Stake charged before every roll.
    #[must_use]
    pub const fn round_cost(&self) -> i32 {
        match self.stake_mode {
            StakeMode::PayIn => 0,
            StakeMode::PerRoll => self.stake,
        }
    }

    /// Cash-out value of a progress state; state 0 pays nothing.
    #[must_use]
    pub fn payout(&self, state: usize) -> i32 {
        match state {
            1..=TERMINAL_STATE => self.payouts[state - 1],
            _ => 0,
        }
    }

    /// No-win band centred on the midpoint of `[min_sum, max_sum]`, clipped
    /// to that range.
    #[must_use]
    pub fn fail_band(&self) -> FailBand {
        // Work in half-units so the real midpoint needs no float math.
        let mid2 = i64::from(self.min_sum()) + i64::from(self.max_sum());
        let radius2 = 2 * i64::from(self.no_win_radius.max(0));
        let low = i32::try_from((mid2 - radius2 + 1).div_euclid(2)).unwrap_or(i32::MIN);
        let high = i32::try_from((mid2 + radius2).div_euclid(2)).unwrap_or(i32::MAX);
        FailBand {
            low: low.max(self.min_sum()),
            high: high.min(self.max_sum()),
        }
    }

    #[must_use]
    pub const fn get(&self, key: ParamKey) -> i32 {
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

    pub const fn set(&mut self, key: ParamKey, value: i32) {
        match key {
            ParamKey::DiceCount => self.dice_count = value,
            ParamKey::Stake => self.stake = value,
            ParamKey::RollBudget => self.roll_budget = value,
            ParamKey::NoWinRadius => self.no_win_radius = value,
            ParamKey::Threshold1 => self.thresholds[0] = value,
            ParamKey::Threshold2 => self.thresholds[1] = value,
            ParamKey::Threshold3 => self.thresholds[2] = value,
            ParamKey::Threshold4 => self.thresholds[3] = value,
            ParamKey::Payout1 => self.payouts[0] = value,
            ParamKey::Payout2 => self.payouts[1] = value,
            ParamKey::Payout3 => self.payouts[2] = value,
            ParamKey::Payout4 => self.payouts[3] = value,
            ParamKey::Payout5 => self.payouts[4] = value,
        }
    }

    /// Copy of `self` with one key replaced.
    #[must_use]
    pub fn with(&self, key: ParamKey, value: i32) -> Self {
        let mut next = self.clone();
        next.set(key, value);
        next
    }

    /// Structural invariants every evaluated parameter set must satisfy.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ParamsError> {
        check_floor(ParamKey::DiceCount, self.dice_count, 1)?;
        if self.dice_count > MAX_DICE {
            return Err(ParamsError::OutOfBounds {
                key: ParamKey::DiceCount,
                min: 1,
                max: MAX_DICE,
                value: self.dice_count,
            });
        }
        check_floor(ParamKey::RollBudget, self.roll_budget, 1)?;
        check_floor(ParamKey::Stake, self.stake, 0)?;
        check_floor(ParamKey::NoWinRadius, self.no_win_radius, 0)?;
        if self.no_win_radius > self.max_radius() {
            return Err(ParamsError::BandRadius {
                radius: self.no_win_radius,
                max: self.max_radius(),
            });
        }
        if self.thresholds.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(ParamsError::ThresholdOrder(self.thresholds));
        }
        if self.payouts.windows(2).any(|pair| pair[0] > pair[1]) {
            return Err(ParamsError::PayoutOrder(self.payouts));
        }
        for (idx, &payout) in self.payouts.iter().enumerate() {
            check_floor(ParamKey::ALL[8 + idx], payout, 0)?;
        }
        Ok(())
    }

    /// Render as `key=value` lines, tunable keys first then rule flags.
    #[must_use]
    pub fn to_kv_string(&self) -> String {
        let mut out = String::new();
        for key in ParamKey::ALL {
            out.push_str(&format!("{}={}\n", key.name(), self.get(key)));
        }
        out.push_str(&format!("stake_mode={}\n", self.stake_mode));
        out.push_str(&format!("bust_rule={}\n", self.rules.bust));
        out.push_str(&format!("exhaustion_rule={}\n", self.rules.exhaustion));
        out
    }

    /// Parse the `key=value` format written by [`Self::to_kv_string`] or a
    /// tuning report. Blank lines and `#` comments are skipped; the mode and
    /// rule flags default when absent.
    ///
    /// # Errors
    ///
    /// Fails on a malformed line, an unknown key, an unparsable value, a
    /// missing tunable key, or a parameter set that violates
    /// [`Self::validate`].
    pub fn from_kv_str(text: &str) -> Result<Self, ParamsError> {
        let mut entries: BTreeMap<&str, &str> = BTreeMap::new();
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(ParamsError::MalformedLine {
                    line: idx + 1,
                    text: line.to_string(),
                });
            };
            let key = key.trim();
            if REPORT_ONLY_KEYS.contains(&key) {
                continue;
            }
            let known = ParamKey::from_name(key).is_some()
                || matches!(key, "stake_mode" | "bust_rule" | "exhaustion_rule");
            if !known {
                return Err(ParamsError::UnknownKey(key.to_string()));
            }
            entries.insert(key, value.trim());
        }

        let mut params = Self::default();
        for key in ParamKey::ALL {
            let raw = entries
                .get(key.name())
                .ok_or(ParamsError::MissingKey(key.name()))?;
            let value = raw.parse::<i32>().map_err(|_| ParamsError::InvalidValue {
                key: key.name().to_string(),
                value: (*raw).to_string(),
            })?;
            params.set(key, value);
        }
        params.stake_mode = parse_flag(&entries, "stake_mode", StakeMode::parse)?;
        params.rules.bust = parse_flag(&entries, "bust_rule", BustRule::parse)?;
        params.rules.exhaustion = parse_flag(&entries, "exhaustion_rule", ExhaustionRule::parse)?;
        params.validate()?;
        Ok(params)
    }
}

fn check_floor(key: ParamKey, value: i32, min: i32) -> Result<(), ParamsError> {
    if value < min {
        return Err(ParamsError::OutOfBounds {
            key,
            min,
            max: i32::MAX,
            value,
        });
    }
    Ok(())
}

fn parse_flag<T: Default>(
    entries: &BTreeMap<&str, &str>,
    key: &str,
    parse: fn(&str) -> Option<T>,
) -> Result<T, ParamsError> {
    match entries.get(key) {
        None => Ok(T::default()),
        Some(raw) => parse(raw).ok_or_else(|| ParamsError::InvalidValue {
            key: key.to_string(),
            value: (*raw).to_string(),
        }),
    }
}
