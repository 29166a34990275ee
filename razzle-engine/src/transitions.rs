//! Roll classification and the 6×6 progress-state transition matrix.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{STATE_COUNT, TERMINAL_STATE};
use crate::distribution::SumDistribution;
use crate::params::{FailBand, GameParams};

/// Effect of one dice sum on the current progress state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollOutcome {
    /// The sum fell inside the no-win band.
    Bust,
    /// The sum maps to a state above the current one.
    Advance(usize),
    /// The sum maps to a state at or below the current one.
    Hold(usize),
}

impl RollOutcome {
    /// Progress state after the roll, with a bust landing on state 0.
    #[must_use]
    pub const fn next_state(self) -> usize {
        match self {
            Self::Bust => 0,
            Self::Advance(state) | Self::Hold(state) => state,
        }
    }
}

/// Yard step reached by `sum` ignoring the band: the first threshold at or
/// above the sum, or the terminal state above every threshold.
#[must_use]
pub fn yard_for_sum(params: &GameParams, sum: i32) -> usize {
    params
        .thresholds
        .iter()
        .position(|&threshold| sum <= threshold)
        .map_or(TERMINAL_STATE, |idx| idx + 1)
}

/// Classify a rolled sum from `current`. Progress never moves backwards
/// except through a bust.
#[must_use]
pub fn classify_roll(params: &GameParams, band: FailBand, sum: i32, current: usize) -> RollOutcome {
    if band.contains(sum) {
        return RollOutcome::Bust;
    }
    let yard = yard_for_sum(params, sum);
    if yard > current {
        RollOutcome::Advance(yard)
    } else {
        RollOutcome::Hold(current)
    }
}

/// Row-stochastic matrix `T[s][s']` of one roll from state `s`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitionMatrix {
    rows: [[f64; STATE_COUNT]; STATE_COUNT],
}

impl TransitionMatrix {
    #[must_use]
    pub const fn rows(&self) -> &[[f64; STATE_COUNT]; STATE_COUNT] {
        &self.rows
    }

    #[must_use]
    pub const fn get(&self, from: usize, to: usize) -> f64 {
        self.rows[from][to]
    }

    /// Probability of busting from `from`. Column 0 only ever receives bust
    /// mass because every non-bust sum maps to state 1 or above.
    #[must_use]
    pub const fn bust_probability(&self, from: usize) -> f64 {
        self.rows[from][0]
    }

    /// Largest deviation of any row sum from 1.
    #[must_use]
    pub fn max_row_error(&self) -> f64 {
        self.rows
            .iter()
            .map(|row| (row.iter().sum::<f64>() - 1.0).abs())
            .fold(0.0, f64::max)
    }
}

impl fmt::Display for TransitionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "from\\to")?;
        for to in 0..STATE_COUNT {
            write!(f, " {to:>8}")?;
        }
        writeln!(f)?;
        for (from, row) in self.rows.iter().enumerate() {
            write!(f, "{from:>7}")?;
            for p in row {
                write!(f, " {p:>8.5}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Sum the roll-sum probabilities into the state each roll leads to.
#[must_use]
pub fn build_transitions(params: &GameParams, dist: &SumDistribution) -> TransitionMatrix {
    let band = params.fail_band();
    let mut rows = [[0.0; STATE_COUNT]; STATE_COUNT];
    for (from, row) in rows.iter_mut().enumerate() {
        for (sum, p) in dist.iter() {
            let to = classify_roll(params, band, sum, from).next_state();
            row[to] += p;
        }
    }
    TransitionMatrix { rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::build_sum_distribution;

    fn default_matrix() -> TransitionMatrix {
        let params = GameParams::default();
        build_transitions(&params, &build_sum_distribution(params.dice_count))
    }

    #[test]
    fn yard_mapping_follows_thresholds() {
        let params = GameParams::default();
        assert_eq!(yard_for_sum(&params, 3), 1);
        assert_eq!(yard_for_sum(&params, 4), 1);
        assert_eq!(yard_for_sum(&params, 5), 2);
        assert_eq!(yard_for_sum(&params, 13), 3);
        assert_eq!(yard_for_sum(&params, 18), 4);
        assert_eq!(yard_for_sum(&params, 19), TERMINAL_STATE);
    }

    #[test]
    fn classify_respects_band_and_direction() {
        let params = GameParams::default();
        let band = params.fail_band();
        assert_eq!(classify_roll(&params, band, 10, 3), RollOutcome::Bust);
        assert_eq!(classify_roll(&params, band, 13, 1), RollOutcome::Advance(3));
        assert_eq!(classify_roll(&params, band, 4, 2), RollOutcome::Hold(2));
        assert_eq!(classify_roll(&params, band, 9, 0), RollOutcome::Bust);
    }

    #[test]
    fn rows_are_stochastic() {
        assert!(default_matrix().max_row_error() < 1e-12);
    }

    #[test]
    fn bust_mass_is_state_independent() {
        let matrix = default_matrix();
        // P(9..=12 on 3d6) = (25 + 27 + 27 + 25) / 216
        let expected = 104.0 / 216.0;
        for from in 0..STATE_COUNT {
            assert!((matrix.bust_probability(from) - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn no_transition_moves_backwards_except_bust() {
        let matrix = default_matrix();
        for from in 1..STATE_COUNT {
            for to in 1..from {
                assert!(matrix.get(from, to).abs() < f64::EPSILON);
            }
        }
    }

    #[test]
    fn display_prints_one_line_per_state() {
        let text = default_matrix().to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), STATE_COUNT + 1);
        assert!(lines[0].starts_with("from\\to"));
        assert!(lines[1].starts_with("      0  0.48148"));
        assert!(lines[TERMINAL_STATE + 1].ends_with(" 0.51852"));
    }

    #[test]
    fn unreachable_terminal_state_has_no_mass() {
        // threshold_4 = 18 = max sum, so state 5 is only reachable by staying
        let matrix = default_matrix();
        for from in 0..TERMINAL_STATE {
            assert!(matrix.get(from, TERMINAL_STATE).abs() < f64::EPSILON);
        }
        assert!((matrix.get(TERMINAL_STATE, TERMINAL_STATE) - 112.0 / 216.0).abs() < 1e-12);
    }
}
