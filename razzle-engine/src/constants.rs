//! Centralized constants for the razzle model.
//!
//! The state space, solver limits and seed-derivation tags live here so the
//! distribution, transition, solver and evaluator modules agree on them.

// Dice and state space ------------------------------------------------------
pub const FACES: i32 = 6;
/// Largest die count a parameter set may name; keeps sums inside `i32` and
/// the convolution tractable.
pub const MAX_DICE: i32 = 1_000;
pub const STATE_COUNT: usize = 6;
pub const TERMINAL_STATE: usize = 5;
pub const THRESHOLD_COUNT: usize = 4;
pub const PAYOUT_COUNT: usize = 5;

// Policy solver -------------------------------------------------------------
pub const MIN_SWEEPS: usize = 100;
pub const MAX_SWEEPS: usize = 100_000;
pub const CONVERGENCE_TOLERANCE: f64 = 1e-12;

// Invariant checks ----------------------------------------------------------
pub const PROBABILITY_TOLERANCE: f64 = 1e-9;

// Seed derivation -----------------------------------------------------------
pub(crate) const WORKER_STREAM_TAG: &[u8] = b"razzle.worker";

// Key=value report keys that are written but never read back as parameters.
pub(crate) const REPORT_ONLY_KEYS: [&str; 4] = [
    "final_mean_profit",
    "final_win_rate",
    "final_theoretical_ev",
    "no_score_window",
];
