//! Razzle Game Engine
//!
//! Numerical core for the razzle press-your-luck dice game: dice-sum
//! distributions, the progress-state transition model, the optimal stopping
//! policy, single-game simulation, parallel Monte Carlo evaluation, the exact
//! profit distribution, and the parameter search that tunes the house edge.
//! This crate performs no I/O; callers supply parameters and consume results.

pub mod bounds;
pub mod constants;
pub mod distribution;
pub mod error;
pub mod evaluator;
pub mod exact;
pub mod numbers;
pub mod optimizer;
pub mod params;
pub mod policy;
pub mod report;
pub mod simulator;
pub mod transitions;

// Re-export commonly used types
pub use bounds::{Bound, ParamBounds};
pub use distribution::{DistributionCache, SumDistribution, build_sum_distribution};
pub use error::EngineError;
pub use evaluator::{
    Evaluation, EvaluatorConfig, MonteCarloEvaluator, SeedSource, WorkerTally, evaluate,
};
pub use exact::{ProfitDistribution, exact_profit_distribution, single_roll_profile};
pub use optimizer::{
    AnnealingSchedule, Estimate, ExactObjective, LossWeights, MonteCarloObjective, Objective,
    PolicyValueObjective, SearchOutcome, Targets, TuningConfig, anneal, hill_climb,
};
pub use params::{
    BustRule, ExhaustionRule, FailBand, GameParams, GameRules, ParamKey, ParamsError, StakeMode,
};
pub use policy::{GameModel, Policy, Solution, ValueVector, solve};
pub use report::TuningReport;
pub use simulator::{Simulator, StopRule, ThresholdStrategy, play_one_game, simulate_tally};
pub use transitions::{RollOutcome, TransitionMatrix, build_transitions, classify_roll};
