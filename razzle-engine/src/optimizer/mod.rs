//! Constrained integer search over [`GameParams`].
//!
//! Both searches score candidates with an [`Objective`] and a squared-error
//! loss against [`Targets`]. Candidates outside [`ParamBounds`] are discarded
//! before they are measured.
mod annealing;
mod hill_climb;

pub use annealing::anneal;
pub use hill_climb::hill_climb;

use serde::{Deserialize, Serialize};

use crate::bounds::ParamBounds;
use crate::distribution::DistributionCache;
use crate::error::EngineError;
use crate::evaluator::{EvaluatorConfig, MonteCarloEvaluator};
use crate::exact::exact_with_distribution;
use crate::params::{GameParams, ParamKey};
use crate::policy::GameModel;

/// Measured economics of one parameter set, from the player's side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub mean_profit: f64,
    pub win_rate: Option<f64>,
}

/// Scores a candidate parameter set.
pub trait Objective {
    /// # Errors
    ///
    /// Fails when the candidate cannot be evaluated.
    fn measure(&mut self, params: &GameParams) -> Result<Estimate, EngineError>;

    fn name(&self) -> &'static str;
}

/// Empirical mean and win rate from the Monte Carlo evaluator. With a fixed
/// seed every candidate sees the same random streams.
#[derive(Debug)]
pub struct MonteCarloObjective {
    evaluator: MonteCarloEvaluator,
    runs: u64,
}

impl MonteCarloObjective {
    /// # Errors
    ///
    /// Fails when the evaluator pool cannot be built.
    pub fn new(config: EvaluatorConfig, runs: u64) -> Result<Self, EngineError> {
        if runs == 0 {
            return Err(EngineError::NoRuns);
        }
        Ok(Self {
            evaluator: MonteCarloEvaluator::new(config)?,
            runs,
        })
    }
}

impl Objective for MonteCarloObjective {
    fn measure(&mut self, params: &GameParams) -> Result<Estimate, EngineError> {
        let eval = self.evaluator.evaluate(params, self.runs)?;
        Ok(Estimate {
            mean_profit: eval.mean_profit,
            win_rate: Some(eval.win_rate),
        })
    }

    fn name(&self) -> &'static str {
        "monte_carlo"
    }
}

/// Mean and win rate from the exact outcome distribution under the optimal
/// policy.
#[derive(Debug, Default)]
pub struct ExactObjective {
    cache: DistributionCache,
}

impl ExactObjective {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cache: DistributionCache::new(),
        }
    }
}

impl Objective for ExactObjective {
    fn measure(&mut self, params: &GameParams) -> Result<Estimate, EngineError> {
        let model = GameModel::derive(params, &mut self.cache)?;
        let dist = exact_with_distribution(params, &model.distribution, &model.policy());
        Ok(Estimate {
            mean_profit: dist.expected_value(),
            win_rate: Some(dist.win_rate()),
        })
    }

    fn name(&self) -> &'static str {
        "exact"
    }
}

/// Closed-form value of a fresh game from the policy solver. Carries no
/// win rate, so only the profit term of the loss applies.
#[derive(Debug, Default)]
pub struct PolicyValueObjective {
    cache: DistributionCache,
}

impl PolicyValueObjective {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cache: DistributionCache::new(),
        }
    }
}

impl Objective for PolicyValueObjective {
    fn measure(&mut self, params: &GameParams) -> Result<Estimate, EngineError> {
        let model = GameModel::derive(params, &mut self.cache)?;
        Ok(Estimate {
            mean_profit: model.theoretical_ev(),
            win_rate: None,
        })
    }

    fn name(&self) -> &'static str {
        "policy_value"
    }
}

/// Desired player-side economics. A negative mean profit is the house edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Targets {
    #[serde(default = "Targets::default_mean_profit")]
    pub mean_profit: f64,
    #[serde(default = "Targets::default_win_rate")]
    pub win_rate: Option<f64>,
}

impl Targets {
    const fn default_mean_profit() -> f64 {
        -0.25
    }

    #[allow(clippy::unnecessary_wraps)]
    const fn default_win_rate() -> Option<f64> {
        Some(0.4)
    }
}

impl Default for Targets {
    fn default() -> Self {
        Self {
            mean_profit: Self::default_mean_profit(),
            win_rate: Self::default_win_rate(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LossWeights {
    #[serde(default = "LossWeights::default_weight")]
    pub profit: f64,
    #[serde(default = "LossWeights::default_weight")]
    pub win_rate: f64,
}

impl LossWeights {
    const fn default_weight() -> f64 {
        1.0
    }
}

impl Default for LossWeights {
    fn default() -> Self {
        Self {
            profit: Self::default_weight(),
            win_rate: Self::default_weight(),
        }
    }
}

/// Weighted squared deviation from the targets. The win-rate term applies
/// only when both a target and a measurement exist.
#[must_use]
pub fn loss(estimate: &Estimate, targets: &Targets, weights: &LossWeights) -> f64 {
    let profit_err = estimate.mean_profit - targets.mean_profit;
    let mut total = weights.profit * profit_err * profit_err;
    if let (Some(target), Some(measured)) = (targets.win_rate, estimate.win_rate) {
        let err = measured - target;
        total += weights.win_rate * err * err;
    }
    total
}

/// Simulated annealing schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnealingSchedule {
    #[serde(default = "AnnealingSchedule::default_start_temperature")]
    pub start_temperature: f64,
    #[serde(default = "AnnealingSchedule::default_end_temperature")]
    pub end_temperature: f64,
    #[serde(default = "AnnealingSchedule::default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "AnnealingSchedule::default_step_sizes")]
    pub step_sizes: Vec<i32>,
    /// Probability of taking the sign that moves mean profit toward target.
    #[serde(default = "AnnealingSchedule::default_bias")]
    pub bias: f64,
    #[serde(default = "AnnealingSchedule::default_reset_interval")]
    pub reset_interval: usize,
    #[serde(default = "AnnealingSchedule::default_patience")]
    pub patience: usize,
    #[serde(default = "AnnealingSchedule::default_seed")]
    pub seed: u64,
}

impl AnnealingSchedule {
    const fn default_start_temperature() -> f64 {
        0.5
    }

    const fn default_end_temperature() -> f64 {
        1e-4
    }

    const fn default_batch_size() -> usize {
        8
    }

    fn default_step_sizes() -> Vec<i32> {
        vec![1, 2, 3]
    }

    const fn default_bias() -> f64 {
        0.75
    }

    const fn default_reset_interval() -> usize {
        50
    }

    const fn default_patience() -> usize {
        150
    }

    const fn default_seed() -> u64 {
        0x5EED_D1CE
    }

    /// Geometric temperature at `iteration` of `total`.
    #[must_use]
    pub fn temperature(&self, iteration: usize, total: usize) -> f64 {
        if total <= 1 {
            return self.start_temperature;
        }
        let progress = crate::numbers::usize_to_f64(iteration.min(total - 1))
            / crate::numbers::usize_to_f64(total - 1);
        self.start_temperature * (self.end_temperature / self.start_temperature).powf(progress)
    }

    fn validate(&self) -> Result<(), EngineError> {
        if !(self.start_temperature > 0.0 && self.end_temperature > 0.0) {
            return Err(EngineError::InvalidSchedule(
                "temperatures must be positive".to_string(),
            ));
        }
        if self.end_temperature > self.start_temperature {
            return Err(EngineError::InvalidSchedule(format!(
                "end temperature {} exceeds start temperature {}",
                self.end_temperature, self.start_temperature
            )));
        }
        if self.batch_size == 0 {
            return Err(EngineError::InvalidSchedule(
                "batch size must be at least 1".to_string(),
            ));
        }
        if self.step_sizes.is_empty() || self.step_sizes.iter().any(|&step| step <= 0) {
            return Err(EngineError::InvalidSchedule(format!(
                "step sizes must be positive (got {:?})",
                self.step_sizes
            )));
        }
        if !(0.0..=1.0).contains(&self.bias) {
            return Err(EngineError::InvalidSchedule(format!(
                "bias {} is outside [0, 1]",
                self.bias
            )));
        }
        Ok(())
    }
}

impl Default for AnnealingSchedule {
    fn default() -> Self {
        Self {
            start_temperature: Self::default_start_temperature(),
            end_temperature: Self::default_end_temperature(),
            batch_size: Self::default_batch_size(),
            step_sizes: Self::default_step_sizes(),
            bias: Self::default_bias(),
            reset_interval: Self::default_reset_interval(),
            patience: Self::default_patience(),
            seed: Self::default_seed(),
        }
    }
}

/// Everything a search needs besides the starting point and objective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningConfig {
    #[serde(default)]
    pub targets: Targets,
    #[serde(default)]
    pub weights: LossWeights,
    #[serde(default = "TuningConfig::default_max_iterations")]
    pub max_iterations: usize,
    /// Loss at or below which a search stops early.
    #[serde(default = "TuningConfig::default_tolerance")]
    pub tolerance: f64,
    #[serde(default)]
    pub frozen: Vec<ParamKey>,
    #[serde(default)]
    pub bounds: ParamBounds,
    #[serde(default)]
    pub annealing: AnnealingSchedule,
}

impl TuningConfig {
    const fn default_max_iterations() -> usize {
        1000
    }

    const fn default_tolerance() -> f64 {
        1e-8
    }

    /// Keys the search may change, in search order.
    #[must_use]
    pub fn tunable_keys(&self) -> Vec<ParamKey> {
        ParamKey::ALL
            .into_iter()
            .filter(|key| !self.frozen.contains(key))
            .collect()
    }

    /// # Errors
    ///
    /// Returns the first inconsistent setting.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.tunable_keys().is_empty() {
            return Err(EngineError::EmptyTunableSet);
        }
        if self.max_iterations == 0 {
            return Err(EngineError::InvalidSchedule(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if self.tolerance < 0.0 {
            return Err(EngineError::InvalidSchedule(format!(
                "tolerance {} is negative",
                self.tolerance
            )));
        }
        self.annealing.validate()
    }

    /// Parse a JSON config, filling omitted fields with defaults.
    ///
    /// # Errors
    ///
    /// Fails on malformed JSON.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    fn loss(&self, estimate: &Estimate) -> f64 {
        loss(estimate, &self.targets, &self.weights)
    }
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            targets: Targets::default(),
            weights: LossWeights::default(),
            max_iterations: Self::default_max_iterations(),
            tolerance: Self::default_tolerance(),
            frozen: Vec::new(),
            bounds: ParamBounds::default(),
            annealing: AnnealingSchedule::default(),
        }
    }
}

/// Best point seen after one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration: usize,
    pub loss: f64,
    pub best_loss: f64,
}

/// Result of a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub params: GameParams,
    pub estimate: Estimate,
    pub loss: f64,
    pub iterations: usize,
    pub evaluations: u64,
    /// `false` when the search stopped on its iteration cap.
    pub converged: bool,
    pub history: Vec<IterationRecord>,
}

/// Shared bookkeeping for a search: admissibility, scoring and counting.
struct Scorer<'a, O: ?Sized> {
    objective: &'a mut O,
    config: &'a TuningConfig,
    evaluations: u64,
}

impl<'a, O: Objective + ?Sized> Scorer<'a, O> {
    const fn new(objective: &'a mut O, config: &'a TuningConfig) -> Self {
        Self {
            objective,
            config,
            evaluations: 0,
        }
    }

    fn admits(&self, params: &GameParams) -> bool {
        self.config.bounds.admits(params).is_ok()
    }

    fn score(&mut self, params: &GameParams) -> Result<(Estimate, f64), EngineError> {
        let estimate = self.objective.measure(params)?;
        self.evaluations += 1;
        let loss = self.config.loss(&estimate);
        log::debug!(
            "{} candidate mean={:.5} win_rate={:?} loss={loss:.6}",
            self.objective.name(),
            estimate.mean_profit,
            estimate.win_rate
        );
        Ok((estimate, loss))
    }

    /// Score the starting point, which must itself be admissible.
    fn start(&mut self, params: &GameParams) -> Result<(Estimate, f64), EngineError> {
        self.config.validate()?;
        self.config.bounds.admits(params)?;
        self.score(params)
    }
}
