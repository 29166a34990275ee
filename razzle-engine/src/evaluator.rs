//! Parallel Monte Carlo evaluation of a parameter set.
//!
//! Each worker owns its simulator and RNG and returns a private
//! [`WorkerTally`]; tallies are combined once every worker has finished.
use hmac::{Hmac, Mac};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::constants::WORKER_STREAM_TAG;
use crate::distribution::DistributionCache;
use crate::error::EngineError;
use crate::numbers::{i64_to_f64, ratio, u64_to_f64, usize_to_u64};
use crate::params::GameParams;
use crate::policy::GameModel;
use crate::simulator::{Simulator, StopRule};

/// Where worker RNGs get their seeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedSource {
    #[default]
    Entropy,
    Fixed(u64),
}

impl SeedSource {
    fn worker_rng(self, worker: usize) -> SmallRng {
        match self {
            Self::Entropy => SmallRng::from_entropy(),
            Self::Fixed(seed) => SmallRng::seed_from_u64(derive_worker_seed(seed, worker)),
        }
    }
}

/// Independent per-worker seed: HMAC-SHA256 keyed by the user seed over the
/// worker tag and index.
#[must_use]
pub fn derive_worker_seed(user_seed: u64, worker: usize) -> u64 {
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(&user_seed.to_le_bytes()) else {
        return user_seed ^ usize_to_u64(worker);
    };
    mac.update(WORKER_STREAM_TAG);
    mac.update(&usize_to_u64(worker).to_le_bytes());
    let digest = mac.finalize().into_bytes();
    let mut seed_bytes = [0_u8; 8];
    seed_bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(seed_bytes)
}

/// Per-worker partial result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerTally {
    pub games: u64,
    pub profit_sum: i64,
    pub wins: u64,
}

impl WorkerTally {
    pub fn record(&mut self, profit: i64) {
        self.games += 1;
        self.profit_sum += profit;
        if profit > 0 {
            self.wins += 1;
        }
    }

    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        Self {
            games: self.games + other.games,
            profit_sum: self.profit_sum + other.profit_sum,
            wins: self.wins + other.wins,
        }
    }
}

/// Aggregate Monte Carlo statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub mean_profit: f64,
    pub win_rate: f64,
    pub games: u64,
}

impl From<WorkerTally> for Evaluation {
    fn from(tally: WorkerTally) -> Self {
        let mean_profit = if tally.games == 0 {
            0.0
        } else {
            i64_to_f64(tally.profit_sum) / u64_to_f64(tally.games)
        };
        Self {
            mean_profit,
            win_rate: ratio(tally.wins, tally.games),
            games: tally.games,
        }
    }
}

/// Split `total` runs over `workers`, spreading the remainder over the first
/// workers.
#[must_use]
pub fn split_runs(total: u64, workers: usize) -> Vec<u64> {
    if workers == 0 {
        return Vec::new();
    }
    let count = usize_to_u64(workers);
    let base = total / count;
    let extra = total % count;
    (0..count)
        .map(|idx| base + u64::from(idx < extra))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    pub workers: usize,
    #[serde(default)]
    pub seed: SeedSource,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism().map_or(4, usize::from),
            seed: SeedSource::Entropy,
        }
    }
}

/// Reusable evaluator owning a dedicated worker pool.
pub struct MonteCarloEvaluator {
    pool: rayon::ThreadPool,
    config: EvaluatorConfig,
    cache: DistributionCache,
}

impl std::fmt::Debug for MonteCarloEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonteCarloEvaluator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MonteCarloEvaluator {
    /// # Errors
    ///
    /// Fails when `config.workers` is zero or the pool cannot be built.
    pub fn new(config: EvaluatorConfig) -> Result<Self, EngineError> {
        if config.workers == 0 {
            return Err(EngineError::NoWorkers);
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|idx| format!("razzle-mc-{idx}"))
            .build()
            .map_err(|err| EngineError::ThreadPool(err.to_string()))?;
        Ok(Self {
            pool,
            config,
            cache: DistributionCache::new(),
        })
    }

    #[must_use]
    pub const fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Solve the optimal policy for `params` and play `total_runs` games
    /// under it.
    ///
    /// # Errors
    ///
    /// Fails on invalid parameters or a zero run count.
    pub fn evaluate(&mut self, params: &GameParams, total_runs: u64) -> Result<Evaluation, EngineError> {
        let model = GameModel::derive(params, &mut self.cache)?;
        self.evaluate_with_rule(params, &model.policy(), total_runs)
    }

    /// Play `total_runs` games of `params` under an arbitrary stop rule.
    ///
    /// # Errors
    ///
    /// Fails on invalid parameters or a zero run count.
    pub fn evaluate_with_rule<S>(
        &self,
        params: &GameParams,
        rule: &S,
        total_runs: u64,
    ) -> Result<Evaluation, EngineError>
    where
        S: StopRule + Sync + ?Sized,
    {
        if total_runs == 0 {
            return Err(EngineError::NoRuns);
        }
        params.validate()?;
        let shares = split_runs(total_runs, self.config.workers);
        let seed = self.config.seed;

        let tally = self.pool.install(|| {
            shares
                .par_iter()
                .enumerate()
                .map(|(worker, &runs)| run_worker(params, rule, seed, worker, runs))
                .collect::<Result<Vec<_>, EngineError>>()
        })?
        .into_iter()
        .fold(WorkerTally::default(), WorkerTally::merge);

        let evaluation = Evaluation::from(tally);
        log::debug!(
            "evaluated {} games on {} workers: mean={:.5} win_rate={:.5}",
            evaluation.games,
            self.config.workers,
            evaluation.mean_profit,
            evaluation.win_rate
        );
        Ok(evaluation)
    }
}

fn run_worker<S>(
    params: &GameParams,
    rule: &S,
    seed: SeedSource,
    worker: usize,
    runs: u64,
) -> Result<WorkerTally, EngineError>
where
    S: StopRule + ?Sized,
{
    let mut simulator = Simulator::new(params, seed.worker_rng(worker))?;
    let mut tally = WorkerTally::default();
    for _ in 0..runs {
        tally.record(simulator.play(rule));
    }
    Ok(tally)
}

/// One-shot evaluation with fresh entropy seeds.
///
/// # Errors
///
/// Fails on zero workers, zero runs, invalid parameters, or a pool that
/// cannot be built.
pub fn evaluate(params: &GameParams, total_runs: u64, workers: usize) -> Result<Evaluation, EngineError> {
    MonteCarloEvaluator::new(EvaluatorConfig {
        workers,
        seed: SeedSource::Entropy,
    })?
    .evaluate(params, total_runs)
}
