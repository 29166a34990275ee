use razzle_engine::{
    EngineError, Estimate, EvaluatorConfig, ExactObjective, GameParams, MonteCarloObjective,
    Objective, ParamKey, PolicyValueObjective, SeedSource, Targets, TuningConfig, TuningReport,
    anneal, hill_climb,
};

/// Wraps an objective and asserts every measured candidate is admissible.
struct Guarded<O> {
    inner: O,
    config: TuningConfig,
    seen: usize,
}

impl<O: Objective> Objective for Guarded<O> {
    fn measure(&mut self, params: &GameParams) -> Result<Estimate, EngineError> {
        assert_eq!(self.config.bounds.admits(params), Ok(()), "{params:?}");
        assert!(params.thresholds.windows(2).all(|w| w[0] < w[1]));
        assert!(params.payouts.windows(2).all(|w| w[0] <= w[1]));
        self.seen += 1;
        self.inner.measure(params)
    }

    fn name(&self) -> &'static str {
        "guarded"
    }
}

fn guarded<O: Objective>(inner: O, config: &TuningConfig) -> Guarded<O> {
    Guarded {
        inner,
        config: config.clone(),
        seen: 0,
    }
}

#[test]
fn hill_climb_only_measures_admissible_candidates() {
    let config = TuningConfig {
        max_iterations: 5,
        ..TuningConfig::default()
    };
    let mut objective = guarded(ExactObjective::new(), &config);
    let outcome = hill_climb(&GameParams::default(), &mut objective, &config).unwrap();
    assert_eq!(u64::try_from(objective.seen).unwrap(), outcome.evaluations);
    assert_eq!(config.bounds.admits(&outcome.params), Ok(()));
}

#[test]
fn annealing_only_measures_admissible_candidates() {
    let config = TuningConfig {
        max_iterations: 40,
        targets: Targets {
            mean_profit: -0.25,
            win_rate: None,
        },
        ..TuningConfig::default()
    };
    let mut objective = guarded(PolicyValueObjective::new(), &config);
    let outcome = anneal(&GameParams::default(), &mut objective, &config).unwrap();
    assert_eq!(u64::try_from(objective.seen).unwrap(), outcome.evaluations);
    assert_eq!(config.bounds.admits(&outcome.params), Ok(()));
}

/// Mean profit equals the stake, so lower stakes are always closer to a
/// target below the admissible range.
struct StakeLine;

impl Objective for StakeLine {
    fn measure(&mut self, params: &GameParams) -> Result<Estimate, EngineError> {
        Ok(Estimate {
            mean_profit: f64::from(params.stake),
            win_rate: None,
        })
    }

    fn name(&self) -> &'static str {
        "stake_line"
    }
}

#[test]
fn hill_climb_reports_no_improvement_at_local_optimum() {
    let config = TuningConfig {
        targets: Targets {
            mean_profit: 0.0,
            win_rate: None,
        },
        frozen: ParamKey::ALL
            .into_iter()
            .filter(|&key| key != ParamKey::Stake)
            .collect(),
        ..TuningConfig::default()
    };
    let params = GameParams {
        stake: config.bounds.stake.min,
        ..GameParams::default()
    };
    let mut objective = guarded(StakeLine, &config);
    let outcome = hill_climb(&params, &mut objective, &config).unwrap();

    assert!(outcome.loss > config.tolerance);
    assert_eq!(outcome.params, params);
    assert!(outcome.converged);
    assert_eq!(outcome.iterations, 1);
    // the start point plus stake + 1; stake - 1 is outside the bounds
    assert_eq!(outcome.evaluations, 2);
    assert_eq!(objective.seen, 2);
}

#[test]
fn hill_climb_stops_at_once_when_already_on_target() {
    let params = GameParams::default();
    let mut objective = ExactObjective::new();
    let start = objective.measure(&params).unwrap();
    let config = TuningConfig {
        targets: Targets {
            mean_profit: start.mean_profit,
            win_rate: start.win_rate,
        },
        ..TuningConfig::default()
    };
    let outcome = hill_climb(&params, &mut objective, &config).unwrap();
    assert_eq!(outcome.params, params);
    assert!(outcome.converged);
    assert_eq!(outcome.iterations, 0);
    assert!(outcome.loss.abs() < 1e-12);
}

#[test]
fn hill_climb_improves_the_exact_loss() {
    let config = TuningConfig {
        max_iterations: 10,
        ..TuningConfig::default()
    };
    let mut objective = ExactObjective::new();
    let outcome = hill_climb(&GameParams::default(), &mut objective, &config).unwrap();
    let first = outcome.history.first().map(|r| r.best_loss).unwrap();
    let start = objective.measure(&GameParams::default()).unwrap();
    let start_loss = razzle_engine::optimizer::loss(&start, &config.targets, &config.weights);
    assert!(first < start_loss);
    assert!(outcome.loss <= first);
}

#[test]
fn monte_carlo_objective_with_fixed_seed_is_deterministic() {
    let config = TuningConfig {
        max_iterations: 2,
        frozen: vec![ParamKey::DiceCount, ParamKey::RollBudget],
        ..TuningConfig::default()
    };
    let run = || {
        let mut objective = MonteCarloObjective::new(
            EvaluatorConfig {
                workers: 2,
                seed: SeedSource::Fixed(11),
            },
            4_000,
        )
        .unwrap();
        hill_climb(&GameParams::default(), &mut objective, &config).unwrap()
    };
    assert_eq!(run(), run());
}

#[test]
fn outcome_feeds_a_readable_report() {
    let config = TuningConfig {
        max_iterations: 3,
        ..TuningConfig::default()
    };
    let outcome = hill_climb(&GameParams::default(), &mut ExactObjective::new(), &config).unwrap();
    let report = TuningReport::build(&outcome.params, &outcome.estimate).unwrap();
    let parsed = GameParams::from_kv_str(&report.to_kv_string()).unwrap();
    assert_eq!(parsed, outcome.params);
}
