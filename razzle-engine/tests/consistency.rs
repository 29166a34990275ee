//! Cross-checks between the policy solver, the exact DP and Monte Carlo.
use rand::SeedableRng;
use rand::rngs::SmallRng;
use razzle_engine::{
    BustRule, DistributionCache, EvaluatorConfig, ExhaustionRule, GameModel, GameParams,
    GameRules, MonteCarloEvaluator, SeedSource, StakeMode, ThresholdStrategy,
    exact_profit_distribution, simulate_tally,
};

fn keep_payout(params: GameParams) -> GameParams {
    GameParams {
        rules: GameRules {
            exhaustion: ExhaustionRule::KeepPayout,
            ..params.rules
        },
        ..params
    }
}

#[test]
fn concrete_scenario_matches_known_distribution() {
    let params = GameParams::default();
    assert_eq!(params.fail_band().to_string(), "[9,12]");
    let model = GameModel::derive(&params, &mut DistributionCache::new()).unwrap();
    let dist = exact_profit_distribution(&params, &model.policy()).unwrap();

    assert!((dist.total_probability() - 1.0).abs() < 1e-6);
    assert!((dist.expected_value() - -0.509_434).abs() < 1e-6);
    assert!((dist.win_rate() - 0.509_434).abs() < 1e-6);
    assert!((dist.probability(1) - 0.245_283).abs() < 1e-6);
    assert!((dist.probability(2) - 0.169_811).abs() < 1e-6);
}

#[test]
fn long_budget_dp_matches_policy_value() {
    let variants = [
        GameParams::default(),
        GameParams {
            rules: GameRules {
                bust: BustRule::ResetsProgress,
                ..GameRules::default()
            },
            ..GameParams::default()
        },
        GameParams {
            stake_mode: StakeMode::PerRoll,
            stake: 1,
            ..GameParams::default()
        },
    ];
    for base in variants {
        let params = keep_payout(GameParams {
            roll_budget: 400,
            ..base
        });
        let model = GameModel::derive(&params, &mut DistributionCache::new()).unwrap();
        let dist = exact_profit_distribution(&params, &model.policy()).unwrap();
        assert!((dist.total_probability() - 1.0).abs() < 1e-6);
        assert!(
            (dist.expected_value() - model.theoretical_ev()).abs() < 1e-6,
            "dp {} vs policy {} for {:?}",
            dist.expected_value(),
            model.theoretical_ev(),
            params
        );
    }
}

#[test]
fn monte_carlo_converges_to_exact_value() {
    let params = GameParams::default();
    let model = GameModel::derive(&params, &mut DistributionCache::new()).unwrap();
    let exact = exact_profit_distribution(&params, &model.policy()).unwrap();
    let mean = exact.expected_value();
    let variance: f64 = exact
        .iter()
        .map(|(profit, p)| p * (profit as f64 - mean).powi(2))
        .sum();
    let sigma = variance.sqrt();
    let mut evaluator = MonteCarloEvaluator::new(EvaluatorConfig {
        workers: 4,
        seed: SeedSource::Fixed(2024),
    })
    .unwrap();

    let mut errors = Vec::new();
    for runs in [1_000_u64, 10_000, 1_000_000] {
        let eval = evaluator.evaluate(&params, runs).unwrap();
        assert_eq!(eval.games, runs);
        let scale = (runs as f64).sqrt();
        let error = (eval.mean_profit - mean).abs();
        assert!(error < 5.0 * sigma / scale, "{runs} runs: error {error}");
        // win indicator has standard deviation at most 0.5
        assert!((eval.win_rate - exact.win_rate()).abs() < 2.5 / scale, "{runs} runs");
        errors.push(error);
    }
    assert!(errors[2] < 5.0 * sigma / 1_000_f64.sqrt() / 10.0);
}

#[test]
fn evaluator_result_is_independent_of_scheduling() {
    let params = GameParams::default();
    let config = EvaluatorConfig {
        workers: 3,
        seed: SeedSource::Fixed(7),
    };
    let first = MonteCarloEvaluator::new(config).unwrap().evaluate(&params, 30_000).unwrap();
    let second = MonteCarloEvaluator::new(config).unwrap().evaluate(&params, 30_000).unwrap();
    assert_eq!(first, second);
}

#[test]
fn house_rule_tally_tracks_exact_distribution() {
    let params = GameParams {
        roll_budget: 5,
        thresholds: [3, 7, 14, 16],
        payouts: [1, 2, 4, 6, 9],
        ..GameParams::default()
    };
    let rule = ThresholdStrategy::house_rule();
    let exact = exact_profit_distribution(&params, &rule).unwrap();
    let mut rng = SmallRng::seed_from_u64(50);
    let tally = simulate_tally(&params, &rule, 100_000, &mut rng).unwrap();
    for (profit, p) in exact.iter() {
        assert!((tally.probability(profit) - p).abs() < 0.01, "profit {profit}");
    }
    assert!((tally.total_probability() - 1.0).abs() < 1e-9);
}

#[test]
fn forfeit_rule_never_raises_value() {
    for budget in 1..=10 {
        let forfeit = GameParams {
            roll_budget: budget,
            ..GameParams::default()
        };
        let keep = keep_payout(forfeit.clone());
        let model = GameModel::derive(&forfeit, &mut DistributionCache::new()).unwrap();
        let a = exact_profit_distribution(&forfeit, &model.policy()).unwrap();
        let b = exact_profit_distribution(&keep, &model.policy()).unwrap();
        assert!(a.expected_value() <= b.expected_value() + 1e-12, "budget {budget}");
    }
}
