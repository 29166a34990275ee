use super::{IterationRecord, Objective, Scorer, SearchOutcome, TuningConfig};
use crate::error::EngineError;
use crate::params::GameParams;

/// Coordinate descent with unit steps.
///
/// Each pass walks the tunable keys in order and tries `+1` then `-1`; the
/// first admissible move that strictly lowers the loss is kept and the pass
/// moves on to the next key. The search ends after a pass with no
/// improvement, at the loss tolerance, or at `max_iterations` passes.
///
/// # Errors
///
/// Fails when the configuration is invalid, the initial parameters are not
/// admissible, or the objective fails.
pub fn hill_climb<O: Objective + ?Sized>(
    initial: &GameParams,
    objective: &mut O,
    config: &TuningConfig,
) -> Result<SearchOutcome, EngineError> {
    let mut scorer = Scorer::new(objective, config);
    let (mut estimate, mut best_loss) = scorer.start(initial)?;
    let mut current = initial.clone();
    let keys = config.tunable_keys();
    let mut history = Vec::new();
    let mut iterations = 0;
    let mut converged = false;

    while iterations < config.max_iterations {
        if best_loss <= config.tolerance {
            converged = true;
            break;
        }
        iterations += 1;
        let mut improved = false;
        for &key in &keys {
            let original = current.get(key);
            for delta in [1, -1] {
                let candidate = current.with(key, original + delta);
                if !scorer.admits(&candidate) {
                    continue;
                }
                let (cand_estimate, cand_loss) = scorer.score(&candidate)?;
                if cand_loss < best_loss {
                    log::debug!("{key} -> {} (loss {cand_loss:.6})", original + delta);
                    current = candidate;
                    estimate = cand_estimate;
                    best_loss = cand_loss;
                    improved = true;
                    break;
                }
            }
        }
        log::info!(
            "hill climb pass {iterations}: mean={:.5} loss={best_loss:.6}",
            estimate.mean_profit
        );
        history.push(IterationRecord {
            iteration: iterations,
            loss: best_loss,
            best_loss,
        });
        if !improved {
            converged = true;
            break;
        }
    }
    if !converged {
        log::warn!("hill climb stopped at the {}-pass cap", config.max_iterations);
    }

    Ok(SearchOutcome {
        params: current,
        estimate,
        loss: best_loss,
        iterations,
        evaluations: scorer.evaluations,
        converged,
        history,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::{ExactObjective, Estimate, PolicyValueObjective, Targets};
    use crate::params::ParamKey;

    /// Loss depends on stake only, minimised at stake 5.
    struct StakeBowl;

    impl Objective for StakeBowl {
        fn measure(&mut self, params: &GameParams) -> Result<Estimate, EngineError> {
            Ok(Estimate {
                mean_profit: f64::from(params.stake - 5),
                win_rate: None,
            })
        }

        fn name(&self) -> &'static str {
            "stake_bowl"
        }
    }

    fn bowl_config() -> TuningConfig {
        TuningConfig {
            targets: Targets {
                mean_profit: 0.0,
                win_rate: None,
            },
            ..TuningConfig::default()
        }
    }

    #[test]
    fn walks_down_a_one_dimensional_bowl() {
        let outcome = hill_climb(&GameParams::default(), &mut StakeBowl, &bowl_config()).unwrap();
        assert_eq!(outcome.params.stake, 5);
        assert!(outcome.loss.abs() < f64::EPSILON);
        assert!(outcome.converged);
        assert!(outcome.evaluations > 1);
    }

    #[test]
    fn frozen_keys_never_move() {
        let config = TuningConfig {
            frozen: vec![ParamKey::Stake],
            max_iterations: 3,
            ..bowl_config()
        };
        let outcome = hill_climb(&GameParams::default(), &mut StakeBowl, &config).unwrap();
        assert_eq!(outcome.params.stake, GameParams::default().stake);
        assert!(outcome.converged);
        assert_eq!(outcome.iterations, 1);
    }

    #[test]
    fn stays_put_when_already_on_target() {
        let params = GameParams::default();
        let mut objective = PolicyValueObjective::new();
        let start = objective.measure(&params).unwrap();
        let config = TuningConfig {
            targets: Targets {
                mean_profit: start.mean_profit,
                win_rate: None,
            },
            ..TuningConfig::default()
        };
        let outcome = hill_climb(&params, &mut objective, &config).unwrap();
        assert_eq!(outcome.params, params);
        assert_eq!(outcome.evaluations, 1);
    }

    #[test]
    fn exact_objective_result_respects_bounds() {
        let config = TuningConfig {
            max_iterations: 4,
            ..TuningConfig::default()
        };
        let outcome = hill_climb(&GameParams::default(), &mut ExactObjective::new(), &config)
            .unwrap();
        assert_eq!(config.bounds.admits(&outcome.params), Ok(()));
        assert!(outcome.iterations <= 4);
    }

    #[test]
    fn inadmissible_start_is_an_error() {
        let params = GameParams::default().with(ParamKey::Stake, 20);
        assert!(matches!(
            hill_climb(&params, &mut StakeBowl, &bowl_config()),
            Err(EngineError::Params(_))
        ));
    }
}
