mod reports;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::{Path, PathBuf};

use razzle_engine::{
    DistributionCache, EvaluatorConfig, ExactObjective, GameModel, GameParams,
    MonteCarloEvaluator, MonteCarloObjective, Objective, PolicyValueObjective, SearchOutcome,
    SeedSource, ThresholdStrategy, TuningConfig, TuningReport, anneal, exact_profit_distribution,
    hill_climb, simulate_tally, single_roll_profile,
};
use reports::{
    CommandReport, DistributionSummary, EvaluationSummary, OptimizeSummary, PolicySummary,
    write_console, write_json,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Coloured human-readable summary
    Console,
    /// Pretty-printed JSON
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SearchMethod {
    /// Coordinate descent with unit steps
    HillClimb,
    /// Simulated annealing
    Anneal,
}

impl SearchMethod {
    const fn label(self) -> &'static str {
        match self {
            Self::HillClimb => "hill_climb",
            Self::Anneal => "anneal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ObjectiveKind {
    /// Empirical Monte Carlo mean and win rate
    MonteCarlo,
    /// Exact distribution under the optimal policy
    Exact,
    /// Closed-form policy value (profit only)
    PolicyValue,
}

#[derive(Debug, Parser)]
#[command(name = "razzle-tuner", version = "0.1.0")]
#[command(about = "Solve, simulate and tune the razzle dice game")]
struct Args {
    /// Parameter file in key=value format (built-in defaults when omitted)
    #[arg(long, global = true)]
    params: Option<PathBuf>,

    /// Output report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Console, global = true)]
    report: ReportFormat,

    /// Optional path to write the report output instead of stdout
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Verbose output (debug logging unless RUST_LOG is set)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Solve the optimal stopping policy and print the transition model
    Policy,
    /// Estimate mean profit and win rate by parallel simulation
    Evaluate {
        #[arg(long, default_value_t = 100_000)]
        runs: u64,
        /// Worker threads (defaults to available parallelism)
        #[arg(long)]
        workers: Option<usize>,
        /// Fixed seed for reproducible runs
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Exact profit distribution by dynamic programming
    Exact {
        /// Play the fixed house strategy instead of the optimal policy
        #[arg(long)]
        house_rule: bool,
    },
    /// Outcome distribution of a single roll
    OneRoll,
    /// Tally a small sequential experiment under the house strategy
    Experiment {
        #[arg(long, default_value_t = 50)]
        games: u64,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Search the parameters toward the configured targets
    Optimize {
        #[arg(long, value_enum, default_value_t = SearchMethod::HillClimb)]
        method: SearchMethod,
        #[arg(long, value_enum, default_value_t = ObjectiveKind::Exact)]
        objective: ObjectiveKind,
        /// Tuning configuration (JSON, every field optional)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Games per candidate for the Monte Carlo objective
        #[arg(long, default_value_t = 50_000)]
        runs: u64,
        #[arg(long)]
        workers: Option<usize>,
        /// Seed shared by every candidate evaluation (common random numbers)
        #[arg(long)]
        seed: Option<u64>,
        /// Write the final key=value report to this file
        #[arg(long)]
        save: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let params = load_params(args.params.as_deref())?;
    let report = run_command(&args.command, &params)?;

    if args.output.is_some() {
        colored::control::set_override(false);
    }
    let mut output_target = OutputTarget::new(args.output.clone())?;
    match args.report {
        ReportFormat::Console => write_console(output_target.writer(), &report)?,
        ReportFormat::Json => write_json(output_target.writer(), &report)?,
    }
    output_target.flush_inner()?;
    Ok(())
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .try_init();
}

fn load_params(path: Option<&Path>) -> Result<GameParams> {
    let Some(path) = path else {
        return Ok(GameParams::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read parameter file {}", path.display()))?;
    GameParams::from_kv_str(&text)
        .with_context(|| format!("invalid parameter file {}", path.display()))
}

fn load_tuning_config(path: Option<&Path>) -> Result<TuningConfig> {
    let Some(path) = path else {
        return Ok(TuningConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read tuning config {}", path.display()))?;
    let config = TuningConfig::from_json(&text)
        .with_context(|| format!("invalid tuning config {}", path.display()))?;
    config.validate().context("tuning config rejected")?;
    Ok(config)
}

fn evaluator_config(workers: Option<usize>, seed: Option<u64>) -> EvaluatorConfig {
    let defaults = EvaluatorConfig::default();
    EvaluatorConfig {
        workers: workers.unwrap_or(defaults.workers),
        seed: seed.map_or(SeedSource::Entropy, SeedSource::Fixed),
    }
}

fn derive_model(params: &GameParams) -> Result<GameModel> {
    GameModel::derive(params, &mut DistributionCache::new()).context("failed to derive game model")
}

fn run_command(command: &Command, params: &GameParams) -> Result<CommandReport> {
    match command {
        Command::Policy => Ok(CommandReport::Policy(PolicySummary::from(&derive_model(
            params,
        )?))),
        Command::Evaluate {
            runs,
            workers,
            seed,
        } => {
            let config = evaluator_config(*workers, *seed);
            let mut evaluator =
                MonteCarloEvaluator::new(config).context("failed to start evaluator")?;
            let evaluation = evaluator
                .evaluate(params, *runs)
                .context("Monte Carlo evaluation failed")?;
            Ok(CommandReport::Evaluate(EvaluationSummary {
                evaluation,
                workers: config.workers,
                theoretical_ev: derive_model(params)?.theoretical_ev(),
            }))
        }
        Command::Exact { house_rule } => {
            let dist = if *house_rule {
                exact_profit_distribution(params, &ThresholdStrategy::house_rule())
            } else {
                exact_profit_distribution(params, &derive_model(params)?.policy())
            }
            .context("exact distribution failed")?;
            let rule = if *house_rule { "house rule" } else { "optimal policy" };
            Ok(CommandReport::Exact(DistributionSummary::new(rule, &dist)))
        }
        Command::OneRoll => {
            let profile = single_roll_profile(params).context("single-roll profile failed")?;
            Ok(CommandReport::OneRoll(DistributionSummary::new(
                "single roll",
                &profile,
            )))
        }
        Command::Experiment { games, seed } => {
            if *games == 0 {
                bail!("experiment needs at least one game");
            }
            let mut rng = seed.map_or_else(SmallRng::from_entropy, SmallRng::seed_from_u64);
            let tally =
                simulate_tally(params, &ThresholdStrategy::house_rule(), *games, &mut rng)
                    .context("experiment failed")?;
            Ok(CommandReport::Experiment {
                games: *games,
                tally: DistributionSummary::new("house rule", &tally),
            })
        }
        Command::Optimize {
            method,
            objective,
            config,
            runs,
            workers,
            seed,
            save,
        } => {
            let tuning = load_tuning_config(config.as_deref())?;
            let mut objective_impl: Box<dyn Objective> = match objective {
                ObjectiveKind::MonteCarlo => Box::new(
                    MonteCarloObjective::new(evaluator_config(*workers, *seed), *runs)
                        .context("failed to start Monte Carlo objective")?,
                ),
                ObjectiveKind::Exact => Box::new(ExactObjective::new()),
                ObjectiveKind::PolicyValue => Box::new(PolicyValueObjective::new()),
            };
            let outcome = search(*method, params, objective_impl.as_mut(), &tuning)?;
            let report = TuningReport::build(&outcome.params, &outcome.estimate)
                .context("failed to build tuning report")?;
            if let Some(path) = save {
                save_report(path, &report)?;
            }
            Ok(CommandReport::Optimize(OptimizeSummary::new(
                method.label(),
                objective_impl.name(),
                &outcome,
                report,
            )))
        }
    }
}

fn search(
    method: SearchMethod,
    params: &GameParams,
    objective: &mut dyn Objective,
    config: &TuningConfig,
) -> Result<SearchOutcome> {
    eprintln!(
        "{} {} search from {}",
        "🎲".bright_cyan(),
        method.label(),
        params.fail_band()
    );
    let outcome = match method {
        SearchMethod::HillClimb => hill_climb(params, objective, config),
        SearchMethod::Anneal => anneal(params, objective, config),
    }
    .context("parameter search failed")?;
    log::info!(
        "{} finished after {} iterations and {} evaluations, loss {:.6}, converged: {}",
        method.label(),
        outcome.iterations,
        outcome.evaluations,
        outcome.loss,
        outcome.converged
    );
    Ok(outcome)
}

fn save_report(path: &Path, report: &TuningReport) -> Result<()> {
    let mut file = BufWriter::new(
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
    );
    file.write_all(report.to_kv_string().as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;
    file.flush()?;
    log::info!("wrote tuned parameters to {}", path.display());
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "razzle-tuner-{label}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ))
    }

    #[test]
    fn args_parse_global_flags_after_subcommand() {
        let args = Args::try_parse_from([
            "razzle-tuner",
            "evaluate",
            "--runs",
            "10",
            "--report",
            "json",
            "--seed",
            "3",
        ])
        .unwrap();
        assert_eq!(args.report, ReportFormat::Json);
        assert!(matches!(
            args.command,
            Command::Evaluate {
                runs: 10,
                seed: Some(3),
                ..
            }
        ));
    }

    #[test]
    fn missing_params_file_is_an_error() {
        let err = load_params(Some(Path::new("/nonexistent/razzle.params"))).unwrap_err();
        assert!(err.to_string().contains("failed to read parameter file"));
    }

    #[test]
    fn params_file_round_trips() {
        let path = temp_path("params");
        std::fs::write(&path, GameParams::default().to_kv_string()).unwrap();
        assert_eq!(load_params(Some(&path)).unwrap(), GameParams::default());
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn evaluator_config_maps_seed() {
        let config = evaluator_config(Some(2), Some(9));
        assert_eq!(config.workers, 2);
        assert_eq!(config.seed, SeedSource::Fixed(9));
        assert_eq!(evaluator_config(None, None).seed, SeedSource::Entropy);
    }

    #[test]
    fn optimize_saves_a_readable_report() {
        let path = temp_path("report");
        let command = Command::Optimize {
            method: SearchMethod::HillClimb,
            objective: ObjectiveKind::PolicyValue,
            config: None,
            runs: 1,
            workers: None,
            seed: None,
            save: Some(path.clone()),
        };
        let report = run_command(&command, &GameParams::default()).unwrap();
        assert!(matches!(report, CommandReport::Optimize(_)));
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("final_theoretical_ev="));
        assert!(GameParams::from_kv_str(&text).is_ok());
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn zero_game_experiment_is_rejected() {
        let command = Command::Experiment {
            games: 0,
            seed: Some(1),
        };
        assert!(run_command(&command, &GameParams::default()).is_err());
    }

    #[test]
    fn output_target_writes_file() {
        let path = temp_path("out");
        let mut target = OutputTarget::new(Some(path.clone())).unwrap();
        writeln!(target.writer(), "hello").unwrap();
        target.flush_inner().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello\n");
        let _ = std::fs::remove_file(path);
    }
}
