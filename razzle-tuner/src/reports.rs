use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use std::io::Write;

use razzle_engine::constants::STATE_COUNT;
use razzle_engine::{
    Evaluation, FailBand, GameModel, GameParams, ProfitDistribution, SearchOutcome,
    TransitionMatrix, TuningReport,
};

/// One `(profit, probability)` row of a distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OutcomeRow {
    pub profit: i64,
    pub probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionSummary {
    pub rule: String,
    pub outcomes: Vec<OutcomeRow>,
    pub total_probability: f64,
    pub expected_value: f64,
    pub win_rate: f64,
}

impl DistributionSummary {
    pub fn new(rule: impl Into<String>, dist: &ProfitDistribution) -> Self {
        Self {
            rule: rule.into(),
            outcomes: dist
                .iter()
                .map(|(profit, probability)| OutcomeRow {
                    profit,
                    probability,
                })
                .collect(),
            total_probability: dist.total_probability(),
            expected_value: dist.expected_value(),
            win_rate: dist.win_rate(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicySummary {
    pub params: GameParams,
    pub fail_band: FailBand,
    pub transitions: TransitionMatrix,
    pub policy: [bool; STATE_COUNT],
    pub values: [f64; STATE_COUNT],
    pub sweeps: usize,
    pub theoretical_ev: f64,
}

impl From<&GameModel> for PolicySummary {
    fn from(model: &GameModel) -> Self {
        Self {
            params: model.params.clone(),
            fail_band: model.params.fail_band(),
            transitions: model.transitions,
            policy: *model.policy().as_array(),
            values: model.solution.values,
            sweeps: model.solution.sweeps,
            theoretical_ev: model.theoretical_ev(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationSummary {
    pub evaluation: Evaluation,
    pub workers: usize,
    pub theoretical_ev: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizeSummary {
    pub method: String,
    pub objective: String,
    pub iterations: usize,
    pub evaluations: u64,
    pub converged: bool,
    pub loss: f64,
    pub report: TuningReport,
}

impl OptimizeSummary {
    pub fn new(method: &str, objective: &str, outcome: &SearchOutcome, report: TuningReport) -> Self {
        Self {
            method: method.to_string(),
            objective: objective.to_string(),
            iterations: outcome.iterations,
            evaluations: outcome.evaluations,
            converged: outcome.converged,
            loss: outcome.loss,
            report,
        }
    }
}

/// Result of one runner subcommand.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum CommandReport {
    Policy(PolicySummary),
    Evaluate(EvaluationSummary),
    Exact(DistributionSummary),
    OneRoll(DistributionSummary),
    Experiment { games: u64, tally: DistributionSummary },
    Optimize(OptimizeSummary),
}

pub fn write_json(writer: &mut dyn Write, report: &CommandReport) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, report)?;
    writeln!(writer)?;
    Ok(())
}

pub fn write_console(writer: &mut dyn Write, report: &CommandReport) -> Result<()> {
    match report {
        CommandReport::Policy(summary) => write_policy(writer, summary),
        CommandReport::Evaluate(summary) => write_evaluation(writer, summary),
        CommandReport::Exact(summary) => {
            heading(writer, "Exact profit distribution")?;
            write_distribution(writer, summary)
        }
        CommandReport::OneRoll(summary) => {
            heading(writer, "Single-roll outcome distribution")?;
            write_distribution(writer, summary)
        }
        CommandReport::Experiment { games, tally } => {
            heading(writer, &format!("Experiment tally ({games} games)"))?;
            write_distribution(writer, tally)
        }
        CommandReport::Optimize(summary) => write_optimize(writer, summary),
    }
}

fn heading(writer: &mut dyn Write, title: &str) -> Result<()> {
    writeln!(writer, "{}", title.bright_cyan().bold())?;
    writeln!(writer, "{}", "=".repeat(title.chars().count()).cyan())?;
    Ok(())
}

fn signed(value: f64) -> colored::ColoredString {
    let text = format!("{value:+.6}");
    if value < 0.0 { text.red() } else { text.green() }
}

fn write_policy(writer: &mut dyn Write, summary: &PolicySummary) -> Result<()> {
    heading(writer, "Optimal stopping policy")?;
    writeln!(writer, "No-score window: {}", summary.fail_band)?;
    writeln!(writer, "Value iteration sweeps: {}", summary.sweeps)?;
    writeln!(writer)?;
    writeln!(writer, "{}", "Transition matrix".bold())?;
    write!(writer, "{}", summary.transitions)?;
    writeln!(writer)?;
    writeln!(writer, "{}", "State  Action  Value".bold())?;
    for (state, (&go, value)) in summary.policy.iter().zip(summary.values).enumerate() {
        let action = if go { "roll".yellow() } else { "stop".green() };
        writeln!(writer, "{state:>5}  {action:<6}  {value:.6}")?;
    }
    writeln!(writer)?;
    writeln!(writer, "Theoretical EV: {}", signed(summary.theoretical_ev))?;
    Ok(())
}

fn write_evaluation(writer: &mut dyn Write, summary: &EvaluationSummary) -> Result<()> {
    heading(writer, "Monte Carlo evaluation")?;
    let eval = &summary.evaluation;
    writeln!(writer, "Games: {} on {} workers", eval.games, summary.workers)?;
    writeln!(writer, "Mean profit: {}", signed(eval.mean_profit))?;
    writeln!(writer, "Win rate: {:.4}%", eval.win_rate * 100.0)?;
    writeln!(writer, "Theoretical EV: {}", signed(summary.theoretical_ev))?;
    writeln!(
        writer,
        "Deviation: {:.6}",
        (eval.mean_profit - summary.theoretical_ev).abs()
    )?;
    Ok(())
}

fn write_distribution(writer: &mut dyn Write, summary: &DistributionSummary) -> Result<()> {
    writeln!(writer, "Stop rule: {}", summary.rule)?;
    writeln!(writer, "{}", "Profit  Probability".bold())?;
    for row in &summary.outcomes {
        writeln!(writer, "{:>6}  {:.6}", row.profit, row.probability)?;
    }
    writeln!(writer, "Expected value: {}", signed(summary.expected_value))?;
    writeln!(writer, "Win rate: {:.4}%", summary.win_rate * 100.0)?;
    writeln!(writer, "Sum of probabilities: {:.9}", summary.total_probability)?;
    Ok(())
}

fn write_optimize(writer: &mut dyn Write, summary: &OptimizeSummary) -> Result<()> {
    heading(writer, "Parameter search")?;
    writeln!(
        writer,
        "Method: {} with {} objective",
        summary.method, summary.objective
    )?;
    let status = if summary.converged {
        "converged".green()
    } else {
        "iteration cap".yellow()
    };
    writeln!(
        writer,
        "Iterations: {} ({status}), evaluations: {}",
        summary.iterations, summary.evaluations
    )?;
    writeln!(writer, "Final loss: {:.8}", summary.loss)?;
    writeln!(writer)?;
    write!(writer, "{}", summary.report.to_kv_string())?;
    Ok(())
}
