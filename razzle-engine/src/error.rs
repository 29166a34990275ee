//! Errors surfaced at the evaluator and optimizer boundary.
use thiserror::Error;

use crate::params::ParamsError;

#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error(transparent)]
    Params(#[from] ParamsError),
    #[error("at least one worker is required")]
    NoWorkers,
    #[error("at least one run is required")]
    NoRuns,
    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),
    #[error("every tunable key is frozen; nothing to search")]
    EmptyTunableSet,
    #[error("invalid search schedule: {0}")]
    InvalidSchedule(String),
}
