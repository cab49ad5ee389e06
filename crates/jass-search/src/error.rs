use thiserror::Error;

use crate::config::ValidationError;

/// Failures surfaced by a search instead of a move.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search budget must allow at least one simulation")]
    InvalidBudget,
    #[error("cannot search from a terminal position")]
    TerminalBoard,
    #[error("position has no legal moves")]
    NoLegalMoves,
    #[error("no simulation completed before the budget ran out")]
    NoSimulations,
    #[error("all {workers} search workers failed")]
    AllWorkersFailed { workers: usize },
    #[error("could not determinize the position: {0}")]
    Determinization(String),
    #[error("search worker {index} panicked: {message}")]
    WorkerPanicked { index: usize, message: String },
    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error("invalid search configuration: {0}")]
    Config(#[from] ValidationError),
    #[error("invalid position: {0}")]
    Position(String),
}
