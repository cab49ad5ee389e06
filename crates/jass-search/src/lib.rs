pub mod board;
pub mod config;
pub mod error;
pub mod jass;
pub mod mcts;
pub mod pool;
pub mod tree;

#[cfg(test)]
mod testing;

pub use board::{
    Actor, Board, CallLocation, HeuristicFunction, PlayoutPolicy, RandomPlayout, SearchRng,
};
pub use config::{
    FinalSelection, SearchBudget, SearchConfig, StrengthLevel, ValidationError, VotePolicy,
};
pub use error::SearchError;
pub use jass::{
    BeliefEstimator, DealMove, HeavyPlayout, JassBoard, JassBoardError, JassPlayer, LightPlayout,
    Observation, PlayoutKind, ScoreEstimator, TrumpBoard, TrumpBoardError, TrumpCall,
};
pub use mcts::{Mcts, MoveVote, SearchResult};
pub use pool::WorkerPool;
