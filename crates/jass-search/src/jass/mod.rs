//! Jass card play and trump selection as search [`Board`](crate::board::Board)s.

mod board;
mod playout;
mod player;
mod trump;

pub use board::{BeliefEstimator, JassBoard, JassBoardError, ScoreEstimator};
pub use playout::{HeavyPlayout, LightPlayout, advisable_cards, sensible_cards};
pub use player::{JassPlayer, Observation, PlayoutKind};
pub use trump::{DealMove, TrumpBoard, TrumpBoardError, TrumpCall};
