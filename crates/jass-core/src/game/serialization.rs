use crate::model::card::Card;
use crate::model::game::{GameState, StateError};
use crate::model::hand::Hand;
use crate::model::mode::Mode;
use crate::model::trick::Trick;
use serde::{Deserialize, Serialize};

/// JSON-friendly picture of a game in progress.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameSnapshot {
    pub mode: Mode,
    pub hands: [Vec<Card>; 4],
    pub tricks: Vec<Trick>,
    pub current_trick: Trick,
}

impl GameSnapshot {
    pub fn capture(state: &GameState) -> Self {
        GameSnapshot {
            mode: state.mode(),
            hands: std::array::from_fn(|index| state.hands()[index].cards().to_vec()),
            tricks: state.trick_history().to_vec(),
            current_trick: state.current_trick().clone(),
        }
    }

    pub fn restore(self) -> Result<GameState, StateError> {
        let hands = self.hands.map(Hand::with_cards);
        GameState::from_parts(self.mode, hands, self.tricks, self.current_trick)
    }

    pub fn to_json(state: &GameState) -> serde_json::Result<String> {
        let snapshot = Self::capture(state);
        serde_json::to_string_pretty(&snapshot)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
