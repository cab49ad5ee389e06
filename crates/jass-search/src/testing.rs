//! Small boards for exercising the engine without card-game rules.

use crate::board::{Actor, Board, CallLocation, SearchRng};
use std::convert::Infallible;

/// Two players alternately take one or two stones; taking the last one wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Countdown {
    pub pile: u8,
    pub to_move: usize,
}

impl Countdown {
    pub fn new(pile: u8) -> Self {
        Self { pile, to_move: 0 }
    }
}

impl Board for Countdown {
    type Move = u8;
    type Error = Infallible;

    fn duplicate(&self) -> Self {
        self.clone()
    }

    fn redeterminize(&self, _rng: &mut SearchRng) -> Result<Self, Self::Error> {
        Ok(self.clone())
    }

    fn legal_moves(&self, _location: CallLocation) -> Vec<u8> {
        (1..=2).filter(|take| *take <= self.pile).collect()
    }

    fn apply_move(&mut self, mv: &u8) {
        assert!(*mv <= self.pile, "cannot take {mv} from {}", self.pile);
        self.pile -= mv;
        self.to_move = 1 - self.to_move;
    }

    fn is_terminal(&self) -> bool {
        self.pile == 0
    }

    fn current_actor(&self) -> Actor {
        Actor::Player(self.to_move)
    }

    fn player_count(&self) -> usize {
        2
    }

    fn score_vector(&self) -> Vec<f64> {
        if !self.is_terminal() {
            return vec![0.5, 0.5];
        }
        // The player who just moved took the last stone.
        let winner = 1 - self.to_move;
        (0..2).map(|p| if p == winner { 1.0 } else { 0.0 }).collect()
    }
}

/// Player 0 calls a coin, then a biased coin lands heads with probability 0.9.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BiasedCoin {
    pub call: Option<bool>,
    pub landed: Option<bool>,
}

impl Board for BiasedCoin {
    type Move = bool;
    type Error = Infallible;

    fn duplicate(&self) -> Self {
        self.clone()
    }

    fn redeterminize(&self, _rng: &mut SearchRng) -> Result<Self, Self::Error> {
        Ok(self.clone())
    }

    fn legal_moves(&self, _location: CallLocation) -> Vec<bool> {
        if self.is_terminal() {
            Vec::new()
        } else {
            vec![true, false]
        }
    }

    fn apply_move(&mut self, mv: &bool) {
        if self.call.is_none() {
            self.call = Some(*mv);
        } else {
            self.landed = Some(*mv);
        }
    }

    fn is_terminal(&self) -> bool {
        self.landed.is_some()
    }

    fn current_actor(&self) -> Actor {
        if self.call.is_none() {
            Actor::Player(0)
        } else {
            Actor::Chance
        }
    }

    fn player_count(&self) -> usize {
        1
    }

    fn score_vector(&self) -> Vec<f64> {
        let won = self.call.is_some() && self.call == self.landed;
        vec![if won { 1.0 } else { 0.0 }]
    }

    fn move_weights(&self) -> Vec<f64> {
        vec![0.9, 0.1]
    }
}

/// A position with a single legal move left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Forced {
    pub done: bool,
}

impl Board for Forced {
    type Move = &'static str;
    type Error = Infallible;

    fn duplicate(&self) -> Self {
        self.clone()
    }

    fn redeterminize(&self, _rng: &mut SearchRng) -> Result<Self, Self::Error> {
        Ok(self.clone())
    }

    fn legal_moves(&self, _location: CallLocation) -> Vec<&'static str> {
        if self.done { Vec::new() } else { vec!["only"] }
    }

    fn apply_move(&mut self, _mv: &&'static str) {
        self.done = true;
    }

    fn is_terminal(&self) -> bool {
        self.done
    }

    fn current_actor(&self) -> Actor {
        Actor::Player(0)
    }

    fn player_count(&self) -> usize {
        4
    }

    fn score_vector(&self) -> Vec<f64> {
        vec![0.25; 4]
    }
}
