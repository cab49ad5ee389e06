use crate::config::{SearchBudget, SearchConfig, StrengthLevel};
use crate::error::SearchError;
use crate::mcts::Mcts;
use jass_core::model::card::Card;
use jass_core::model::game::GameState;
use jass_core::model::hand::Hand;
use jass_core::model::mode::Mode;
use jass_core::model::seat::Seat;
use jass_core::model::trick::Trick;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::board::{JassBoard, ScoreEstimator};
use super::playout::{HeavyPlayout, LightPlayout};
use super::trump::{DealMove, TrumpBoard, TrumpCall};

/// Everything a seat knows when it has to play a card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub mode: Mode,
    pub seat: Seat,
    pub hand: Vec<Card>,
    pub history: Vec<Trick>,
    pub current_trick: Trick,
}

impl Observation {
    /// What `seat` sees of a running game.
    pub fn of(game: &GameState, seat: Seat) -> Self {
        Self {
            mode: game.mode(),
            seat,
            hand: game.hand(seat).cards().to_vec(),
            history: game.trick_history().to_vec(),
            current_trick: game.current_trick().clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayoutKind {
    #[default]
    Random,
    Light,
    Heavy,
}

/// Jass agent backed by determinized MCTS, for both the trump announcement
/// and the card play.
pub struct JassPlayer {
    mcts: Mcts<JassBoard>,
    trump_mcts: Mcts<TrumpBoard>,
    strength: Option<StrengthLevel>,
    sensible_rollouts: bool,
    score_estimator: Option<Arc<dyn ScoreEstimator>>,
}

impl JassPlayer {
    /// Builds a player; worker pools are started when the configuration asks
    /// for more than one determinization.
    pub fn new(config: SearchConfig, playout: PlayoutKind) -> Result<Self, SearchError> {
        let parallel = config.determinizations > 1;
        let threads = config.threads;
        let trump_config = SearchConfig {
            seed: config.seed.wrapping_add(1),
            ..config.clone()
        };
        let mcts = Mcts::new(config)?;
        let trump_mcts = Mcts::new(trump_config)?;
        let (mut mcts, mut trump_mcts) = match playout {
            PlayoutKind::Random => (mcts, trump_mcts),
            PlayoutKind::Light => (
                mcts.with_playout(LightPlayout),
                trump_mcts.with_playout(LightPlayout),
            ),
            PlayoutKind::Heavy => (
                mcts.with_playout(HeavyPlayout),
                trump_mcts.with_playout(HeavyPlayout),
            ),
        };
        if parallel {
            mcts.enable_root_parallelization(threads)?;
            trump_mcts.enable_root_parallelization(threads)?;
        }
        Ok(Self {
            mcts,
            trump_mcts,
            strength: None,
            sensible_rollouts: false,
            score_estimator: None,
        })
    }

    /// Scales the number of determinizations with the cards still hidden.
    pub fn with_strength(mut self, level: StrengthLevel) -> Result<Self, SearchError> {
        let threads = self.mcts.config().threads;
        if !self.mcts.is_parallel() {
            self.mcts.enable_root_parallelization(threads)?;
        }
        if !self.trump_mcts.is_parallel() {
            self.trump_mcts.enable_root_parallelization(threads)?;
        }
        self.strength = Some(level);
        Ok(self)
    }

    pub fn with_sensible_rollouts(mut self, enabled: bool) -> Self {
        self.sensible_rollouts = enabled;
        self
    }

    pub fn with_score_estimator(mut self, estimator: Arc<dyn ScoreEstimator>) -> Self {
        self.score_estimator = Some(estimator);
        self
    }

    pub fn strength(&self) -> Option<StrengthLevel> {
        self.strength
    }

    /// Budget implied by the strength level, if one is set.
    pub fn default_budget(&self) -> Option<SearchBudget> {
        self.strength.map(StrengthLevel::time_budget)
    }

    /// Picks a legal card for the seat of `observation`.
    pub fn choose_card(
        &mut self,
        observation: &Observation,
        budget: SearchBudget,
    ) -> Result<Card, SearchError> {
        let game = GameState::from_observation(
            observation.mode,
            observation.seat,
            Hand::with_cards(observation.hand.clone()),
            observation.history.clone(),
            observation.current_trick.clone(),
        )
        .map_err(|err| SearchError::Position(err.to_string()))?;

        let seat = observation.seat;
        if game.current_player() != Some(seat) {
            return Err(SearchError::Position(format!("{seat} is not to move")));
        }
        let legal = game.legal_cards(seat);
        match legal.as_slice() {
            [] => return Err(SearchError::NoLegalMoves),
            [only] => {
                debug!(%seat, card = %only, "single legal card");
                return Ok(*only);
            }
            _ => {}
        }

        if let Some(level) = self.strength {
            self.mcts
                .set_determinizations(level.determinizations(game.tricks_completed()))?;
        }

        let attempts = self.mcts.config().sampling_attempts;
        let mut board = JassBoard::new(game, seat)
            .with_sensible_rollouts(self.sensible_rollouts)
            .with_sampling_attempts(attempts);
        if let Some(estimator) = &self.score_estimator {
            board = board.with_score_estimator(Arc::clone(estimator));
        }

        let result = self.mcts.search(&board, budget)?;
        let chosen = result.best_move;
        if chosen.seat != seat || !legal.contains(&chosen.card) {
            return Err(SearchError::Position(format!(
                "search returned {chosen}, which {seat} cannot play"
            )));
        }
        debug!(
            %seat,
            card = %chosen.card,
            simulations = result.simulations,
            workers = result.workers,
            failed = result.failed_workers,
            tricks = board.game().tricks_completed(),
            "card chosen"
        );
        Ok(chosen.card)
    }

    /// Announces trump for `chooser`, or for its partner when `shifted`.
    ///
    /// `hand` belongs to the deciding seat. Shifting is only offered while
    /// `shifted` is false.
    pub fn choose_trump(
        &mut self,
        chooser: Seat,
        hand: &[Card],
        shifted: bool,
        budget: SearchBudget,
    ) -> Result<TrumpCall, SearchError> {
        let board = TrumpBoard::new(chooser, hand.to_vec(), shifted)
            .map_err(|err| SearchError::Position(err.to_string()))?
            .with_sensible_rollouts(self.sensible_rollouts);
        let decider = board.decider();

        if let Some(level) = self.strength {
            self.trump_mcts
                .set_determinizations(level.trump_determinizations())?;
        }

        let result = self.trump_mcts.search(&board, budget)?;
        match result.best_move {
            DealMove::Call { seat, call } if seat == decider && (!shifted || call != TrumpCall::Shift) => {
                debug!(
                    seat = %decider,
                    %call,
                    shifted,
                    simulations = result.simulations,
                    workers = result.workers,
                    failed = result.failed_workers,
                    "trump chosen"
                );
                Ok(call)
            }
            other => Err(SearchError::Position(format!(
                "search returned {other}, which is no announcement for {decider}"
            ))),
        }
    }

    pub fn shutdown(&mut self) {
        self.mcts.shutdown();
        self.trump_mcts.shutdown();
    }
}
