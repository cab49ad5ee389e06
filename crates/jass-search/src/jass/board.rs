use crate::board::{Actor, Board, CallLocation, SearchRng};
use crate::config::DEFAULT_SAMPLING_ATTEMPTS;
use jass_core::belief::{
    CardKnowledge, DeterminizationSampler, Distribution, KnowledgeError, SamplingError,
};
use jass_core::model::card::Card;
use jass_core::model::game::GameState;
use jass_core::model::mode::{MAX_TEAM_POINTS, TOTAL_POINTS};
use jass_core::model::seat::{Seat, Team};
use jass_core::model::trick::Play;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use super::playout::sensible_cards;

/// Predicts the final points of `team` from a position.
pub trait ScoreEstimator: Send + Sync {
    fn estimate(&self, game: &GameState, team: Team) -> f64;
}

/// Supplies a belief over who holds each unseen card.
pub trait BeliefEstimator: Send + Sync {
    fn estimate(&self, game: &GameState, perspective: Seat) -> Vec<(Card, Distribution<Seat>)>;
}

#[derive(Debug, Error)]
pub enum JassBoardError {
    #[error(transparent)]
    Knowledge(#[from] KnowledgeError),
    #[error(transparent)]
    Sampling(#[from] SamplingError),
}

/// A card-play position seen from one seat.
///
/// Until [`Board::redeterminize`] runs, only the perspective hand is known;
/// the search always works on a redeterminized copy.
#[derive(Clone)]
pub struct JassBoard {
    game: GameState,
    perspective: Seat,
    perfect_information: bool,
    sensible_rollouts: bool,
    sampling_attempts: usize,
    score_estimator: Option<Arc<dyn ScoreEstimator>>,
    belief: Option<Arc<dyn BeliefEstimator>>,
}

impl JassBoard {
    pub fn new(game: GameState, perspective: Seat) -> Self {
        Self {
            game,
            perspective,
            perfect_information: false,
            sensible_rollouts: false,
            sampling_attempts: DEFAULT_SAMPLING_ATTEMPTS,
            score_estimator: None,
            belief: None,
        }
    }

    /// A board that searches the true hands instead of sampling them.
    pub fn perfect_information(game: GameState, perspective: Seat) -> Self {
        Self {
            perfect_information: true,
            ..Self::new(game, perspective)
        }
    }

    pub fn with_sensible_rollouts(mut self, enabled: bool) -> Self {
        self.sensible_rollouts = enabled;
        self
    }

    pub fn with_sampling_attempts(mut self, attempts: usize) -> Self {
        self.sampling_attempts = attempts.max(1);
        self
    }

    pub fn with_score_estimator(mut self, estimator: Arc<dyn ScoreEstimator>) -> Self {
        self.score_estimator = Some(estimator);
        self
    }

    pub fn with_belief(mut self, belief: Arc<dyn BeliefEstimator>) -> Self {
        self.belief = Some(belief);
        self
    }

    pub fn game(&self) -> &GameState {
        &self.game
    }

    pub fn perspective(&self) -> Seat {
        self.perspective
    }

    pub fn is_perfect_information(&self) -> bool {
        self.perfect_information
    }

    pub fn sampling_attempts(&self) -> usize {
        self.sampling_attempts
    }

    fn knowledge(&self) -> Result<CardKnowledge, KnowledgeError> {
        match &self.belief {
            Some(belief) => {
                let estimates = belief.estimate(&self.game, self.perspective);
                CardKnowledge::from_distributions(&self.game, self.perspective, estimates)
            }
            None => CardKnowledge::from_game(&self.game, self.perspective),
        }
    }
}

impl fmt::Debug for JassBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JassBoard")
            .field("mode", &self.game.mode())
            .field("perspective", &self.perspective)
            .field("tricks_completed", &self.game.tricks_completed())
            .field("perfect_information", &self.perfect_information)
            .finish()
    }
}

impl Board for JassBoard {
    type Move = Play;
    type Error = JassBoardError;

    fn duplicate(&self) -> Self {
        self.clone()
    }

    fn redeterminize(&self, rng: &mut SearchRng) -> Result<Self, Self::Error> {
        if self.perfect_information {
            return Ok(self.clone());
        }
        let knowledge = self.knowledge()?;
        let determinization =
            DeterminizationSampler::sample_with_retries(&knowledge, rng, self.sampling_attempts, None)?;
        let mut copy = self.clone();
        copy.game = self.game.with_hands(determinization.into_hands());
        Ok(copy)
    }

    fn legal_moves(&self, location: CallLocation) -> Vec<Play> {
        let Some(seat) = self.game.current_player() else {
            return Vec::new();
        };
        let legal = self.game.legal_cards(seat);
        let cards = match location {
            CallLocation::Playout if self.sensible_rollouts => {
                sensible_cards(&self.game, seat, &legal)
            }
            _ => legal,
        };
        cards.into_iter().map(|card| Play::new(seat, card)).collect()
    }

    fn apply_move(&mut self, mv: &Play) {
        if let Err(err) = self.game.play_card(mv.seat, mv.card) {
            panic!("search applied an illegal move {mv}: {err}");
        }
    }

    fn is_terminal(&self) -> bool {
        self.game.is_finished()
    }

    fn current_actor(&self) -> Actor {
        let seat = self.game.current_player().unwrap_or(self.perspective);
        Actor::Player(seat.index())
    }

    fn player_count(&self) -> usize {
        Seat::LOOP.len()
    }

    fn score_vector(&self) -> Vec<f64> {
        self.game.score_vector().to_vec()
    }

    fn has_learned_evaluator(&self) -> bool {
        self.score_estimator.is_some()
    }

    /// The perspective team gets the estimate; the opponents get what is
    /// left of the regular points.
    fn estimate_score_vector(&self) -> Vec<f64> {
        let Some(estimator) = &self.score_estimator else {
            return self.score_vector();
        };
        let team = self.perspective.team();
        let own = estimator.estimate(&self.game, team).max(0.0);
        let other = (TOTAL_POINTS as f64 - own).max(0.0);
        Seat::LOOP
            .iter()
            .map(|seat| {
                let points = if seat.team() == team { own } else { other };
                points / MAX_TEAM_POINTS as f64
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jass_core::model::deck::Deck;
    use jass_core::model::mode::Mode;
    use jass_core::model::suit::Suit;
    use rand::SeedableRng;
    use rand::seq::SliceRandom;

    fn dealt(seed: u64) -> GameState {
        GameState::deal(
            &Deck::shuffled_with_seed(seed),
            Seat::North,
            Mode::Trump(Suit::Spades),
        )
    }

    fn observed(game: &GameState, seat: Seat) -> GameState {
        GameState::from_observation(
            game.mode(),
            seat,
            game.hand(seat).clone(),
            game.trick_history().to_vec(),
            game.current_trick().clone(),
        )
        .expect("observation")
    }

    #[test]
    fn redeterminization_keeps_own_hand_and_fills_the_rest() {
        let game = dealt(3);
        let board = JassBoard::new(observed(&game, Seat::North), Seat::North);
        let mut rng = SearchRng::seed_from_u64(1);

        let sampled = board.redeterminize(&mut rng).expect("sample");
        assert_eq!(sampled.game().hand(Seat::North), game.hand(Seat::North));
        for seat in Seat::LOOP {
            assert_eq!(sampled.game().hand(seat).len(), 9);
        }
        let mut ids: Vec<u8> = sampled
            .game()
            .hands()
            .iter()
            .flat_map(|hand| hand.iter().map(|card| card.id()))
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..36).collect::<Vec<u8>>());
    }

    #[test]
    fn sampling_attempts_follow_the_search_default() {
        let board = JassBoard::new(dealt(1), Seat::North);
        assert_eq!(
            board.sampling_attempts(),
            crate::config::SearchConfig::default().sampling_attempts
        );
        assert_eq!(board.with_sampling_attempts(0).sampling_attempts(), 1);
    }

    #[test]
    fn perfect_information_keeps_the_deal() {
        let game = dealt(5);
        let board = JassBoard::perfect_information(game.clone(), Seat::North);
        let mut rng = SearchRng::seed_from_u64(1);
        let copy = board.redeterminize(&mut rng).expect("copy");
        assert_eq!(copy.game(), &game);
    }

    #[test]
    fn duplicate_replays_to_the_same_score() {
        let game = dealt(8);
        let mut source = JassBoard::perfect_information(game, Seat::North);
        let mut copy = source.duplicate();
        let mut rng = SearchRng::seed_from_u64(21);

        while !source.is_terminal() {
            let moves = source.legal_moves(CallLocation::TreePolicy);
            let mv = *moves.choose(&mut rng).expect("move");
            source.apply_move(&mv);
            copy.apply_move(&mv);
        }
        assert!(copy.is_terminal());
        assert_eq!(source.score_vector(), copy.score_vector());
        let total: f64 = source.score_vector().iter().sum();
        assert!(total > 0.0);
    }

    #[test]
    fn duplicate_does_not_share_state() {
        let game = dealt(2);
        let source = JassBoard::perfect_information(game, Seat::North);
        let mut copy = source.duplicate();
        let mv = copy.legal_moves(CallLocation::TreePolicy)[0];
        copy.apply_move(&mv);
        assert_eq!(source.game().current_trick().plays().len(), 0);
        assert_eq!(copy.game().current_trick().plays().len(), 1);
    }

    struct Flat(f64);

    impl ScoreEstimator for Flat {
        fn estimate(&self, _game: &GameState, _team: Team) -> f64 {
            self.0
        }
    }

    #[test]
    fn estimator_splits_points_between_teams() {
        let board = JassBoard::perfect_information(dealt(1), Seat::East)
            .with_score_estimator(Arc::new(Flat(100.0)));
        assert!(board.has_learned_evaluator());
        let scores = board.estimate_score_vector();
        let own = 100.0 / MAX_TEAM_POINTS as f64;
        let other = 57.0 / MAX_TEAM_POINTS as f64;
        assert!((scores[Seat::East.index()] - own).abs() < 1e-12);
        assert!((scores[Seat::West.index()] - own).abs() < 1e-12);
        assert!((scores[Seat::North.index()] - other).abs() < 1e-12);

        let greedy = JassBoard::perfect_information(dealt(1), Seat::East)
            .with_score_estimator(Arc::new(Flat(200.0)));
        assert_eq!(greedy.estimate_score_vector()[Seat::South.index()], 0.0);
    }

    struct Uniform;

    impl BeliefEstimator for Uniform {
        fn estimate(&self, game: &GameState, perspective: Seat) -> Vec<(Card, Distribution<Seat>)> {
            let played = game.played_cards();
            (0..36u8)
                .filter_map(Card::from_id)
                .filter(|card| !played.contains(card) && !game.hand(perspective).contains(*card))
                .map(|card| {
                    let distribution = Distribution::uniform(Seat::LOOP).expect("uniform");
                    (card, distribution)
                })
                .collect()
        }
    }

    #[test]
    fn external_belief_drives_sampling() {
        let game = dealt(4);
        let board = JassBoard::new(observed(&game, Seat::North), Seat::North)
            .with_belief(Arc::new(Uniform));
        let mut rng = SearchRng::seed_from_u64(6);
        let sampled = board.redeterminize(&mut rng).expect("sample");
        assert_eq!(sampled.game().hand(Seat::North), game.hand(Seat::North));
        assert_eq!(sampled.game().hand(Seat::West).len(), 9);
    }

    #[test]
    fn only_the_seat_to_move_can_redeterminize() {
        let game = dealt(4);
        let board = JassBoard::new(observed(&game, Seat::North), Seat::South);
        let mut rng = SearchRng::seed_from_u64(6);
        assert!(matches!(
            board.redeterminize(&mut rng),
            Err(JassBoardError::Knowledge(_))
        ));
    }
}
