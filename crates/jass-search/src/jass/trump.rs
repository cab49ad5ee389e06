//! Trump selection as a search board.
//!
//! The seat whose turn it is to choose announces a mode or shifts the choice
//! to its partner, who then has to announce. After the announcement the deal
//! is played out card by card, so a tree sees the consequence of each mode.

use crate::board::{Actor, Board, CallLocation, PlayoutPolicy, SearchRng};
use jass_core::belief::{DeterminizationSampler, SamplingError};
use jass_core::model::card::Card;
use jass_core::model::game::{GameState, TRICKS_PER_GAME};
use jass_core::model::hand::Hand;
use jass_core::model::mode::Mode;
use jass_core::model::seat::Seat;
use jass_core::model::trick::Play;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::board::JassBoard;
use super::playout::{HeavyPlayout, LightPlayout};

/// What the deciding seat announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrumpCall {
    Mode(Mode),
    /// Passes the choice to the partner. Allowed once per deal.
    Shift,
}

impl TrumpCall {
    /// Every announcement open to the deciding seat.
    pub fn options(shifted: bool) -> Vec<TrumpCall> {
        let mut calls: Vec<TrumpCall> = Mode::ALL.into_iter().map(TrumpCall::Mode).collect();
        if !shifted {
            calls.push(TrumpCall::Shift);
        }
        calls
    }

    pub fn mode(self) -> Option<Mode> {
        match self {
            TrumpCall::Mode(mode) => Some(mode),
            TrumpCall::Shift => None,
        }
    }
}

impl fmt::Display for TrumpCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrumpCall::Mode(mode) => write!(f, "{mode}"),
            TrumpCall::Shift => f.write_str("shift"),
        }
    }
}

/// A move in a trump-phase tree: an announcement, then the card play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DealMove {
    Call { seat: Seat, call: TrumpCall },
    Card(Play),
}

impl fmt::Display for DealMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DealMove::Call { seat, call } => write!(f, "{seat} calls {call}"),
            DealMove::Card(play) => write!(f, "{play}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum TrumpBoardError {
    #[error("{seat} must hold 9 cards before trump is chosen, holds {actual}")]
    HandSize { seat: Seat, actual: usize },
    #[error(transparent)]
    Sampling(#[from] SamplingError),
}

/// A deal before trump is announced, seen from the deciding seat.
///
/// `chooser` leads the first trick whoever ends up announcing. Only the
/// deciding seat's hand is known until [`Board::redeterminize`] deals the
/// other 27 cards at random.
#[derive(Debug, Clone)]
pub struct TrumpBoard {
    chooser: Seat,
    shifted: bool,
    perspective: Seat,
    hands: [Hand; 4],
    play: Option<JassBoard>,
    perfect_information: bool,
    sensible_rollouts: bool,
}

impl TrumpBoard {
    /// The decision of `chooser`, or of its partner once the choice was shifted.
    pub fn new(chooser: Seat, hand: Vec<Card>, shifted: bool) -> Result<Self, TrumpBoardError> {
        let perspective = if shifted { chooser.partner() } else { chooser };
        if hand.len() != TRICKS_PER_GAME {
            return Err(TrumpBoardError::HandSize {
                seat: perspective,
                actual: hand.len(),
            });
        }
        let mut hands: [Hand; 4] = Default::default();
        hands[perspective.index()] = Hand::with_cards(hand);
        Ok(Self {
            chooser,
            shifted,
            perspective,
            hands,
            play: None,
            perfect_information: false,
            sensible_rollouts: false,
        })
    }

    /// A board over the true deal, searched without sampling.
    pub fn perfect_information(chooser: Seat, hands: [Hand; 4], shifted: bool) -> Self {
        Self {
            chooser,
            shifted,
            perspective: if shifted { chooser.partner() } else { chooser },
            hands,
            play: None,
            perfect_information: true,
            sensible_rollouts: false,
        }
    }

    pub fn with_sensible_rollouts(mut self, enabled: bool) -> Self {
        self.sensible_rollouts = enabled;
        self
    }

    pub fn chooser(&self) -> Seat {
        self.chooser
    }

    pub fn is_shifted(&self) -> bool {
        self.shifted
    }

    /// The seat that has to announce next.
    pub fn decider(&self) -> Seat {
        if self.shifted {
            self.chooser.partner()
        } else {
            self.chooser
        }
    }

    pub fn hand(&self, seat: Seat) -> &Hand {
        &self.hands[seat.index()]
    }

    /// The card-play board, once a mode has been announced.
    pub fn card_play(&self) -> Option<&JassBoard> {
        self.play.as_ref()
    }
}

impl Board for TrumpBoard {
    type Move = DealMove;
    type Error = TrumpBoardError;

    fn duplicate(&self) -> Self {
        self.clone()
    }

    fn redeterminize(&self, rng: &mut SearchRng) -> Result<Self, Self::Error> {
        if self.perfect_information || self.play.is_some() {
            return Ok(self.clone());
        }
        let own = &self.hands[self.perspective.index()];
        let dealt = DeterminizationSampler::deal_unseen(self.perspective, own, rng)?;
        let mut copy = self.clone();
        copy.hands = dealt.into_hands();
        Ok(copy)
    }

    fn legal_moves(&self, location: CallLocation) -> Vec<DealMove> {
        match &self.play {
            Some(play) => play
                .legal_moves(location)
                .into_iter()
                .map(DealMove::Card)
                .collect(),
            None => {
                let seat = self.decider();
                TrumpCall::options(self.shifted)
                    .into_iter()
                    .map(|call| DealMove::Call { seat, call })
                    .collect()
            }
        }
    }

    fn apply_move(&mut self, mv: &DealMove) {
        if let Some(board) = &mut self.play {
            match mv {
                DealMove::Card(play) => board.apply_move(play),
                DealMove::Call { .. } => panic!("search applied an illegal move {mv}"),
            }
            return;
        }
        match mv {
            DealMove::Call {
                call: TrumpCall::Shift,
                ..
            } if !self.shifted => self.shifted = true,
            DealMove::Call {
                call: TrumpCall::Mode(mode),
                ..
            } => {
                let game = GameState::from_hands(self.hands.clone(), self.chooser, *mode);
                self.play = Some(
                    JassBoard::perfect_information(game, self.perspective)
                        .with_sensible_rollouts(self.sensible_rollouts),
                );
            }
            _ => panic!("search applied an illegal move {mv}"),
        }
    }

    fn is_terminal(&self) -> bool {
        self.play.as_ref().is_some_and(JassBoard::is_terminal)
    }

    fn current_actor(&self) -> Actor {
        match &self.play {
            Some(play) => play.current_actor(),
            None => Actor::Player(self.decider().index()),
        }
    }

    fn player_count(&self) -> usize {
        Seat::LOOP.len()
    }

    fn score_vector(&self) -> Vec<f64> {
        match &self.play {
            Some(play) => play.score_vector(),
            None => vec![0.0; Seat::LOOP.len()],
        }
    }
}

/// Runs a card-play policy once the mode is fixed; announcements in a rollout
/// are drawn uniformly.
fn delegate_rollout<P: PlayoutPolicy<JassBoard>>(
    policy: &P,
    board: &TrumpBoard,
    moves: &[DealMove],
    rng: &mut SearchRng,
) -> usize {
    let plays: Option<Vec<Play>> = moves
        .iter()
        .map(|mv| match mv {
            DealMove::Card(play) => Some(*play),
            DealMove::Call { .. } => None,
        })
        .collect();
    match (board.card_play(), plays) {
        (Some(inner), Some(plays)) if !plays.is_empty() => policy.choose(inner, &plays, rng),
        _ => rng.gen_range(0..moves.len()),
    }
}

impl PlayoutPolicy<TrumpBoard> for LightPlayout {
    fn choose(&self, board: &TrumpBoard, moves: &[DealMove], rng: &mut SearchRng) -> usize {
        delegate_rollout(self, board, moves, rng)
    }

    fn name(&self) -> &'static str {
        "light"
    }
}

impl PlayoutPolicy<TrumpBoard> for HeavyPlayout {
    fn choose(&self, board: &TrumpBoard, moves: &[DealMove], rng: &mut SearchRng) -> usize {
        delegate_rollout(self, board, moves, rng)
    }

    fn name(&self) -> &'static str {
        "heavy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jass_core::model::deck::Deck;
    use rand::SeedableRng;
    use rand::seq::SliceRandom;

    fn dealt(seed: u64) -> [Hand; 4] {
        GameState::deal(&Deck::shuffled_with_seed(seed), Seat::North, Mode::TopDown)
            .hands()
            .clone()
    }

    #[test]
    fn chooser_may_shift_once() {
        let hands = dealt(1);
        let mut board = TrumpBoard::perfect_information(Seat::East, hands, false);
        let moves = board.legal_moves(CallLocation::TreePolicy);
        assert_eq!(moves.len(), Mode::ALL.len() + 1);
        assert_eq!(board.current_actor(), Actor::Player(Seat::East.index()));

        board.apply_move(&DealMove::Call {
            seat: Seat::East,
            call: TrumpCall::Shift,
        });
        assert!(board.is_shifted());
        assert_eq!(board.current_actor(), Actor::Player(Seat::West.index()));
        let moves = board.legal_moves(CallLocation::TreePolicy);
        assert_eq!(moves.len(), Mode::ALL.len());
        assert!(moves.iter().all(|mv| matches!(
            mv,
            DealMove::Call { seat: Seat::West, call: TrumpCall::Mode(_) }
        )));
    }

    #[test]
    fn announcement_starts_play_led_by_the_chooser() {
        let hands = dealt(2);
        let mut board = TrumpBoard::perfect_information(Seat::South, hands.clone(), true);
        board.apply_move(&DealMove::Call {
            seat: Seat::North,
            call: TrumpCall::Mode(Mode::BottomUp),
        });

        let play = board.card_play().expect("card play started");
        assert_eq!(play.game().mode(), Mode::BottomUp);
        assert_eq!(play.game().hands(), &hands);
        assert_eq!(board.current_actor(), Actor::Player(Seat::South.index()));
        assert!(
            board
                .legal_moves(CallLocation::TreePolicy)
                .iter()
                .all(|mv| matches!(mv, DealMove::Card(play) if play.seat == Seat::South))
        );
    }

    #[test]
    fn random_announcement_and_play_reach_a_score() {
        let mut board = TrumpBoard::perfect_information(Seat::West, dealt(3), false);
        let mut rng = SearchRng::seed_from_u64(4);
        let mut plies = 0;
        while !board.is_terminal() {
            let moves = board.legal_moves(CallLocation::Playout);
            let mv = *moves.choose(&mut rng).expect("move");
            board.apply_move(&mv);
            plies += 1;
        }
        assert!(plies >= 37);
        let total: f64 = board.score_vector().iter().sum();
        assert!(total > 0.0);
    }

    #[test]
    fn redeterminization_deals_the_unseen_cards() {
        let hands = dealt(5);
        let own = hands[Seat::North.index()].cards().to_vec();
        let board = TrumpBoard::new(Seat::North, own, false).expect("board");
        assert!(board.hand(Seat::East).is_empty());

        let mut rng = SearchRng::seed_from_u64(9);
        let sampled = board.redeterminize(&mut rng).expect("deal");
        assert_eq!(sampled.hand(Seat::North), &hands[Seat::North.index()]);
        for seat in Seat::LOOP {
            assert_eq!(sampled.hand(seat).len(), 9);
        }
    }

    #[test]
    fn partner_decides_after_a_shift() {
        let hands = dealt(6);
        let partner_hand = hands[Seat::South.index()].cards().to_vec();
        let board = TrumpBoard::new(Seat::North, partner_hand, true).expect("board");
        assert_eq!(board.decider(), Seat::South);
        assert_eq!(board.hand(Seat::South), &hands[Seat::South.index()]);
        assert!(
            board
                .legal_moves(CallLocation::TreePolicy)
                .iter()
                .all(|mv| !matches!(mv, DealMove::Call { call: TrumpCall::Shift, .. }))
        );
    }

    #[test]
    fn short_hand_is_rejected() {
        let mut cards = dealt(7)[0].cards().to_vec();
        cards.truncate(5);
        let err = TrumpBoard::new(Seat::North, cards, false).expect_err("short hand");
        assert!(matches!(err, TrumpBoardError::HandSize { actual: 5, .. }));
    }
}
