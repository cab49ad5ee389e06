use crate::model::card::{Card, DECK_SIZE};
use crate::model::deck::Deck;
use crate::model::hand::Hand;
use crate::model::mode::{LAST_TRICK_BONUS, MATCH_BONUS, MAX_TEAM_POINTS, Mode};
use crate::model::seat::{Seat, Team};
use crate::model::suit::Suit;
use crate::model::trick::{Play, Trick, TrickError};
use std::fmt;

pub const TRICKS_PER_GAME: usize = 9;

/// Card-play phase of one Jass game: nine tricks under a fixed mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameState {
    mode: Mode,
    hands: [Hand; 4],
    current_trick: Trick,
    trick_history: Vec<Trick>,
    team_points: [u32; 2],
    tricks_won: [u8; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    Played,
    TrickCompleted { winner: Seat, points: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayError {
    GameFinished,
    CardNotInHand(Card),
    OutOfTurn { expected: Seat, actual: Seat },
    IllegalCard { card: Card, lead: Option<Suit> },
    Trick(TrickError),
}

impl fmt::Display for PlayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayError::GameFinished => write!(f, "all tricks have been played"),
            PlayError::CardNotInHand(card) => write!(f, "{card} is not in the player's hand"),
            PlayError::OutOfTurn { expected, actual } => {
                write!(f, "expected {expected} to play next but got {actual}")
            }
            PlayError::IllegalCard { card, lead } => match lead {
                Some(suit) => write!(f, "{card} may not be played to a trick led with {suit}"),
                None => write!(f, "{card} may not be played"),
            },
            PlayError::Trick(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for PlayError {}

/// Reasons a partially observed game cannot be reconstructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    TooManyTricks(usize),
    IncompleteTrick(usize),
    LeaderMismatch {
        trick: usize,
        expected: Seat,
        actual: Seat,
    },
    DuplicateCard(Card),
    HandSize {
        seat: Seat,
        expected: usize,
        actual: usize,
    },
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateError::TooManyTricks(count) => {
                write!(f, "{count} completed tricks exceed the nine of a game")
            }
            StateError::IncompleteTrick(index) => write!(f, "trick {index} in history is incomplete"),
            StateError::LeaderMismatch {
                trick,
                expected,
                actual,
            } => write!(
                f,
                "trick {trick} should be led by {expected} (previous winner) but was led by {actual}"
            ),
            StateError::DuplicateCard(card) => write!(f, "{card} appears more than once"),
            StateError::HandSize {
                seat,
                expected,
                actual,
            } => write!(f, "{seat} should hold {expected} cards but holds {actual}"),
        }
    }
}

impl std::error::Error for StateError {}

impl GameState {
    /// Deals nine consecutive cards to each seat, North first.
    pub fn deal(deck: &Deck, leader: Seat, mode: Mode) -> Self {
        let hands = std::array::from_fn(|index| {
            let start = index * TRICKS_PER_GAME;
            Hand::with_cards(deck.cards()[start..start + TRICKS_PER_GAME].to_vec())
        });
        Self::from_hands(hands, leader, mode)
    }

    /// A fresh game over hands dealt elsewhere, e.g. once trump is announced.
    pub fn from_hands(hands: [Hand; 4], leader: Seat, mode: Mode) -> Self {
        Self {
            mode,
            hands,
            current_trick: Trick::new(leader),
            trick_history: Vec::with_capacity(TRICKS_PER_GAME),
            team_points: [0; 2],
            tricks_won: [0; 2],
        }
    }

    /// Rebuilds a game from explicit hands and history, replaying the score.
    ///
    /// Hands may be partial (hidden seats left empty); only seats that hold
    /// cards are checked against the expected hand size.
    pub fn from_parts(
        mode: Mode,
        hands: [Hand; 4],
        trick_history: Vec<Trick>,
        current_trick: Trick,
    ) -> Result<Self, StateError> {
        if trick_history.len() > TRICKS_PER_GAME {
            return Err(StateError::TooManyTricks(trick_history.len()));
        }

        let mut seen = [false; DECK_SIZE];
        let mut mark = |card: Card| -> Result<(), StateError> {
            let slot = &mut seen[card.id() as usize];
            if *slot {
                return Err(StateError::DuplicateCard(card));
            }
            *slot = true;
            Ok(())
        };
        for card in hands.iter().flat_map(|hand| hand.iter().copied()) {
            mark(card)?;
        }
        for play in trick_history
            .iter()
            .flat_map(|trick| trick.plays().iter())
            .chain(current_trick.plays().iter())
        {
            mark(play.card)?;
        }

        let mut state = Self {
            mode,
            hands,
            current_trick: Trick::new(current_trick.leader()),
            trick_history: Vec::with_capacity(TRICKS_PER_GAME),
            team_points: [0; 2],
            tricks_won: [0; 2],
        };

        let mut expected_leader: Option<Seat> = None;
        for (index, trick) in trick_history.into_iter().enumerate() {
            if !trick.is_complete() {
                return Err(StateError::IncompleteTrick(index));
            }
            if let Some(expected) = expected_leader {
                if expected != trick.leader() {
                    return Err(StateError::LeaderMismatch {
                        trick: index,
                        expected,
                        actual: trick.leader(),
                    });
                }
            }
            let winner = state.record_trick(trick);
            expected_leader = Some(winner);
        }

        if let Some(expected) = expected_leader {
            if expected != current_trick.leader() {
                return Err(StateError::LeaderMismatch {
                    trick: state.trick_history.len(),
                    expected,
                    actual: current_trick.leader(),
                });
            }
        }
        state.current_trick = current_trick;

        for seat in Seat::LOOP {
            let actual = state.hands[seat.index()].len();
            let expected = state.expected_hand_size(seat);
            if actual != 0 && actual != expected {
                return Err(StateError::HandSize {
                    seat,
                    expected,
                    actual,
                });
            }
        }

        Ok(state)
    }

    /// What one seat knows: its own hand plus the public history.
    pub fn from_observation(
        mode: Mode,
        seat: Seat,
        hand: Hand,
        trick_history: Vec<Trick>,
        current_trick: Trick,
    ) -> Result<Self, StateError> {
        let mut hands: [Hand; 4] = Default::default();
        hands[seat.index()] = hand;
        Self::from_parts(mode, hands, trick_history, current_trick)
    }

    /// Copy of this game with every hand replaced.
    pub fn with_hands(&self, hands: [Hand; 4]) -> Self {
        let mut copy = self.clone();
        copy.hands = hands;
        copy
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn hand(&self, seat: Seat) -> &Hand {
        &self.hands[seat.index()]
    }

    pub fn hands(&self) -> &[Hand; 4] {
        &self.hands
    }

    pub fn current_trick(&self) -> &Trick {
        &self.current_trick
    }

    pub fn trick_history(&self) -> &[Trick] {
        &self.trick_history
    }

    pub fn tricks_completed(&self) -> usize {
        self.trick_history.len()
    }

    pub fn is_finished(&self) -> bool {
        self.trick_history.len() == TRICKS_PER_GAME
    }

    pub fn current_player(&self) -> Option<Seat> {
        if self.is_finished() {
            None
        } else {
            Some(self.current_trick.next_to_play())
        }
    }

    /// Every play so far in order, completed tricks first.
    pub fn played_moves(&self) -> impl Iterator<Item = &Play> {
        self.trick_history
            .iter()
            .flat_map(|trick| trick.plays().iter())
            .chain(self.current_trick.plays().iter())
    }

    pub fn played_cards(&self) -> Vec<Card> {
        self.played_moves().map(|play| play.card).collect()
    }

    /// Cards `seat` still holds once every trick so far is accounted for.
    pub fn expected_hand_size(&self, seat: Seat) -> usize {
        let mut remaining = TRICKS_PER_GAME - self.trick_history.len();
        if self.current_trick.has_played(seat) {
            remaining -= 1;
        }
        remaining
    }

    pub fn team_points(&self, team: Team) -> u32 {
        self.team_points[team.index()]
    }

    pub fn tricks_won(&self, team: Team) -> u8 {
        self.tricks_won[team.index()]
    }

    pub fn legal_cards(&self, seat: Seat) -> Vec<Card> {
        let played = self.current_trick.cards();
        self.mode.legal_cards(&self.hands[seat.index()], &played)
    }

    /// Per-seat team points scaled to `[0, 1]` by the maximum a team can score.
    pub fn score_vector(&self) -> [f64; 4] {
        std::array::from_fn(|index| {
            let team = Seat::LOOP[index].team();
            self.team_points[team.index()] as f64 / MAX_TEAM_POINTS as f64
        })
    }

    pub fn play_card(&mut self, seat: Seat, card: Card) -> Result<PlayOutcome, PlayError> {
        let Some(expected) = self.current_player() else {
            return Err(PlayError::GameFinished);
        };

        if !self.hands[seat.index()].contains(card) {
            return Err(PlayError::CardNotInHand(card));
        }

        if expected != seat {
            return Err(PlayError::OutOfTurn {
                expected,
                actual: seat,
            });
        }

        let played = self.current_trick.cards();
        if !self.legal_cards(seat).contains(&card) {
            return Err(PlayError::IllegalCard {
                card,
                lead: played.first().map(|first| first.suit),
            });
        }

        self.current_trick.play(seat, card).map_err(PlayError::Trick)?;
        self.hands[seat.index()].remove(card);

        if !self.current_trick.is_complete() {
            return Ok(PlayOutcome::Played);
        }

        let before = self.team_points;
        let finished = std::mem::replace(&mut self.current_trick, Trick::new(seat));
        let winner = self.record_trick(finished);
        self.current_trick = Trick::new(winner);
        let team = winner.team().index();
        Ok(PlayOutcome::TrickCompleted {
            winner,
            points: self.team_points[team] - before[team],
        })
    }

    fn record_trick(&mut self, trick: Trick) -> Seat {
        let winner = trick
            .winner(self.mode)
            .unwrap_or_else(|| trick.leader());
        let team = winner.team();
        let mut points = trick.points(self.mode);
        self.trick_history.push(trick);
        self.tricks_won[team.index()] += 1;
        if self.trick_history.len() == TRICKS_PER_GAME {
            points += LAST_TRICK_BONUS;
            if self.tricks_won[team.index()] as usize == TRICKS_PER_GAME {
                points += MATCH_BONUS;
            }
        }
        self.team_points[team.index()] += points;
        winner
    }
}

#[cfg(test)]
mod tests {
    use super::{GameState, PlayError, PlayOutcome, StateError, TRICKS_PER_GAME};
    use crate::model::deck::Deck;
    use crate::model::hand::Hand;
    use crate::model::mode::{MATCH_BONUS, Mode, TOTAL_POINTS};
    use crate::model::seat::{Seat, Team};
    use crate::model::suit::Suit;
    use crate::model::trick::Trick;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use rand::seq::SliceRandom;

    fn play_out(game: &mut GameState, seed: u64) {
        let mut rng = SmallRng::seed_from_u64(seed);
        while let Some(seat) = game.current_player() {
            let legal = game.legal_cards(seat);
            let card = *legal.choose(&mut rng).unwrap();
            game.play_card(seat, card).unwrap();
        }
    }

    #[test]
    fn dealing_distributes_nine_cards_per_player() {
        let game = GameState::deal(&Deck::shuffled_with_seed(3), Seat::East, Mode::TopDown);
        for seat in Seat::LOOP {
            assert_eq!(game.hand(seat).len(), 9, "{seat} should have 9 cards");
        }
        assert_eq!(game.current_player(), Some(Seat::East));
    }

    #[test]
    fn random_games_distribute_all_points() {
        for seed in 0..20 {
            let mode = Mode::ALL[seed as usize % Mode::ALL.len()];
            let mut game = GameState::deal(&Deck::shuffled_with_seed(seed), Seat::North, mode);
            play_out(&mut game, seed);
            assert!(game.is_finished());
            let total = game.team_points(Team::NorthSouth) + game.team_points(Team::EastWest);
            let sweep = Team::BOTH
                .iter()
                .any(|team| game.tricks_won(*team) as usize == TRICKS_PER_GAME);
            let expected = if sweep { TOTAL_POINTS + MATCH_BONUS } else { TOTAL_POINTS };
            assert_eq!(total, expected);
            assert!(game.score_vector().iter().all(|s| (0.0..=1.0).contains(s)));
        }
    }

    #[test]
    fn out_of_turn_play_is_rejected() {
        let mut game = GameState::deal(&Deck::standard(), Seat::North, Mode::TopDown);
        let card = game.hand(Seat::East).cards()[0];
        assert_eq!(
            game.play_card(Seat::East, card),
            Err(PlayError::OutOfTurn {
                expected: Seat::North,
                actual: Seat::East
            })
        );
    }

    #[test]
    fn follow_suit_is_enforced() {
        // Standard deck order gives North all diamonds and East all hearts.
        let mut game = GameState::deal(&Deck::standard(), Seat::East, Mode::TopDown);
        let lead = game.hand(Seat::East).cards()[0];
        assert_eq!(lead.suit, Suit::Hearts);
        assert_eq!(game.play_card(Seat::East, lead), Ok(PlayOutcome::Played));
        // South holds only spades, so anything goes.
        let south = game.hand(Seat::South).cards()[0];
        game.play_card(Seat::South, south).unwrap();
        assert_eq!(game.current_player(), Some(Seat::West));
    }

    #[test]
    fn observation_rebuilds_score_from_history() {
        let mut full = GameState::deal(&Deck::shuffled_with_seed(11), Seat::North, Mode::Trump(Suit::Clubs));
        let mut rng = SmallRng::seed_from_u64(5);
        for _ in 0..10 {
            let seat = full.current_player().unwrap();
            let card = *full.legal_cards(seat).choose(&mut rng).unwrap();
            full.play_card(seat, card).unwrap();
        }
        let seat = full.current_player().unwrap();
        let observed = GameState::from_observation(
            full.mode(),
            seat,
            full.hand(seat).clone(),
            full.trick_history().to_vec(),
            full.current_trick().clone(),
        )
        .unwrap();
        assert_eq!(observed.team_points(Team::NorthSouth), full.team_points(Team::NorthSouth));
        assert_eq!(observed.team_points(Team::EastWest), full.team_points(Team::EastWest));
        assert_eq!(observed.current_player(), Some(seat));
        assert!(observed.hand(seat.next()).is_empty());
        assert_eq!(observed.with_hands(full.hands().clone()), full);
    }

    #[test]
    fn observation_rejects_duplicate_cards() {
        let mut trick = Trick::new(Seat::North);
        trick.play(Seat::North, "AS".parse().unwrap()).unwrap();
        let hand = Hand::with_cards(vec!["AS".parse().unwrap()]);
        let err = GameState::from_observation(Mode::TopDown, Seat::East, hand, Vec::new(), trick)
            .unwrap_err();
        assert_eq!(err, StateError::DuplicateCard("AS".parse().unwrap()));
    }
}
