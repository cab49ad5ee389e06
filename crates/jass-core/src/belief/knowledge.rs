//! Per-card ownership knowledge derived from the public course of a game.

use super::distribution::{Distribution, DistributionError};
use crate::model::card::{Card, DECK_SIZE};
use crate::model::game::GameState;
use crate::model::hand::Hand;
use crate::model::rank::Rank;
use crate::model::seat::Seat;
use std::fmt;

/// Which seat may hold which card, from one seat's point of view.
///
/// Played cards are stored as resolved point masses on the seat that played
/// them; every other card not in the perspective's hand starts uniform over
/// the three other seats and is then thinned by the follow-suit rule.
#[derive(Debug, Clone)]
pub struct CardKnowledge {
    perspective: Seat,
    own_hand: Hand,
    entries: Vec<(Card, Distribution<Seat>)>,
    targets: [usize; 4],
}

#[derive(Debug, Clone, PartialEq)]
pub enum KnowledgeError {
    NotToMove {
        perspective: Seat,
        to_move: Option<Seat>,
    },
    MissingEstimate(Card),
    UnexpectedEstimate(Card),
    /// The follow-suit record rules out every seat that could hold the card.
    NoCandidate(Card),
    Estimate {
        card: Card,
        source: DistributionError,
    },
}

impl fmt::Display for KnowledgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KnowledgeError::NotToMove {
                perspective,
                to_move: Some(seat),
            } => write!(f, "{perspective} is not to move ({seat} is)"),
            KnowledgeError::NotToMove {
                perspective,
                to_move: None,
            } => write!(f, "{perspective} is not to move; the game is over"),
            KnowledgeError::MissingEstimate(card) => {
                write!(f, "no ownership estimate supplied for unseen card {card}")
            }
            KnowledgeError::UnexpectedEstimate(card) => {
                write!(f, "estimate supplied for {card}, which is not unseen")
            }
            KnowledgeError::NoCandidate(card) => {
                write!(f, "no seat can hold {card} given who failed to follow suit")
            }
            KnowledgeError::Estimate { card, source } => {
                write!(f, "estimate for {card} is unusable: {source}")
            }
        }
    }
}

impl std::error::Error for KnowledgeError {}

impl CardKnowledge {
    /// Builds knowledge for the seat to move using only certainties.
    pub fn from_game(game: &GameState, perspective: Seat) -> Result<Self, KnowledgeError> {
        ensure_to_move(game, perspective)?;
        let opponents = opponents_of(perspective);
        let mut unseen = Vec::new();
        for card in unseen_cards(game, perspective) {
            let distribution = Distribution::uniform(opponents)
                .map_err(|source| KnowledgeError::Estimate { card, source })?;
            unseen.push((card, distribution));
        }

        for seat in opponents {
            for card in Self::impossible_cards(game, seat) {
                if let Some((_, distribution)) = unseen.iter_mut().find(|(c, _)| *c == card) {
                    if !distribution.delete_and_rebalance(seat) {
                        return Err(KnowledgeError::NoCandidate(card));
                    }
                }
            }
        }

        Ok(Self::assemble(game, perspective, unseen))
    }

    /// Builds knowledge from an externally estimated belief over the unseen cards.
    ///
    /// Every unseen card needs exactly one estimate. The perspective seat is
    /// removed from each estimate since its own hand is known.
    pub fn from_distributions(
        game: &GameState,
        perspective: Seat,
        estimates: Vec<(Card, Distribution<Seat>)>,
    ) -> Result<Self, KnowledgeError> {
        ensure_to_move(game, perspective)?;
        let expected = unseen_cards(game, perspective);
        let mut unseen = Vec::with_capacity(expected.len());
        for (card, mut distribution) in estimates {
            if !expected.contains(&card) || unseen.iter().any(|(c, _)| *c == card) {
                return Err(KnowledgeError::UnexpectedEstimate(card));
            }
            if !distribution.delete_and_rebalance(perspective) {
                return Err(KnowledgeError::Estimate {
                    card,
                    source: DistributionError::Empty,
                });
            }
            distribution.set_resolved(false);
            unseen.push((card, distribution));
        }
        if let Some(missing) = expected
            .iter()
            .find(|card| !unseen.iter().any(|(c, _)| c == *card))
        {
            return Err(KnowledgeError::MissingEstimate(*missing));
        }
        unseen.sort_by_key(|(card, _)| card.id());
        Ok(Self::assemble(game, perspective, unseen))
    }

    /// Cards `seat` cannot hold: the lead suit of every trick it failed to
    /// follow without trumping. The trump Jack is exempt, since a trump lead
    /// never forces it.
    pub fn impossible_cards(game: &GameState, seat: Seat) -> Vec<Card> {
        let mode = game.mode();
        let mut impossible = Vec::new();
        let tricks = game
            .trick_history()
            .iter()
            .chain(std::iter::once(game.current_trick()));
        for trick in tricks {
            let Some(lead) = trick.lead_suit() else {
                continue;
            };
            if trick.leader() == seat {
                continue;
            }
            let Some(card) = trick.card_of(seat) else {
                continue;
            };
            if card.suit == lead || mode.is_trump(card) {
                continue;
            }
            for id in 0..DECK_SIZE as u8 {
                let Some(candidate) = Card::from_id(id) else {
                    continue;
                };
                if candidate.suit != lead || impossible.contains(&candidate) {
                    continue;
                }
                let trump_jack = mode.trump_suit() == Some(lead) && candidate.rank == Rank::Jack;
                if !trump_jack {
                    impossible.push(candidate);
                }
            }
        }
        impossible
    }

    pub fn perspective(&self) -> Seat {
        self.perspective
    }

    pub fn own_hand(&self) -> &Hand {
        &self.own_hand
    }

    pub fn entries(&self) -> &[(Card, Distribution<Seat>)] {
        &self.entries
    }

    pub fn distribution(&self, card: Card) -> Option<&Distribution<Seat>> {
        self.entries
            .iter()
            .find(|(c, _)| *c == card)
            .map(|(_, distribution)| distribution)
    }

    pub fn unresolved_cards(&self) -> impl Iterator<Item = Card> + '_ {
        self.entries
            .iter()
            .filter(|(_, distribution)| !distribution.is_resolved())
            .map(|(card, _)| *card)
    }

    /// Number of cards `seat` must end up with in a determinization.
    pub fn hand_size_target(&self, seat: Seat) -> usize {
        self.targets[seat.index()]
    }

    fn assemble(
        game: &GameState,
        perspective: Seat,
        mut entries: Vec<(Card, Distribution<Seat>)>,
    ) -> Self {
        let own_hand = game.hand(perspective).clone();
        let remaining = entries.len();
        let mut targets = [0usize; 4];
        for seat in Seat::LOOP {
            targets[seat.index()] = if seat == perspective {
                own_hand.len()
            } else if game.current_trick().has_played(seat) {
                remaining / 3
            } else {
                remaining.div_ceil(3)
            };
        }
        debug_assert_eq!(
            targets.iter().sum::<usize>(),
            remaining + own_hand.len(),
            "hand size targets must cover every unseen card"
        );

        for play in game.played_moves() {
            entries.push((play.card, Distribution::point_mass(play.seat)));
        }
        entries.sort_by_key(|(card, _)| card.id());

        Self {
            perspective,
            own_hand,
            entries,
            targets,
        }
    }
}

fn ensure_to_move(game: &GameState, perspective: Seat) -> Result<(), KnowledgeError> {
    let to_move = game.current_player();
    if to_move != Some(perspective) {
        return Err(KnowledgeError::NotToMove {
            perspective,
            to_move,
        });
    }
    Ok(())
}

fn opponents_of(perspective: Seat) -> [Seat; 3] {
    let first = perspective.next();
    [first, first.next(), first.next().next()]
}

fn unseen_cards(game: &GameState, perspective: Seat) -> Vec<Card> {
    let played = game.played_cards();
    let own = game.hand(perspective);
    (0..DECK_SIZE as u8)
        .filter_map(Card::from_id)
        .filter(|card| !own.contains(*card) && !played.contains(card))
        .collect()
}
