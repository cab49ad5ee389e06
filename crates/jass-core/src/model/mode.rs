use crate::model::card::Card;
use crate::model::hand::Hand;
use crate::model::rank::Rank;
use crate::model::suit::Suit;
use core::fmt;
use serde::{Deserialize, Serialize};

/// Bonus for winning the ninth trick.
pub const LAST_TRICK_BONUS: u32 = 5;
/// Bonus for a team that takes every trick.
pub const MATCH_BONUS: u32 = 100;
/// Card points plus the last-trick bonus; identical for every mode.
pub const TOTAL_POINTS: u32 = 157;
pub const MAX_TEAM_POINTS: u32 = TOTAL_POINTS + MATCH_BONUS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Trump(Suit),
    TopDown,
    BottomUp,
}

impl Mode {
    pub const ALL: [Mode; 6] = [
        Mode::Trump(Suit::Diamonds),
        Mode::Trump(Suit::Hearts),
        Mode::Trump(Suit::Spades),
        Mode::Trump(Suit::Clubs),
        Mode::TopDown,
        Mode::BottomUp,
    ];

    pub const fn trump_suit(self) -> Option<Suit> {
        match self {
            Mode::Trump(suit) => Some(suit),
            Mode::TopDown | Mode::BottomUp => None,
        }
    }

    pub fn is_trump(self, card: Card) -> bool {
        self.trump_suit() == Some(card.suit)
    }

    pub fn card_points(self, card: Card) -> u32 {
        match self {
            Mode::Trump(trump) if card.suit == trump => match card.rank {
                Rank::Jack => 20,
                Rank::Nine => 14,
                other => plain_points(other),
            },
            Mode::Trump(_) => plain_points(card.rank),
            Mode::TopDown => match card.rank {
                Rank::Eight => 8,
                other => plain_points(other),
            },
            Mode::BottomUp => match card.rank {
                Rank::Six => 11,
                Rank::Eight => 8,
                Rank::Ace => 0,
                other => plain_points(other),
            },
        }
    }

    /// Strength of `card` in a trick led with `lead`. Cards that can never win score zero.
    pub fn trick_strength(self, card: Card, lead: Suit) -> u8 {
        if self.is_trump(card) {
            return 20 + card.rank.trump_strength();
        }
        if card.suit != lead {
            return 0;
        }
        match self {
            Mode::BottomUp => 10 - card.rank.value(),
            Mode::Trump(_) | Mode::TopDown => card.rank.value(),
        }
    }

    /// Index of the winning card; the first card is the lead.
    pub fn winning_index(self, cards: &[Card]) -> Option<usize> {
        let lead = cards.first()?.suit;
        cards
            .iter()
            .enumerate()
            .max_by_key(|(_, card)| self.trick_strength(**card, lead))
            .map(|(index, _)| index)
    }

    /// Whether `card` from `hand` may be added to a trick that already holds `played`.
    pub fn can_play(self, card: Card, played: &[Card], hand: &[Card]) -> bool {
        let Some(lead) = played.first().map(|first| first.suit) else {
            return true;
        };
        let holds_lead = hand.iter().any(|held| held.suit == lead);
        match self {
            Mode::Trump(trump) => {
                if hand.iter().all(|held| held.suit == trump) {
                    return true;
                }
                if card.suit == trump && lead != trump {
                    let highest = played
                        .iter()
                        .filter(|played| played.suit == trump)
                        .map(|played| played.rank.trump_strength())
                        .max();
                    return highest.is_none_or(|top| card.rank.trump_strength() > top);
                }
                if lead == trump && only_jack_of_trump(hand, trump) {
                    return true;
                }
                !holds_lead || card.suit == lead
            }
            Mode::TopDown | Mode::BottomUp => !holds_lead || card.suit == lead,
        }
    }

    /// Legal cards for `hand`; falls back to the whole hand when the rules leave nothing.
    pub fn legal_cards(self, hand: &Hand, played: &[Card]) -> Vec<Card> {
        let legal: Vec<Card> = hand
            .iter()
            .copied()
            .filter(|card| self.can_play(*card, played, hand.cards()))
            .collect();
        if legal.is_empty() {
            hand.cards().to_vec()
        } else {
            legal
        }
    }
}

fn plain_points(rank: Rank) -> u32 {
    match rank {
        Rank::Ace => 11,
        Rank::Ten => 10,
        Rank::King => 4,
        Rank::Queen => 3,
        Rank::Jack => 2,
        Rank::Six | Rank::Seven | Rank::Eight | Rank::Nine => 0,
    }
}

fn only_jack_of_trump(hand: &[Card], trump: Suit) -> bool {
    hand.iter()
        .filter(|card| card.suit == trump)
        .all(|card| card.rank == Rank::Jack)
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Trump(suit) => write!(f, "trump {suit}"),
            Mode::TopDown => f.write_str("top-down"),
            Mode::BottomUp => f.write_str("bottom-up"),
        }
    }
}
