use crate::model::rank::Rank;
use crate::model::suit::Suit;
use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

/// Number of cards in a Jass deck.
pub const DECK_SIZE: usize = 36;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    pub const fn new(rank: Rank, suit: Suit) -> Self {
        Self { rank, suit }
    }

    /// Dense index in `0..36`, grouped by suit.
    pub const fn id(self) -> u8 {
        self.suit as u8 * 9 + self.rank.value() - 1
    }

    pub const fn from_id(id: u8) -> Option<Self> {
        if id as usize >= DECK_SIZE {
            return None;
        }
        let suit = match Suit::from_index((id / 9) as usize) {
            Some(suit) => suit,
            None => return None,
        };
        match Rank::from_value(id % 9 + 1) {
            Some(rank) => Some(Card::new(rank, suit)),
            None => None,
        }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.rank, self.suit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCardError(String);

impl fmt::Display for ParseCardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a card (expected e.g. JH or 10S)", self.0)
    }
}

impl std::error::Error for ParseCardError {}

impl FromStr for Card {
    type Err = ParseCardError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let trimmed = text.trim();
        let mut chars = trimmed.chars();
        let suit = chars
            .next_back()
            .and_then(Suit::from_symbol)
            .ok_or_else(|| ParseCardError(text.to_string()))?;
        let rank = Rank::from_label(chars.as_str()).ok_or_else(|| ParseCardError(text.to_string()))?;
        Ok(Card::new(rank, suit))
    }
}

#[cfg(test)]
mod tests {
    use super::{Card, DECK_SIZE, Rank, Suit};

    #[test]
    fn ids_cover_the_deck_exactly_once() {
        let mut seen = [false; DECK_SIZE];
        for id in 0..DECK_SIZE as u8 {
            let card = Card::from_id(id).expect("valid id");
            assert_eq!(card.id(), id);
            assert!(!seen[id as usize]);
            seen[id as usize] = true;
        }
        assert_eq!(Card::from_id(36), None);
    }

    #[test]
    fn parses_display_notation() {
        let card: Card = "10S".parse().unwrap();
        assert_eq!(card, Card::new(Rank::Ten, Suit::Spades));
        assert_eq!(card.to_string(), "10S");
        assert_eq!("jh".parse::<Card>().unwrap(), Card::new(Rank::Jack, Suit::Hearts));
    }

    #[test]
    fn rejects_unknown_notation() {
        assert!("5H".parse::<Card>().is_err());
        assert!("QX".parse::<Card>().is_err());
        assert!("".parse::<Card>().is_err());
    }
}
