use core::fmt;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[repr(u8)]
pub enum Rank {
    Six = 1,
    Seven = 2,
    Eight = 3,
    Nine = 4,
    Ten = 5,
    Jack = 6,
    Queen = 7,
    King = 8,
    Ace = 9,
}

impl Rank {
    pub const ORDERED: [Rank; 9] = [
        Rank::Six,
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Ten,
        Rank::Jack,
        Rank::Queen,
        Rank::King,
        Rank::Ace,
    ];

    pub const fn from_value(value: u8) -> Option<Self> {
        match value {
            1 => Some(Rank::Six),
            2 => Some(Rank::Seven),
            3 => Some(Rank::Eight),
            4 => Some(Rank::Nine),
            5 => Some(Rank::Ten),
            6 => Some(Rank::Jack),
            7 => Some(Rank::Queen),
            8 => Some(Rank::King),
            9 => Some(Rank::Ace),
            _ => None,
        }
    }

    pub const fn value(self) -> u8 {
        self as u8
    }

    /// Ordering inside the trump suit: Jack, then Nine, then the usual order.
    pub const fn trump_strength(self) -> u8 {
        match self {
            Rank::Jack => 13,
            Rank::Nine => 12,
            other => other.value(),
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "6" => Some(Rank::Six),
            "7" => Some(Rank::Seven),
            "8" => Some(Rank::Eight),
            "9" => Some(Rank::Nine),
            "10" | "T" | "t" => Some(Rank::Ten),
            "J" | "j" => Some(Rank::Jack),
            "Q" | "q" => Some(Rank::Queen),
            "K" | "k" => Some(Rank::King),
            "A" | "a" => Some(Rank::Ace),
            _ => None,
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Rank::Six => "6",
            Rank::Seven => "7",
            Rank::Eight => "8",
            Rank::Nine => "9",
            Rank::Ten => "10",
            Rank::Jack => "J",
            Rank::Queen => "Q",
            Rank::King => "K",
            Rank::Ace => "A",
        };
        f.write_str(text)
    }
}
