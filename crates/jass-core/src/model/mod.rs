pub mod card;
pub mod deck;
pub mod game;
pub mod hand;
pub mod mode;
pub mod rank;
pub mod seat;
pub mod suit;
pub mod trick;
