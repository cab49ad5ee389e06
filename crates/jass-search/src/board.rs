//! The game-agnostic contract the search engine drives.

use rand::Rng;
use rand::rngs::SmallRng;
use std::fmt::Debug;
use std::hash::Hash;

/// Random generator owned by one search tree.
pub type SearchRng = SmallRng;

/// Who acts in a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Actor {
    Player(usize),
    /// Nature moves; successors are drawn with [`Board::move_weights`].
    Chance,
}

/// Where legal moves are requested from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallLocation {
    TreePolicy,
    Playout,
}

/// A multi-player game position that can be copied and advanced.
///
/// Implementations own all of their state: [`Board::duplicate`] must never
/// share mutable data with the source. [`Board::legal_moves`] is empty only
/// when the position is terminal.
pub trait Board: Send + Sync + Sized {
    type Move: Clone + PartialEq + Eq + Hash + Debug + Send + Sync;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Exact, independent copy. Used for every in-tree descent and rollout.
    fn duplicate(&self) -> Self;

    /// Independent copy with the hidden information drawn afresh.
    fn redeterminize(&self, rng: &mut SearchRng) -> Result<Self, Self::Error>;

    fn legal_moves(&self, location: CallLocation) -> Vec<Self::Move>;

    /// Advances exactly one ply. The move must come from [`Board::legal_moves`].
    fn apply_move(&mut self, mv: &Self::Move);

    fn is_terminal(&self) -> bool;

    fn current_actor(&self) -> Actor;

    fn player_count(&self) -> usize;

    /// Per-player outcome in `[0, 1]`.
    fn score_vector(&self) -> Vec<f64>;

    /// Successor weights at chance nodes, aligned with `legal_moves`.
    fn move_weights(&self) -> Vec<f64> {
        Vec::new()
    }

    fn has_learned_evaluator(&self) -> bool {
        false
    }

    /// Leaf evaluation replacing a rollout when a learned evaluator is present.
    fn estimate_score_vector(&self) -> Vec<f64> {
        self.score_vector()
    }
}

/// Picks rollout moves. Returns an index into `moves`.
pub trait PlayoutPolicy<B: Board>: Send + Sync {
    fn choose(&self, board: &B, moves: &[B::Move], rng: &mut SearchRng) -> usize;

    fn name(&self) -> &'static str;
}

/// Additive term in the selection score of `mv` played from `board`.
pub trait HeuristicFunction<B: Board>: Send + Sync {
    fn evaluate(&self, board: &B, mv: &B::Move) -> f64;
}

/// Uniformly random rollouts.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomPlayout;

impl<B: Board> PlayoutPolicy<B> for RandomPlayout {
    fn choose(&self, _board: &B, moves: &[B::Move], rng: &mut SearchRng) -> usize {
        rng.gen_range(0..moves.len())
    }

    fn name(&self) -> &'static str {
        "random"
    }
}
