//! Discrete probability distribution over the players that may hold a card.

use rand::Rng;
use std::fmt;

/// Maximum deviation of a distribution's total mass from one.
pub const PROBABILITY_EPSILON: f64 = 1e-6;

/// Probability mass over candidate players, kept in insertion order so that
/// sampling under a fixed seed is reproducible.
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution<P> {
    entries: Vec<(P, f64)>,
    resolved: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DistributionError {
    Empty,
    NegativeProbability(f64),
    DuplicatePlayer,
    BadTotal(f64),
}

impl fmt::Display for DistributionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistributionError::Empty => write!(f, "distribution has no candidates"),
            DistributionError::NegativeProbability(p) => {
                write!(f, "probability {p} is negative")
            }
            DistributionError::DuplicatePlayer => write!(f, "player listed more than once"),
            DistributionError::BadTotal(total) => {
                write!(f, "probabilities sum to {total}, expected 1")
            }
        }
    }
}

impl std::error::Error for DistributionError {}

impl<P: Copy + PartialEq> Distribution<P> {
    pub fn new(entries: Vec<(P, f64)>) -> Result<Self, DistributionError> {
        if entries.is_empty() {
            return Err(DistributionError::Empty);
        }
        for (index, (player, probability)) in entries.iter().enumerate() {
            if *probability < 0.0 {
                return Err(DistributionError::NegativeProbability(*probability));
            }
            if entries[..index].iter().any(|(other, _)| other == player) {
                return Err(DistributionError::DuplicatePlayer);
            }
        }
        let total: f64 = entries.iter().map(|(_, p)| p).sum();
        if (total - 1.0).abs() > PROBABILITY_EPSILON {
            return Err(DistributionError::BadTotal(total));
        }
        Ok(Self {
            entries,
            resolved: false,
        })
    }

    pub fn uniform(players: impl IntoIterator<Item = P>) -> Result<Self, DistributionError> {
        let players: Vec<P> = players.into_iter().collect();
        let share = 1.0 / players.len() as f64;
        Self::new(players.into_iter().map(|player| (player, share)).collect())
    }

    /// Certain ownership; already resolved.
    pub fn point_mass(player: P) -> Self {
        Self {
            entries: vec![(player, 1.0)],
            resolved: true,
        }
    }

    /// Draws a player proportionally to its probability.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> P {
        let threshold = rng.r#gen::<f64>() * self.total();
        let mut cumulative = 0.0;
        for (player, probability) in &self.entries {
            cumulative += probability;
            if cumulative > threshold {
                return *player;
            }
        }
        // Rounding can leave the threshold just above the accumulated mass.
        self.entries[self.entries.len() - 1].0
    }

    /// Removes `player` and spreads its mass evenly over the others.
    ///
    /// Returns `false` (leaving the distribution unchanged) when `player` is
    /// the only remaining candidate. An absent player is a no-op.
    pub fn delete_and_rebalance(&mut self, player: P) -> bool {
        let Some(index) = self.entries.iter().position(|(p, _)| *p == player) else {
            return true;
        };
        if self.entries.len() == 1 {
            return false;
        }
        let (_, removed) = self.entries.remove(index);
        let share = removed / self.entries.len() as f64;
        for (_, probability) in &mut self.entries {
            *probability += share;
        }
        assert!(
            (self.total() - 1.0).abs() <= PROBABILITY_EPSILON,
            "distribution mass drifted to {}",
            self.total()
        );
        true
    }

    pub fn has_player(&self, player: P) -> bool {
        self.entries.iter().any(|(p, _)| *p == player)
    }

    pub fn probability(&self, player: P) -> f64 {
        self.entries
            .iter()
            .find(|(p, _)| *p == player)
            .map(|(_, probability)| *probability)
            .unwrap_or(0.0)
    }

    /// `(player, probability)` pairs in insertion order.
    pub fn probabilities(&self) -> &[(P, f64)] {
        &self.entries
    }

    pub fn players(&self) -> impl Iterator<Item = P> + '_ {
        self.entries.iter().map(|(player, _)| *player)
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    pub fn set_resolved(&mut self, resolved: bool) {
        self.resolved = resolved;
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, p)| p).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::{Distribution, DistributionError, PROBABILITY_EPSILON};
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    #[test]
    fn rejects_mass_that_does_not_sum_to_one() {
        assert!(matches!(
            Distribution::new(vec![(0, 0.5), (1, 0.4)]),
            Err(DistributionError::BadTotal(_))
        ));
        assert_eq!(Distribution::<u8>::uniform([]), Err(DistributionError::Empty));
        assert!(matches!(
            Distribution::new(vec![(0, 0.5), (0, 0.5)]),
            Err(DistributionError::DuplicatePlayer)
        ));
    }

    #[test]
    fn rebalancing_keeps_total_mass() {
        let mut dist = Distribution::new(vec![(0, 0.1), (1, 0.2), (2, 0.3), (3, 0.4)]).unwrap();
        for player in [2, 0, 3] {
            assert!(dist.delete_and_rebalance(player));
            assert!((dist.total() - 1.0).abs() <= PROBABILITY_EPSILON);
        }
        assert_eq!(dist.size(), 1);
        assert!((dist.probability(1) - 1.0).abs() <= PROBABILITY_EPSILON);
    }

    #[test]
    fn removed_mass_is_split_evenly() {
        let mut dist = Distribution::new(vec![(0, 0.5), (1, 0.25), (2, 0.25)]).unwrap();
        assert!(dist.delete_and_rebalance(0));
        assert!((dist.probability(1) - 0.5).abs() < 1e-12);
        assert!((dist.probability(2) - 0.5).abs() < 1e-12);
        let players: Vec<u8> = dist.probabilities().iter().map(|(p, _)| *p).collect();
        assert_eq!(players, vec![1, 2]);
    }

    #[test]
    fn deleting_the_last_candidate_signals_conflict() {
        let mut dist = Distribution::uniform([7]).unwrap();
        assert!(!dist.delete_and_rebalance(7));
        assert!(dist.has_player(7));
        assert!(dist.delete_and_rebalance(3), "absent player is a no-op");
    }

    #[test]
    fn sampling_follows_the_weights() {
        let dist = Distribution::new(vec![(0, 0.9), (1, 0.1)]).unwrap();
        let mut rng = SmallRng::seed_from_u64(17);
        let zeros = (0..2_000).filter(|_| dist.sample(&mut rng) == 0).count();
        assert!(zeros > 1_600 && zeros < 1_950, "got {zeros}");
        assert_eq!(Distribution::point_mass(4).sample(&mut rng), 4);
    }
}
