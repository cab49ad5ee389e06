//! Sampling of complete hidden-hand assignments from [`CardKnowledge`].

use super::CardKnowledge;
use super::distribution::Distribution;
use crate::model::card::{Card, DECK_SIZE};
use crate::model::game::TRICKS_PER_GAME;
use crate::model::hand::Hand;
use crate::model::seat::Seat;
use rand::Rng;
use rand::seq::SliceRandom;
use std::fmt;

/// Deals the unseen cards of a [`CardKnowledge`] to the other seats.
#[derive(Debug, Default)]
pub struct DeterminizationSampler;

impl DeterminizationSampler {
    /// Draws one determinization, failing on the first conflict.
    pub fn sample<R: Rng + ?Sized>(
        knowledge: &CardKnowledge,
        rng: &mut R,
    ) -> Result<Determinization, SamplingError> {
        Self::sample_with_retries(knowledge, rng, 1, None)
    }

    /// Draws a determinization, restarting with fresh randomness after a conflict.
    ///
    /// The sampler makes up to `max_attempts` passes. Each pass repeatedly picks
    /// the unresolved card with the fewest candidate holders (ties broken by
    /// the RNG), draws its holder, and removes a seat from every remaining
    /// card once its hand is full. A card left with no admissible holder ends
    /// the pass.
    pub fn sample_with_retries<R: Rng + ?Sized>(
        knowledge: &CardKnowledge,
        rng: &mut R,
        max_attempts: usize,
        stats: Option<&mut SamplingStats>,
    ) -> Result<Determinization, SamplingError> {
        let attempts = max_attempts.max(1);
        let mut stats = stats;
        let mut last_error: Option<SamplingError> = None;

        for _ in 0..attempts {
            if let Some(inner) = stats.as_deref_mut() {
                inner.attempts += 1;
            }
            match sample_once(knowledge, rng) {
                Ok(determinization) => {
                    if let Some(inner) = stats.as_deref_mut() {
                        inner.succeeded += 1;
                    }
                    return Ok(determinization);
                }
                Err(err) => {
                    if let Some(inner) = stats.as_deref_mut() {
                        inner.conflicts += 1;
                    }
                    last_error = Some(err);
                }
            }
        }

        match (attempts, last_error) {
            (1, Some(err)) => Err(err),
            (_, last) => Err(SamplingError::Exhausted {
                attempts,
                last_conflict: last.and_then(|err| err.card()),
            }),
        }
    }
}

impl DeterminizationSampler {
    /// Deals the 27 cards outside `own_hand` nine apiece to the other seats.
    ///
    /// Used before any card is played, when nothing but the perspective hand
    /// is known.
    pub fn deal_unseen<R: Rng + ?Sized>(
        perspective: Seat,
        own_hand: &Hand,
        rng: &mut R,
    ) -> Result<Determinization, SamplingError> {
        let mut unseen: Vec<Card> = (0..DECK_SIZE as u8)
            .filter_map(Card::from_id)
            .filter(|card| !own_hand.contains(*card))
            .collect();
        let held = DECK_SIZE - unseen.len();
        if own_hand.len() != TRICKS_PER_GAME || held != TRICKS_PER_GAME {
            return Err(SamplingError::HandSize {
                seat: perspective,
                expected: TRICKS_PER_GAME,
                actual: own_hand.len(),
            });
        }
        unseen.shuffle(rng);

        let mut hands: [Hand; 4] = Default::default();
        hands[perspective.index()] = own_hand.clone();
        let others = Seat::LOOP.into_iter().filter(|seat| *seat != perspective);
        for (seat, cards) in others.zip(unseen.chunks(TRICKS_PER_GAME)) {
            hands[seat.index()] = Hand::with_cards(cards.to_vec());
        }
        Ok(Determinization { hands })
    }
}

fn sample_once<R: Rng + ?Sized>(
    knowledge: &CardKnowledge,
    rng: &mut R,
) -> Result<Determinization, SamplingError> {
    let perspective = knowledge.perspective();
    let mut hands: [Hand; 4] = Default::default();
    hands[perspective.index()] = knowledge.own_hand().clone();

    let mut open: Vec<(Card, Distribution<Seat>)> = knowledge
        .entries()
        .iter()
        .filter(|(_, distribution)| !distribution.is_resolved())
        .cloned()
        .collect();

    // Seats with nothing left to receive never take a card.
    for seat in Seat::LOOP {
        if seat != perspective && knowledge.hand_size_target(seat) == 0 {
            retire_seat(&mut open, seat)?;
        }
    }

    while !open.is_empty() {
        let fewest = open
            .iter()
            .map(|(_, distribution)| distribution.size())
            .min()
            .unwrap_or(0);
        let tied: Vec<usize> = open
            .iter()
            .enumerate()
            .filter(|(_, (_, distribution))| distribution.size() == fewest)
            .map(|(index, _)| index)
            .collect();
        let pick = tied[rng.gen_range(0..tied.len())];
        let (card, distribution) = open.remove(pick);

        let seat = distribution.sample(rng);
        if seat == perspective {
            return Err(SamplingError::Conflict { card, seat });
        }
        let hand = &mut hands[seat.index()];
        hand.add(card);
        if hand.len() == knowledge.hand_size_target(seat) {
            retire_seat(&mut open, seat)?;
        }
    }

    for seat in Seat::LOOP {
        assert_eq!(
            hands[seat.index()].len(),
            knowledge.hand_size_target(seat),
            "sampled hand for {seat} has the wrong size"
        );
    }

    Ok(Determinization { hands })
}

fn retire_seat(open: &mut [(Card, Distribution<Seat>)], seat: Seat) -> Result<(), SamplingError> {
    for (card, distribution) in open.iter_mut() {
        if !distribution.delete_and_rebalance(seat) {
            return Err(SamplingError::Conflict { card: *card, seat });
        }
    }
    Ok(())
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SamplingStats {
    pub attempts: usize,
    pub succeeded: usize,
    pub conflicts: usize,
}

/// A full assignment of the 36 cards minus those already played.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Determinization {
    hands: [Hand; 4],
}

impl Determinization {
    pub fn hand(&self, seat: Seat) -> &Hand {
        &self.hands[seat.index()]
    }

    pub fn hands(&self) -> &[Hand; 4] {
        &self.hands
    }

    pub fn into_hands(self) -> [Hand; 4] {
        self.hands
    }
}

/// Errors that can arise while dealing the unseen cards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SamplingError {
    /// `card` could only go to `seat`, whose hand is already full.
    Conflict { card: Card, seat: Seat },
    Exhausted {
        attempts: usize,
        last_conflict: Option<Card>,
    },
    /// The known hand cannot be part of a full deal.
    HandSize {
        seat: Seat,
        expected: usize,
        actual: usize,
    },
}

impl SamplingError {
    fn card(&self) -> Option<Card> {
        match self {
            SamplingError::Conflict { card, .. } => Some(*card),
            SamplingError::Exhausted { last_conflict, .. } => *last_conflict,
            SamplingError::HandSize { .. } => None,
        }
    }
}

impl fmt::Display for SamplingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SamplingError::Conflict { card, seat } => {
                write!(f, "{card} can only go to {seat}, whose hand is full")
            }
            SamplingError::Exhausted {
                attempts,
                last_conflict: Some(card),
            } => write!(
                f,
                "no consistent deal after {attempts} attempts (last conflict on {card})"
            ),
            SamplingError::Exhausted { attempts, .. } => {
                write!(f, "no consistent deal after {attempts} attempts")
            }
            SamplingError::HandSize {
                seat,
                expected,
                actual,
            } => write!(f, "{seat} holds {actual} distinct cards, a deal needs {expected}"),
        }
    }
}

impl std::error::Error for SamplingError {}

#[cfg(test)]
mod tests {
    use super::{DeterminizationSampler, SamplingError, SamplingStats};
    use crate::belief::{CardKnowledge, Distribution};
    use crate::model::card::{Card, DECK_SIZE};
    use crate::model::deck::Deck;
    use crate::model::game::GameState;
    use crate::model::mode::Mode;
    use crate::model::seat::Seat;
    use crate::model::suit::Suit;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use rand::seq::SliceRandom;
    use std::collections::HashSet;

    /// Plays `plies` random legal cards and hides every hand but the mover's.
    fn observed_game(seed: u64, plies: usize, mode: Mode) -> (GameState, GameState) {
        let mut full = GameState::deal(&Deck::shuffled_with_seed(seed), Seat::North, mode);
        let mut rng = SmallRng::seed_from_u64(seed ^ 0x5eed);
        for _ in 0..plies {
            let seat = full.current_player().unwrap();
            let card = *full.legal_cards(seat).choose(&mut rng).unwrap();
            full.play_card(seat, card).unwrap();
        }
        let seat = full.current_player().unwrap();
        let observed = GameState::from_observation(
            mode,
            seat,
            full.hand(seat).clone(),
            full.trick_history().to_vec(),
            full.current_trick().clone(),
        )
        .unwrap();
        (full, observed)
    }

    #[test]
    fn hands_match_targets_and_cover_the_deck() {
        for seed in 0..40u64 {
            let plies = (seed as usize * 7) % 35;
            let (_, game) = observed_game(seed, plies, Mode::ALL[seed as usize % 6]);
            let seat = game.current_player().unwrap();
            let knowledge = CardKnowledge::from_game(&game, seat).unwrap();
            let mut rng = SmallRng::seed_from_u64(seed);
            let det = DeterminizationSampler::sample_with_retries(&knowledge, &mut rng, 16, None)
                .expect("sample");

            let mut seen = HashSet::new();
            for other in Seat::LOOP {
                assert_eq!(det.hand(other).len(), game.expected_hand_size(other));
                for card in det.hand(other).iter() {
                    assert!(seen.insert(*card), "{card} dealt twice");
                }
            }
            for card in game.played_cards() {
                assert!(seen.insert(card), "{card} both played and dealt");
            }
            assert_eq!(seen.len(), DECK_SIZE);
            assert_eq!(det.hand(seat), game.hand(seat));
        }
    }

    #[test]
    fn played_cards_never_reach_another_hand() {
        let (_, game) = observed_game(9, 13, Mode::Trump(Suit::Spades));
        let seat = game.current_player().unwrap();
        let knowledge = CardKnowledge::from_game(&game, seat).unwrap();
        let played: Vec<Card> = game.played_cards();
        let mut rng = SmallRng::seed_from_u64(1);
        for _ in 0..50 {
            let det = DeterminizationSampler::sample_with_retries(&knowledge, &mut rng, 8, None)
                .unwrap();
            for hand in det.hands() {
                assert!(hand.iter().all(|card| !played.contains(card)));
            }
        }
    }

    #[test]
    fn void_seats_never_receive_the_suit() {
        for seed in 0..20u64 {
            let (_, game) = observed_game(seed, 22, Mode::TopDown);
            let seat = game.current_player().unwrap();
            let knowledge = CardKnowledge::from_game(&game, seat).unwrap();
            let mut rng = SmallRng::seed_from_u64(seed);
            let det = DeterminizationSampler::sample_with_retries(&knowledge, &mut rng, 16, None)
                .unwrap();
            for other in Seat::LOOP.into_iter().filter(|s| *s != seat) {
                let impossible = CardKnowledge::impossible_cards(&game, other);
                assert!(det.hand(other).iter().all(|card| !impossible.contains(card)));
            }
        }
    }

    #[test]
    fn same_seed_gives_same_deal() {
        let (_, game) = observed_game(21, 6, Mode::BottomUp);
        let seat = game.current_player().unwrap();
        let knowledge = CardKnowledge::from_game(&game, seat).unwrap();
        let a = DeterminizationSampler::sample(&knowledge, &mut SmallRng::seed_from_u64(77)).unwrap();
        let b = DeterminizationSampler::sample(&knowledge, &mut SmallRng::seed_from_u64(77)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn impossible_estimates_exhaust_the_retries() {
        // Last trick, mover leads: every other seat holds one card.
        let (_, game) = observed_game(4, 32, Mode::TopDown);
        let seat = game.current_player().unwrap();
        let base = CardKnowledge::from_game(&game, seat).unwrap();
        let unseen: Vec<Card> = base.unresolved_cards().collect();
        assert_eq!(unseen.len(), 3);

        // Two cards can only belong to the same seat.
        let only = seat.next();
        let estimates = vec![
            (unseen[0], Distribution::uniform([only]).unwrap()),
            (unseen[1], Distribution::uniform([only]).unwrap()),
            (unseen[2], Distribution::uniform([only.next(), only.next().next()]).unwrap()),
        ];
        let knowledge = CardKnowledge::from_distributions(&game, seat, estimates).unwrap();
        let mut stats = SamplingStats::default();
        let mut rng = SmallRng::seed_from_u64(3);
        let err = DeterminizationSampler::sample_with_retries(&knowledge, &mut rng, 3, Some(&mut stats))
            .unwrap_err();
        assert!(matches!(err, SamplingError::Exhausted { attempts: 3, .. }));
        assert_eq!(stats.attempts, 3);
        assert_eq!(stats.conflicts, 3);
        assert_eq!(stats.succeeded, 0);

        let single = DeterminizationSampler::sample(&knowledge, &mut rng).unwrap_err();
        assert!(matches!(single, SamplingError::Conflict { seat: s, .. } if s == only));
    }

    #[test]
    fn pregame_deal_fills_the_other_hands() {
        let game = GameState::deal(&Deck::shuffled_with_seed(21), Seat::East, Mode::TopDown);
        let own = game.hand(Seat::West).clone();
        let mut rng = SmallRng::seed_from_u64(8);
        let dealt = DeterminizationSampler::deal_unseen(Seat::West, &own, &mut rng).unwrap();

        assert_eq!(dealt.hand(Seat::West), &own);
        let mut seen = HashSet::new();
        for seat in Seat::LOOP {
            assert_eq!(dealt.hand(seat).len(), 9, "{seat}");
            seen.extend(dealt.hand(seat).iter().map(|card| card.id()));
        }
        assert_eq!(seen.len(), DECK_SIZE);

        let again =
            DeterminizationSampler::deal_unseen(Seat::West, &own, &mut SmallRng::seed_from_u64(8))
                .unwrap();
        assert_eq!(again, dealt);
    }

    #[test]
    fn pregame_deal_needs_a_full_hand() {
        let game = GameState::deal(&Deck::shuffled_with_seed(2), Seat::North, Mode::BottomUp);
        let mut cards = game.hand(Seat::North).cards().to_vec();
        cards.pop();
        let short = crate::model::hand::Hand::with_cards(cards);
        let err = DeterminizationSampler::deal_unseen(
            Seat::North,
            &short,
            &mut SmallRng::seed_from_u64(1),
        )
        .unwrap_err();
        assert_eq!(
            err,
            SamplingError::HandSize {
                seat: Seat::North,
                expected: 9,
                actual: 8
            }
        );
    }
}
