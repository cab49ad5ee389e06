use jass_core::belief::{CardKnowledge, DeterminizationSampler, SamplingStats};
use jass_core::model::card::DECK_SIZE;
use jass_core::model::deck::Deck;
use jass_core::model::game::GameState;
use jass_core::model::mode::Mode;
use jass_core::model::seat::Seat;
use rand::RngCore;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Plays `plays` random legal cards from a seeded deal.
fn midgame(seed: u64, mode: Mode, plays: usize) -> GameState {
    let mut game = GameState::deal(&Deck::shuffled_with_seed(seed), Seat::North, mode);
    let mut rng = StdRng::seed_from_u64(seed ^ 0x5eed);
    for _ in 0..plays {
        let seat = game.current_player().expect("running game");
        let card = *game.legal_cards(seat).choose(&mut rng).expect("legal card");
        game.play_card(seat, card).expect("legal play");
    }
    game
}

fn observed(game: &GameState, seat: Seat) -> GameState {
    GameState::from_observation(
        game.mode(),
        seat,
        game.hand(seat).clone(),
        game.trick_history().to_vec(),
        game.current_trick().clone(),
    )
    .expect("observation")
}

#[test]
fn true_holders_are_never_eliminated() {
    let mut seeds = StdRng::seed_from_u64(20261019);
    for round in 0..60 {
        let seed = seeds.next_u64();
        let mode = Mode::ALL[round % Mode::ALL.len()];
        let game = midgame(seed, mode, (round * 7) % 33);
        let seat = game.current_player().expect("to move");
        let knowledge = CardKnowledge::from_game(&observed(&game, seat), seat).expect("knowledge");

        for other in Seat::LOOP.into_iter().filter(|s| *s != seat) {
            assert_eq!(knowledge.hand_size_target(other), game.hand(other).len());
            for card in game.hand(other).iter() {
                let distribution = knowledge.distribution(*card).expect("unseen card");
                assert!(
                    distribution.has_player(other),
                    "{card} held by {other} was eliminated (seed {seed})"
                );
            }
        }
    }
}

#[test]
fn sampled_deals_respect_every_observation() {
    let mut seeds = StdRng::seed_from_u64(7);
    for round in 0..30 {
        let seed = seeds.next_u64();
        let mode = Mode::ALL[round % Mode::ALL.len()];
        let game = midgame(seed, mode, 4 + (round * 5) % 28);
        let seat = game.current_player().expect("to move");
        let view = observed(&game, seat);
        let knowledge = CardKnowledge::from_game(&view, seat).expect("knowledge");

        let mut rng = StdRng::seed_from_u64(seed);
        let mut stats = SamplingStats::default();
        let deal = DeterminizationSampler::sample_with_retries(
            &knowledge,
            &mut rng,
            128,
            Some(&mut stats),
        )
        .expect("consistent deal");
        assert_eq!(stats.succeeded, 1);

        let mut seen = [0u8; DECK_SIZE];
        for other in Seat::LOOP {
            assert_eq!(deal.hand(other).len(), game.hand(other).len());
            for card in deal.hand(other).iter() {
                seen[card.id() as usize] += 1;
                if other != seat {
                    for impossible in CardKnowledge::impossible_cards(&view, other) {
                        assert_ne!(*card, impossible, "{other} shown void but dealt {card}");
                    }
                }
            }
        }
        for play in view.played_moves() {
            seen[play.card.id() as usize] += 1;
        }
        assert!(seen.iter().all(|count| *count == 1), "deck not partitioned (seed {seed})");

        let resampled = view.with_hands(deal.into_hands());
        assert_eq!(resampled.current_player(), Some(seat));
        assert!(!resampled.legal_cards(seat).is_empty());
    }
}
