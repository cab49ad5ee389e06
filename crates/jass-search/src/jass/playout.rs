//! Rule-based rollout policies for Jass.
//!
//! Both policies narrow the legal cards to a set of advisable ones and pick
//! uniformly among those. They read the opponents' hands, so they are only
//! meaningful on a determinized board.

use crate::board::{PlayoutPolicy, SearchRng};
use jass_core::model::card::{Card, DECK_SIZE};
use jass_core::model::game::GameState;
use jass_core::model::mode::Mode;
use jass_core::model::rank::Rank;
use jass_core::model::seat::Seat;
use jass_core::model::trick::Play;
use rand::Rng;

use super::board::JassBoard;

/// Tricks after which a leader no longer pulls trumps.
const EARLY_TRICKS: usize = 2;
/// Points a trick must carry before it is worth a trump.
const TRUMP_WORTHY_POINTS: u32 = 10;

/// Cheap rollouts: win tricks the opponents hold as last player, pull
/// trumps early, feed points to a partner who has the trick.
#[derive(Debug, Default, Clone, Copy)]
pub struct LightPlayout;

/// Slower rollouts that also reason about the players still to come and
/// about the highest remaining cards when leading.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeavyPlayout;

impl PlayoutPolicy<JassBoard> for LightPlayout {
    fn choose(&self, board: &JassBoard, moves: &[Play], rng: &mut SearchRng) -> usize {
        choose_among(board, moves, rng, sensible_cards)
    }

    fn name(&self) -> &'static str {
        "light"
    }
}

impl PlayoutPolicy<JassBoard> for HeavyPlayout {
    fn choose(&self, board: &JassBoard, moves: &[Play], rng: &mut SearchRng) -> usize {
        choose_among(board, moves, rng, advisable_cards)
    }

    fn name(&self) -> &'static str {
        "heavy"
    }
}

fn choose_among(
    board: &JassBoard,
    moves: &[Play],
    rng: &mut SearchRng,
    refine: fn(&GameState, Seat, &[Card]) -> Vec<Card>,
) -> usize {
    let Some(seat) = moves.first().map(|play| play.seat) else {
        return 0;
    };
    let cards: Vec<Card> = moves.iter().map(|play| play.card).collect();
    let preferred = refine(board.game(), seat, &cards);
    let candidates: Vec<usize> = moves
        .iter()
        .enumerate()
        .filter(|(_, play)| preferred.contains(&play.card))
        .map(|(index, _)| index)
        .collect();
    if candidates.is_empty() {
        rng.gen_range(0..moves.len())
    } else {
        candidates[rng.gen_range(0..candidates.len())]
    }
}

/// Narrows `legal` to cards an experienced player would consider.
///
/// Never returns an empty set when `legal` is non-empty.
pub fn sensible_cards(game: &GameState, seat: Seat, legal: &[Card]) -> Vec<Card> {
    let mode = game.mode();
    let trick = game.current_trick();
    let played = trick.plays().len();

    if played == 3 && holder_is_opponent(game, seat) {
        if let Some(winning) = winning_by_preference(game, legal) {
            return winning;
        }
    }

    let trumps: Vec<Card> = legal.iter().copied().filter(|c| mode.is_trump(*c)).collect();
    if played == 0 && game.tricks_completed() < EARLY_TRICKS && trumps.len() >= 2 {
        return trumps;
    }

    let smear = smear_cards(mode, legal);
    if !smear.is_empty() && trick.has_played(seat.partner()) && holder(game) == Some(seat.partner())
    {
        let last = played == 3;
        if last || !next_opponent_can_win(game, seat) {
            return smear;
        }
    }

    legal.to_vec()
}

/// The heavier rule set: considers every position in the trick and, when
/// leading, trumps left with the opponents and the top remaining cards.
pub fn advisable_cards(game: &GameState, seat: Seat, legal: &[Card]) -> Vec<Card> {
    let advisable = match game.current_trick().plays().len() {
        0 => as_leader(game, seat, legal),
        1 => {
            let opponents_hold = !partner_can_win(game, seat);
            as_follower(game, legal, opponents_hold)
        }
        2 => {
            let opponents_hold =
                holder_is_opponent(game, seat) || next_opponent_can_win(game, seat);
            as_follower(game, legal, opponents_hold)
        }
        _ => {
            let opponents_hold = holder_is_opponent(game, seat);
            as_follower(game, legal, opponents_hold)
        }
    };
    if advisable.is_empty() {
        legal.to_vec()
    } else {
        advisable
    }
}

fn as_follower(game: &GameState, legal: &[Card], opponents_hold: bool) -> Vec<Card> {
    let mode = game.mode();
    let preferred = if opponents_hold {
        winning_by_preference(game, legal).unwrap_or_default()
    } else {
        smear_cards(mode, legal)
    };
    if !preferred.is_empty() {
        return preferred;
    }
    legal
        .iter()
        .copied()
        .filter(|card| mode.card_points(*card) == 0 && !mode.is_trump(*card))
        .collect()
}

fn as_leader(game: &GameState, seat: Seat, legal: &[Card]) -> Vec<Card> {
    let mode = game.mode();
    let mut advisable = Vec::new();

    let opponents_have_trumps = [seat.next(), seat.partner().next()]
        .iter()
        .all(|opponent| game.hand(*opponent).iter().any(|card| mode.is_trump(*card)));
    if mode.trump_suit().is_some() && opponents_have_trumps {
        advisable.extend(legal.iter().copied().filter(|card| mode.is_trump(*card)));
    }

    let tops = top_remaining(game);
    for card in legal {
        if tops.contains(card) && !advisable.contains(card) {
            advisable.push(*card);
        }
    }

    // Lead into a suit where the partner holds the top card.
    let partner = game.hand(seat.partner());
    for top in tops.iter().filter(|top| partner.contains(**top)) {
        for card in legal.iter().filter(|card| card.suit == top.suit) {
            if !advisable.contains(card) {
                advisable.push(*card);
            }
        }
    }
    advisable
}

/// Highest unplayed card of every non-trump suit.
fn top_remaining(game: &GameState) -> Vec<Card> {
    let mode = game.mode();
    let played = game.played_cards();
    let mut tops: Vec<Card> = Vec::new();
    for card in (0..DECK_SIZE as u8).filter_map(Card::from_id) {
        if mode.is_trump(card) || played.contains(&card) {
            continue;
        }
        match tops.iter_mut().find(|top| top.suit == card.suit) {
            Some(top) => {
                if mode.trick_strength(card, card.suit) > mode.trick_strength(*top, top.suit) {
                    *top = card;
                }
            }
            None => tops.push(card),
        }
    }
    tops
}

/// Winning non-trumps if any, else winning trumps when the trick is worth it.
fn winning_by_preference(game: &GameState, legal: &[Card]) -> Option<Vec<Card>> {
    let mode = game.mode();
    let winning: Vec<Card> = legal.iter().copied().filter(|c| wins_trick(game, *c)).collect();
    let plain: Vec<Card> = winning.iter().copied().filter(|c| !mode.is_trump(*c)).collect();
    if !plain.is_empty() {
        return Some(plain);
    }
    let trumps: Vec<Card> = winning.into_iter().filter(|c| mode.is_trump(*c)).collect();
    if !trumps.is_empty() && game.current_trick().points(mode) > TRUMP_WORTHY_POINTS {
        return Some(trumps);
    }
    None
}

fn smear_cards(mode: Mode, cards: &[Card]) -> Vec<Card> {
    cards
        .iter()
        .copied()
        .filter(|card| match (mode, card.rank) {
            (_, Rank::Ten) => true,
            (Mode::TopDown, Rank::Eight) => true,
            (Mode::BottomUp, Rank::King | Rank::Queen | Rank::Jack) => true,
            _ => false,
        })
        .collect()
}

fn wins_trick(game: &GameState, card: Card) -> bool {
    let mut cards = game.current_trick().cards();
    cards.push(card);
    game.mode().winning_index(&cards) == Some(cards.len() - 1)
}

fn holder(game: &GameState) -> Option<Seat> {
    game.current_trick()
        .current_winner(game.mode())
        .map(|play| play.seat)
}

fn holder_is_opponent(game: &GameState, seat: Seat) -> bool {
    holder(game).is_some_and(|holder| holder.is_opponent_of(seat))
}

/// Whether the opponent playing right after `seat` could take the trick
/// from its current holder.
fn next_opponent_can_win(game: &GameState, seat: Seat) -> bool {
    let trick = game.current_trick();
    if trick.plays().len() >= 3 {
        return false;
    }
    let opponent = seat.next();
    game.legal_cards(opponent)
        .into_iter()
        .any(|card| wins_trick(game, card))
}

/// Whether the partner, playing third, holds a card that beats the trick
/// so far.
fn partner_can_win(game: &GameState, seat: Seat) -> bool {
    game.legal_cards(seat.partner())
        .into_iter()
        .any(|card| wins_trick(game, card))
}
