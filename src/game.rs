//! The turn engine as a plain value.
//!
//! A [`Game`] is rebuilt from the game directory on every invocation, takes
//! exactly one transition, and is written back. Nothing here touches the
//! filesystem; see [`crate::store::GameDir::load_game`] for that.

use crate::auth::{is_admin, UserError};
use crate::cards::Card;
use crate::config::{OrderPolicy, PassPolicy, Rules};
use crate::deck::{Deck, DeckError};
use crate::player::Player;
use crate::store::{Phase, StoreError, Turn};
use std::collections::HashSet;
use tracing::info;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ActionError {
    #[error("the game has not started")]
    NotStarted,
    #[error("the game has already started")]
    AlreadyStarted,
    #[error("the game is over")]
    GameFinished,
    #[error("at least {min} players are required, found {got}")]
    NotEnoughPlayers { min: usize, got: usize },
    #[error("not your turn: waiting for {expected}")]
    NotYourTurn { expected: String },
    #[error("you have already drawn this turn")]
    AlreadyDrawn,
    #[error("you must draw before passing")]
    MustDrawFirst,
    #[error("you don't have {0}")]
    CardNotHeld(Card),
    #[error("{card} cannot be played on {top}")]
    IllegalPlay { card: Card, top: Card },
    #[error("you can still play {0}")]
    PlayableCardExists(Card),
    #[error("permission denied: only admin may view another player's cards")]
    PermissionDenied,
    #[error("'{0}' is not playing in this game")]
    UnknownPlayer(String),
    #[error(transparent)]
    Seat(#[from] UserError),
    #[error(transparent)]
    Deck(#[from] DeckError),
}

/// What a successful play led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// Play passed to the seat at `next`.
    Continue { next: usize },
    /// The seat at `winner` emptied their hand; the game is finished.
    Won { winner: usize },
}

#[derive(Debug, Clone)]
pub struct Game {
    phase: Phase,
    players: Vec<Player>,
    deck: Deck,
    turn: Turn,
    rules: Rules,
}

impl Game {
    /// Seat `roster` in order, deal each player a hand and flip the first discard.
    pub fn start(roster: &[String], mut deck: Deck, rules: Rules) -> Result<Self, ActionError> {
        if roster.len() < rules.min_players {
            return Err(ActionError::NotEnoughPlayers {
                min: rules.min_players,
                got: roster.len(),
            });
        }
        let mut players = roster
            .iter()
            .map(|name| Player::new(name.as_str()))
            .collect::<Result<Vec<_>, _>>()?;
        for p in &mut players {
            p.deal_initial(deck.deal(rules.hand_size)?);
        }
        let first = deck.start_discard()?;
        info!(players = players.len(), top = %first, "game started");
        Ok(Self {
            phase: Phase::InProgress,
            players,
            deck,
            turn: Turn::default(),
            rules,
        })
    }

    /// Reassemble a game from stored parts. A running game must have its turn
    /// pointer in range and every card in exactly one place. A finished game
    /// only gets looked at, and its roster may have shrunk since, so it is
    /// taken as found with the pointer folded back into range.
    pub fn from_parts(
        phase: Phase,
        players: Vec<Player>,
        deck: Deck,
        mut turn: Turn,
        rules: Rules,
    ) -> Result<Self, StoreError> {
        match phase {
            Phase::NotStarted => {
                return Err(StoreError::Inconsistent("game has not started".into()));
            }
            Phase::InProgress => {
                if players.is_empty() || turn.index >= players.len() {
                    return Err(StoreError::Inconsistent(format!(
                        "turn index {} outside {} players",
                        turn.index,
                        players.len()
                    )));
                }
            }
            Phase::Finished => {
                if turn.index >= players.len() {
                    turn = Turn::default();
                }
            }
        }
        let game = Self {
            phase,
            players,
            deck,
            turn,
            rules,
        };
        if phase == Phase::InProgress {
            game.census().map_err(StoreError::Inconsistent)?;
        }
        Ok(game)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    pub fn turn(&self) -> Turn {
        self.turn
    }

    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    /// The seat holding the turn; `None` only for a finished game whose
    /// roster has since been emptied.
    pub fn current_player(&self) -> Option<&Player> {
        self.players.get(self.turn.index)
    }

    pub fn top_discard(&self) -> Result<Card, ActionError> {
        Ok(self.deck.top_discard()?)
    }

    pub fn seat_of(&self, name: &str) -> Option<usize> {
        self.players.iter().position(|p| p.name() == name)
    }

    /// Every card must sit in exactly one place: draw pile, discard pile or a hand.
    pub fn census(&self) -> Result<(), String> {
        let mut seen = HashSet::with_capacity(52);
        let all = self
            .deck
            .draw_pile()
            .iter()
            .chain(self.deck.discard_pile())
            .chain(self.players.iter().flat_map(|p| p.hand()));
        for &card in all {
            if !seen.insert(card) {
                return Err(format!("{card} appears more than once"));
            }
        }
        if seen.len() != 52 {
            return Err(format!("{} of 52 cards accounted for", seen.len()));
        }
        Ok(())
    }

    fn ensure_in_progress(&self) -> Result<(), ActionError> {
        match self.phase {
            Phase::InProgress => Ok(()),
            Phase::Finished => Err(ActionError::GameFinished),
            Phase::NotStarted => Err(ActionError::NotStarted),
        }
    }

    /// The seat of `user` if the game is running and it is their turn.
    pub fn ensure_turn(&self, user: &str) -> Result<usize, ActionError> {
        self.ensure_in_progress()?;
        match self.current_player() {
            Some(current) if current.name() == user => Ok(self.turn.index),
            Some(current) => Err(ActionError::NotYourTurn {
                expected: current.name().to_string(),
            }),
            None => Err(ActionError::UnknownPlayer(user.to_string())),
        }
    }

    pub fn play(&mut self, user: &str, card: Card) -> Result<PlayOutcome, ActionError> {
        let seat = self.ensure_turn(user)?;
        self.players[seat].play(card, &mut self.deck)?;

        if self.players[seat].has_won() {
            self.phase = Phase::Finished;
            info!(winner = user, "game finished");
            return Ok(PlayOutcome::Won { winner: seat });
        }
        self.turn.advance(self.players.len());
        info!(user, card = %card, next = self.players[self.turn.index].name(), "card played");
        Ok(PlayOutcome::Continue {
            next: self.turn.index,
        })
    }

    pub fn draw(&mut self, user: &str) -> Result<Card, ActionError> {
        let seat = self.ensure_turn(user)?;
        if self.turn.has_drawn {
            return Err(ActionError::AlreadyDrawn);
        }
        let card = self.players[seat].draw(&mut self.deck)?;
        self.turn.has_drawn = true;
        info!(user, "card drawn");
        Ok(card)
    }

    /// End the turn without playing. Returns the seat that plays next.
    pub fn pass(&mut self, user: &str) -> Result<usize, ActionError> {
        let seat = self.ensure_turn(user)?;
        if !self.turn.has_drawn {
            return Err(ActionError::MustDrawFirst);
        }
        if self.rules.pass_policy == PassPolicy::NoPlayableCard {
            let top = self.deck.top_discard()?;
            if let Some(card) = self.players[seat].playable_against(top) {
                return Err(ActionError::PlayableCardExists(card));
            }
        }
        self.turn.advance(self.players.len());
        info!(user, next = self.players[self.turn.index].name(), "turn passed");
        Ok(self.turn.index)
    }

    /// Names in playing order, starting with whoever holds the turn.
    pub fn order(&self) -> Vec<&str> {
        let n = self.players.len();
        (0..n)
            .map(|offset| self.players[(self.turn.index + offset) % n].name())
            .collect()
    }

    /// Apply the order policy for `viewer`. Returns true when the turn holder changed.
    pub fn view_order(&mut self, viewer: &str) -> bool {
        if self.rules.order_policy != OrderPolicy::ClaimTurn || self.phase != Phase::InProgress {
            return false;
        }
        match self.seat_of(viewer) {
            Some(seat) if seat != self.turn.index => {
                self.turn = Turn {
                    index: seat,
                    has_drawn: false,
                };
                info!(user = viewer, "turn claimed by viewing order");
                true
            }
            _ => false,
        }
    }

    /// The seat `caller` is allowed to look at: their own, or anyone's for admin.
    pub fn view_hand(&self, target: &str, caller: &str) -> Result<&Player, ActionError> {
        if !is_admin(caller) && caller != target {
            return Err(ActionError::PermissionDenied);
        }
        self.seat_of(target)
            .map(|seat| &self.players[seat])
            .ok_or_else(|| ActionError::UnknownPlayer(target.to_string()))
    }

    /// Points left in each hand, in seating order.
    pub fn scores(&self) -> Vec<(&str, u32)> {
        self.players.iter().map(|p| (p.name(), p.score())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::{Rank, Suit};

    fn c(r: Rank, s: Suit) -> Card {
        Card::new(r, s)
    }

    fn names(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    /// A game mid-play with chosen hands and top discard; every other card
    /// sits in the draw pile.
    fn table(hands: &[(&str, Vec<Card>)], top: Card, rules: Rules) -> Game {
        let mut used: HashSet<Card> = hands.iter().flat_map(|(_, h)| h.iter().copied()).collect();
        used.insert(top);
        let draw: Vec<Card> = Card::universe().into_iter().filter(|c| !used.contains(c)).collect();
        let players = hands
            .iter()
            .map(|(n, h)| {
                let mut p = Player::new(*n).unwrap();
                p.deal_initial(h.clone());
                p
            })
            .collect();
        Game::from_parts(
            Phase::InProgress,
            players,
            Deck::from_piles(draw, vec![top]),
            Turn::default(),
            rules,
        )
        .unwrap()
    }

    #[test]
    fn start_deals_hands_and_flips_one_card() {
        let g = Game::start(&names(&["a", "b", "c"]), Deck::seeded(9), Rules::default()).unwrap();
        assert_eq!(g.phase(), Phase::InProgress);
        assert!(g.players().iter().all(|p| p.hand().len() == 5));
        assert_eq!(g.deck().discard_pile().len(), 1);
        assert_eq!(g.deck().draw_pile().len(), 52 - 15 - 1);
        assert_eq!(g.turn(), Turn::default());
        g.census().unwrap();
    }

    #[test]
    fn start_needs_two_players() {
        let err = Game::start(&names(&["solo"]), Deck::seeded(1), Rules::default()).unwrap_err();
        assert_eq!(err, ActionError::NotEnoughPlayers { min: 2, got: 1 });
    }

    #[test]
    fn start_fails_when_hands_exceed_the_deck() {
        let rules = Rules::default().with_hand_size(30);
        let err = Game::start(&names(&["a", "b"]), Deck::seeded(1), rules).unwrap_err();
        assert!(matches!(err, ActionError::Deck(DeckError::InsufficientCards { .. })));
    }

    #[test]
    fn only_the_current_player_may_act() {
        let mut g = table(
            &[("a", vec![c(Rank::Two, Suit::Hearts)]), ("b", vec![c(Rank::Three, Suit::Hearts)])],
            c(Rank::Nine, Suit::Hearts),
            Rules::default(),
        );
        let expected = ActionError::NotYourTurn {
            expected: "a".into(),
        };
        assert_eq!(g.draw("b"), Err(expected.clone()));
        assert_eq!(g.pass("b"), Err(expected.clone()));
        assert_eq!(g.play("b", c(Rank::Three, Suit::Hearts)), Err(expected));
    }

    #[test]
    fn play_advances_and_clears_draw_flag() {
        let mut g = table(
            &[
                ("a", vec![c(Rank::Two, Suit::Hearts), c(Rank::Four, Suit::Clubs)]),
                ("b", vec![c(Rank::Three, Suit::Hearts)]),
            ],
            c(Rank::Nine, Suit::Hearts),
            Rules::default(),
        );
        g.draw("a").unwrap();
        assert!(g.turn().has_drawn);
        let out = g.play("a", c(Rank::Two, Suit::Hearts)).unwrap();
        assert_eq!(out, PlayOutcome::Continue { next: 1 });
        assert_eq!(g.turn(), Turn { index: 1, has_drawn: false });
        assert_eq!(g.top_discard().unwrap(), c(Rank::Two, Suit::Hearts));
        g.census().unwrap();
    }

    #[test]
    fn illegal_play_changes_nothing() {
        let mut g = table(
            &[("a", vec![c(Rank::King, Suit::Spades)]), ("b", vec![c(Rank::Three, Suit::Hearts)])],
            c(Rank::Nine, Suit::Hearts),
            Rules::default(),
        );
        let err = g.play("a", c(Rank::King, Suit::Spades)).unwrap_err();
        assert_eq!(
            err,
            ActionError::IllegalPlay {
                card: c(Rank::King, Suit::Spades),
                top: c(Rank::Nine, Suit::Hearts)
            }
        );
        assert_eq!(g.turn().index, 0);
        assert_eq!(g.players()[0].hand().len(), 1);
        assert_eq!(
            g.play("a", c(Rank::Ace, Suit::Spades)),
            Err(ActionError::CardNotHeld(c(Rank::Ace, Suit::Spades)))
        );
    }

    #[test]
    fn second_draw_in_a_turn_is_refused() {
        let mut g = table(
            &[("a", vec![c(Rank::King, Suit::Spades)]), ("b", vec![c(Rank::Three, Suit::Hearts)])],
            c(Rank::Nine, Suit::Hearts),
            Rules::default(),
        );
        g.draw("a").unwrap();
        assert_eq!(g.draw("a"), Err(ActionError::AlreadyDrawn));
        assert_eq!(g.players()[0].hand().len(), 2);
    }

    #[test]
    fn pass_requires_a_draw_first() {
        let mut g = table(
            &[("a", vec![c(Rank::King, Suit::Spades)]), ("b", vec![c(Rank::Three, Suit::Hearts)])],
            c(Rank::Nine, Suit::Hearts),
            Rules::default(),
        );
        assert_eq!(g.pass("a"), Err(ActionError::MustDrawFirst));
        g.draw("a").unwrap();
        assert_eq!(g.pass("a").unwrap(), 1);
        assert_eq!(g.turn(), Turn { index: 1, has_drawn: false });
    }

    #[test]
    fn strict_pass_policy_refuses_while_a_card_fits() {
        let rules = Rules::default().with_pass_policy(PassPolicy::NoPlayableCard);
        let mut g = table(
            &[("a", vec![c(Rank::Eight, Suit::Spades)]), ("b", vec![c(Rank::Three, Suit::Hearts)])],
            c(Rank::Nine, Suit::Hearts),
            rules,
        );
        g.draw("a").unwrap();
        assert_eq!(
            g.pass("a"),
            Err(ActionError::PlayableCardExists(c(Rank::Eight, Suit::Spades)))
        );
    }

    #[test]
    fn strict_pass_policy_allows_a_pass_with_nothing_to_play() {
        let rules = Rules::default().with_pass_policy(PassPolicy::NoPlayableCard);
        let mut g = table(
            &[
                ("a", vec![c(Rank::Three, Suit::Clubs), c(Rank::Four, Suit::Clubs)]),
                ("b", vec![c(Rank::Three, Suit::Hearts)]),
            ],
            c(Rank::Two, Suit::Hearts),
            rules,
        );
        assert_eq!(g.pass("a"), Err(ActionError::MustDrawFirst));
        let drawn = g.draw("a").unwrap();
        assert!(!drawn.matches(c(Rank::Two, Suit::Hearts)), "drew {drawn}");
        assert_eq!(g.pass("a").unwrap(), 1);
        assert_eq!(g.turn(), Turn { index: 1, has_drawn: false });
        assert_eq!(g.current_player().map(Player::name), Some("b"));
    }

    #[test]
    fn emptying_a_hand_finishes_the_game() {
        let mut g = table(
            &[("a", vec![c(Rank::Two, Suit::Hearts)]), ("b", vec![c(Rank::King, Suit::Clubs)])],
            c(Rank::Nine, Suit::Hearts),
            Rules::default(),
        );
        assert_eq!(g.play("a", c(Rank::Two, Suit::Hearts)).unwrap(), PlayOutcome::Won { winner: 0 });
        assert_eq!(g.phase(), Phase::Finished);
        assert_eq!(g.turn().index, 0);
        assert_eq!(g.scores(), vec![("a", 0), ("b", 10)]);
        assert_eq!(g.draw("a"), Err(ActionError::GameFinished));
        assert_eq!(g.pass("b"), Err(ActionError::GameFinished));
    }

    #[test]
    fn order_starts_from_the_turn_holder() {
        let mut g = Game::start(&names(&["a", "b", "c"]), Deck::seeded(2), Rules::default()).unwrap();
        assert_eq!(g.order(), vec!["a", "b", "c"]);
        g.draw("a").unwrap();
        g.pass("a").unwrap();
        assert_eq!(g.order(), vec!["b", "c", "a"]);
        assert!(!g.view_order("c"));
        assert_eq!(g.turn().index, 1);
    }

    #[test]
    fn claim_turn_policy_hands_the_turn_to_the_viewer() {
        let rules = Rules::default().with_order_policy(OrderPolicy::ClaimTurn);
        let mut g = Game::start(&names(&["a", "b", "c"]), Deck::seeded(2), rules).unwrap();
        g.draw("a").unwrap();
        assert!(g.view_order("c"));
        assert_eq!(g.turn(), Turn { index: 2, has_drawn: false });
        assert!(!g.view_order("c"));
        assert!(!g.view_order("admin"));
    }

    #[test]
    fn hands_are_private_except_to_admin() {
        let g = Game::start(&names(&["a", "b"]), Deck::seeded(4), Rules::default()).unwrap();
        assert_eq!(g.view_hand("a", "b").unwrap_err(), ActionError::PermissionDenied);
        assert_eq!(g.view_hand("a", "a").unwrap().name(), "a");
        assert_eq!(g.view_hand("b", "admin").unwrap().name(), "b");
        assert_eq!(
            g.view_hand("zed", "admin").unwrap_err(),
            ActionError::UnknownPlayer("zed".into())
        );
    }

    #[test]
    fn finished_game_survives_an_emptied_roster() {
        let g = Game::from_parts(
            Phase::Finished,
            Vec::new(),
            Deck::from_piles(Card::universe(), Vec::new()),
            Turn { index: 1, has_drawn: false },
            Rules::default(),
        )
        .unwrap();
        assert_eq!(g.turn(), Turn::default());
        assert!(g.current_player().is_none());
        assert!(g.order().is_empty());
        assert_eq!(g.ensure_turn("a"), Err(ActionError::GameFinished));
    }

    #[test]
    fn from_parts_rejects_broken_state() {
        let g = Game::start(&names(&["a", "b"]), Deck::seeded(4), Rules::default()).unwrap();
        let bad_turn = Game::from_parts(
            Phase::InProgress,
            g.players().to_vec(),
            g.deck().clone(),
            Turn { index: 2, has_drawn: false },
            Rules::default(),
        );
        assert!(matches!(bad_turn, Err(StoreError::Inconsistent(_))));

        let mut dup = g.players().to_vec();
        let stolen = g.top_discard().unwrap();
        let mut hand = dup[0].hand().to_vec();
        hand.push(stolen);
        dup[0].deal_initial(hand);
        let duplicated = Game::from_parts(
            Phase::InProgress,
            dup,
            g.deck().clone(),
            Turn::default(),
            Rules::default(),
        );
        assert!(matches!(duplicated, Err(StoreError::Inconsistent(_))));
    }
}
