use crazy_eights::cards::{Card, Rank, Suit};
use crazy_eights::config::Rules;
use crazy_eights::deck::{Deck, DeckError};
use crazy_eights::game::{ActionError, Game, PlayOutcome};
use crazy_eights::player::Player;
use crazy_eights::store::Phase;
use proptest::prelude::*;

fn any_rank() -> impl Strategy<Value = Rank> {
    prop::sample::select(Rank::ALL.to_vec())
}

fn any_suit() -> impl Strategy<Value = Suit> {
    prop_oneof![Just(Suit::Clubs), Just(Suit::Diamonds), Just(Suit::Hearts), Just(Suit::Spades),]
}

fn any_card() -> impl Strategy<Value = Card> {
    (any_rank(), any_suit()).prop_map(|(r, s)| Card::new(r, s))
}

fn roster(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("p{i}")).collect()
}

proptest! {
    #[test]
    fn play_is_legal_exactly_when_the_card_matches(card in any_card(), top in any_card()) {
        prop_assume!(card != top);
        let mut player = Player::new("p").unwrap();
        player.deal_initial(vec![card]);
        let mut deck = Deck::from_piles(Vec::new(), vec![top]);

        let expected = card.rank() == top.rank() || card.suit() == top.suit() || card.rank() == Rank::Eight;
        match player.play(card, &mut deck) {
            Ok(()) => {
                prop_assert!(expected);
                prop_assert_eq!(deck.top_discard().unwrap(), card);
                prop_assert!(player.hand().is_empty());
            }
            Err(ActionError::IllegalPlay { card: c, top: t }) => {
                prop_assert!(!expected);
                prop_assert_eq!((c, t), (card, top));
                prop_assert_eq!(player.hand(), &[card][..]);
            }
            Err(e) => prop_assert!(false, "unexpected error {e}"),
        }
    }

    #[test]
    fn reshuffle_keeps_the_top_and_recycles_the_rest(k in 1usize..=40) {
        let discard: Vec<Card> = Card::universe().into_iter().take(k).collect();
        let top = discard[k - 1];
        let mut deck = Deck::from_piles(Vec::new(), discard);

        match deck.draw() {
            Ok(card) => {
                prop_assert!(k > 1);
                prop_assert_ne!(card, top);
                prop_assert_eq!(deck.discard_pile(), &[top][..]);
                prop_assert_eq!(deck.draw_pile().len(), k - 2);
            }
            Err(e) => {
                prop_assert_eq!(k, 1);
                prop_assert_eq!(e, DeckError::NoCardsToReshuffle);
            }
        }
    }

    /// Drive a game with arbitrary choices among the moves the rules allow.
    #[test]
    fn random_legal_play_conserves_cards_and_rotates_turns(
        seed in any::<u64>(),
        players in 2usize..=5,
        choices in prop::collection::vec(any::<u8>(), 1..200),
    ) {
        let mut g = Game::start(&roster(players), Deck::seeded(seed), Rules::default()).unwrap();
        let mut advances = 0usize;

        for choice in choices {
            let current = g.current_player().unwrap();
            let user = current.name().to_string();
            let top = g.top_discard().unwrap();
            let playable = current.playable_against(top);

            match (playable, g.turn().has_drawn) {
                (Some(card), drawn) if choice % 2 == 0 || drawn => {
                    match g.play(&user, card).unwrap() {
                        PlayOutcome::Won { .. } => {
                            prop_assert_eq!(g.phase(), Phase::Finished);
                            g.census().unwrap();
                            break;
                        }
                        PlayOutcome::Continue { .. } => advances += 1,
                    }
                }
                (_, false) => match g.draw(&user) {
                    Ok(_) => {
                        prop_assert!(g.turn().has_drawn);
                        prop_assert_eq!(g.draw(&user), Err(ActionError::AlreadyDrawn));
                    }
                    // every card is in someone's hand; the table is stuck
                    Err(ActionError::Deck(DeckError::NoCardsToReshuffle)) => break,
                    Err(e) => prop_assert!(false, "unexpected draw error {e}"),
                },
                (_, true) => {
                    g.pass(&user).unwrap();
                    advances += 1;
                }
            }

            prop_assert!(g.census().is_ok(), "{:?}", g.census());
            prop_assert_eq!(g.turn().index, advances % players);
            prop_assert_eq!(g.current_player().unwrap().name() == user, g.turn().has_drawn);
        }
    }
}
