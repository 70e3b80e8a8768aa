use crate::auth::{is_admin, UserError};
use crate::cards::Card;
use crate::deck::{Deck, DeckError};
use crate::game::ActionError;
use crate::store::{Commit, GameDir, StoreError};

/// One seat at the table and the cards it holds, in the order they arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    name: String,
    hand: Vec<Card>,
}

impl Player {
    pub fn new(name: impl Into<String>) -> Result<Self, UserError> {
        let name = name.into();
        if is_admin(&name) {
            return Err(UserError::ReservedName(name));
        }
        Ok(Self {
            name,
            hand: Vec::new(),
        })
    }

    /// Returns the player's name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the player's hand
    pub fn hand(&self) -> &[Card] {
        &self.hand
    }

    pub fn holds(&self, card: Card) -> bool {
        self.hand.contains(&card)
    }

    pub fn deal_initial(&mut self, cards: Vec<Card>) {
        self.hand = cards;
    }

    /// Move `card` from the hand onto the discard pile if it is held and
    /// matches the current top discard.
    pub fn play(&mut self, card: Card, deck: &mut Deck) -> Result<(), ActionError> {
        let pos = self
            .hand
            .iter()
            .position(|&c| c == card)
            .ok_or(ActionError::CardNotHeld(card))?;
        let top = deck.top_discard()?;
        if !card.matches(top) {
            return Err(ActionError::IllegalPlay { card, top });
        }
        self.hand.remove(pos);
        deck.play(card);
        Ok(())
    }

    pub fn draw(&mut self, deck: &mut Deck) -> Result<Card, DeckError> {
        let card = deck.draw()?;
        self.hand.push(card);
        Ok(card)
    }

    /// First held card that could be laid on `top`.
    pub fn playable_against(&self, top: Card) -> Option<Card> {
        self.hand.iter().copied().find(|c| c.matches(top))
    }

    pub fn has_won(&self) -> bool {
        self.hand.is_empty()
    }

    /// Penalty points still in hand.
    pub fn score(&self) -> u32 {
        self.hand.iter().map(|c| c.rank().points()).sum()
    }

    /// Read `<name>.txt`; a player without a hand file holds nothing yet.
    pub fn load(dir: &GameDir, name: &str) -> Result<Self, StoreError> {
        let mut player = Player::new(name)
            .map_err(|e| StoreError::Inconsistent(format!("cannot seat '{name}': {e}")))?;
        player.hand = dir.read_cards(&GameDir::hand_file(name))?;
        Ok(player)
    }

    pub fn save(&self, tx: &mut Commit<'_>) -> Result<(), StoreError> {
        tx.write_cards(&GameDir::hand_file(&self.name), &self.hand)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::{Rank, Suit};

    fn c(r: Rank, s: Suit) -> Card {
        Card::new(r, s)
    }

    fn deck_with_top(top: Card) -> Deck {
        Deck::from_piles(vec![c(Rank::Two, Suit::Spades)], vec![top])
    }

    #[test]
    fn admin_cannot_take_a_seat() {
        assert!(matches!(Player::new("Admin"), Err(UserError::ReservedName(_))));
        assert!(Player::new("alice").is_ok());
    }

    #[test]
    fn play_checks_ownership_then_matching() {
        let mut p = Player::new("alice").unwrap();
        p.deal_initial(vec![c(Rank::King, Suit::Hearts), c(Rank::Three, Suit::Spades)]);
        let mut deck = deck_with_top(c(Rank::Five, Suit::Hearts));

        let missing = c(Rank::Ace, Suit::Hearts);
        assert_eq!(p.play(missing, &mut deck), Err(ActionError::CardNotHeld(missing)));

        let off = c(Rank::Three, Suit::Spades);
        assert!(matches!(p.play(off, &mut deck), Err(ActionError::IllegalPlay { .. })));
        assert_eq!(p.hand().len(), 2);

        let kh = c(Rank::King, Suit::Hearts);
        p.play(kh, &mut deck).unwrap();
        assert_eq!(p.hand(), &[off]);
        assert_eq!(deck.top_discard().unwrap(), kh);
    }

    #[test]
    fn eights_are_always_playable() {
        let mut p = Player::new("bob").unwrap();
        let eight = c(Rank::Eight, Suit::Clubs);
        p.deal_initial(vec![eight]);
        let mut deck = deck_with_top(c(Rank::Queen, Suit::Diamonds));
        assert_eq!(p.playable_against(c(Rank::Queen, Suit::Diamonds)), Some(eight));
        p.play(eight, &mut deck).unwrap();
        assert!(p.has_won());
    }

    #[test]
    fn draw_appends_to_hand() {
        let mut p = Player::new("bob").unwrap();
        let mut deck = deck_with_top(c(Rank::Queen, Suit::Diamonds));
        let drawn = p.draw(&mut deck).unwrap();
        assert_eq!(drawn, c(Rank::Two, Suit::Spades));
        assert_eq!(p.hand(), &[drawn]);
        assert_eq!(p.draw(&mut deck), Err(DeckError::NoCardsToReshuffle));
    }

    #[test]
    fn score_counts_faces_as_ten() {
        let mut p = Player::new("carol").unwrap();
        p.deal_initial(vec![
            c(Rank::Ace, Suit::Clubs),
            c(Rank::Eight, Suit::Hearts),
            c(Rank::Ten, Suit::Spades),
            c(Rank::Queen, Suit::Diamonds),
        ]);
        assert_eq!(p.score(), 1 + 8 + 10 + 10);
        assert!(!p.has_won());
    }

    #[test]
    fn hand_file_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = GameDir::create(tmp.path().join("g")).unwrap();
        assert!(Player::load(&dir, "dave").unwrap().hand().is_empty());

        let mut p = Player::new("dave").unwrap();
        p.deal_initial(vec![c(Rank::Ten, Suit::Hearts), c(Rank::Jack, Suit::Clubs)]);
        let mut tx = dir.begin();
        p.save(&mut tx).unwrap();
        assert!(!dir.exists("dave.txt"));
        tx.finish().unwrap();
        assert_eq!(Player::load(&dir, "dave").unwrap(), p);
        assert!(dir.exists("dave.txt"));
    }
}
