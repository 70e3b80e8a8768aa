use crate::cards::Card;
use crate::store::{Commit, GameDir, StoreError, DISCARD_FILE, DRAW_FILE, SHUFFLE_FILE};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DeckError {
    #[error("not enough cards: requested {requested}, available {available}")]
    InsufficientCards { requested: usize, available: usize },
    #[error("no cards to reshuffle")]
    NoCardsToReshuffle,
    #[error("discard pile is empty")]
    EmptyPile,
}

/// Draw pile plus discard pile. The last element of each `Vec` is its top.
#[derive(Debug, Clone)]
pub struct Deck {
    draw: Vec<Card>,
    discard: Vec<Card>,
    seed: u64,
    rng: ChaCha8Rng,
}

impl Default for Deck {
    fn default() -> Self {
        Self::new()
    }
}

impl Deck {
    /// A freshly shuffled 52-card deck.
    ///
    /// ```
    /// use crazy_eights::deck::Deck;
    ///
    /// let deck = Deck::new();
    /// assert_eq!(deck.draw_pile().len(), 52);
    /// assert!(deck.discard_pile().is_empty());
    /// ```
    pub fn new() -> Self {
        let seed: u64 = rand::rng().random();
        Self::seeded(seed)
    }

    /// Shuffle using a seeded RNG for reproducibility. Later reshuffles draw
    /// from the same RNG stream.
    pub fn seeded(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut draw = Card::universe();
        draw.shuffle(&mut rng);
        Self {
            draw,
            discard: Vec::new(),
            seed,
            rng,
        }
    }

    /// Rebuild a deck from known piles without shuffling them.
    pub fn from_piles(draw: Vec<Card>, discard: Vec<Card>) -> Self {
        let seed: u64 = rand::rng().random();
        Self {
            draw,
            discard,
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Continue the shuffle stream of `seed` from `position` (in RNG words).
    fn resume_rng(&mut self, seed: u64, position: u128) {
        self.seed = seed;
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self.rng.set_word_pos(position);
    }

    pub fn draw_pile(&self) -> &[Card] {
        &self.draw
    }

    pub fn discard_pile(&self) -> &[Card] {
        &self.discard
    }

    /// Cards still in either pile.
    pub fn len(&self) -> usize {
        self.draw.len() + self.discard.len()
    }

    pub fn is_empty(&self) -> bool {
        self.draw.is_empty() && self.discard.is_empty()
    }

    /// Pop `n` cards off the draw pile, recycling the discard pile first when
    /// the draw pile is short.
    pub fn deal(&mut self, n: usize) -> Result<Vec<Card>, DeckError> {
        if self.draw.len() < n && self.discard.len() > 1 {
            self.reshuffle()?;
        }
        if self.draw.len() < n {
            return Err(DeckError::InsufficientCards {
                requested: n,
                available: self.draw.len(),
            });
        }
        Ok((0..n).filter_map(|_| self.draw.pop()).collect())
    }

    /// Flip the top of the draw pile to open the discard pile.
    pub fn start_discard(&mut self) -> Result<Card, DeckError> {
        let card = self.draw.pop().ok_or(DeckError::InsufficientCards {
            requested: 1,
            available: 0,
        })?;
        self.discard.push(card);
        Ok(card)
    }

    pub fn top_discard(&self) -> Result<Card, DeckError> {
        self.discard.last().copied().ok_or(DeckError::EmptyPile)
    }

    /// Lay `card` on the discard pile. Legality is the caller's concern.
    pub fn play(&mut self, card: Card) {
        self.discard.push(card);
    }

    /// Take the top card of the draw pile, reshuffling first if it is empty.
    pub fn draw(&mut self) -> Result<Card, DeckError> {
        if self.draw.is_empty() {
            self.reshuffle()?;
        }
        self.draw.pop().ok_or(DeckError::InsufficientCards {
            requested: 1,
            available: 0,
        })
    }

    /// Move every discard except the top one, shuffled, into the draw pile.
    pub(crate) fn reshuffle(&mut self) -> Result<(), DeckError> {
        if self.discard.len() <= 1 {
            return Err(DeckError::NoCardsToReshuffle);
        }
        let top = self.discard.pop().ok_or(DeckError::EmptyPile)?;
        let mut rest = std::mem::take(&mut self.discard);
        rest.shuffle(&mut self.rng);
        debug!(recycled = rest.len(), top = %top, "reshuffling discard pile");
        // recycled cards go underneath whatever is left to draw
        rest.append(&mut self.draw);
        self.draw = rest;
        self.discard.push(top);
        Ok(())
    }

    /// Write both piles bottom-first, one card per line, plus the shuffle
    /// stream position as `seed,position` so later reshuffles replay.
    pub fn save(&self, tx: &mut Commit<'_>) -> Result<(), StoreError> {
        tx.write_cards(DRAW_FILE, &self.draw)?;
        tx.write_cards(DISCARD_FILE, &self.discard)?;
        tx.write_lines(
            SHUFFLE_FILE,
            [format!("{},{}", self.seed, self.rng.get_word_pos())],
        )?;
        debug!(draw = self.draw.len(), discard = self.discard.len(), "deck staged");
        Ok(())
    }

    /// Restore both piles in exactly their saved order. Without a shuffle
    /// file the next reshuffle is freshly random.
    pub fn load(dir: &GameDir) -> Result<Self, StoreError> {
        let draw = dir.read_cards(DRAW_FILE)?;
        let discard = dir.read_cards(DISCARD_FILE)?;
        let mut deck = Self::from_piles(draw, discard);
        if let Some(line) = dir.read_lines(SHUFFLE_FILE)?.and_then(|l| l.into_iter().next()) {
            let (seed, position) = parse_shuffle(&line)
                .ok_or_else(|| StoreError::malformed(SHUFFLE_FILE, 1, "expected seed,position"))?;
            deck.resume_rng(seed, position);
        }
        debug!(draw = deck.draw.len(), discard = deck.discard.len(), "deck loaded");
        Ok(deck)
    }
}

fn parse_shuffle(line: &str) -> Option<(u64, u128)> {
    let (seed, position) = line.split_once(',')?;
    Some((seed.trim().parse().ok()?, position.trim().parse().ok()?))
}
