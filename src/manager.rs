//! One command against one game directory.
//!
//! Each entry point authenticates, takes the directory lock, reloads every
//! store, applies a single transition and writes the stores back before the
//! lock is released. Secrets are collected before locking so an interactive
//! prompt never holds up another player's command.

use crate::auth::{AuthError, Users, Verifier, ADMIN};
use crate::cards::{format_cards, Card};
use crate::config::Rules;
use crate::deck::Deck;
use crate::error::Error;
use crate::game::{ActionError, Game, PlayOutcome};
use crate::secret::{Purpose, SecretSource};
use crate::store::{GameDir, Phase, StoreError};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// Human-readable result of a successful command.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Report {
    Initialized { game: PathBuf, rules: Rules },
    UserAdded { name: String },
    UserRemoved { name: String },
    Started { players: Vec<String>, top: Card },
    Order { players: Vec<String>, claimed: bool },
    Played { card: Card, top: Card, next: String },
    Won { winner: String, scores: Vec<(String, u32)> },
    Drew { card: Card, hand: Vec<Card>, top: Card },
    Passed { top: Card, next: String },
    Cards { target: String, hand: Vec<Card>, top: Card },
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Report::Initialized { game, rules } => write!(
                f,
                "Game created at {} (pass policy: {}, order policy: {})",
                game.display(),
                rules.pass_policy,
                rules.order_policy
            ),
            Report::UserAdded { name } => write!(f, "User {name} added"),
            Report::UserRemoved { name } => write!(f, "User {name} removed"),
            Report::Started { players, top } => {
                writeln!(f, "Game started with {}", players.join(", "))?;
                write!(f, "Top discard: {top}")
            }
            Report::Order { players, claimed } => {
                if *claimed {
                    writeln!(f, "It is now your turn")?;
                }
                writeln!(f, "Turn order (next first):")?;
                for (i, name) in players.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "  {name}")?;
                }
                Ok(())
            }
            Report::Played { card, top, next } => {
                writeln!(f, "Played {card}; top discard is now {top}")?;
                write!(f, "Next up: {next}")
            }
            Report::Won { winner, scores } => {
                write!(f, "{winner} won!")?;
                for (name, points) in scores.iter().filter(|(n, _)| n != winner) {
                    write!(f, "\n  {name}: {points} points left in hand")?;
                }
                Ok(())
            }
            Report::Drew { card, hand, top } => {
                writeln!(f, "Drawn card: {card}")?;
                writeln!(f, "Hand: {}", format_cards(hand))?;
                write!(f, "Top of discard: {top}")
            }
            Report::Passed { top, next } => {
                writeln!(f, "Top of discard after passing: {top}")?;
                write!(f, "Next up: {next}")
            }
            Report::Cards { target, hand, top } => {
                writeln!(f, "Hand of {target}: {}", format_cards(hand))?;
                write!(f, "Top discard: {top}")
            }
        }
    }
}

/// Ask `secrets` for the password of `identity` and check it with `verifier`.
/// Unknown identities are refused before anyone is prompted.
fn confirm_identity<V, S>(verifier: &V, secrets: &mut S, identity: &str) -> Result<(), Error>
where
    V: Verifier + ?Sized,
    S: SecretSource,
{
    if !verifier.knows(identity) {
        return Err(AuthError::UnknownUser(identity.to_string()).into());
    }
    let secret = secrets
        .read_secret(identity, Purpose::Verify)
        .map_err(Error::Secret)?;
    verifier.authenticate(identity, &secret)?;
    debug!(user = identity, "authenticated");
    Ok(())
}

/// Entry points for every command a game directory accepts.
pub struct GameManager<S> {
    dir: GameDir,
    secrets: S,
    seed: Option<u64>,
}

impl<S: SecretSource> GameManager<S> {
    /// Create a game directory with its admin account and rules.
    pub fn init(path: impl AsRef<Path>, rules: Rules, mut secrets: S) -> Result<Self, Error> {
        let path = path.as_ref();
        if path.exists() {
            return Err(StoreError::GameExists(path.to_path_buf()).into());
        }
        let secret = secrets
            .read_secret(ADMIN, Purpose::Create)
            .map_err(Error::Secret)?;
        let dir = GameDir::create(path)?;
        {
            let _lock = dir.lock()?;
            let mut users = Users::default();
            users.init_admin(&secret)?;
            users.save(&dir)?;
            rules.save(&dir)?;
            dir.write_phase(Phase::NotStarted)?;
        }
        info!(game = %path.display(), "game initialised");
        Ok(Self {
            dir,
            secrets,
            seed: None,
        })
    }

    pub fn open(path: impl AsRef<Path>, secrets: S) -> Result<Self, Error> {
        Ok(Self {
            dir: GameDir::open(path)?,
            secrets,
            seed: None,
        })
    }

    /// Deal from a deck shuffled with `seed` when the game starts.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn game_dir(&self) -> &GameDir {
        &self.dir
    }

    /// The report for a freshly initialised game.
    pub fn initialized(&self) -> Result<Report, Error> {
        Ok(Report::Initialized {
            game: self.dir.path().to_path_buf(),
            rules: Rules::load(&self.dir)?,
        })
    }

    fn authenticate(&mut self, identity: &str) -> Result<(), Error> {
        let users = Users::load(&self.dir)?;
        confirm_identity(&users, &mut self.secrets, identity)
    }

    fn ensure_can_manage_users(&self) -> Result<(), Error> {
        if self.dir.read_phase()? == Phase::InProgress {
            return Err(Error::UserManagementLocked);
        }
        Ok(())
    }

    /// Load the running (or finished) game under the caller's lock.
    fn load(&self) -> Result<Game, Error> {
        if self.dir.read_phase()? == Phase::NotStarted {
            return Err(ActionError::NotStarted.into());
        }
        let rules = Rules::load(&self.dir)?;
        let users = Users::load(&self.dir)?;
        Ok(self.dir.load_game(&users.players(), rules)?)
    }

    pub fn add_user(&mut self, name: &str) -> Result<Report, Error> {
        self.authenticate(ADMIN)?;
        self.ensure_can_manage_users()?;
        let rules = Rules::load(&self.dir)?;
        Users::load(&self.dir)?.check_new_user(name, rules.max_users)?;
        let secret = self
            .secrets
            .read_secret(name, Purpose::Create)
            .map_err(Error::Secret)?;

        let _lock = self.dir.lock()?;
        self.ensure_can_manage_users()?;
        let mut users = Users::load(&self.dir)?;
        users.add_user(name, &secret, rules.max_users)?;
        users.save(&self.dir)?;
        Ok(Report::UserAdded {
            name: name.to_string(),
        })
    }

    pub fn remove_user(&mut self, name: &str) -> Result<Report, Error> {
        self.authenticate(ADMIN)?;
        let _lock = self.dir.lock()?;
        self.ensure_can_manage_users()?;
        let mut users = Users::load(&self.dir)?;
        users.remove_user(name)?;
        users.save(&self.dir)?;
        self.dir.remove(&GameDir::hand_file(name))?;
        Ok(Report::UserRemoved {
            name: name.to_string(),
        })
    }

    pub fn start(&mut self) -> Result<Report, Error> {
        self.authenticate(ADMIN)?;
        let _lock = self.dir.lock()?;
        if self.dir.read_phase()? != Phase::NotStarted {
            return Err(ActionError::AlreadyStarted.into());
        }
        let rules = Rules::load(&self.dir)?;
        let roster = Users::load(&self.dir)?.players();
        let deck = match self.seed {
            Some(seed) => Deck::seeded(seed),
            None => Deck::new(),
        };
        let game = Game::start(&roster, deck, rules)?;
        self.dir.save_game(&game)?;
        Ok(Report::Started {
            players: roster,
            top: game.top_discard()?,
        })
    }

    pub fn order(&mut self, user: &str) -> Result<Report, Error> {
        self.authenticate(user)?;
        let _lock = self.dir.lock()?;
        let mut game = self.load()?;
        let claimed = game.view_order(user);
        if claimed {
            self.dir.write_turn(game.turn())?;
        }
        Ok(Report::Order {
            players: game.order().into_iter().map(str::to_string).collect(),
            claimed,
        })
    }

    pub fn play(&mut self, card_text: &str, user: &str) -> Result<Report, Error> {
        self.authenticate(user)?;
        let _lock = self.dir.lock()?;
        let mut game = self.load()?;
        game.ensure_turn(user)?;
        let card = Card::from_str(card_text)?;
        let outcome = game.play(user, card)?;
        self.dir.save_game(&game)?;

        let report = match outcome {
            PlayOutcome::Won { winner } => Report::Won {
                winner: game.players()[winner].name().to_string(),
                scores: game
                    .scores()
                    .into_iter()
                    .map(|(n, s)| (n.to_string(), s))
                    .collect(),
            },
            PlayOutcome::Continue { next } => Report::Played {
                card,
                top: game.top_discard()?,
                next: game.players()[next].name().to_string(),
            },
        };
        Ok(report)
    }

    pub fn draw(&mut self, user: &str) -> Result<Report, Error> {
        self.authenticate(user)?;
        let _lock = self.dir.lock()?;
        let mut game = self.load()?;
        let card = game.draw(user)?;
        self.dir.save_game(&game)?;
        Ok(Report::Drew {
            card,
            hand: game.view_hand(user, user)?.hand().to_vec(),
            top: game.top_discard()?,
        })
    }

    pub fn pass(&mut self, user: &str) -> Result<Report, Error> {
        self.authenticate(user)?;
        let _lock = self.dir.lock()?;
        let mut game = self.load()?;
        let next = game.pass(user)?;
        self.dir.save_game(&game)?;
        Ok(Report::Passed {
            top: game.top_discard()?,
            next: game.players()[next].name().to_string(),
        })
    }

    /// Show `target`'s hand to `user`, who must be admin or `target` themself.
    pub fn cards(&mut self, target: &str, user: &str) -> Result<Report, Error> {
        self.authenticate(user)?;
        let _lock = self.dir.lock()?;
        let game = self.load()?;
        let player = game.view_hand(target, user)?;
        Ok(Report::Cards {
            target: target.to_string(),
            hand: player.hand().to_vec(),
            top: game.top_discard()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::{Rank, Suit};
    use crate::secret::StaticSecrets;

    /// Knows one account, "ann", whose password is "pw".
    struct OneAccount;

    impl Verifier for OneAccount {
        fn knows(&self, identity: &str) -> bool {
            identity == "ann"
        }

        fn verify(&self, identity: &str, secret: &str) -> bool {
            identity == "ann" && secret == "pw"
        }
    }

    #[test]
    fn identity_is_confirmed_through_any_verifier() {
        // an empty source would fail with Error::Secret if it were asked
        let mut nobody = StaticSecrets::new();
        assert!(matches!(
            confirm_identity(&OneAccount, &mut nobody, "zed"),
            Err(Error::Auth(AuthError::UnknownUser(_)))
        ));
        assert!(matches!(
            confirm_identity(&OneAccount, &mut nobody, "ann"),
            Err(Error::Secret(_))
        ));

        let mut wrong = StaticSecrets::new().with("ann", "nope");
        assert!(matches!(
            confirm_identity(&OneAccount, &mut wrong, "ann"),
            Err(Error::Auth(AuthError::IncorrectSecret(_)))
        ));

        let mut right = StaticSecrets::new().with("ann", "pw");
        assert!(confirm_identity(&OneAccount, &mut right, "ann").is_ok());
    }

    #[test]
    fn reports_read_like_the_console_output() {
        let top = Card::new(Rank::Eight, Suit::Hearts);
        let drew = Report::Drew {
            card: Card::new(Rank::Ten, Suit::Spades),
            hand: vec![Card::new(Rank::Ten, Suit::Spades), Card::new(Rank::Ace, Suit::Clubs)],
            top,
        };
        assert_eq!(
            drew.to_string(),
            "Drawn card: 10S\nHand: [10S, AC]\nTop of discard: 8H"
        );

        let order = Report::Order {
            players: vec!["b".into(), "a".into()],
            claimed: false,
        };
        assert_eq!(order.to_string(), "Turn order (next first):\n  b\n  a");

        let won = Report::Won {
            winner: "a".into(),
            scores: vec![("a".into(), 0), ("b".into(), 17)],
        };
        assert_eq!(won.to_string(), "a won!\n  b: 17 points left in hand");
    }
}
