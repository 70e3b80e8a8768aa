//! crazy-eights: a Crazy Eights engine whose state lives in a game directory
//!
//! Goals:
//! - Every command is its own short-lived process; nothing is kept in memory
//!   between commands
//! - The game directory is the single source of truth, read in full before and
//!   written back after every action, under an exclusive lock
//! - Turn rules are pure transitions over a [`game::Game`] value, testable
//!   without touching the filesystem
//! - No panics for invalid input; use `Result` for recoverable errors
//!
//! ## Quick start: a two-player game
//! ```
//! use crazy_eights::config::Rules;
//! use crazy_eights::manager::GameManager;
//! use crazy_eights::secret::StaticSecrets;
//!
//! let tmp = tempfile::tempdir().unwrap();
//! let path = tmp.path().join("friday");
//! let secrets = StaticSecrets::new()
//!     .with("admin", "root")
//!     .with("ann", "a")
//!     .with("ben", "b");
//!
//! let mut gm = GameManager::init(&path, Rules::default(), secrets)
//!     .unwrap()
//!     .with_seed(7);
//! gm.add_user("ann").unwrap();
//! gm.add_user("ben").unwrap();
//! gm.start().unwrap();
//!
//! gm.draw("ann").unwrap();
//! gm.pass("ann").unwrap();
//! let game = gm.game_dir().load_game(&["ann".into(), "ben".into()], Rules::default()).unwrap();
//! assert_eq!(game.current_player().map(|p| p.name()), Some("ben"));
//! ```
//!
//! ## CLI
//! ```sh
//! crazy-eights --game friday init
//! crazy-eights --game friday add-user ann
//! crazy-eights --game friday start
//! crazy-eights --game friday play 8H --user ann
//! ```

pub mod auth;
pub mod cards;
pub mod config;
pub mod deck;
pub mod error;
pub mod game;
pub mod manager;
pub mod player;
pub mod secret;
pub mod store;

pub use error::Error;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
