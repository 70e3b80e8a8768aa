//! The game directory: the only state shared between invocations.
//!
//! Every file is line-oriented UTF-8. Writes go to a temporary sibling and are
//! renamed into place, and a whole command runs under an exclusive advisory
//! lock on `.lock`, so two invocations against the same directory are
//! serialised instead of interleaving their read-modify-write cycles.
//!
//! A game update touches several files at once. Those go through a
//! [`Commit`]: every file is staged first, then the list of staged names is
//! written to `.commit`, then the staged files are renamed into place. Once
//! `.commit` exists the update is durable; whoever takes the lock next finishes
//! any renames a crashed process left behind.

use crate::cards::Card;
use crate::config::Rules;
use crate::deck::Deck;
use crate::game::Game;
use crate::player::Player;
use fs4::fs_std::FileExt;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

pub const USERS_FILE: &str = "users.txt";
pub const STATE_FILE: &str = "state.txt";
pub const TURN_FILE: &str = "turn.txt";
pub const DRAW_FILE: &str = "draw.txt";
pub const DISCARD_FILE: &str = "discard.txt";
pub const RULES_FILE: &str = "rules.txt";
pub const SHUFFLE_FILE: &str = "shuffle.txt";
const LOCK_FILE: &str = ".lock";
const COMMIT_FILE: &str = ".commit";

/// File stems the store owns; a player named after one would clobber it.
pub const RESERVED_STEMS: [&str; 7] = [
    "users", "state", "turn", "draw", "discard", "rules", "shuffle",
];

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum StoreError {
    #[error("game already exists: {0}")]
    GameExists(PathBuf),
    #[error("game does not exist: {0}")]
    GameMissing(PathBuf),
    #[error("i/o failure on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed {file} line {line}: {reason}")]
    Malformed {
        file: String,
        line: usize,
        reason: String,
    },
    #[error("inconsistent game state: {0}")]
    Inconsistent(String),
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn malformed(file: &str, line: usize, reason: impl fmt::Display) -> Self {
        StoreError::Malformed {
            file: file.to_string(),
            line,
            reason: reason.to_string(),
        }
    }
}

/// Lifecycle marker kept in `state.txt`. Phases only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    NotStarted,
    InProgress,
    Finished,
}

impl Phase {
    pub const fn as_str(self) -> &'static str {
        match self {
            Phase::NotStarted => "NOT_STARTED",
            Phase::InProgress => "IN_PROGRESS",
            Phase::Finished => "FINISHED",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "NOT_STARTED" => Ok(Phase::NotStarted),
            "IN_PROGRESS" => Ok(Phase::InProgress),
            "FINISHED" => Ok(Phase::Finished),
            other => Err(format!("unknown phase '{other}'")),
        }
    }
}

/// Whose turn it is and whether they already drew this turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Turn {
    pub index: usize,
    pub has_drawn: bool,
}

impl Turn {
    /// Move to the next seat; the draw flag never survives an advance.
    pub fn advance(&mut self, players: usize) {
        self.index = (self.index + 1) % players;
        self.has_drawn = false;
    }
}

impl fmt::Display for Turn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.index, self.has_drawn)
    }
}

impl FromStr for Turn {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().splitn(2, ',');
        let index = parts
            .next()
            .unwrap_or_default()
            .trim()
            .parse::<usize>()
            .map_err(|e| format!("bad turn index: {e}"))?;
        // older files carry only the index
        let has_drawn = match parts.next().map(str::trim) {
            None => false,
            Some("true") => true,
            Some("false") => false,
            Some(other) => return Err(format!("bad has-drawn flag '{other}'")),
        };
        Ok(Turn { index, has_drawn })
    }
}

/// Exclusive lock over one game directory, released on drop.
#[derive(Debug)]
pub struct DirLock {
    file: File,
    path: PathBuf,
}

impl Drop for DirLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        debug!(lock_path = %self.path.display(), "game lock released");
    }
}

/// Handle on a game directory.
#[derive(Debug, Clone)]
pub struct GameDir {
    root: PathBuf,
}

impl GameDir {
    /// Create a brand new game directory. Fails if anything already exists at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = path.as_ref().to_path_buf();
        if root.exists() {
            return Err(StoreError::GameExists(root));
        }
        fs::create_dir_all(&root).map_err(|e| StoreError::io(&root, e))?;
        debug!(game = %root.display(), "game directory created");
        Ok(Self { root })
    }

    /// Open an existing game directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = path.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(StoreError::GameMissing(root));
        }
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// File holding a player's hand.
    pub fn hand_file(name: &str) -> String {
        format!("{name}.txt")
    }

    /// Block until this process holds the directory's exclusive lock, then
    /// finish any update a crashed holder had already committed.
    pub fn lock(&self) -> Result<DirLock, StoreError> {
        let path = self.file(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| StoreError::io(&path, e))?;
        file.lock_exclusive().map_err(|e| StoreError::io(&path, e))?;
        debug!(lock_path = %path.display(), "game lock acquired");
        let guard = DirLock { file, path };
        self.roll_forward()?;
        Ok(guard)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.file(name).is_file()
    }

    /// Non-empty, trimmed lines of `name`, or `None` when the file is absent.
    pub fn read_lines(&self, name: &str) -> Result<Option<Vec<String>>, StoreError> {
        let path = self.file(name);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(
                text.lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_string)
                    .collect(),
            )),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    fn staged_path(&self, name: &str) -> PathBuf {
        self.file(&format!(".{name}.tmp"))
    }

    /// Write `lines` to the temporary sibling of `name` without touching `name`.
    fn stage<I, T>(&self, name: &str, lines: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = T>,
        T: fmt::Display,
    {
        let mut body = String::new();
        for line in lines {
            body.push_str(&line.to_string());
            body.push('\n');
        }
        let tmp = self.staged_path(name);
        let write = || -> io::Result<()> {
            let mut f = File::create(&tmp)?;
            f.write_all(body.as_bytes())?;
            f.sync_all()
        };
        write().map_err(|e| StoreError::io(&tmp, e))
    }

    fn publish(&self, name: &str) -> Result<(), StoreError> {
        let path = self.file(name);
        fs::rename(self.staged_path(name), &path).map_err(|e| StoreError::io(&path, e))
    }

    /// Replace `name` with one line per item, atomically.
    pub fn write_lines<I, T>(&self, name: &str, lines: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = T>,
        T: fmt::Display,
    {
        self.stage(name, lines)?;
        self.publish(name)
    }

    /// Start a multi-file update. Nothing is visible until [`Commit::finish`].
    pub fn begin(&self) -> Commit<'_> {
        Commit {
            dir: self,
            staged: Vec::new(),
        }
    }

    /// Apply the renames listed in `.commit`, if any, and drop the manifest.
    fn roll_forward(&self) -> Result<(), StoreError> {
        let Some(names) = self.read_lines(COMMIT_FILE)? else {
            return Ok(());
        };
        for name in &names {
            match self.publish(name) {
                Ok(()) => {}
                // renamed before the previous holder stopped
                Err(StoreError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        self.remove(COMMIT_FILE)?;
        debug!(game = %self.root.display(), files = names.len(), "commit applied");
        Ok(())
    }

    pub fn remove(&self, name: &str) -> Result<(), StoreError> {
        let path = self.file(name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    /// Cards listed one per line; a missing file is an empty list.
    pub fn read_cards(&self, name: &str) -> Result<Vec<Card>, StoreError> {
        let lines = self.read_lines(name)?.unwrap_or_default();
        lines
            .iter()
            .enumerate()
            .map(|(i, l)| Card::from_str(l).map_err(|e| StoreError::malformed(name, i + 1, e)))
            .collect()
    }

    pub fn write_cards(&self, name: &str, cards: &[Card]) -> Result<(), StoreError> {
        self.write_lines(name, cards)
    }

    /// A missing state file means the game was never started.
    pub fn read_phase(&self) -> Result<Phase, StoreError> {
        match self.read_lines(STATE_FILE)? {
            Some(lines) if !lines.is_empty() => {
                Phase::from_str(&lines[0]).map_err(|e| StoreError::malformed(STATE_FILE, 1, e))
            }
            _ => Ok(Phase::NotStarted),
        }
    }

    pub fn write_phase(&self, phase: Phase) -> Result<(), StoreError> {
        self.write_lines(STATE_FILE, [phase])
    }

    pub fn read_turn(&self) -> Result<Turn, StoreError> {
        match self.read_lines(TURN_FILE)? {
            Some(lines) if !lines.is_empty() => {
                Turn::from_str(&lines[0]).map_err(|e| StoreError::malformed(TURN_FILE, 1, e))
            }
            _ => Ok(Turn::default()),
        }
    }

    pub fn write_turn(&self, turn: Turn) -> Result<(), StoreError> {
        self.write_lines(TURN_FILE, [turn])
    }

    /// Rebuild a started game: `roster` is the seating order, taken from the
    /// user records.
    pub fn load_game(&self, roster: &[String], rules: Rules) -> Result<Game, StoreError> {
        let phase = self.read_phase()?;
        let deck = Deck::load(self)?;
        let players = roster
            .iter()
            .map(|name| Player::load(self, name))
            .collect::<Result<Vec<_>, _>>()?;
        let turn = self.read_turn()?;
        debug!(game = %self.root.display(), %phase, players = players.len(), "game loaded");
        Game::from_parts(phase, players, deck, turn, rules)
    }

    /// Write every store a transition may have touched as one commit. The
    /// phase is renamed last, so a start that never got past staging still
    /// reads as not started.
    pub fn save_game(&self, game: &Game) -> Result<(), StoreError> {
        let mut tx = self.begin();
        game.deck().save(&mut tx)?;
        for p in game.players() {
            p.save(&mut tx)?;
        }
        tx.write_lines(TURN_FILE, [game.turn()])?;
        tx.write_lines(STATE_FILE, [game.phase()])?;
        tx.finish()?;
        debug!(game = %self.root.display(), phase = %game.phase(), "game saved");
        Ok(())
    }
}

/// Files staged for one all-or-nothing update of a [`GameDir`].
#[derive(Debug)]
pub struct Commit<'a> {
    dir: &'a GameDir,
    staged: Vec<String>,
}

impl Commit<'_> {
    pub fn write_lines<I, T>(&mut self, name: &str, lines: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = T>,
        T: fmt::Display,
    {
        self.dir.stage(name, lines)?;
        self.staged.push(name.to_string());
        Ok(())
    }

    pub fn write_cards(&mut self, name: &str, cards: &[Card]) -> Result<(), StoreError> {
        self.write_lines(name, cards)
    }

    /// Record the staged names. From here on the update survives a crash.
    fn seal(&self) -> Result<(), StoreError> {
        self.dir.write_lines(COMMIT_FILE, &self.staged)
    }

    pub fn finish(self) -> Result<(), StoreError> {
        self.seal()?;
        self.dir.roll_forward()
    }
}
