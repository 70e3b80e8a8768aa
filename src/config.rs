//! Per-game rules, fixed at `init` and stored in `rules.txt` as `key=value` lines.

use crate::store::{GameDir, StoreError, RULES_FILE};
use std::fmt;
use std::str::FromStr;

/// When a player who has drawn may end their turn without playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PassPolicy {
    /// Drawing once is enough to earn a pass.
    #[default]
    AfterDraw,
    /// The pass is refused while the hand still holds a card that matches
    /// the top discard.
    NoPlayableCard,
}

/// What viewing the turn order does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderPolicy {
    #[default]
    ReadOnly,
    /// The player who asks for the order becomes the current turn holder.
    ClaimTurn,
}

impl PassPolicy {
    pub const fn as_str(self) -> &'static str {
        match self {
            PassPolicy::AfterDraw => "after-draw",
            PassPolicy::NoPlayableCard => "no-playable-card",
        }
    }
}

impl OrderPolicy {
    pub const fn as_str(self) -> &'static str {
        match self {
            OrderPolicy::ReadOnly => "read-only",
            OrderPolicy::ClaimTurn => "claim-turn",
        }
    }
}

impl fmt::Display for PassPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for OrderPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PassPolicy {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "after-draw" => Ok(PassPolicy::AfterDraw),
            "no-playable-card" => Ok(PassPolicy::NoPlayableCard),
            other => Err(format!("unknown pass policy '{other}'")),
        }
    }
}

impl FromStr for OrderPolicy {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "read-only" => Ok(OrderPolicy::ReadOnly),
            "claim-turn" => Ok(OrderPolicy::ClaimTurn),
            other => Err(format!("unknown order policy '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct Rules {
    pub pass_policy: PassPolicy,
    pub order_policy: OrderPolicy,
    /// Cards dealt to each player at start.
    pub hand_size: usize,
    pub min_players: usize,
    /// Non-admin accounts a game may hold.
    pub max_users: usize,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            pass_policy: PassPolicy::default(),
            order_policy: OrderPolicy::default(),
            hand_size: 5,
            min_players: 2,
            max_users: 10,
        }
    }
}

impl Rules {
    pub fn with_pass_policy(mut self, policy: PassPolicy) -> Self {
        self.pass_policy = policy;
        self
    }

    pub fn with_order_policy(mut self, policy: OrderPolicy) -> Self {
        self.order_policy = policy;
        self
    }

    pub fn with_hand_size(mut self, hand_size: usize) -> Self {
        self.hand_size = hand_size;
        self
    }

    fn to_lines(self) -> Vec<String> {
        vec![
            format!("pass_policy={}", self.pass_policy),
            format!("order_policy={}", self.order_policy),
            format!("hand_size={}", self.hand_size),
            format!("min_players={}", self.min_players),
            format!("max_users={}", self.max_users),
        ]
    }

    fn from_lines(lines: &[String]) -> Result<Self, StoreError> {
        let mut rules = Rules::default();
        for (i, line) in lines.iter().enumerate() {
            let bad = |reason: String| StoreError::malformed(RULES_FILE, i + 1, reason);
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| bad(format!("expected key=value, got '{line}'")))?;
            let count = || {
                value
                    .trim()
                    .parse::<usize>()
                    .map_err(|e| bad(format!("{key}: {e}")))
            };
            match key.trim() {
                "pass_policy" => rules.pass_policy = value.parse::<PassPolicy>().map_err(&bad)?,
                "order_policy" => {
                    rules.order_policy = value.parse::<OrderPolicy>().map_err(&bad)?
                }
                "hand_size" => rules.hand_size = count()?,
                "min_players" => rules.min_players = count()?,
                "max_users" => rules.max_users = count()?,
                other => return Err(bad(format!("unknown key '{other}'"))),
            }
        }
        if rules.min_players < 2 {
            return Err(StoreError::malformed(RULES_FILE, 0, "min_players must be at least 2"));
        }
        Ok(rules)
    }

    /// Rules for `dir`; a game without a rules file plays by the defaults.
    pub fn load(dir: &GameDir) -> Result<Self, StoreError> {
        match dir.read_lines(RULES_FILE)? {
            Some(lines) => Self::from_lines(&lines),
            None => Ok(Rules::default()),
        }
    }

    pub fn save(&self, dir: &GameDir) -> Result<(), StoreError> {
        dir.write_lines(RULES_FILE, self.to_lines())
    }
}
