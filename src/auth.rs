//! Credential store: `users.txt` holds `name,base64(blake3(secret))` records in
//! insertion order, admin first.
//!
//! The turn engine only ever sees the [`Verifier`] capability.

use crate::store::{GameDir, StoreError, RESERVED_STEMS, USERS_FILE};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::{info, warn};

pub const ADMIN: &str = "admin";

/// Checks a secret against a known identity.
pub trait Verifier {
    /// Whether `identity` has an account at all.
    fn knows(&self, identity: &str) -> bool;

    fn verify(&self, identity: &str, secret: &str) -> bool;

    /// Verify `identity`, distinguishing unknown accounts from bad secrets.
    fn authenticate(&self, identity: &str, secret: &str) -> Result<(), AuthError> {
        if !self.knows(identity) {
            warn!(user = identity, "authentication for unknown user");
            return Err(AuthError::UnknownUser(identity.to_string()));
        }
        if !self.verify(identity, secret) {
            warn!(user = identity, "authentication failed");
            return Err(AuthError::IncorrectSecret(identity.to_string()));
        }
        Ok(())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AuthError {
    #[error("unknown user '{0}'")]
    UnknownUser(String),
    #[error("incorrect password for '{0}'")]
    IncorrectSecret(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UserError {
    #[error("'{0}' is a reserved name")]
    ReservedName(String),
    #[error("invalid user name '{0}': use letters, digits, '-' or '_'")]
    InvalidName(String),
    #[error("user '{0}' already exists")]
    DuplicateUser(String),
    #[error("user '{0}' does not exist")]
    UnknownUser(String),
    #[error("maximum number of users reached ({max})")]
    UserLimit { max: usize },
    #[error("the admin account cannot be removed")]
    AdminRemoval,
    #[error("admin already exists")]
    AdminExists,
}

pub fn is_admin(name: &str) -> bool {
    name.eq_ignore_ascii_case(ADMIN)
}

/// Player names double as file stems, so they are kept to a safe alphabet.
pub fn validate_player_name(name: &str) -> Result<(), UserError> {
    if is_admin(name) || RESERVED_STEMS.iter().any(|s| s.eq_ignore_ascii_case(name)) {
        return Err(UserError::ReservedName(name.to_string()));
    }
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(UserError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn digest(secret: &str) -> blake3::Hash {
    blake3::hash(secret.as_bytes())
}

/// Encoded form stored in `users.txt`.
pub fn hash_secret(secret: &str) -> String {
    STANDARD.encode(digest(secret).as_bytes())
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct UserRecord {
    name: String,
    hash: String,
}

/// All accounts of one game, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Users {
    records: Vec<UserRecord>,
}

impl Verifier for Users {
    fn knows(&self, identity: &str) -> bool {
        self.contains(identity)
    }

    fn verify(&self, identity: &str, secret: &str) -> bool {
        let Some(record) = self.records.iter().find(|r| r.name == identity) else {
            return false;
        };
        let Ok(stored) = STANDARD.decode(&record.hash) else {
            return false;
        };
        let Ok(bytes) = <[u8; 32]>::try_from(stored.as_slice()) else {
            return false;
        };
        // blake3::Hash equality is constant-time
        blake3::Hash::from_bytes(bytes) == digest(secret)
    }
}

impl Users {
    pub fn load(dir: &GameDir) -> Result<Self, StoreError> {
        let lines = dir.read_lines(USERS_FILE)?.unwrap_or_default();
        let mut records = Vec::with_capacity(lines.len());
        for (i, line) in lines.iter().enumerate() {
            let (name, hash) = line.split_once(',').ok_or_else(|| {
                StoreError::malformed(USERS_FILE, i + 1, "expected name,hash")
            })?;
            records.push(UserRecord {
                name: name.trim().to_string(),
                hash: hash.trim().to_string(),
            });
        }
        Ok(Self { records })
    }

    pub fn save(&self, dir: &GameDir) -> Result<(), StoreError> {
        dir.write_lines(
            USERS_FILE,
            self.records.iter().map(|r| format!("{},{}", r.name, r.hash)),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.iter().any(|r| r.name == name)
    }

    /// Every account name, admin included, in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.name.as_str())
    }

    /// Non-admin accounts in insertion order: the seating order of a game.
    pub fn players(&self) -> Vec<String> {
        self.names()
            .filter(|n| !is_admin(n))
            .map(str::to_string)
            .collect()
    }

    pub fn init_admin(&mut self, secret: &str) -> Result<(), UserError> {
        if !self.records.is_empty() {
            return Err(UserError::AdminExists);
        }
        self.records.push(UserRecord {
            name: ADMIN.to_string(),
            hash: hash_secret(secret),
        });
        info!("admin account created");
        Ok(())
    }

    /// Reject `name` before anyone is asked for a password.
    pub fn check_new_user(&self, name: &str, max_users: usize) -> Result<(), UserError> {
        if self.players().len() >= max_users {
            return Err(UserError::UserLimit { max: max_users });
        }
        validate_player_name(name)?;
        if self.contains(name) {
            return Err(UserError::DuplicateUser(name.to_string()));
        }
        Ok(())
    }

    pub fn add_user(&mut self, name: &str, secret: &str, max_users: usize) -> Result<(), UserError> {
        self.check_new_user(name, max_users)?;
        self.records.push(UserRecord {
            name: name.to_string(),
            hash: hash_secret(secret),
        });
        info!(user = name, "user added");
        Ok(())
    }

    pub fn remove_user(&mut self, name: &str) -> Result<(), UserError> {
        if is_admin(name) {
            return Err(UserError::AdminRemoval);
        }
        let pos = self
            .records
            .iter()
            .position(|r| r.name == name)
            .ok_or_else(|| UserError::UnknownUser(name.to_string()))?;
        self.records.remove(pos);
        info!(user = name, "user removed");
        Ok(())
    }
}
