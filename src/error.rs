use crate::auth::{AuthError, UserError};
use crate::cards::CardParseError;
use crate::deck::DeckError;
use crate::game::ActionError;
use crate::store::StoreError;
use std::io;

/// Everything a single command can fail with. Every variant ends the invocation.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    User(#[from] UserError),
    #[error("you cannot modify users while the game is in progress")]
    UserManagementLocked,
    #[error(transparent)]
    Action(#[from] ActionError),
    #[error(transparent)]
    Deck(#[from] DeckError),
    #[error(transparent)]
    Card(#[from] CardParseError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("could not read password: {0}")]
    Secret(#[source] io::Error),
}
