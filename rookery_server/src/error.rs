// Reasons a client command is refused.
//
// Every `CommandError` turns into exactly one `ERROR` message sent back to
// the connection that issued the command; nobody else hears about it.

use rookery_protocol::GameId;
use rookery_rules::MoveError;
use thiserror::Error;

use crate::directory::DirectoryError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("{0} does not exist")]
    UnknownGame(GameId),
    /// The game's worker could not take the command (server shutting down
    /// or out of threads).
    #[error("{0} is not taking commands right now")]
    Unavailable(GameId),
    /// Carries the verb that was refused, e.g. "move" or "resign".
    #[error("only players can {0}")]
    OnlySeatedPlayersMayAct(&'static str),
    #[error("that piece belongs to your opponent")]
    WrongPieceOwnership,
    #[error(transparent)]
    Rules(#[from] MoveError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}
