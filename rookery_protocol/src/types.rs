// Identifier types for the Rookery protocol.
//
// `GameId` is the directory-assigned game number carried by every command.
// It serializes as a bare integer so the wire field reads `"gameID": 7`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Directory-assigned game number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(pub u32);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "game {}", self.0)
    }
}
