// Protocol messages between game clients and the server.
//
// Two directions:
// - `UserGameCommand`: client → server. Every command names the caller's
//   auth token and the target game; `CommandAction` carries the kind and its
//   payload, tagged on the wire by `commandType`.
// - `ServerMessage`: server → client, tagged by `serverMessageType` so a
//   receiver can dispatch without any other context.
//
// `GameSnapshot` is the full state a client needs to redraw a game: seat
// occupancy plus the `GameState` from the rules crate. It is what `LOAD_GAME`
// carries.
//
// JSON field names follow the established client vocabulary (`authToken`,
// `gameID`, `whiteUsername`, ...), hence the explicit renames.

use std::fmt;

use rookery_rules::{Color, GameState, Move};
use serde::{Deserialize, Serialize};

use crate::types::GameId;

/// A command sent by a client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserGameCommand {
    #[serde(rename = "authToken")]
    pub auth_token: String,
    #[serde(rename = "gameID")]
    pub game_id: GameId,
    #[serde(flatten)]
    pub action: CommandAction,
}

/// The kind of a command and its kind-specific payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "commandType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandAction {
    /// Attach to the game's audience and receive a snapshot.
    Connect,
    /// Play a move as a seated player.
    MakeMove {
        #[serde(rename = "move")]
        mv: Move,
    },
    /// Detach from the game, vacating a seat if the caller held one.
    Leave,
    /// Concede the game as a seated player.
    Resign,
}

impl CommandAction {
    /// Wire name of the command kind, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            CommandAction::Connect => "CONNECT",
            CommandAction::MakeMove { .. } => "MAKE_MOVE",
            CommandAction::Leave => "LEAVE",
            CommandAction::Resign => "RESIGN",
        }
    }
}

impl UserGameCommand {
    pub fn connect(auth_token: impl Into<String>, game_id: GameId) -> Self {
        Self::new(auth_token, game_id, CommandAction::Connect)
    }

    pub fn make_move(auth_token: impl Into<String>, game_id: GameId, mv: Move) -> Self {
        Self::new(auth_token, game_id, CommandAction::MakeMove { mv })
    }

    pub fn leave(auth_token: impl Into<String>, game_id: GameId) -> Self {
        Self::new(auth_token, game_id, CommandAction::Leave)
    }

    pub fn resign(auth_token: impl Into<String>, game_id: GameId) -> Self {
        Self::new(auth_token, game_id, CommandAction::Resign)
    }

    fn new(auth_token: impl Into<String>, game_id: GameId, action: CommandAction) -> Self {
        Self {
            auth_token: auth_token.into(),
            game_id,
            action,
        }
    }
}

/// A message sent by the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "serverMessageType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    /// Full game state; the client replaces whatever it was showing.
    LoadGame { game: GameSnapshot },
    /// Human-readable event text.
    Notification { message: String },
    /// A command from this client was refused.
    Error {
        #[serde(rename = "errorMessage")]
        error_message: String,
    },
}

impl ServerMessage {
    pub fn notification(message: impl Into<String>) -> Self {
        ServerMessage::Notification {
            message: message.into(),
        }
    }

    /// An `ERROR` message; the text is prefixed with `Error: `.
    pub fn error(reason: impl fmt::Display) -> Self {
        ServerMessage::Error {
            error_message: format!("Error: {reason}"),
        }
    }
}

/// Everything a client needs to render one game.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    #[serde(rename = "gameID")]
    pub game_id: GameId,
    #[serde(rename = "whiteUsername", default)]
    pub white_username: Option<String>,
    #[serde(rename = "blackUsername", default)]
    pub black_username: Option<String>,
    #[serde(rename = "gameName")]
    pub game_name: String,
    pub game: GameState,
}

impl GameSnapshot {
    /// Username seated on `color`, if the seat is taken.
    pub fn seat(&self, color: Color) -> Option<&str> {
        match color {
            Color::Light => self.white_username.as_deref(),
            Color::Dark => self.black_username.as_deref(),
        }
    }

    pub fn set_seat(&mut self, color: Color, username: Option<String>) {
        match color {
            Color::Light => self.white_username = username,
            Color::Dark => self.black_username = username,
        }
    }

    /// Color seated by `username`, white seat first.
    pub fn color_of(&self, username: &str) -> Option<Color> {
        Color::ALL
            .into_iter()
            .find(|&color| self.seat(color) == Some(username))
    }
}
