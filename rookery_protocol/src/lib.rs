// rookery_protocol — wire protocol between Rookery clients and the server.
//
// This crate defines the message vocabulary and framing shared by the server
// (`rookery_server`) and any client. It depends on `rookery_rules` only for
// the `Move` and `GameState` types that appear in messages.
//
// Module overview:
// - `types.rs`:    `GameId`.
// - `message.rs`:  `UserGameCommand` / `CommandAction` (client → server),
//                  `ServerMessage` (server → client), and `GameSnapshot`.
// - `framing.rs`:  Length-delimited framing over any `Read`/`Write` stream:
//                  4-byte big-endian length prefix, then JSON payload.
//
// Design decisions:
// - **JSON payloads.** Human-readable, and the message shapes are small.
// - **Tagged enums.** Commands carry `commandType`, server messages carry
//   `serverMessageType`, so either side can dispatch on the tag alone.
// - **Blocking std I/O.** Framing works on `std::io::Read`/`Write`, matching
//   the thread-per-connection server.

pub mod framing;
pub mod message;
pub mod types;

pub use framing::{FrameError, MAX_FRAME_SIZE, read_frame, read_json, write_frame, write_json};
pub use message::{CommandAction, GameSnapshot, ServerMessage, UserGameCommand};
pub use types::GameId;

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use rookery_rules::{Color, GameState, Move};
    use serde_json::json;

    use super::*;

    fn mv(s: &str) -> Move {
        s.parse().unwrap()
    }

    #[test]
    fn make_move_wire_shape() {
        let cmd = UserGameCommand::make_move("tok-1", GameId(7), mv("e7e8q"));
        let value = serde_json::to_value(&cmd).unwrap();
        assert_eq!(
            value,
            json!({
                "commandType": "MAKE_MOVE",
                "authToken": "tok-1",
                "gameID": 7,
                "move": {
                    "start": {"row": 7, "col": 5},
                    "end": {"row": 8, "col": 5},
                    "promotion": "QUEEN"
                }
            })
        );
    }

    #[test]
    fn decodes_hand_written_commands() {
        let connect: UserGameCommand =
            serde_json::from_str(r#"{"commandType":"CONNECT","authToken":"abc","gameID":3}"#)
                .unwrap();
        assert_eq!(connect, UserGameCommand::connect("abc", GameId(3)));

        let make_move: UserGameCommand = serde_json::from_str(
            r#"{"gameID":3,"authToken":"abc","commandType":"MAKE_MOVE",
                "move":{"start":{"row":2,"col":5},"end":{"row":4,"col":5}}}"#,
        )
        .unwrap();
        assert_eq!(make_move.action, CommandAction::MakeMove { mv: mv("e2e4") });
        assert_eq!(make_move.action.name(), "MAKE_MOVE");
    }

    #[test]
    fn rejects_make_move_without_move() {
        let result = serde_json::from_str::<UserGameCommand>(
            r#"{"commandType":"MAKE_MOVE","authToken":"abc","gameID":3}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn rejects_unknown_command_and_off_board_move() {
        assert!(
            serde_json::from_str::<UserGameCommand>(
                r#"{"commandType":"DANCE","authToken":"abc","gameID":3}"#
            )
            .is_err()
        );
        assert!(
            serde_json::from_str::<UserGameCommand>(
                r#"{"commandType":"MAKE_MOVE","authToken":"abc","gameID":3,
                    "move":{"start":{"row":9,"col":5},"end":{"row":4,"col":5}}}"#
            )
            .is_err()
        );
    }

    #[test]
    fn server_messages_are_tagged() {
        let note = serde_json::to_value(ServerMessage::notification("bob joined")).unwrap();
        assert_eq!(
            note,
            json!({"serverMessageType": "NOTIFICATION", "message": "bob joined"})
        );

        let err = serde_json::to_value(ServerMessage::error("it is DARK's turn")).unwrap();
        assert_eq!(
            err,
            json!({"serverMessageType": "ERROR", "errorMessage": "Error: it is DARK's turn"})
        );
    }

    #[test]
    fn load_game_snapshot_survives_the_wire() {
        let mut game = GameState::new();
        game.attempt_move(&mv("e2e4")).unwrap();
        game.attempt_move(&mv("c7c5")).unwrap();
        let msg = ServerMessage::LoadGame {
            game: GameSnapshot {
                game_id: GameId(12),
                white_username: Some("alice".into()),
                black_username: None,
                game_name: "sicilian".into(),
                game,
            },
        };

        let mut wire = Vec::new();
        write_json(&mut wire, &msg).unwrap();
        let recovered: ServerMessage = read_json(&mut Cursor::new(&wire)).unwrap();
        assert_eq!(recovered, msg);

        let ServerMessage::LoadGame { game: snapshot } = recovered else {
            panic!("expected LoadGame");
        };
        assert_eq!(snapshot.game.turn(), Color::Light);
        assert_eq!(snapshot.color_of("alice"), Some(Color::Light));
        assert_eq!(snapshot.seat(Color::Dark), None);
    }
}
