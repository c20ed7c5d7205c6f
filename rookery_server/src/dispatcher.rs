// Command dispatcher: turns one client command into state changes and
// outbound messages.
//
// The dispatcher is handed its collaborators at construction (identity,
// directory, registry, outbox) and holds no other state, so tests can build
// as many independent instances as they like.
//
// Each command is read-validate-mutate-broadcast against one game:
// 1. Resolve the auth token to a username (`Unauthorized`).
// 2. Load the game record (`UnknownGame`).
// 3. Validate and mutate a local copy, then store it back.
// 4. Deliver messages to the game's audience.
//
// A refused command sends exactly one `ERROR` to the issuing connection and
// changes nothing. The dispatcher itself does not serialize commands; callers
// must not run two commands for the same game at once. `GameWorkers`
// (`worker.rs`) provides that guarantee for the TCP server.
//
// Message texts:
// - CONNECT:   "<user> joined the game as <COLOR>" / "<user> is observing the game"
// - MAKE_MOVE: "<user> made move: <move>", then "<side> is in check",
//              "<side> is in checkmate" or "<side> is in stalemate"
// - LEAVE:     "<user> has left the game"
// - RESIGN:    "<user> resigned. Game over"

use std::sync::Arc;

use log::{debug, warn};
use rookery_protocol::{CommandAction, GameId, GameSnapshot, ServerMessage, UserGameCommand};
use rookery_rules::{Color, Move, MoveError, PositionStatus};

use crate::directory::GameDirectory;
use crate::error::CommandError;
use crate::identity::IdentityService;
use crate::outbox::Outbox;
use crate::registry::{ConnectionId, SessionRegistry};

pub struct Dispatcher {
    identity: Arc<dyn IdentityService>,
    directory: Arc<dyn GameDirectory>,
    registry: Arc<SessionRegistry>,
    outbox: Arc<dyn Outbox>,
}

impl Dispatcher {
    pub fn new(
        identity: Arc<dyn IdentityService>,
        directory: Arc<dyn GameDirectory>,
        registry: Arc<SessionRegistry>,
        outbox: Arc<dyn Outbox>,
    ) -> Self {
        Self {
            identity,
            directory,
            registry,
            outbox,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Run one command from `from`. Failures are reported to `from` as an
    /// `ERROR` message and also returned.
    pub fn handle(&self, from: ConnectionId, command: UserGameCommand) -> Result<(), CommandError> {
        let UserGameCommand {
            auth_token,
            game_id,
            action,
        } = command;
        debug!("{from}: {} on {game_id}", action.name());

        let result = match action {
            CommandAction::Connect => self.connect(from, &auth_token, game_id),
            CommandAction::MakeMove { mv } => self.make_move(from, &auth_token, game_id, mv),
            CommandAction::Leave => self.leave(from, &auth_token, game_id),
            CommandAction::Resign => self.resign(&auth_token, game_id),
        };
        if let Err(err) = &result {
            self.refuse(from, err);
        }
        result
    }

    /// Send `err` to `from` as an `ERROR`.
    pub fn refuse(&self, from: ConnectionId, err: &CommandError) {
        debug!("{from}: refused: {err}");
        self.send(from, &ServerMessage::error(err));
    }

    /// Refuse `command` if its game does not exist, reporting the same error
    /// `handle` would. Touches no game state, so it is safe to call outside
    /// the game's worker. Returns true if the command was refused.
    pub fn refuse_if_unknown_game(&self, from: ConnectionId, command: &UserGameCommand) -> bool {
        if self.directory.contains(command.game_id) {
            return false;
        }
        let err = match self.authenticate(&command.auth_token) {
            Ok(_) => CommandError::UnknownGame(command.game_id),
            Err(err) => err,
        };
        self.refuse(from, &err);
        true
    }

    /// The connection went away. Runs the LEAVE logic without reporting
    /// errors anywhere, and detaches `conn` from the game even if LEAVE
    /// itself was refused (for example, a token revoked mid-session). A
    /// connection that is no longer attached has nothing to leave.
    pub fn disconnect(&self, conn: ConnectionId, auth_token: &str, game_id: GameId) {
        if !self.registry.is_attached(game_id, conn) {
            debug!("{conn}: already detached from {game_id}");
            return;
        }
        if let Err(err) = self.leave(conn, auth_token, game_id) {
            debug!("{conn}: implicit leave of {game_id} refused: {err}");
        }
        self.registry.leave(game_id, conn);
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    fn connect(
        &self,
        from: ConnectionId,
        auth_token: &str,
        game_id: GameId,
    ) -> Result<(), CommandError> {
        let username = self.authenticate(auth_token)?;
        let record = self.load(game_id)?;

        self.registry.join(game_id, from);
        let text = match record.color_of(&username) {
            Some(color) => format!("{username} joined the game as {color}"),
            None => format!("{username} is observing the game"),
        };
        self.send(from, &ServerMessage::LoadGame { game: record });
        self.broadcast(game_id, &ServerMessage::notification(text), Some(from));
        Ok(())
    }

    fn make_move(
        &self,
        from: ConnectionId,
        auth_token: &str,
        game_id: GameId,
        mv: Move,
    ) -> Result<(), CommandError> {
        let username = self.authenticate(auth_token)?;
        let mut record = self.load(game_id)?;

        if record.color_of(&username).is_none() {
            return Err(CommandError::OnlySeatedPlayersMayAct("move"));
        }
        if record.game.is_over() {
            return Err(MoveError::GameOver.into());
        }
        let piece = record
            .game
            .board()
            .piece_at(mv.start)
            .ok_or(MoveError::NoPieceAtSource(mv.start))?;
        if record.seat(piece.color) != Some(username.as_str()) {
            return Err(CommandError::WrongPieceOwnership);
        }

        let status = record.game.attempt_move(&mv)?;
        let defender = record.game.turn();
        let defender_name = side_name(&record, defender);
        self.directory.store(record.clone())?;

        self.broadcast(game_id, &ServerMessage::LoadGame { game: record }, None);
        self.broadcast(
            game_id,
            &ServerMessage::notification(format!("{username} made move: {mv}")),
            Some(from),
        );
        let verdict = match status {
            PositionStatus::Normal => None,
            PositionStatus::Check => Some("check"),
            PositionStatus::Checkmate => Some("checkmate"),
            PositionStatus::Stalemate => Some("stalemate"),
        };
        if let Some(verdict) = verdict {
            self.broadcast(
                game_id,
                &ServerMessage::notification(format!("{defender_name} is in {verdict}")),
                None,
            );
        }
        Ok(())
    }

    fn leave(
        &self,
        from: ConnectionId,
        auth_token: &str,
        game_id: GameId,
    ) -> Result<(), CommandError> {
        let username = self.authenticate(auth_token)?;
        let mut record = self.load(game_id)?;

        let held: Vec<Color> = Color::ALL
            .into_iter()
            .filter(|&color| record.seat(color) == Some(username.as_str()))
            .collect();
        if !held.is_empty() {
            for color in held {
                record.set_seat(color, None);
            }
            self.directory.store(record)?;
        }

        self.broadcast(
            game_id,
            &ServerMessage::notification(format!("{username} has left the game")),
            Some(from),
        );
        self.registry.leave(game_id, from);
        Ok(())
    }

    fn resign(&self, auth_token: &str, game_id: GameId) -> Result<(), CommandError> {
        let username = self.authenticate(auth_token)?;
        let mut record = self.load(game_id)?;

        if record.color_of(&username).is_none() {
            return Err(CommandError::OnlySeatedPlayersMayAct("resign"));
        }
        record.game.resign()?;
        self.directory.store(record)?;

        self.broadcast(
            game_id,
            &ServerMessage::notification(format!("{username} resigned. Game over")),
            None,
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn authenticate(&self, auth_token: &str) -> Result<String, CommandError> {
        self.identity
            .username_for(auth_token)
            .ok_or(CommandError::Unauthorized)
    }

    fn load(&self, game_id: GameId) -> Result<GameSnapshot, CommandError> {
        self.directory
            .load(game_id)
            .ok_or(CommandError::UnknownGame(game_id))
    }

    fn send(&self, to: ConnectionId, message: &ServerMessage) {
        if let Err(err) = self.outbox.deliver(to, message) {
            warn!("delivery to {to} failed: {err}");
        }
    }

    /// Deliver to every attached connection except `exclude`. A failed
    /// recipient is logged and skipped.
    fn broadcast(&self, game_id: GameId, message: &ServerMessage, exclude: Option<ConnectionId>) {
        for conn in self.registry.audience(game_id) {
            if Some(conn) != exclude {
                self.send(conn, message);
            }
        }
    }
}

/// Seated username for `color`, or the color itself if the seat is empty.
fn side_name(record: &GameSnapshot, color: Color) -> String {
    record
        .seat(color)
        .map_or_else(|| color.to_string(), str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::MemoryGameDirectory;
    use crate::identity::MemoryIdentityService;
    use crate::outbox::MemoryOutbox;
    use rookery_rules::{Board, GameState, Piece, PieceKind, Position};

    const ALICE: ConnectionId = ConnectionId(1);
    const BOB: ConnectionId = ConnectionId(2);
    const EVE: ConnectionId = ConnectionId(3);
    const ELSEWHERE: ConnectionId = ConnectionId(4);

    struct Fixture {
        dispatcher: Dispatcher,
        directory: Arc<MemoryGameDirectory>,
        outbox: Arc<MemoryOutbox>,
        game: GameId,
        other_game: GameId,
    }

    fn fixture_with(game: GameState) -> Fixture {
        let identity = Arc::new(MemoryIdentityService::new());
        identity.register("a", "alice");
        identity.register("b", "bob");
        identity.register("e", "eve");
        identity.register("z", "zed");

        let directory = Arc::new(MemoryGameDirectory::new());
        let game_id = directory.create_game_from("main", game);
        directory.claim_seat(game_id, Color::Light, "alice").unwrap();
        directory.claim_seat(game_id, Color::Dark, "bob").unwrap();
        let other_game = directory.create_game("side");

        let outbox = Arc::new(MemoryOutbox::new());
        let dispatcher = Dispatcher::new(
            identity,
            directory.clone(),
            Arc::new(SessionRegistry::new()),
            outbox.clone(),
        );
        Fixture {
            dispatcher,
            directory,
            outbox,
            game: game_id,
            other_game,
        }
    }

    /// Alice and Bob seated, Eve observing, Zed watching another game. All
    /// connect-time traffic is discarded.
    fn fixture() -> Fixture {
        let f = fixture_with(GameState::new());
        f.dispatcher
            .handle(ALICE, UserGameCommand::connect("a", f.game))
            .unwrap();
        f.dispatcher
            .handle(BOB, UserGameCommand::connect("b", f.game))
            .unwrap();
        f.dispatcher
            .handle(EVE, UserGameCommand::connect("e", f.game))
            .unwrap();
        f.dispatcher
            .handle(ELSEWHERE, UserGameCommand::connect("z", f.other_game))
            .unwrap();
        for conn in [ALICE, BOB, EVE, ELSEWHERE] {
            f.outbox.take(conn);
        }
        f
    }

    fn mv(s: &str) -> Move {
        s.parse().unwrap()
    }

    fn notifications(messages: &[ServerMessage]) -> Vec<&str> {
        messages
            .iter()
            .filter_map(|m| match m {
                ServerMessage::Notification { message } => Some(message.as_str()),
                _ => None,
            })
            .collect()
    }

    fn is_load_game(message: &ServerMessage) -> bool {
        matches!(message, ServerMessage::LoadGame { .. })
    }

    #[test]
    fn connect_sends_snapshot_and_announces_role() {
        let f = fixture_with(GameState::new());
        f.dispatcher
            .handle(ALICE, UserGameCommand::connect("a", f.game))
            .unwrap();
        let to_alice = f.outbox.take(ALICE);
        assert_eq!(to_alice.len(), 1);
        let ServerMessage::LoadGame { game } = &to_alice[0] else {
            panic!("expected LoadGame, got {to_alice:?}");
        };
        assert_eq!(game.game_name, "main");

        f.dispatcher
            .handle(EVE, UserGameCommand::connect("e", f.game))
            .unwrap();
        f.dispatcher
            .handle(BOB, UserGameCommand::connect("b", f.game))
            .unwrap();
        assert_eq!(
            notifications(&f.outbox.take(ALICE)),
            vec!["eve is observing the game", "bob joined the game as DARK"]
        );
        assert!(notifications(&f.outbox.take(BOB)).is_empty());
        assert_eq!(f.dispatcher.registry().audience(f.game), vec![ALICE, BOB, EVE]);
    }

    #[test]
    fn connect_failures_go_to_the_requester_only() {
        let f = fixture();
        let err = f
            .dispatcher
            .handle(EVE, UserGameCommand::connect("nope", f.game))
            .unwrap_err();
        assert_eq!(err, CommandError::Unauthorized);
        let err = f
            .dispatcher
            .handle(EVE, UserGameCommand::connect("e", GameId(404)))
            .unwrap_err();
        assert_eq!(err, CommandError::UnknownGame(GameId(404)));

        assert_eq!(
            f.outbox.take(EVE),
            vec![
                ServerMessage::error("unauthorized"),
                ServerMessage::error("game 404 does not exist"),
            ]
        );
        assert!(f.outbox.is_empty());
    }

    #[test]
    fn move_broadcast_excludes_mover_and_other_games() {
        let f = fixture();
        f.dispatcher
            .handle(ALICE, UserGameCommand::make_move("a", f.game, mv("e2e4")))
            .unwrap();

        let to_alice = f.outbox.take(ALICE);
        assert_eq!(to_alice.len(), 1);
        assert!(is_load_game(&to_alice[0]));

        for conn in [BOB, EVE] {
            let received = f.outbox.take(conn);
            assert_eq!(received.len(), 2);
            assert!(is_load_game(&received[0]));
            assert_eq!(notifications(&received), vec!["alice made move: e2e4"]);
        }
        assert!(f.outbox.take(ELSEWHERE).is_empty());

        let stored = f.directory.load(f.game).unwrap();
        assert_eq!(stored.game.turn(), Color::Dark);
    }

    #[test]
    fn seat_and_ownership_are_checked() {
        let f = fixture();
        let err = f
            .dispatcher
            .handle(EVE, UserGameCommand::make_move("e", f.game, mv("e2e4")))
            .unwrap_err();
        assert_eq!(err, CommandError::OnlySeatedPlayersMayAct("move"));

        let err = f
            .dispatcher
            .handle(BOB, UserGameCommand::make_move("b", f.game, mv("e2e4")))
            .unwrap_err();
        assert_eq!(err, CommandError::WrongPieceOwnership);

        let err = f
            .dispatcher
            .handle(BOB, UserGameCommand::make_move("b", f.game, mv("e7e5")))
            .unwrap_err();
        assert_eq!(err, CommandError::Rules(MoveError::WrongTurn(Color::Light)));

        let err = f
            .dispatcher
            .handle(ALICE, UserGameCommand::make_move("a", f.game, mv("e4e5")))
            .unwrap_err();
        assert!(matches!(err, CommandError::Rules(MoveError::NoPieceAtSource(_))));

        let err = f
            .dispatcher
            .handle(ALICE, UserGameCommand::make_move("a", f.game, mv("e2e5")))
            .unwrap_err();
        assert!(matches!(err, CommandError::Rules(MoveError::IllegalMove(_))));

        assert_eq!(
            f.outbox.take(EVE),
            vec![ServerMessage::error("only players can move")]
        );
        assert_eq!(f.outbox.take(BOB).len(), 2);
        assert_eq!(f.outbox.take(ALICE).len(), 2);
        assert!(f.outbox.is_empty());
        assert_eq!(f.directory.load(f.game).unwrap().game, GameState::new());
    }

    #[test]
    fn scholars_mate_ends_the_game() {
        let f = fixture();
        let script = [
            (ALICE, "a", "e2e4"),
            (BOB, "b", "e7e5"),
            (ALICE, "a", "f1c4"),
            (BOB, "b", "b8c6"),
            (ALICE, "a", "d1h5"),
            (BOB, "b", "g8f6"),
            (ALICE, "a", "h5f7"),
        ];
        for (conn, token, m) in script {
            f.dispatcher
                .handle(conn, UserGameCommand::make_move(token, f.game, mv(m)))
                .unwrap();
        }
        let to_eve = f.outbox.take(EVE);
        assert_eq!(
            notifications(&to_eve).last().copied(),
            Some("bob is in checkmate")
        );
        assert!(f.directory.load(f.game).unwrap().game.is_over());

        let err = f
            .dispatcher
            .handle(BOB, UserGameCommand::make_move("b", f.game, mv("a7a6")))
            .unwrap_err();
        assert_eq!(err, CommandError::Rules(MoveError::GameOver));
    }

    #[test]
    fn check_notification_goes_to_everyone() {
        let f = fixture();
        for (conn, token, m) in [(ALICE, "a", "e2e4"), (BOB, "b", "f7f6")] {
            f.dispatcher
                .handle(conn, UserGameCommand::make_move(token, f.game, mv(m)))
                .unwrap();
        }
        for conn in [ALICE, BOB, EVE] {
            f.outbox.take(conn);
        }
        f.dispatcher
            .handle(ALICE, UserGameCommand::make_move("a", f.game, mv("d1h5")))
            .unwrap();
        assert_eq!(
            notifications(&f.outbox.take(ALICE)),
            vec!["bob is in check"]
        );
        assert_eq!(
            notifications(&f.outbox.take(BOB)),
            vec!["alice made move: d1h5", "bob is in check"]
        );
    }

    #[test]
    fn stalemate_names_a_vacant_side_by_color() {
        // Light: Kb6 Qc5. Dark: Ka8. Qc7 leaves Dark with no moves.
        let mut board = Board::empty();
        let at = |s: &str| s.parse::<Position>().unwrap();
        board.place(at("b6"), Piece::new(Color::Light, PieceKind::King));
        board.place(at("c5"), Piece::new(Color::Light, PieceKind::Queen));
        board.place(at("a8"), Piece::new(Color::Dark, PieceKind::King));
        let f = fixture_with(GameState::from_position(board, Color::Light));
        f.dispatcher
            .handle(ALICE, UserGameCommand::connect("a", f.game))
            .unwrap();
        let mut record = f.directory.load(f.game).unwrap();
        record.set_seat(Color::Dark, None);
        f.directory.store(record).unwrap();
        f.outbox.take(ALICE);

        f.dispatcher
            .handle(ALICE, UserGameCommand::make_move("a", f.game, mv("c5c7")))
            .unwrap();
        assert_eq!(
            notifications(&f.outbox.take(ALICE)),
            vec!["DARK is in stalemate"]
        );
        assert!(f.directory.load(f.game).unwrap().game.is_over());
    }

    #[test]
    fn resign_rules() {
        let f = fixture();
        let err = f
            .dispatcher
            .handle(EVE, UserGameCommand::resign("e", f.game))
            .unwrap_err();
        assert_eq!(err, CommandError::OnlySeatedPlayersMayAct("resign"));

        f.dispatcher
            .handle(BOB, UserGameCommand::resign("b", f.game))
            .unwrap();
        for conn in [ALICE, BOB] {
            assert_eq!(
                notifications(&f.outbox.take(conn)),
                vec!["bob resigned. Game over"]
            );
        }
        let record = f.directory.load(f.game).unwrap();
        assert!(record.game.is_over());
        assert_eq!(record.seat(Color::Dark), Some("bob"));

        let err = f
            .dispatcher
            .handle(ALICE, UserGameCommand::resign("a", f.game))
            .unwrap_err();
        assert_eq!(err, CommandError::Rules(MoveError::GameOver));
    }

    #[test]
    fn leave_vacates_seat_and_detaches() {
        let f = fixture();
        f.dispatcher
            .handle(BOB, UserGameCommand::leave("b", f.game))
            .unwrap();

        assert!(f.outbox.take(BOB).is_empty());
        for conn in [ALICE, EVE] {
            assert_eq!(
                notifications(&f.outbox.take(conn)),
                vec!["bob has left the game"]
            );
        }
        assert_eq!(f.directory.load(f.game).unwrap().seat(Color::Dark), None);
        assert_eq!(f.dispatcher.registry().audience(f.game), vec![ALICE, EVE]);

        // The open seat means Bob is now just an observer.
        let err = f
            .dispatcher
            .handle(BOB, UserGameCommand::make_move("b", f.game, mv("e7e5")))
            .unwrap_err();
        assert_eq!(err, CommandError::OnlySeatedPlayersMayAct("move"));
    }

    #[test]
    fn observer_leave_keeps_seats() {
        let f = fixture();
        f.dispatcher
            .handle(EVE, UserGameCommand::leave("e", f.game))
            .unwrap();
        let record = f.directory.load(f.game).unwrap();
        assert_eq!(record.seat(Color::Light), Some("alice"));
        assert_eq!(record.seat(Color::Dark), Some("bob"));
        assert!(!f.dispatcher.registry().is_attached(f.game, EVE));
    }

    #[test]
    fn failed_delivery_does_not_stop_broadcast() {
        let f = fixture();
        f.outbox.disconnect(BOB);
        f.dispatcher
            .handle(ALICE, UserGameCommand::make_move("a", f.game, mv("d2d4")))
            .unwrap();
        assert!(f.outbox.take(BOB).is_empty());
        assert_eq!(
            notifications(&f.outbox.take(EVE)),
            vec!["alice made move: d2d4"]
        );
    }

    #[test]
    fn disconnect_detaches_even_when_leave_is_refused() {
        let f = fixture();
        f.dispatcher.disconnect(EVE, "revoked-token", f.game);
        assert!(!f.dispatcher.registry().is_attached(f.game, EVE));
        assert!(f.outbox.take(EVE).is_empty());

        f.dispatcher.disconnect(ALICE, "a", f.game);
        assert_eq!(f.directory.load(f.game).unwrap().seat(Color::Light), None);
        assert_eq!(
            notifications(&f.outbox.take(BOB)),
            vec!["alice has left the game"]
        );
    }

    #[test]
    fn disconnect_of_a_detached_connection_changes_nothing() {
        let f = fixture();
        let stranger = ConnectionId(77);
        f.dispatcher.disconnect(stranger, "a", f.game);
        assert_eq!(f.directory.load(f.game).unwrap().seat(Color::Light), Some("alice"));
        assert!(f.outbox.take(BOB).is_empty());
    }

    #[test]
    fn unknown_game_is_refused_like_handle_would() {
        let f = fixture();
        let missing = GameId(404);
        let refused = |cmd: UserGameCommand| f.dispatcher.refuse_if_unknown_game(EVE, &cmd);
        assert!(refused(UserGameCommand::connect("e", missing)));
        assert!(refused(UserGameCommand::leave("nobody", missing)));
        assert!(!refused(UserGameCommand::connect("e", f.game)));
        assert_eq!(
            f.outbox.take(EVE),
            vec![
                ServerMessage::error("game 404 does not exist"),
                ServerMessage::error("unauthorized"),
            ]
        );
    }
}
