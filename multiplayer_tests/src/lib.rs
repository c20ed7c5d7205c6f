// Test-only game client for end-to-end server tests.
//
// Wraps the real `NetClient` (from `rookery_server::client`) and keeps a
// local `GameState` mirror (from `rookery_rules`) so tests can check that
// the server's snapshots match what the rules engine predicts on the client
// side: client → server → worker → dispatcher → broadcast → every client.
//
// The only test-specific code here is the synchronous polling wrappers
// (blocking loops around `NetClient::poll()`). All networking and rules
// logic uses the same code paths as a real client.
//
// See also: `tests/full_pipeline.rs` for the scenarios.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::thread;
use std::time::{Duration, Instant};

use rookery_protocol::{GameId, GameSnapshot, ServerMessage};
use rookery_rules::{GameState, Move};
use rookery_server::client::NetClient;

/// Default timeout for blocking poll operations.
const POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// Sleep duration between poll attempts.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A test client attached to one game.
pub struct TestGameClient {
    client: NetClient,
    token: String,
    game_id: GameId,
    /// Messages received but not yet consumed by a `poll_until_*` call.
    backlog: VecDeque<ServerMessage>,
    /// Most recent snapshot from the server.
    pub snapshot: Option<GameSnapshot>,
    /// Local prediction, advanced by `expect_move`.
    pub mirror: GameState,
}

impl TestGameClient {
    /// Connect as `token`, send CONNECT for `game_id`, and wait for the
    /// initial snapshot.
    pub fn connect(addr: SocketAddr, token: &str, game_id: GameId) -> Self {
        let client = NetClient::connect(addr).expect("TestGameClient::connect failed");
        let mut this = Self {
            client,
            token: token.to_owned(),
            game_id,
            backlog: VecDeque::new(),
            snapshot: None,
            mirror: GameState::new(),
        };
        this.client
            .connect_game(token, game_id)
            .expect("send CONNECT failed");
        let snapshot = this.poll_until_snapshot();
        this.mirror = snapshot.game;
        this
    }

    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    /// Send MAKE_MOVE for `mv` (coordinate notation, e.g. "e2e4").
    pub fn play(&mut self, mv: &str) {
        let mv: Move = mv.parse().expect("bad move notation in test");
        self.client
            .make_move(&self.token, self.game_id, mv)
            .expect("send MAKE_MOVE failed");
    }

    pub fn resign(&mut self) {
        self.client
            .resign(&self.token, self.game_id)
            .expect("send RESIGN failed");
    }

    pub fn leave(&mut self) {
        self.client
            .leave(&self.token, self.game_id)
            .expect("send LEAVE failed");
    }

    /// Close the socket without sending LEAVE.
    pub fn disconnect(&mut self) {
        self.client.disconnect();
    }

    /// Apply `mv` to the local mirror, wait for the server's next snapshot,
    /// and assert the two agree.
    pub fn expect_move(&mut self, mv: &str) -> GameSnapshot {
        let mv: Move = mv.parse().expect("bad move notation in test");
        self.mirror
            .attempt_move(&mv)
            .expect("mirror rejected a move the test expected to succeed");
        let snapshot = self.poll_until_snapshot();
        assert_eq!(snapshot.game, self.mirror, "server and mirror diverged");
        snapshot
    }

    /// Blocking poll until a LOAD_GAME arrives. Earlier messages of other
    /// kinds stay queued for later `poll_until_*` calls.
    pub fn poll_until_snapshot(&mut self) -> GameSnapshot {
        let snapshot = self.poll_until("LOAD_GAME", |msg| match msg {
            ServerMessage::LoadGame { game } => Some(game.clone()),
            _ => None,
        });
        self.snapshot = Some(snapshot.clone());
        snapshot
    }

    /// Blocking poll until a NOTIFICATION arrives; returns its text.
    pub fn poll_until_notification(&mut self) -> String {
        self.poll_until("NOTIFICATION", |msg| match msg {
            ServerMessage::Notification { message } => Some(message.clone()),
            _ => None,
        })
    }

    /// Blocking poll until an ERROR arrives; returns its text.
    pub fn poll_until_error(&mut self) -> String {
        self.poll_until("ERROR", |msg| match msg {
            ServerMessage::Error { error_message } => Some(error_message.clone()),
            _ => None,
        })
    }

    /// Collect everything that arrives until the connection has been silent
    /// for `quiet`, including anything already queued.
    pub fn settle(&mut self, quiet: Duration) -> Vec<ServerMessage> {
        let mut collected: Vec<ServerMessage> = self.backlog.drain(..).collect();
        while let Some(msg) = self.client.recv_timeout(quiet) {
            collected.push(msg);
        }
        collected
    }

    fn poll_until<T>(&mut self, what: &str, mut pick: impl FnMut(&ServerMessage) -> Option<T>) -> T {
        let start = Instant::now();
        loop {
            self.backlog.extend(self.client.poll());
            if let Some(index) = self.backlog.iter().position(|msg| pick(msg).is_some()) {
                let msg = self.backlog.remove(index).expect("index from position");
                return pick(&msg).expect("matched above");
            }
            assert!(
                start.elapsed() < POLL_TIMEOUT,
                "timed out waiting for {what}; backlog: {:?}",
                self.backlog
            );
            thread::sleep(POLL_INTERVAL);
        }
    }
}
