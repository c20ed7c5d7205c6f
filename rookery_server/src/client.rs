// TCP client for talking to a Rookery server.
//
// Architecture:
// - `connect()` opens the socket on the calling thread and spawns a
//   background reader thread. There is no handshake; identity travels in
//   every command's auth token.
// - The reader thread reads framed `ServerMessage`s in a loop and pushes
//   them into an `mpsc` channel.
// - The caller holds a `BufWriter<TcpStream>` for sending. Writes flush
//   synchronously (commands are small).
// - `poll()` drains the inbox without blocking; `recv_timeout()` waits for
//   one message.
//
// Lives in the server crate because it only needs std TCP plus the protocol
// crate, and the integration tests use it.

use std::io::{BufReader, BufWriter};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rookery_protocol::{FrameError, GameId, ServerMessage, UserGameCommand, read_json, write_json};
use rookery_rules::Move;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connect failed: {0}")]
    Connect(#[source] std::io::Error),
    #[error("send failed: {0}")]
    Send(#[from] FrameError),
}

pub struct NetClient {
    writer: BufWriter<TcpStream>,
    inbox: Receiver<ServerMessage>,
    _reader_thread: Option<JoinHandle<()>>,
}

impl NetClient {
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).map_err(ClientError::Connect)?;
        let reader_stream = stream.try_clone().map_err(ClientError::Connect)?;

        let (tx, rx) = mpsc::channel();
        let reader_thread = thread::spawn(move || {
            reader_loop(BufReader::new(reader_stream), tx);
        });

        Ok(Self {
            writer: BufWriter::new(stream),
            inbox: rx,
            _reader_thread: Some(reader_thread),
        })
    }

    /// Send any command as-is.
    pub fn send(&mut self, command: &UserGameCommand) -> Result<(), ClientError> {
        write_json(&mut self.writer, command)?;
        Ok(())
    }

    pub fn connect_game(&mut self, auth_token: &str, game_id: GameId) -> Result<(), ClientError> {
        self.send(&UserGameCommand::connect(auth_token, game_id))
    }

    pub fn make_move(
        &mut self,
        auth_token: &str,
        game_id: GameId,
        mv: Move,
    ) -> Result<(), ClientError> {
        self.send(&UserGameCommand::make_move(auth_token, game_id, mv))
    }

    pub fn leave(&mut self, auth_token: &str, game_id: GameId) -> Result<(), ClientError> {
        self.send(&UserGameCommand::leave(auth_token, game_id))
    }

    pub fn resign(&mut self, auth_token: &str, game_id: GameId) -> Result<(), ClientError> {
        self.send(&UserGameCommand::resign(auth_token, game_id))
    }

    /// Close both directions of the socket. The server treats this as an
    /// implicit LEAVE of every game this client connected to.
    pub fn disconnect(&mut self) {
        let _ = self.writer.get_ref().shutdown(Shutdown::Both);
    }

    /// Drain all queued server messages (non-blocking).
    pub fn poll(&self) -> Vec<ServerMessage> {
        self.inbox.try_iter().collect()
    }

    /// Wait up to `timeout` for the next server message.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ServerMessage> {
        self.inbox.recv_timeout(timeout).ok()
    }
}

/// Reader thread: read framed messages in a loop, push to channel.
fn reader_loop(mut reader: BufReader<TcpStream>, tx: mpsc::Sender<ServerMessage>) {
    while let Ok(msg) = read_json::<_, ServerMessage>(&mut reader) {
        if tx.send(msg).is_err() {
            break; // Caller dropped the client
        }
    }
}
