// TCP front end: accepts connections and feeds their commands to the
// per-game workers.
//
// Architecture: thread-per-reader, no central event loop.
//
// - **Listener thread**: non-blocking `accept()` loop that polls
//   `keep_running`. Each accepted socket gets a `ConnectionId` from an
//   atomic counter; its write half goes into the `TcpOutbox` and its read
//   half to a new reader thread.
// - **Reader threads** (one per client): read framed `UserGameCommand`s and
//   `submit` them to `GameWorkers`, which routes each to its game's worker.
//   A frame that arrives whole but does not decode gets an `ERROR` back and
//   the connection stays open. EOF or any I/O error ends the reader.
// - **Game workers** (`worker.rs`): the only place commands execute.
//
// When a reader ends, it queues an implicit LEAVE for every game that
// connection sent a CONNECT to (using the token it last connected with),
// then drops the connection's writer. `GameWorkers::submit_disconnect` skips
// games the connection is no longer attached to, and the worker re-checks
// attachment when the job runs, so a refused CONNECT or an explicit LEAVE
// leaves nothing behind. Once the workers are shut down the reader detaches
// the connection from the registry directly.
//
// `ServerHandle::stop` shuts down every client socket, which ends the
// reader threads through that same close path.
//
// Writers are touched only by `TcpOutbox::deliver`, which serializes per
// socket. Readers never write except through the outbox.

use std::collections::BTreeMap;
use std::io::{self, BufReader};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use rookery_protocol::{
    CommandAction, FrameError, GameId, ServerMessage, UserGameCommand, read_json,
};

use crate::config::ServerConfig;
use crate::directory::GameDirectory;
use crate::dispatcher::Dispatcher;
use crate::identity::IdentityService;
use crate::outbox::{Outbox, TcpOutbox};
use crate::registry::{ConnectionId, SessionRegistry};
use crate::worker::GameWorkers;

/// The external collaborators the server consults.
#[derive(Clone)]
pub struct Services {
    pub identity: Arc<dyn IdentityService>,
    pub directory: Arc<dyn GameDirectory>,
}

/// Handle returned by `start_server` to control the running server.
pub struct ServerHandle {
    keep_running: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
    workers: GameWorkers,
    outbox: Arc<TcpOutbox>,
}

impl ServerHandle {
    pub fn workers(&self) -> &GameWorkers {
        &self.workers
    }

    /// Number of client sockets currently open.
    pub fn connection_count(&self) -> usize {
        self.outbox.connection_count()
    }

    /// Stop accepting, release the game workers, and close every client
    /// socket.
    pub fn stop(mut self) {
        self.keep_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
        self.workers.shutdown();
        self.outbox.shutdown_all();
    }

    /// Block until the listener thread exits.
    pub fn wait(mut self) {
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

/// Bind the listener and start serving on background threads. Returns the
/// actual bound address (useful when port 0 is used to let the OS pick a
/// free port).
pub fn start_server(
    config: &ServerConfig,
    services: Services,
) -> io::Result<(ServerHandle, SocketAddr)> {
    let listener = TcpListener::bind(config.listen_addr())?;
    let addr = listener.local_addr()?;
    listener.set_nonblocking(true)?;

    let outbox = Arc::new(TcpOutbox::new());
    let dispatcher = Arc::new(Dispatcher::new(
        services.identity,
        services.directory,
        Arc::new(SessionRegistry::new()),
        outbox.clone(),
    ));
    let workers = GameWorkers::new(dispatcher, config.worker_idle_timeout());
    let keep_running = Arc::new(AtomicBool::new(true));

    let acceptor = Acceptor {
        listener,
        next_conn: AtomicU64::new(1),
        write_timeout: config.write_timeout(),
        workers: workers.clone(),
        outbox: outbox.clone(),
        keep_running: keep_running.clone(),
    };
    let thread = thread::spawn(move || acceptor.run());
    info!("listening on {addr}");

    Ok((
        ServerHandle {
            keep_running,
            thread: Some(thread),
            workers,
            outbox,
        },
        addr,
    ))
}

struct Acceptor {
    listener: TcpListener,
    next_conn: AtomicU64,
    write_timeout: Duration,
    workers: GameWorkers,
    outbox: Arc<TcpOutbox>,
    keep_running: Arc<AtomicBool>,
}

impl Acceptor {
    fn run(self) {
        while self.keep_running.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if let Err(e) = self.open_connection(stream, peer) {
                        warn!("could not set up connection from {peer}: {e}");
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(50));
                }
                Err(e) => {
                    warn!("accept failed, listener stopping: {e}");
                    break;
                }
            }
        }
        info!("listener stopped");
    }

    fn open_connection(&self, stream: TcpStream, peer: SocketAddr) -> io::Result<()> {
        stream.set_nonblocking(false)?;
        stream.set_write_timeout(Some(self.write_timeout))?;
        let write_half = stream.try_clone()?;

        let conn = ConnectionId(self.next_conn.fetch_add(1, Ordering::SeqCst));
        self.outbox.register(conn, write_half);
        info!("{conn} connected from {peer}");

        let reader = ConnectionReader {
            conn,
            reader: BufReader::new(stream),
            connected: BTreeMap::new(),
            workers: self.workers.clone(),
            outbox: self.outbox.clone(),
            keep_running: self.keep_running.clone(),
        };
        let spawned = thread::Builder::new()
            .name(format!("reader-{}", conn.0))
            .spawn(move || reader.run());
        if let Err(e) = spawned {
            self.outbox.unregister(conn);
            return Err(e);
        }
        Ok(())
    }
}

/// Reader side of one client connection. Runs in its own thread.
struct ConnectionReader {
    conn: ConnectionId,
    reader: BufReader<TcpStream>,
    /// Games this connection sent CONNECT for, with the latest token it used.
    /// Entries are never removed; whether anything is left to undo is
    /// decided from the registry at close.
    connected: BTreeMap<GameId, String>,
    workers: GameWorkers,
    outbox: Arc<TcpOutbox>,
    keep_running: Arc<AtomicBool>,
}

impl ConnectionReader {
    fn run(mut self) {
        while self.keep_running.load(Ordering::SeqCst) {
            match read_json::<_, UserGameCommand>(&mut self.reader) {
                Ok(command) => self.forward(command),
                Err(err) if err.is_recoverable() => {
                    warn!("{}: malformed command: {err}", self.conn);
                    let reply = ServerMessage::error(format!("could not read command: {err}"));
                    if let Err(e) = self.outbox.deliver(self.conn, &reply) {
                        warn!("delivery to {} failed: {e}", self.conn);
                    }
                }
                Err(FrameError::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    debug!("{}: closed by peer", self.conn);
                    break;
                }
                Err(err) => {
                    warn!("{}: dropping connection: {err}", self.conn);
                    break;
                }
            }
        }
        self.close();
    }

    fn forward(&mut self, command: UserGameCommand) {
        if command.action == CommandAction::Connect {
            self.connected
                .insert(command.game_id, command.auth_token.clone());
        }
        self.workers.submit(self.conn, command);
    }

    fn close(self) {
        for (game_id, auth_token) in self.connected {
            self.workers.submit_disconnect(self.conn, auth_token, game_id);
        }
        if self.workers.is_shut_down() {
            let detached = self.workers.dispatcher().registry().leave_all(self.conn);
            if !detached.is_empty() {
                let conn = self.conn;
                debug!("{conn}: detached from {} game(s) after shutdown", detached.len());
            }
        }
        self.outbox.unregister(self.conn);
        info!("{} disconnected", self.conn);
    }
}
