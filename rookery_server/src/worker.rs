// Per-game command serialization.
//
// Every game with pending traffic gets one worker thread fed by an `mpsc`
// channel. All commands for that game, from any connection, run on that
// thread in arrival order, so a game's read-validate-mutate-broadcast never
// interleaves with another command for the same game. Different games run
// on different threads and never wait on each other.
//
// Lifecycle:
// - `submit` refuses commands for games the directory does not know on the
//   calling thread, so a worker only ever exists for a real game.
// - Otherwise it looks up (or spawns) the game's worker under the `DashMap`
//   entry lock, bumps its pending counter, and sends the job.
// - A worker that sees no job for `idle_timeout` retires: it removes its own
//   slot, but only if the pending counter is zero. Because `submit` holds
//   the same entry lock while it counts and sends, a job can never be sent
//   to a worker that has already decided to exit.
// - `shutdown` drops every sender; workers drain what they have and exit.
//   Jobs submitted after that are dropped.
//
// A panic inside one command is caught and logged so the worker (and with
// it the game) keeps going. The record in the directory is only written
// after a command has fully validated, so a panic leaves it unchanged.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use log::{debug, error, warn};
use rookery_protocol::{GameId, UserGameCommand};

use crate::dispatcher::Dispatcher;
use crate::error::CommandError;
use crate::registry::ConnectionId;

enum Job {
    Command {
        from: ConnectionId,
        command: UserGameCommand,
    },
    Disconnected {
        conn: ConnectionId,
        auth_token: String,
    },
}

struct WorkerSlot {
    tx: Sender<Job>,
    pending: Arc<AtomicUsize>,
}

struct Shared {
    dispatcher: Arc<Dispatcher>,
    slots: DashMap<GameId, WorkerSlot>,
    idle_timeout: Duration,
    closed: AtomicBool,
}

/// Handle to the worker pool. Cheap to clone; all clones share the pool.
#[derive(Clone)]
pub struct GameWorkers {
    shared: Arc<Shared>,
}

impl GameWorkers {
    pub fn new(dispatcher: Arc<Dispatcher>, idle_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                dispatcher,
                slots: DashMap::new(),
                idle_timeout,
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.shared.dispatcher
    }

    /// Queue a client command on its game's worker. Commands for unknown
    /// games are refused here and never start a worker.
    pub fn submit(&self, from: ConnectionId, command: UserGameCommand) {
        let dispatcher = &self.shared.dispatcher;
        if dispatcher.refuse_if_unknown_game(from, &command) {
            return;
        }
        let game_id = command.game_id;
        if !self.enqueue(game_id, Job::Command { from, command }) {
            dispatcher.refuse(from, &CommandError::Unavailable(game_id));
        }
    }

    /// Queue the implicit LEAVE for a connection that dropped.
    ///
    /// Skipped when there is nothing to undo: no command for the game is
    /// still queued and `conn` is not attached to it. Every command `conn`
    /// sent was submitted before this call, so once the game's queue is
    /// empty its attachment can no longer change.
    pub fn submit_disconnect(&self, conn: ConnectionId, auth_token: String, game_id: GameId) {
        let in_flight = self
            .shared
            .slots
            .get(&game_id)
            .is_some_and(|slot| slot.pending.load(Ordering::SeqCst) > 0);
        if !in_flight && !self.dispatcher().registry().is_attached(game_id, conn) {
            debug!("{conn}: nothing to undo on {game_id}");
            return;
        }
        self.enqueue(game_id, Job::Disconnected { conn, auth_token });
    }

    /// Number of games that currently have a live worker.
    pub fn active_games(&self) -> usize {
        self.shared.slots.len()
    }

    /// Jobs queued or running across all games.
    pub fn pending(&self) -> usize {
        self.shared
            .slots
            .iter()
            .map(|slot| slot.pending.load(Ordering::SeqCst))
            .sum()
    }

    /// Drop every worker's sender. Queued jobs still run.
    pub fn shutdown(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        self.shared.slots.clear();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Returns false if the job was dropped.
    fn enqueue(&self, game_id: GameId, job: Job) -> bool {
        let entry = self.shared.slots.entry(game_id);
        // Checked under the entry lock so `shutdown` cannot clear the map
        // between this check and the insert below.
        if self.is_shut_down() {
            debug!("workers are shut down; job for {game_id} dropped");
            return false;
        }
        let slot = match entry {
            Entry::Occupied(occupied) => occupied.into_ref(),
            Entry::Vacant(vacant) => match spawn_worker(&self.shared, game_id) {
                Ok(slot) => vacant.insert(slot),
                Err(e) => {
                    error!("could not start worker for {game_id}: {e}");
                    return false;
                }
            },
        };
        slot.pending.fetch_add(1, Ordering::SeqCst);
        if slot.tx.send(job).is_err() {
            // Only possible if the worker thread died outside a job.
            slot.pending.fetch_sub(1, Ordering::SeqCst);
            warn!("worker for {game_id} is gone; command dropped");
            return false;
        }
        true
    }
}

fn spawn_worker(shared: &Arc<Shared>, game_id: GameId) -> io::Result<WorkerSlot> {
    let (tx, rx) = mpsc::channel();
    let pending = Arc::new(AtomicUsize::new(0));
    let shared = Arc::clone(shared);
    let counter = Arc::clone(&pending);
    debug!("starting worker for {game_id}");
    thread::Builder::new()
        .name(format!("game-{}", game_id.0))
        .spawn(move || run_worker(shared, game_id, rx, counter))?;
    Ok(WorkerSlot { tx, pending })
}

fn run_worker(shared: Arc<Shared>, game_id: GameId, rx: Receiver<Job>, pending: Arc<AtomicUsize>) {
    loop {
        match rx.recv_timeout(shared.idle_timeout) {
            Ok(job) => {
                run_job(&shared.dispatcher, game_id, job);
                pending.fetch_sub(1, Ordering::SeqCst);
            }
            Err(RecvTimeoutError::Timeout) => {
                let retired = shared
                    .slots
                    .remove_if(&game_id, |_, slot| {
                        Arc::ptr_eq(&slot.pending, &pending)
                            && slot.pending.load(Ordering::SeqCst) == 0
                    })
                    .is_some();
                if retired {
                    debug!("worker for {game_id} retired after idling");
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn run_job(dispatcher: &Dispatcher, game_id: GameId, job: Job) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| match job {
        Job::Command { from, command } => {
            // Refusals were already reported to the client.
            let _ = dispatcher.handle(from, command);
        }
        Job::Disconnected { conn, auth_token } => {
            dispatcher.disconnect(conn, &auth_token, game_id);
        }
    }));
    if outcome.is_err() {
        error!("command on {game_id} panicked; game state left as last stored");
    }
}
