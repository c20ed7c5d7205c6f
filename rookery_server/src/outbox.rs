// Delivery of server messages to connections.
//
// `Outbox` is the only way the dispatcher talks to clients. Delivery is
// best-effort per recipient: a failure is returned to the caller, which logs
// it and moves on to the next connection.
//
// - `TcpOutbox` owns the write half of every live socket. Each writer sits
//   behind its own mutex so two games broadcasting to the same observer
//   never interleave frames, and a stalled socket only blocks senders to
//   that socket (bounded by the write timeout set in `server.rs`).
// - `MemoryOutbox` records messages per connection, for tests and for
//   embedding the dispatcher without sockets.

use std::collections::{BTreeMap, BTreeSet};
use std::io::BufWriter;
use std::net::{Shutdown, TcpStream};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use log::debug;
use rookery_protocol::{FrameError, ServerMessage, write_json};
use thiserror::Error;

use crate::registry::ConnectionId;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("{0} is not connected")]
    NotConnected(ConnectionId),
    #[error("writer for {0} is poisoned")]
    Poisoned(ConnectionId),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

pub trait Outbox: Send + Sync {
    fn deliver(&self, to: ConnectionId, message: &ServerMessage) -> Result<(), DeliveryError>;
}

// ---------------------------------------------------------------------------
// TCP
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct TcpOutbox {
    writers: DashMap<ConnectionId, Arc<Mutex<BufWriter<TcpStream>>>>,
}

impl TcpOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, conn: ConnectionId, stream: TcpStream) {
        self.writers
            .insert(conn, Arc::new(Mutex::new(BufWriter::new(stream))));
    }

    /// Drop the write half. Returns false if `conn` was not registered.
    pub fn unregister(&self, conn: ConnectionId) -> bool {
        self.writers.remove(&conn).is_some()
    }

    pub fn connection_count(&self) -> usize {
        self.writers.len()
    }

    /// Shut down every registered socket in both directions. Each reader
    /// then sees EOF and runs its normal close path.
    pub fn shutdown_all(&self) {
        let writers: Vec<_> = self
            .writers
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();
        for (conn, writer) in writers {
            let result = match writer.lock() {
                Ok(writer) => writer.get_ref().shutdown(Shutdown::Both),
                Err(poisoned) => poisoned.into_inner().get_ref().shutdown(Shutdown::Both),
            };
            if let Err(e) = result {
                debug!("shutdown of {conn} failed: {e}");
            }
        }
    }
}

impl Outbox for TcpOutbox {
    fn deliver(&self, to: ConnectionId, message: &ServerMessage) -> Result<(), DeliveryError> {
        // Clone the handle out so the map shard is not locked during the write.
        let writer = self
            .writers
            .get(&to)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(DeliveryError::NotConnected(to))?;
        let mut writer = writer.lock().map_err(|_| DeliveryError::Poisoned(to))?;
        write_json(&mut *writer, message)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Mailboxes {
    delivered: BTreeMap<ConnectionId, Vec<ServerMessage>>,
    unreachable: BTreeSet<ConnectionId>,
}

/// Records every delivered message per connection.
#[derive(Debug, Default)]
pub struct MemoryOutbox {
    inner: Mutex<Mailboxes>,
}

impl MemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later delivery to `conn` fail with `NotConnected`.
    pub fn disconnect(&self, conn: ConnectionId) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.unreachable.insert(conn);
        }
    }

    /// Remove and return everything delivered to `conn` so far.
    pub fn take(&self, conn: ConnectionId) -> Vec<ServerMessage> {
        self.inner
            .lock()
            .map(|mut inner| inner.delivered.remove(&conn).unwrap_or_default())
            .unwrap_or_default()
    }

    /// Total number of messages held across all connections.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .map(|inner| inner.delivered.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Outbox for MemoryOutbox {
    fn deliver(&self, to: ConnectionId, message: &ServerMessage) -> Result<(), DeliveryError> {
        let mut inner = self.inner.lock().map_err(|_| DeliveryError::Poisoned(to))?;
        if inner.unreachable.contains(&to) {
            return Err(DeliveryError::NotConnected(to));
        }
        inner.delivered.entry(to).or_default().push(message.clone());
        Ok(())
    }
}
