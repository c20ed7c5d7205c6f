// Session registry: which live connections are attached to which game.
//
// The registry is the audience list for broadcasts. It knows nothing about
// seats or usernames; a player and an observer look the same here. Entries
// are pruned as soon as a game's last connection leaves, so `game_count()`
// only counts games someone is watching.
//
// Backed by a `DashMap`, so every operation on one game's set runs under
// that entry's shard lock. Broadcasts iterate over a copy (`audience()`), so
// a slow send never holds the lock.

use std::collections::BTreeSet;
use std::fmt;

use dashmap::DashMap;
use rookery_protocol::GameId;

/// Server-assigned identifier for one live client connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    games: DashMap<GameId, BTreeSet<ConnectionId>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `conn` to `game_id`. Returns false if it was already attached.
    pub fn join(&self, game_id: GameId, conn: ConnectionId) -> bool {
        self.games.entry(game_id).or_default().insert(conn)
    }

    /// Detach `conn` from `game_id`, dropping the game's entry if it is now
    /// empty. Returns false if `conn` was not attached.
    pub fn leave(&self, game_id: GameId, conn: ConnectionId) -> bool {
        let removed = match self.games.get_mut(&game_id) {
            Some(mut members) => members.remove(&conn),
            None => false,
        };
        self.games.remove_if(&game_id, |_, members| members.is_empty());
        removed
    }

    /// Detach `conn` from every game. Returns the games it was attached to.
    pub fn leave_all(&self, conn: ConnectionId) -> Vec<GameId> {
        let attached: Vec<GameId> = self
            .games
            .iter()
            .filter(|entry| entry.value().contains(&conn))
            .map(|entry| *entry.key())
            .collect();
        attached
            .into_iter()
            .filter(|&game_id| self.leave(game_id, conn))
            .collect()
    }

    /// Snapshot of the connections attached to `game_id`, in ID order.
    pub fn audience(&self, game_id: GameId) -> Vec<ConnectionId> {
        self.games
            .get(&game_id)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn is_attached(&self, game_id: GameId, conn: ConnectionId) -> bool {
        self.games
            .get(&game_id)
            .is_some_and(|members| members.contains(&conn))
    }

    /// Number of games with at least one attached connection.
    pub fn game_count(&self) -> usize {
        self.games.len()
    }
}
