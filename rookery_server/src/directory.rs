// Game record storage.
//
// A game record is a `GameSnapshot`: name, seat occupancy, and the rules
// state. The dispatcher loads a copy, mutates it, and stores it back; it is
// the per-game worker (see `worker.rs`) that keeps those load/store pairs
// from interleaving for one game, not the directory.
//
// `MemoryGameDirectory` hands out game IDs sequentially from 1.

use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;
use rookery_protocol::{GameId, GameSnapshot};
use rookery_rules::{Color, GameState};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("{0} does not exist")]
    UnknownGame(GameId),
    #[error("the {color} seat of {game_id} is taken by {holder}")]
    SeatTaken {
        game_id: GameId,
        color: Color,
        holder: String,
    },
}

/// Load/store access to game records.
pub trait GameDirectory: Send + Sync {
    /// A copy of the current record, or `None` if no such game exists.
    fn load(&self, game_id: GameId) -> Option<GameSnapshot>;

    fn contains(&self, game_id: GameId) -> bool {
        self.load(game_id).is_some()
    }

    /// Replace the record for `record.game_id`. The game must already exist.
    fn store(&self, record: GameSnapshot) -> Result<(), DirectoryError>;
}

#[derive(Debug)]
pub struct MemoryGameDirectory {
    games: DashMap<GameId, GameSnapshot>,
    next_id: AtomicU32,
}

impl Default for MemoryGameDirectory {
    fn default() -> Self {
        Self {
            games: DashMap::new(),
            next_id: AtomicU32::new(1),
        }
    }
}

impl MemoryGameDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a game in the standard starting position with both seats open.
    pub fn create_game(&self, name: impl Into<String>) -> GameId {
        self.create_game_from(name, GameState::new())
    }

    /// Create a game starting from an arbitrary state.
    pub fn create_game_from(&self, name: impl Into<String>, game: GameState) -> GameId {
        let game_id = GameId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.games.insert(
            game_id,
            GameSnapshot {
                game_id,
                white_username: None,
                black_username: None,
                game_name: name.into(),
                game,
            },
        );
        game_id
    }

    /// Seat `username` on `color`. Claiming a seat you already hold is a
    /// no-op.
    pub fn claim_seat(
        &self,
        game_id: GameId,
        color: Color,
        username: &str,
    ) -> Result<(), DirectoryError> {
        let mut record = self
            .games
            .get_mut(&game_id)
            .ok_or(DirectoryError::UnknownGame(game_id))?;
        if let Some(holder) = record.seat(color).filter(|holder| *holder != username) {
            return Err(DirectoryError::SeatTaken {
                game_id,
                color,
                holder: holder.to_owned(),
            });
        }
        record.set_seat(color, Some(username.to_owned()));
        Ok(())
    }

    /// All records, ordered by ID.
    pub fn list(&self) -> Vec<GameSnapshot> {
        let mut games: Vec<GameSnapshot> =
            self.games.iter().map(|entry| entry.value().clone()).collect();
        games.sort_by_key(|record| record.game_id);
        games
    }
}

impl GameDirectory for MemoryGameDirectory {
    fn load(&self, game_id: GameId) -> Option<GameSnapshot> {
        self.games.get(&game_id).map(|record| record.value().clone())
    }

    fn contains(&self, game_id: GameId) -> bool {
        self.games.contains_key(&game_id)
    }

    fn store(&self, record: GameSnapshot) -> Result<(), DirectoryError> {
        let game_id = record.game_id;
        match self.games.get_mut(&game_id) {
            Some(mut slot) => {
                *slot = record;
                Ok(())
            }
            None => Err(DirectoryError::UnknownGame(game_id)),
        }
    }
}
