// rookery_rules — the rules engine for Rookery.
//
// Pure game logic with no knowledge of connections, sessions, or the wire.
// The server crate holds one `GameState` per game and funnels every accepted
// command through `GameState::attempt_move` / `GameState::resign`.
//
// Module overview:
// - `types.rs`:   Value types: `Color`, `PieceKind`, `Piece`, `Position`,
//                 `Move`, plus coordinate notation parsing/printing.
// - `board.rs`:   `Board`, an 8x8 grid of optional pieces with a cached king
//                 square per color. `Clone` is a full, independent copy.
// - `movegen.rs`: `candidate_moves`, per-piece move generation that ignores
//                 self-check.
// - `game.rs`:    `GameState`, turn enforcement, self-check filtering,
//                 check/checkmate/stalemate, and the terminal flag.
//
// Dependency order: types → board → movegen → game.

pub mod board;
pub mod game;
pub mod movegen;
pub mod types;

pub use board::{Board, BoardError};
pub use game::{GameState, MoveError, PositionStatus};
pub use movegen::candidate_moves;
pub use types::{Color, Move, NotationError, Piece, PieceKind, Position};
