// Game state machine: turn order, legality, check, checkmate, stalemate.
//
// `GameState` owns one `Board`, the color to move, and the terminal flag.
// The only mutation paths are `attempt_move` and `resign`. Once `over` is
// set nothing can clear it, and every later `attempt_move` fails with
// `MoveError::GameOver`.
//
// Legality is layered on top of `movegen::candidate_moves`:
// - `valid_moves` drops every candidate that leaves the mover's own king
//   attacked. Each candidate is played on a clone of the board (see
//   `leaves_king_in_check`) and the clone is scanned.
// - `is_in_check` scans every opposing piece's unfiltered candidates for the
//   king's square. At 64 squares this brute-force scan is fine.
// - Checkmate and stalemate both ask whether the color has any valid move
//   at all, across every piece (king included).
//
// After a successful move the side now to move is evaluated once, and the
// resulting `PositionStatus` is returned to the caller so the server can pick
// notifications without rescanning.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::board::Board;
use crate::movegen::candidate_moves;
use crate::types::{Color, Move, Position};

/// Why a move (or resignation) was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("there is no piece at {0}")]
    NoPieceAtSource(Position),
    #[error("it is {0}'s turn")]
    WrongTurn(Color),
    #[error("the game is already over")]
    GameOver,
    #[error("{0} is not a legal move")]
    IllegalMove(Move),
}

/// Situation of the side to move after a position is reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    Normal,
    Check,
    Checkmate,
    Stalemate,
}

impl PositionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, PositionStatus::Checkmate | PositionStatus::Stalemate)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    board: Board,
    turn: Color,
    over: bool,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

impl GameState {
    /// A fresh game: standard starting position, LIGHT to move.
    pub fn new() -> Self {
        Self::from_position(Board::standard(), Color::Light)
    }

    /// A game starting from an arbitrary position. The position is not
    /// evaluated; a constructed stalemate only becomes terminal once a move
    /// produces it.
    pub fn from_position(board: Board, turn: Color) -> Self {
        Self {
            board,
            turn,
            over: false,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn turn(&self) -> Color {
        self.turn
    }

    pub fn is_over(&self) -> bool {
        self.over
    }

    /// Legal moves for the piece on `pos`, or `None` if the square is empty.
    /// A piece with nothing legal to do yields `Some(vec![])`.
    pub fn valid_moves(&self, pos: Position) -> Option<Vec<Move>> {
        let piece = self.board.piece_at(pos)?;
        Some(
            candidate_moves(&self.board, pos)
                .into_iter()
                .filter(|mv| !leaves_king_in_check(&self.board, mv, piece.color))
                .collect(),
        )
    }

    /// Validate and play `mv`. On success the turn passes to the opponent and
    /// the returned status describes the opponent's position; a terminal
    /// status also ends the game.
    pub fn attempt_move(&mut self, mv: &Move) -> Result<PositionStatus, MoveError> {
        if self.over {
            return Err(MoveError::GameOver);
        }
        let piece = self
            .board
            .piece_at(mv.start)
            .ok_or(MoveError::NoPieceAtSource(mv.start))?;
        if piece.color != self.turn {
            return Err(MoveError::WrongTurn(self.turn));
        }
        let legal = self.valid_moves(mv.start).unwrap_or_default();
        if !legal.contains(mv) {
            return Err(MoveError::IllegalMove(*mv));
        }

        self.board.apply_move(mv);
        self.turn = self.turn.opponent();

        let status = self.status(self.turn);
        if status.is_terminal() {
            self.over = true;
        }
        Ok(status)
    }

    /// End the game without a move being played (resignation). Fails if the
    /// game has already ended.
    pub fn resign(&mut self) -> Result<(), MoveError> {
        if self.over {
            return Err(MoveError::GameOver);
        }
        self.over = true;
        Ok(())
    }

    /// True if any opposing piece could move onto `color`'s king. A board
    /// without that king is never in check.
    pub fn is_in_check(&self, color: Color) -> bool {
        king_attacked(&self.board, color)
    }

    pub fn is_in_checkmate(&self, color: Color) -> bool {
        self.is_in_check(color) && !self.has_any_valid_move(color)
    }

    /// True if it is `color`'s turn, `color` is not in check, and none of its
    /// pieces has a legal move.
    pub fn is_in_stalemate(&self, color: Color) -> bool {
        self.turn == color && !self.is_in_check(color) && !self.has_any_valid_move(color)
    }

    /// Classify `color`'s current situation.
    pub fn status(&self, color: Color) -> PositionStatus {
        let in_check = self.is_in_check(color);
        let can_move = self.has_any_valid_move(color);
        match (in_check, can_move) {
            (true, false) => PositionStatus::Checkmate,
            (true, true) => PositionStatus::Check,
            (false, false) if self.turn == color => PositionStatus::Stalemate,
            _ => PositionStatus::Normal,
        }
    }

    fn has_any_valid_move(&self, color: Color) -> bool {
        self.board
            .pieces(color)
            .any(|(pos, _)| self.valid_moves(pos).is_some_and(|moves| !moves.is_empty()))
    }
}

fn king_attacked(board: &Board, color: Color) -> bool {
    let Some(king) = board.king_position(color) else {
        return false;
    };
    board
        .pieces(color.opponent())
        .any(|(pos, _)| candidate_moves(board, pos).iter().any(|mv| mv.end == king))
}

/// Play `mv` on an independent copy of `board` and report whether `mover`'s
/// king is attacked afterwards.
fn leaves_king_in_check(board: &Board, mv: &Move, mover: Color) -> bool {
    let mut simulated = board.clone();
    simulated.apply_move(mv);
    king_attacked(&simulated, mover)
}
