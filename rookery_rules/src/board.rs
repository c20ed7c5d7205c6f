// The board: a total mapping from `Position` to `Option<Piece>`.
//
// Storage is a plain `[[Option<Piece>; 8]; 8]` plus a per-color cache of the
// king's square. Every element is `Copy`, so `Clone` yields a fully
// independent board with no shared cells. Check simulation in `game.rs`
// clones the board, plays a candidate move on the clone, and asks whether the
// mover's king is attacked; it relies on that independence.
//
// The king cache is maintained by `set()`, the single write path: writing a
// king records its square, and overwriting or clearing the cached square
// forgets it. Equality compares squares only, since the cache is derived.
//
// Serialization goes through `BoardRepr`, a list of occupied squares. The
// cache is never read from the wire; it is rebuilt square by square while
// deserializing. A list that names a square twice or gives one color two
// kings is rejected with `BoardError`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Color, Move, Piece, PieceKind, Position};

/// Back-rank layout from the a-file to the h-file.
const BACK_RANK: [PieceKind; 8] = [
    PieceKind::Rook,
    PieceKind::Knight,
    PieceKind::Bishop,
    PieceKind::Queen,
    PieceKind::King,
    PieceKind::Bishop,
    PieceKind::Knight,
    PieceKind::Rook,
];

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "BoardRepr", into = "BoardRepr")]
pub struct Board {
    squares: [[Option<Piece>; 8]; 8],
    kings: [Option<Position>; 2],
}

impl Board {
    /// A board with no pieces on it.
    pub fn empty() -> Self {
        Self {
            squares: [[None; 8]; 8],
            kings: [None; 2],
        }
    }

    /// The standard starting position.
    pub fn standard() -> Self {
        let mut board = Self::empty();
        board.reset();
        board
    }

    /// Clear the board and set up the standard starting position.
    pub fn reset(&mut self) {
        *self = Self::empty();
        for (i, kind) in BACK_RANK.iter().enumerate() {
            let col = i as u8 + 1;
            for color in Color::ALL {
                let back = if color == Color::Light { 1 } else { 8 };
                if let Some(pos) = Position::new(back, col) {
                    self.place(pos, Piece::new(color, *kind));
                }
                if let Some(pos) = Position::new(color.pawn_home_row(), col) {
                    self.place(pos, Piece::new(color, PieceKind::Pawn));
                }
            }
        }
    }

    pub fn piece_at(&self, pos: Position) -> Option<Piece> {
        let (r, c) = pos.indices();
        self.squares[r][c]
    }

    /// Put `piece` on `pos`, replacing whatever was there.
    pub fn place(&mut self, pos: Position, piece: Piece) {
        self.set(pos, Some(piece));
    }

    /// Empty `pos`, returning the piece that was on it.
    pub fn clear(&mut self, pos: Position) -> Option<Piece> {
        let previous = self.piece_at(pos);
        self.set(pos, None);
        previous
    }

    /// Relocate the piece on `mv.start` to `mv.end`, promoting it if the move
    /// says so. Whatever stood on `mv.end` is dropped. No-op if `mv.start` is
    /// empty. Legality is the caller's concern.
    pub fn apply_move(&mut self, mv: &Move) {
        let Some(mut piece) = self.clear(mv.start) else {
            return;
        };
        if let Some(kind) = mv.promotion {
            piece.kind = kind;
        }
        self.place(mv.end, piece);
    }

    /// Cached square of `color`'s king, if it has one on the board.
    pub fn king_position(&self, color: Color) -> Option<Position> {
        self.kings[color.index()]
    }

    /// Occupied squares holding `color`'s pieces, row-major from a1.
    pub fn pieces(&self, color: Color) -> impl Iterator<Item = (Position, Piece)> + '_ {
        self.occupied().filter(move |(_, piece)| piece.color == color)
    }

    /// Every occupied square, row-major from a1.
    pub fn occupied(&self) -> impl Iterator<Item = (Position, Piece)> + '_ {
        Position::all().filter_map(|pos| self.piece_at(pos).map(|piece| (pos, piece)))
    }

    fn set(&mut self, pos: Position, piece: Option<Piece>) {
        let (r, c) = pos.indices();
        if let Some(old) = self.squares[r][c]
            && old.kind == PieceKind::King
            && self.kings[old.color.index()] == Some(pos)
        {
            self.kings[old.color.index()] = None;
        }
        if let Some(new) = piece
            && new.kind == PieceKind::King
        {
            self.kings[new.color.index()] = Some(pos);
        }
        self.squares[r][c] = piece;
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::standard()
    }
}

impl PartialEq for Board {
    fn eq(&self, other: &Self) -> bool {
        self.squares == other.squares
    }
}

impl Eq for Board {}

// ---------------------------------------------------------------------------
// Wire representation
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BoardError {
    #[error("square {0} is listed more than once")]
    DuplicateSquare(Position),
    #[error("{0} has more than one king")]
    ExtraKing(Color),
}

#[derive(Serialize, Deserialize)]
struct PlacedPiece {
    position: Position,
    piece: Piece,
}

#[derive(Serialize, Deserialize)]
struct BoardRepr {
    pieces: Vec<PlacedPiece>,
}

impl From<Board> for BoardRepr {
    fn from(board: Board) -> Self {
        Self {
            pieces: board
                .occupied()
                .map(|(position, piece)| PlacedPiece { position, piece })
                .collect(),
        }
    }
}

impl TryFrom<BoardRepr> for Board {
    type Error = BoardError;

    fn try_from(repr: BoardRepr) -> Result<Self, Self::Error> {
        let mut board = Board::empty();
        for PlacedPiece { position, piece } in repr.pieces {
            if board.piece_at(position).is_some() {
                return Err(BoardError::DuplicateSquare(position));
            }
            if piece.kind == PieceKind::King && board.king_position(piece.color).is_some() {
                return Err(BoardError::ExtraKing(piece.color));
            }
            board.place(position, piece);
        }
        Ok(board)
    }
}
