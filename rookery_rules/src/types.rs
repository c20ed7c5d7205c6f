// Value types shared by the board, the move generator, and the game state.
//
// Everything here is a small `Copy` value: `Color`, `PieceKind`, `Piece`,
// `Position`, and `Move`. None of them carry identity beyond their contents,
// so equality is structural.
//
// Coordinates are 1-based `(row, col)` pairs in `1..=8`. Row 1 is LIGHT's back
// rank, column 1 is the a-file. A `Position` can only be built through
// `Position::new` (or its serde/`FromStr` paths, which funnel through it), so
// an out-of-range square is unrepresentable.
//
// `Position` and `Move` also print and parse the usual coordinate notation
// (`e2`, `e2e4`, `e7e8q`). The server uses it for human-readable
// notifications; tests use it to keep scenarios short.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Colors and pieces
// ---------------------------------------------------------------------------

/// Side of the board. LIGHT moves first and sits in the white seat.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Color {
    Light,
    Dark,
}

impl Color {
    pub const ALL: [Color; 2] = [Color::Light, Color::Dark];

    pub fn opponent(self) -> Color {
        match self {
            Color::Light => Color::Dark,
            Color::Dark => Color::Light,
        }
    }

    /// Row delta of a forward pawn step.
    pub(crate) fn forward(self) -> i8 {
        match self {
            Color::Light => 1,
            Color::Dark => -1,
        }
    }

    /// Row this color's pawns start on.
    pub(crate) fn pawn_home_row(self) -> u8 {
        match self {
            Color::Light => 2,
            Color::Dark => 7,
        }
    }

    /// Row on which this color's pawns promote.
    pub(crate) fn promotion_row(self) -> u8 {
        match self {
            Color::Light => 8,
            Color::Dark => 1,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Color::Light => 0,
            Color::Dark => 1,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::Light => write!(f, "LIGHT"),
            Color::Dark => write!(f, "DARK"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PieceKind {
    King,
    Queen,
    Bishop,
    Knight,
    Rook,
    Pawn,
}

impl PieceKind {
    /// Kinds a pawn may become on the promotion row, in the order the move
    /// generator emits them.
    pub const PROMOTIONS: [PieceKind; 4] = [
        PieceKind::Queen,
        PieceKind::Rook,
        PieceKind::Bishop,
        PieceKind::Knight,
    ];

    fn letter(self) -> char {
        match self {
            PieceKind::King => 'k',
            PieceKind::Queen => 'q',
            PieceKind::Bishop => 'b',
            PieceKind::Knight => 'n',
            PieceKind::Rook => 'r',
            PieceKind::Pawn => 'p',
        }
    }

    fn from_letter(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'k' => Some(PieceKind::King),
            'q' => Some(PieceKind::Queen),
            'b' => Some(PieceKind::Bishop),
            'n' => Some(PieceKind::Knight),
            'r' => Some(PieceKind::Rook),
            'p' => Some(PieceKind::Pawn),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Piece {
    pub color: Color,
    pub kind: PieceKind,
}

impl Piece {
    pub const fn new(color: Color, kind: PieceKind) -> Self {
        Self { color, kind }
    }
}

// ---------------------------------------------------------------------------
// Positions
// ---------------------------------------------------------------------------

/// Errors produced when building a `Position` or `Move` from untrusted input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotationError {
    #[error("square ({row}, {col}) is off the board")]
    OffBoard { row: i64, col: i64 },
    #[error("cannot parse `{0}` as a square")]
    BadSquare(String),
    #[error("cannot parse `{0}` as a move")]
    BadMove(String),
}

/// A square on the 8x8 board, 1-based on both axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawPosition")]
pub struct Position {
    row: u8,
    col: u8,
}

#[derive(Deserialize)]
struct RawPosition {
    row: i64,
    col: i64,
}

impl TryFrom<RawPosition> for Position {
    type Error = NotationError;

    fn try_from(raw: RawPosition) -> Result<Self, Self::Error> {
        let off_board = NotationError::OffBoard {
            row: raw.row,
            col: raw.col,
        };
        let row = u8::try_from(raw.row).map_err(|_| off_board.clone())?;
        let col = u8::try_from(raw.col).map_err(|_| off_board.clone())?;
        Position::new(row, col).ok_or(off_board)
    }
}

impl Position {
    pub fn new(row: u8, col: u8) -> Option<Self> {
        if (1..=8).contains(&row) && (1..=8).contains(&col) {
            Some(Self { row, col })
        } else {
            None
        }
    }

    pub fn row(self) -> u8 {
        self.row
    }

    pub fn col(self) -> u8 {
        self.col
    }

    /// The square `(dr, dc)` away from this one, or `None` if that falls off
    /// the board.
    pub fn offset(self, dr: i8, dc: i8) -> Option<Self> {
        let row = i16::from(self.row) + i16::from(dr);
        let col = i16::from(self.col) + i16::from(dc);
        let row = u8::try_from(row).ok()?;
        let col = u8::try_from(col).ok()?;
        Self::new(row, col)
    }

    /// All 64 squares, row-major from a1.
    pub fn all() -> impl Iterator<Item = Position> {
        (1..=8u8).flat_map(|row| (1..=8u8).map(move |col| Position { row, col }))
    }

    /// Zero-based `(row, col)` indices into an 8x8 array.
    pub(crate) fn indices(self) -> (usize, usize) {
        (usize::from(self.row - 1), usize::from(self.col - 1))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let file = char::from(b'a' + self.col - 1);
        write!(f, "{file}{}", self.row)
    }
}

impl FromStr for Position {
    type Err = NotationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || NotationError::BadSquare(s.to_string());
        let bytes = s.as_bytes();
        if bytes.len() != 2 {
            return Err(bad());
        }
        let file = bytes[0].to_ascii_lowercase();
        let rank = bytes[1];
        if !(b'a'..=b'h').contains(&file) || !(b'1'..=b'8').contains(&rank) {
            return Err(bad());
        }
        Position::new(rank - b'0', file - b'a' + 1).ok_or_else(bad)
    }
}

// ---------------------------------------------------------------------------
// Moves
// ---------------------------------------------------------------------------

/// A move from `start` to `end`. `promotion` is set only for a pawn reaching
/// its promotion row, and names the kind it becomes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    pub start: Position,
    pub end: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<PieceKind>,
}

impl Move {
    pub const fn new(start: Position, end: Position) -> Self {
        Self {
            start,
            end,
            promotion: None,
        }
    }

    pub const fn promoting(start: Position, end: Position, kind: PieceKind) -> Self {
        Self {
            start,
            end,
            promotion: Some(kind),
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.start, self.end)?;
        if let Some(kind) = self.promotion {
            write!(f, "{}", kind.letter())?;
        }
        Ok(())
    }
}

impl FromStr for Move {
    type Err = NotationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || NotationError::BadMove(s.to_string());
        if !s.is_ascii() || !(s.len() == 4 || s.len() == 5) {
            return Err(bad());
        }
        let start: Position = s[0..2].parse().map_err(|_| bad())?;
        let end: Position = s[2..4].parse().map_err(|_| bad())?;
        let promotion = match s[4..].chars().next() {
            None => None,
            Some(c) => match PieceKind::from_letter(c) {
                Some(kind) if PieceKind::PROMOTIONS.contains(&kind) => Some(kind),
                _ => return Err(bad()),
            },
        };
        Ok(Self {
            start,
            end,
            promotion,
        })
    }
}
