// Per-piece candidate move generation.
//
// `candidate_moves` is a pure function of `(board, square)`. It returns every
// move the piece on that square could make under its movement and capture
// rules, without asking whether the move would leave its own king in check;
// that filter lives in `game.rs`.
//
// Dispatch is a single `match` on `PieceKind`. Each arm calls one of three
// stateless helpers:
// - `slide`: bishop, rook, queen. Walk each direction until the edge, a
//   friendly piece (excluded), or an enemy piece (included as a capture).
// - `step`: king, knight. One hop per offset.
// - `pawn`: forward pushes onto empty squares, the double push from the home
//   row, diagonal captures, and the four-way promotion fan-out.
//
// Whether a piece may end on a square is decided in exactly one place,
// `classify`. Off-board destinations never reach it; `Position::offset`
// returns `None` for them and they are skipped.

use crate::board::Board;
use crate::types::{Color, Move, PieceKind, Position};

const ORTHOGONAL: [(i8, i8); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
const DIAGONAL: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];
const ALL_DIRECTIONS: [(i8, i8); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];
const KNIGHT_JUMPS: [(i8, i8); 8] = [
    (2, 1),
    (2, -1),
    (-2, 1),
    (-2, -1),
    (1, 2),
    (1, -2),
    (-1, 2),
    (-1, -2),
];

/// What a moving piece of a given color finds on a destination square.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Landing {
    Empty,
    Enemy,
    Friendly,
}

fn classify(board: &Board, mover: Color, to: Position) -> Landing {
    match board.piece_at(to) {
        None => Landing::Empty,
        Some(piece) if piece.color == mover => Landing::Friendly,
        Some(_) => Landing::Enemy,
    }
}

/// Every move the piece on `from` could make, ignoring self-check. Empty if
/// `from` is unoccupied.
pub fn candidate_moves(board: &Board, from: Position) -> Vec<Move> {
    let Some(piece) = board.piece_at(from) else {
        return Vec::new();
    };
    let mut moves = Vec::new();
    match piece.kind {
        PieceKind::Bishop => slide(board, from, piece.color, &DIAGONAL, &mut moves),
        PieceKind::Rook => slide(board, from, piece.color, &ORTHOGONAL, &mut moves),
        PieceKind::Queen => slide(board, from, piece.color, &ALL_DIRECTIONS, &mut moves),
        PieceKind::King => step(board, from, piece.color, &ALL_DIRECTIONS, &mut moves),
        PieceKind::Knight => step(board, from, piece.color, &KNIGHT_JUMPS, &mut moves),
        PieceKind::Pawn => pawn(board, from, piece.color, &mut moves),
    }
    moves
}

fn slide(board: &Board, from: Position, mover: Color, dirs: &[(i8, i8)], out: &mut Vec<Move>) {
    for &(dr, dc) in dirs {
        let mut cursor = from;
        while let Some(to) = cursor.offset(dr, dc) {
            match classify(board, mover, to) {
                Landing::Empty => out.push(Move::new(from, to)),
                Landing::Enemy => {
                    out.push(Move::new(from, to));
                    break;
                }
                Landing::Friendly => break,
            }
            cursor = to;
        }
    }
}

fn step(board: &Board, from: Position, mover: Color, offsets: &[(i8, i8)], out: &mut Vec<Move>) {
    for &(dr, dc) in offsets {
        if let Some(to) = from.offset(dr, dc)
            && classify(board, mover, to) != Landing::Friendly
        {
            out.push(Move::new(from, to));
        }
    }
}

fn pawn(board: &Board, from: Position, mover: Color, out: &mut Vec<Move>) {
    let forward = mover.forward();

    if let Some(one) = from.offset(forward, 0)
        && classify(board, mover, one) == Landing::Empty
    {
        push_pawn_move(from, one, mover, out);
        if from.row() == mover.pawn_home_row()
            && let Some(two) = from.offset(2 * forward, 0)
            && classify(board, mover, two) == Landing::Empty
        {
            out.push(Move::new(from, two));
        }
    }

    for dc in [-1, 1] {
        if let Some(to) = from.offset(forward, dc)
            && classify(board, mover, to) == Landing::Enemy
        {
            push_pawn_move(from, to, mover, out);
        }
    }
}

/// Push a pawn move, fanning out into one move per promotion kind when it
/// lands on the promotion row.
fn push_pawn_move(from: Position, to: Position, mover: Color, out: &mut Vec<Move>) {
    if to.row() == mover.promotion_row() {
        out.extend(
            PieceKind::PROMOTIONS
                .iter()
                .map(|&kind| Move::promoting(from, to, kind)),
        );
    } else {
        out.push(Move::new(from, to));
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::types::Piece;

    fn sq(s: &str) -> Position {
        s.parse().unwrap()
    }

    fn mv(s: &str) -> Move {
        s.parse().unwrap()
    }

    fn destinations(moves: &[Move]) -> BTreeSet<String> {
        moves.iter().map(|m| m.end.to_string()).collect()
    }

    fn set(squares: &[&str]) -> BTreeSet<String> {
        squares.iter().map(|s| s.to_string()).collect()
    }

    fn board_with(pieces: &[(&str, Color, PieceKind)]) -> Board {
        let mut board = Board::empty();
        for &(pos, color, kind) in pieces {
            board.place(sq(pos), Piece::new(color, kind));
        }
        board
    }

    #[test]
    fn empty_square_has_no_candidates() {
        assert!(candidate_moves(&Board::standard(), sq("e4")).is_empty());
    }

    #[test]
    fn opening_position_counts() {
        let board = Board::standard();
        let total: usize = board
            .pieces(Color::Light)
            .map(|(pos, _)| candidate_moves(&board, pos).len())
            .sum();
        // 16 pawn pushes + 4 knight hops.
        assert_eq!(total, 20);
        assert!(candidate_moves(&board, sq("a1")).is_empty());
        assert_eq!(
            destinations(&candidate_moves(&board, sq("g1"))),
            set(&["f3", "h3"])
        );
    }

    #[test]
    fn knight_in_corner() {
        let board = board_with(&[("a1", Color::Light, PieceKind::Knight)]);
        assert_eq!(
            destinations(&candidate_moves(&board, sq("a1"))),
            set(&["b3", "c2"])
        );
    }

    #[test]
    fn rook_stops_at_friend_and_captures_enemy() {
        let board = board_with(&[
            ("d4", Color::Light, PieceKind::Rook),
            ("d6", Color::Light, PieceKind::Pawn),
            ("f4", Color::Dark, PieceKind::Knight),
        ]);
        assert_eq!(
            destinations(&candidate_moves(&board, sq("d4"))),
            set(&["d5", "d3", "d2", "d1", "e4", "f4", "c4", "b4", "a4"])
        );
    }

    #[test]
    fn bishop_from_edge_reaches_far_corner() {
        let board = board_with(&[("a1", Color::Dark, PieceKind::Bishop)]);
        assert_eq!(
            destinations(&candidate_moves(&board, sq("a1"))),
            set(&["b2", "c3", "d4", "e5", "f6", "g7", "h8"])
        );
    }

    #[test]
    fn queen_combines_lines() {
        let board = board_with(&[("d4", Color::Light, PieceKind::Queen)]);
        assert_eq!(candidate_moves(&board, sq("d4")).len(), 27);
    }

    #[test]
    fn king_steps_once() {
        let board = board_with(&[
            ("e1", Color::Light, PieceKind::King),
            ("d1", Color::Light, PieceKind::Queen),
            ("e2", Color::Dark, PieceKind::Pawn),
        ]);
        assert_eq!(
            destinations(&candidate_moves(&board, sq("e1"))),
            set(&["d2", "e2", "f2", "f1"])
        );
    }

    #[test]
    fn pawn_double_push_needs_both_squares_empty() {
        let blocked_far = board_with(&[
            ("c2", Color::Light, PieceKind::Pawn),
            ("c4", Color::Dark, PieceKind::Pawn),
        ]);
        assert_eq!(
            destinations(&candidate_moves(&blocked_far, sq("c2"))),
            set(&["c3"])
        );

        let blocked_near = board_with(&[
            ("c7", Color::Dark, PieceKind::Pawn),
            ("c6", Color::Light, PieceKind::Bishop),
        ]);
        assert!(candidate_moves(&blocked_near, sq("c7")).is_empty());
    }

    #[test]
    fn pawn_double_push_only_from_home_row() {
        let board = board_with(&[("c3", Color::Light, PieceKind::Pawn)]);
        assert_eq!(
            destinations(&candidate_moves(&board, sq("c3"))),
            set(&["c4"])
        );
    }

    #[test]
    fn pawn_captures_diagonally_only_enemies() {
        let board = board_with(&[
            ("e5", Color::Dark, PieceKind::Pawn),
            ("d4", Color::Light, PieceKind::Knight),
            ("f4", Color::Dark, PieceKind::Knight),
            ("e4", Color::Light, PieceKind::Pawn),
        ]);
        // Forward blocked by e4, d4 captures, f4 is friendly.
        assert_eq!(candidate_moves(&board, sq("e5")), vec![mv("e5d4")]);
    }

    #[test]
    fn promotion_fans_out() {
        let board = board_with(&[
            ("g7", Color::Light, PieceKind::Pawn),
            ("h8", Color::Dark, PieceKind::Rook),
        ]);
        let moves = candidate_moves(&board, sq("g7"));
        assert_eq!(moves.len(), 8);
        assert!(moves.iter().all(|m| m.promotion.is_some()));
        assert!(moves.contains(&mv("g7g8q")));
        assert!(moves.contains(&mv("g7h8n")));
        assert!(!moves.contains(&Move::new(sq("g7"), sq("g8"))));
    }

    #[test]
    fn dark_pawn_promotes_on_row_one() {
        let board = board_with(&[("a2", Color::Dark, PieceKind::Pawn)]);
        let moves = candidate_moves(&board, sq("a2"));
        assert_eq!(moves.len(), 4);
        assert!(moves.iter().all(|m| m.end == sq("a1")));
    }

    #[test]
    fn never_lands_on_own_piece() {
        let mut board = Board::standard();
        for m in ["e2e4", "d7d5", "g1f3", "c8g4", "f1b5", "b8c6", "d1e2"] {
            board.apply_move(&mv(m));
        }
        for candidate_board in [Board::standard(), board] {
            for (pos, piece) in candidate_board.occupied() {
                for m in candidate_moves(&candidate_board, pos) {
                    let target = candidate_board.piece_at(m.end);
                    assert!(
                        target.is_none_or(|t| t.color != piece.color),
                        "{m} lands on own piece"
                    );
                }
            }
        }
    }
}
