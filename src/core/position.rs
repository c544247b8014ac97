//! Canonical board representation shared by every component.
//!
//! A [`PositionSnapshot`] is placement plus the metadata a single image
//! cannot show (side to move, castling rights, en-passant target, clocks).
//! It is serialized to and parsed from the standard 6-field board-state
//! string, which is also the wire format for the move oracle.

use crate::domain::model::{Color, Move, Piece, PieceKind, PieceLabel, Square};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FenError {
    #[error("expected 6 fields, found {0}")]
    FieldCount(usize),
    #[error("bad piece placement: {0}")]
    Placement(String),
    #[error("bad side to move: {0}")]
    SideToMove(String),
    #[error("bad castling rights: {0}")]
    Castling(String),
    #[error("bad en-passant target: {0}")]
    EnPassant(String),
    #[error("bad move counter: {0}")]
    Counter(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CastlingRights {
    pub white_king_side: bool,
    pub white_queen_side: bool,
    pub black_king_side: bool,
    pub black_queen_side: bool,
}

impl CastlingRights {
    pub const ALL: CastlingRights = CastlingRights {
        white_king_side: true,
        white_queen_side: true,
        black_king_side: true,
        black_queen_side: true,
    };

    pub const NONE: CastlingRights = CastlingRights {
        white_king_side: false,
        white_queen_side: false,
        black_king_side: false,
        black_queen_side: false,
    };

    fn clear_color(&mut self, color: Color) {
        match color {
            Color::White => {
                self.white_king_side = false;
                self.white_queen_side = false;
            }
            Color::Black => {
                self.black_king_side = false;
                self.black_queen_side = false;
            }
        }
    }

    /// Drops the right tied to a rook home square, if any.
    fn clear_rook_square(&mut self, square: Square) {
        match square.to_string().as_str() {
            "h1" => self.white_king_side = false,
            "a1" => self.white_queen_side = false,
            "h8" => self.black_king_side = false,
            "a8" => self.black_queen_side = false,
            _ => {}
        }
    }

    fn parse(field: &str) -> Result<Self, FenError> {
        let mut rights = CastlingRights::NONE;
        if field == "-" {
            return Ok(rights);
        }
        for c in field.chars() {
            match c {
                'K' => rights.white_king_side = true,
                'Q' => rights.white_queen_side = true,
                'k' => rights.black_king_side = true,
                'q' => rights.black_queen_side = true,
                _ => return Err(FenError::Castling(field.to_string())),
            }
        }
        Ok(rights)
    }
}

impl fmt::Display for CastlingRights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        if self.white_king_side {
            out.push('K');
        }
        if self.white_queen_side {
            out.push('Q');
        }
        if self.black_king_side {
            out.push('k');
        }
        if self.black_queen_side {
            out.push('q');
        }
        if out.is_empty() {
            out.push('-');
        }
        f.write_str(&out)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PositionSnapshot {
    board: [Option<Piece>; 64],
    pub side_to_move: Color,
    pub castling: CastlingRights,
    pub en_passant: Option<Square>,
    pub halfmove_clock: u32,
    pub fullmove_number: u32,
}

impl Default for PositionSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

impl PositionSnapshot {
    /// Empty board, white to move, no castling rights.
    pub fn empty() -> Self {
        Self {
            board: [None; 64],
            side_to_move: Color::White,
            castling: CastlingRights::NONE,
            en_passant: None,
            halfmove_clock: 0,
            fullmove_number: 1,
        }
    }

    pub fn starting() -> Self {
        // STARTING_FEN is a constant known to parse.
        Self::from_fen(STARTING_FEN).unwrap_or_else(|_| Self::empty())
    }

    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        self.board[square.index()]
    }

    pub fn set_piece(&mut self, square: Square, piece: Option<Piece>) {
        self.board[square.index()] = piece;
    }

    /// Occupied squares in a1..h8 order.
    pub fn pieces(&self) -> impl Iterator<Item = (Square, Piece)> + '_ {
        Square::all().filter_map(move |sq| self.piece_at(sq).map(|piece| (sq, piece)))
    }

    pub fn count(&self, color: Color, kind: Option<PieceKind>) -> usize {
        self.pieces()
            .filter(|(_, p)| p.color == color && kind.map_or(true, |k| p.kind == k))
            .count()
    }

    pub fn king_square(&self, color: Color) -> Option<Square> {
        self.pieces()
            .find(|(_, p)| p.color == color && p.kind == PieceKind::King)
            .map(|(sq, _)| sq)
    }

    /// Squares whose contents differ from `other`, ignoring metadata.
    pub fn diff_squares(&self, other: &PositionSnapshot) -> Vec<Square> {
        Square::all()
            .filter(|sq| self.piece_at(*sq) != other.piece_at(*sq))
            .collect()
    }

    pub fn same_placement(&self, other: &PositionSnapshot) -> bool {
        self.board == other.board
    }

    /// Canonical label for all 64 squares.
    pub fn to_labels(&self) -> BTreeMap<Square, String> {
        Square::all()
            .map(|sq| (sq, PieceLabel::from(self.piece_at(sq)).canonical()))
            .collect()
    }

    /// This placement with the given metadata; castling rights that the
    /// placement cannot support are dropped, and the en-passant target
    /// is cleared.
    pub fn with_metadata_from(&self, source: &PositionSnapshot) -> PositionSnapshot {
        let mut next = self.clone();
        next.side_to_move = source.side_to_move;
        next.castling = source.castling;
        next.en_passant = None;
        next.halfmove_clock = source.halfmove_clock;
        next.fullmove_number = source.fullmove_number;
        next.sanitize_castling();
        next
    }

    fn sanitize_castling(&mut self) {
        for color in [Color::White, Color::Black] {
            let rank = color.back_rank();
            let king_home = Square::new(4, rank)
                .and_then(|sq| self.piece_at(sq))
                .map_or(false, |p| p == Piece::new(color, PieceKind::King));
            if !king_home {
                self.castling.clear_color(color);
                continue;
            }
            for file in [0u8, 7] {
                if let Some(corner) = Square::new(file, rank) {
                    if self.piece_at(corner) != Some(Piece::new(color, PieceKind::Rook)) {
                        self.castling.clear_rook_square(corner);
                    }
                }
            }
        }
    }

    pub fn placement_fen(&self) -> String {
        let mut rows = Vec::with_capacity(8);
        for rank in (0..8u8).rev() {
            let mut row = String::new();
            let mut empty = 0;
            for file in 0..8u8 {
                let piece = Square::new(file, rank).and_then(|sq| self.piece_at(sq));
                match piece {
                    Some(piece) => {
                        if empty > 0 {
                            row.push_str(&empty.to_string());
                            empty = 0;
                        }
                        row.push(piece.fen_char());
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                row.push_str(&empty.to_string());
            }
            rows.push(row);
        }
        rows.join("/")
    }

    pub fn to_fen(&self) -> String {
        let side = match self.side_to_move {
            Color::White => "w",
            Color::Black => "b",
        };
        let ep = self
            .en_passant
            .map(|sq| sq.to_string())
            .unwrap_or_else(|| "-".to_string());
        format!(
            "{} {} {} {} {} {}",
            self.placement_fen(),
            side,
            self.castling,
            ep,
            self.halfmove_clock,
            self.fullmove_number
        )
    }

    pub fn from_fen(fen: &str) -> Result<Self, FenError> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() != 6 {
            return Err(FenError::FieldCount(fields.len()));
        }

        let mut snapshot = Self::empty();
        let rows: Vec<&str> = fields[0].split('/').collect();
        if rows.len() != 8 {
            return Err(FenError::Placement(fields[0].to_string()));
        }
        for (row_index, row) in rows.iter().enumerate() {
            let rank = 7 - row_index as u8;
            let mut file = 0u8;
            for c in row.chars() {
                if let Some(skip) = c.to_digit(10) {
                    if !(1..=8).contains(&skip) {
                        return Err(FenError::Placement(fields[0].to_string()));
                    }
                    file += skip as u8;
                } else {
                    let piece = Piece::from_fen_char(c)
                        .ok_or_else(|| FenError::Placement(fields[0].to_string()))?;
                    let square = Square::new(file, rank)
                        .ok_or_else(|| FenError::Placement(fields[0].to_string()))?;
                    snapshot.set_piece(square, Some(piece));
                    file += 1;
                }
                if file > 8 {
                    return Err(FenError::Placement(fields[0].to_string()));
                }
            }
            if file != 8 {
                return Err(FenError::Placement(fields[0].to_string()));
            }
        }

        snapshot.side_to_move = match fields[1] {
            "w" => Color::White,
            "b" => Color::Black,
            other => return Err(FenError::SideToMove(other.to_string())),
        };
        snapshot.castling = CastlingRights::parse(fields[2])?;
        snapshot.en_passant = match fields[3] {
            "-" => None,
            text => Some(
                text.parse::<Square>()
                    .map_err(|_| FenError::EnPassant(text.to_string()))?,
            ),
        };
        snapshot.halfmove_clock = fields[4]
            .parse()
            .map_err(|_| FenError::Counter(fields[4].to_string()))?;
        snapshot.fullmove_number = fields[5]
            .parse()
            .ok()
            .filter(|n: &u32| *n >= 1)
            .ok_or_else(|| FenError::Counter(fields[5].to_string()))?;
        Ok(snapshot)
    }

    /// Applies a move mechanically. Legality is the caller's concern; the
    /// result is only meaningful for moves from the rules' legal-move set.
    pub fn apply_move(&self, mv: &Move) -> PositionSnapshot {
        let mut next = self.clone();
        let Some(moving) = self.piece_at(mv.from) else {
            return next;
        };
        let captured = self.piece_at(mv.to);
        let file_step = mv.to.file() as i8 - mv.from.file() as i8;
        let rank_step = mv.to.rank() as i8 - mv.from.rank() as i8;

        next.set_piece(mv.from, None);
        let landing = match (moving.kind, mv.promotion) {
            (PieceKind::Pawn, Some(kind)) => Piece::new(moving.color, kind),
            _ => moving,
        };
        next.set_piece(mv.to, Some(landing));

        let mut en_passant_capture = false;
        if moving.kind == PieceKind::Pawn
            && file_step != 0
            && captured.is_none()
            && self.en_passant == Some(mv.to)
        {
            if let Some(victim) = mv.to.offset(0, -moving.color.forward()) {
                next.set_piece(victim, None);
                en_passant_capture = true;
            }
        }

        if moving.kind == PieceKind::King && file_step.abs() == 2 {
            let (rook_from, rook_to) = if file_step > 0 {
                (mv.from.offset(3, 0), mv.from.offset(1, 0))
            } else {
                (mv.from.offset(-4, 0), mv.from.offset(-1, 0))
            };
            if let (Some(rook_from), Some(rook_to)) = (rook_from, rook_to) {
                let rook = next.piece_at(rook_from);
                next.set_piece(rook_from, None);
                next.set_piece(rook_to, rook);
            }
        }

        if moving.kind == PieceKind::King {
            next.castling.clear_color(moving.color);
        }
        next.castling.clear_rook_square(mv.from);
        next.castling.clear_rook_square(mv.to);

        next.en_passant = None;
        if moving.kind == PieceKind::Pawn && rank_step.abs() == 2 {
            let target = mv.from.offset(0, moving.color.forward());
            let enemy_pawn = Piece::new(moving.color.opposite(), PieceKind::Pawn);
            let capturable = [-1i8, 1]
                .iter()
                .filter_map(|df| mv.to.offset(*df, 0))
                .any(|sq| next.piece_at(sq) == Some(enemy_pawn));
            if capturable {
                next.en_passant = target;
            }
        }

        if moving.kind == PieceKind::Pawn || captured.is_some() || en_passant_capture {
            next.halfmove_clock = 0;
        } else {
            next.halfmove_clock = self.halfmove_clock + 1;
        }
        if moving.color == Color::Black {
            next.fullmove_number = self.fullmove_number + 1;
        }
        next.side_to_move = moving.color.opposite();
        next
    }
}

impl fmt::Display for PositionSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_fen())
    }
}
