use crate::core::position::PositionSnapshot;
use crate::domain::model::{Color, Piece, PieceKind, PieceLabel, RawLabels, Square};
use std::collections::BTreeMap;
use thiserror::Error;

pub const MAX_PIECES_PER_COLOR: usize = 16;
pub const MAX_PAWNS_PER_COLOR: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unknown label {1:?} on {0}")]
    UnknownLabel(Square, String),

    #[error("unknown square {0:?}")]
    UnknownSquare(String),

    #[error("invalid position: {0}")]
    InvalidPosition(String),

    #[error("malformed vision response: {0}")]
    Malformed(String),
}

/// Parses one free-text label against the allow-listed vocabulary.
///
/// Accepted shapes: `white_pawn`, `white pawn`, `White-Pawn`, `w pawn`,
/// `pawn white`, a single board-state letter (`P`, `n`), and `empty`,
/// `none`, `-`, `.` or a blank string for an empty square. Anything else
/// is rejected.
pub fn parse_label(square: Square, raw: &str) -> Result<PieceLabel, DecodeError> {
    let text = raw.trim();
    let unknown = || DecodeError::UnknownLabel(square, raw.to_string());

    if text.is_empty() || matches!(text, "-" | ".") {
        return Ok(PieceLabel::Empty);
    }
    if text.chars().count() == 1 {
        let c = text.chars().next().ok_or_else(unknown)?;
        return Piece::from_fen_char(c)
            .map(PieceLabel::Occupied)
            .ok_or_else(unknown);
    }

    let lowered = text.to_ascii_lowercase();
    if matches!(lowered.as_str(), "empty" | "none") {
        return Ok(PieceLabel::Empty);
    }

    let tokens: Vec<&str> = lowered
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.len() != 2 {
        return Err(unknown());
    }

    let mut color = None;
    let mut kind = None;
    for token in tokens {
        if let Some(c) = parse_color(token) {
            if color.replace(c).is_some() {
                return Err(unknown());
            }
        } else if let Some(k) = parse_kind(token) {
            if kind.replace(k).is_some() {
                return Err(unknown());
            }
        } else {
            return Err(unknown());
        }
    }
    match (color, kind) {
        (Some(color), Some(kind)) => Ok(PieceLabel::Occupied(Piece::new(color, kind))),
        _ => Err(unknown()),
    }
}

fn parse_color(token: &str) -> Option<Color> {
    match token {
        "white" | "w" => Some(Color::White),
        "black" | "b" => Some(Color::Black),
        _ => None,
    }
}

fn parse_kind(token: &str) -> Option<PieceKind> {
    PieceKind::ALL
        .iter()
        .copied()
        .find(|kind| kind.as_str() == token)
}

/// Turns square names coming off the wire into [`RawLabels`].
pub fn parse_squares(raw: BTreeMap<String, String>) -> Result<RawLabels, DecodeError> {
    raw.into_iter()
        .map(|(name, label)| {
            let square = name
                .parse::<Square>()
                .map_err(|_| DecodeError::UnknownSquare(name.clone()))?;
            Ok((square, label))
        })
        .collect()
}

/// Builds a validated snapshot from a square → label mapping.
///
/// Missing squares are empty. The metadata of the result is the default
/// (white to move, no castling, no en-passant); the tracker carries the
/// real values forward.
pub fn decode(raw_labels: &RawLabels) -> Result<PositionSnapshot, DecodeError> {
    let mut snapshot = PositionSnapshot::empty();
    for (square, raw) in raw_labels {
        let label = parse_label(*square, raw)?;
        snapshot.set_piece(*square, label.piece());
    }
    check_piece_counts(&snapshot)?;
    Ok(snapshot)
}

/// Piece-count invariants a real board can never break.
pub fn check_piece_counts(snapshot: &PositionSnapshot) -> Result<(), DecodeError> {
    for color in [Color::White, Color::Black] {
        let total = snapshot.count(color, None);
        if total > MAX_PIECES_PER_COLOR {
            return Err(DecodeError::InvalidPosition(format!(
                "{} {} pieces (max {})",
                total, color, MAX_PIECES_PER_COLOR
            )));
        }
        let pawns = snapshot.count(color, Some(PieceKind::Pawn));
        if pawns > MAX_PAWNS_PER_COLOR {
            return Err(DecodeError::InvalidPosition(format!(
                "{} {} pawns (max {})",
                pawns, color, MAX_PAWNS_PER_COLOR
            )));
        }
        let kings = snapshot.count(color, Some(PieceKind::King));
        if kings > 1 {
            return Err(DecodeError::InvalidPosition(format!(
                "{} {} kings",
                kings, color
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(name: &str) -> Square {
        name.parse().unwrap()
    }

    #[test]
    fn test_parse_label_vocabulary() {
        let white_pawn = PieceLabel::Occupied(Piece::new(Color::White, PieceKind::Pawn));
        for raw in ["white_pawn", "White Pawn", "white-pawn", "w pawn", "pawn white", "P"] {
            assert_eq!(parse_label(sq("e2"), raw).unwrap(), white_pawn, "{raw}");
        }
        for raw in ["empty", "", "  ", "-", "None"] {
            assert_eq!(parse_label(sq("e2"), raw).unwrap(), PieceLabel::Empty, "{raw}");
        }
        assert_eq!(
            parse_label(sq("d8"), "q").unwrap(),
            PieceLabel::Occupied(Piece::new(Color::Black, PieceKind::Queen))
        );
    }

    #[test]
    fn test_unknown_labels_fail() {
        for raw in ["green_pawn", "white dragon", "white", "white white", "x", "white pawn king"] {
            assert_eq!(
                parse_label(sq("a1"), raw),
                Err(DecodeError::UnknownLabel(sq("a1"), raw.to_string())),
                "{raw}"
            );
        }
    }

    #[test]
    fn test_missing_squares_default_to_empty() {
        let mut raw = RawLabels::new();
        raw.insert(sq("e1"), "white_king".to_string());
        raw.insert(sq("e8"), "black_king".to_string());
        let snapshot = decode(&raw).unwrap();
        assert_eq!(snapshot.pieces().count(), 2);
        assert_eq!(snapshot.placement_fen(), "4k3/8/8/8/8/8/8/4K3");
    }

    #[test]
    fn test_second_king_rejected() {
        let mut raw = RawLabels::new();
        for file in 0..8 {
            raw.insert(Square::new(file, 0).unwrap(), "white_pawn".to_string());
        }
        raw.insert(sq("e4"), "white_king".to_string());
        raw.insert(sq("d5"), "white_king".to_string());
        assert!(matches!(decode(&raw), Err(DecodeError::InvalidPosition(_))));
    }

    #[test]
    fn test_ninth_pawn_rejected() {
        let mut raw = RawLabels::new();
        for file in 0..8 {
            raw.insert(Square::new(file, 1).unwrap(), "black_pawn".to_string());
        }
        raw.insert(sq("a3"), "black_pawn".to_string());
        assert!(matches!(decode(&raw), Err(DecodeError::InvalidPosition(_))));
    }

    #[test]
    fn test_seventeen_pieces_rejected() {
        let mut raw = RawLabels::new();
        for (i, square) in Square::all().take(17).enumerate() {
            let label = if i == 0 { "white_king" } else { "white_queen" };
            raw.insert(square, label.to_string());
        }
        assert!(matches!(decode(&raw), Err(DecodeError::InvalidPosition(_))));
    }

    #[test]
    fn test_parse_squares() {
        let mut raw = BTreeMap::new();
        raw.insert("e4".to_string(), "black_pawn".to_string());
        assert_eq!(parse_squares(raw).unwrap().len(), 1);

        let mut bad = BTreeMap::new();
        bad.insert("z9".to_string(), "black_pawn".to_string());
        assert_eq!(
            parse_squares(bad),
            Err(DecodeError::UnknownSquare("z9".to_string()))
        );
    }
}
