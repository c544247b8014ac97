//! Chess rules via shakmaty: legal-move set, check and game status.

use crate::core::position::PositionSnapshot;
use crate::domain::model::{Color, GameStatus, Move};
use shakmaty::{fen::Fen, CastlingMode, Chess, Position};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RulesError {
    #[error("position rejected by rules: {0}")]
    IllegalPosition(String),
    #[error("rules produced unreadable move: {0}")]
    UnreadableMove(String),
}

fn to_chess(snapshot: &PositionSnapshot) -> Result<Chess, RulesError> {
    let fen: Fen = snapshot
        .to_fen()
        .parse()
        .map_err(|e| RulesError::IllegalPosition(format!("{e}")))?;
    fen.into_position(CastlingMode::Standard)
        .map_err(|e| RulesError::IllegalPosition(format!("{e}")))
}

/// Checks that the position is one the rules accept (kings present, side
/// not to move not in check, no pawns on the back ranks, ...).
pub fn validate(snapshot: &PositionSnapshot) -> Result<(), RulesError> {
    to_chess(snapshot).map(|_| ())
}

/// Every legal move, in the order the rules emit them.
pub fn legal_moves(snapshot: &PositionSnapshot) -> Result<Vec<Move>, RulesError> {
    let position = to_chess(snapshot)?;
    position
        .legal_moves()
        .iter()
        .map(|m| {
            let uci = m.to_uci(CastlingMode::Standard).to_string();
            uci.parse::<Move>()
                .map_err(|_| RulesError::UnreadableMove(uci))
        })
        .collect()
}

pub fn is_legal(snapshot: &PositionSnapshot, mv: &Move) -> Result<bool, RulesError> {
    Ok(legal_moves(snapshot)?.contains(mv))
}

pub fn is_check(snapshot: &PositionSnapshot) -> Result<bool, RulesError> {
    Ok(to_chess(snapshot)?.is_check())
}

/// Game status for the side to move. An empty legal-move set is mate
/// when the side to move is in check and stalemate otherwise.
pub fn status(snapshot: &PositionSnapshot) -> Result<GameStatus, RulesError> {
    let position = to_chess(snapshot)?;
    if position.legal_moves().is_empty() {
        let winner: Color = snapshot.side_to_move.opposite();
        return Ok(if position.is_check() {
            GameStatus::Checkmate { winner }
        } else {
            GameStatus::Stalemate
        });
    }
    if position.is_insufficient_material() {
        return Ok(GameStatus::InsufficientMaterial);
    }
    Ok(GameStatus::Ongoing)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starting_position_has_twenty_moves() {
        let moves = legal_moves(&PositionSnapshot::starting()).unwrap();
        assert_eq!(moves.len(), 20);
        assert!(moves.contains(&"e2e4".parse().unwrap()));
        assert!(!moves.contains(&"e2e5".parse().unwrap()));
    }

    #[test]
    fn test_castling_is_king_step() {
        let snapshot =
            PositionSnapshot::from_fen("r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w KQkq - 0 1")
                .unwrap();
        assert!(is_legal(&snapshot, &"e1g1".parse().unwrap()).unwrap());
        assert!(is_legal(&snapshot, &"e1c1".parse().unwrap()).unwrap());
    }

    #[test]
    fn test_fools_mate() {
        let snapshot = PositionSnapshot::from_fen(
            "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3",
        )
        .unwrap();
        assert_eq!(
            status(&snapshot).unwrap(),
            GameStatus::Checkmate {
                winner: Color::Black
            }
        );
    }

    #[test]
    fn test_stalemate() {
        let snapshot = PositionSnapshot::from_fen("8/8/8/8/8/6q1/5k2/7K w - - 0 1").unwrap();
        assert!(!is_check(&snapshot).unwrap());
        assert_eq!(status(&snapshot).unwrap(), GameStatus::Stalemate);
        assert!(legal_moves(&snapshot).unwrap().is_empty());
    }

    #[test]
    fn test_bare_kings_are_insufficient() {
        let snapshot = PositionSnapshot::from_fen("8/8/8/4k3/8/8/8/4K3 w - - 0 1").unwrap();
        assert_eq!(status(&snapshot).unwrap(), GameStatus::InsufficientMaterial);
    }

    #[test]
    fn test_missing_king_rejected() {
        let snapshot = PositionSnapshot::from_fen("8/8/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        assert!(matches!(
            validate(&snapshot),
            Err(RulesError::IllegalPosition(_))
        ));
    }
}
