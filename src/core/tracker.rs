//! Authoritative game state and reconciliation of observed boards.
//!
//! The tracker is the only writer of [`GameState`]. Each observation is
//! compared against the position the tracker expects; it is accepted when
//! it matches, reinterpreted when the difference is exactly one legal move,
//! and rejected otherwise without touching the state.

use crate::core::decoder::{check_piece_counts, DecodeError};
use crate::core::position::PositionSnapshot;
use crate::core::rules::{self, RulesError};
use crate::domain::model::{Color, GameStatus, Move, PieceKind, Square};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InitError {
    #[error("position is missing a king: {0}")]
    IncompletePosition(String),
    #[error(transparent)]
    IllegalPosition(#[from] RulesError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameState {
    position: PositionSnapshot,
    history: Vec<Move>,
    confirmations: u32,
}

impl GameState {
    pub fn position(&self) -> &PositionSnapshot {
        &self.position
    }

    /// Moves committed since the game started, oldest first.
    pub fn history(&self) -> &[Move] {
        &self.history
    }

    /// Number of reconciliation cycles that advanced or confirmed the state.
    pub fn confirmations(&self) -> u32 {
        self.confirmations
    }

    pub fn side_to_move(&self) -> Color {
        self.position.side_to_move
    }

    pub fn legal_moves(&self) -> Result<Vec<Move>, RulesError> {
        rules::legal_moves(&self.position)
    }

    pub fn status(&self) -> Result<GameStatus, RulesError> {
        rules::status(&self.position)
    }
}

/// Expected vs observed placements for a rejected observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    pub reason: String,
    pub expected: String,
    pub observed: String,
    pub differing: Vec<Square>,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let squares: Vec<String> = self.differing.iter().map(|s| s.to_string()).collect();
        write!(
            f,
            "{} (expected {}, observed {}, differing [{}])",
            self.reason,
            self.expected,
            self.observed,
            squares.join(", ")
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The board shows exactly the expected position. Carries the expected
    /// move when one was applied.
    Confirmed(Option<Move>),
    /// One legal move on top of the expected position explains the board.
    ReinterpretedAsOpponentMove(Move),
    /// No expected move, nothing explains the delta, but the observed board
    /// is a valid position on its own and was adopted.
    Resynchronized,
    /// An expected move was supplied but the board still shows the
    /// authoritative position: the move never landed.
    Unchanged,
    /// Nothing explains the board; the state was left alone.
    Inconsistent(Mismatch),
}

impl ReconcileOutcome {
    pub fn advanced(&self) -> bool {
        matches!(
            self,
            ReconcileOutcome::Confirmed(_)
                | ReconcileOutcome::ReinterpretedAsOpponentMove(_)
                | ReconcileOutcome::Resynchronized
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GameStateTracker {
    tolerance: usize,
}

impl Default for GameStateTracker {
    fn default() -> Self {
        Self::new(2)
    }
}

impl GameStateTracker {
    /// `tolerance` is the number of squares a reinterpreting move may
    /// directly touch (its origin and destination); castling rook hops and
    /// en-passant victims are implied by the move and not counted, so 2
    /// admits every legal move and anything below 2 disables
    /// reinterpretation. Configuration caps it at 2.
    pub fn new(tolerance: usize) -> Self {
        Self { tolerance }
    }

    pub fn initialize(&self, snapshot: PositionSnapshot) -> Result<GameState, InitError> {
        for color in [Color::White, Color::Black] {
            if snapshot.count(color, Some(PieceKind::King)) != 1 {
                return Err(InitError::IncompletePosition(format!(
                    "{} king count is {}",
                    color,
                    snapshot.count(color, Some(PieceKind::King))
                )));
            }
        }
        rules::validate(&snapshot)?;
        tracing::info!(fen = %snapshot, "game state initialized");
        Ok(GameState {
            position: snapshot,
            history: Vec::new(),
            confirmations: 0,
        })
    }

    /// Reconciles an observed board against the expected position.
    ///
    /// Preference order: exact match, then a single legal move explaining
    /// the delta, then (without an expected move) adopting a self-consistent
    /// observation, then rejection. Among several explaining moves the one
    /// touching the fewest squares wins, then the lowest origin square name.
    pub fn reconcile(
        &self,
        state: &mut GameState,
        observed: &PositionSnapshot,
        expected_move: Option<&Move>,
    ) -> ReconcileOutcome {
        self.reconcile_with(state, observed, expected_move, true)
    }

    /// Reconciles a board captured after the opponent had the move.
    ///
    /// Only the confirmed position itself or one legal move on top of it is
    /// accepted; a board that neither explains is `Inconsistent` and is
    /// never adopted, so a misread reply cannot stall the side to move.
    pub fn reconcile_reply(
        &self,
        state: &mut GameState,
        observed: &PositionSnapshot,
    ) -> ReconcileOutcome {
        self.reconcile_with(state, observed, None, false)
    }

    fn reconcile_with(
        &self,
        state: &mut GameState,
        observed: &PositionSnapshot,
        expected_move: Option<&Move>,
        adopt_unexplained: bool,
    ) -> ReconcileOutcome {
        let baseline = match expected_move {
            Some(mv) => match rules::is_legal(&state.position, mv) {
                Ok(true) => state.position.apply_move(mv),
                Ok(false) => {
                    return ReconcileOutcome::Inconsistent(self.mismatch(
                        format!("expected move {} is not legal here", mv),
                        &state.position,
                        observed,
                    ))
                }
                Err(e) => {
                    return ReconcileOutcome::Inconsistent(self.mismatch(
                        e.to_string(),
                        &state.position,
                        observed,
                    ))
                }
            },
            None => state.position.clone(),
        };

        if baseline.same_placement(observed) {
            tracing::debug!("observation matches expected position");
            self.commit(state, baseline, expected_move.copied().into_iter().collect());
            return ReconcileOutcome::Confirmed(expected_move.copied());
        }

        if let Some(reply) = self.explaining_move(&baseline, observed) {
            let next = baseline.apply_move(&reply);
            let mut moves: Vec<Move> = expected_move.copied().into_iter().collect();
            moves.push(reply);
            tracing::info!(%reply, "observation explained by one legal move");
            self.commit(state, next, moves);
            return ReconcileOutcome::ReinterpretedAsOpponentMove(reply);
        }

        if expected_move.is_some() && state.position.same_placement(observed) {
            tracing::warn!("board unchanged since the last confirmed position");
            return ReconcileOutcome::Unchanged;
        }

        if expected_move.is_none() && adopt_unexplained {
            let adopted = observed.with_metadata_from(&state.position);
            let valid = check_piece_counts(&adopted)
                .map_err(|e: DecodeError| e.to_string())
                .and_then(|_| rules::validate(&adopted).map_err(|e| e.to_string()));
            return match valid {
                Ok(()) => {
                    tracing::warn!(fen = %adopted, "adopting observed position as-is");
                    self.commit(state, adopted, Vec::new());
                    ReconcileOutcome::Resynchronized
                }
                Err(reason) => {
                    ReconcileOutcome::Inconsistent(self.mismatch(reason, &baseline, observed))
                }
            };
        }

        ReconcileOutcome::Inconsistent(self.mismatch(
            "no single legal move explains the observed board".to_string(),
            &baseline,
            observed,
        ))
    }

    fn explaining_move(
        &self,
        baseline: &PositionSnapshot,
        observed: &PositionSnapshot,
    ) -> Option<Move> {
        let delta = baseline.diff_squares(observed);
        // No single move changes more than four squares (castling).
        if self.tolerance < 2 || delta.is_empty() || delta.len() > 4 {
            return None;
        }
        let candidates = rules::legal_moves(baseline).ok()?;
        candidates
            .into_iter()
            .filter(|mv| delta.contains(&mv.from) && delta.contains(&mv.to))
            .filter(|mv| baseline.apply_move(mv).same_placement(observed))
            .min_by(|a, b| {
                let footprint = |mv: &Move| baseline.diff_squares(&baseline.apply_move(mv)).len();
                footprint(a)
                    .cmp(&footprint(b))
                    .then_with(|| a.from.to_string().cmp(&b.from.to_string()))
                    .then_with(|| a.to.to_string().cmp(&b.to.to_string()))
                    .then_with(|| a.promotion.cmp(&b.promotion))
            })
    }

    fn commit(&self, state: &mut GameState, next: PositionSnapshot, moves: Vec<Move>) {
        state.position = next;
        state.history.extend(moves);
        state.confirmations += 1;
    }

    fn mismatch(
        &self,
        reason: String,
        expected: &PositionSnapshot,
        observed: &PositionSnapshot,
    ) -> Mismatch {
        Mismatch {
            reason,
            expected: expected.placement_fen(),
            observed: observed.placement_fen(),
            differing: expected.diff_squares(observed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Piece;

    fn mv(text: &str) -> Move {
        text.parse().unwrap()
    }

    fn sq(name: &str) -> Square {
        name.parse().unwrap()
    }

    fn started() -> (GameStateTracker, GameState) {
        let tracker = GameStateTracker::default();
        let state = tracker.initialize(PositionSnapshot::starting()).unwrap();
        (tracker, state)
    }

    /// What the decoder would hand over: placement only.
    fn observed(snapshot: &PositionSnapshot) -> PositionSnapshot {
        snapshot.with_metadata_from(&PositionSnapshot::empty())
    }

    #[test]
    fn test_initialize_requires_both_kings() {
        let tracker = GameStateTracker::default();
        let mut snapshot = PositionSnapshot::starting();
        snapshot.set_piece(sq("e8"), None);
        assert!(matches!(
            tracker.initialize(snapshot),
            Err(InitError::IncompletePosition(_))
        ));
    }

    #[test]
    fn test_expected_pawn_push_confirmed() {
        let (tracker, mut state) = started();
        let mut board = PositionSnapshot::empty();
        for (square, piece) in PositionSnapshot::starting().pieces() {
            board.set_piece(square, Some(piece));
        }
        board.set_piece(sq("e2"), None);
        board.set_piece(sq("e4"), Some(Piece::new(Color::White, PieceKind::Pawn)));

        let outcome = tracker.reconcile(&mut state, &board, Some(&mv("e2e4")));

        assert_eq!(outcome, ReconcileOutcome::Confirmed(Some(mv("e2e4"))));
        assert_eq!(state.side_to_move(), Color::Black);
        assert_eq!(state.position().fullmove_number, 1);
        assert_eq!(state.history(), &[mv("e2e4")]);
        assert_eq!(state.confirmations(), 1);
    }

    #[test]
    fn test_opponent_reply_reinterpreted() {
        let (tracker, mut state) = started();
        let after_reply = PositionSnapshot::starting()
            .apply_move(&mv("e2e4"))
            .apply_move(&mv("c7c5"));

        let outcome = tracker.reconcile(&mut state, &observed(&after_reply), Some(&mv("e2e4")));

        assert_eq!(outcome, ReconcileOutcome::ReinterpretedAsOpponentMove(mv("c7c5")));
        assert_eq!(state.position(), &after_reply);
        assert_eq!(state.history(), &[mv("e2e4"), mv("c7c5")]);
        assert_eq!(state.side_to_move(), Color::White);
        assert_eq!(state.position().fullmove_number, 2);
    }

    #[test]
    fn test_castling_reply_reinterpreted() {
        let tracker = GameStateTracker::default();
        let start =
            PositionSnapshot::from_fen("r3k2r/pppq1ppp/8/8/8/8/PPPQ1PPP/R3K2R b KQkq - 0 12")
                .unwrap();
        let mut state = tracker.initialize(start.clone()).unwrap();
        let after = start.apply_move(&mv("e8g8"));

        let outcome = tracker.reconcile(&mut state, &observed(&after), None);

        assert_eq!(outcome, ReconcileOutcome::ReinterpretedAsOpponentMove(mv("e8g8")));
        assert_eq!(state.position().castling.to_string(), "KQ");
    }

    #[test]
    fn test_unexplained_delta_leaves_state_alone() {
        let (tracker, mut state) = started();
        let before = state.clone();
        let mut board = PositionSnapshot::starting().apply_move(&mv("e2e4"));
        board.set_piece(sq("a7"), None);
        board.set_piece(sq("h2"), None);
        board.set_piece(sq("d5"), Some(Piece::new(Color::Black, PieceKind::Queen)));

        let outcome = tracker.reconcile(&mut state, &observed(&board), Some(&mv("e2e4")));

        match outcome {
            ReconcileOutcome::Inconsistent(mismatch) => {
                assert_eq!(mismatch.differing, vec![sq("h2"), sq("d5"), sq("a7")]);
            }
            other => panic!("expected Inconsistent, got {other:?}"),
        }
        assert_eq!(state, before);
    }

    #[test]
    fn test_move_that_never_landed_is_unchanged() {
        let (tracker, mut state) = started();
        let before = state.clone();
        let outcome = tracker.reconcile(
            &mut state,
            &observed(&PositionSnapshot::starting()),
            Some(&mv("e2e4")),
        );
        assert_eq!(outcome, ReconcileOutcome::Unchanged);
        assert_eq!(state, before);
    }

    #[test]
    fn test_illegal_expected_move_is_inconsistent() {
        let (tracker, mut state) = started();
        let outcome = tracker.reconcile(
            &mut state,
            &observed(&PositionSnapshot::starting()),
            Some(&mv("e2e5")),
        );
        assert!(matches!(outcome, ReconcileOutcome::Inconsistent(_)));
        assert!(state.history().is_empty());
    }

    #[test]
    fn test_no_expected_move_and_same_board_confirms() {
        let (tracker, mut state) = started();
        let outcome = tracker.reconcile(&mut state, &observed(&PositionSnapshot::starting()), None);
        assert_eq!(outcome, ReconcileOutcome::Confirmed(None));
        assert!(state.history().is_empty());
        assert_eq!(state.confirmations(), 1);
    }

    #[test]
    fn test_no_expected_move_adopts_valid_board() {
        let (tracker, mut state) = started();
        let board = PositionSnapshot::from_fen("4k3/8/8/8/8/8/4P3/4K3 w - - 0 1").unwrap();
        let outcome = tracker.reconcile(&mut state, &observed(&board), None);
        assert_eq!(outcome, ReconcileOutcome::Resynchronized);
        assert_eq!(state.position().placement_fen(), "4k3/8/8/8/8/8/4P3/4K3");
        assert_eq!(state.position().castling.to_string(), "-");
        assert_eq!(state.side_to_move(), Color::White);
    }

    #[test]
    fn test_no_expected_move_rejects_kingless_board() {
        let (tracker, mut state) = started();
        let before = state.clone();
        let board = PositionSnapshot::from_fen("8/8/8/8/8/8/4P3/4K3 w - - 0 1").unwrap();
        let outcome = tracker.reconcile(&mut state, &observed(&board), None);
        assert!(matches!(outcome, ReconcileOutcome::Inconsistent(_)));
        assert_eq!(state, before);
    }

    #[test]
    fn test_en_passant_reply_explained() {
        let tracker = GameStateTracker::default();
        let start =
            PositionSnapshot::from_fen("rnbqkbnr/ppp1pppp/8/8/3p4/8/PPPPPPPP/RNBQKBNR w KQkq - 0 3")
                .unwrap();
        let mut state = tracker.initialize(start.clone()).unwrap();
        let after = start.apply_move(&mv("e2e4")).apply_move(&mv("d4e3"));

        let outcome = tracker.reconcile(&mut state, &observed(&after), Some(&mv("e2e4")));

        assert_eq!(outcome, ReconcileOutcome::ReinterpretedAsOpponentMove(mv("d4e3")));
        assert!(state.position().piece_at(sq("e4")).is_none());
    }

    #[test]
    fn test_misread_reply_is_rejected_not_adopted() {
        let tracker = GameStateTracker::default();
        let after_e4 = PositionSnapshot::starting().apply_move(&mv("e2e4"));
        let mut state = tracker.initialize(after_e4.clone()).unwrap();
        let before = state.clone();
        // the e5 pawn was not seen
        let mut misread = after_e4.apply_move(&mv("e7e5"));
        misread.set_piece(sq("e5"), None);

        let outcome = tracker.reconcile_reply(&mut state, &observed(&misread));

        match outcome {
            ReconcileOutcome::Inconsistent(mismatch) => {
                assert_eq!(mismatch.differing, vec![sq("e7")]);
            }
            other => panic!("expected Inconsistent, got {other:?}"),
        }
        assert_eq!(state, before);
        assert_eq!(state.side_to_move(), Color::Black);
    }

    #[test]
    fn test_reply_mode_commits_explained_reply() {
        let tracker = GameStateTracker::default();
        let after_e4 = PositionSnapshot::starting().apply_move(&mv("e2e4"));
        let mut state = tracker.initialize(after_e4.clone()).unwrap();
        let after_e5 = after_e4.apply_move(&mv("e7e5"));

        let outcome = tracker.reconcile_reply(&mut state, &observed(&after_e5));

        assert_eq!(outcome, ReconcileOutcome::ReinterpretedAsOpponentMove(mv("e7e5")));
        assert_eq!(state.history(), &[mv("e7e5")]);
        assert_eq!(state.side_to_move(), Color::White);
    }

    #[test]
    fn test_reply_mode_confirms_board_without_reply_yet() {
        let (tracker, mut state) = started();
        let outcome = tracker.reconcile_reply(&mut state, &observed(&PositionSnapshot::starting()));
        assert_eq!(outcome, ReconcileOutcome::Confirmed(None));
        assert!(state.history().is_empty());
    }

    #[test]
    fn test_reply_mode_never_adopts_valid_board() {
        let (tracker, mut state) = started();
        let before = state.clone();
        let board = PositionSnapshot::from_fen("4k3/8/8/8/8/8/4P3/4K3 w - - 0 1").unwrap();
        let outcome = tracker.reconcile_reply(&mut state, &observed(&board));
        assert!(matches!(outcome, ReconcileOutcome::Inconsistent(_)));
        assert_eq!(state, before);
    }
}
